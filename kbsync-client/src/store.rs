//! Job orchestration
//!
//! One method per job action. Each follows the same template: issue the
//! remote call, normalize the payload, merge it into the cache, then start
//! a poller if the returned entity is still in flight. Failures are
//! recorded in a shared error slot and re-raised to the caller; the slot is
//! cleared on the next action.

use crate::api::KbApiClient;
use crate::cache::{EntityCache, SharedCache};
use crate::normalize::Normalizer;
use crate::poller::PollerRegistry;
use chrono::{SecondsFormat, Utc};
use kbsync_common::config::ClientConfig;
use kbsync_common::{KbId, KnowledgeBase, ParsingStage, ParsingState, Result};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

/// Client-side state store for knowledge-base processing jobs
pub struct KnowledgeBaseStore {
    api: KbApiClient,
    cache: SharedCache,
    pollers: PollerRegistry,
    normalizer: Normalizer,
    last_error: Mutex<Option<String>>,
    loading: AtomicBool,
}

impl KnowledgeBaseStore {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Self::with_normalizer(config, Normalizer::from_local_offset())
    }

    /// Store with an explicit normalizer, for tests and for callers that
    /// know the interpreting timezone
    pub fn with_normalizer(config: &ClientConfig, normalizer: Normalizer) -> Result<Self> {
        let api = KbApiClient::new(config)?;
        let cache: SharedCache = Arc::new(RwLock::new(EntityCache::new()));
        let pollers = PollerRegistry::new(
            api.clone(),
            Arc::clone(&cache),
            normalizer,
            std::time::Duration::from_millis(config.poll_interval_ms),
        );

        Ok(Self {
            api,
            cache,
            pollers,
            normalizer,
            last_error: Mutex::new(None),
            loading: AtomicBool::new(false),
        })
    }

    pub fn cache(&self) -> SharedCache {
        Arc::clone(&self.cache)
    }

    pub fn pollers(&self) -> &PollerRegistry {
        &self.pollers
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Relaxed)
    }

    /// Message of the most recent failed action, if no action succeeded since
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }

    fn clear_error(&self) {
        *self.last_error.lock().unwrap() = None;
    }

    fn record<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            *self.last_error.lock().unwrap() = Some(e.to_string());
        }
        result
    }

    /// Normalize and merge one returned entity
    async fn merge(&self, raw: Value) -> Result<KnowledgeBase> {
        let kb = self.normalizer.normalize(raw)?;
        self.cache.write().await.upsert(kb.clone());
        Ok(kb)
    }

    /// Normalize, merge, and begin polling when the job is still in flight
    async fn merge_and_watch(&self, raw: Value) -> Result<KnowledgeBase> {
        let kb = self.merge(raw).await?;
        if kb.needs_polling() {
            self.pollers.start(kb.id.clone());
        }
        Ok(kb)
    }

    /// Fetch every knowledge base and replace the cache list wholesale.
    /// The selection is not re-derived by this bulk replace.
    pub async fn fetch_all(&self) -> Result<()> {
        self.clear_error();
        self.loading.store(true, Ordering::Relaxed);
        let result = self.fetch_all_inner().await;
        self.loading.store(false, Ordering::Relaxed);
        self.record(result)
    }

    async fn fetch_all_inner(&self) -> Result<()> {
        let raw_items = self.api.list().await?;
        let mut items = Vec::with_capacity(raw_items.len());
        for raw in raw_items {
            items.push(self.normalizer.normalize(raw)?);
        }
        for kb in &items {
            if kb.needs_polling() {
                self.pollers.start(kb.id.clone());
            }
        }
        self.cache.write().await.replace_all(items);
        Ok(())
    }

    /// Local optimistic transition into model picking; issues no remote call.
    /// No-op when the entity is not cached.
    pub async fn enter_parsing_mode(&self, id: &KbId) {
        let mut cache = self.cache.write().await;
        let Some(existing) = cache.get(id) else {
            return;
        };
        let mut updated = existing.clone();
        updated.parsing_state = Some(ParsingState::new(ParsingStage::PickingModel, 0.0));
        updated.updated_at = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
        cache.upsert(updated);
    }

    pub async fn start_parsing(
        &self,
        id: &KbId,
        embedding_model_id: i64,
    ) -> Result<KnowledgeBase> {
        self.clear_error();
        let result = async {
            let raw = self.api.start_parse(id, embedding_model_id).await?;
            self.merge_and_watch(raw).await
        }
        .await;
        self.record(result)
    }

    /// Cancel a running parse. The poller is stopped before the remote call
    /// so a late tick cannot race the cancel response.
    pub async fn cancel_parsing(&self, id: &KbId) -> Result<KnowledgeBase> {
        self.clear_error();
        self.pollers.stop(id);
        let result = async {
            let raw = self.api.cancel_parse(id).await?;
            self.merge(raw).await
        }
        .await;
        self.record(result)
    }

    pub async fn delete_knowledge_base(&self, id: &KbId) -> Result<()> {
        self.clear_error();
        self.pollers.stop(id);
        let result = async {
            self.api.delete(id).await?;
            self.cache.write().await.remove(id);
            Ok(())
        }
        .await;
        self.record(result)
    }

    pub async fn create_knowledge_base(&self, fields: Value) -> Result<KnowledgeBase> {
        self.clear_error();
        let result = async {
            let raw = self.api.create(&fields).await?;
            self.merge_and_watch(raw).await
        }
        .await;
        self.record(result)
    }

    pub async fn update_knowledge_base(
        &self,
        id: &KbId,
        payload: Value,
    ) -> Result<KnowledgeBase> {
        self.clear_error();
        let result = async {
            let raw = self.api.update(id, &payload).await?;
            self.merge(raw).await
        }
        .await;
        self.record(result)
    }

    /// Replace the entity's source file. Ingestion restarts server-side, so
    /// the merged result usually re-triggers polling.
    pub async fn reupload_file(
        &self,
        id: &KbId,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<KnowledgeBase> {
        self.clear_error();
        let result = async {
            let raw = self.api.upload(id, file_name, bytes).await?;
            self.merge_and_watch(raw).await
        }
        .await;
        self.record(result)
    }

    /// Generate a summary knowledge base derived from `id`. The server
    /// creates a new entity that is appended and polled like a fresh job.
    pub async fn generate_summary(
        &self,
        id: &KbId,
        generation_model_id: i64,
        embedding_model_id: i64,
    ) -> Result<KnowledgeBase> {
        self.clear_error();
        let result = async {
            let raw = self
                .api
                .generate_summary(id, generation_model_id, embedding_model_id)
                .await?;
            self.merge_and_watch(raw).await
        }
        .await;
        self.record(result)
    }

    /// Generate a graph knowledge base derived from `id`. Graph generation
    /// is synchronous on the server side, so the new entity is merged but
    /// never polled.
    pub async fn generate_graph(
        &self,
        id: &KbId,
        generation_model_id: i64,
    ) -> Result<KnowledgeBase> {
        self.clear_error();
        let result = async {
            let raw = self.api.generate_graph(id, generation_model_id).await?;
            self.merge(raw).await
        }
        .await;
        self.record(result)
    }

    pub async fn set_selected(&self, kb: Option<KnowledgeBase>) {
        self.cache.write().await.set_selected(kb);
    }

    pub async fn selected(&self) -> Option<KnowledgeBase> {
        self.cache.read().await.selected().cloned()
    }

    pub async fn get(&self, id: &KbId) -> Option<KnowledgeBase> {
        self.cache.read().await.get(id).cloned()
    }

    pub async fn entries(&self) -> Vec<KnowledgeBase> {
        self.cache.read().await.entries().to_vec()
    }

    pub async fn filter_by_name(&self, term: &str) -> Vec<KnowledgeBase> {
        self.cache
            .read()
            .await
            .filter_by_name(term)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn ready_list(&self) -> Vec<KnowledgeBase> {
        self.cache
            .read()
            .await
            .ready()
            .into_iter()
            .cloned()
            .collect()
    }
}
