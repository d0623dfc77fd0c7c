//! Per-entity status pollers
//!
//! One repeating task per knowledge-base identifier, registered in a shared
//! map so `start` is idempotent. Each tick fetches the entity, merges it
//! into the cache, and self-stops once the terminal predicate holds. Tick
//! failures stop that poller only; they are logged, never written to the
//! shared action error slot.

use crate::api::KbApiClient;
use crate::cache::SharedCache;
use crate::normalize::Normalizer;
use kbsync_common::KbId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

struct RegistryInner {
    pollers: Mutex<HashMap<KbId, JoinHandle<()>>>,
    api: KbApiClient,
    cache: SharedCache,
    normalizer: Normalizer,
    period: Duration,
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        for (_, handle) in self.pollers.lock().unwrap().drain() {
            handle.abort();
        }
    }
}

/// Cheaply cloneable handle over the shared poller map.
///
/// Tasks hold only a weak reference to the registry, so dropping the last
/// handle tears every poller down with it.
#[derive(Clone)]
pub struct PollerRegistry {
    inner: Arc<RegistryInner>,
}

impl PollerRegistry {
    pub fn new(
        api: KbApiClient,
        cache: SharedCache,
        normalizer: Normalizer,
        period: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                pollers: Mutex::new(HashMap::new()),
                api,
                cache,
                normalizer,
                period,
            }),
        }
    }

    /// Begin polling `id`. No-op if a poller is already registered.
    pub fn start(&self, id: KbId) {
        let mut pollers = self.inner.pollers.lock().unwrap();
        if pollers.contains_key(&id) {
            return;
        }
        debug!(kb_id = %id, "starting status poller");
        let weak = Arc::downgrade(&self.inner);
        let period = self.inner.period;
        let task_id = id.clone();
        let handle = tokio::spawn(async move {
            poll_loop(weak, task_id, period).await;
        });
        pollers.insert(id, handle);
    }

    /// Stop polling `id`. No-op if no poller is registered.
    pub fn stop(&self, id: &KbId) {
        if let Some(handle) = self.inner.pollers.lock().unwrap().remove(id) {
            handle.abort();
            debug!(kb_id = %id, "stopped status poller");
        }
    }

    pub fn is_active(&self, id: &KbId) -> bool {
        self.inner.pollers.lock().unwrap().contains_key(id)
    }

    pub fn active_count(&self) -> usize {
        self.inner.pollers.lock().unwrap().len()
    }
}

async fn poll_loop(registry: Weak<RegistryInner>, id: KbId, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // an interval fires immediately; the first fetch belongs one period out
    interval.tick().await;

    loop {
        interval.tick().await;

        // the strong reference lives only for the duration of one tick
        let Some(inner) = registry.upgrade() else {
            return;
        };
        if !poll_once(&inner, &id).await {
            return;
        }
    }
}

/// One fetch-and-merge tick. Returns false when this poller should stop.
async fn poll_once(inner: &RegistryInner, id: &KbId) -> bool {
    match inner.api.get(id).await {
        Ok(Some(raw)) => {
            // a stop() may have raced the fetch; discard stale results
            if !inner.pollers.lock().unwrap().contains_key(id) {
                return false;
            }
            let kb = match inner.normalizer.normalize(raw) {
                Ok(kb) => kb,
                Err(e) => {
                    warn!(kb_id = %id, error = %e, "poller could not decode status payload");
                    finish(inner, id);
                    return false;
                }
            };
            let terminal = kb.is_terminal();
            inner.cache.write().await.upsert(kb);
            if terminal {
                debug!(kb_id = %id, "job reached terminal state, stopping poller");
                finish(inner, id);
                return false;
            }
            true
        }
        Ok(None) => {
            debug!(kb_id = %id, "empty status payload, stopping poller");
            finish(inner, id);
            false
        }
        Err(e) => {
            warn!(kb_id = %id, error = %e, "status fetch failed, stopping poller");
            finish(inner, id);
            false
        }
    }
}

/// Drop this poller's own registration without aborting the running task.
fn finish(inner: &RegistryInner, id: &KbId) {
    inner.pollers.lock().unwrap().remove(id);
}
