//! HTTP transport for the knowledge-base API
//!
//! One method per remote operation. Every response funnels through `decode`,
//! which implements the server's error-message convention: a JSON error body
//! with a `detail` field yields that message, other JSON bodies are
//! stringified, and non-JSON bodies fall back to the HTTP status line.

use kbsync_common::config::ClientConfig;
use kbsync_common::{Error, KbId, Result};
use serde_json::{json, Value};
use std::time::Duration;

/// Client for the `/knowledgebases` endpoint family
#[derive(Clone)]
pub struct KbApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl KbApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/knowledgebases{}", self.base_url, path)
    }

    /// GET /knowledgebases
    pub async fn list(&self) -> Result<Vec<Value>> {
        let response = self.http.get(self.url("")).send().await?;
        match decode(response).await? {
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Err(Error::Api(format!(
                "expected an array of entities, got: {}",
                other
            ))),
            None => Ok(Vec::new()),
        }
    }

    /// GET /knowledgebases/{id}; `None` when the entity no longer exists
    pub async fn get(&self, id: &KbId) -> Result<Option<Value>> {
        let response = self.http.get(self.url(&format!("/{}", id))).send().await?;
        decode(response).await
    }

    /// POST /knowledgebases
    pub async fn create(&self, fields: &Value) -> Result<Value> {
        let response = self.http.post(self.url("")).json(fields).send().await?;
        require_entity(decode(response).await?)
    }

    /// PUT /knowledgebases/{id}
    pub async fn update(&self, id: &KbId, payload: &Value) -> Result<Value> {
        let response = self
            .http
            .put(self.url(&format!("/{}", id)))
            .json(payload)
            .send()
            .await?;
        require_entity(decode(response).await?)
    }

    /// DELETE /knowledgebases/{id} (success body is empty)
    pub async fn delete(&self, id: &KbId) -> Result<()> {
        let response = self
            .http
            .delete(self.url(&format!("/{}", id)))
            .send()
            .await?;
        decode(response).await?;
        Ok(())
    }

    /// POST /knowledgebases/{id}/parse
    pub async fn start_parse(&self, id: &KbId, embedding_model_id: i64) -> Result<Value> {
        let response = self
            .http
            .post(self.url(&format!("/{}/parse", id)))
            .json(&json!({ "embedding_model_id": embedding_model_id }))
            .send()
            .await?;
        require_entity(decode(response).await?)
    }

    /// POST /knowledgebases/{id}/cancel
    pub async fn cancel_parse(&self, id: &KbId) -> Result<Value> {
        let response = self
            .http
            .post(self.url(&format!("/{}/cancel", id)))
            .send()
            .await?;
        require_entity(decode(response).await?)
    }

    /// POST /knowledgebases/{id}/upload, multipart with part name `file`
    pub async fn upload(&self, id: &KbId, file_name: &str, bytes: Vec<u8>) -> Result<Value> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        let response = self
            .http
            .post(self.url(&format!("/{}/upload", id)))
            .multipart(form)
            .send()
            .await?;
        require_entity(decode(response).await?)
    }

    /// POST /knowledgebases/{id}/generate-summary; returns a new derived entity
    pub async fn generate_summary(
        &self,
        id: &KbId,
        generation_model_id: i64,
        embedding_model_id: i64,
    ) -> Result<Value> {
        let response = self
            .http
            .post(self.url(&format!("/{}/generate-summary", id)))
            .json(&json!({
                "generation_model_id": generation_model_id,
                "embedding_model_id": embedding_model_id,
            }))
            .send()
            .await?;
        require_entity(decode(response).await?)
    }

    /// POST /knowledgebases/{id}/generate-graph; returns a new derived entity
    pub async fn generate_graph(&self, id: &KbId, generation_model_id: i64) -> Result<Value> {
        let response = self
            .http
            .post(self.url(&format!("/{}/generate-graph", id)))
            .json(&json!({ "generation_model_id": generation_model_id }))
            .send()
            .await?;
        require_entity(decode(response).await?)
    }
}

/// Decode a response body. On success, empty and JSON-null bodies map to
/// `None`. On failure, the error-message convention applies.
async fn decode(response: reqwest::Response) -> Result<Option<Value>> {
    let status = response.status();
    let text = response.text().await?;

    if status.is_success() {
        if text.is_empty() {
            return Ok(None);
        }
        let value: Value = serde_json::from_str(&text)?;
        if value.is_null() {
            Ok(None)
        } else {
            Ok(Some(value))
        }
    } else {
        match serde_json::from_str::<Value>(&text) {
            Ok(body) => {
                // detail is usually a string, but validation failures carry
                // structured payloads; either way it beats the whole body
                let message = match body.get("detail") {
                    Some(Value::String(detail)) => detail.clone(),
                    Some(detail) => detail.to_string(),
                    None => body.to_string(),
                };
                Err(Error::Api(message))
            }
            Err(_) => Err(Error::Http {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
            }),
        }
    }
}

fn require_entity(payload: Option<Value>) -> Result<Value> {
    payload.ok_or_else(|| {
        Error::Api("server returned an empty body where an entity was expected".to_string())
    })
}
