//! Knowledge-base data model
//!
//! The wire format is the server's camelCase JSON (`updatedAt`,
//! `parsingState`, `sourceFilePath`, `kbType`). Attributes the engine does
//! not interpret are preserved through a flattened map so merges never drop
//! server-defined fields.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque knowledge-base identifier.
///
/// The server currently issues integer ids; both JSON integers and strings
/// deserialize to the same canonical string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct KbId(String);

impl KbId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KbId {
    fn from(value: &str) -> Self {
        KbId(value.to_string())
    }
}

impl From<String> for KbId {
    fn from(value: String) -> Self {
        KbId(value)
    }
}

impl From<i64> for KbId {
    fn from(value: i64) -> Self {
        KbId(value.to_string())
    }
}

impl<'de> Deserialize<'de> for KbId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Str(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Int(n) => KbId(n.to_string()),
            Raw::Str(s) => KbId(s),
        })
    }
}

/// Top-level job status of a knowledge base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KbStatus {
    #[default]
    Idle,
    Processing,
    Ready,
    Error,
    /// Statuses the server emits but the lifecycle does not interpret
    /// (freshly created rows arrive as `"new"`)
    #[serde(other)]
    Unknown,
}

impl fmt::Display for KbStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KbStatus::Idle => "idle",
            KbStatus::Processing => "processing",
            KbStatus::Ready => "ready",
            KbStatus::Error => "error",
            KbStatus::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Fine-grained phase of a parsing job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsingStage {
    PickingModel,
    Pending,
    Parsing,
    Complete,
    Error,
    Cancelled,
    /// Stages outside the lifecycle (the server emits `"idle"` on reset)
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ParsingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParsingStage::PickingModel => "picking_model",
            ParsingStage::Pending => "pending",
            ParsingStage::Parsing => "parsing",
            ParsingStage::Complete => "complete",
            ParsingStage::Error => "error",
            ParsingStage::Cancelled => "cancelled",
            ParsingStage::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Progress record attached to a knowledge base while a parsing job runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsingState {
    pub stage: ParsingStage,
    #[serde(default)]
    pub progress: f64,
    /// Server-attached context, e.g. a failure message
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ParsingState {
    pub fn new(stage: ParsingStage, progress: f64) -> Self {
        Self {
            stage,
            progress,
            extra: serde_json::Map::new(),
        }
    }
}

/// A server-managed document collection undergoing ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBase {
    pub id: KbId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: KbStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsing_state: Option<ParsingState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Derived entities (summaries, graphs) link back to their source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<KbId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kb_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file_path: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl KnowledgeBase {
    /// Poller-start predicate: the job is still moving and worth watching.
    pub fn needs_polling(&self) -> bool {
        self.status == KbStatus::Processing
            || self.parsing_state.as_ref().is_some_and(|p| {
                matches!(
                    p.stage,
                    ParsingStage::Pending | ParsingStage::Parsing | ParsingStage::PickingModel
                )
            })
    }

    /// Terminal predicate: polling this entity can never observe further
    /// progress, so an active poller should stop.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, KbStatus::Ready | KbStatus::Error)
            || self.parsing_state.as_ref().is_some_and(|p| {
                matches!(
                    p.stage,
                    ParsingStage::Complete | ParsingStage::Error | ParsingStage::Cancelled
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> KnowledgeBase {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_integer_and_string_ids_canonicalize() {
        let a = parse(json!({"id": 7, "name": "a", "status": "idle"}));
        let b = parse(json!({"id": "7", "name": "b", "status": "idle"}));
        assert_eq!(a.id, b.id);
        assert_eq!(a.id.as_str(), "7");
    }

    #[test]
    fn test_camel_case_wire_fields() {
        let kb = parse(json!({
            "id": 1,
            "name": "docs",
            "status": "processing",
            "parsingState": {"stage": "parsing", "progress": 40.0},
            "updatedAt": "2024-01-15T10:00:00Z",
            "parentId": 3,
            "kbType": "primary",
            "sourceFilePath": "/uploads/kb_1.pdf"
        }));
        assert_eq!(kb.status, KbStatus::Processing);
        assert_eq!(kb.parsing_state.as_ref().unwrap().stage, ParsingStage::Parsing);
        assert_eq!(kb.parent_id, Some(KbId::from(3)));
        assert_eq!(kb.source_file_path.as_deref(), Some("/uploads/kb_1.pdf"));
    }

    #[test]
    fn test_unknown_status_and_stage_tolerated() {
        let kb = parse(json!({
            "id": 1,
            "name": "fresh",
            "status": "new",
            "parsingState": {"stage": "idle", "progress": 0}
        }));
        assert_eq!(kb.status, KbStatus::Unknown);
        assert_eq!(kb.parsing_state.as_ref().unwrap().stage, ParsingStage::Unknown);
        assert!(!kb.needs_polling());
        assert!(!kb.is_terminal());
    }

    #[test]
    fn test_extra_attributes_preserved() {
        let kb = parse(json!({"id": 1, "name": "a", "status": "ready", "chunkCount": 42}));
        assert_eq!(kb.extra.get("chunkCount"), Some(&json!(42)));
        let round = serde_json::to_value(&kb).unwrap();
        assert_eq!(round.get("chunkCount"), Some(&json!(42)));
    }

    #[test]
    fn test_needs_polling_predicate() {
        let processing = parse(json!({"id": 1, "status": "processing"}));
        assert!(processing.needs_polling());

        for stage in ["pending", "parsing", "picking_model"] {
            let kb = parse(json!({
                "id": 1,
                "status": "idle",
                "parsingState": {"stage": stage, "progress": 0}
            }));
            assert!(kb.needs_polling(), "stage {stage} should trigger polling");
        }

        let idle = parse(json!({"id": 1, "status": "idle"}));
        assert!(!idle.needs_polling());
    }

    #[test]
    fn test_terminal_predicate() {
        for status in ["ready", "error"] {
            let kb = parse(json!({"id": 1, "status": status}));
            assert!(kb.is_terminal(), "status {status} should be terminal");
        }

        for stage in ["complete", "error", "cancelled"] {
            let kb = parse(json!({
                "id": 1,
                "status": "processing",
                "parsingState": {"stage": stage, "progress": 100}
            }));
            assert!(kb.is_terminal(), "stage {stage} should be terminal");
        }

        let running = parse(json!({
            "id": 1,
            "status": "processing",
            "parsingState": {"stage": "parsing", "progress": 50}
        }));
        assert!(!running.is_terminal());
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let kb = parse(json!({"id": 1, "status": "ready"}));
        assert_eq!(kb.name, "");
        assert!(kb.parsing_state.is_none());
        assert!(kb.updated_at.is_none());
    }
}
