//! Server payload normalization
//!
//! Decodes raw entity payloads into typed records and applies the
//! timestamp-timezone correction heuristic: backends deployed far from UTC
//! have been observed serializing local wall-clock time as if it were UTC.
//! When the interpreting zone's offset magnitude exceeds four hours, the
//! offset is added back and the timestamp re-serialized as UTC. This is a
//! guess about server behavior, not a protocol guarantee; it lives behind
//! `Normalizer` so an explicit server-declared timezone field can replace
//! it without touching callers.

use chrono::{DateTime, Duration, Local, NaiveDateTime, Offset, SecondsFormat, TimeZone, Utc};
use kbsync_common::{KnowledgeBase, Result};
use serde_json::Value;
use tracing::warn;

/// Offset magnitude (minutes) beyond which timestamps are assumed to be
/// foreign-zone wall-clock time
const FOREIGN_ZONE_THRESHOLD_MINUTES: i64 = 240;

/// Parses raw server payloads into entity records
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    /// Interpreting-timezone offset in minutes, UTC minus local
    offset_minutes: i64,
}

impl Normalizer {
    /// Normalizer using the process-local timezone offset
    pub fn from_local_offset() -> Self {
        let local_minus_utc = Local::now().offset().fix().local_minus_utc() as i64;
        Self {
            offset_minutes: -local_minus_utc / 60,
        }
    }

    /// Normalizer with a fixed offset, for tests or callers that know the
    /// interpreting zone explicitly
    pub fn with_offset_minutes(offset_minutes: i64) -> Self {
        Self { offset_minutes }
    }

    pub fn offset_minutes(&self) -> i64 {
        self.offset_minutes
    }

    /// Parse a raw entity payload into a typed record.
    ///
    /// `updatedAt` is corrected per the heuristic above; an absent timestamp
    /// is replaced with the current time.
    pub fn normalize(&self, raw: Value) -> Result<KnowledgeBase> {
        let mut kb: KnowledgeBase = serde_json::from_value(raw)?;
        kb.updated_at = Some(match kb.updated_at.take() {
            Some(ts) => self.correct_timestamp(ts),
            None => Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        Ok(kb)
    }

    fn correct_timestamp(&self, ts: String) -> String {
        if self.offset_minutes.abs() <= FOREIGN_ZONE_THRESHOLD_MINUTES {
            return ts;
        }

        match parse_point_in_time(&ts) {
            Some(parsed) => {
                let corrected = parsed + Duration::minutes(self.offset_minutes);
                corrected.to_rfc3339_opts(SecondsFormat::Millis, true)
            }
            None => {
                warn!(timestamp = %ts, "unparseable updatedAt, passing through");
                ts
            }
        }
    }
}

/// Parse an RFC 3339 timestamp; naive timestamps (no zone suffix, as emitted
/// by the backend's tz-less DateTime columns) are interpreted as UTC.
fn parse_point_in_time(ts: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(ts) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_small_offset_passes_timestamp_through() {
        let normalizer = Normalizer::with_offset_minutes(0);
        let kb = normalizer
            .normalize(json!({"id": 1, "status": "ready", "updatedAt": "2024-01-15T10:00:00Z"}))
            .unwrap();
        assert_eq!(kb.updated_at.as_deref(), Some("2024-01-15T10:00:00Z"));
    }

    #[test]
    fn test_threshold_offset_is_not_corrected() {
        // 240 minutes is the boundary; only magnitudes above it correct
        let normalizer = Normalizer::with_offset_minutes(240);
        let kb = normalizer
            .normalize(json!({"id": 1, "status": "ready", "updatedAt": "2024-01-15T10:00:00Z"}))
            .unwrap();
        assert_eq!(kb.updated_at.as_deref(), Some("2024-01-15T10:00:00Z"));
    }

    #[test]
    fn test_large_offset_shifts_by_exactly_the_offset() {
        let normalizer = Normalizer::with_offset_minutes(300);
        let kb = normalizer
            .normalize(json!({"id": 1, "status": "ready", "updatedAt": "2024-01-15T10:00:00Z"}))
            .unwrap();
        assert_eq!(kb.updated_at.as_deref(), Some("2024-01-15T15:00:00.000Z"));
    }

    #[test]
    fn test_large_negative_offset_shifts_backwards() {
        let normalizer = Normalizer::with_offset_minutes(-480);
        let kb = normalizer
            .normalize(json!({"id": 1, "status": "ready", "updatedAt": "2024-01-15T10:00:00Z"}))
            .unwrap();
        assert_eq!(kb.updated_at.as_deref(), Some("2024-01-15T02:00:00.000Z"));
    }

    #[test]
    fn test_naive_timestamp_treated_as_utc() {
        let normalizer = Normalizer::with_offset_minutes(300);
        let kb = normalizer
            .normalize(json!({"id": 1, "status": "ready", "updatedAt": "2024-01-15T10:00:00.500000"}))
            .unwrap();
        assert_eq!(kb.updated_at.as_deref(), Some("2024-01-15T15:00:00.500Z"));
    }

    #[test]
    fn test_absent_timestamp_substitutes_current_time() {
        let normalizer = Normalizer::with_offset_minutes(0);
        let before = Utc::now();
        let kb = normalizer
            .normalize(json!({"id": 1, "status": "processing"}))
            .unwrap();
        let after = Utc::now();

        let stamped = DateTime::parse_from_rfc3339(kb.updated_at.as_deref().unwrap())
            .unwrap()
            .with_timezone(&Utc);
        // parse truncated to millis, so compare with a little slack
        assert!(stamped >= before - Duration::seconds(1));
        assert!(stamped <= after + Duration::seconds(1));
    }

    #[test]
    fn test_unparseable_timestamp_passes_through() {
        let normalizer = Normalizer::with_offset_minutes(300);
        let kb = normalizer
            .normalize(json!({"id": 1, "status": "ready", "updatedAt": "yesterday-ish"}))
            .unwrap();
        assert_eq!(kb.updated_at.as_deref(), Some("yesterday-ish"));
    }

    #[test]
    fn test_malformed_entity_is_a_parse_error() {
        let normalizer = Normalizer::with_offset_minutes(0);
        assert!(normalizer.normalize(json!("not an object")).is_err());
    }
}
