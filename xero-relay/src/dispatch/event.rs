//! Xero webhook payload types.
//!
//! A delivery is a batch of change notifications. Each event only points at
//! the changed resource; the resource itself is fetched separately.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// A single change notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedEvent {
    /// Absolute URL of the changed resource in the Xero API
    pub resource_url: String,
    pub resource_id: String,
    /// Resource kind, e.g. "invoice" or "contact" (case-sensitive)
    pub event_type: String,
    /// "CREATE" or "UPDATE"
    pub event_category: String,
    #[serde(deserialize_with = "deserialize_event_date")]
    pub event_date: DateTime<Utc>,
    pub tenant_id: String,
    pub tenant_type: String,
}

/// The body of one webhook delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBatch {
    pub events: Vec<SignedEvent>,
    pub first_event_sequence: i64,
    pub last_event_sequence: i64,
    /// Random nonce that makes every delivery body unique
    pub entropy: String,
}

/// The body did not match the expected delivery structure.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct PayloadError(#[from] serde_json::Error);

impl EventBatch {
    /// Parse a delivery from the raw (already verified) body bytes.
    pub fn from_slice(body: &[u8]) -> Result<Self, PayloadError> {
        Ok(serde_json::from_slice(body)?)
    }
}

/// Xero sends `eventDate` without an offset ("2017-06-21T01:15:39.902");
/// those values are UTC. RFC 3339 values with an offset are accepted too.
fn deserialize_event_date<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_event_date(&raw).map_err(serde::de::Error::custom)
}

fn parse_event_date(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("invalid eventDate {raw:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    const SAMPLE: &str = r#"{
        "events": [{
            "resourceUrl": "https://api.xero.com/api.xro/2.0/Invoices/717f2bfc-c6d4-41fd-b238-3f2f0c0cf777",
            "resourceId": "717f2bfc-c6d4-41fd-b238-3f2f0c0cf777",
            "eventDateUtc": "2017-06-21T01:15:39.902",
            "eventDate": "2017-06-21T01:15:39.902",
            "eventType": "invoice",
            "eventCategory": "UPDATE",
            "tenantId": "c2cc9b6e-9458-4c7d-93cc-f02b81b0594f",
            "tenantType": "ORGANISATION"
        }],
        "lastEventSequence": 1,
        "firstEventSequence": 1,
        "entropy": "S0m3r4Nd0mt3xt"
    }"#;

    #[test]
    fn test_parse_xero_sample() {
        let batch = EventBatch::from_slice(SAMPLE.as_bytes()).unwrap();

        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.entropy, "S0m3r4Nd0mt3xt");
        assert_eq!(batch.first_event_sequence, 1);

        let event = &batch.events[0];
        assert_eq!(event.event_type, "invoice");
        assert_eq!(event.resource_id, "717f2bfc-c6d4-41fd-b238-3f2f0c0cf777");
        assert_eq!(event.event_date.year(), 2017);
        assert_eq!(event.event_date.hour(), 1);
    }

    #[test]
    fn test_parse_empty_batch() {
        let body = br#"{"events": [], "firstEventSequence": 1, "lastEventSequence": 1, "entropy": "x"}"#;
        let batch = EventBatch::from_slice(body).unwrap();
        assert!(batch.events.is_empty());
    }

    #[test]
    fn test_parse_missing_field_fails() {
        let body = br#"{"events": [], "firstEventSequence": 1, "entropy": "x"}"#;
        let err = EventBatch::from_slice(body).unwrap_err();
        assert!(err.to_string().contains("lastEventSequence"));
    }

    #[test]
    fn test_parse_not_json_fails() {
        assert!(EventBatch::from_slice(b"events=1").is_err());
    }

    #[test]
    fn test_parse_event_date_formats() {
        let naive = parse_event_date("2017-06-21T01:15:39.902").unwrap();
        let offset = parse_event_date("2017-06-21T03:15:39.902+02:00").unwrap();
        assert_eq!(naive, offset);

        assert!(parse_event_date("2017-06-21T01:15:39").is_ok());
        assert!(parse_event_date("yesterday").is_err());
    }
}
