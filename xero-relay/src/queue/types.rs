//! Relay message types.
//!
//! This module defines the message formats for:
//! - `xero_resources` queue: catalog records fetched for a webhook event
//! - `xero_dead_letter` queue: events whose resource could not be relayed

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::CatalogSchema;
use crate::dispatch::event::SignedEvent;
use crate::dispatch::mapping::EventMapping;

/// Queue name for fetched resources.
pub const RESOURCE_QUEUE: &str = "xero_resources";

/// Queue name for events that failed after authentication.
pub const DEAD_LETTER_QUEUE: &str = "xero_dead_letter";

/// Fetched resource ready for ingestion into the data catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEnvelope {
    /// The notification that referenced this resource
    pub event: SignedEvent,
    /// Catalog domain, e.g. "finance"
    pub domain: String,
    /// Catalog record name, e.g. "xeroInvoice"
    pub record_name: String,
    /// Schema id when the record name has a typed catalog schema
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<String>,
    /// Records in catalog form
    pub records: Vec<Value>,
    pub relayed_at: DateTime<Utc>,
}

impl ResourceEnvelope {
    pub fn new(event: &SignedEvent, mapping: &EventMapping, records: Vec<Value>) -> Self {
        Self {
            event: event.clone(),
            domain: mapping.domain.to_string(),
            record_name: mapping.record_name.to_string(),
            schema_id: CatalogSchema::for_record_name(mapping.record_name).map(|s| s.schema_id()),
            records,
            relayed_at: Utc::now(),
        }
    }

    /// Message id used for broker-side de-duplication.
    pub fn message_id(&self) -> String {
        message_id(&self.event)
    }
}

/// Stage at which a mapped event failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Fetch,
    Catalog,
}

/// An authenticated event that could not be relayed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    pub event: SignedEvent,
    pub domain: String,
    pub record_name: String,
    pub stage: FailureStage,
    pub error: String,
    /// HTTP status returned by the Xero API, when it answered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
    pub failed_at: DateTime<Utc>,
}

impl DeadLetter {
    pub fn new(
        event: &SignedEvent,
        mapping: &EventMapping,
        stage: FailureStage,
        error: String,
        upstream_status: Option<u16>,
    ) -> Self {
        Self {
            event: event.clone(),
            domain: mapping.domain.to_string(),
            record_name: mapping.record_name.to_string(),
            stage,
            error,
            upstream_status,
            failed_at: Utc::now(),
        }
    }

    pub fn message_id(&self) -> String {
        message_id(&self.event)
    }
}

fn message_id(event: &SignedEvent) -> String {
    format!(
        "{}-{}-{}",
        event.event_type,
        event.resource_id,
        event.event_date.timestamp_millis()
    )
}
