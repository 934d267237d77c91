//! Onward delivery of per-event results.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info};

use crate::queue::{DeadLetter, ResourceEnvelope};

/// The relay channel refused or lost a message.
#[derive(Debug, Error)]
#[error("relay channel error: {0:#}")]
pub struct SinkError(#[from] anyhow::Error);

/// Receives fetched resources and failed events.
#[async_trait]
pub trait OutcomeSink: Send + Sync {
    async fn relay(&self, envelope: &ResourceEnvelope) -> Result<(), SinkError>;

    async fn dead_letter(&self, letter: &DeadLetter) -> Result<(), SinkError>;
}

/// Writes outcomes to the structured log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl OutcomeSink for LogSink {
    async fn relay(&self, envelope: &ResourceEnvelope) -> Result<(), SinkError> {
        let records = serde_json::to_string(&envelope.records).unwrap_or_default();
        info!(
            resource_id = %envelope.event.resource_id,
            domain = %envelope.domain,
            record_name = %envelope.record_name,
            record_count = envelope.records.len(),
            records = %records,
            "xero_resource_logged"
        );
        Ok(())
    }

    async fn dead_letter(&self, letter: &DeadLetter) -> Result<(), SinkError> {
        error!(
            resource_id = %letter.event.resource_id,
            resource_url = %letter.event.resource_url,
            stage = ?letter.stage,
            upstream_status = ?letter.upstream_status,
            error = %letter.error,
            "xero_dead_letter_logged"
        );
        Ok(())
    }
}
