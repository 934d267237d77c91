//! Webhook dispatch.
//!
//! One call to [`WebhookDispatcher::handle`] takes a delivery through:
//!
//! ```text
//! credentials → signature → parse → replay check → per event:
//!     mapping → fetch → catalog records → relay / dead letter
//! ```
//!
//! Authentication and parse failures end the request. Per-event failures
//! never do: they are logged, dead-lettered, and the batch continues.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::HeaderMap;
use futures::stream::{self, StreamExt};
use tokio::time::{timeout_at, Instant};
use tracing::{error, info, warn};

use crate::catalog;
use crate::config::Config;
use crate::credentials::{CredentialBundle, CredentialCache};
use crate::dispatch::event::{EventBatch, SignedEvent};
use crate::dispatch::fetcher::ResourceFetcher;
use crate::dispatch::mapping::{EventMapper, EventMapping};
use crate::dispatch::replay::{NoReplayCheck, ReplayDecision, ReplayGuard};
use crate::dispatch::sink::OutcomeSink;
use crate::queue::{DeadLetter, FailureStage, ResourceEnvelope};
use crate::web::signature::{self, SignatureVerdict};

/// An inbound delivery exactly as received.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub headers: HeaderMap,
    /// Raw body; signatures are computed over these bytes
    pub body: Bytes,
}

/// Limits for the processing stage.
#[derive(Debug, Clone, Copy)]
pub struct DispatchOptions {
    /// Resource fetches in flight at once
    pub concurrency: usize,
    /// Time budget for processing one batch
    pub deadline: Duration,
}

impl DispatchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency: config.fetch_concurrency.max(1),
            deadline: config.dispatch_deadline(),
        }
    }
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            deadline: Duration::from_secs(25),
        }
    }
}

/// What happened to a single event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Fetched and handed to the relay channel
    Relayed { records: usize },
    /// No mapping for the event type; nothing fetched
    Unmapped,
    FetchFailed(String),
    /// Fetched, but the response did not match the catalog schema
    InvalidRecord(String),
    /// Fetched, but the relay channel refused the message
    RelayFailed(String),
    /// Still pending when the dispatch deadline passed
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventReport {
    pub resource_id: String,
    pub event_type: String,
    pub outcome: EventOutcome,
}

/// Terminal state of one webhook call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchStatus {
    Completed,
    /// Authenticated, but already processed; acknowledged without work
    Replayed(String),
    Rejected(SignatureVerdict),
    MalformedPayload(String),
    CredentialsUnavailable(String),
}

/// Result of [`WebhookDispatcher::handle`], with per-event outcomes in
/// delivery order.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub status: DispatchStatus,
    pub events: Vec<EventReport>,
}

impl DispatchReport {
    fn terminal(status: DispatchStatus) -> Self {
        Self {
            status,
            events: Vec::new(),
        }
    }

    /// Number of events whose outcome matches `pred`.
    pub fn count(&self, pred: impl Fn(&EventOutcome) -> bool) -> usize {
        self.events.iter().filter(|e| pred(&e.outcome)).count()
    }
}

/// Authenticates deliveries and fans their events out to the fetcher.
pub struct WebhookDispatcher {
    credentials: Arc<CredentialCache>,
    mapper: EventMapper,
    fetcher: Arc<dyn ResourceFetcher>,
    sink: Arc<dyn OutcomeSink>,
    replay: Box<dyn ReplayGuard>,
    options: DispatchOptions,
}

impl WebhookDispatcher {
    pub fn new(
        credentials: Arc<CredentialCache>,
        fetcher: Arc<dyn ResourceFetcher>,
        sink: Arc<dyn OutcomeSink>,
    ) -> Self {
        Self {
            credentials,
            mapper: EventMapper::xero(),
            fetcher,
            sink,
            replay: Box::new(NoReplayCheck),
            options: DispatchOptions::default(),
        }
    }

    pub fn with_replay_guard(mut self, replay: Box<dyn ReplayGuard>) -> Self {
        self.replay = replay;
        self
    }

    pub fn with_options(mut self, options: DispatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Process one delivery end to end.
    pub async fn handle(&self, request: &WebhookRequest) -> DispatchReport {
        let bundle = match self.authenticate(request).await {
            Ok(bundle) => bundle,
            Err(status) => return DispatchReport::terminal(status),
        };

        let batch = match EventBatch::from_slice(&request.body) {
            Ok(batch) => batch,
            Err(e) => {
                error!(
                    error = %e,
                    body_length = request.body.len(),
                    "xero_payload_invalid"
                );
                return DispatchReport::terminal(DispatchStatus::MalformedPayload(e.to_string()));
            }
        };

        info!(
            event_count = batch.events.len(),
            first_event_sequence = batch.first_event_sequence,
            last_event_sequence = batch.last_event_sequence,
            "xero_webhook_batch_received"
        );

        if let ReplayDecision::Replayed { reason } = self.replay.check(&batch) {
            return DispatchReport::terminal(DispatchStatus::Replayed(reason));
        }

        let events = self.process(&batch, &bundle.access_token).await;
        let report = DispatchReport {
            status: DispatchStatus::Completed,
            events,
        };

        info!(
            event_count = report.events.len(),
            relayed = report.count(|o| matches!(o, EventOutcome::Relayed { .. })),
            unmapped = report.count(|o| matches!(o, EventOutcome::Unmapped)),
            failed = report.count(|o| matches!(
                o,
                EventOutcome::FetchFailed(_)
                    | EventOutcome::InvalidRecord(_)
                    | EventOutcome::RelayFailed(_)
            )),
            abandoned = report.count(|o| matches!(o, EventOutcome::Abandoned)),
            "xero_webhook_batch_complete"
        );

        report
    }

    /// Verify the signature, reloading the key once if a cached key fails.
    async fn authenticate(
        &self,
        request: &WebhookRequest,
    ) -> Result<Arc<CredentialBundle>, DispatchStatus> {
        let credentials = self.credentials.get().await.map_err(|e| {
            error!(error = %e, "xero_credentials_unavailable");
            DispatchStatus::CredentialsUnavailable(e.to_string())
        })?;

        let verdict = signature::verify(
            &request.headers,
            &request.body,
            &credentials.bundle.webhook_key,
        );
        if verdict.is_valid() {
            return Ok(credentials.bundle);
        }

        // The key may have been rotated since it was cached.
        if verdict == SignatureVerdict::Mismatch && !credentials.fresh {
            match self.credentials.refresh_stale().await {
                Ok(Some(bundle)) => {
                    let retry =
                        signature::verify(&request.headers, &request.body, &bundle.webhook_key);
                    info!(valid = retry.is_valid(), "xero_signature_rechecked_after_refresh");
                    if retry.is_valid() {
                        return Ok(bundle);
                    }
                    return Err(DispatchStatus::Rejected(retry));
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "xero_credentials_refresh_failed"),
            }
        }

        Err(DispatchStatus::Rejected(verdict))
    }

    async fn process(&self, batch: &EventBatch, access_token: &str) -> Vec<EventReport> {
        let deadline = Instant::now() + self.options.deadline;
        let mut outcomes: Vec<Option<EventOutcome>> = batch.events.iter().map(|_| None).collect();

        let mut jobs = Vec::new();
        for (index, event) in batch.events.iter().enumerate() {
            match self.mapper.resolve(&event.event_type) {
                Some(mapping) => jobs.push((index, event.clone(), mapping.clone())),
                None => {
                    warn!(
                        event_type = %event.event_type,
                        event_category = %event.event_category,
                        resource_id = %event.resource_id,
                        "xero_event_unmapped"
                    );
                    outcomes[index] = Some(EventOutcome::Unmapped);
                }
            }
        }

        let mut pending = stream::iter(jobs)
            .map(|(index, event, mapping)| async move {
                (index, self.relay_event(&event, &mapping, access_token).await)
            })
            .buffer_unordered(self.options.concurrency.max(1));

        loop {
            match timeout_at(deadline, pending.next()).await {
                Ok(Some((index, outcome))) => outcomes[index] = Some(outcome),
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        deadline_ms = self.options.deadline.as_millis() as u64,
                        "xero_dispatch_deadline_reached"
                    );
                    break;
                }
            }
        }

        // Dropping the stream cancels fetches that are still in flight.
        drop(pending);

        batch
            .events
            .iter()
            .zip(outcomes)
            .map(|(event, outcome)| {
                let outcome = outcome.unwrap_or_else(|| {
                    warn!(
                        resource_id = %event.resource_id,
                        event_type = %event.event_type,
                        "xero_event_abandoned"
                    );
                    EventOutcome::Abandoned
                });
                EventReport {
                    resource_id: event.resource_id.clone(),
                    event_type: event.event_type.clone(),
                    outcome,
                }
            })
            .collect()
    }

    async fn relay_event(
        &self,
        event: &SignedEvent,
        mapping: &EventMapping,
        access_token: &str,
    ) -> EventOutcome {
        let resource = match self.fetcher.fetch(&event.resource_url, access_token).await {
            Ok(resource) => resource,
            Err(e) => {
                error!(
                    resource_id = %event.resource_id,
                    resource_url = %event.resource_url,
                    upstream_status = ?e.status(),
                    error = %e,
                    "xero_fetch_failed"
                );
                let letter = DeadLetter::new(
                    event,
                    mapping,
                    FailureStage::Fetch,
                    e.to_string(),
                    e.status(),
                );
                self.dead_letter(&letter).await;
                return EventOutcome::FetchFailed(e.to_string());
            }
        };

        let records = match catalog::extract_records(mapping.record_name, &resource) {
            Ok(records) => records,
            Err(e) => {
                error!(
                    resource_id = %event.resource_id,
                    record_name = mapping.record_name,
                    error = %e,
                    "xero_catalog_record_invalid"
                );
                let letter =
                    DeadLetter::new(event, mapping, FailureStage::Catalog, e.to_string(), None);
                self.dead_letter(&letter).await;
                return EventOutcome::InvalidRecord(e.to_string());
            }
        };

        let envelope = ResourceEnvelope::new(event, mapping, records);
        let record_count = envelope.records.len();

        if let Err(e) = self.sink.relay(&envelope).await {
            error!(
                resource_id = %event.resource_id,
                error = %e,
                "xero_relay_failed"
            );
            return EventOutcome::RelayFailed(e.to_string());
        }

        info!(
            resource_id = %event.resource_id,
            event_type = %event.event_type,
            domain = mapping.domain,
            record_name = mapping.record_name,
            record_count = record_count,
            "xero_event_relayed"
        );

        EventOutcome::Relayed {
            records: record_count,
        }
    }

    async fn dead_letter(&self, letter: &DeadLetter) {
        if let Err(e) = self.sink.dead_letter(letter).await {
            error!(
                resource_id = %letter.event.resource_id,
                error = %e,
                "xero_dead_letter_failed"
            );
        }
    }
}
