//! Dispatch of authenticated webhook batches.
//!
//! ## Flow
//!
//! ```text
//! EventBatch → EventMapper → ResourceFetcher → catalog → OutcomeSink
//! ```
//!
//! Unmapped event types stop at the mapper. Fetch and catalog failures are
//! dead-lettered through the sink without affecting the rest of the batch.

pub mod dispatcher;
pub mod event;
pub mod fetcher;
pub mod mapping;
pub mod replay;
pub mod sink;

pub use dispatcher::{
    DispatchOptions, DispatchReport, DispatchStatus, EventOutcome, EventReport,
    WebhookDispatcher, WebhookRequest,
};
pub use event::{EventBatch, PayloadError, SignedEvent};
pub use fetcher::{FetchError, HttpResourceFetcher, ResourceFetcher, RetryPolicy};
pub use mapping::{EventMapper, EventMapping};
pub use replay::{
    guard_from_config, EntropyReplayGuard, NoReplayCheck, ReplayDecision, ReplayGuard,
};
pub use sink::{LogSink, OutcomeSink, SinkError};
