//! Queue module for onward relay over RabbitMQ.
//!
//! ## Architecture
//!
//! ```text
//! Webhook → Dispatcher → xero_resources queue   → catalog ingestion
//!                      → xero_dead_letter queue → retry / operator review
//! ```

pub mod publisher;
pub mod types;

pub use publisher::Publisher;
pub use types::{DeadLetter, FailureStage, ResourceEnvelope, DEAD_LETTER_QUEUE, RESOURCE_QUEUE};
