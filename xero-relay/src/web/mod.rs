//! Web server module for handling inbound Xero webhooks.
//!
//! The handler verifies the delivery, dispatches its events, and maps the
//! dispatch result onto the three responses Xero understands.

pub mod handlers;
pub mod signature;

pub use handlers::{
    catalog_schema, health, router, xero_webhook, AppState, HealthResponse, WebhookResponse,
};
pub use signature::{SignatureVerdict, SIGNATURE_HEADER};
