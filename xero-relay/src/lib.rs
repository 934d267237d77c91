//! Xero Relay - verifies Xero webhook deliveries and relays the resources
//! they reference to the data catalog.
//!
//! ## Architecture
//!
//! ```text
//! Xero → POST /xero → signature check → EventMapper → Xero API fetch
//!                                                   → catalog records
//!                                                   → xero_resources / xero_dead_letter
//! ```

pub mod catalog;
pub mod config;
pub mod credentials;
pub mod dispatch;
pub mod queue;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use credentials::{CredentialBundle, CredentialCache, SecretStore};
pub use dispatch::{DispatchReport, DispatchStatus, WebhookDispatcher, WebhookRequest};
pub use queue::Publisher;
pub use web::AppState;
