//! Event type to catalog destination mapping.

use std::collections::HashMap;

use serde::Serialize;

/// Where resources of one event type land in the data catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMapping {
    /// Logical dataset grouping, e.g. "finance"
    pub domain: &'static str,
    /// Catalog schema identifier, e.g. "xeroInvoice"
    pub record_name: &'static str,
}

/// Event types the relay forwards, keyed by Xero `eventType`.
const XERO_MAPPINGS: &[(&str, EventMapping)] = &[
    (
        "invoice",
        EventMapping {
            domain: "finance",
            record_name: "xeroInvoice",
        },
    ),
    (
        "contact",
        EventMapping {
            domain: "customer",
            record_name: "xeroContact",
        },
    ),
    (
        "subscription",
        EventMapping {
            domain: "customer",
            record_name: "xeroSubscription",
        },
    ),
];

/// Immutable lookup table built once at startup.
#[derive(Debug, Clone)]
pub struct EventMapper {
    table: HashMap<&'static str, EventMapping>,
}

impl EventMapper {
    pub fn new(entries: impl IntoIterator<Item = (&'static str, EventMapping)>) -> Self {
        Self {
            table: entries.into_iter().collect(),
        }
    }

    /// The mappings for the Xero event types we ingest.
    pub fn xero() -> Self {
        Self::new(XERO_MAPPINGS.iter().cloned())
    }

    /// Look up an event type. `None` means the type is not handled, which is
    /// an expected outcome rather than an error.
    pub fn resolve(&self, event_type: &str) -> Option<&EventMapping> {
        self.table.get(event_type)
    }
}
