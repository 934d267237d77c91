//! Data catalog record definitions.
//!
//! Xero API responses use PascalCase keys and wrap records in a plural
//! envelope (`{"Invoices": [...]}`). Catalog records are typed, camelCase,
//! and carry a schema id so downstream consumers can register them.
//!
//! ```text
//! Xero API JSON → typed record (validates required fields) → catalog JSON
//! ```

pub mod contact;
pub mod invoice;

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use contact::XeroContact;
pub use invoice::XeroInvoice;

/// Base URL of catalog schema ids.
const SCHEMA_BASE_URL: &str = "https://schema.data-catalog.acme.com";

/// Meta-schema declared by every catalog schema document.
const JSON_SCHEMA_DRAFT: &str = "https://json-schema.org/draft-07/schema";

/// A resource could not be turned into catalog records.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{schema} response has no {key:?} array and is not a single record")]
    MissingEnvelope {
        schema: &'static str,
        key: &'static str,
    },

    #[error("{schema} record {index} is invalid: {source}")]
    InvalidRecord {
        schema: &'static str,
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Catalog schemas with a typed definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogSchema {
    XeroInvoice,
    XeroContact,
}

impl CatalogSchema {
    /// Find the schema registered under a record name, if any.
    pub fn for_record_name(record_name: &str) -> Option<Self> {
        match record_name {
            "xeroInvoice" => Some(CatalogSchema::XeroInvoice),
            "xeroContact" => Some(CatalogSchema::XeroContact),
            _ => None,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            CatalogSchema::XeroInvoice => "xeroInvoice",
            CatalogSchema::XeroContact => "xeroContact",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            CatalogSchema::XeroInvoice => {
                "An invoice record from Xero containing details about the transaction, line items, \
                 customer information, payment status and financial amounts."
            }
            CatalogSchema::XeroContact => {
                "A contact record from Xero representing either a customer or supplier, containing \
                 their contact details, addresses, tax information and other metadata."
            }
        }
    }

    pub fn schema_id(self) -> String {
        format!("{}/{}.schema.json", SCHEMA_BASE_URL, self.title())
    }

    /// Key of the array the Xero API wraps these records in.
    fn envelope_key(self) -> &'static str {
        match self {
            CatalogSchema::XeroInvoice => "Invoices",
            CatalogSchema::XeroContact => "Contacts",
        }
    }

    /// Key that identifies a bare (unwrapped) record.
    fn id_key(self) -> &'static str {
        match self {
            CatalogSchema::XeroInvoice => "InvoiceID",
            CatalogSchema::XeroContact => "ContactID",
        }
    }

    /// The JSON Schema document registered with the catalog for this record.
    pub fn json_schema(self) -> Value {
        match self {
            CatalogSchema::XeroInvoice => self.document::<XeroInvoice>(),
            CatalogSchema::XeroContact => self.document::<XeroContact>(),
        }
    }

    fn document<T: JsonSchema>(self) -> Value {
        let mut document = match serde_json::to_value(schema_for!(T)) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };

        document.insert("$schema".into(), JSON_SCHEMA_DRAFT.into());
        document.insert("$id".into(), self.schema_id().into());
        document.insert("title".into(), self.title().into());
        document.insert("description".into(), self.description().into());

        Value::Object(document)
    }

    /// Validate an API response and convert its records to catalog form.
    pub fn extract(self, resource: &Value) -> Result<Vec<Value>, CatalogError> {
        match self {
            CatalogSchema::XeroInvoice => self.extract_as::<XeroInvoice>(resource),
            CatalogSchema::XeroContact => self.extract_as::<XeroContact>(resource),
        }
    }

    fn extract_as<T>(self, resource: &Value) -> Result<Vec<Value>, CatalogError>
    where
        T: DeserializeOwned + Serialize,
    {
        let items: Vec<&Value> = match resource.get(self.envelope_key()) {
            Some(Value::Array(items)) => items.iter().collect(),
            _ if resource.get(self.id_key()).is_some() => vec![resource],
            _ => {
                return Err(CatalogError::MissingEnvelope {
                    schema: self.title(),
                    key: self.envelope_key(),
                })
            }
        };

        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let invalid = |source| CatalogError::InvalidRecord {
                    schema: self.title(),
                    index,
                    source,
                };
                let record: T = T::deserialize(item).map_err(invalid)?;
                serde_json::to_value(record).map_err(invalid)
            })
            .collect()
    }
}

/// Records for `record_name` extracted from `resource`.
///
/// Record names without a typed schema are relayed as the raw resource.
pub fn extract_records(record_name: &str, resource: &Value) -> Result<Vec<Value>, CatalogError> {
    match CatalogSchema::for_record_name(record_name) {
        Some(schema) => schema.extract(resource),
        None => Ok(vec![resource.clone()]),
    }
}

/// Accept a string, number or boolean where the catalog stores text.
///
/// The API sends amounts and flags as JSON numbers/booleans; the catalog
/// keeps them as strings.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a string, number or boolean, found {other}"
        ))),
    }
}
