//! `xeroContact` catalog record (customer domain).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A customer or supplier contact from Xero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct XeroContact {
    #[serde(alias = "ContactID")]
    pub contact_id: String,
    #[serde(alias = "ContactStatus")]
    pub contact_status: String,
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(default, alias = "FirstName")]
    pub first_name: Option<String>,
    #[serde(default, alias = "LastName")]
    pub last_name: Option<String>,
    #[serde(default, alias = "CompanyNumber")]
    pub company_number: Option<String>,
    #[serde(default, alias = "EmailAddress")]
    pub email_address: Option<String>,
    #[serde(default, alias = "BankAccountDetails")]
    pub bank_account_details: Option<String>,
    #[serde(default, alias = "TaxNumber")]
    pub tax_number: Option<String>,
    #[serde(default, alias = "AccountsReceivableTaxType")]
    pub accounts_receivable_tax_type: Option<String>,
    #[serde(default, alias = "AccountsPayableTaxType")]
    pub accounts_payable_tax_type: Option<String>,
    #[serde(default, alias = "Addresses")]
    pub addresses: Option<Vec<ContactAddress>>,
    #[serde(default, alias = "Phones")]
    pub phones: Option<Vec<Phone>>,
    #[serde(default, rename = "updatedDateUTC", alias = "UpdatedDateUTC")]
    pub updated_date_utc: Option<String>,
    #[serde(default, alias = "IsSupplier")]
    pub is_supplier: Option<bool>,
    #[serde(default, alias = "IsCustomer")]
    pub is_customer: Option<bool>,
    #[serde(default, alias = "DefaultCurrency")]
    pub default_currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactAddress {
    #[serde(default, alias = "AddressType")]
    pub address_type: Option<String>,
    #[serde(default, alias = "AddressLine1")]
    pub address_line1: Option<String>,
    #[serde(default, alias = "City")]
    pub city: Option<String>,
    #[serde(default, alias = "PostalCode")]
    pub postal_code: Option<String>,
    #[serde(default, alias = "AttentionTo")]
    pub attention_to: Option<String>,
}

/// A phone number; shared by contacts and invoice contact summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Phone {
    #[serde(default, alias = "PhoneType")]
    pub phone_type: Option<String>,
    #[serde(default, alias = "PhoneNumber")]
    pub phone_number: Option<String>,
    #[serde(default, alias = "PhoneAreaCode")]
    pub phone_area_code: Option<String>,
    #[serde(default, alias = "PhoneCountryCode")]
    pub phone_country_code: Option<String>,
}
