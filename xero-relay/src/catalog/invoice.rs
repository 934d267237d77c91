//! `xeroInvoice` catalog record (finance domain).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::lenient_string;

/// An invoice record from Xero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct XeroInvoice {
    #[serde(alias = "InvoiceID")]
    pub invoice_id: String,
    #[serde(alias = "InvoiceNumber")]
    pub invoice_number: String,
    #[serde(default, alias = "Type")]
    pub r#type: Option<String>,
    #[serde(default, alias = "Contact")]
    pub contact: Option<InvoiceContact>,
    #[serde(default, alias = "Date")]
    pub date: Option<String>,
    #[serde(default, alias = "DateString")]
    pub date_string: Option<String>,
    #[serde(default, alias = "DueDate")]
    pub due_date: Option<String>,
    #[serde(default, alias = "DueDateString")]
    pub due_date_string: Option<String>,
    #[serde(default, alias = "Status")]
    pub status: Option<String>,
    #[serde(default, alias = "LineAmountTypes")]
    pub line_amount_types: Option<String>,
    #[serde(default, alias = "LineItems")]
    pub line_items: Option<Vec<LineItem>>,
    #[serde(default, alias = "SubTotal", deserialize_with = "lenient_string")]
    pub sub_total: Option<String>,
    #[serde(default, alias = "TotalTax", deserialize_with = "lenient_string")]
    pub total_tax: Option<String>,
    #[serde(default, alias = "Total", deserialize_with = "lenient_string")]
    pub total: Option<String>,
    #[serde(default, rename = "updatedDateUTC", alias = "UpdatedDateUTC")]
    pub updated_date_utc: Option<String>,
    #[serde(default, alias = "CurrencyCode")]
    pub currency_code: Option<String>,
    #[serde(default, alias = "Payments")]
    pub payments: Option<Vec<Payment>>,
    #[serde(default, alias = "AmountDue", deserialize_with = "lenient_string")]
    pub amount_due: Option<String>,
    #[serde(default, alias = "AmountPaid", deserialize_with = "lenient_string")]
    pub amount_paid: Option<String>,
    #[serde(default, alias = "AmountCredited", deserialize_with = "lenient_string")]
    pub amount_credited: Option<String>,
}

/// The contact summary embedded in an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceContact {
    #[serde(default, alias = "ContactID")]
    pub contact_id: Option<String>,
    #[serde(default, alias = "ContactStatus")]
    pub contact_status: Option<String>,
    #[serde(default, alias = "Name")]
    pub name: Option<String>,
    #[serde(default, alias = "Addresses")]
    pub addresses: Option<Vec<InvoiceAddress>>,
    #[serde(default, alias = "Phones")]
    pub phones: Option<Vec<super::contact::Phone>>,
    #[serde(default, rename = "updatedDateUTC", alias = "UpdatedDateUTC")]
    pub updated_date_utc: Option<String>,
    #[serde(default, alias = "IsSupplier", deserialize_with = "lenient_string")]
    pub is_supplier: Option<String>,
    #[serde(default, alias = "IsCustomer", deserialize_with = "lenient_string")]
    pub is_customer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceAddress {
    #[serde(default, alias = "AddressType")]
    pub address_type: Option<String>,
    #[serde(default, alias = "AddressLine1")]
    pub address_line1: Option<String>,
    #[serde(default, alias = "AddressLine2")]
    pub address_line2: Option<String>,
    #[serde(default, alias = "City")]
    pub city: Option<String>,
    #[serde(default, alias = "PostalCode")]
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(default, alias = "ItemCode")]
    pub item_code: Option<String>,
    #[serde(default, alias = "Description")]
    pub description: Option<String>,
    #[serde(default, alias = "Quantity", deserialize_with = "lenient_string")]
    pub quantity: Option<String>,
    #[serde(default, alias = "UnitAmount", deserialize_with = "lenient_string")]
    pub unit_amount: Option<String>,
    #[serde(default, alias = "TaxType")]
    pub tax_type: Option<String>,
    #[serde(default, alias = "TaxAmount", deserialize_with = "lenient_string")]
    pub tax_amount: Option<String>,
    #[serde(default, alias = "LineAmount", deserialize_with = "lenient_string")]
    pub line_amount: Option<String>,
    #[serde(default, alias = "AccountCode")]
    pub account_code: Option<String>,
    #[serde(default, alias = "AccountId", alias = "AccountID")]
    pub account_id: Option<String>,
    #[serde(default, alias = "Item")]
    pub item: Option<Item>,
    #[serde(default, alias = "Tracking")]
    pub tracking: Option<Vec<Tracking>>,
    #[serde(default, alias = "LineItemID")]
    pub line_item_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(default, alias = "ItemID")]
    pub item_id: Option<String>,
    #[serde(default, alias = "Name")]
    pub name: Option<String>,
    #[serde(default, alias = "Code")]
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Tracking {
    #[serde(default, alias = "TrackingCategoryID")]
    pub tracking_category_id: Option<String>,
    #[serde(default, alias = "Name")]
    pub name: Option<String>,
    #[serde(default, alias = "Option")]
    pub option: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(default, alias = "Date")]
    pub date: Option<String>,
    #[serde(default, alias = "Amount", deserialize_with = "lenient_string")]
    pub amount: Option<String>,
    #[serde(default, alias = "PaymentID")]
    pub payment_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_invoice_from_api_shape() {
        let invoice: XeroInvoice = serde_json::from_value(json!({
            "Type": "ACCREC",
            "InvoiceID": "243216c5-369e-4056-ac67-05388f86dc81",
            "InvoiceNumber": "OIT00546",
            "Contact": {
                "ContactID": "025867f1-d741-4d6b-b1af-9ac774b59ba7",
                "Name": "City Agency",
                "IsSupplier": false,
                "Addresses": [{"AddressType": "POBOX", "City": "Ridge Heights"}]
            },
            "Date": "/Date(1518685950940+0000)/",
            "Status": "AUTHORISED",
            "LineItems": [{
                "Description": "Onsite project management",
                "Quantity": 1.0,
                "UnitAmount": 1800.0,
                "AccountID": "a1b2",
                "Tracking": [{"TrackingCategoryID": "t1", "Name": "Region", "Option": "North"}]
            }],
            "Payments": [{"PaymentID": "p1", "Amount": 500}],
            "AmountDue": 1300.0,
            "UpdatedDateUTC": "/Date(1518685950940+0000)/"
        }))
        .unwrap();

        assert_eq!(invoice.invoice_number, "OIT00546");
        assert_eq!(invoice.r#type.as_deref(), Some("ACCREC"));

        let contact = invoice.contact.as_ref().unwrap();
        assert_eq!(contact.is_supplier.as_deref(), Some("false"));
        assert_eq!(
            contact.addresses.as_ref().unwrap()[0].city.as_deref(),
            Some("Ridge Heights")
        );

        let line = &invoice.line_items.as_ref().unwrap()[0];
        assert_eq!(line.unit_amount.as_deref(), Some("1800.0"));
        assert_eq!(line.account_id.as_deref(), Some("a1b2"));
        assert_eq!(line.tracking.as_ref().unwrap()[0].option.as_deref(), Some("North"));

        assert_eq!(invoice.payments.as_ref().unwrap()[0].amount.as_deref(), Some("500"));
    }

    #[test]
    fn test_invoice_catalog_keys() {
        let invoice: XeroInvoice = serde_json::from_value(json!({
            "InvoiceID": "i-1",
            "InvoiceNumber": "INV-1",
            "UpdatedDateUTC": "2024-01-01"
        }))
        .unwrap();

        let catalog = serde_json::to_value(&invoice).unwrap();
        assert_eq!(catalog["invoiceId"], "i-1");
        assert_eq!(catalog["updatedDateUTC"], "2024-01-01");
        assert_eq!(catalog["type"], serde_json::Value::Null);
    }

    #[test]
    fn test_invoice_requires_number() {
        let result: Result<XeroInvoice, _> =
            serde_json::from_value(json!({"InvoiceID": "i-1"}));
        assert!(result.is_err());
    }
}
