//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be returned
//! directly from the REST layer; field names are camelCased on the wire.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use invoica_shared::money::{Adjustment, InvoiceTotals};
use invoica_shared::types::{InvoiceStatus, UserRole};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// An authentication identity. The password hash never leaves the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user identifier.
    pub id: Uuid,
    /// Login email, unique across tenants.
    pub email: String,
    /// Argon2 PHC hash string.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Authorization role.
    pub role: UserRole,
    /// When the account was registered.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// Business/contact details used for invoice headers and payment
/// instructions. One per user, created empty at registration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub user_id: Uuid,
    pub company_name: Option<String>,
    pub phone: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    /// Preferred invoice currency (ISO 4217).
    pub currency: String,
    pub bank_name: Option<String>,
    pub account_name: Option<String>,
    pub account_number: Option<String>,
    pub clover_api_key: Option<String>,
    pub clover_merchant_id: Option<String>,
    /// Blob store id of the uploaded logo image.
    pub logo_blob_id: Option<Uuid>,
    /// Blob store id of the uploaded signature image.
    pub signature_blob_id: Option<Uuid>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Empty profile for a freshly registered user.
    pub fn empty(user_id: Uuid) -> Self {
        Self {
            user_id,
            company_name: None,
            phone: None,
            address_line1: None,
            address_line2: None,
            city: None,
            state: None,
            postal_code: None,
            country: None,
            currency: invoica_shared::constants::DEFAULT_CURRENCY.to_string(),
            bank_name: None,
            account_name: None,
            account_number: None,
            clover_api_key: None,
            clover_merchant_id: None,
            logo_blob_id: None,
            signature_blob_id: None,
            updated_at: Utc::now(),
        }
    }

    /// Single-line postal address for invoice headers.
    pub fn address_oneline(&self) -> String {
        [
            self.address_line1.as_deref(),
            self.address_line2.as_deref(),
            self.city.as_deref(),
            self.state.as_deref(),
            self.postal_code.as_deref(),
            self.country.as_deref(),
        ]
        .iter()
        .flatten()
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
    }
}

// ---------------------------------------------------------------------------
// Customer
// ---------------------------------------------------------------------------

/// A billing contact owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Single-line postal address for invoice snapshots.
    pub fn address_oneline(&self) -> String {
        [
            self.address_line1.as_deref(),
            self.address_line2.as_deref(),
            self.city.as_deref(),
            self.state.as_deref(),
            self.postal_code.as_deref(),
            self.country.as_deref(),
        ]
        .iter()
        .flatten()
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
    }
}

// ---------------------------------------------------------------------------
// Invoice
// ---------------------------------------------------------------------------

/// The billing document. `bill_to_*` / `from_*` are snapshots copied from
/// the customer and profile at creation time, not live joins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: Uuid,
    pub user_id: Uuid,
    pub customer_id: Option<Uuid>,
    /// Unique per tenant.
    pub invoice_number: String,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub currency: String,
    pub payment_method: Option<String>,
    pub payment_terms: Option<String>,
    pub bill_to_name: String,
    pub bill_to_email: Option<String>,
    pub bill_to_address: Option<String>,
    pub from_name: Option<String>,
    pub from_email: Option<String>,
    pub from_address: Option<String>,
    pub discount: Adjustment,
    pub tax: Adjustment,
    pub shipping: Adjustment,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Run the totals pipeline over this invoice's line items.
    pub fn totals(&self, items: &[InvoiceItem]) -> InvoiceTotals {
        InvoiceTotals::compute(
            items.iter().map(|i| (i.quantity, i.rate)),
            self.discount,
            self.tax,
            self.shipping,
        )
    }
}

/// A line item. The amount is always `quantity * rate`, recomputed on read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub quantity: f64,
    pub rate: f64,
    /// Display order within the invoice.
    pub position: i64,
}

impl InvoiceItem {
    pub fn amount(&self) -> f64 {
        self.quantity * self.rate
    }
}

// ---------------------------------------------------------------------------
// CloverIntegration
// ---------------------------------------------------------------------------

/// Per-user Clover OAuth credential record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CloverIntegration {
    pub user_id: Uuid,
    pub merchant_id: String,
    #[serde(skip_serializing, default)]
    pub access_token: String,
    #[serde(skip_serializing, default)]
    pub refresh_token: String,
    pub token_expiry: DateTime<Utc>,
}

impl CloverIntegration {
    /// Whether the stored access token has expired as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.token_expiry <= now
    }
}

// ---------------------------------------------------------------------------
// PasswordReset
// ---------------------------------------------------------------------------

/// One-time password reset token. Consumed by flagging, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PasswordReset {
    pub token: Uuid,
    pub email: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

impl PasswordReset {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_amount_is_quantity_times_rate() {
        let item = InvoiceItem {
            id: Uuid::new_v4(),
            invoice_id: Uuid::new_v4(),
            name: "Design work".into(),
            description: None,
            quantity: 2.5,
            rate: 80.0,
            position: 0,
        };
        assert_eq!(item.amount(), 200.0);
    }

    #[test]
    fn integration_expiry() {
        let now = Utc::now();
        let fresh = CloverIntegration {
            user_id: Uuid::new_v4(),
            merchant_id: "M123".into(),
            access_token: "at".into(),
            refresh_token: "rt".into(),
            token_expiry: now + chrono::Duration::minutes(5),
        };
        assert!(!fresh.is_expired(now));
        assert!(fresh.is_expired(now + chrono::Duration::minutes(5)));
    }

    #[test]
    fn profile_address_skips_empty_fields() {
        let mut profile = Profile::empty(Uuid::new_v4());
        profile.address_line1 = Some("1 Main St".into());
        profile.city = Some("Springfield".into());
        assert_eq!(profile.address_oneline(), "1 Main St, Springfield");
    }
}
