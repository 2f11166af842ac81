//! Invoice CRUD, status transitions, PDF download, and delivery.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use base64::Engine;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use invoica_shared::money::{Adjustment, InvoiceTotals};
use invoica_shared::types::InvoiceStatus;
use invoica_store::{Invoice, InvoiceItem, Profile};

use crate::api::AppState;
use crate::auth::AuthUser;
use crate::blob_store::sniff_content_type;
use crate::error::ApiError;
use crate::notify::Attachment;
use crate::pdf::template::{invoice_html, InvoiceImages};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub quantity: f64,
    pub rate: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRequest {
    #[serde(default)]
    pub customer_id: Option<Uuid>,
    pub invoice_number: String,
    pub issue_date: NaiveDate,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub payment_terms: Option<String>,
    #[serde(default)]
    pub bill_to_name: Option<String>,
    #[serde(default)]
    pub bill_to_email: Option<String>,
    #[serde(default)]
    pub bill_to_address: Option<String>,
    #[serde(default = "Adjustment::zero")]
    pub discount: Adjustment,
    #[serde(default = "Adjustment::zero")]
    pub tax: Adjustment,
    #[serde(default = "Adjustment::zero")]
    pub shipping: Adjustment,
    #[serde(default)]
    pub notes: Option<String>,
    pub items: Vec<ItemRequest>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    pub status: InvoiceStatus,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    /// Recipient override; defaults to the invoice's billing email.
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    /// Phone number to notify by SMS, if any.
    #[serde(default)]
    pub sms_to: Option<String>,
}

/// An invoice with its line items and the computed totals, the shape every
/// invoice endpoint returns.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResponse {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
    pub totals: InvoiceTotals,
}

impl InvoiceResponse {
    fn new(invoice: Invoice, items: Vec<InvoiceItem>) -> Self {
        let totals = invoice.totals(&items).rounded();
        Self {
            invoice,
            items,
            totals,
        }
    }
}

impl InvoiceRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.invoice_number.trim().is_empty() {
            return Err(ApiError::BadRequest(
                "Invoice number must not be empty".to_string(),
            ));
        }
        if self.items.is_empty() {
            return Err(ApiError::BadRequest(
                "An invoice needs at least one line item".to_string(),
            ));
        }
        for item in &self.items {
            if item.name.trim().is_empty() {
                return Err(ApiError::BadRequest(
                    "Line item name must not be empty".to_string(),
                ));
            }
            if item.quantity < 0.0 || item.rate < 0.0 {
                return Err(ApiError::BadRequest(
                    "Line item quantity and rate must not be negative".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn items_for(&self, invoice_id: Uuid) -> Vec<InvoiceItem> {
        self.items
            .iter()
            .enumerate()
            .map(|(position, item)| InvoiceItem {
                id: Uuid::new_v4(),
                invoice_id,
                name: item.name.trim().to_string(),
                description: item.description.clone(),
                quantity: item.quantity,
                rate: item.rate,
                position: position as i64,
            })
            .collect()
    }
}

pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<InvoiceResponse>>, ApiError> {
    let db = state.store.lock().await;
    let invoices = db.list_invoices(user.id)?;
    let mut out = Vec::with_capacity(invoices.len());
    for invoice in invoices {
        let items = db.get_invoice_items(invoice.id)?;
        out.push(InvoiceResponse::new(invoice, items));
    }
    Ok(Json(out))
}

pub async fn get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let db = state.store.lock().await;
    let invoice = db.get_invoice(user.id, id)?;
    let items = db.get_invoice_items(invoice.id)?;
    Ok(Json(InvoiceResponse::new(invoice, items)))
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<InvoiceRequest>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    req.validate()?;

    let mut db = state.store.lock().await;

    // Billing details are snapshots: explicit request fields win, then the
    // referenced customer, so later customer edits do not rewrite history.
    let customer = match req.customer_id {
        Some(customer_id) => Some(db.get_customer(user.id, customer_id)?),
        None => None,
    };
    let bill_to_name = req
        .bill_to_name
        .clone()
        .or_else(|| customer.as_ref().map(|c| c.name.clone()))
        .ok_or_else(|| {
            ApiError::BadRequest("Either billToName or customerId is required".to_string())
        })?;
    let bill_to_email = req
        .bill_to_email
        .clone()
        .or_else(|| customer.as_ref().and_then(|c| c.email.clone()));
    let bill_to_address = req
        .bill_to_address
        .clone()
        .or_else(|| customer.as_ref().map(|c| c.address_oneline()))
        .filter(|a| !a.is_empty());

    let profile = db.get_profile(user.id)?;
    let now = Utc::now();
    let invoice = Invoice {
        id: Uuid::new_v4(),
        user_id: user.id,
        customer_id: req.customer_id,
        invoice_number: req.invoice_number.trim().to_string(),
        status: InvoiceStatus::Draft,
        issue_date: req.issue_date,
        due_date: req.due_date,
        currency: req.currency.clone().unwrap_or_else(|| profile.currency.clone()),
        payment_method: req.payment_method.clone(),
        payment_terms: req.payment_terms.clone(),
        bill_to_name,
        bill_to_email,
        bill_to_address,
        from_name: profile.company_name.clone(),
        from_email: Some(user.email.clone()),
        from_address: Some(profile.address_oneline()).filter(|a| !a.is_empty()),
        discount: req.discount,
        tax: req.tax,
        shipping: req.shipping,
        notes: req.notes.clone(),
        created_at: now,
        updated_at: now,
    };
    let items = req.items_for(invoice.id);

    db.create_invoice(&invoice, &items)?;
    info!(user = %user.id, invoice = %invoice.id, number = %invoice.invoice_number, "invoice created");
    Ok(Json(InvoiceResponse::new(invoice, items)))
}

pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<InvoiceRequest>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    req.validate()?;

    let mut db = state.store.lock().await;
    let existing = db.get_invoice(user.id, id)?;
    let items = req.items_for(existing.id);

    let invoice = Invoice {
        customer_id: req.customer_id,
        invoice_number: req.invoice_number.trim().to_string(),
        issue_date: req.issue_date,
        due_date: req.due_date,
        currency: req.currency.unwrap_or(existing.currency.clone()),
        payment_method: req.payment_method,
        payment_terms: req.payment_terms,
        bill_to_name: req.bill_to_name.unwrap_or(existing.bill_to_name.clone()),
        bill_to_email: req.bill_to_email.or(existing.bill_to_email.clone()),
        bill_to_address: req.bill_to_address.or(existing.bill_to_address.clone()),
        discount: req.discount,
        tax: req.tax,
        shipping: req.shipping,
        notes: req.notes,
        updated_at: Utc::now(),
        ..existing
    };

    db.update_invoice(&invoice, &items)?;
    Ok(Json(InvoiceResponse::new(invoice, items)))
}

pub async fn set_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let db = state.store.lock().await;
    db.update_invoice_status(user.id, id, req.status)?;
    let invoice = db.get_invoice(user.id, id)?;
    let items = db.get_invoice_items(invoice.id)?;
    info!(user = %user.id, invoice = %id, status = %req.status.as_str(), "invoice status changed");
    Ok(Json(InvoiceResponse::new(invoice, items)))
}

pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted = state.store.lock().await.delete_invoice(user.id, id)?;
    if !deleted {
        return Err(ApiError::NotFound("invoice not found".to_string()));
    }
    info!(user = %user.id, invoice = %id, "invoice deleted");
    Ok(Json(serde_json::json!({ "deleted": true })))
}

pub async fn download_pdf(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (pdf, invoice_number) = render_invoice_pdf(&state, &user, id).await?;

    let disposition = format!("attachment; filename=\"{invoice_number}.pdf\"");
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        pdf,
    ))
}

/// Email the invoice as a PDF attachment (optionally with an SMS heads-up)
/// and move it from DRAFT to SENT.
pub async fn send(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<SendRequest>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let (invoice, items, profile) = load_invoice(&state, &user, id).await?;

    let to = req
        .email
        .clone()
        .or_else(|| invoice.bill_to_email.clone())
        .ok_or_else(|| {
            ApiError::BadRequest("Invoice has no billing email address".to_string())
        })?;

    let pdf = render_pdf(&state, &user, &invoice, &items, &profile).await?;
    let totals = invoice.totals(&items).rounded();

    let from = invoice
        .from_name
        .clone()
        .unwrap_or_else(|| user.email.clone());
    let subject = format!("Invoice {} from {}", invoice.invoice_number, from);
    let body = req.message.clone().unwrap_or_else(|| {
        format!(
            "<p>Please find invoice {} attached.</p><p>Amount due: {} {:.2}</p>",
            invoice.invoice_number, invoice.currency, totals.total
        )
    });

    state
        .mailer
        .send(
            &to,
            &subject,
            &body,
            vec![Attachment {
                filename: format!("{}.pdf", invoice.invoice_number),
                content_type: "application/pdf".to_string(),
                bytes: pdf,
            }],
        )
        .await?;

    if let Some(sms_to) = &req.sms_to {
        let text = format!(
            "Invoice {} for {} {:.2} has been sent to {}.",
            invoice.invoice_number, invoice.currency, totals.total, to
        );
        state.texter.send(sms_to, &text).await?;
    }

    let db = state.store.lock().await;
    if invoice.status == InvoiceStatus::Draft {
        db.update_invoice_status(user.id, id, InvoiceStatus::Sent)?;
    }
    let invoice = db.get_invoice(user.id, id)?;
    let items = db.get_invoice_items(invoice.id)?;

    info!(user = %user.id, invoice = %id, to = %to, "invoice sent");
    Ok(Json(InvoiceResponse::new(invoice, items)))
}

async fn load_invoice(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> Result<(Invoice, Vec<InvoiceItem>, Profile), ApiError> {
    let db = state.store.lock().await;
    let invoice = db.get_invoice(user.id, id)?;
    let items = db.get_invoice_items(invoice.id)?;
    let profile = db.get_profile(user.id)?;
    Ok((invoice, items, profile))
}

async fn render_invoice_pdf(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> Result<(Vec<u8>, String), ApiError> {
    let (invoice, items, profile) = load_invoice(state, user, id).await?;
    let number = invoice.invoice_number.clone();
    let pdf = render_pdf(state, user, &invoice, &items, &profile).await?;
    Ok((pdf, number))
}

async fn render_pdf(
    state: &AppState,
    user: &AuthUser,
    invoice: &Invoice,
    items: &[InvoiceItem],
    profile: &Profile,
) -> Result<Vec<u8>, ApiError> {
    let images = InvoiceImages {
        logo: image_data_url(state, profile.logo_blob_id).await,
        signature: image_data_url(state, profile.signature_blob_id).await,
    };
    let html = invoice_html(invoice, items, profile, &images);
    let pdf = state.pdf.render(html).await?;
    info!(user = %user.id, invoice = %invoice.id, bytes = pdf.len(), "invoice PDF rendered");
    Ok(pdf)
}

/// Inline an uploaded image as a data URL; a missing blob just drops the
/// image from the document.
async fn image_data_url(state: &AppState, blob_id: Option<Uuid>) -> Option<String> {
    let id = blob_id?;
    match state.blob_store.get_blob(id).await {
        Ok(data) => {
            let mime = sniff_content_type(&data);
            let encoded = base64::engine::general_purpose::STANDARD.encode(&data);
            Some(format!("data:{mime};base64,{encoded}"))
        }
        Err(_) => {
            tracing::warn!(blob = %id, "referenced image blob is unavailable");
            None
        }
    }
}
