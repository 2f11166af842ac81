//! Clover OAuth connection endpoints and payment-link minting.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::AppState;
use crate::auth::AuthUser;
use crate::clover::PaymentLink;
use crate::error::ApiError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResponse {
    pub url: String,
}

/// Query string Clover appends when redirecting back to us.
#[derive(Deserialize)]
pub struct CallbackParams {
    pub code: String,
    /// The user id we placed in the authorize URL.
    pub state: Uuid,
    #[serde(default, alias = "merchantId")]
    pub merchant_id: Option<String>,
    #[serde(default, alias = "clientId")]
    pub client_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_expiry: Option<DateTime<Utc>>,
}

pub async fn connect(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ConnectResponse>, ApiError> {
    let url = state.clover.authorize_url(user.id)?;
    Ok(Json(ConnectResponse { url }))
}

/// The browser arrives here from Clover without a bearer token; the `state`
/// parameter carries the user id minted in [`connect`].
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<StatusResponse>, ApiError> {
    // The state value must name a real account before we touch the provider.
    state
        .store
        .lock()
        .await
        .get_user(params.state)
        .map_err(|_| ApiError::Unauthorized("unrecognized OAuth state".to_string()))?;

    let integration = state
        .clover
        .handle_callback(
            params.state,
            &params.code,
            params.merchant_id,
            params.client_id,
        )
        .await?;

    Ok(Json(StatusResponse {
        connected: true,
        merchant_id: Some(integration.merchant_id),
        token_expiry: Some(integration.token_expiry),
    }))
}

pub async fn status(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<StatusResponse>, ApiError> {
    let response = match state.clover.integration_status(user.id).await? {
        Some(integration) => StatusResponse {
            connected: true,
            merchant_id: Some(integration.merchant_id),
            token_expiry: Some(integration.token_expiry),
        },
        None => StatusResponse {
            connected: false,
            merchant_id: None,
            token_expiry: None,
        },
    };
    Ok(Json(response))
}

/// Mint a hosted checkout link for the invoice's grand total.
pub async fn payment_link(
    State(state): State<AppState>,
    user: AuthUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<PaymentLink>, ApiError> {
    let (invoice, items) = {
        let db = state.store.lock().await;
        let invoice = db.get_invoice(user.id, invoice_id)?;
        let items = db.get_invoice_items(invoice.id)?;
        (invoice, items)
    };

    let total = invoice.totals(&items).total;
    if total <= 0.0 {
        return Err(ApiError::BadRequest(
            "Invoice total must be positive to create a payment link".to_string(),
        ));
    }

    let description = format!("Invoice {}", invoice.invoice_number);
    let link = state
        .clover
        .payment_link(
            user.id,
            total,
            &invoice.currency,
            &description,
            invoice.bill_to_email.clone(),
        )
        .await?;

    Ok(Json(link))
}

pub async fn disconnect(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.clover.disconnect(user.id).await?;
    Ok(Json(serde_json::json!({ "disconnected": true })))
}
