//! Business profile management and image uploads (logo, signature).

use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use invoica_store::Profile;

use crate::api::AppState;
use crate::auth::AuthUser;
use crate::blob_store::sniff_content_type;
use crate::error::ApiError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address_line1: Option<String>,
    #[serde(default)]
    pub address_line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub bank_name: Option<String>,
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
    #[serde(default)]
    pub clover_api_key: Option<String>,
    #[serde(default)]
    pub clover_merchant_id: Option<String>,
}

pub async fn get(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Profile>, ApiError> {
    let profile = state.store.lock().await.get_profile(user.id)?;
    Ok(Json(profile))
}

pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ProfileRequest>,
) -> Result<Json<Profile>, ApiError> {
    if let Some(currency) = &req.currency {
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ApiError::BadRequest(
                "Currency must be a 3-letter ISO 4217 code".to_string(),
            ));
        }
    }

    let db = state.store.lock().await;
    let existing = db.get_profile(user.id)?;
    let profile = Profile {
        company_name: req.company_name,
        phone: req.phone,
        address_line1: req.address_line1,
        address_line2: req.address_line2,
        city: req.city,
        state: req.state,
        postal_code: req.postal_code,
        country: req.country,
        currency: req
            .currency
            .map(|c| c.to_uppercase())
            .unwrap_or(existing.currency.clone()),
        bank_name: req.bank_name,
        account_name: req.account_name,
        account_number: req.account_number,
        clover_api_key: req.clover_api_key,
        clover_merchant_id: req.clover_merchant_id,
        updated_at: Utc::now(),
        ..existing
    };

    db.upsert_profile(&profile)?;
    info!(user = %user.id, "profile updated");
    Ok(Json(profile))
}

pub async fn upload_logo(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> Result<Json<Profile>, ApiError> {
    upload_image(state, user, multipart, ImageSlot::Logo).await
}

pub async fn upload_signature(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> Result<Json<Profile>, ApiError> {
    upload_image(state, user, multipart, ImageSlot::Signature).await
}

enum ImageSlot {
    Logo,
    Signature,
}

async fn upload_image(
    state: AppState,
    user: AuthUser,
    mut multipart: Multipart,
    slot: ImageSlot,
) -> Result<Json<Profile>, ApiError> {
    let mut data = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart error: {e}")))?
    {
        if field.name() == Some("file") {
            data = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read field: {e}")))?,
            );
            break;
        }
    }
    let data = data.ok_or_else(|| {
        ApiError::BadRequest("Missing 'file' field in multipart form".to_string())
    })?;

    if sniff_content_type(&data) == "application/octet-stream" {
        return Err(ApiError::BadRequest(
            "Unsupported image format (expected PNG, JPEG, GIF, or WebP)".to_string(),
        ));
    }

    let blob_id = state.blob_store.store_blob(&data).await?;

    let db = state.store.lock().await;
    let mut profile = db.get_profile(user.id)?;
    let previous = match slot {
        ImageSlot::Logo => profile.logo_blob_id.replace(blob_id),
        ImageSlot::Signature => profile.signature_blob_id.replace(blob_id),
    };
    profile.updated_at = Utc::now();
    db.upsert_profile(&profile)?;
    drop(db);

    // The old image is unreferenced now; losing the delete only leaks a file.
    if let Some(old) = previous {
        if let Err(e) = state.blob_store.delete_blob(old).await {
            warn!(blob = %old, error = %e, "failed to delete replaced image");
        }
    }

    info!(user = %user.id, blob = %blob_id, size = data.len(), "profile image uploaded");
    Ok(Json(profile))
}

/// Serve an uploaded image with a sniffed content type.
pub async fn get_blob(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let data = state.blob_store.get_blob(id).await?;
    let mime = sniff_content_type(&data);
    Ok(([(header::CONTENT_TYPE, mime)], data))
}
