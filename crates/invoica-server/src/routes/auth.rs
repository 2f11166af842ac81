//! Registration, login, and the password reset flow.

use axum::extract::State;
use axum::Json;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use invoica_shared::constants::RESET_TOKEN_TTL_MINUTES;
use invoica_shared::types::UserRole;
use invoica_store::{PasswordReset, Profile, StoreError, User};

use crate::api::AppState;
use crate::auth::{self, AuthUser};
use crate::error::ApiError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: Uuid,
    pub password: String,
}

fn validate_credentials(email: &str, password: &str) -> Result<(), ApiError> {
    if !email.contains('@') || email.len() < 3 {
        return Err(ApiError::BadRequest("Invalid email address".to_string()));
    }
    if password.len() < 8 {
        return Err(ApiError::BadRequest(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    Ok(())
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let email = req.email.trim().to_lowercase();
    validate_credentials(&email, &req.password)?;

    let user = User {
        id: Uuid::new_v4(),
        email,
        password_hash: auth::hash_password(&req.password)?,
        role: UserRole::User,
        created_at: Utc::now(),
    };

    {
        let db = state.store.lock().await;
        db.create_user(&user)?;
        db.upsert_profile(&Profile::empty(user.id))?;
    }

    let token = auth::issue_token(&state.config, &user)?;
    info!(user = %user.id, "user registered");

    Ok(Json(AuthResponse { token, user }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let email = req.email.trim().to_lowercase();

    // One generic message for both unknown email and bad password.
    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = match state.store.lock().await.get_user_by_email(&email) {
        Ok(user) => user,
        Err(StoreError::NotFound) => return Err(invalid()),
        Err(e) => return Err(e.into()),
    };

    if !auth::verify_password(&user.password_hash, &req.password) {
        return Err(invalid());
    }

    let token = auth::issue_token(&state.config, &user)?;
    info!(user = %user.id, "user logged in");

    Ok(Json(AuthResponse { token, user }))
}

pub async fn me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<User>, ApiError> {
    let user = state.store.lock().await.get_user(auth_user.id)?;
    Ok(Json(user))
}

/// Always answers with the same message so the endpoint cannot be used to
/// probe which emails are registered.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let email = req.email.trim().to_lowercase();
    let response = Json(serde_json::json!({
        "message": "If that email is registered, a reset link has been sent."
    }));

    let known = {
        let db = state.store.lock().await;
        match db.get_user_by_email(&email) {
            Ok(_) => {
                let reset = PasswordReset {
                    token: Uuid::new_v4(),
                    email: email.clone(),
                    expires_at: Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES),
                    used: false,
                };
                db.create_password_reset(&reset)?;
                Some(reset.token)
            }
            Err(StoreError::NotFound) => None,
            Err(e) => return Err(e.into()),
        }
    };

    if let Some(token) = known {
        let link = format!("{}/reset-password?token={}", state.config.app_base_url, token);
        let body = format!(
            "<p>A password reset was requested for your account.</p>\
             <p><a href=\"{link}\">Reset your password</a> \
             (valid for {RESET_TOKEN_TTL_MINUTES} minutes).</p>\
             <p>If you did not request this, you can ignore this email.</p>"
        );
        if let Err(e) = state
            .mailer
            .send(&email, "Password reset", &body, Vec::new())
            .await
        {
            // The caller still gets the generic answer.
            warn!(error = %e, "failed to send reset email");
        }
    }

    Ok(response)
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if req.password.len() < 8 {
        return Err(ApiError::BadRequest(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let invalid = || ApiError::BadRequest("Invalid or expired reset token".to_string());

    let db = state.store.lock().await;
    let reset = match db.get_password_reset(req.token) {
        Ok(reset) => reset,
        Err(StoreError::NotFound) => return Err(invalid()),
        Err(e) => return Err(e.into()),
    };

    if reset.used || reset.is_expired(Utc::now()) {
        return Err(invalid());
    }

    let user = match db.get_user_by_email(&reset.email) {
        Ok(user) => user,
        // Account deleted after the token was issued.
        Err(StoreError::NotFound) => return Err(invalid()),
        Err(e) => return Err(e.into()),
    };

    db.update_user_password(user.id, &auth::hash_password(&req.password)?)?;
    db.mark_password_reset_used(req.token)?;

    info!(user = %user.id, "password reset completed");
    Ok(Json(serde_json::json!({ "reset": true })))
}
