//! Customer CRUD. Every query is scoped to the authenticated user.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use invoica_store::Customer;

use crate::api::AppState;
use crate::auth::AuthUser;
use crate::error::ApiError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRequest {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
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
}

impl CustomerRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::BadRequest(
                "Customer name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Customer>>, ApiError> {
    let customers = state.store.lock().await.list_customers(user.id)?;
    Ok(Json(customers))
}

pub async fn get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Customer>, ApiError> {
    let customer = state.store.lock().await.get_customer(user.id, id)?;
    Ok(Json(customer))
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CustomerRequest>,
) -> Result<Json<Customer>, ApiError> {
    req.validate()?;
    let now = Utc::now();
    let customer = Customer {
        id: Uuid::new_v4(),
        user_id: user.id,
        name: req.name.trim().to_string(),
        email: req.email,
        phone: req.phone,
        address_line1: req.address_line1,
        address_line2: req.address_line2,
        city: req.city,
        state: req.state,
        postal_code: req.postal_code,
        country: req.country,
        created_at: now,
        updated_at: now,
    };

    state.store.lock().await.create_customer(&customer)?;
    info!(user = %user.id, customer = %customer.id, "customer created");
    Ok(Json(customer))
}

pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<CustomerRequest>,
) -> Result<Json<Customer>, ApiError> {
    req.validate()?;

    let db = state.store.lock().await;
    let existing = db.get_customer(user.id, id)?;
    let customer = Customer {
        name: req.name.trim().to_string(),
        email: req.email,
        phone: req.phone,
        address_line1: req.address_line1,
        address_line2: req.address_line2,
        city: req.city,
        state: req.state,
        postal_code: req.postal_code,
        country: req.country,
        updated_at: Utc::now(),
        ..existing
    };

    db.update_customer(&customer)?;
    Ok(Json(customer))
}

pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted = state.store.lock().await.delete_customer(user.id, id)?;
    if !deleted {
        return Err(ApiError::NotFound("customer not found".to_string()));
    }
    info!(user = %user.id, customer = %id, "customer deleted");
    Ok(Json(serde_json::json!({ "deleted": true })))
}
