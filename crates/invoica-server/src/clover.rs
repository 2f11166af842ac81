//! Clover OAuth token lifecycle and payment-link minting.
//!
//! The provider HTTP calls sit behind the [`CloverApi`] trait so the token
//! lifecycle can be tested without a network. Connection state machine:
//! disconnected -> pending-callback -> connected -> token-expired ->
//! connected (via refresh) -> disconnected.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;

use invoica_shared::constants::DEFAULT_TOKEN_EXPIRES_SECS;
use invoica_store::{CloverIntegration, StoreError};

use crate::api::Store;
use crate::config::ServerConfig;
use crate::error::ApiError;

/// Token endpoint response (authorization-code exchange and refresh).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Absent when the provider chooses not to rotate the refresh token.
    pub refresh_token: Option<String>,
    /// Seconds until `access_token` expires; defaults to one hour.
    pub expires_in: Option<i64>,
    /// Client id echoed back by the provider.
    pub client_id: Option<String>,
    pub merchant_id: Option<String>,
}

/// Checkout-creation request forwarded to the provider.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub description: String,
    pub customer_email: Option<String>,
}

/// Raw checkout-creation response.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutResponse {
    #[serde(alias = "checkoutSessionId")]
    pub id: String,
    pub status: Option<String>,
    #[serde(alias = "href")]
    pub url: String,
    pub created_time: Option<i64>,
    pub expiration_time: Option<i64>,
}

/// Normalized payment summary returned to API clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLink {
    pub id: String,
    /// Charged amount in major units, rounded to cents.
    pub amount: f64,
    pub currency: String,
    pub status: String,
    pub created_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub url: String,
}

/// Provider HTTP surface. Implemented by [`CloverHttpClient`] in production
/// and by a counting mock in tests.
#[async_trait]
pub trait CloverApi: Send + Sync {
    /// Exchange an authorization code for a token pair.
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, ApiError>;

    /// Exchange a refresh token for a new token pair.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, ApiError>;

    /// Create a hosted checkout for the given amount.
    async fn create_checkout(
        &self,
        merchant_id: &str,
        access_token: &str,
        request: &CheckoutRequest,
    ) -> Result<CheckoutResponse, ApiError>;
}

/// reqwest-backed [`CloverApi`] against the configured Clover hosts.
pub struct CloverHttpClient {
    client: reqwest::Client,
    config: Arc<ServerConfig>,
}

impl CloverHttpClient {
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Log a non-2xx provider response with its body and fold it into a
    /// generic upstream error. No retry, no backoff.
    async fn check(resp: reqwest::Response, what: &str) -> Result<reqwest::Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        error!(%status, body = %body, request = what, "Clover request failed");
        Err(ApiError::Upstream(format!("Clover {what} returned {status}")))
    }
}

#[async_trait]
impl CloverApi for CloverHttpClient {
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, ApiError> {
        let url = format!("{}/oauth/v2/token", self.config.clover_oauth_base);
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "client_id": self.config.clover_client_id,
                "client_secret": self.config.clover_client_secret,
                "code": code,
            }))
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("token exchange request failed: {e}")))?;

        Self::check(resp, "token exchange")
            .await?
            .json()
            .await
            .map_err(|e| ApiError::Upstream(format!("malformed token response: {e}")))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, ApiError> {
        let url = format!("{}/oauth/v2/refresh", self.config.clover_oauth_base);
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "client_id": self.config.clover_client_id,
                "refresh_token": refresh_token,
            }))
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("token refresh request failed: {e}")))?;

        Self::check(resp, "token refresh")
            .await?
            .json()
            .await
            .map_err(|e| ApiError::Upstream(format!("malformed refresh response: {e}")))
    }

    async fn create_checkout(
        &self,
        merchant_id: &str,
        access_token: &str,
        request: &CheckoutRequest,
    ) -> Result<CheckoutResponse, ApiError> {
        let url = format!(
            "{}/invoicingcheckoutservice/v1/checkouts",
            self.config.clover_api_base
        );
        let body = serde_json::json!({
            "customer": {
                "email": request.customer_email,
            },
            "shoppingCart": {
                "lineItems": [{
                    "name": request.description,
                    "price": request.amount_minor,
                    "unitQty": 1,
                }],
            },
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .header("X-Clover-Merchant-Id", merchant_id)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("checkout request failed: {e}")))?;

        Self::check(resp, "checkout creation")
            .await?
            .json()
            .await
            .map_err(|e| ApiError::Upstream(format!("malformed checkout response: {e}")))
    }
}

/// OAuth connection lifecycle and payment-link service.
pub struct CloverService {
    api: Arc<dyn CloverApi>,
    store: Store,
    config: Arc<ServerConfig>,
    /// Per-user single-flight guards so concurrent requests cannot race a
    /// token refresh (last-write-wins is not acceptable here).
    refresh_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl CloverService {
    pub fn new(api: Arc<dyn CloverApi>, store: Store, config: Arc<ServerConfig>) -> Self {
        Self {
            api,
            store,
            config,
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Authorization URL for the merchant to approve access. The user id
    /// rides along as `state` and authenticates the callback.
    pub fn authorize_url(&self, user_id: Uuid) -> Result<String, ApiError> {
        if !self.config.clover_enabled() {
            return Err(ApiError::BadRequest(
                "Clover integration is not configured".to_string(),
            ));
        }
        let url = reqwest::Url::parse_with_params(
            &format!("{}/oauth/v2/authorize", self.config.clover_oauth_base),
            &[
                ("client_id", self.config.clover_client_id.as_str()),
                ("redirect_uri", self.config.clover_redirect_uri.as_str()),
                ("response_type", "code"),
                ("state", &user_id.to_string()),
            ],
        )
        .map_err(|e| ApiError::Internal(format!("authorize URL construction failed: {e}")))?;
        Ok(url.to_string())
    }

    /// Complete the OAuth callback: validate the echoed client id, exchange
    /// the code, and persist the token pair (idempotent re-connect).
    pub async fn handle_callback(
        &self,
        user_id: Uuid,
        code: &str,
        merchant_id: Option<String>,
        echoed_client_id: Option<String>,
    ) -> Result<CloverIntegration, ApiError> {
        if let Some(ref echoed) = echoed_client_id {
            self.verify_client_id(echoed)?;
        }

        let resp = self.api.exchange_code(code).await?;

        // Providers echo the client id in the token response as well.
        if let Some(ref echoed) = resp.client_id {
            self.verify_client_id(echoed)?;
        }

        let merchant_id = merchant_id
            .or(resp.merchant_id.clone())
            .ok_or_else(|| ApiError::BadRequest("callback missing merchant_id".to_string()))?;

        let integration = CloverIntegration {
            user_id,
            merchant_id,
            access_token: resp.access_token,
            refresh_token: resp
                .refresh_token
                .ok_or_else(|| ApiError::Upstream("token response missing refresh_token".into()))?,
            token_expiry: expiry_from(resp.expires_in),
        };

        self.store
            .lock()
            .await
            .upsert_clover_integration(&integration)?;

        info!(user = %user_id, merchant = %integration.merchant_id, "Clover connected");
        Ok(integration)
    }

    /// Return an integration whose access token is valid now, refreshing it
    /// first if it has expired. At most one refresh runs per user at a time.
    pub async fn valid_integration(&self, user_id: Uuid) -> Result<CloverIntegration, ApiError> {
        let integration = self.load_integration(user_id).await?;
        if !integration.is_expired(Utc::now()) {
            return Ok(integration);
        }

        let guard = self.user_lock(user_id).await;
        let _held = guard.lock().await;

        // Another request may have refreshed while we waited on the lock.
        let integration = self.load_integration(user_id).await?;
        if !integration.is_expired(Utc::now()) {
            return Ok(integration);
        }

        let resp = self.api.refresh(&integration.refresh_token).await?;
        let refreshed = CloverIntegration {
            user_id,
            merchant_id: integration.merchant_id,
            access_token: resp.access_token,
            // Keep the old refresh token when the provider does not rotate it.
            refresh_token: resp.refresh_token.unwrap_or(integration.refresh_token),
            token_expiry: expiry_from(resp.expires_in),
        };

        self.store
            .lock()
            .await
            .upsert_clover_integration(&refreshed)?;

        // The refresh is done; waiters already hold a clone of the lock, and
        // anyone arriving later will hit the freshness check above.
        drop(_held);
        self.refresh_locks.lock().await.remove(&user_id);

        info!(user = %user_id, expiry = %refreshed.token_expiry, "Clover token refreshed");
        Ok(refreshed)
    }

    /// Mint a hosted checkout link for the given amount (major units).
    pub async fn payment_link(
        &self,
        user_id: Uuid,
        amount: f64,
        currency: &str,
        description: &str,
        customer_email: Option<String>,
    ) -> Result<PaymentLink, ApiError> {
        let integration = self.valid_integration(user_id).await?;

        let request = CheckoutRequest {
            amount_minor: invoica_shared::money::to_minor_units(amount),
            currency: currency.to_string(),
            description: description.to_string(),
            customer_email,
        };
        let resp = self
            .api
            .create_checkout(&integration.merchant_id, &integration.access_token, &request)
            .await?;

        Ok(PaymentLink {
            id: resp.id,
            amount: invoica_shared::money::round_cents(amount),
            currency: request.currency,
            status: resp.status.unwrap_or_else(|| "OPEN".to_string()),
            created_at: resp.created_time.and_then(ts_millis),
            expires_at: resp.expiration_time.and_then(ts_millis),
            url: resp.url,
        })
    }

    /// Remove the stored integration. Erroring on a missing record is the
    /// documented behavior; callers surface it as a 404.
    pub async fn disconnect(&self, user_id: Uuid) -> Result<(), ApiError> {
        let deleted = self.store.lock().await.delete_clover_integration(user_id)?;
        if !deleted {
            return Err(ApiError::NotFound(
                "no Clover integration to disconnect".to_string(),
            ));
        }
        self.refresh_locks.lock().await.remove(&user_id);
        info!(user = %user_id, "Clover disconnected");
        Ok(())
    }

    pub async fn integration_status(&self, user_id: Uuid) -> Result<Option<CloverIntegration>, ApiError> {
        match self.store.lock().await.get_clover_integration(user_id) {
            Ok(integration) => Ok(Some(integration)),
            Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn load_integration(&self, user_id: Uuid) -> Result<CloverIntegration, ApiError> {
        match self.store.lock().await.get_clover_integration(user_id) {
            Ok(integration) => Ok(integration),
            Err(StoreError::NotFound) => Err(ApiError::NotFound(
                "Clover integration not connected".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn user_lock(&self, user_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.refresh_locks.lock().await;
        locks.entry(user_id).or_default().clone()
    }

    #[cfg(test)]
    async fn refresh_lock_count(&self) -> usize {
        self.refresh_locks.lock().await.len()
    }

    // Constant-time comparison; a mismatch aborts the whole callback.
    fn verify_client_id(&self, echoed: &str) -> Result<(), ApiError> {
        let ours = self.config.clover_client_id.as_bytes();
        let theirs = echoed.as_bytes();
        if ours.len() != theirs.len() || ours.ct_eq(theirs).unwrap_u8() != 1 {
            return Err(ApiError::Unauthorized(
                "client_id mismatch in Clover callback".to_string(),
            ));
        }
        Ok(())
    }
}

fn expiry_from(expires_in: Option<i64>) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(expires_in.unwrap_or(DEFAULT_TOKEN_EXPIRES_SECS))
}

fn ts_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    use invoica_store::Database;

    /// Counting mock provider.
    struct MockApi {
        exchange_calls: AtomicU64,
        refresh_calls: AtomicU64,
        echo_client_id: Option<String>,
        rotate_refresh_token: bool,
    }

    impl MockApi {
        fn new() -> Self {
            Self {
                exchange_calls: AtomicU64::new(0),
                refresh_calls: AtomicU64::new(0),
                echo_client_id: None,
                rotate_refresh_token: true,
            }
        }
    }

    #[async_trait]
    impl CloverApi for MockApi {
        async fn exchange_code(&self, _code: &str) -> Result<TokenResponse, ApiError> {
            self.exchange_calls.fetch_add(1, Ordering::SeqCst);
            Ok(TokenResponse {
                access_token: "access-1".into(),
                refresh_token: Some("refresh-1".into()),
                expires_in: Some(3600),
                client_id: self.echo_client_id.clone(),
                merchant_id: Some("MER-42".into()),
            })
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<TokenResponse, ApiError> {
            let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(TokenResponse {
                access_token: format!("access-refreshed-{n}"),
                refresh_token: self
                    .rotate_refresh_token
                    .then(|| format!("refresh-rotated-{n}")),
                expires_in: Some(3600),
                client_id: None,
                merchant_id: None,
            })
        }

        async fn create_checkout(
            &self,
            _merchant_id: &str,
            _access_token: &str,
            request: &CheckoutRequest,
        ) -> Result<CheckoutResponse, ApiError> {
            Ok(CheckoutResponse {
                id: "chk-1".into(),
                status: Some("OPEN".into()),
                url: format!("https://checkout.example/chk-1?amount={}", request.amount_minor),
                created_time: Some(1_700_000_000_000),
                expiration_time: None,
            })
        }
    }

    fn service_with(api: MockApi) -> (CloverService, Arc<MockApi>, Store) {
        let store: Store = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let mut config = ServerConfig::default();
        config.clover_client_id = "client-123".into();
        config.clover_client_secret = "secret".into();
        let api = Arc::new(api);
        let service = CloverService::new(api.clone(), store.clone(), Arc::new(config));
        (service, api, store)
    }

    async fn seed_user(store: &Store) -> Uuid {
        let user = invoica_store::User {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", Uuid::new_v4()),
            password_hash: "hash".into(),
            role: invoica_shared::types::UserRole::User,
            created_at: Utc::now(),
        };
        store.lock().await.create_user(&user).unwrap();
        user.id
    }

    async fn seed_integration(store: &Store, user_id: Uuid, expiry: DateTime<Utc>) {
        store
            .lock()
            .await
            .upsert_clover_integration(&CloverIntegration {
                user_id,
                merchant_id: "MER-42".into(),
                access_token: "access-0".into(),
                refresh_token: "refresh-0".into(),
                token_expiry: expiry,
            })
            .unwrap();
    }

    #[tokio::test]
    async fn unexpired_token_is_returned_without_refresh() {
        let (service, api, store) = service_with(MockApi::new());
        let user_id = seed_user(&store).await;
        seed_integration(&store, user_id, Utc::now() + Duration::hours(1)).await;

        let integration = service.valid_integration(user_id).await.unwrap();
        assert_eq!(integration.access_token, "access-0");
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn expired_token_triggers_exactly_one_refresh() {
        let (service, api, store) = service_with(MockApi::new());
        let user_id = seed_user(&store).await;
        seed_integration(&store, user_id, Utc::now() - Duration::minutes(1)).await;

        let integration = service.valid_integration(user_id).await.unwrap();
        assert_eq!(integration.access_token, "access-refreshed-1");
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 1);

        // The refreshed pair was persisted; a second call needs no refresh.
        let again = service.valid_integration(user_id).await.unwrap();
        assert_eq!(again.access_token, "access-refreshed-1");
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_keeps_old_refresh_token_when_not_rotated() {
        let mut api = MockApi::new();
        api.rotate_refresh_token = false;
        let (service, _api, store) = service_with(api);
        let user_id = seed_user(&store).await;
        seed_integration(&store, user_id, Utc::now() - Duration::minutes(1)).await;

        let integration = service.valid_integration(user_id).await.unwrap();
        assert_eq!(integration.refresh_token, "refresh-0");
    }

    #[tokio::test]
    async fn refresh_lock_entries_are_released() {
        let (service, _api, store) = service_with(MockApi::new());
        let user_id = seed_user(&store).await;
        seed_integration(&store, user_id, Utc::now() - Duration::minutes(1)).await;

        service.valid_integration(user_id).await.unwrap();
        assert_eq!(service.refresh_lock_count().await, 0);

        // Disconnect clears any entry a pending refresh left behind.
        seed_integration(&store, user_id, Utc::now() - Duration::minutes(1)).await;
        service.user_lock(user_id).await;
        assert_eq!(service.refresh_lock_count().await, 1);
        service.disconnect(user_id).await.unwrap();
        assert_eq!(service.refresh_lock_count().await, 0);
    }

    #[tokio::test]
    async fn callback_with_mismatched_client_id_persists_nothing() {
        let mut api = MockApi::new();
        api.echo_client_id = Some("someone-else".into());
        let (service, _api, store) = service_with(api);
        let user_id = Uuid::new_v4();

        let err = service
            .handle_callback(user_id, "code-1", Some("MER-42".into()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));

        assert!(matches!(
            store.lock().await.get_clover_integration(user_id),
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn callback_persists_integration() {
        let (service, api, store) = service_with(MockApi::new());
        let user_id = seed_user(&store).await;

        let integration = service
            .handle_callback(user_id, "code-1", None, Some("client-123".into()))
            .await
            .unwrap();
        assert_eq!(integration.merchant_id, "MER-42");
        assert_eq!(api.exchange_calls.load(Ordering::SeqCst), 1);

        let stored = store.lock().await.get_clover_integration(user_id).unwrap();
        assert_eq!(stored.access_token, "access-1");
    }

    #[tokio::test]
    async fn disconnect_without_integration_is_not_found() {
        let (service, _api, _store) = service_with(MockApi::new());
        let err = service.disconnect(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn authorize_url_embeds_state() {
        let (service, _api, _store) = service_with(MockApi::new());
        let user_id = Uuid::new_v4();
        let url = service.authorize_url(user_id).unwrap();
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains(&format!("state={user_id}")));
    }
}
