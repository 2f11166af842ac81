//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Explicit SQLite database path. When unset the platform data
    /// directory is used.
    /// Env: `DATABASE_PATH`
    pub database_path: Option<PathBuf>,

    /// Public base URL of this deployment, used in reset links and the
    /// default Clover redirect URI.
    /// Env: `APP_BASE_URL`
    /// Default: `http://localhost:8080`
    pub app_base_url: String,

    /// Secret for signing JWTs (HS256).
    /// Env: `JWT_SECRET`
    /// Default: a fixed development secret (warned about at startup).
    pub jwt_secret: String,

    /// Bearer token lifetime in hours.
    /// Env: `JWT_TTL_HOURS`
    /// Default: `24`
    pub jwt_ttl_hours: i64,

    /// Filesystem path where uploaded images (logo, signature) are stored.
    /// Env: `UPLOAD_PATH`
    /// Default: `./uploads`
    pub upload_path: PathBuf,

    /// Maximum uploaded image size in bytes.
    pub max_image_size: usize,

    /// Maximum number of PDF renders running at once.
    /// Env: `MAX_CONCURRENT_RENDERS`
    /// Default: `2`
    pub max_concurrent_renders: usize,

    // -- Clover OAuth --

    /// Env: `CLOVER_CLIENT_ID` (empty disables the integration endpoints).
    pub clover_client_id: String,
    /// Env: `CLOVER_CLIENT_SECRET`
    pub clover_client_secret: String,
    /// OAuth host (authorization + token endpoints).
    /// Env: `CLOVER_OAUTH_BASE`
    /// Default: Clover sandbox.
    pub clover_oauth_base: String,
    /// Platform API host (checkout endpoint).
    /// Env: `CLOVER_API_BASE`
    /// Default: Clover sandbox API.
    pub clover_api_base: String,
    /// Redirect URI registered with Clover.
    /// Env: `CLOVER_REDIRECT_URI`
    /// Default: `{APP_BASE_URL}/clover/callback`
    pub clover_redirect_uri: String,

    // -- Notifications --

    /// Env: `SENDGRID_API_KEY` (unset disables email).
    pub sendgrid_api_key: Option<String>,
    /// Sender address for outbound email.
    /// Env: `FROM_EMAIL`
    pub from_email: String,
    /// Env: `TWILIO_ACCOUNT_SID` (unset disables SMS).
    pub twilio_account_sid: Option<String>,
    /// Env: `TWILIO_AUTH_TOKEN`
    pub twilio_auth_token: Option<String>,
    /// Env: `TWILIO_FROM_NUMBER`
    pub twilio_from_number: Option<String>,
}

/// Development-only JWT secret. Never use in production.
const DEV_JWT_SECRET: &str = "invoica-dev-secret-change-me";

impl Default for ServerConfig {
    fn default() -> Self {
        let app_base_url = "http://localhost:8080".to_string();
        Self {
            http_addr: ([0, 0, 0, 0], invoica_shared::constants::DEFAULT_HTTP_PORT).into(),
            database_path: None,
            clover_redirect_uri: format!("{app_base_url}/clover/callback"),
            app_base_url,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_ttl_hours: 24,
            upload_path: PathBuf::from("./uploads"),
            max_image_size: invoica_shared::constants::MAX_IMAGE_SIZE,
            max_concurrent_renders: 2,
            clover_client_id: String::new(),
            clover_client_secret: String::new(),
            clover_oauth_base: "https://sandbox.dev.clover.com".to_string(),
            clover_api_base: "https://apisandbox.dev.clover.com".to_string(),
            sendgrid_api_key: None,
            from_email: "invoices@invoica.example".to_string(),
            twilio_account_sid: None,
            twilio_auth_token: None,
            twilio_from_number: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Ok(path) = std::env::var("DATABASE_PATH") {
            config.database_path = Some(PathBuf::from(path));
        }

        if let Ok(url) = std::env::var("APP_BASE_URL") {
            let url = url.trim_end_matches('/').to_string();
            config.clover_redirect_uri = format!("{url}/clover/callback");
            config.app_base_url = url;
        }

        match std::env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => config.jwt_secret = secret,
            _ => {
                tracing::warn!("JWT_SECRET not set, using development secret");
            }
        }

        if let Ok(val) = std::env::var("JWT_TTL_HOURS") {
            if let Ok(hours) = val.parse::<i64>() {
                config.jwt_ttl_hours = hours;
            }
        }

        if let Ok(path) = std::env::var("UPLOAD_PATH") {
            config.upload_path = PathBuf::from(path);
        }

        if let Ok(val) = std::env::var("MAX_CONCURRENT_RENDERS") {
            if let Ok(n) = val.parse::<usize>() {
                if n > 0 {
                    config.max_concurrent_renders = n;
                }
            }
        }

        // -- Clover --

        if let Ok(id) = std::env::var("CLOVER_CLIENT_ID") {
            config.clover_client_id = id;
        }
        if let Ok(secret) = std::env::var("CLOVER_CLIENT_SECRET") {
            config.clover_client_secret = secret;
        }
        if let Ok(base) = std::env::var("CLOVER_OAUTH_BASE") {
            config.clover_oauth_base = base.trim_end_matches('/').to_string();
        }
        if let Ok(base) = std::env::var("CLOVER_API_BASE") {
            config.clover_api_base = base.trim_end_matches('/').to_string();
        }
        if let Ok(uri) = std::env::var("CLOVER_REDIRECT_URI") {
            config.clover_redirect_uri = uri;
        }

        // -- Notifications --

        if let Ok(key) = std::env::var("SENDGRID_API_KEY") {
            if !key.is_empty() {
                config.sendgrid_api_key = Some(key);
            }
        }
        if let Ok(from) = std::env::var("FROM_EMAIL") {
            config.from_email = from;
        }
        if let Ok(sid) = std::env::var("TWILIO_ACCOUNT_SID") {
            if !sid.is_empty() {
                config.twilio_account_sid = Some(sid);
            }
        }
        if let Ok(token) = std::env::var("TWILIO_AUTH_TOKEN") {
            if !token.is_empty() {
                config.twilio_auth_token = Some(token);
            }
        }
        if let Ok(num) = std::env::var("TWILIO_FROM_NUMBER") {
            if !num.is_empty() {
                config.twilio_from_number = Some(num);
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    /// Whether the Clover OAuth endpoints are usable.
    pub fn clover_enabled(&self) -> bool {
        !self.clover_client_id.is_empty() && !self.clover_client_secret.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(
            config.clover_redirect_uri,
            "http://localhost:8080/clover/callback"
        );
        assert!(!config.clover_enabled());
    }
}
