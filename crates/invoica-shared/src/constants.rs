/// Application name
pub const APP_NAME: &str = "Invoica";

/// Password reset tokens expire after this many minutes.
pub const RESET_TOKEN_TTL_MINUTES: i64 = 15;

/// Lifetime assumed for a Clover access token when the provider omits
/// `expires_in` from the token response.
pub const DEFAULT_TOKEN_EXPIRES_SECS: i64 = 3600;

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Maximum uploaded image size in bytes (5 MiB) for logo / signature.
pub const MAX_IMAGE_SIZE: usize = 5 * 1024 * 1024;

/// Currency used when a profile does not specify one.
pub const DEFAULT_CURRENCY: &str = "USD";
