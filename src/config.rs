//! Server configuration

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Server configuration, loaded from environment variables
///
/// | Env var | Default | Description |
/// |---------|---------|-------------|
/// | DATABASE_URL | (required) | PostgreSQL connection URL |
/// | HTTP_PORT | 8080 | HTTP listen port |
/// | ENVIRONMENT | development | development / staging / production |
/// | WEBHOOK_SECRET | (required outside development) | HMAC key for marketplace webhooks |
/// | NOTIFY_URL | (unset) | Endpoint for fire-and-forget notifications |
/// | LOCK_TIMEOUT_MS | 5000 | Bound on row-lock waits inside order transactions |
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// HTTP listen port
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
    /// Webhook signing secret (HMAC-SHA256 over the raw body)
    pub webhook_secret: String,
    /// Notification dispatch endpoint; notifications are logged only when unset
    pub notify_url: Option<String>,
    /// Upper bound on waiting for a stock row lock, applied per transaction
    pub lock_timeout_ms: u64,
}

impl Config {
    /// Require a secret env var: must be set and non-empty outside development.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?,
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            webhook_secret: Self::require_secret("WEBHOOK_SECRET", &environment)?,
            notify_url: std::env::var("NOTIFY_URL").ok().filter(|s| !s.is_empty()),
            lock_timeout_ms: std::env::var("LOCK_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5000),
            environment,
        })
    }
}
