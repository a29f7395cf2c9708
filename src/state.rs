//! Application state

use sqlx::PgPool;
use std::sync::Arc;

use crate::config::Config;
use crate::notify::{Notifier, WebhookNotifier};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool
    pub pool: PgPool,
    /// Webhook signing secret (HMAC-SHA256)
    pub webhook_secret: String,
    /// Post-commit notification dispatcher
    pub notifier: Arc<dyn Notifier>,
    /// Row-lock wait bound applied inside fulfillment transactions
    pub lock_timeout_ms: u64,
}

impl AppState {
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let pool = crate::db::connect(&config.database_url).await?;

        Ok(Self {
            pool,
            webhook_secret: config.webhook_secret.clone(),
            notifier: Arc::new(WebhookNotifier::new(config.notify_url.clone())),
            lock_timeout_ms: config.lock_timeout_ms,
        })
    }
}
