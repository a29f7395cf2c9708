//! Notification dispatch
//!
//! Fire-and-forget events emitted after a fulfillment transaction commits.
//! Delivery is an external collaborator's concern: the default dispatcher
//! POSTs the event to a configured endpoint and only logs on failure — a
//! notification failure never rolls back an order.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Events the fulfillment engine publishes
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotifyEvent {
    OrderCreated {
        order_id: Uuid,
        order_number: String,
        total: Decimal,
    },
    OrderStatusChanged {
        order_id: Uuid,
        order_number: String,
        status: String,
    },
    PaymentStatusChanged {
        order_id: Uuid,
        order_number: String,
        payment_status: String,
    },
    LowStock {
        product_id: Uuid,
        remaining: i32,
        threshold: i32,
    },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn dispatch(&self, event: NotifyEvent);
}

/// Default dispatcher: POST JSON to `NOTIFY_URL` when configured,
/// otherwise log the event and drop it.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Option<String>,
}

impl WebhookNotifier {
    pub fn new(url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn dispatch(&self, event: NotifyEvent) {
        let Some(url) = &self.url else {
            tracing::info!(event = ?event, "Notification (no NOTIFY_URL configured)");
            return;
        };

        match self.client.post(url).json(&event).send().await {
            Ok(resp) if !resp.status().is_success() => {
                tracing::warn!(status = %resp.status(), "Notification endpoint returned an error");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Notification dispatch failed");
            }
            Ok(_) => {}
        }
    }
}

/// Spawn a detached dispatch task. Called only after commit.
pub fn spawn_notify(notifier: Arc<dyn Notifier>, event: NotifyEvent) {
    tokio::spawn(async move {
        notifier.dispatch(event).await;
    });
}
