use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::config::{AlertSettings, AlertTransportKind};

pub mod webhook;

pub use webhook::WebhookTransport;

#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Failed to send alert: {0}")]
    SendFailed(String),
    #[error("Invalid configuration for alert transport: {0}")]
    InvalidConfiguration(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// Delivers alert messages to a check's owner.
///
/// Delivery is best effort: the worker reports failures and never retries.
#[async_trait]
pub trait AlertTransport: Send + Sync {
    /// Send `message` to `recipient` (the owner's phone number)
    async fn send(&self, recipient: &str, message: &str) -> Result<(), AlertError>;
}

/// Transport that only writes the alert to the log, for setups without an
/// SMS gateway
pub struct LogTransport;

#[async_trait]
impl AlertTransport for LogTransport {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), AlertError> {
        info!(recipient, message, "Alert (log transport)");
        Ok(())
    }
}

/// Build the transport selected in the configuration
pub fn build_transport(settings: &AlertSettings) -> Result<Arc<dyn AlertTransport>, AlertError> {
    match settings.transport {
        AlertTransportKind::Log => Ok(Arc::new(LogTransport)),
        AlertTransportKind::Webhook => {
            let url = settings.webhook_url.as_deref().ok_or_else(|| {
                AlertError::InvalidConfiguration("webhook transport needs webhook_url".to_string())
            })?;
            let transport = WebhookTransport::new(
                url,
                settings.webhook_token.clone(),
                Duration::from_secs(settings.timeout_seconds.max(1)),
            )?;
            Ok(Arc::new(transport))
        }
    }
}
