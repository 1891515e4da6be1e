use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header};
use serde::Serialize;

use super::{AlertError, AlertTransport};

/// Body posted to the gateway
#[derive(Debug, Serialize)]
struct AlertPayload<'a> {
    to: &'a str,
    body: &'a str,
}

/// Posts alerts as JSON to an SMS gateway or any webhook endpoint
pub struct WebhookTransport {
    client: Client,
    url: reqwest::Url,
    token: Option<String>,
}

impl WebhookTransport {
    pub fn new(url: &str, token: Option<String>, timeout: Duration) -> Result<Self, AlertError> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| AlertError::InvalidConfiguration(format!("Invalid webhook URL: {e}")))?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(AlertError::InvalidConfiguration(format!(
                    "Unsupported webhook scheme: {other}"
                )));
            }
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client, url, token })
    }
}

#[async_trait]
impl AlertTransport for WebhookTransport {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), AlertError> {
        let mut request = self
            .client
            .post(self.url.clone())
            .json(&AlertPayload { to: recipient, body: message });

        if let Some(token) = &self.token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_body =
                response.text().await.unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(AlertError::SendFailed(format!(
                "Gateway returned non-success status: {status}. Body: {error_body}"
            )));
        }

        Ok(())
    }
}
