//! SMS delivery through a generic HTTP gateway.
//!
//! The gateway receives `POST {gateway_url}` with a JSON body
//! `{"to": "+233...", "from": "<sender_id>", "message": "..."}` and the API key
//! as a bearer token. Any 2xx answer counts as accepted.

use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;

use crate::config::SmsConfig;

#[derive(Debug, Serialize)]
struct SmsPayload<'a> {
    to: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<&'a str>,
    message: &'a str,
}

pub struct SmsGateway {
    config: SmsConfig,
    http_client: reqwest::Client,
}

impl SmsGateway {
    pub fn new(config: SmsConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            config,
            http_client,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    pub async fn send(&self, to: &str, message: &str) -> Result<()> {
        let Some(url) = self.config.gateway_url.as_deref() else {
            tracing::warn!(to = %to, "SMS gateway not configured, skipping send");
            return Ok(());
        };

        let payload = SmsPayload {
            to,
            from: self.config.sender_id.as_deref(),
            message,
        };

        let mut request = self.http_client.post(url).json(&payload);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .context("Failed to reach SMS gateway")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("SMS gateway returned {}: {}", status, body);
        }

        tracing::info!(to = %to, "SMS sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_omits_missing_sender() {
        let payload = SmsPayload {
            to: "+15551234567",
            from: None,
            message: "hello",
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["to"], "+15551234567");
        assert!(json.get("from").is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_gateway_skips() {
        let gateway = SmsGateway::new(SmsConfig::default());
        assert!(!gateway.is_enabled());
        assert!(gateway.send("+15551234567", "hello").await.is_ok());
    }
}
