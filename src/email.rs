//! Outbound email — transactional HTTP provider.
//!
//! The provider accepts `{from, to, subject, html}` and answers with a
//! delivery id. If it rejects the primary from-address because the domain
//! is not verified, the send is retried exactly once with the configured
//! fallback address.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;

use crate::config::EmailProviderConfig;
use crate::error::EmailError;

/// A fully rendered message ready for the provider.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// The provider's acknowledgement of an accepted send.
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub id: String,
}

/// Sends rendered outreach email.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<DeliveryReceipt, EmailError>;
}

// ── HTTP implementation ─────────────────────────────────────────────

pub struct HttpEmailSender {
    config: EmailProviderConfig,
    http: reqwest::Client,
}

impl HttpEmailSender {
    pub fn new(config: EmailProviderConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    async fn post(&self, from: &str, email: &OutboundEmail) -> Result<reqwest::Response, EmailError> {
        self.http
            .post(format!(
                "{}/emails",
                self.config.base_url.trim_end_matches('/')
            ))
            .timeout(self.config.timeout)
            .header(
                "Authorization",
                format!("Bearer {}", self.config.api_key.expose_secret()),
            )
            .json(&send_payload(from, email))
            .send()
            .await
            .map_err(|e| EmailError::Http(e.to_string()))
    }

    async fn receipt(response: reqwest::Response) -> Result<DeliveryReceipt, EmailError> {
        let parsed: SendResponse = response
            .json()
            .await
            .map_err(|e| EmailError::Http(e.to_string()))?;
        let id = parsed.id.ok_or(EmailError::MissingDeliveryId)?;
        Ok(DeliveryReceipt { id })
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, email: &OutboundEmail) -> Result<DeliveryReceipt, EmailError> {
        let response = self.post(&self.config.from_address, email).await?;
        let status = response.status();

        if status.is_success() {
            let receipt = Self::receipt(response).await?;
            tracing::info!(to = %email.to, delivery_id = %receipt.id, "Email sent");
            return Ok(receipt);
        }

        let body = response.text().await.unwrap_or_default();

        // Unverified sender domain: retry once from the fallback address.
        if status == reqwest::StatusCode::FORBIDDEN && body.to_lowercase().contains("domain") {
            tracing::warn!(
                fallback = %self.config.fallback_from,
                "Sender domain not verified, retrying from fallback address"
            );
            let retry = self.post(&self.config.fallback_from, email).await?;
            let retry_status = retry.status();
            if retry_status.is_success() {
                let receipt = Self::receipt(retry).await?;
                tracing::info!(to = %email.to, delivery_id = %receipt.id, "Email sent via fallback");
                return Ok(receipt);
            }
            let retry_body = retry.text().await.unwrap_or_default();
            return Err(EmailError::Rejected {
                status: retry_status.as_u16(),
                body: retry_body.chars().take(300).collect(),
            });
        }

        Err(EmailError::Rejected {
            status: status.as_u16(),
            body: body.chars().take(300).collect(),
        })
    }
}

/// Wiring placeholder for dry runs. The sequence runner records a
/// `dry_run` entry instead of sending, so this is never invoked; if it is,
/// that's a wiring bug and the send fails loudly.
pub struct NullEmailSender;

#[async_trait]
impl EmailSender for NullEmailSender {
    async fn send(&self, email: &OutboundEmail) -> Result<DeliveryReceipt, EmailError> {
        Err(EmailError::Http(format!(
            "email sending is disabled in dry-run mode (to: {})",
            email.to
        )))
    }
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    id: Option<String>,
}

fn send_payload(from: &str, email: &OutboundEmail) -> serde_json::Value {
    serde_json::json!({
        "from": from,
        "to": [email.to],
        "subject": email.subject,
        "html": email.html,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_shape_matches_provider_contract() {
        let email = OutboundEmail {
            to: "pete@example.com".into(),
            subject: "quick thought".into(),
            html: "<p>hi</p>".into(),
        };
        let payload = send_payload("Sam Harlow <sam@northlight.digital>", &email);
        assert_eq!(payload["from"], "Sam Harlow <sam@northlight.digital>");
        assert_eq!(payload["to"], serde_json::json!(["pete@example.com"]));
        assert_eq!(payload["subject"], "quick thought");
        assert_eq!(payload["html"], "<p>hi</p>");
    }

    #[test]
    fn receipt_requires_an_id() {
        let parsed: SendResponse = serde_json::from_str(r#"{"id":"re_123"}"#).unwrap();
        assert_eq!(parsed.id.as_deref(), Some("re_123"));

        let parsed: SendResponse = serde_json::from_str(r#"{"ok":true}"#).unwrap();
        assert!(parsed.id.is_none());
    }
}
