use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};

use crate::config::EmailConfig;
use crate::error::DeliveryError;
use crate::models::Digest;
use crate::render::DigestRenderer;

const SENDER_NAME: &str = "Sumo News Bot";

/// Proof that a digest left the building
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub id: String,
}

/// Sends a composed digest to a recipient
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    /// Whether the gateway can currently reach and authenticate with its server
    async fn verify_connectivity(&self) -> bool;

    async fn send(&self, digest: &Digest, recipient: &str) -> Result<DeliveryReceipt, DeliveryError>;
}

pub struct SmtpGateway {
    from: Mailbox,
    transport: SmtpTransport,
}

impl SmtpGateway {
    pub fn new(config: &EmailConfig) -> Result<Self, DeliveryError> {
        let credentials = Credentials::new(config.user.clone(), config.pass.clone());

        let transport = SmtpTransport::starttls_relay(&config.host)
            .map_err(|e| DeliveryError::Smtp(format!("SMTP relay configuration error: {}", e)))?
            .port(config.port)
            .credentials(credentials)
            .build();

        let from: Mailbox = format!("{} <{}>", SENDER_NAME, config.user)
            .parse()
            .map_err(|e: lettre::address::AddressError| DeliveryError::Address {
                address: config.user.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self { from, transport })
    }

    fn build_message(&self, digest: &Digest, recipient: &str) -> Result<Message, DeliveryError> {
        let to: Mailbox = recipient.parse().map_err(|e: lettre::address::AddressError| {
            DeliveryError::Address {
                address: recipient.to_string(),
                reason: e.to_string(),
            }
        })?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&digest.subject)
            .multipart(MultiPart::alternative_plain_html(
                DigestRenderer::text(digest),
                DigestRenderer::html(digest),
            ))
            .map_err(|e| DeliveryError::Message(e.to_string()))
    }
}

#[async_trait]
impl DeliveryGateway for SmtpGateway {
    async fn verify_connectivity(&self) -> bool {
        let transport = self.transport.clone();
        match tokio::task::spawn_blocking(move || transport.test_connection()).await {
            Ok(Ok(true)) => true,
            Ok(Ok(false)) => {
                tracing::warn!("SMTP server refused the connection test");
                false
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "SMTP connection failed");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "SMTP connection check did not complete");
                false
            }
        }
    }

    async fn send(&self, digest: &Digest, recipient: &str) -> Result<DeliveryReceipt, DeliveryError> {
        let message = self.build_message(digest, recipient)?;
        let transport = self.transport.clone();

        let response = tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| DeliveryError::Task(e.to_string()))?
            .map_err(|e| DeliveryError::Smtp(e.to_string()))?;

        let id = response.first_word().unwrap_or("unknown").to_string();
        tracing::info!(recipient, receipt = %id, "digest delivered");
        Ok(DeliveryReceipt { id })
    }
}
