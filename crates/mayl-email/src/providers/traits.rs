//! Email provider trait definitions

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::EmailError;

/// Supported email sending backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailProviderKind {
    /// Amazon Simple Email Service
    Ses,
    /// Resend HTTP API
    Resend,
    /// SendGrid v3 Mail Send API
    SendGrid,
}

impl std::fmt::Display for EmailProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmailProviderKind::Ses => write!(f, "ses"),
            EmailProviderKind::Resend => write!(f, "resend"),
            EmailProviderKind::SendGrid => write!(f, "sendgrid"),
        }
    }
}

impl EmailProviderKind {
    pub fn from_str(s: &str) -> Result<Self, EmailError> {
        match s.trim().to_lowercase().as_str() {
            "ses" | "aws_ses" | "aws-ses" => Ok(EmailProviderKind::Ses),
            "resend" => Ok(EmailProviderKind::Resend),
            "sendgrid" | "sg" => Ok(EmailProviderKind::SendGrid),
            _ => Err(EmailError::InvalidProviderType(s.to_string())),
        }
    }
}

/// Decoded attachment ready to hand to a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
    pub content_type: Option<String>,
}

impl Attachment {
    pub fn content_type_or_default(&self) -> &str {
        self.content_type
            .as_deref()
            .unwrap_or("application/octet-stream")
    }
}

/// Provider-neutral outbound message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub from_name: Option<String>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub reply_to: Option<String>,
    pub subject: String,
    pub text: Option<String>,
    pub html: Option<String>,
    pub attachments: Vec<Attachment>,
    pub headers: BTreeMap<String, String>,
}

impl EmailMessage {
    /// `Name <address>` when a display name is set
    pub fn formatted_from(&self) -> String {
        match self.from_name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => format!("{} <{}>", name, self.from),
            None => self.from.clone(),
        }
    }

    pub fn ensure_recipients(&self) -> Result<(), EmailError> {
        if self.to.is_empty() {
            return Err(EmailError::Validation("no recipients specified".to_string()));
        }
        Ok(())
    }

    pub fn text_body(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.is_empty())
    }

    pub fn html_body(&self) -> Option<&str> {
        self.html.as_deref().filter(|h| !h.is_empty())
    }
}

/// Outcome of a successful send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    /// Provider's message ID, when the provider returns one
    pub message_id: Option<String>,
    pub provider: EmailProviderKind,
}

/// Delivery state reported by a provider after the send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Unknown,
    Sent,
    Delivered,
    Delayed,
    Bounced,
    Complained,
    Failed,
}

impl std::fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeliveryState::Unknown => "unknown",
            DeliveryState::Sent => "sent",
            DeliveryState::Delivered => "delivered",
            DeliveryState::Delayed => "delayed",
            DeliveryState::Bounced => "bounced",
            DeliveryState::Complained => "complained",
            DeliveryState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStatus {
    pub message_id: String,
    pub state: DeliveryState,
}

impl DeliveryStatus {
    pub fn unknown(message_id: &str) -> Self {
        Self {
            message_id: message_id.to_string(),
            state: DeliveryState::Unknown,
        }
    }
}

/// Uniform interface to a concrete email-sending backend
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Send one message
    async fn send(&self, message: &EmailMessage) -> Result<SendResult, EmailError>;

    /// Look up what happened to a sent message. Providers that only report
    /// delivery through webhooks answer `unknown`.
    async fn delivery_status(&self, message_id: &str) -> Result<DeliveryStatus, EmailError> {
        Ok(DeliveryStatus::unknown(message_id))
    }

    /// Get the provider type
    fn provider_type(&self) -> EmailProviderKind;
}
