//! SendGrid v3 Mail Send provider
//!
//! SendGrid only reports delivery through event webhooks, so
//! `delivery_status` keeps the trait's `unknown` default.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, error};

use super::traits::{EmailMessage, EmailProvider, EmailProviderKind, SendResult};
use crate::errors::EmailError;

pub const SENDGRID_API_URL: &str = "https://api.sendgrid.com/v3";

#[derive(Debug, Serialize)]
struct SendGridAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl SendGridAddress {
    fn plain(email: &str) -> Self {
        Self {
            email: email.to_string(),
            name: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct SendGridPersonalization {
    to: Vec<SendGridAddress>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cc: Vec<SendGridAddress>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    bcc: Vec<SendGridAddress>,
}

#[derive(Debug, Serialize)]
struct SendGridContent {
    #[serde(rename = "type")]
    content_type: &'static str,
    value: String,
}

#[derive(Debug, Serialize)]
struct SendGridAttachment {
    content: String,
    filename: String,
    #[serde(rename = "type")]
    content_type: String,
    disposition: &'static str,
}

#[derive(Debug, Serialize)]
struct SendGridRequest {
    personalizations: Vec<SendGridPersonalization>,
    from: SendGridAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<SendGridAddress>,
    subject: String,
    content: Vec<SendGridContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<SendGridAttachment>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<String, String>,
}

impl From<&EmailMessage> for SendGridRequest {
    fn from(message: &EmailMessage) -> Self {
        let plain = |list: &[String]| -> Vec<SendGridAddress> {
            list.iter().map(|a| SendGridAddress::plain(a)).collect()
        };

        // text/plain must precede text/html
        let mut content = Vec::new();
        if let Some(text) = message.text_body() {
            content.push(SendGridContent {
                content_type: "text/plain",
                value: text.to_string(),
            });
        }
        if let Some(html) = message.html_body() {
            content.push(SendGridContent {
                content_type: "text/html",
                value: html.to_string(),
            });
        }

        Self {
            personalizations: vec![SendGridPersonalization {
                to: plain(&message.to),
                cc: plain(&message.cc),
                bcc: plain(&message.bcc),
            }],
            from: SendGridAddress {
                email: message.from.clone(),
                name: message.from_name.clone().filter(|n| !n.is_empty()),
            },
            reply_to: message.reply_to.as_deref().map(SendGridAddress::plain),
            subject: message.subject.clone(),
            content,
            attachments: message
                .attachments
                .iter()
                .map(|a| SendGridAttachment {
                    content: STANDARD.encode(&a.content),
                    filename: a.filename.clone(),
                    content_type: a.content_type_or_default().to_string(),
                    disposition: "attachment",
                })
                .collect(),
            headers: message.headers.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SendGridErrorBody {
    errors: Vec<SendGridErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct SendGridErrorDetail {
    message: String,
}

/// SendGrid email provider implementation
#[derive(Clone)]
pub struct SendGridProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl SendGridProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, EmailError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(EmailError::Configuration(
                "SendGrid API key is required".to_string(),
            ));
        }
        Ok(Self {
            client: Client::new(),
            api_key,
            base_url: SENDGRID_API_URL.to_string(),
        })
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl EmailProvider for SendGridProvider {
    async fn send(&self, message: &EmailMessage) -> Result<SendResult, EmailError> {
        message.ensure_recipients()?;
        debug!("Sending email via SendGrid from: {}", message.from);

        let request = SendGridRequest::from(message);
        let response = self
            .client
            .post(format!("{}/mail/send", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<SendGridErrorBody>()
                .await
                .ok()
                .map(|body| {
                    body.errors
                        .into_iter()
                        .map(|e| e.message)
                        .collect::<Vec<_>>()
                        .join("; ")
                })
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "Unknown error".to_string());
            error!("Failed to send email via SendGrid: {} - {}", status, detail);
            return Err(EmailError::SendGrid(format!(
                "{} - {}",
                status.as_u16(),
                detail
            )));
        }

        let message_id = response
            .headers()
            .get("X-Message-Id")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        debug!("Email sent via SendGrid, message_id: {:?}", message_id);
        Ok(SendResult {
            message_id,
            provider: EmailProviderKind::SendGrid,
        })
    }

    fn provider_type(&self) -> EmailProviderKind {
        EmailProviderKind::SendGrid
    }
}
