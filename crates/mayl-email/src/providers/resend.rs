//! Resend HTTP API client and email provider
//!
//! `ResendClient` is shared between sending (`ResendProvider`) and the Resend
//! domain verification adapter, so both reuse one connection pool.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, error};

use super::traits::{
    DeliveryState, DeliveryStatus, EmailMessage, EmailProvider, EmailProviderKind, SendResult,
};
use crate::errors::EmailError;

pub const RESEND_API_URL: &str = "https://api.resend.com";
pub const DEFAULT_RESEND_REGION: &str = "us-east-1";

#[derive(Debug, Serialize)]
struct ResendAttachment {
    filename: String,
    /// Base64 encoded file content
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
}

#[derive(Debug, Serialize)]
struct ResendEmailRequest {
    from: String,
    to: Vec<String>,
    subject: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cc: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    bcc: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<ResendAttachment>,
}

impl From<&EmailMessage> for ResendEmailRequest {
    fn from(message: &EmailMessage) -> Self {
        Self {
            from: message.formatted_from(),
            to: message.to.clone(),
            subject: message.subject.clone(),
            cc: message.cc.clone(),
            bcc: message.bcc.clone(),
            reply_to: message.reply_to.clone(),
            html: message.html_body().map(str::to_string),
            text: message.text_body().map(str::to_string),
            headers: message.headers.clone(),
            attachments: message
                .attachments
                .iter()
                .map(|a| ResendAttachment {
                    filename: a.filename.clone(),
                    content: STANDARD.encode(&a.content),
                    content_type: a.content_type.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResendIdResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ResendErrorBody {
    message: String,
    #[allow(dead_code)]
    name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResendEmail {
    pub id: String,
    #[serde(default)]
    pub last_event: Option<String>,
}

/// One DNS record Resend asks the domain owner to publish
#[derive(Debug, Clone, Deserialize)]
pub struct ResendDomainRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub value: String,
    /// Resend reports priority as a number, older payloads as a string
    #[serde(default)]
    pub priority: Option<Value>,
    #[serde(default)]
    pub status: Option<String>,
}

impl ResendDomainRecord {
    pub fn priority(&self) -> Option<u16> {
        match self.priority.as_ref()? {
            Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResendDomain {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub records: Vec<ResendDomainRecord>,
}

#[derive(Debug, Deserialize)]
struct ResendDomainList {
    data: Vec<ResendDomain>,
}

#[derive(Debug, Serialize)]
struct CreateDomainRequest<'a> {
    name: &'a str,
    region: &'a str,
}

/// Thin typed wrapper over the Resend REST API
#[derive(Clone)]
pub struct ResendClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl ResendClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, EmailError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(EmailError::Configuration(
                "Resend API key is required".to_string(),
            ));
        }
        Ok(Self {
            client: Client::new(),
            api_key,
            base_url: RESEND_API_URL.to_string(),
        })
    }

    /// Point the client at a different API host (tests, proxies)
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("User-Agent", concat!("mayl/", env!("CARGO_PKG_VERSION")))
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, EmailError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body: ResendErrorBody = response.json().await.unwrap_or(ResendErrorBody {
            message: "Unknown error".to_string(),
            name: None,
        });
        Err(EmailError::Resend(format!(
            "{} (status {})",
            body.message,
            status.as_u16()
        )))
    }

    fn domain_url(&self, id: &str) -> String {
        format!("{}/domains/{}", self.base_url, urlencoding::encode(id))
    }

    async fn send_email(&self, message: &EmailMessage) -> Result<String, EmailError> {
        let request = ResendEmailRequest::from(message);
        let response = self
            .authorized(self.client.post(format!("{}/emails", self.base_url)))
            .json(&request)
            .send()
            .await?;
        let created: ResendIdResponse = Self::parse(response).await?;
        Ok(created.id)
    }

    pub async fn get_email(&self, id: &str) -> Result<ResendEmail, EmailError> {
        let url = format!("{}/emails/{}", self.base_url, urlencoding::encode(id));
        let response = self.authorized(self.client.get(url)).send().await?;
        Self::parse(response).await
    }

    pub async fn create_domain(
        &self,
        name: &str,
        region: &str,
    ) -> Result<ResendDomain, EmailError> {
        let response = self
            .authorized(self.client.post(format!("{}/domains", self.base_url)))
            .json(&CreateDomainRequest { name, region })
            .send()
            .await?;
        Self::parse(response).await
    }

    pub async fn get_domain(&self, id: &str) -> Result<ResendDomain, EmailError> {
        let response = self
            .authorized(self.client.get(self.domain_url(id)))
            .send()
            .await?;
        Self::parse(response).await
    }

    /// Ask Resend to re-run its DNS checks for the domain
    pub async fn verify_domain(&self, id: &str) -> Result<(), EmailError> {
        let url = format!("{}/verify", self.domain_url(id));
        let response = self.authorized(self.client.post(url)).send().await?;
        let _: Value = Self::parse(response).await?;
        Ok(())
    }

    pub async fn delete_domain(&self, id: &str) -> Result<(), EmailError> {
        let response = self
            .authorized(self.client.delete(self.domain_url(id)))
            .send()
            .await?;
        let _: Value = Self::parse(response).await?;
        Ok(())
    }

    pub async fn list_domains(&self) -> Result<Vec<ResendDomain>, EmailError> {
        let response = self
            .authorized(self.client.get(format!("{}/domains", self.base_url)))
            .send()
            .await?;
        let list: ResendDomainList = Self::parse(response).await?;
        Ok(list.data)
    }
}

/// Map Resend's `last_event` onto the provider-neutral delivery state
pub(crate) fn delivery_state_from_event(last_event: Option<&str>) -> DeliveryState {
    match last_event {
        Some("sent") => DeliveryState::Sent,
        Some("delivered") => DeliveryState::Delivered,
        Some("delivery_delayed") => DeliveryState::Delayed,
        Some("complained") => DeliveryState::Complained,
        Some("bounced") => DeliveryState::Bounced,
        // An opened or clicked message was necessarily delivered
        Some("opened") | Some("clicked") => DeliveryState::Delivered,
        _ => DeliveryState::Unknown,
    }
}

/// Resend email provider implementation
#[derive(Clone)]
pub struct ResendProvider {
    client: ResendClient,
}

impl ResendProvider {
    pub fn new(client: ResendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EmailProvider for ResendProvider {
    async fn send(&self, message: &EmailMessage) -> Result<SendResult, EmailError> {
        message.ensure_recipients()?;
        debug!("Sending email via Resend from: {}", message.from);

        let id = self.client.send_email(message).await.map_err(|e| {
            error!("Failed to send email via Resend: {}", e);
            e
        })?;

        debug!("Email sent via Resend, message_id: {}", id);
        Ok(SendResult {
            message_id: Some(id),
            provider: EmailProviderKind::Resend,
        })
    }

    async fn delivery_status(&self, message_id: &str) -> Result<DeliveryStatus, EmailError> {
        let email = self.client.get_email(message_id).await?;
        Ok(DeliveryStatus {
            message_id: message_id.to_string(),
            state: delivery_state_from_event(email.last_event.as_deref()),
        })
    }

    fn provider_type(&self) -> EmailProviderKind {
        EmailProviderKind::Resend
    }
}
