//! AWS SES email provider implementation

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sesv2::{
    config::{Credentials, Region},
    primitives::Blob,
    types::{Body, Content, Destination, EmailContent, Message, RawMessage},
    Client,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::mime::build_mime_message;
use super::traits::{EmailMessage, EmailProvider, EmailProviderKind, SendResult};
use crate::errors::EmailError;

pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Extract detailed error information from AWS SES SDK errors
pub(crate) fn extract_ses_error_details<E: std::fmt::Display + std::fmt::Debug>(
    e: &aws_sdk_sesv2::error::SdkError<E>,
) -> String {
    use aws_sdk_sesv2::error::SdkError;

    match e {
        SdkError::ServiceError(service_err) => format!("{}", service_err.err()),
        SdkError::TimeoutError(_) => "Request timed out".to_string(),
        SdkError::DispatchFailure(dispatch_err) => {
            if dispatch_err.is_io() {
                "Network error: unable to connect to AWS SES".to_string()
            } else if dispatch_err.is_timeout() {
                "Connection timed out".to_string()
            } else if dispatch_err.is_user() {
                format!("Configuration error: {:?}", dispatch_err)
            } else {
                format!("Connection failed: {:?}", dispatch_err)
            }
        }
        SdkError::ConstructionFailure(_) => "Invalid request configuration".to_string(),
        SdkError::ResponseError(resp_err) => {
            format!("Unexpected response from AWS: {:?}", resp_err)
        }
        _ => format!("{:?}", e),
    }
}

/// Connection settings for the process-wide SES client.
///
/// Static keys are optional; without them the default AWS credential chain
/// (environment, profile, instance role) is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SesSettings {
    pub region: String,
    /// Optional custom endpoint URL (LocalStack or another SES-compatible service)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,
}

impl Default for SesSettings {
    fn default() -> Self {
        Self {
            region: DEFAULT_AWS_REGION.to_string(),
            endpoint_url: None,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

impl SesSettings {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            ..Default::default()
        }
    }

    /// Build the SES client shared by sending and domain verification
    pub async fn connect(&self) -> Result<Client, EmailError> {
        if self.region.trim().is_empty() {
            return Err(EmailError::Configuration(
                "AWS region is required for SES".to_string(),
            ));
        }

        let mut config_builder = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()));

        match (&self.access_key_id, &self.secret_access_key) {
            (Some(key), Some(secret)) => {
                let creds = Credentials::new(key, secret, None, None, "mayl-email");
                config_builder = config_builder.credentials_provider(creds);
            }
            (None, None) => {}
            _ => {
                return Err(EmailError::Configuration(
                    "both AWS access key id and secret access key must be set".to_string(),
                ))
            }
        }

        if let Some(ref endpoint_url) = self.endpoint_url {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }

        let config = config_builder.load().await;
        Ok(Client::new(&config))
    }
}

/// AWS SES provider implementation
#[derive(Clone)]
pub struct SesProvider {
    client: Client,
}

impl SesProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn destination(message: &EmailMessage) -> Destination {
        let mut destination = Destination::builder().set_to_addresses(Some(message.to.clone()));
        if !message.cc.is_empty() {
            destination = destination.set_cc_addresses(Some(message.cc.clone()));
        }
        if !message.bcc.is_empty() {
            destination = destination.set_bcc_addresses(Some(message.bcc.clone()));
        }
        destination.build()
    }

    fn simple_content(message: &EmailMessage) -> Result<EmailContent, EmailError> {
        let mut body_builder = Body::builder();

        if let Some(html) = message.html_body() {
            body_builder =
                body_builder.html(Content::builder().data(html).build().map_err(|e| {
                    EmailError::AwsSes(format!("Failed to build HTML content: {}", e))
                })?);
        }

        if let Some(text) = message.text_body() {
            body_builder =
                body_builder.text(Content::builder().data(text).build().map_err(|e| {
                    EmailError::AwsSes(format!("Failed to build text content: {}", e))
                })?);
        }

        let simple = Message::builder()
            .subject(
                Content::builder()
                    .data(&message.subject)
                    .build()
                    .map_err(|e| EmailError::AwsSes(format!("Failed to build subject: {}", e)))?,
            )
            .body(body_builder.build())
            .build();

        Ok(EmailContent::builder().simple(simple).build())
    }

    fn raw_content(message: &EmailMessage) -> Result<EmailContent, EmailError> {
        let raw = RawMessage::builder()
            .data(Blob::new(build_mime_message(message)))
            .build()
            .map_err(|e| EmailError::AwsSes(format!("Failed to build raw message: {}", e)))?;

        Ok(EmailContent::builder().raw(raw).build())
    }

    /// The simple-content API has no room for attachments or arbitrary headers
    fn needs_raw(message: &EmailMessage) -> bool {
        !message.attachments.is_empty() || !message.headers.is_empty()
    }
}

#[async_trait]
impl EmailProvider for SesProvider {
    async fn send(&self, message: &EmailMessage) -> Result<SendResult, EmailError> {
        message.ensure_recipients()?;
        debug!("Sending email via SES from: {}", message.from);

        let content = if Self::needs_raw(message) {
            Self::raw_content(message)?
        } else {
            Self::simple_content(message)?
        };

        let mut send_request = self
            .client
            .send_email()
            .from_email_address(message.formatted_from())
            .destination(Self::destination(message))
            .content(content);

        if let Some(ref reply_to) = message.reply_to {
            send_request = send_request.reply_to_addresses(reply_to);
        }

        let result = send_request.send().await.map_err(|e| {
            let error_message = extract_ses_error_details(&e);
            error!("Failed to send email via SES: {}", error_message);
            EmailError::AwsSes(error_message)
        })?;

        let message_id = result.message_id().map(|id| id.to_string());
        debug!("Email sent via SES, message_id: {:?}", message_id);

        Ok(SendResult {
            message_id,
            provider: EmailProviderKind::Ses,
        })
    }

    fn provider_type(&self) -> EmailProviderKind {
        EmailProviderKind::Ses
    }
}
