//! Error types for the email service

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum EmailError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Domain not found: {0}")]
    DomainNotFound(Uuid),

    #[error("Email not found: {0}")]
    EmailNotFound(Uuid),

    #[error("Sender address not found: {0}")]
    SenderNotFound(Uuid),

    #[error("Domain not verified: {0}")]
    DomainNotVerified(String),

    #[error("Invalid provider type: {0}")]
    InvalidProviderType(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("AWS SES error: {0}")]
    AwsSes(String),

    #[error("Resend error: {0}")]
    Resend(String),

    #[error("SendGrid error: {0}")]
    SendGrid(String),

    #[error("DNS error: {0}")]
    Dns(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl EmailError {
    /// Errors that no amount of retrying will fix: missing providers,
    /// missing credentials or an unknown provider name.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            EmailError::Configuration(_) | EmailError::InvalidProviderType(_)
        )
    }
}

impl From<serde_json::Error> for EmailError {
    fn from(err: serde_json::Error) -> Self {
        EmailError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for EmailError {
    fn from(err: reqwest::Error) -> Self {
        EmailError::ProviderError(err.to_string())
    }
}
