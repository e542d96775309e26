//! Startup configuration: which providers are active, their credentials,
//! and the loop timings
//!
//! Everything here is read once at process start and resolved into concrete
//! adapter instances; nothing is re-read at runtime.

use std::sync::Arc;
use std::time::Duration;

use aws_sdk_sesv2::Client as SesClient;
use tracing::{info, warn};

use crate::delivery::DeliveryService;
use crate::errors::EmailError;
use crate::providers::{
    EmailProvider, EmailProviderKind, ResendClient, ResendProvider, SendGridProvider,
    SesProvider, SesSettings, DEFAULT_RESEND_REGION,
};
use crate::verification::{
    DomainVerificationProvider, ResendVerificationProvider, SesVerificationProvider,
    VerificationProviderRegistry, VerificationProviderType,
};

/// Credentials for every backend the process may talk to
#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    /// `None` disables SES for both sending and verification
    pub ses: Option<SesSettings>,
    pub resend_api_key: Option<String>,
    pub resend_region: String,
    pub sendgrid_api_key: Option<String>,
}

impl Default for ProviderCredentials {
    fn default() -> Self {
        Self {
            ses: None,
            resend_api_key: None,
            resend_region: DEFAULT_RESEND_REGION.to_string(),
            sendgrid_api_key: None,
        }
    }
}

/// Process-wide client handles, created once and shared by every loop
#[derive(Clone, Default)]
pub struct ProviderClients {
    ses: Option<SesClient>,
    resend: Option<ResendClient>,
    resend_region: String,
    sendgrid_api_key: Option<String>,
}

impl ProviderClients {
    pub async fn connect(credentials: &ProviderCredentials) -> Result<Self, EmailError> {
        let ses = match &credentials.ses {
            Some(settings) => Some(settings.connect().await?),
            None => None,
        };

        let resend = credentials
            .resend_api_key
            .as_deref()
            .map(ResendClient::new)
            .transpose()?;

        Ok(Self {
            ses,
            resend,
            resend_region: credentials.resend_region.clone(),
            sendgrid_api_key: credentials.sendgrid_api_key.clone(),
        })
    }

    fn ses_client(&self) -> Result<SesClient, EmailError> {
        self.ses.clone().ok_or_else(|| {
            EmailError::Configuration("SES selected but no AWS settings configured".to_string())
        })
    }

    fn resend_client(&self) -> Result<ResendClient, EmailError> {
        self.resend.clone().ok_or_else(|| {
            EmailError::Configuration("Resend selected but no API key configured".to_string())
        })
    }

    pub fn email_provider(
        &self,
        kind: EmailProviderKind,
    ) -> Result<Arc<dyn EmailProvider>, EmailError> {
        let provider: Arc<dyn EmailProvider> = match kind {
            EmailProviderKind::Ses => Arc::new(SesProvider::new(self.ses_client()?)),
            EmailProviderKind::Resend => Arc::new(ResendProvider::new(self.resend_client()?)),
            EmailProviderKind::SendGrid => {
                let api_key = self.sendgrid_api_key.as_deref().ok_or_else(|| {
                    EmailError::Configuration(
                        "SendGrid selected but no API key configured".to_string(),
                    )
                })?;
                Arc::new(SendGridProvider::new(api_key)?)
            }
        };
        Ok(provider)
    }

    pub fn verification_provider(
        &self,
        kind: VerificationProviderType,
    ) -> Result<Arc<dyn DomainVerificationProvider>, EmailError> {
        let provider: Arc<dyn DomainVerificationProvider> = match kind {
            VerificationProviderType::Ses => {
                Arc::new(SesVerificationProvider::new(self.ses_client()?))
            }
            VerificationProviderType::Resend => Arc::new(ResendVerificationProvider::new(
                self.resend_client()?,
                self.resend_region.clone(),
            )),
        };
        Ok(provider)
    }
}

/// Primary and optional fallback sending provider
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailProviderSettings {
    pub primary: Option<EmailProviderKind>,
    pub fallback: Option<EmailProviderKind>,
}

impl EmailProviderSettings {
    pub fn from_names(primary: Option<&str>, fallback: Option<&str>) -> Result<Self, EmailError> {
        let parse = |name: Option<&str>| {
            name.filter(|n| !n.trim().is_empty())
                .map(EmailProviderKind::from_str)
                .transpose()
        };

        Ok(Self {
            primary: parse(primary)?,
            fallback: parse(fallback)?,
        })
    }

    /// Every provider this configuration needs credentials for
    pub fn kinds(&self) -> Vec<EmailProviderKind> {
        let mut kinds: Vec<_> = self.primary.into_iter().chain(self.fallback).collect();
        kinds.dedup();
        kinds
    }

    pub fn build_delivery(&self, clients: &ProviderClients) -> Result<DeliveryService, EmailError> {
        let primary = self.primary.map(|k| clients.email_provider(k)).transpose()?;

        let fallback = match (self.primary, self.fallback) {
            (Some(p), Some(f)) if p == f => {
                warn!("Fallback email provider {} is the same as the primary, ignoring", f);
                None
            }
            (_, Some(f)) => Some(clients.email_provider(f)?),
            (_, None) => None,
        };

        match (&primary, &fallback) {
            (None, None) => warn!("No email provider configured, sends will fail"),
            _ => info!(
                "Email delivery: primary={}, fallback={}",
                self.primary.map(|k| k.to_string()).unwrap_or_else(|| "none".into()),
                fallback
                    .as_ref()
                    .map(|p| p.provider_type().to_string())
                    .unwrap_or_else(|| "none".into())
            ),
        }

        Ok(DeliveryService::new(primary, fallback))
    }
}

/// Enabled verification providers; the first is the default for new domains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationSettings {
    pub providers: Vec<VerificationProviderType>,
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            providers: vec![VerificationProviderType::Ses],
        }
    }
}

impl VerificationSettings {
    /// Parse a comma separated list such as `"ses,resend"`
    pub fn from_list(list: &str) -> Result<Self, EmailError> {
        let mut providers = Vec::new();
        for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let kind = VerificationProviderType::from_str(name)?;
            if !providers.contains(&kind) {
                providers.push(kind);
            }
        }
        Ok(Self { providers })
    }

    pub fn build_registry(
        &self,
        clients: &ProviderClients,
    ) -> Result<VerificationProviderRegistry, EmailError> {
        let mut registry = VerificationProviderRegistry::new();
        for kind in &self.providers {
            registry = registry.register(clients.verification_provider(*kind)?);
        }
        Ok(registry)
    }
}

/// Loop intervals and batch limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub scheduled_interval: Duration,
    pub queued_interval: Duration,
    pub cleanup_interval: Duration,
    pub verification_interval: Duration,
    pub dispatch_batch_size: u64,
    pub verification_batch_size: u64,
    /// Domains attempted more recently than this are left alone
    pub verification_staleness: Duration,
    pub verification_domain_delay: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            scheduled_interval: Duration::from_secs(30),
            queued_interval: Duration::from_secs(10),
            cleanup_interval: Duration::from_secs(60 * 60),
            verification_interval: Duration::from_secs(15 * 60),
            dispatch_batch_size: 100,
            verification_batch_size: 50,
            verification_staleness: Duration::from_secs(10 * 60),
            verification_domain_delay: Duration::from_secs(1),
        }
    }
}
