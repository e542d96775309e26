//! Domain verification provider trait definitions

use async_trait::async_trait;
use chrono::Utc;
use mayl_entities::custom_domains;
use mayl_entities::types::CustomDomainStatus;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::EmailError;

/// Supported domain verification backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationProviderType {
    Ses,
    Resend,
}

impl std::fmt::Display for VerificationProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl VerificationProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationProviderType::Ses => "ses",
            VerificationProviderType::Resend => "resend",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, EmailError> {
        match s.trim().to_lowercase().as_str() {
            "ses" | "aws_ses" | "aws-ses" => Ok(VerificationProviderType::Ses),
            "resend" => Ok(VerificationProviderType::Resend),
            _ => Err(EmailError::InvalidProviderType(s.to_string())),
        }
    }
}

/// A provider's native status folded into the local state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Pending,
    Verified,
    Failed(String),
}

/// Write `outcome` onto the domain. `verified_at` is only ever set the first
/// time the domain reaches `verified`.
pub fn apply_outcome(domain: &mut custom_domains::Model, outcome: VerificationOutcome) {
    let previous = domain.status;

    match outcome {
        VerificationOutcome::Verified => {
            domain.status = CustomDomainStatus::Verified;
            domain.failure_reason = None;
            if domain.verified_at.is_none() {
                domain.verified_at = Some(Utc::now());
            }
        }
        VerificationOutcome::Pending => {
            domain.status = CustomDomainStatus::Pending;
            domain.failure_reason = None;
        }
        VerificationOutcome::Failed(reason) => {
            domain.status = CustomDomainStatus::Failed;
            domain.failure_reason = Some(reason);
        }
    }

    if previous != domain.status {
        info!(
            "Domain {} status changed from {} to {}",
            domain.domain, previous, domain.status
        );
    }
}

/// Local reset shared by every provider's retry
pub fn reset_for_retry(domain: &mut custom_domains::Model) {
    domain.status = CustomDomainStatus::Pending;
    domain.failure_reason = None;
    domain.verified_at = None;
}

/// Uniform interface to a concrete domain-identity verification backend.
///
/// Implementations only mutate the passed model; persisting it is the
/// caller's job.
#[async_trait]
pub trait DomainVerificationProvider: Send + Sync {
    /// Register the domain with the provider and capture the DNS records it
    /// issues, its opaque domain id, and `verification_attempted_at`.
    async fn initiate(&self, domain: &mut custom_domains::Model) -> Result<(), EmailError>;

    /// Re-fetch the provider's status and map it onto pending/verified/failed
    async fn check_status(&self, domain: &mut custom_domains::Model) -> Result<(), EmailError>;

    /// Deregister by provider domain id, falling back to the domain name
    async fn delete_identity(&self, domain: &custom_domains::Model) -> Result<(), EmailError>;

    /// Reset local state, then re-trigger verification for an existing
    /// identity or initiate from scratch when there is none
    async fn retry(&self, domain: &mut custom_domains::Model) -> Result<(), EmailError>;

    fn provider_type(&self) -> VerificationProviderType;
}
