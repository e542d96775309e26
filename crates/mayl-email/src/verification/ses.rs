//! AWS SES domain identity verification

use async_trait::async_trait;
use aws_sdk_sesv2::Client;
use chrono::Utc;
use mayl_entities::custom_domains;
use mayl_entities::types::{CustomDomainStatus, DnsRecord};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::traits::{
    apply_outcome, reset_for_retry, DomainVerificationProvider, VerificationOutcome,
    VerificationProviderType,
};
use crate::errors::EmailError;
use crate::providers::extract_ses_error_details;

const DKIM_RECORD_TTL: u32 = 1800;

/// One DKIM CNAME per token, published on the root domain
fn dkim_records(domain: &str, tokens: &[String]) -> Vec<DnsRecord> {
    tokens
        .iter()
        .map(|token| {
            DnsRecord::new(
                "CNAME",
                format!("{}._domainkey.{}", token, domain),
                format!("{}.dkim.amazonses.com", token),
            )
            .with_ttl(DKIM_RECORD_TTL)
        })
        .collect()
}

fn dkim_token_map(tokens: &[String]) -> Value {
    let map: Map<String, Value> = tokens
        .iter()
        .enumerate()
        .map(|(i, token)| (format!("token_{}", i), Value::String(token.clone())))
        .collect();
    Value::Object(map)
}

/// Map SES identity and DKIM statuses (`SUCCESS`, `PENDING`, `FAILED`,
/// `TEMPORARY_FAILURE`, `NOT_STARTED`). Verified needs both to succeed.
pub(crate) fn outcome_from_ses(
    verification_status: Option<&str>,
    dkim_status: Option<&str>,
) -> VerificationOutcome {
    match (verification_status, dkim_status) {
        (Some("SUCCESS"), Some("SUCCESS")) => VerificationOutcome::Verified,
        (Some("FAILED"), _) => {
            VerificationOutcome::Failed("Domain verification failed in SES".to_string())
        }
        (_, Some("FAILED")) => {
            VerificationOutcome::Failed("DKIM verification failed in SES".to_string())
        }
        _ => VerificationOutcome::Pending,
    }
}

pub struct SesVerificationProvider {
    client: Client,
}

impl SesVerificationProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn identity_name(domain: &custom_domains::Model) -> &str {
        domain
            .provider_domain_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(&domain.domain)
    }

    /// Fetch `(verification status, dkim status, dkim tokens)` for an identity
    async fn fetch_identity(
        &self,
        identity: &str,
    ) -> Result<(Option<String>, Option<String>, Vec<String>), EmailError> {
        let result = self
            .client
            .get_email_identity()
            .email_identity(identity)
            .send()
            .await
            .map_err(|e| {
                EmailError::AwsSes(format!(
                    "Failed to get identity: {}",
                    extract_ses_error_details(&e)
                ))
            })?;

        let verification_status = result
            .verification_status()
            .map(|s| s.as_str().to_string());
        let dkim = result.dkim_attributes();
        let dkim_status = dkim
            .and_then(|attrs| attrs.status())
            .map(|s| s.as_str().to_string());
        let tokens = dkim
            .and_then(|attrs| attrs.tokens.clone())
            .unwrap_or_default();

        Ok((verification_status, dkim_status, tokens))
    }
}

#[async_trait]
impl DomainVerificationProvider for SesVerificationProvider {
    async fn initiate(&self, domain: &mut custom_domains::Model) -> Result<(), EmailError> {
        debug!("Creating SES identity for domain: {}", domain.domain);

        let created_tokens = match self
            .client
            .create_email_identity()
            .email_identity(&domain.domain)
            .send()
            .await
        {
            Ok(output) => output
                .dkim_attributes()
                .and_then(|attrs| attrs.tokens.clone())
                .unwrap_or_default(),
            Err(e)
                if e.as_service_error()
                    .map(|se| se.is_already_exists_exception())
                    .unwrap_or(false) =>
            {
                debug!(
                    "SES identity for {} already exists, reusing it",
                    domain.domain
                );
                Vec::new()
            }
            Err(e) => {
                return Err(EmailError::AwsSes(format!(
                    "Failed to create identity: {}",
                    extract_ses_error_details(&e)
                )))
            }
        };

        let (verification_status, dkim_status, identity_tokens) =
            self.fetch_identity(&domain.domain).await?;

        let tokens = if created_tokens.is_empty() {
            identity_tokens
        } else {
            created_tokens
        };

        domain.set_required_dns_records(&dkim_records(&domain.domain, &tokens))?;
        domain.dkim_tokens = Some(dkim_token_map(&tokens));
        domain.provider_domain_id = Some(domain.domain.clone());
        domain.provider_verification_status = verification_status;
        domain.provider_dkim_status = dkim_status;
        domain.status = CustomDomainStatus::Pending;
        domain.verification_attempted_at = Some(Utc::now());

        Ok(())
    }

    async fn check_status(&self, domain: &mut custom_domains::Model) -> Result<(), EmailError> {
        debug!("Checking SES identity for domain: {}", domain.domain);

        let identity = Self::identity_name(domain).to_string();
        let (verification_status, dkim_status, _) = self.fetch_identity(&identity).await?;

        let outcome = outcome_from_ses(verification_status.as_deref(), dkim_status.as_deref());
        domain.provider_verification_status = verification_status;
        domain.provider_dkim_status = dkim_status;
        apply_outcome(domain, outcome);

        Ok(())
    }

    async fn delete_identity(&self, domain: &custom_domains::Model) -> Result<(), EmailError> {
        let identity = Self::identity_name(domain);
        debug!("Deleting SES identity: {}", identity);

        match self
            .client
            .delete_email_identity()
            .email_identity(identity)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e)
                if e.as_service_error()
                    .map(|se| se.is_not_found_exception())
                    .unwrap_or(false) =>
            {
                warn!("SES identity {} was already gone", identity);
                Ok(())
            }
            Err(e) => Err(EmailError::AwsSes(format!(
                "Failed to delete identity: {}",
                extract_ses_error_details(&e)
            ))),
        }
    }

    async fn retry(&self, domain: &mut custom_domains::Model) -> Result<(), EmailError> {
        reset_for_retry(domain);

        // SES re-verifies existing identities on its own; re-reading the
        // status keeps the issued DKIM records stable.
        if domain.provider_domain_id.is_none() {
            return self.initiate(domain).await;
        }

        self.check_status(domain).await?;
        domain.verification_attempted_at = Some(Utc::now());
        Ok(())
    }

    fn provider_type(&self) -> VerificationProviderType {
        VerificationProviderType::Ses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dkim_records_shape() {
        let records = dkim_records("example.com", &["abc".to_string(), "def".to_string()]);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].record_type, "CNAME");
        assert_eq!(records[0].name, "abc._domainkey.example.com");
        assert_eq!(records[0].value, "abc.dkim.amazonses.com");
        assert_eq!(records[0].ttl, Some(1800));
        assert_eq!(records[1].name, "def._domainkey.example.com");
    }

    #[test]
    fn test_dkim_token_map() {
        let map = dkim_token_map(&["abc".to_string(), "def".to_string()]);
        assert_eq!(map["token_0"], "abc");
        assert_eq!(map["token_1"], "def");
    }

    #[test]
    fn test_outcome_requires_identity_and_dkim_success() {
        assert_eq!(
            outcome_from_ses(Some("SUCCESS"), Some("SUCCESS")),
            VerificationOutcome::Verified
        );
        assert_eq!(
            outcome_from_ses(Some("SUCCESS"), Some("PENDING")),
            VerificationOutcome::Pending
        );
        assert_eq!(
            outcome_from_ses(Some("PENDING"), Some("SUCCESS")),
            VerificationOutcome::Pending
        );
        assert_eq!(outcome_from_ses(None, None), VerificationOutcome::Pending);
        assert_eq!(
            outcome_from_ses(Some("TEMPORARY_FAILURE"), Some("TEMPORARY_FAILURE")),
            VerificationOutcome::Pending
        );
    }

    #[test]
    fn test_failed_statuses() {
        assert_eq!(
            outcome_from_ses(Some("FAILED"), Some("SUCCESS")),
            VerificationOutcome::Failed("Domain verification failed in SES".to_string())
        );
        assert_eq!(
            outcome_from_ses(Some("SUCCESS"), Some("FAILED")),
            VerificationOutcome::Failed("DKIM verification failed in SES".to_string())
        );
    }

    #[test]
    fn test_identity_name_prefers_provider_id() {
        let mut domain =
            custom_domains::Model::new_pending(uuid::Uuid::new_v4(), "example.com", "ses");
        assert_eq!(SesVerificationProvider::identity_name(&domain), "example.com");

        domain.provider_domain_id = Some("mail.example.com".to_string());
        assert_eq!(
            SesVerificationProvider::identity_name(&domain),
            "mail.example.com"
        );
    }
}
