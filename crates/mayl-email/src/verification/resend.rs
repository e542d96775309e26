//! Resend domain verification

use async_trait::async_trait;
use chrono::Utc;
use mayl_entities::custom_domains;
use mayl_entities::types::{CustomDomainStatus, DnsRecord};
use tracing::{debug, info};

use super::traits::{
    apply_outcome, reset_for_retry, DomainVerificationProvider, VerificationOutcome,
    VerificationProviderType,
};
use crate::errors::EmailError;
use crate::providers::{ResendClient, ResendDomainRecord};

const RESEND_RECORD_TTL: u32 = 3600;

/// Resend returns record names relative to the domain (`send`,
/// `resend._domainkey`); DNS lookups need the fully qualified name.
fn qualify_record_name(name: &str, domain: &str) -> String {
    let name = name.trim().trim_end_matches('.');
    if name.is_empty() || name == "@" || name.eq_ignore_ascii_case(domain) {
        return domain.to_string();
    }
    let suffix = format!(".{}", domain.to_ascii_lowercase());
    if name.to_ascii_lowercase().ends_with(&suffix) {
        name.to_string()
    } else {
        format!("{}.{}", name, domain)
    }
}

fn to_dns_record(record: &ResendDomainRecord, domain: &str) -> DnsRecord {
    let mut dns = DnsRecord::new(
        &record.record_type.to_ascii_uppercase(),
        qualify_record_name(&record.name, domain),
        record.value.clone(),
    )
    .with_ttl(RESEND_RECORD_TTL);
    if let Some(priority) = record.priority() {
        dns = dns.with_priority(priority);
    }
    dns
}

fn outcome_from_resend(status: &str) -> VerificationOutcome {
    match status {
        "verified" => VerificationOutcome::Verified,
        "failed" => VerificationOutcome::Failed("Domain verification failed in Resend".to_string()),
        // pending, not_started, temporary_failure and anything new
        _ => VerificationOutcome::Pending,
    }
}

pub struct ResendVerificationProvider {
    client: ResendClient,
    region: String,
}

impl ResendVerificationProvider {
    pub fn new(client: ResendClient, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn resend_domain_id(domain: &custom_domains::Model) -> Option<String> {
        domain
            .provider_domain_id
            .clone()
            .or_else(|| domain.metadata_str("resend_domain_id").map(str::to_string))
            .filter(|id| !id.is_empty())
    }
}

#[async_trait]
impl DomainVerificationProvider for ResendVerificationProvider {
    async fn initiate(&self, domain: &mut custom_domains::Model) -> Result<(), EmailError> {
        debug!("Creating Resend domain: {}", domain.domain);

        let created = self
            .client
            .create_domain(&domain.domain, &self.region)
            .await?;

        let records: Vec<DnsRecord> = created
            .records
            .iter()
            .map(|record| to_dns_record(record, &domain.domain))
            .collect();

        domain.set_required_dns_records(&records)?;
        domain.provider_domain_id = Some(created.id.clone());
        domain.provider_verification_status = Some(created.status.clone());
        domain.set_metadata("resend_domain_id", created.id);
        domain.set_metadata(
            "resend_region",
            created.region.unwrap_or_else(|| self.region.clone()),
        );
        domain.status = CustomDomainStatus::Pending;
        domain.verification_attempted_at = Some(Utc::now());

        Ok(())
    }

    async fn check_status(&self, domain: &mut custom_domains::Model) -> Result<(), EmailError> {
        let id = Self::resend_domain_id(domain).ok_or_else(|| {
            EmailError::ProviderError(format!(
                "Resend domain ID not found for {}",
                domain.domain
            ))
        })?;

        let remote = self.client.get_domain(&id).await?;
        debug!("Resend status for {}: {}", domain.domain, remote.status);

        domain.provider_verification_status = Some(remote.status.clone());
        apply_outcome(domain, outcome_from_resend(&remote.status));

        Ok(())
    }

    async fn delete_identity(&self, domain: &custom_domains::Model) -> Result<(), EmailError> {
        if let Some(id) = Self::resend_domain_id(domain) {
            return self.client.delete_domain(&id).await;
        }

        let remote = self
            .client
            .list_domains()
            .await?
            .into_iter()
            .find(|d| d.name.eq_ignore_ascii_case(&domain.domain));

        match remote {
            Some(remote) => self.client.delete_domain(&remote.id).await,
            None => {
                info!("Resend has no domain named {}, nothing to delete", domain.domain);
                Ok(())
            }
        }
    }

    async fn retry(&self, domain: &mut custom_domains::Model) -> Result<(), EmailError> {
        reset_for_retry(domain);

        let Some(id) = Self::resend_domain_id(domain) else {
            return self.initiate(domain).await;
        };

        self.client.verify_domain(&id).await?;
        domain.verification_attempted_at = Some(Utc::now());
        Ok(())
    }

    fn provider_type(&self) -> VerificationProviderType {
        VerificationProviderType::Resend
    }
}
