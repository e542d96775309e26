//! Custom domain verification: the periodic orchestrator and the
//! on-demand domain operations

use chrono::Utc;
use mayl_core::DBDateTime;
use mayl_entities::custom_domains;
use mayl_entities::types::CustomDomainStatus;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::dns::{DnsValidationResult, DnsValidator};
use crate::errors::EmailError;
use crate::settings::SchedulerSettings;
use crate::store::CustomDomainStore;
use crate::verification::{
    DomainVerificationProvider, VerificationProviderRegistry, VerificationProviderType,
};

/// Result of reconciling one domain against DNS and its provider
#[derive(Debug, Clone)]
pub struct DomainReconciliation {
    pub domain: custom_domains::Model,
    pub dns: DnsValidationResult,
    /// `false` when the DNS gate kept the provider from being asked
    pub provider_checked: bool,
}

/// Summary of one orchestrator tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    pub selected: usize,
    pub verified: usize,
    pub pending: usize,
    pub failed: usize,
    pub dns_incomplete: usize,
    pub errors: usize,
}

impl VerificationReport {
    fn tally(&mut self, reconciliation: &DomainReconciliation) {
        if !reconciliation.provider_checked {
            self.dns_incomplete += 1;
            return;
        }
        match reconciliation.domain.status {
            CustomDomainStatus::Verified => self.verified += 1,
            CustomDomainStatus::Failed => self.failed += 1,
            _ => self.pending += 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selected == 0
    }
}

/// Lowercase, trim, and strip a URL scheme or `www.` prefix
pub fn normalize_domain_name(name: &str) -> Result<String, EmailError> {
    let mut name = name.trim().to_lowercase();
    for prefix in ["http://", "https://", "www."] {
        if let Some(rest) = name.strip_prefix(prefix) {
            name = rest.to_string();
        }
    }

    if name.is_empty() {
        return Err(EmailError::Validation("domain name is required".to_string()));
    }
    if name.contains('/') {
        return Err(EmailError::Validation(format!(
            "invalid domain name: {}",
            name
        )));
    }
    Ok(name)
}

pub struct DomainVerificationService {
    domains: Arc<dyn CustomDomainStore>,
    registry: VerificationProviderRegistry,
    dns: DnsValidator,
    batch_size: u64,
    staleness: chrono::Duration,
    domain_delay: Duration,
}

impl DomainVerificationService {
    pub fn new(
        domains: Arc<dyn CustomDomainStore>,
        registry: VerificationProviderRegistry,
        dns: DnsValidator,
    ) -> Self {
        Self::with_settings(domains, registry, dns, &SchedulerSettings::default())
    }

    pub fn with_settings(
        domains: Arc<dyn CustomDomainStore>,
        registry: VerificationProviderRegistry,
        dns: DnsValidator,
        settings: &SchedulerSettings,
    ) -> Self {
        Self {
            domains,
            registry,
            dns,
            batch_size: settings.verification_batch_size,
            staleness: chrono::Duration::seconds(settings.verification_staleness.as_secs() as i64),
            domain_delay: settings.verification_domain_delay,
        }
    }

    /// One orchestrator tick: reconcile every stale pending/failed domain,
    /// pausing between domains to stay under provider rate limits.
    pub async fn run_verification_batch(
        &self,
        now: DBDateTime,
    ) -> Result<VerificationReport, EmailError> {
        let due = self
            .domains
            .due_for_verification(now - self.staleness, self.batch_size)
            .await?;

        let mut report = VerificationReport {
            selected: due.len(),
            ..Default::default()
        };

        for (index, candidate) in due.into_iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.domain_delay).await;
            }

            // The row may have changed or gone since the batch was selected
            let domain = match self.domains.get(candidate.id).await {
                Ok(Some(domain)) => domain,
                Ok(None) => {
                    debug!("Domain {} disappeared before verification", candidate.domain);
                    continue;
                }
                Err(e) => {
                    error!("Failed to load domain {}: {}", candidate.domain, e);
                    report.errors += 1;
                    continue;
                }
            };

            let name = domain.domain.clone();
            match self.reconcile_at(domain, now).await {
                Ok(reconciliation) => report.tally(&reconciliation),
                Err(e) => {
                    warn!("Verification check for domain {} failed: {}", name, e);
                    report.errors += 1;
                }
            }
        }

        if !report.is_empty() {
            info!(
                "Domain verification: {} checked, {} verified, {} pending, {} failed, {} awaiting DNS",
                report.selected,
                report.verified,
                report.pending,
                report.failed,
                report.dns_incomplete
            );
        }
        Ok(report)
    }

    /// Gate on live DNS, then ask the provider. When DNS is incomplete the
    /// DNS summary becomes the failure reason and the provider is skipped.
    pub async fn reconcile(
        &self,
        domain: custom_domains::Model,
    ) -> Result<DomainReconciliation, EmailError> {
        self.reconcile_at(domain, Utc::now()).await
    }

    /// Every consultation stamps `verification_attempted_at`, so a checked
    /// domain stays out of the poll set for the staleness window.
    async fn reconcile_at(
        &self,
        mut domain: custom_domains::Model,
        now: DBDateTime,
    ) -> Result<DomainReconciliation, EmailError> {
        domain.verification_attempted_at = Some(now);
        let dns = self.dns.validate(&domain).await?;

        if !dns.all_records_present {
            debug!("DNS for {} incomplete: {}", domain.domain, dns.summary);
            domain.failure_reason = Some(dns.summary.clone());
            let domain = self.domains.update(&domain).await?;
            return Ok(DomainReconciliation {
                domain,
                dns,
                provider_checked: false,
            });
        }

        let provider = self.registry.get(&domain.verification_provider)?;
        if let Err(e) = provider.check_status(&mut domain).await {
            self.domains.update(&domain).await?;
            return Err(e);
        }
        let domain = self.domains.update(&domain).await?;

        Ok(DomainReconciliation {
            domain,
            dns,
            provider_checked: true,
        })
    }

    async fn get_owned(
        &self,
        account_id: Uuid,
        id: Uuid,
    ) -> Result<custom_domains::Model, EmailError> {
        self.domains
            .get(id)
            .await?
            .filter(|d| d.account_id == account_id)
            .ok_or(EmailError::DomainNotFound(id))
    }

    fn provider_for(
        &self,
        domain: &custom_domains::Model,
    ) -> Result<Arc<dyn DomainVerificationProvider>, EmailError> {
        self.registry.get(&domain.verification_provider)
    }

    /// Claim a domain and register it with a verification provider.
    ///
    /// A provider failure during initiation does not fail the call; it is
    /// kept as the domain's failure reason so the user can retry.
    pub async fn create_domain(
        &self,
        account_id: Uuid,
        name: &str,
        provider: Option<VerificationProviderType>,
    ) -> Result<custom_domains::Model, EmailError> {
        let name = normalize_domain_name(name)?;

        if self.domains.find_by_name(&name).await?.is_some() {
            return Err(EmailError::Validation(format!(
                "domain {} is already registered",
                name
            )));
        }

        let kind = match provider {
            Some(kind) => kind,
            None => self.registry.default_type()?,
        };
        let adapter = self.registry.get_type(kind)?;

        let mut domain = self
            .domains
            .insert(custom_domains::Model::new_pending(
                account_id,
                &name,
                kind.as_str(),
            ))
            .await?;

        if let Err(e) = adapter.initiate(&mut domain).await {
            error!("Failed to initiate verification for {}: {}", name, e);
            domain.failure_reason = Some(e.to_string());
        }

        let domain = self.domains.update(&domain).await?;
        info!(
            "Created custom domain {} ({}) via {}",
            domain.domain, domain.id, kind
        );
        Ok(domain)
    }

    /// Re-run provider initiation for an existing domain
    pub async fn initiate_verification(
        &self,
        account_id: Uuid,
        id: Uuid,
    ) -> Result<custom_domains::Model, EmailError> {
        let mut domain = self.get_owned(account_id, id).await?;
        self.provider_for(&domain)?.initiate(&mut domain).await?;
        domain.failure_reason = None;
        self.domains.update(&domain).await
    }

    /// Force a reconciliation now, outside the orchestrator's schedule
    pub async fn recheck(
        &self,
        account_id: Uuid,
        id: Uuid,
    ) -> Result<DomainReconciliation, EmailError> {
        let domain = self.get_owned(account_id, id).await?;
        self.reconcile(domain).await
    }

    pub async fn retry(
        &self,
        account_id: Uuid,
        id: Uuid,
    ) -> Result<custom_domains::Model, EmailError> {
        let mut domain = self.get_owned(account_id, id).await?;
        self.provider_for(&domain)?.retry(&mut domain).await?;
        info!("Retrying verification for {}", domain.domain);
        self.domains.update(&domain).await
    }

    /// Live DNS check; does not touch the stored domain
    pub async fn validate_dns(
        &self,
        account_id: Uuid,
        id: Uuid,
    ) -> Result<DnsValidationResult, EmailError> {
        let domain = self.get_owned(account_id, id).await?;
        self.dns.validate(&domain).await
    }

    pub async fn get(
        &self,
        account_id: Uuid,
        id: Uuid,
    ) -> Result<custom_domains::Model, EmailError> {
        self.get_owned(account_id, id).await
    }

    /// Delete locally; provider deregistration is best effort
    pub async fn delete(&self, account_id: Uuid, id: Uuid) -> Result<(), EmailError> {
        let domain = self.get_owned(account_id, id).await?;

        match self.provider_for(&domain) {
            Ok(provider) => {
                if let Err(e) = provider.delete_identity(&domain).await {
                    error!(
                        "Failed to delete domain {} from provider (continuing anyway): {}",
                        domain.domain, e
                    );
                }
            }
            Err(e) => warn!(
                "No provider to deregister {} from (continuing anyway): {}",
                domain.domain, e
            ),
        }

        self.domains.delete(domain.id).await?;
        info!("Deleted custom domain {}", domain.domain);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::StaticDnsLookup;
    use crate::store::memory::MemoryCustomDomainStore;
    use crate::verification::{MockVerificationProvider, VerificationOutcome};
    use chrono::{Duration as ChronoDuration, Utc};
    use mayl_entities::types::DnsRecord;

    fn required_records() -> Vec<DnsRecord> {
        vec![
            DnsRecord::new("TXT", "_amazonses.example.com", "tok123"),
            DnsRecord::new(
                "CNAME",
                "abc._domainkey.example.com",
                "abc.dkim.amazonses.com",
            ),
        ]
    }

    struct Fixture {
        store: MemoryCustomDomainStore,
        provider: MockVerificationProvider,
        account_id: Uuid,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: MemoryCustomDomainStore::new(),
                provider: MockVerificationProvider::new(VerificationProviderType::Ses)
                    .with_records(required_records()),
                account_id: Uuid::new_v4(),
            }
        }

        fn service(&self, lookup: StaticDnsLookup) -> DomainVerificationService {
            let registry =
                VerificationProviderRegistry::new().register(Arc::new(self.provider.clone()));
            DomainVerificationService::new(
                Arc::new(self.store.clone()),
                registry,
                DnsValidator::with_lookup(Arc::new(lookup)),
            )
        }

        fn domain(&self, name: &str, attempted_ago: Option<i64>) -> custom_domains::Model {
            let mut domain = custom_domains::Model::new_pending(self.account_id, name, "ses");
            domain.set_required_dns_records(&required_records()).unwrap();
            domain.provider_domain_id = Some(name.to_string());
            domain.verification_attempted_at =
                attempted_ago.map(|mins| Utc::now() - ChronoDuration::minutes(mins));
            self.store.put(domain.clone());
            domain
        }
    }

    #[test]
    fn test_normalize_domain_name() {
        assert_eq!(
            normalize_domain_name("  HTTPS://www.Example.COM ").unwrap(),
            "example.com"
        );
        assert_eq!(normalize_domain_name("mail.example.com").unwrap(), "mail.example.com");
        assert!(normalize_domain_name("   ").is_err());
        assert!(normalize_domain_name("https://").is_err());
        assert!(normalize_domain_name("example.com/path").is_err());
    }

    #[tokio::test]
    async fn test_incomplete_dns_skips_provider() {
        let fx = Fixture::new();
        let domain = fx.domain("example.com", None);
        let lookup = StaticDnsLookup::new().with_cname(
            "abc._domainkey.example.com",
            "abc.dkim.amazonses.com",
        );

        let now = Utc::now();
        let report = fx
            .service(lookup)
            .run_verification_batch(now)
            .await
            .unwrap();

        assert_eq!(report.dns_incomplete, 1);
        assert_eq!(fx.provider.check_call_count(), 0);

        let stored = fx.store.domain(domain.id).unwrap();
        assert_eq!(stored.status, CustomDomainStatus::Pending);
        assert_eq!(stored.verification_attempted_at, Some(now));
        assert_eq!(
            stored.failure_reason.as_deref(),
            Some("1 of 2 DNS records are configured correctly")
        );
    }

    #[tokio::test]
    async fn test_verified_at_is_set_once_across_ticks() {
        let fx = Fixture::new();
        let domain = fx.domain("example.com", None);
        let service = fx.service(StaticDnsLookup::serving(&required_records()));

        let report = service.reconcile(fx.store.domain(domain.id).unwrap()).await.unwrap();
        assert!(report.provider_checked);
        assert_eq!(report.domain.status, CustomDomainStatus::Verified);
        let first = report.domain.verified_at.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let again = service.reconcile(fx.store.domain(domain.id).unwrap()).await.unwrap();
        assert_eq!(again.domain.verified_at, Some(first));
        assert_eq!(fx.provider.check_call_count(), 2);
    }

    #[tokio::test]
    async fn test_verified_domains_leave_the_poll_set() {
        let fx = Fixture::new();
        fx.domain("example.com", None);
        let service = fx.service(StaticDnsLookup::serving(&required_records()));

        let report = service.run_verification_batch(Utc::now()).await.unwrap();
        assert_eq!(report.verified, 1);

        let report = service.run_verification_batch(Utc::now()).await.unwrap();
        assert!(report.is_empty());
        assert_eq!(fx.provider.check_call_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_outcome_stays_in_poll_set() {
        let fx = Fixture::new();
        fx.provider
            .set_outcome(VerificationOutcome::Failed("DKIM verification failed in SES".into()));
        let domain = fx.domain("example.com", None);
        let service = fx.service(StaticDnsLookup::serving(&required_records()));

        let report = service.run_verification_batch(Utc::now()).await.unwrap();
        assert_eq!(report.failed, 1);

        let stored = fx.store.domain(domain.id).unwrap();
        assert_eq!(stored.status, CustomDomainStatus::Failed);
        assert_eq!(
            stored.failure_reason.as_deref(),
            Some("DKIM verification failed in SES")
        );

        fx.provider.set_outcome(VerificationOutcome::Verified);
        let later = Utc::now() + ChronoDuration::minutes(11);
        let report = service.run_verification_batch(later).await.unwrap();
        assert_eq!(report.verified, 1);
    }

    #[tokio::test]
    async fn test_checked_domain_waits_out_staleness_window() {
        let fx = Fixture::new();
        fx.provider.set_outcome(VerificationOutcome::Pending);
        let domain = fx.domain("example.com", Some(30));
        let service = fx.service(StaticDnsLookup::serving(&required_records()));
        let now = Utc::now();

        let report = service.run_verification_batch(now).await.unwrap();
        assert_eq!(report.pending, 1);
        assert_eq!(
            fx.store.domain(domain.id).unwrap().verification_attempted_at,
            Some(now)
        );

        let report = service
            .run_verification_batch(now + ChronoDuration::minutes(5))
            .await
            .unwrap();
        assert!(report.is_empty());

        let report = service
            .run_verification_batch(now + ChronoDuration::minutes(11))
            .await
            .unwrap();
        assert_eq!(report.selected, 1);
        assert_eq!(fx.provider.check_call_count(), 2);
    }

    #[tokio::test]
    async fn test_capped_batches_rotate_through_all_domains() {
        let fx = Fixture::new();
        fx.provider.set_outcome(VerificationOutcome::Pending);
        let created = Utc::now() - ChronoDuration::hours(1);
        let mut ids = Vec::new();
        let names = ["a.example.com", "b.example.com", "c.example.com"];
        for (i, name) in names.into_iter().enumerate() {
            let mut domain = fx.domain(name, None);
            domain.created_at = created + ChronoDuration::seconds(i as i64);
            fx.store.put(domain.clone());
            ids.push(domain.id);
        }

        let settings = SchedulerSettings {
            verification_batch_size: 2,
            verification_domain_delay: Duration::ZERO,
            ..SchedulerSettings::default()
        };
        let service = DomainVerificationService::with_settings(
            Arc::new(fx.store.clone()),
            VerificationProviderRegistry::new().register(Arc::new(fx.provider.clone())),
            DnsValidator::with_lookup(Arc::new(StaticDnsLookup::serving(&required_records()))),
            &settings,
        );

        let first_tick = Utc::now();
        let report = service.run_verification_batch(first_tick).await.unwrap();
        assert_eq!(report.selected, 2);
        let untouched = fx.store.domain(ids[2]).unwrap();
        assert_eq!(untouched.verification_attempted_at, None);

        let second_tick = first_tick + ChronoDuration::minutes(15);
        let report = service.run_verification_batch(second_tick).await.unwrap();
        assert_eq!(report.selected, 2);
        assert_eq!(
            fx.store.domain(ids[2]).unwrap().verification_attempted_at,
            Some(second_tick)
        );
        assert_eq!(
            fx.store.domain(ids[0]).unwrap().verification_attempted_at,
            Some(second_tick)
        );
        assert_eq!(
            fx.store.domain(ids[1]).unwrap().verification_attempted_at,
            Some(first_tick)
        );
    }

    #[tokio::test]
    async fn test_recently_attempted_domains_are_not_selected() {
        let fx = Fixture::new();
        fx.domain("fresh.example.com", Some(3));
        let stale = fx.domain("stale.example.com", Some(30));
        let service = fx.service(StaticDnsLookup::serving(&required_records()));

        let report = service.run_verification_batch(Utc::now()).await.unwrap();

        assert_eq!(report.selected, 1);
        assert_eq!(
            fx.store.domain(stale.id).unwrap().status,
            CustomDomainStatus::Verified
        );
    }

    #[tokio::test]
    async fn test_provider_error_does_not_stop_the_batch() {
        let fx = Fixture::new();
        let provider = fx.provider.clone().with_check_failure();
        let store = fx.store.clone();
        fx.domain("a.example.com", None);
        fx.domain("b.example.com", None);

        let service = DomainVerificationService::new(
            Arc::new(store),
            VerificationProviderRegistry::new().register(Arc::new(provider.clone())),
            DnsValidator::with_lookup(Arc::new(StaticDnsLookup::serving(&required_records()))),
        );

        let now = Utc::now();
        let report = service.run_verification_batch(now).await.unwrap();
        assert_eq!(report.selected, 2);
        assert_eq!(report.errors, 2);
        assert_eq!(provider.check_call_count(), 2);

        // The attempt is still recorded so the domain waits out the window
        assert_eq!(fx.store.update_count(), 2);
        let report = service.run_verification_batch(now).await.unwrap();
        assert!(report.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_between_domains() {
        let fx = Fixture::new();
        for name in ["a.example.com", "b.example.com", "c.example.com"] {
            fx.domain(name, None);
        }
        let service = fx.service(StaticDnsLookup::serving(&required_records()));

        let started = tokio::time::Instant::now();
        let report = service.run_verification_batch(Utc::now()).await.unwrap();

        assert_eq!(report.verified, 3);
        assert_eq!(started.elapsed(), std::time::Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_create_domain_initiates_with_default_provider() {
        let fx = Fixture::new();
        let service = fx.service(StaticDnsLookup::new());

        let domain = service
            .create_domain(fx.account_id, "https://Example.com", None)
            .await
            .unwrap();

        assert_eq!(domain.domain, "example.com");
        assert_eq!(domain.verification_provider, "ses");
        assert_eq!(domain.status, CustomDomainStatus::Pending);
        assert_eq!(domain.provider_domain_id.as_deref(), Some("mock-example.com"));
        assert_eq!(domain.required_dns_records().unwrap(), required_records());
        assert!(domain.verification_attempted_at.is_some());
        assert_eq!(fx.provider.initiate_call_count(), 1);

        assert!(matches!(
            service.create_domain(fx.account_id, "example.com", None).await,
            Err(EmailError::Validation(_))
        ));
        assert!(matches!(
            service
                .create_domain(fx.account_id, "other.com", Some(VerificationProviderType::Resend))
                .await,
            Err(EmailError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_create_domain_keeps_initiation_failure() {
        let fx = Fixture {
            provider: MockVerificationProvider::new(VerificationProviderType::Ses)
                .with_initiate_failure(),
            ..Fixture::new()
        };
        let service = fx.service(StaticDnsLookup::new());

        let domain = service
            .create_domain(fx.account_id, "example.com", None)
            .await
            .unwrap();

        assert_eq!(domain.provider_domain_id, None);
        assert_eq!(
            domain.failure_reason.as_deref(),
            Some("Provider error: Mock initiate failure")
        );
        assert!(fx.store.domain(domain.id).is_some());
    }

    #[tokio::test]
    async fn test_retry_without_identity_reinitiates() {
        let fx = Fixture::new();
        let mut domain = fx.domain("example.com", Some(60));
        domain.provider_domain_id = None;
        domain.status = CustomDomainStatus::Failed;
        domain.failure_reason = Some("boom".to_string());
        fx.store.put(domain.clone());
        let service = fx.service(StaticDnsLookup::new());

        let retried = service.retry(fx.account_id, domain.id).await.unwrap();

        assert_eq!(fx.provider.initiate_call_count(), 1);
        assert_eq!(fx.provider.reverify_call_count(), 0);
        assert_eq!(retried.status, CustomDomainStatus::Pending);
        assert_eq!(retried.failure_reason, None);
        assert_eq!(retried.provider_domain_id.as_deref(), Some("mock-example.com"));
    }

    #[tokio::test]
    async fn test_retry_with_identity_reverifies() {
        let fx = Fixture::new();
        let mut domain = fx.domain("example.com", Some(60));
        domain.status = CustomDomainStatus::Verified;
        domain.verified_at = Some(Utc::now());
        fx.store.put(domain.clone());
        let service = fx.service(StaticDnsLookup::new());

        let retried = service.retry(fx.account_id, domain.id).await.unwrap();

        assert_eq!(fx.provider.initiate_call_count(), 0);
        assert_eq!(fx.provider.reverify_call_count(), 1);
        assert_eq!(retried.status, CustomDomainStatus::Pending);
        assert_eq!(retried.verified_at, None);
    }

    #[tokio::test]
    async fn test_delete_survives_provider_failure() {
        let fx = Fixture {
            provider: MockVerificationProvider::new(VerificationProviderType::Ses)
                .with_delete_failure(),
            ..Fixture::new()
        };
        let domain = fx.domain("example.com", None);
        let service = fx.service(StaticDnsLookup::new());

        service.delete(fx.account_id, domain.id).await.unwrap();

        assert_eq!(fx.provider.delete_call_count(), 1);
        assert!(fx.store.domain(domain.id).is_none());
    }

    #[tokio::test]
    async fn test_other_accounts_see_not_found() {
        let fx = Fixture::new();
        let domain = fx.domain("example.com", None);
        let service = fx.service(StaticDnsLookup::new());
        let stranger = Uuid::new_v4();

        assert!(matches!(
            service.get(stranger, domain.id).await,
            Err(EmailError::DomainNotFound(_))
        ));
        assert!(matches!(
            service.delete(stranger, domain.id).await,
            Err(EmailError::DomainNotFound(_))
        ));
        assert!(fx.store.domain(domain.id).is_some());
    }

    #[tokio::test]
    async fn test_validate_dns_reports_missing_txt() {
        let fx = Fixture::new();
        let domain = fx.domain("example.com", None);
        let lookup = StaticDnsLookup::new()
            .with_txt("_amazonses.example.com", "other-token")
            .with_cname("abc._domainkey.example.com", "abc.dkim.amazonses.com");
        let service = fx.service(lookup);

        let result = service.validate_dns(fx.account_id, domain.id).await.unwrap();

        assert!(!result.all_records_present);
        let txt = &result.results[0];
        assert!(!txt.is_present);
        assert_eq!(txt.actual_value, "other-token");
        // Read-only
        assert_eq!(fx.store.update_count(), 0);
    }
}
