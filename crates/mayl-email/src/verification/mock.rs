//! Mock verification provider for testing

use async_trait::async_trait;
use chrono::Utc;
use mayl_entities::custom_domains;
use mayl_entities::types::{CustomDomainStatus, DnsRecord};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::traits::{
    apply_outcome, reset_for_retry, DomainVerificationProvider, VerificationOutcome,
    VerificationProviderType,
};
use crate::errors::EmailError;

#[derive(Clone)]
pub struct MockVerificationProvider {
    pub kind: VerificationProviderType,
    pub initiate_count: Arc<AtomicUsize>,
    pub check_count: Arc<AtomicUsize>,
    pub delete_count: Arc<AtomicUsize>,
    pub retry_count: Arc<AtomicUsize>,
    pub reverify_count: Arc<AtomicUsize>,

    /// What `check_status` reports; can be changed between ticks
    pub outcome: Arc<Mutex<VerificationOutcome>>,
    pub records: Vec<DnsRecord>,
    pub should_fail_initiate: bool,
    pub should_fail_check: bool,
    pub should_fail_delete: bool,
}

impl MockVerificationProvider {
    pub fn new(kind: VerificationProviderType) -> Self {
        Self {
            kind,
            initiate_count: Arc::new(AtomicUsize::new(0)),
            check_count: Arc::new(AtomicUsize::new(0)),
            delete_count: Arc::new(AtomicUsize::new(0)),
            retry_count: Arc::new(AtomicUsize::new(0)),
            reverify_count: Arc::new(AtomicUsize::new(0)),
            outcome: Arc::new(Mutex::new(VerificationOutcome::Verified)),
            records: vec![DnsRecord::new(
                "TXT",
                "_mock.example.com",
                "mock-verification-token",
            )],
            should_fail_initiate: false,
            should_fail_check: false,
            should_fail_delete: false,
        }
    }

    pub fn with_outcome(self, outcome: VerificationOutcome) -> Self {
        self.set_outcome(outcome);
        self
    }

    pub fn with_records(mut self, records: Vec<DnsRecord>) -> Self {
        self.records = records;
        self
    }

    pub fn with_initiate_failure(mut self) -> Self {
        self.should_fail_initiate = true;
        self
    }

    pub fn with_check_failure(mut self) -> Self {
        self.should_fail_check = true;
        self
    }

    pub fn with_delete_failure(mut self) -> Self {
        self.should_fail_delete = true;
        self
    }

    pub fn set_outcome(&self, outcome: VerificationOutcome) {
        *self.outcome.lock().unwrap() = outcome;
    }

    pub fn initiate_call_count(&self) -> usize {
        self.initiate_count.load(Ordering::SeqCst)
    }

    pub fn check_call_count(&self) -> usize {
        self.check_count.load(Ordering::SeqCst)
    }

    pub fn delete_call_count(&self) -> usize {
        self.delete_count.load(Ordering::SeqCst)
    }

    pub fn retry_call_count(&self) -> usize {
        self.retry_count.load(Ordering::SeqCst)
    }

    pub fn reverify_call_count(&self) -> usize {
        self.reverify_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DomainVerificationProvider for MockVerificationProvider {
    async fn initiate(&self, domain: &mut custom_domains::Model) -> Result<(), EmailError> {
        self.initiate_count.fetch_add(1, Ordering::SeqCst);

        if self.should_fail_initiate {
            return Err(EmailError::ProviderError(
                "Mock initiate failure".to_string(),
            ));
        }

        domain.set_required_dns_records(&self.records)?;
        domain.provider_domain_id = Some(format!("mock-{}", domain.domain));
        domain.status = CustomDomainStatus::Pending;
        domain.verification_attempted_at = Some(Utc::now());
        Ok(())
    }

    async fn check_status(&self, domain: &mut custom_domains::Model) -> Result<(), EmailError> {
        self.check_count.fetch_add(1, Ordering::SeqCst);

        if self.should_fail_check {
            return Err(EmailError::ProviderError("Mock check failure".to_string()));
        }

        let outcome = self.outcome.lock().unwrap().clone();
        apply_outcome(domain, outcome);
        Ok(())
    }

    async fn delete_identity(&self, _domain: &custom_domains::Model) -> Result<(), EmailError> {
        self.delete_count.fetch_add(1, Ordering::SeqCst);

        if self.should_fail_delete {
            return Err(EmailError::ProviderError("Mock delete failure".to_string()));
        }
        Ok(())
    }

    async fn retry(&self, domain: &mut custom_domains::Model) -> Result<(), EmailError> {
        self.retry_count.fetch_add(1, Ordering::SeqCst);
        reset_for_retry(domain);

        if domain.provider_domain_id.is_none() {
            return self.initiate(domain).await;
        }

        self.reverify_count.fetch_add(1, Ordering::SeqCst);
        domain.verification_attempted_at = Some(Utc::now());
        Ok(())
    }

    fn provider_type(&self) -> VerificationProviderType {
        self.kind
    }
}
