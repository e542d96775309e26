//! In-memory stores for service tests

use async_trait::async_trait;
use chrono::Utc;
use mayl_core::DBDateTime;
use mayl_entities::types::EmailStatus;
use mayl_entities::{custom_domains, email_addresses, sent_emails};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use super::{AddressResolver, CustomDomainStore, DispatchOutcome, SendRecordStore};
use crate::errors::EmailError;

#[derive(Clone, Default)]
pub struct MemorySendRecordStore {
    records: Arc<Mutex<HashMap<Uuid, sent_emails::Model>>>,
    pub outcome_writes: Arc<AtomicUsize>,
    pub fail_outcome_writes: bool,
}

impl MemorySendRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failing_outcome_writes(mut self) -> Self {
        self.fail_outcome_writes = true;
        self
    }

    pub fn put(&self, record: sent_emails::Model) {
        self.records.lock().unwrap().insert(record.id, record);
    }

    pub fn record(&self, id: Uuid) -> Option<sent_emails::Model> {
        self.records.lock().unwrap().get(&id).cloned()
    }

    /// Move a record out of band, as a concurrent worker would
    pub fn force_status(&self, id: Uuid, status: EmailStatus) {
        if let Some(record) = self.records.lock().unwrap().get_mut(&id) {
            record.status = status;
        }
    }

    pub fn outcome_write_count(&self) -> usize {
        self.outcome_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SendRecordStore for MemorySendRecordStore {
    async fn insert(&self, record: sent_emails::Model) -> Result<sent_emails::Model, EmailError> {
        self.put(record.clone());
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<sent_emails::Model>, EmailError> {
        Ok(self.record(id))
    }

    async fn due_scheduled(
        &self,
        now: DBDateTime,
        limit: u64,
    ) -> Result<Vec<sent_emails::Model>, EmailError> {
        let mut due: Vec<_> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.status == EmailStatus::Scheduled)
            .filter(|r| r.scheduled_at.map(|at| at <= now).unwrap_or(false))
            .cloned()
            .collect();
        due.sort_by_key(|r| r.scheduled_at);
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn queued(&self, limit: u64) -> Result<Vec<sent_emails::Model>, EmailError> {
        let mut queued: Vec<_> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.status == EmailStatus::Queued)
            .cloned()
            .collect();
        queued.sort_by_key(|r| r.created_at);
        queued.truncate(limit as usize);
        Ok(queued)
    }

    async fn record_outcome(
        &self,
        id: Uuid,
        outcome: &DispatchOutcome,
    ) -> Result<bool, EmailError> {
        self.outcome_writes.fetch_add(1, Ordering::SeqCst);

        if self.fail_outcome_writes {
            return Err(EmailError::Database(sea_orm::DbErr::Custom(
                "connection reset".to_string(),
            )));
        }

        let mut records = self.records.lock().unwrap();
        let Some(record) = records.get_mut(&id) else {
            return Ok(false);
        };
        if !EmailStatus::awaiting_dispatch().contains(&record.status) {
            return Ok(false);
        }

        record.status = outcome.status();
        record.updated_at = Utc::now();
        match outcome {
            DispatchOutcome::Sent {
                provider_message_id,
                sent_at,
            } => {
                record.provider_message_id = provider_message_id.clone();
                record.sent_at = Some(*sent_at);
                record.failure_reason = None;
            }
            DispatchOutcome::Failed { reason } => {
                record.failure_reason = Some(reason.clone());
            }
        }
        Ok(true)
    }
}

#[derive(Clone, Default)]
pub struct MemoryCustomDomainStore {
    domains: Arc<Mutex<HashMap<Uuid, custom_domains::Model>>>,
    pub updates: Arc<AtomicUsize>,
}

impl MemoryCustomDomainStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, domain: custom_domains::Model) {
        self.domains.lock().unwrap().insert(domain.id, domain);
    }

    pub fn domain(&self, id: Uuid) -> Option<custom_domains::Model> {
        self.domains.lock().unwrap().get(&id).cloned()
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CustomDomainStore for MemoryCustomDomainStore {
    async fn insert(
        &self,
        domain: custom_domains::Model,
    ) -> Result<custom_domains::Model, EmailError> {
        self.put(domain.clone());
        Ok(domain)
    }

    async fn get(&self, id: Uuid) -> Result<Option<custom_domains::Model>, EmailError> {
        Ok(self.domain(id))
    }

    async fn find_by_name(
        &self,
        name: &str,
    ) -> Result<Option<custom_domains::Model>, EmailError> {
        Ok(self
            .domains
            .lock()
            .unwrap()
            .values()
            .find(|d| d.domain == name)
            .cloned())
    }

    async fn due_for_verification(
        &self,
        stale_before: DBDateTime,
        limit: u64,
    ) -> Result<Vec<custom_domains::Model>, EmailError> {
        let mut due: Vec<_> = self
            .domains
            .lock()
            .unwrap()
            .values()
            .filter(|d| {
                mayl_entities::types::CustomDomainStatus::awaiting_verification()
                    .contains(&d.status)
            })
            .filter(|d| {
                d.verification_attempted_at
                    .map(|at| at <= stale_before)
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        due.sort_by_key(|d| (d.verification_attempted_at, d.created_at));
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn update(
        &self,
        domain: &custom_domains::Model,
    ) -> Result<custom_domains::Model, EmailError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let mut updated = domain.clone();
        updated.updated_at = Utc::now();
        self.put(updated.clone());
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, EmailError> {
        Ok(self.domains.lock().unwrap().remove(&id).is_some())
    }
}

#[derive(Clone, Default)]
pub struct MemoryAddressResolver {
    addresses: Arc<Mutex<HashMap<Uuid, email_addresses::Model>>>,
}

impl MemoryAddressResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, address: email_addresses::Model) {
        self.addresses.lock().unwrap().insert(address.id, address);
    }
}

#[async_trait]
impl AddressResolver for MemoryAddressResolver {
    async fn resolve(&self, address_id: Uuid) -> Result<Option<String>, EmailError> {
        Ok(self.get(address_id).await?.map(|a| a.email))
    }

    async fn get(&self, address_id: Uuid) -> Result<Option<email_addresses::Model>, EmailError> {
        Ok(self.addresses.lock().unwrap().get(&address_id).cloned())
    }
}
