//! Persistence seams used by the dispatch loops, the verification
//! orchestrator and the request-path services

mod db;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use mayl_core::DBDateTime;
use mayl_entities::types::EmailStatus;
use mayl_entities::{custom_domains, email_addresses, sent_emails};
use uuid::Uuid;

use crate::errors::EmailError;

pub use db::{DbAddressResolver, DbCustomDomainStore, DbHousekeepingStore, DbSendRecordStore};

/// Result of one dispatch attempt, written back onto the send record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent {
        provider_message_id: Option<String>,
        sent_at: DBDateTime,
    },
    Failed {
        reason: String,
    },
}

impl DispatchOutcome {
    pub fn status(&self) -> EmailStatus {
        match self {
            DispatchOutcome::Sent { .. } => EmailStatus::Sent,
            DispatchOutcome::Failed { .. } => EmailStatus::Failed,
        }
    }

    pub fn provider_message_id(&self) -> Option<&str> {
        match self {
            DispatchOutcome::Sent {
                provider_message_id,
                ..
            } => provider_message_id.as_deref(),
            DispatchOutcome::Failed { .. } => None,
        }
    }
}

#[async_trait]
pub trait SendRecordStore: Send + Sync {
    async fn insert(&self, record: sent_emails::Model) -> Result<sent_emails::Model, EmailError>;

    async fn get(&self, id: Uuid) -> Result<Option<sent_emails::Model>, EmailError>;

    /// `scheduled` records whose `scheduled_at <= now`
    async fn due_scheduled(
        &self,
        now: DBDateTime,
        limit: u64,
    ) -> Result<Vec<sent_emails::Model>, EmailError>;

    async fn queued(&self, limit: u64) -> Result<Vec<sent_emails::Model>, EmailError>;

    /// Apply `outcome` only while the record is still `queued` or
    /// `scheduled`. Returns `false` when the record had already moved on.
    async fn record_outcome(&self, id: Uuid, outcome: &DispatchOutcome)
        -> Result<bool, EmailError>;
}

#[async_trait]
pub trait CustomDomainStore: Send + Sync {
    async fn insert(
        &self,
        domain: custom_domains::Model,
    ) -> Result<custom_domains::Model, EmailError>;

    async fn get(&self, id: Uuid) -> Result<Option<custom_domains::Model>, EmailError>;

    async fn find_by_name(&self, name: &str)
        -> Result<Option<custom_domains::Model>, EmailError>;

    /// `pending`/`failed` domains never attempted or last attempted at or
    /// before `stale_before`, oldest created first
    async fn due_for_verification(
        &self,
        stale_before: DBDateTime,
        limit: u64,
    ) -> Result<Vec<custom_domains::Model>, EmailError>;

    /// Persist every field of `domain`
    async fn update(
        &self,
        domain: &custom_domains::Model,
    ) -> Result<custom_domains::Model, EmailError>;

    async fn delete(&self, id: Uuid) -> Result<bool, EmailError>;
}

/// Maps a send record's source reference to its sending address
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Address string for `address_id`, if the row still exists
    async fn resolve(&self, address_id: Uuid) -> Result<Option<String>, EmailError>;

    async fn get(&self, address_id: Uuid) -> Result<Option<email_addresses::Model>, EmailError>;
}

#[async_trait]
pub trait HousekeepingStore: Send + Sync {
    /// Mark active temporary addresses past their expiry as expired
    async fn expire_temporary_addresses(&self, now: DBDateTime) -> Result<u64, EmailError>;

    async fn purge_rate_limits(&self, now: DBDateTime) -> Result<u64, EmailError>;
}
