//! sea-orm implementations of the store traits

use async_trait::async_trait;
use chrono::Utc;
use mayl_core::DBDateTime;
use mayl_entities::types::{
    CustomDomainStatus, EmailAddressStatus, EmailAddressType, EmailStatus,
};
use mayl_entities::{custom_domains, email_addresses, rate_limits, sent_emails};
use sea_orm::sea_query::{Expr, NullOrdering};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    Order, QueryFilter, QueryOrder, QuerySelect,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::{
    AddressResolver, CustomDomainStore, DispatchOutcome, HousekeepingStore, SendRecordStore,
};
use crate::errors::EmailError;

#[derive(Clone)]
pub struct DbSendRecordStore {
    db: Arc<DatabaseConnection>,
}

impl DbSendRecordStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SendRecordStore for DbSendRecordStore {
    async fn insert(&self, record: sent_emails::Model) -> Result<sent_emails::Model, EmailError> {
        let inserted = record
            .into_active_model()
            .reset_all()
            .insert(self.db.as_ref())
            .await?;
        Ok(inserted)
    }

    async fn get(&self, id: Uuid) -> Result<Option<sent_emails::Model>, EmailError> {
        Ok(sent_emails::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?)
    }

    async fn due_scheduled(
        &self,
        now: DBDateTime,
        limit: u64,
    ) -> Result<Vec<sent_emails::Model>, EmailError> {
        let records = sent_emails::Entity::find()
            .filter(sent_emails::Column::Status.eq(EmailStatus::Scheduled))
            .filter(sent_emails::Column::ScheduledAt.lte(now))
            .order_by_asc(sent_emails::Column::ScheduledAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;
        Ok(records)
    }

    async fn queued(&self, limit: u64) -> Result<Vec<sent_emails::Model>, EmailError> {
        let records = sent_emails::Entity::find()
            .filter(sent_emails::Column::Status.eq(EmailStatus::Queued))
            .order_by_asc(sent_emails::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;
        Ok(records)
    }

    async fn record_outcome(
        &self,
        id: Uuid,
        outcome: &DispatchOutcome,
    ) -> Result<bool, EmailError> {
        let mut update = sent_emails::Entity::update_many()
            .col_expr(
                sent_emails::Column::Status,
                Expr::value(outcome.status().as_str()),
            )
            .col_expr(sent_emails::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(sent_emails::Column::Id.eq(id))
            .filter(sent_emails::Column::Status.is_in(EmailStatus::awaiting_dispatch()));

        update = match outcome {
            DispatchOutcome::Sent {
                provider_message_id,
                sent_at,
            } => update
                .col_expr(
                    sent_emails::Column::ProviderMessageId,
                    Expr::value(provider_message_id.clone()),
                )
                .col_expr(sent_emails::Column::SentAt, Expr::value(*sent_at))
                .col_expr(
                    sent_emails::Column::FailureReason,
                    Expr::value(Option::<String>::None),
                ),
            DispatchOutcome::Failed { reason } => update.col_expr(
                sent_emails::Column::FailureReason,
                Expr::value(reason.clone()),
            ),
        };

        let result = update.exec(self.db.as_ref()).await?;
        Ok(result.rows_affected > 0)
    }
}

#[derive(Clone)]
pub struct DbCustomDomainStore {
    db: Arc<DatabaseConnection>,
}

impl DbCustomDomainStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CustomDomainStore for DbCustomDomainStore {
    async fn insert(
        &self,
        domain: custom_domains::Model,
    ) -> Result<custom_domains::Model, EmailError> {
        let inserted = domain
            .into_active_model()
            .reset_all()
            .insert(self.db.as_ref())
            .await?;
        Ok(inserted)
    }

    async fn get(&self, id: Uuid) -> Result<Option<custom_domains::Model>, EmailError> {
        Ok(custom_domains::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?)
    }

    async fn find_by_name(
        &self,
        name: &str,
    ) -> Result<Option<custom_domains::Model>, EmailError> {
        Ok(custom_domains::Entity::find()
            .filter(custom_domains::Column::Domain.eq(name))
            .one(self.db.as_ref())
            .await?)
    }

    async fn due_for_verification(
        &self,
        stale_before: DBDateTime,
        limit: u64,
    ) -> Result<Vec<custom_domains::Model>, EmailError> {
        let domains = custom_domains::Entity::find()
            .filter(
                custom_domains::Column::Status.is_in(CustomDomainStatus::awaiting_verification()),
            )
            .filter(
                Condition::any()
                    .add(custom_domains::Column::VerificationAttemptedAt.is_null())
                    .add(custom_domains::Column::VerificationAttemptedAt.lte(stale_before)),
            )
            // Never-attempted first, then least recently attempted
            .order_by_with_nulls(
                custom_domains::Column::VerificationAttemptedAt,
                Order::Asc,
                NullOrdering::First,
            )
            .order_by_asc(custom_domains::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;
        Ok(domains)
    }

    async fn update(
        &self,
        domain: &custom_domains::Model,
    ) -> Result<custom_domains::Model, EmailError> {
        let updated = domain
            .clone()
            .into_active_model()
            .reset_all()
            .update(self.db.as_ref())
            .await?;
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, EmailError> {
        let result = custom_domains::Entity::delete_by_id(id)
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected > 0)
    }
}

#[derive(Clone)]
pub struct DbAddressResolver {
    db: Arc<DatabaseConnection>,
}

impl DbAddressResolver {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AddressResolver for DbAddressResolver {
    async fn resolve(&self, address_id: Uuid) -> Result<Option<String>, EmailError> {
        Ok(self.get(address_id).await?.map(|address| address.email))
    }

    async fn get(&self, address_id: Uuid) -> Result<Option<email_addresses::Model>, EmailError> {
        Ok(email_addresses::Entity::find_by_id(address_id)
            .one(self.db.as_ref())
            .await?)
    }
}

#[derive(Clone)]
pub struct DbHousekeepingStore {
    db: Arc<DatabaseConnection>,
}

impl DbHousekeepingStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl HousekeepingStore for DbHousekeepingStore {
    async fn expire_temporary_addresses(&self, now: DBDateTime) -> Result<u64, EmailError> {
        let result = email_addresses::Entity::update_many()
            .col_expr(
                email_addresses::Column::Status,
                Expr::value(EmailAddressStatus::Expired.as_str()),
            )
            .col_expr(email_addresses::Column::UpdatedAt, Expr::value(now))
            .filter(email_addresses::Column::AddressType.eq(EmailAddressType::Temporary))
            .filter(email_addresses::Column::Status.eq(EmailAddressStatus::Active))
            .filter(email_addresses::Column::ExpiresAt.is_not_null())
            .filter(email_addresses::Column::ExpiresAt.lte(now))
            .exec(self.db.as_ref())
            .await?;

        debug!("Expired {} temporary address(es)", result.rows_affected);
        Ok(result.rows_affected)
    }

    async fn purge_rate_limits(&self, now: DBDateTime) -> Result<u64, EmailError> {
        let result = rate_limits::Entity::delete_many()
            .filter(rate_limits::Column::ExpiresAt.lte(now))
            .exec(self.db.as_ref())
            .await?;

        debug!("Purged {} rate limit row(s)", result.rows_affected);
        Ok(result.rows_affected)
    }
}
