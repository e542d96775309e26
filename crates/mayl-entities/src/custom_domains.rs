//! Custom sending domains entity

use async_trait::async_trait;
use mayl_core::DBDateTime;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, ConnectionTrait, DbErr};
use serde::{Deserialize, Serialize};

use crate::types::{CustomDomainStatus, DnsRecord};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "custom_domains")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub account_id: Uuid,
    #[sea_orm(unique)]
    pub domain: String,
    pub status: CustomDomainStatus,
    pub verification_provider: String,
    pub provider_verification_status: Option<String>,
    pub provider_dkim_status: Option<String>,
    pub provider_domain_id: Option<String>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub dkim_tokens: Option<Json>,
    #[sea_orm(column_type = "JsonBinary")]
    pub dns_records: Json,
    pub verification_attempted_at: Option<DBDateTime>,
    pub verified_at: Option<DBDateTime>,
    pub failure_reason: Option<String>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub metadata: Option<Json>,
    pub created_at: DBDateTime,
    pub updated_at: DBDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::email_addresses::Entity")]
    EmailAddresses,
}

impl Related<super::email_addresses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EmailAddresses.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let now = chrono::Utc::now();

        if insert {
            if self.created_at.is_not_set() {
                self.created_at = Set(now);
            }
            if self.updated_at.is_not_set() {
                self.updated_at = Set(now);
            }
        } else {
            self.updated_at = Set(now);
        }

        Ok(self)
    }
}

impl Model {
    /// A freshly claimed domain, not yet registered with any provider
    pub fn new_pending(account_id: Uuid, domain: &str, verification_provider: &str) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4(),
            account_id,
            domain: domain.to_string(),
            status: CustomDomainStatus::Pending,
            verification_provider: verification_provider.to_string(),
            provider_verification_status: None,
            provider_dkim_status: None,
            provider_domain_id: None,
            dkim_tokens: None,
            dns_records: Json::Array(Vec::new()),
            verification_attempted_at: None,
            verified_at: None,
            failure_reason: None,
            metadata: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.status == CustomDomainStatus::Verified
    }

    /// Decode the stored required-record list
    pub fn required_dns_records(&self) -> Result<Vec<DnsRecord>, serde_json::Error> {
        if self.dns_records.is_null() {
            return Ok(Vec::new());
        }
        serde_json::from_value(self.dns_records.clone())
    }

    pub fn set_required_dns_records(
        &mut self,
        records: &[DnsRecord],
    ) -> Result<(), serde_json::Error> {
        self.dns_records = serde_json::to_value(records)?;
        Ok(())
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.as_ref()?.get(key)?.as_str()
    }

    pub fn set_metadata(&mut self, key: &str, value: impl Into<Json>) {
        let metadata = self
            .metadata
            .get_or_insert_with(|| Json::Object(Default::default()));
        if !metadata.is_object() {
            *metadata = Json::Object(Default::default());
        }
        if let Some(map) = metadata.as_object_mut() {
            map.insert(key.to_string(), value.into());
        }
    }
}
