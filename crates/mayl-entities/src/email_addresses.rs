//! Sending addresses entity

use async_trait::async_trait;
use mayl_core::DBDateTime;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, ConnectionTrait, DbErr};
use serde::{Deserialize, Serialize};

use crate::types::{EmailAddressStatus, EmailAddressType};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "email_addresses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub account_id: Uuid,
    pub email: String,
    pub address_type: EmailAddressType,
    pub status: EmailAddressStatus,
    pub custom_domain_id: Option<Uuid>,
    pub expires_at: Option<DBDateTime>,
    pub created_at: DBDateTime,
    pub updated_at: DBDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::custom_domains::Entity",
        from = "Column::CustomDomainId",
        to = "super::custom_domains::Column::Id"
    )]
    CustomDomain,
    #[sea_orm(has_many = "super::sent_emails::Entity")]
    SentEmails,
}

impl Related<super::custom_domains::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CustomDomain.def()
    }
}

impl Related<super::sent_emails::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SentEmails.def()
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
