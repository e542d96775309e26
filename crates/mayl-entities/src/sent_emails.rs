//! Sent emails entity
//!
//! One row per outbound message. Rows are created by the send-request path
//! and only moved forward by the dispatch loops; they are never deleted.

use async_trait::async_trait;
use mayl_core::DBDateTime;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, ConnectionTrait, DbErr};
use serde::{Deserialize, Serialize};

use crate::types::EmailStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "sent_emails")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub account_id: Uuid,
    pub from_email_id: Uuid,
    #[sea_orm(column_type = "JsonBinary")]
    pub to_recipients: Json,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub cc_recipients: Option<Json>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub bcc_recipients: Option<Json>,
    pub subject: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub text_content: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub html_content: Option<String>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub attachments: Option<Json>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub headers: Option<Json>,
    pub thread_id: Option<Uuid>,
    pub scheduled_at: Option<DBDateTime>,
    pub sent_at: Option<DBDateTime>,
    pub status: EmailStatus,
    pub provider_message_id: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub failure_reason: Option<String>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub metadata: Option<Json>,
    pub created_at: DBDateTime,
    pub updated_at: DBDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::email_addresses::Entity",
        from = "Column::FromEmailId",
        to = "super::email_addresses::Column::Id"
    )]
    FromAddress,
}

impl Related<super::email_addresses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FromAddress.def()
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
    /// Initial status for a new record: `scheduled` only when the send time
    /// lies strictly in the future.
    pub fn initial_status(scheduled_at: Option<DBDateTime>, now: DBDateTime) -> EmailStatus {
        match scheduled_at {
            Some(at) if at > now => EmailStatus::Scheduled,
            _ => EmailStatus::Queued,
        }
    }
}
