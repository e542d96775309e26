//! Email service for submitting and reading sends

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use mayl_core::DBDateTime;
use mayl_entities::sent_emails;
use mayl_entities::types::{EmailAddressStatus, EmailStatus};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::delivery::DeliveryService;
use crate::errors::EmailError;
use crate::providers::DeliveryStatus;
use crate::services::dispatch_service::{DispatchService, StoredAttachment};
use crate::store::{AddressResolver, CustomDomainStore, SendRecordStore};

/// Attachment as submitted, content base64 encoded
#[derive(Debug, Clone)]
pub struct AttachmentInput {
    pub filename: String,
    pub content: String,
    pub content_type: Option<String>,
}

/// Request to send an email now or at `scheduled_at`
#[derive(Debug, Clone, Default)]
pub struct SendEmailRequest {
    pub account_id: Uuid,
    /// Sending address owned by the account
    pub from_email_id: Uuid,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub text: Option<String>,
    pub html: Option<String>,
    pub attachments: Vec<AttachmentInput>,
    pub headers: BTreeMap<String, String>,
    pub thread_id: Option<Uuid>,
    pub scheduled_at: Option<DBDateTime>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendEmailResponse {
    pub id: Uuid,
    pub status: EmailStatus,
    pub scheduled_at: Option<DBDateTime>,
}

fn validate(request: &SendEmailRequest) -> Result<(), EmailError> {
    if request.to.is_empty() {
        return Err(EmailError::Validation("no recipients specified".to_string()));
    }
    if request.subject.trim().is_empty() {
        return Err(EmailError::Validation("subject is required".to_string()));
    }
    let has_body = |body: &Option<String>| body.as_deref().is_some_and(|b| !b.is_empty());
    if !has_body(&request.text) && !has_body(&request.html) {
        return Err(EmailError::Validation(
            "either text or html content is required".to_string(),
        ));
    }
    for attachment in &request.attachments {
        if BASE64.decode(attachment.content.as_bytes()).is_err() {
            return Err(EmailError::Validation(format!(
                "attachment {} is not valid base64",
                attachment.filename
            )));
        }
    }
    Ok(())
}

fn list_value(list: &[String]) -> Result<Option<Value>, EmailError> {
    if list.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_value(list)?))
}

pub struct EmailService {
    records: Arc<dyn SendRecordStore>,
    addresses: Arc<dyn AddressResolver>,
    domains: Arc<dyn CustomDomainStore>,
    dispatch: Arc<DispatchService>,
    delivery: Arc<DeliveryService>,
}

impl EmailService {
    pub fn new(
        records: Arc<dyn SendRecordStore>,
        addresses: Arc<dyn AddressResolver>,
        domains: Arc<dyn CustomDomainStore>,
        dispatch: Arc<DispatchService>,
        delivery: Arc<DeliveryService>,
    ) -> Self {
        Self {
            records,
            addresses,
            domains,
            dispatch,
            delivery,
        }
    }

    /// Store a send request and, when it is due now, fire a background
    /// dispatch so the caller is not blocked on the provider.
    ///
    /// A background dispatch that loses the race with the queued loop is
    /// harmless: only the first outcome write lands.
    pub async fn submit(&self, request: SendEmailRequest) -> Result<SendEmailResponse, EmailError> {
        validate(&request)?;
        self.check_sender(request.account_id, request.from_email_id)
            .await?;

        let now = Utc::now();
        let status = sent_emails::Model::initial_status(request.scheduled_at, now);

        let attachments = if request.attachments.is_empty() {
            None
        } else {
            let stored: Vec<StoredAttachment> = request
                .attachments
                .iter()
                .map(|a| StoredAttachment {
                    filename: a.filename.clone(),
                    content: a.content.clone(),
                    content_type: a.content_type.clone(),
                })
                .collect();
            Some(serde_json::to_value(stored)?)
        };
        let headers = if request.headers.is_empty() {
            None
        } else {
            Some(serde_json::to_value(&request.headers)?)
        };

        let record = sent_emails::Model {
            id: Uuid::new_v4(),
            account_id: request.account_id,
            from_email_id: request.from_email_id,
            to_recipients: serde_json::to_value(&request.to)?,
            cc_recipients: list_value(&request.cc)?,
            bcc_recipients: list_value(&request.bcc)?,
            subject: request.subject,
            text_content: request.text,
            html_content: request.html,
            attachments,
            headers,
            thread_id: request.thread_id,
            scheduled_at: request.scheduled_at,
            sent_at: None,
            status,
            provider_message_id: None,
            failure_reason: None,
            metadata: request.metadata,
            created_at: now,
            updated_at: now,
        };

        let record = self.records.insert(record).await?;
        info!("Stored email {} as {}", record.id, record.status);

        if record.status == EmailStatus::Queued {
            let dispatch = self.dispatch.clone();
            let id = record.id;
            tokio::spawn(async move {
                if let Err(e) = dispatch.dispatch_by_id(id).await {
                    warn!("Immediate dispatch of email {} failed: {}", id, e);
                }
            });
        }

        Ok(SendEmailResponse {
            id: record.id,
            status: record.status,
            scheduled_at: record.scheduled_at,
        })
    }

    /// The sender must belong to the account and be active; a sender on a
    /// custom domain also needs that domain verified.
    async fn check_sender(&self, account_id: Uuid, from_email_id: Uuid) -> Result<(), EmailError> {
        let sender = self
            .addresses
            .get(from_email_id)
            .await?
            .filter(|a| a.account_id == account_id)
            .ok_or(EmailError::SenderNotFound(from_email_id))?;

        if sender.status != EmailAddressStatus::Active {
            return Err(EmailError::Validation(format!(
                "sender address {} is {}",
                sender.email,
                sender.status.as_str()
            )));
        }

        if let Some(domain_id) = sender.custom_domain_id {
            let domain = self.domains.get(domain_id).await?;
            match domain {
                Some(d) if d.is_verified() => {}
                Some(d) => return Err(EmailError::DomainNotVerified(d.domain)),
                None => return Err(EmailError::DomainNotVerified(domain_id.to_string())),
            }
        }

        debug!("Sender {} cleared for account {}", sender.email, account_id);
        Ok(())
    }

    pub async fn get(
        &self,
        account_id: Uuid,
        id: Uuid,
    ) -> Result<sent_emails::Model, EmailError> {
        self.records
            .get(id)
            .await?
            .filter(|r| r.account_id == account_id)
            .ok_or(EmailError::EmailNotFound(id))
    }

    /// Provider-reported delivery state; `None` until the email has been sent
    pub async fn delivery_status(
        &self,
        account_id: Uuid,
        id: Uuid,
    ) -> Result<Option<DeliveryStatus>, EmailError> {
        let record = self.get(account_id, id).await?;
        match record.provider_message_id {
            Some(message_id) => Ok(Some(self.delivery.delivery_status(&message_id).await?)),
            None => Ok(None),
        }
    }
}
