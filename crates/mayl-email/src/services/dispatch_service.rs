//! Turns due send records into provider calls and writes the outcome back

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use mayl_core::DBDateTime;
use mayl_entities::sent_emails;
use mayl_entities::types::EmailStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::delivery::DeliveryService;
use crate::errors::EmailError;
use crate::providers::{Attachment, EmailMessage};
use crate::reconciliation::{ReconciliationEntry, ReconciliationSink};
use crate::store::{AddressResolver, DispatchOutcome, SendRecordStore};

/// Attachment as stored on a send record, content base64 encoded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredAttachment {
    pub filename: String,
    pub content: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// What happened to one record in a dispatch pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Sent,
    Failed,
    /// Left untouched for the next poll (missing address, bad stored data)
    Skipped,
    /// Another writer already moved the record on
    Superseded,
    /// Provider was called but the status write failed
    Unrecorded,
}

/// Summary of one dispatch loop run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub selected: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    pub superseded: usize,
    pub unrecorded: usize,
}

impl DispatchReport {
    fn tally(&mut self, disposition: Disposition) {
        match disposition {
            Disposition::Sent => self.sent += 1,
            Disposition::Failed => self.failed += 1,
            Disposition::Skipped => self.skipped += 1,
            Disposition::Superseded => self.superseded += 1,
            Disposition::Unrecorded => self.unrecorded += 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selected == 0
    }
}

fn recipients(value: &Value) -> Result<Vec<String>, EmailError> {
    Ok(serde_json::from_value(value.clone())?)
}

fn optional_recipients(value: Option<&Value>) -> Result<Vec<String>, EmailError> {
    match value {
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(v) => recipients(v),
    }
}

fn decode_attachments(value: Option<&Value>) -> Result<Vec<Attachment>, EmailError> {
    let stored: Vec<StoredAttachment> = match value {
        Some(Value::Null) | None => return Ok(Vec::new()),
        Some(v) => serde_json::from_value(v.clone())?,
    };

    stored
        .into_iter()
        .map(|a| {
            let content = BASE64.decode(a.content.as_bytes()).map_err(|e| {
                EmailError::Serialization(format!(
                    "attachment {} is not valid base64: {}",
                    a.filename, e
                ))
            })?;
            Ok(Attachment {
                filename: a.filename,
                content,
                content_type: a.content_type,
            })
        })
        .collect()
}

/// Only string-valued headers are forwarded
fn string_headers(value: Option<&Value>) -> BTreeMap<String, String> {
    match value {
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect(),
        _ => BTreeMap::new(),
    }
}

/// Build the provider message for `record`, sent from `from`
pub(crate) fn message_from_record(
    record: &sent_emails::Model,
    from: String,
) -> Result<EmailMessage, EmailError> {
    Ok(EmailMessage {
        from,
        from_name: None,
        to: recipients(&record.to_recipients)?,
        cc: optional_recipients(record.cc_recipients.as_ref())?,
        bcc: optional_recipients(record.bcc_recipients.as_ref())?,
        reply_to: None,
        subject: record.subject.clone(),
        text: record.text_content.clone(),
        html: record.html_content.clone(),
        attachments: decode_attachments(record.attachments.as_ref())?,
        headers: string_headers(record.headers.as_ref()),
    })
}

pub struct DispatchService {
    records: Arc<dyn SendRecordStore>,
    addresses: Arc<dyn AddressResolver>,
    delivery: Arc<DeliveryService>,
    reconciliation: Arc<dyn ReconciliationSink>,
    batch_size: u64,
}

impl DispatchService {
    pub fn new(
        records: Arc<dyn SendRecordStore>,
        addresses: Arc<dyn AddressResolver>,
        delivery: Arc<DeliveryService>,
        reconciliation: Arc<dyn ReconciliationSink>,
        batch_size: u64,
    ) -> Self {
        Self {
            records,
            addresses,
            delivery,
            reconciliation,
            batch_size,
        }
    }

    /// Dispatch `scheduled` records whose send time has arrived
    pub async fn process_scheduled_batch(
        &self,
        now: DBDateTime,
    ) -> Result<DispatchReport, EmailError> {
        let due = self.records.due_scheduled(now, self.batch_size).await?;
        Ok(self.dispatch_all("scheduled", due).await)
    }

    /// Dispatch `queued` records
    pub async fn process_queued_batch(&self) -> Result<DispatchReport, EmailError> {
        let queued = self.records.queued(self.batch_size).await?;
        Ok(self.dispatch_all("queued", queued).await)
    }

    /// Records are handled one after another; a failure on one never stops
    /// the rest of the batch.
    async fn dispatch_all(
        &self,
        loop_name: &str,
        batch: Vec<sent_emails::Model>,
    ) -> DispatchReport {
        let mut report = DispatchReport {
            selected: batch.len(),
            ..Default::default()
        };
        let mut seen = HashSet::with_capacity(batch.len());

        for record in batch {
            if !seen.insert(record.id) {
                continue;
            }
            let disposition = self.dispatch_record(&record).await;
            report.tally(disposition);
        }

        if !report.is_empty() {
            info!(
                "Processed {} {} email(s): {} sent, {} failed, {} skipped",
                report.selected, loop_name, report.sent, report.failed, report.skipped
            );
        }
        report
    }

    /// Send one record immediately if it is still waiting to go out.
    /// Used by the request path right after a `queued` record is stored.
    pub async fn dispatch_by_id(&self, id: Uuid) -> Result<Option<Disposition>, EmailError> {
        match self.records.get(id).await? {
            Some(record) if EmailStatus::awaiting_dispatch().contains(&record.status) => {
                Ok(Some(self.dispatch_record(&record).await))
            }
            Some(_) => Ok(None),
            None => Err(EmailError::EmailNotFound(id)),
        }
    }

    pub async fn dispatch_record(&self, record: &sent_emails::Model) -> Disposition {
        let from = match self.addresses.resolve(record.from_email_id).await {
            Ok(Some(address)) => address,
            Ok(None) => {
                warn!(
                    "Sender address {} for email {} not found, skipping",
                    record.from_email_id, record.id
                );
                return Disposition::Skipped;
            }
            Err(e) => {
                warn!("Failed to resolve sender for email {}: {}", record.id, e);
                return Disposition::Skipped;
            }
        };

        let message = match message_from_record(record, from) {
            Ok(message) => message,
            Err(e) => {
                warn!("Email {} has malformed stored content, skipping: {}", record.id, e);
                return Disposition::Skipped;
            }
        };

        let outcome = match self.delivery.send(&message).await {
            Ok(result) => {
                debug!("Email {} accepted by {}", record.id, result.provider);
                DispatchOutcome::Sent {
                    provider_message_id: result.message_id,
                    sent_at: Utc::now(),
                }
            }
            Err(e) => {
                warn!("Failed to send email {}: {}", record.id, e);
                DispatchOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };

        match self.records.record_outcome(record.id, &outcome).await {
            Ok(true) => match outcome {
                DispatchOutcome::Sent { .. } => Disposition::Sent,
                DispatchOutcome::Failed { .. } => Disposition::Failed,
            },
            Ok(false) => {
                warn!(
                    "Email {} was already moved on by another writer, outcome {} dropped",
                    record.id,
                    outcome.status()
                );
                Disposition::Superseded
            }
            Err(e) => {
                self.reconciliation.record(ReconciliationEntry::new(
                    record.id,
                    outcome.status(),
                    outcome.provider_message_id().map(str::to_string),
                    e,
                ));
                Disposition::Unrecorded
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockEmailProvider;
    use crate::reconciliation::testing::CollectingSink;
    use crate::store::memory::{MemoryAddressResolver, MemorySendRecordStore};
    use chrono::Duration;
    use mayl_entities::email_addresses;
    use mayl_entities::types::{EmailAddressStatus, EmailAddressType};
    use serde_json::json;

    struct Fixture {
        records: MemorySendRecordStore,
        addresses: MemoryAddressResolver,
        provider: MockEmailProvider,
        sink: CollectingSink,
        sender: email_addresses::Model,
    }

    impl Fixture {
        fn new() -> Self {
            let now = Utc::now();
            let sender = email_addresses::Model {
                id: Uuid::new_v4(),
                account_id: Uuid::new_v4(),
                email: "hello@example.com".to_string(),
                address_type: EmailAddressType::Persistent,
                status: EmailAddressStatus::Active,
                custom_domain_id: None,
                expires_at: None,
                created_at: now,
                updated_at: now,
            };
            let addresses = MemoryAddressResolver::new();
            addresses.put(sender.clone());

            Self {
                records: MemorySendRecordStore::new(),
                addresses,
                provider: MockEmailProvider::new(),
                sink: CollectingSink::default(),
                sender,
            }
        }

        fn service(&self) -> DispatchService {
            self.service_with(self.records.clone(), Some(self.provider.clone()))
        }

        fn service_with(
            &self,
            records: MemorySendRecordStore,
            provider: Option<MockEmailProvider>,
        ) -> DispatchService {
            let delivery = match provider {
                Some(p) => DeliveryService::new(Some(Arc::new(p)), None),
                None => DeliveryService::unconfigured(),
            };
            DispatchService::new(
                Arc::new(records),
                Arc::new(self.addresses.clone()),
                Arc::new(delivery),
                Arc::new(self.sink.clone()),
                100,
            )
        }

        fn record(&self, scheduled_at: Option<DBDateTime>) -> sent_emails::Model {
            let now = Utc::now();
            let record = sent_emails::Model {
                id: Uuid::new_v4(),
                account_id: self.sender.account_id,
                from_email_id: self.sender.id,
                to_recipients: json!(["user@example.net"]),
                cc_recipients: None,
                bcc_recipients: None,
                subject: "Hello".to_string(),
                text_content: Some("Hi there".to_string()),
                html_content: None,
                attachments: None,
                headers: None,
                thread_id: None,
                scheduled_at,
                sent_at: None,
                status: sent_emails::Model::initial_status(scheduled_at, now),
                provider_message_id: None,
                failure_reason: None,
                metadata: None,
                created_at: now,
                updated_at: now,
            };
            self.records.put(record.clone());
            record
        }
    }

    #[tokio::test]
    async fn test_queued_records_all_reach_a_final_status() {
        let fx = Fixture::new();
        let ids: Vec<Uuid> = (0..3).map(|_| fx.record(None).id).collect();

        let report = fx.service().process_queued_batch().await.unwrap();

        assert_eq!(report.selected, 3);
        assert_eq!(report.sent, 3);
        assert_eq!(fx.provider.send_call_count(), 3);
        for id in ids {
            let stored = fx.records.record(id).unwrap();
            assert_eq!(stored.status, EmailStatus::Sent);
            assert!(stored.sent_at.is_some());
            assert!(stored
                .provider_message_id
                .unwrap()
                .starts_with("mock-ses-"));
        }

        // Nothing left for the next tick
        let report = fx.service().process_queued_batch().await.unwrap();
        assert!(report.is_empty());
        assert_eq!(fx.provider.send_call_count(), 3);
    }

    #[tokio::test]
    async fn test_provider_failure_marks_record_failed() {
        let fx = Fixture::new();
        let record = fx.record(None);
        let service = fx.service_with(
            fx.records.clone(),
            Some(fx.provider.clone().with_send_failure()),
        );

        let report = service.process_queued_batch().await.unwrap();
        assert_eq!(report.failed, 1);

        let stored = fx.records.record(record.id).unwrap();
        assert_eq!(stored.status, EmailStatus::Failed);
        assert!(stored
            .failure_reason
            .unwrap()
            .contains("Mock ses send failure"));
        assert_eq!(stored.sent_at, None);
    }

    #[tokio::test]
    async fn test_no_provider_records_configuration_failure() {
        let fx = Fixture::new();
        let record = fx.record(None);

        let report = fx
            .service_with(fx.records.clone(), None)
            .process_queued_batch()
            .await
            .unwrap();
        assert_eq!(report.failed, 1);

        let stored = fx.records.record(record.id).unwrap();
        assert_eq!(
            stored.failure_reason.as_deref(),
            Some("Configuration error: no email providers available")
        );
    }

    #[tokio::test]
    async fn test_scheduled_records_wait_for_send_time() {
        let fx = Fixture::new();
        let now = Utc::now();
        let record = fx.record(Some(now + Duration::minutes(5)));
        let service = fx.service();

        let report = service.process_scheduled_batch(now).await.unwrap();
        assert!(report.is_empty());
        assert_eq!(fx.provider.send_call_count(), 0);

        let report = service
            .process_scheduled_batch(now + Duration::minutes(6))
            .await
            .unwrap();
        assert_eq!(report.sent, 1);
        assert_eq!(fx.records.record(record.id).unwrap().status, EmailStatus::Sent);

        // Exactly one tick picks it up
        let report = service
            .process_scheduled_batch(now + Duration::minutes(7))
            .await
            .unwrap();
        assert!(report.is_empty());
        assert_eq!(fx.provider.send_call_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_sender_skips_and_keeps_status() {
        let fx = Fixture::new();
        let mut record = fx.record(None);
        record.from_email_id = Uuid::new_v4();
        fx.records.put(record.clone());

        let report = fx.service().process_queued_batch().await.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(fx.provider.send_call_count(), 0);
        assert_eq!(
            fx.records.record(record.id).unwrap().status,
            EmailStatus::Queued
        );
    }

    #[tokio::test]
    async fn test_malformed_record_does_not_stop_the_batch() {
        let fx = Fixture::new();
        let mut broken = fx.record(None);
        broken.to_recipients = json!({"not": "a list"});
        fx.records.put(broken.clone());
        let good = fx.record(None);

        let report = fx.service().process_queued_batch().await.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.sent, 1);
        assert_eq!(fx.records.record(broken.id).unwrap().status, EmailStatus::Queued);
        assert_eq!(fx.records.record(good.id).unwrap().status, EmailStatus::Sent);
    }

    #[tokio::test]
    async fn test_lost_status_write_goes_to_reconciliation() {
        let fx = Fixture::new();
        let records = fx.records.clone().with_failing_outcome_writes();
        let record = fx.record(None);

        let report = fx
            .service_with(records, Some(fx.provider.clone()))
            .process_queued_batch()
            .await
            .unwrap();

        assert_eq!(report.unrecorded, 1);
        let entries = fx.sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].record_id, record.id);
        assert_eq!(entries[0].intended_status, EmailStatus::Sent);
        assert!(entries[0].provider_message_id.is_some());
        assert!(entries[0].error.contains("connection reset"));
    }

    #[tokio::test]
    async fn test_late_outcome_is_superseded() {
        let fx = Fixture::new();
        let record = fx.record(None);
        fx.records.force_status(record.id, EmailStatus::Sent);

        let disposition = fx.service().dispatch_record(&record).await;

        assert_eq!(disposition, Disposition::Superseded);
        assert_eq!(fx.records.record(record.id).unwrap().status, EmailStatus::Sent);
    }

    #[tokio::test]
    async fn test_duplicate_rows_in_batch_are_sent_once() {
        let fx = Fixture::new();
        let record = fx.record(None);

        let report = fx
            .service()
            .dispatch_all("queued", vec![record.clone(), record])
            .await;

        assert_eq!(report.selected, 2);
        assert_eq!(report.sent, 1);
        assert_eq!(fx.provider.send_call_count(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_by_id_ignores_finished_records() {
        let fx = Fixture::new();
        let record = fx.record(None);
        let service = fx.service();

        assert_eq!(
            service.dispatch_by_id(record.id).await.unwrap(),
            Some(Disposition::Sent)
        );
        assert_eq!(service.dispatch_by_id(record.id).await.unwrap(), None);
        assert!(matches!(
            service.dispatch_by_id(Uuid::new_v4()).await,
            Err(EmailError::EmailNotFound(_))
        ));
    }

    #[test]
    fn test_message_from_record_decodes_stored_fields() {
        let fx = Fixture::new();
        let mut record = fx.record(None);
        record.cc_recipients = Some(json!(["cc@example.net"]));
        record.attachments = Some(json!([
            {"filename": "a.txt", "content": BASE64.encode(b"hello"), "content_type": "text/plain"}
        ]));
        record.headers = Some(json!({"X-Campaign": "spring", "X-Count": 3}));

        let message = message_from_record(&record, "hello@example.com".to_string()).unwrap();

        assert_eq!(message.from, "hello@example.com");
        assert_eq!(message.to, vec!["user@example.net"]);
        assert_eq!(message.cc, vec!["cc@example.net"]);
        assert!(message.bcc.is_empty());
        assert_eq!(message.attachments[0].content, b"hello".to_vec());
        assert_eq!(message.headers.len(), 1);
        assert_eq!(message.headers["X-Campaign"], "spring");
    }

    #[test]
    fn test_bad_attachment_encoding_is_a_data_error() {
        let fx = Fixture::new();
        let mut record = fx.record(None);
        record.attachments = Some(json!([{"filename": "a.bin", "content": "!!not base64!!"}]));

        assert!(matches!(
            message_from_record(&record, "hello@example.com".to_string()),
            Err(EmailError::Serialization(_))
        ));
    }
}
