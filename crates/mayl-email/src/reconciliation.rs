//! Reconciliation log for outcome writes that failed after a provider call
//!
//! When a provider accepted (or rejected) a message but the status write
//! could not be persisted, the record stays `queued`/`scheduled` and the
//! next poll may send it again. Every such case is handed to a
//! `ReconciliationSink` so it can be found and repaired.

use chrono::Utc;
use mayl_core::DBDateTime;
use mayl_entities::types::EmailStatus;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationEntry {
    pub record_id: Uuid,
    /// Status the record should have been moved to
    pub intended_status: EmailStatus,
    pub provider_message_id: Option<String>,
    /// Why the status write failed
    pub error: String,
    pub at: DBDateTime,
}

impl ReconciliationEntry {
    pub fn new(
        record_id: Uuid,
        intended_status: EmailStatus,
        provider_message_id: Option<String>,
        error: impl ToString,
    ) -> Self {
        Self {
            record_id,
            intended_status,
            provider_message_id,
            error: error.to_string(),
            at: Utc::now(),
        }
    }
}

pub trait ReconciliationSink: Send + Sync {
    fn record(&self, entry: ReconciliationEntry);

    /// Entries recorded since startup
    fn count(&self) -> u64;
}

/// Writes entries to the `mayl_email::reconciliation` tracing target
#[derive(Clone, Default)]
pub struct TracingReconciliationSink {
    recorded: Arc<AtomicU64>,
}

impl TracingReconciliationSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReconciliationSink for TracingReconciliationSink {
    fn record(&self, entry: ReconciliationEntry) {
        self.recorded.fetch_add(1, Ordering::Relaxed);
        error!(
            target: "mayl_email::reconciliation",
            record_id = %entry.record_id,
            intended_status = %entry.intended_status,
            provider_message_id = entry.provider_message_id.as_deref().unwrap_or(""),
            at = %entry.at,
            "Status write lost after provider call: {}",
            entry.error
        );
    }

    fn count(&self) -> u64 {
        self.recorded.load(Ordering::Relaxed)
    }
}
