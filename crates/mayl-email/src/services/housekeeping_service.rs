//! Periodic cleanup that shares the dispatch scheduler's timers

use mayl_core::DBDateTime;
use std::sync::Arc;
use tracing::info;

use crate::errors::EmailError;
use crate::store::HousekeepingStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HousekeepingReport {
    pub expired_addresses: u64,
    pub purged_rate_limits: u64,
}

impl HousekeepingReport {
    pub fn is_empty(&self) -> bool {
        self.expired_addresses == 0 && self.purged_rate_limits == 0
    }
}

pub struct HousekeepingService {
    store: Arc<dyn HousekeepingStore>,
}

impl HousekeepingService {
    pub fn new(store: Arc<dyn HousekeepingStore>) -> Self {
        Self { store }
    }

    /// Expire lapsed temporary addresses, then drop expired rate-limit rows
    pub async fn run(&self, now: DBDateTime) -> Result<HousekeepingReport, EmailError> {
        let report = HousekeepingReport {
            expired_addresses: self.store.expire_temporary_addresses(now).await?,
            purged_rate_limits: self.store.purge_rate_limits(now).await?,
        };

        if !report.is_empty() {
            info!(
                "Cleanup expired {} temporary address(es) and purged {} rate limit(s)",
                report.expired_addresses, report.purged_rate_limits
            );
        }
        Ok(report)
    }
}
