//! Periodic tasks registered with the interval scheduler
//!
//! Each job wraps one service pass. Per-record failures are absorbed by the
//! services; an `Err` here means the pass itself could not run (for example
//! the batch query failed) and the scheduler simply tries again next tick.

use async_trait::async_trait;
use chrono::Utc;
use mayl_core::{IntervalScheduler, PeriodicTask, TaskSchedule};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::services::{DispatchService, DomainVerificationService, HousekeepingService};
use crate::settings::SchedulerSettings;

pub const SCHEDULED_EMAIL_JOB: &str = "scheduled-emails";
pub const QUEUED_EMAIL_JOB: &str = "queued-emails";
pub const HOUSEKEEPING_JOB: &str = "cleanup";
pub const DOMAIN_VERIFICATION_JOB: &str = "domain-verification";

pub struct ScheduledEmailJob {
    dispatch: Arc<DispatchService>,
}

impl ScheduledEmailJob {
    pub fn new(dispatch: Arc<DispatchService>) -> Self {
        Self { dispatch }
    }
}

#[async_trait]
impl PeriodicTask for ScheduledEmailJob {
    fn name(&self) -> &'static str {
        SCHEDULED_EMAIL_JOB
    }

    async fn run(&self) -> anyhow::Result<()> {
        self.dispatch.process_scheduled_batch(Utc::now()).await?;
        Ok(())
    }
}

pub struct QueuedEmailJob {
    dispatch: Arc<DispatchService>,
}

impl QueuedEmailJob {
    pub fn new(dispatch: Arc<DispatchService>) -> Self {
        Self { dispatch }
    }
}

#[async_trait]
impl PeriodicTask for QueuedEmailJob {
    fn name(&self) -> &'static str {
        QUEUED_EMAIL_JOB
    }

    async fn run(&self) -> anyhow::Result<()> {
        self.dispatch.process_queued_batch().await?;
        Ok(())
    }
}

pub struct HousekeepingJob {
    housekeeping: Arc<HousekeepingService>,
}

impl HousekeepingJob {
    pub fn new(housekeeping: Arc<HousekeepingService>) -> Self {
        Self { housekeeping }
    }
}

#[async_trait]
impl PeriodicTask for HousekeepingJob {
    fn name(&self) -> &'static str {
        HOUSEKEEPING_JOB
    }

    async fn run(&self) -> anyhow::Result<()> {
        self.housekeeping.run(Utc::now()).await?;
        Ok(())
    }
}

pub struct DomainVerificationJob {
    verification: Arc<DomainVerificationService>,
}

impl DomainVerificationJob {
    pub fn new(verification: Arc<DomainVerificationService>) -> Self {
        Self { verification }
    }
}

#[async_trait]
impl PeriodicTask for DomainVerificationJob {
    fn name(&self) -> &'static str {
        DOMAIN_VERIFICATION_JOB
    }

    async fn run(&self) -> anyhow::Result<()> {
        self.verification.run_verification_batch(Utc::now()).await?;
        Ok(())
    }
}

/// Services driven by the background loops
pub struct WorkerServices {
    pub dispatch: Arc<DispatchService>,
    pub housekeeping: Arc<HousekeepingService>,
    /// `None` when no verification provider is configured
    pub verification: Option<Arc<DomainVerificationService>>,
}

/// Register every loop on `scheduler`. Domain verification also runs once
/// at startup.
pub fn register_jobs(
    scheduler: &mut IntervalScheduler,
    services: &WorkerServices,
    settings: &SchedulerSettings,
) -> Vec<CancellationToken> {
    let mut tokens = vec![
        scheduler.register(
            Arc::new(ScheduledEmailJob::new(services.dispatch.clone())),
            TaskSchedule::every(settings.scheduled_interval),
        ),
        scheduler.register(
            Arc::new(QueuedEmailJob::new(services.dispatch.clone())),
            TaskSchedule::every(settings.queued_interval),
        ),
        scheduler.register(
            Arc::new(HousekeepingJob::new(services.housekeeping.clone())),
            TaskSchedule::every(settings.cleanup_interval),
        ),
    ];

    if let Some(verification) = &services.verification {
        tokens.push(scheduler.register(
            Arc::new(DomainVerificationJob::new(verification.clone())),
            TaskSchedule::every(settings.verification_interval).immediately(),
        ));
    }

    tokens
}
