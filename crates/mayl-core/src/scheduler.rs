//! Interval scheduler for long-running background loops
//!
//! Every registered task runs on its own timer inside a child of one root
//! cancellation token. Cancelling the root stops every loop together; a task
//! that is mid-run finishes that run before it observes the cancellation.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// A unit of recurring background work.
///
/// A run is expected to handle per-item failures itself. An `Err` is only
/// logged; the task keeps its schedule.
#[async_trait]
pub trait PeriodicTask: Send + Sync {
    /// Stable name used in logs
    fn name(&self) -> &'static str;

    /// Execute one pass of the task
    async fn run(&self) -> anyhow::Result<()>;
}

/// Timer configuration for one registered task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSchedule {
    pub interval: Duration,
    /// Run once as soon as the task is registered instead of waiting a full interval
    pub run_immediately: bool,
}

impl TaskSchedule {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            run_immediately: false,
        }
    }

    pub fn immediately(mut self) -> Self {
        self.run_immediately = true;
        self
    }
}

struct RegisteredTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

/// Owns the named interval tasks registered at startup
pub struct IntervalScheduler {
    root: CancellationToken,
    tasks: Vec<RegisteredTask>,
}

impl Default for IntervalScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl IntervalScheduler {
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// Create a scheduler whose root token is supplied by the caller
    pub fn with_token(root: CancellationToken) -> Self {
        Self {
            root,
            tasks: Vec::new(),
        }
    }

    /// Root token shared by every registered task
    pub fn cancellation_token(&self) -> CancellationToken {
        self.root.clone()
    }

    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|t| t.name).collect()
    }

    /// Spawn `task` on its own timer. Returns the task's child token, which
    /// stops only this task when cancelled.
    pub fn register(
        &mut self,
        task: Arc<dyn PeriodicTask>,
        schedule: TaskSchedule,
    ) -> CancellationToken {
        let name = task.name();
        let token = self.root.child_token();

        debug!(
            "Registering periodic task {} (interval: {:?}, run_immediately: {})",
            name, schedule.interval, schedule.run_immediately
        );

        let handle = tokio::spawn(run_periodic(task, schedule, token.clone()));
        self.tasks.push(RegisteredTask { name, handle });

        token
    }

    /// Cancel every task and wait for all of them to return
    pub async fn shutdown(self) {
        info!("Stopping {} periodic tasks", self.tasks.len());
        self.root.cancel();
        self.join().await;
    }

    /// Wait for every task to return without cancelling them
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.handle.await {
                error!("Periodic task {} terminated abnormally: {}", task.name, e);
            }
        }
    }
}

async fn run_periodic(
    task: Arc<dyn PeriodicTask>,
    schedule: TaskSchedule,
    token: CancellationToken,
) {
    let name = task.name();

    // tokio panics on a zero period
    let period = schedule.interval.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    if !schedule.run_immediately {
        // The first tick of an interval completes immediately
        ticker.tick().await;
    }

    info!("Periodic task {} started (every {:?})", name, period);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                info!("Periodic task {} received cancellation signal", name);
                break;
            }
            _ = ticker.tick() => {
                debug!("Running periodic task {}", name);
                if let Err(e) = task.run().await {
                    error!("Periodic task {} failed: {:#}", name, e);
                }
            }
        }
    }
}
