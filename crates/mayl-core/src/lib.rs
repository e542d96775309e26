//! Core utilities and types shared across all Mayl crates

pub mod error;
pub mod scheduler;
pub mod types;

// Re-export commonly used types
pub use error::*;
pub use scheduler::{IntervalScheduler, PeriodicTask, TaskSchedule};
pub use types::*;

// Re-export external dependencies
pub use anyhow;
pub use async_trait;
pub use chrono;
pub use tokio_util;
