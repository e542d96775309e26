//! Shared type aliases

use chrono::{DateTime, Utc};

/// Database DateTime type used across all Mayl crates
///
/// This is the canonical datetime type for TIMESTAMPTZ columns and for
/// every "now" the scheduler loops compare against.
pub type DBDateTime = DateTime<Utc>;
