//! Mayl email core
//!
//! Delivery through SES, Resend or SendGrid with an optional fallback, the
//! dispatch loops that drain queued and scheduled sends, DNS validation, and
//! custom domain verification through SES or Resend.

pub mod delivery;
pub mod dns;
pub mod errors;
pub mod jobs;
pub mod providers;
pub mod reconciliation;
pub mod services;
pub mod settings;
pub mod store;
pub mod verification;

pub use delivery::DeliveryService;
pub use dns::{DnsRecordCheck, DnsValidationResult, DnsValidator};
pub use errors::EmailError;
pub use jobs::{register_jobs, WorkerServices};
pub use reconciliation::{ReconciliationEntry, ReconciliationSink, TracingReconciliationSink};
pub use services::*;
pub use settings::{
    EmailProviderSettings, ProviderClients, ProviderCredentials, SchedulerSettings,
    VerificationSettings,
};
