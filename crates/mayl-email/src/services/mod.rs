//! Business logic services

pub mod dispatch_service;
pub mod domain_service;
pub mod email_service;
pub mod housekeeping_service;

pub use dispatch_service::{DispatchReport, DispatchService, Disposition};
pub use domain_service::{
    normalize_domain_name, DomainReconciliation, DomainVerificationService, VerificationReport,
};
pub use email_service::{AttachmentInput, EmailService, SendEmailRequest, SendEmailResponse};
pub use housekeeping_service::{HousekeepingReport, HousekeepingService};
