//! Email provider abstractions and implementations

mod mime;
mod resend;
mod sendgrid;
mod ses;
mod traits;

#[cfg(test)]
pub mod mock;

pub use mime::build_mime_message;
pub use resend::{
    ResendClient, ResendDomain, ResendDomainRecord, ResendEmail, ResendProvider,
    DEFAULT_RESEND_REGION, RESEND_API_URL,
};
pub use sendgrid::{SendGridProvider, SENDGRID_API_URL};
pub use ses::{SesProvider, SesSettings, DEFAULT_AWS_REGION};
pub(crate) use ses::extract_ses_error_details;
pub use traits::*;

#[cfg(test)]
pub use mock::MockEmailProvider;
