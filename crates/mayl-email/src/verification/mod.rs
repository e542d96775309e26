//! Domain verification providers
//!
//! The orchestrator only ever sees `DomainVerificationProvider`; the SES and
//! Resend adapters are picked per domain through the registry.

mod registry;
mod resend;
mod ses;
mod traits;

#[cfg(test)]
pub mod mock;

pub use registry::VerificationProviderRegistry;
pub use resend::ResendVerificationProvider;
pub use ses::SesVerificationProvider;
pub use traits::*;

#[cfg(test)]
pub use mock::MockVerificationProvider;
