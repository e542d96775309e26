//! Delivery service: one primary provider, one optional fallback
//!
//! A send makes at most two provider calls. Retrying across time is the
//! dispatch loops' business, not this service's.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::EmailError;
use crate::providers::{DeliveryStatus, EmailMessage, EmailProvider, SendResult};

#[derive(Clone, Default)]
pub struct DeliveryService {
    primary: Option<Arc<dyn EmailProvider>>,
    fallback: Option<Arc<dyn EmailProvider>>,
}

impl DeliveryService {
    pub fn new(
        primary: Option<Arc<dyn EmailProvider>>,
        fallback: Option<Arc<dyn EmailProvider>>,
    ) -> Self {
        Self { primary, fallback }
    }

    /// No providers at all; every send fails with a configuration error
    pub fn unconfigured() -> Self {
        Self::default()
    }

    pub fn is_configured(&self) -> bool {
        self.primary.is_some() || self.fallback.is_some()
    }

    fn not_configured() -> EmailError {
        EmailError::Configuration("no email providers available".to_string())
    }

    /// Send through the primary; on any primary error, try the fallback once.
    ///
    /// With a fallback configured its outcome is returned as-is and the
    /// primary's error is only logged. Without one, the primary's error is
    /// returned.
    pub async fn send(&self, message: &EmailMessage) -> Result<SendResult, EmailError> {
        let primary_error = match &self.primary {
            Some(primary) => match primary.send(message).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    warn!(
                        "Primary email provider {} failed: {}",
                        primary.provider_type(),
                        e
                    );
                    Some(e)
                }
            },
            None => None,
        };

        match (&self.fallback, primary_error) {
            (Some(fallback), _) => {
                debug!("Retrying send via fallback provider {}", fallback.provider_type());
                fallback.send(message).await
            }
            (None, Some(e)) => Err(e),
            (None, None) => Err(Self::not_configured()),
        }
    }

    /// Ask the primary (else the fallback) what happened to a message
    pub async fn delivery_status(&self, message_id: &str) -> Result<DeliveryStatus, EmailError> {
        match self.primary.as_ref().or(self.fallback.as_ref()) {
            Some(provider) => provider.delivery_status(message_id).await,
            None => Err(Self::not_configured()),
        }
    }
}
