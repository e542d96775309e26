//! Verification providers keyed by name, resolved once at startup

use std::collections::HashMap;
use std::sync::Arc;

use super::traits::{DomainVerificationProvider, VerificationProviderType};
use crate::errors::EmailError;

#[derive(Clone, Default)]
pub struct VerificationProviderRegistry {
    providers: HashMap<VerificationProviderType, Arc<dyn DomainVerificationProvider>>,
    default: Option<VerificationProviderType>,
}

impl VerificationProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider. The first one registered becomes the default.
    pub fn register(mut self, provider: Arc<dyn DomainVerificationProvider>) -> Self {
        let kind = provider.provider_type();
        self.default.get_or_insert(kind);
        self.providers.insert(kind, provider);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn default_type(&self) -> Result<VerificationProviderType, EmailError> {
        self.default.ok_or_else(|| {
            EmailError::Configuration("no domain verification providers configured".to_string())
        })
    }

    pub fn get_type(
        &self,
        kind: VerificationProviderType,
    ) -> Result<Arc<dyn DomainVerificationProvider>, EmailError> {
        self.providers.get(&kind).cloned().ok_or_else(|| {
            EmailError::Configuration(format!(
                "verification provider {} is not configured",
                kind
            ))
        })
    }

    /// Resolve the provider named on a domain row
    pub fn get(&self, name: &str) -> Result<Arc<dyn DomainVerificationProvider>, EmailError> {
        self.get_type(VerificationProviderType::from_str(name)?)
    }
}
