//! Mock email provider for testing

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::errors::EmailError;
use crate::providers::{
    DeliveryState, DeliveryStatus, EmailMessage, EmailProvider, EmailProviderKind, SendResult,
};

/// Mock email provider for testing
#[derive(Debug, Clone)]
pub struct MockEmailProvider {
    pub send_count: Arc<AtomicUsize>,
    pub status_count: Arc<AtomicUsize>,
    /// Every message handed to `send`, in call order
    pub sent: Arc<Mutex<Vec<EmailMessage>>>,

    pub kind: EmailProviderKind,
    pub should_fail_send: bool,
    pub return_message_id: bool,
    pub delivery_state: Option<DeliveryState>,
}

impl Default for MockEmailProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmailProvider {
    pub fn new() -> Self {
        Self {
            send_count: Arc::new(AtomicUsize::new(0)),
            status_count: Arc::new(AtomicUsize::new(0)),
            sent: Arc::new(Mutex::new(Vec::new())),
            kind: EmailProviderKind::Ses,
            should_fail_send: false,
            return_message_id: true,
            delivery_state: None,
        }
    }

    pub fn with_kind(mut self, kind: EmailProviderKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_send_failure(mut self) -> Self {
        self.should_fail_send = true;
        self
    }

    pub fn without_message_id(mut self) -> Self {
        self.return_message_id = false;
        self
    }

    pub fn with_delivery_state(mut self, state: DeliveryState) -> Self {
        self.delivery_state = Some(state);
        self
    }

    pub fn send_call_count(&self) -> usize {
        self.send_count.load(Ordering::SeqCst)
    }

    pub fn status_call_count(&self) -> usize {
        self.status_count.load(Ordering::SeqCst)
    }

    pub fn sent_messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailProvider for MockEmailProvider {
    async fn send(&self, message: &EmailMessage) -> Result<SendResult, EmailError> {
        self.send_count.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(message.clone());

        if self.should_fail_send {
            return Err(EmailError::ProviderError(format!(
                "Mock {} send failure",
                self.kind
            )));
        }

        Ok(SendResult {
            message_id: self
                .return_message_id
                .then(|| format!("mock-{}-{}", self.kind, uuid::Uuid::new_v4())),
            provider: self.kind,
        })
    }

    async fn delivery_status(&self, message_id: &str) -> Result<DeliveryStatus, EmailError> {
        self.status_count.fetch_add(1, Ordering::SeqCst);
        Ok(DeliveryStatus {
            message_id: message_id.to_string(),
            state: self.delivery_state.unwrap_or(DeliveryState::Unknown),
        })
    }

    fn provider_type(&self) -> EmailProviderKind {
        self.kind
    }
}
