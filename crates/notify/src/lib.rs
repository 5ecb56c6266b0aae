//! Decision notification delivery.
//!
//! The workflow records every decision first and only then asks a
//! [`DecisionNotifier`] to announce it. Delivery failure is never allowed to
//! undo a committed decision; callers surface it as a warning instead.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::Mutex;

use reqflow_core::domain::status::DecisionStatus;
use reqflow_core::roles::Role;

pub mod mailer;

pub use mailer::MailRelayNotifier;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification transport failure: {0}")]
    Transport(String),
    #[error("mail relay rejected the message: {0}")]
    Rejected(String),
}

/// What happened, and who should hear about it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecisionNotification {
    pub purchase_id: String,
    pub project_ref: String,
    pub decided_by: String,
    pub sender_role: Role,
    pub status: DecisionStatus,
    /// Role-level audience plus the requester's address book entry.
    pub recipient_role: Role,
    pub recipient_name: String,
    pub message: String,
    /// Derived from the purchase's material lines at send time.
    pub total_cost: Decimal,
}

impl DecisionNotification {
    pub fn subject(&self) -> String {
        format!(
            "Purchase request {} {}",
            self.purchase_id,
            match self.status {
                DecisionStatus::Approved => "approved",
                DecisionStatus::Rejected => "rejected",
                DecisionStatus::Pending => "updated",
            }
        )
    }
}

#[async_trait]
pub trait DecisionNotifier: Send + Sync {
    async fn notify(&self, notification: &DecisionNotification) -> Result<(), NotifyError>;
}

/// Used when mail is disabled in configuration.
pub struct NoopNotifier;

#[async_trait]
impl DecisionNotifier for NoopNotifier {
    async fn notify(&self, notification: &DecisionNotification) -> Result<(), NotifyError> {
        tracing::debug!(
            purchase_id = %notification.purchase_id,
            recipient = %notification.recipient_role.as_str(),
            "mail disabled, dropping notification"
        );
        Ok(())
    }
}

/// Test double that retains everything it is asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<DecisionNotification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<DecisionNotification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl DecisionNotifier for RecordingNotifier {
    async fn notify(&self, notification: &DecisionNotification) -> Result<(), NotifyError> {
        self.sent.lock().await.push(notification.clone());
        Ok(())
    }
}

/// Test double whose delivery always fails.
pub struct FailingNotifier;

#[async_trait]
impl DecisionNotifier for FailingNotifier {
    async fn notify(&self, _notification: &DecisionNotification) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("relay unreachable".to_string()))
    }
}
