//! HTTP mail relay client.
//!
//! Delivery goes through an internal relay service that owns the role to
//! mailbox directory, so the payload carries role names rather than
//! addresses.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Serialize;

use reqflow_core::config::MailConfig;

use crate::{DecisionNotification, DecisionNotifier, NotifyError};

pub struct MailRelayNotifier {
    client: reqwest::Client,
    relay_url: String,
    from_address: String,
    api_token: secrecy::SecretString,
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    recipient_role: &'a str,
    recipient_name: &'a str,
    subject: String,
    body: &'a str,
    purchase_id: &'a str,
    project_ref: &'a str,
    total_cost: String,
}

impl MailRelayNotifier {
    pub fn from_config(config: &MailConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            relay_url: config.relay_url.clone(),
            from_address: config.from_address.clone(),
            api_token: config.api_token.clone(),
        })
    }
}

#[async_trait]
impl DecisionNotifier for MailRelayNotifier {
    async fn notify(&self, notification: &DecisionNotification) -> Result<(), NotifyError> {
        let message = RelayMessage {
            from: &self.from_address,
            recipient_role: notification.recipient_role.as_str(),
            recipient_name: &notification.recipient_name,
            subject: notification.subject(),
            body: &notification.message,
            purchase_id: &notification.purchase_id,
            project_ref: &notification.project_ref,
            total_cost: notification.total_cost.to_string(),
        };

        let response = self
            .client
            .post(&self.relay_url)
            .bearer_auth(self.api_token.expose_secret())
            .json(&message)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        if response.status().is_success() {
            tracing::info!(
                purchase_id = %notification.purchase_id,
                recipient = %notification.recipient_role.as_str(),
                "notification delivered"
            );
            Ok(())
        } else {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            Err(NotifyError::Rejected(format!("{status}: {detail}")))
        }
    }
}
