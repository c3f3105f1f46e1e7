//! WhatsApp Web session client.
//!
//! The simulated client drives the full pairing lifecycle without a browser:
//! it issues a pairing challenge on initialization and, when configured,
//! links itself after a delay. Sends are validated and logged.

use crate::client::{chat_id, ClientFactory, MessagingClient, SessionEvent, SessionEventSender};
use async_trait::async_trait;
use parking_lot::Mutex;
use relay_core::config::SessionConfig;
use relay_core::DeliveryError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// E.164 bounds on the number of digits in a subscriber id.
const MIN_RECIPIENT_DIGITS: usize = 7;
const MAX_RECIPIENT_DIGITS: usize = 15;

pub struct SimulatedWhatsAppClient {
    auto_link_after: Option<Duration>,
    fail_prefix: Option<String>,
    linked: Arc<AtomicBool>,
    linker: Mutex<Option<JoinHandle<()>>>,
}

impl SimulatedWhatsAppClient {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            auto_link_after: config.auto_link_after_ms.map(Duration::from_millis),
            fail_prefix: config.fail_numbers_with_prefix.clone(),
            linked: Arc::new(AtomicBool::new(false)),
            linker: Mutex::new(None),
        }
    }

    pub fn is_linked(&self) -> bool {
        self.linked.load(Ordering::Acquire)
    }
}

#[async_trait]
impl MessagingClient for SimulatedWhatsAppClient {
    async fn initialize(&self, events: SessionEventSender) -> anyhow::Result<()> {
        let challenge = format!("2@{}", Uuid::new_v4().simple());
        tracing::info!(
            generation = events.generation(),
            auto_link = self.auto_link_after.is_some(),
            "Simulated WhatsApp client issuing pairing challenge"
        );
        if !events.emit(SessionEvent::PairingChallenge(challenge)) {
            anyhow::bail!("session manager dropped before initialization");
        }

        if let Some(delay) = self.auto_link_after {
            let linked = self.linked.clone();
            let handle = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                linked.store(true, Ordering::Release);
                events.emit(SessionEvent::Authenticated);
            });
            if let Some(previous) = self.linker.lock().replace(handle) {
                previous.abort();
            }
        }
        Ok(())
    }

    async fn send_text(&self, recipient: &str, body: &str) -> Result<String, DeliveryError> {
        if !self.is_linked() {
            return Err(DeliveryError::new("Session closed"));
        }
        let digits = recipient.len();
        if !(MIN_RECIPIENT_DIGITS..=MAX_RECIPIENT_DIGITS).contains(&digits)
            || !recipient.chars().all(|c| c.is_ascii_digit())
        {
            return Err(DeliveryError::new(format!("Invalid recipient: {recipient}")));
        }
        if let Some(prefix) = self.fail_prefix.as_deref() {
            if !prefix.is_empty() && recipient.starts_with(prefix) {
                return Err(DeliveryError::new(format!(
                    "{recipient} is not registered on WhatsApp"
                )));
            }
        }

        let to = chat_id(recipient);
        tracing::info!(to = %to, body_len = body.len(), "Sending WhatsApp text message");
        Ok(format!("true_{to}_{}", Uuid::new_v4().simple()))
    }

    async fn shutdown(&self) {
        self.linked.store(false, Ordering::Release);
        if let Some(handle) = self.linker.lock().take() {
            handle.abort();
        }
        tracing::info!("Simulated WhatsApp client shut down");
    }
}

/// Creates a new simulated client for every session initialization.
pub struct SimulatedClientFactory {
    config: SessionConfig,
}

impl SimulatedClientFactory {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }
}

impl ClientFactory for SimulatedClientFactory {
    fn create(&self) -> Arc<dyn MessagingClient> {
        Arc::new(SimulatedWhatsAppClient::new(&self.config))
    }
}
