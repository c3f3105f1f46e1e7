//! Scripted messaging client for tests.

use crate::client::{ClientFactory, MessagingClient, SessionEvent, SessionEventSender};
use async_trait::async_trait;
use parking_lot::Mutex;
use relay_core::DeliveryError;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::Instant;

/// A message handed to a mock client.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub recipient: String,
    pub body: String,
    pub at: Instant,
}

#[derive(Default)]
struct Script {
    /// Emit `Authenticated` straight away instead of a pairing challenge.
    auto_ready: bool,
    fail_init: bool,
    failing: Mutex<HashSet<String>>,
    sent: Mutex<Vec<SentMessage>>,
}

pub struct MockClient {
    script: Arc<Script>,
    sender: Mutex<Option<SessionEventSender>>,
    shut_down: AtomicBool,
}

impl MockClient {
    /// Emit a lifecycle event as if the protocol client raised it.
    pub fn emit(&self, event: SessionEvent) -> bool {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.emit(event),
            None => false,
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

#[async_trait]
impl MessagingClient for MockClient {
    async fn initialize(&self, events: SessionEventSender) -> anyhow::Result<()> {
        if self.script.fail_init {
            anyhow::bail!("browser failed to launch");
        }
        *self.sender.lock() = Some(events.clone());
        if self.script.auto_ready {
            events.emit(SessionEvent::Authenticated);
        } else {
            events.emit(SessionEvent::PairingChallenge("mock-challenge".to_string()));
        }
        Ok(())
    }

    async fn send_text(&self, recipient: &str, body: &str) -> Result<String, DeliveryError> {
        self.script.sent.lock().push(SentMessage {
            recipient: recipient.to_string(),
            body: body.to_string(),
            at: Instant::now(),
        });
        if self.is_shut_down() {
            return Err(DeliveryError::new("Session closed"));
        }
        if self.script.failing.lock().contains(recipient) {
            return Err(DeliveryError::new(format!("{recipient} rejected")));
        }
        Ok(format!("mock-{recipient}"))
    }

    async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
    }
}

pub struct MockClientFactory {
    script: Arc<Script>,
    clients: Mutex<Vec<Arc<MockClient>>>,
}

impl MockClientFactory {
    /// Clients that wait to be paired.
    pub fn new() -> Arc<Self> {
        Self::with_script(Script::default())
    }

    /// Clients that authenticate as soon as they start.
    pub fn auto_ready() -> Arc<Self> {
        Self::with_script(Script {
            auto_ready: true,
            ..Script::default()
        })
    }

    pub fn failing_init() -> Arc<Self> {
        Self::with_script(Script {
            fail_init: true,
            ..Script::default()
        })
    }

    fn with_script(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Arc::new(script),
            clients: Mutex::new(Vec::new()),
        })
    }

    /// Make every send to `recipient` fail.
    pub fn fail_recipient(&self, recipient: &str) {
        self.script.failing.lock().insert(recipient.to_string());
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.script.sent.lock().clone()
    }

    pub fn created(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn latest(&self) -> Option<Arc<MockClient>> {
        self.clients.lock().last().cloned()
    }
}

impl ClientFactory for MockClientFactory {
    fn create(&self) -> Arc<dyn MessagingClient> {
        let client = Arc::new(MockClient {
            script: self.script.clone(),
            sender: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        });
        self.clients.lock().push(client.clone());
        client
    }
}
