//! Capability contract for the messaging-account protocol client.
//!
//! The client is a black box: it can establish a session, report lifecycle
//! events, and deliver one text to one recipient. Everything stateful about
//! the session lives in [`crate::session`].

use async_trait::async_trait;
use relay_core::{DeliveryError, RelayError};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Lifecycle events reported by a protocol client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A pairing challenge must be scanned by the account owner.
    PairingChallenge(String),
    Authenticated,
    SessionLost(String),
    AuthFailed(String),
    /// Client-level error that does not change the session phase.
    ClientError(String),
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::PairingChallenge(_) => "pairing_challenge",
            SessionEvent::Authenticated => "authenticated",
            SessionEvent::SessionLost(_) => "session_lost",
            SessionEvent::AuthFailed(_) => "auth_failed",
            SessionEvent::ClientError(_) => "client_error",
        }
    }

    /// Session-level failure carried by this event, if any. These are logged
    /// and never surfaced to callers.
    pub fn protocol_error(&self) -> Option<RelayError> {
        match self {
            SessionEvent::AuthFailed(reason) => {
                Some(RelayError::Protocol(format!("authentication failed: {reason}")))
            }
            SessionEvent::ClientError(message) => Some(RelayError::Protocol(message.clone())),
            _ => None,
        }
    }
}

/// An event tagged with the generation of the client that raised it.
#[derive(Debug, Clone)]
pub struct TaggedEvent {
    pub generation: u64,
    pub event: SessionEvent,
}

/// Handed to a client on initialization; every event it emits is stamped
/// with that client's generation so events from a torn-down client can be
/// told apart from the live one.
#[derive(Debug, Clone)]
pub struct SessionEventSender {
    generation: u64,
    tx: mpsc::UnboundedSender<TaggedEvent>,
}

impl SessionEventSender {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<TaggedEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Emit a lifecycle event. Returns false if the session manager is gone.
    pub fn emit(&self, event: SessionEvent) -> bool {
        debug!(generation = self.generation, event = event.name(), "Session event emitted");
        self.tx
            .send(TaggedEvent {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// One connection to the external messaging account.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Start establishing the session. Outcomes arrive later as events on
    /// `events`; an `Err` here means the client could not even start.
    async fn initialize(&self, events: SessionEventSender) -> anyhow::Result<()>;

    /// Deliver `body` to the canonical recipient id. Returns the provider
    /// message id on success.
    async fn send_text(&self, recipient: &str, body: &str) -> Result<String, DeliveryError>;

    /// Release the underlying connection.
    async fn shutdown(&self);
}

/// Builds a fresh client each time the session (re)initializes.
pub trait ClientFactory: Send + Sync {
    fn create(&self) -> Arc<dyn MessagingClient>;
}

/// Chat address for a canonical recipient id.
pub fn chat_id(recipient: &str) -> String {
    format!("{recipient}@c.us")
}
