//! Messaging-account session handling.
//!
//! Client: capability contract for the external protocol client.
//! Session: state machine tracking the single account connection.
//! WhatsApp: simulated WhatsApp Web client used by the service binary.

pub mod client;
pub mod session;
pub mod whatsapp;

#[cfg(any(test, feature = "testing"))]
pub mod mock;

pub use client::{chat_id, ClientFactory, MessagingClient, SessionEvent, SessionEventSender};
pub use session::{PairingArtifact, SessionManager, SessionState};
pub use whatsapp::{SimulatedClientFactory, SimulatedWhatsAppClient};
