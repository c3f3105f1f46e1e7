//! Session state machine for the single messaging-account connection.
//!
//! Phases move only in response to client lifecycle events. The manager
//! owns the client handle, consumes events on one task, and publishes the
//! resulting state through a watch channel for any number of readers.

use crate::client::{ClientFactory, MessagingClient, SessionEvent, SessionEventSender, TaggedEvent};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{ImageFormat, Luma};
use parking_lot::Mutex;
use qrcode::QrCode;
use relay_core::types::{SessionPhase, SessionStatus};
use relay_core::{RelayError, RelayResult};
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

const QR_MIN_SIZE: u32 = 256;

/// Scannable credential used to link a new session: the raw challenge and
/// its QR code as a PNG data URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingArtifact {
    challenge: String,
    data_url: String,
}

impl PairingArtifact {
    pub fn encode(challenge: impl Into<String>) -> RelayResult<Self> {
        let challenge = challenge.into();
        let code = QrCode::new(challenge.as_bytes())
            .map_err(|e| RelayError::Protocol(format!("pairing challenge not encodable: {e}")))?;
        let image = code
            .render::<Luma<u8>>()
            .min_dimensions(QR_MIN_SIZE, QR_MIN_SIZE)
            .build();

        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| RelayError::Protocol(format!("pairing QR not renderable: {e}")))?;

        Ok(Self {
            challenge,
            data_url: format!("data:image/png;base64,{}", STANDARD.encode(&png)),
        })
    }

    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    pub fn data_url(&self) -> &str {
        &self.data_url
    }
}

/// What the manager must do after an event has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    Ignored,
    /// Phase changed and the client handle must be discarded.
    TearDown,
}

/// Phase plus pairing artifact. The artifact is held iff the phase is
/// `PendingAuth`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    phase: SessionPhase,
    pairing: Option<PairingArtifact>,
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn pairing_artifact(&self) -> Option<&PairingArtifact> {
        self.pairing.as_ref()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            ready: self.phase == SessionPhase::Ready,
            has_pairing_artifact: self.pairing.is_some(),
        }
    }

    pub fn apply(&mut self, event: &SessionEvent) -> Transition {
        match event {
            SessionEvent::PairingChallenge(challenge) => match PairingArtifact::encode(challenge.as_str()) {
                Ok(artifact) => {
                    self.enter(SessionPhase::PendingAuth);
                    self.pairing = Some(artifact);
                    Transition::Applied
                }
                Err(e) => {
                    error!(error = %e, "Discarding pairing challenge");
                    Transition::Ignored
                }
            },
            // A restored login links without ever showing a challenge.
            SessionEvent::Authenticated => match self.phase {
                SessionPhase::PendingAuth | SessionPhase::Unauthenticated => {
                    self.enter(SessionPhase::Ready);
                    Transition::Applied
                }
                SessionPhase::Ready | SessionPhase::Disconnected => Transition::Ignored,
            },
            SessionEvent::SessionLost(_) => {
                self.enter(SessionPhase::Disconnected);
                Transition::TearDown
            }
            SessionEvent::AuthFailed(_) => match self.phase {
                SessionPhase::PendingAuth => {
                    self.enter(SessionPhase::Unauthenticated);
                    Transition::Applied
                }
                _ => Transition::Ignored,
            },
            SessionEvent::ClientError(_) => Transition::Ignored,
        }
    }

    /// A fresh client is starting; a disconnected session loops back.
    fn begin_initialization(&mut self) -> bool {
        if self.phase == SessionPhase::Disconnected {
            self.enter(SessionPhase::Unauthenticated);
            return true;
        }
        false
    }

    fn enter(&mut self, phase: SessionPhase) {
        self.phase = phase;
        self.pairing = None;
    }
}

struct ActiveClient {
    generation: u64,
    client: Arc<dyn MessagingClient>,
}

/// Owns the messaging client handle and the session state machine.
pub struct SessionManager {
    factory: Arc<dyn ClientFactory>,
    state: watch::Sender<SessionState>,
    client: Mutex<Option<ActiveClient>>,
    generation: AtomicU64,
    events: mpsc::UnboundedSender<TaggedEvent>,
}

impl SessionManager {
    /// Create the manager and spawn its event consumer. No client is created
    /// until the first status query.
    pub fn start(factory: Arc<dyn ClientFactory>) -> Arc<Self> {
        let (events, receiver) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(SessionState::default());
        let manager = Arc::new(Self {
            factory,
            state,
            client: Mutex::new(None),
            generation: AtomicU64::new(0),
            events,
        });

        tokio::spawn(Self::consume_events(Arc::downgrade(&manager), receiver));
        info!("Session manager started");
        manager
    }

    async fn consume_events(manager: Weak<Self>, mut receiver: mpsc::UnboundedReceiver<TaggedEvent>) {
        while let Some(tagged) = receiver.recv().await {
            let Some(manager) = manager.upgrade() else {
                break;
            };
            manager.handle_event(tagged).await;
        }
        debug!("Session event consumer stopped");
    }

    async fn handle_event(&self, tagged: TaggedEvent) {
        let TaggedEvent { generation, event } = tagged;
        if self.current_generation() != Some(generation) {
            debug!(generation, event = event.name(), "Dropping event from stale client");
            return;
        }

        metrics::counter!("session.events", "event" => event.name()).increment(1);

        let mut transition = Transition::Ignored;
        self.state.send_if_modified(|state| {
            transition = state.apply(&event);
            transition != Transition::Ignored
        });
        let phase = self.phase();

        match &event {
            SessionEvent::PairingChallenge(_) => {
                info!(generation, phase = phase.display_name(), "Pairing challenge received")
            }
            SessionEvent::Authenticated => {
                info!(generation, phase = phase.display_name(), "Messaging session authenticated")
            }
            SessionEvent::SessionLost(reason) => {
                warn!(generation, reason = %reason, "Messaging session lost")
            }
            SessionEvent::AuthFailed(_) | SessionEvent::ClientError(_) => {
                if let Some(err) = event.protocol_error() {
                    error!(generation, error = %err, phase = phase.display_name(), "Messaging client reported a failure")
                }
            }
        }

        if transition == Transition::TearDown {
            self.tear_down(generation).await;
        }
    }

    /// Create and start a client unless one already exists.
    pub fn ensure_initialized(&self) {
        let (generation, client) = {
            let mut guard = self.client.lock();
            if guard.is_some() {
                return;
            }
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let client = self.factory.create();
            *guard = Some(ActiveClient {
                generation,
                client: client.clone(),
            });
            (generation, client)
        };

        self.state.send_if_modified(SessionState::begin_initialization);
        info!(generation, "Initializing messaging session");

        let sender = SessionEventSender::new(generation, self.events.clone());
        tokio::spawn(async move {
            if let Err(e) = client.initialize(sender).await {
                let err = RelayError::Protocol(format!("client initialization failed: {e:#}"));
                metrics::counter!("session.init_failures").increment(1);
                error!(generation, error = %err, "Failed to initialize messaging client");
            }
        });
    }

    async fn tear_down(&self, generation: u64) {
        let active = {
            let mut guard = self.client.lock();
            match guard.as_ref() {
                Some(active) if active.generation == generation => guard.take(),
                _ => None,
            }
        };
        if let Some(active) = active {
            active.client.shutdown().await;
            info!(generation, "Messaging client torn down");
        }
    }

    /// Current status; starts a client as a side effect if none exists.
    pub fn status(&self) -> SessionStatus {
        self.ensure_initialized();
        self.state.borrow().status()
    }

    pub fn pairing_artifact(&self) -> RelayResult<PairingArtifact> {
        self.state
            .borrow()
            .pairing_artifact()
            .cloned()
            .ok_or(RelayError::PairingNotAvailable)
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.borrow().phase()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Wait until the session reaches `phase`.
    pub async fn wait_for_phase(&self, phase: SessionPhase) {
        let mut receiver = self.subscribe();
        // The sender lives as long as `self`, so this only returns once matched.
        let _ = receiver.wait_for(|state| state.phase() == phase).await;
    }

    pub fn has_client(&self) -> bool {
        self.client.lock().is_some()
    }

    /// The live client, provided the session is ready to send.
    pub fn ready_client(&self) -> RelayResult<Arc<dyn MessagingClient>> {
        if self.phase() != SessionPhase::Ready {
            return Err(RelayError::SessionNotReady);
        }
        self.client
            .lock()
            .as_ref()
            .map(|active| active.client.clone())
            .ok_or(RelayError::SessionNotReady)
    }

    fn current_generation(&self) -> Option<u64> {
        self.client.lock().as_ref().map(|active| active.generation)
    }
}
