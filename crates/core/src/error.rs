use thiserror::Error;

pub type RelayResult<T> = Result<T, RelayError>;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("WhatsApp not connected. Scan QR first.")]
    SessionNotReady,

    #[error("A broadcast job is already running: {job_id}")]
    JobAlreadyRunning { job_id: String },

    #[error("No report available")]
    NoJob,

    #[error("QR not available yet")]
    PairingNotAvailable,

    /// Session-level failure reported by or about the messaging client.
    #[error("Messaging protocol error: {0}")]
    Protocol(String),
}

/// Rejections raised while checking a broadcast submission. A job is never
/// created when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No numbers provided")]
    EmptyRecipients,

    #[error("Too many numbers: at most {max} per broadcast")]
    TooManyRecipients { max: usize },

    #[error("Message text is required")]
    EmptyMessage,

    #[error("messagesPerMinute must be between 1 and 60 (got {0})")]
    InvalidRate(i64),
}

impl ValidationError {
    /// Stable machine-readable code used in API error bodies and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::EmptyRecipients => "empty_recipients",
            ValidationError::TooManyRecipients { .. } => "too_many_recipients",
            ValidationError::EmptyMessage => "empty_message",
            ValidationError::InvalidRate(_) => "invalid_rate",
        }
    }
}

impl RelayError {
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::Validation(v) => v.code(),
            RelayError::SessionNotReady => "session_not_ready",
            RelayError::JobAlreadyRunning { .. } => "job_already_running",
            RelayError::NoJob => "no_report",
            RelayError::PairingNotAvailable => "pairing_not_available",
            RelayError::Protocol(_) => "protocol_error",
        }
    }
}

/// A single recipient could not be handed to the messaging session.
/// Recorded in the job ledger; never aborts the job.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct DeliveryError {
    pub reason: String,
}

impl DeliveryError {
    pub fn new(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let reason = if reason.trim().is_empty() {
            "Unknown error".to_string()
        } else {
            reason
        };
        Self { reason }
    }
}

impl From<anyhow::Error> for DeliveryError {
    fn from(err: anyhow::Error) -> Self {
        DeliveryError::new(err.to_string())
    }
}
