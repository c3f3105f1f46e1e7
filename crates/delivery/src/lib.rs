//! Rate-limited broadcast delivery.
//!
//! Pacing: converts a per-minute rate into a fixed gap between sends.
//! Job: one broadcast with its ordered delivery ledger.
//! Registry: the single slot holding the current or last job.

pub mod job;
pub mod pacing;
pub mod registry;

pub use job::DispatchJob;
pub use pacing::SendPacer;
pub use registry::JobRegistry;
