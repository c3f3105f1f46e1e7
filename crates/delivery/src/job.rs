//! A single rate-limited broadcast and its delivery ledger.

use crate::pacing::SendPacer;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use relay_channels::MessagingClient;
use relay_core::types::{DeliveryResult, JobCounters, JobReport, JobStatus};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug)]
struct Ledger {
    status: JobStatus,
    results: Vec<DeliveryResult>,
    finished_at: Option<DateTime<Utc>>,
}

/// One broadcast: a fixed recipient list, one message body, one rate.
///
/// The ledger grows by one entry per recipient, in recipient order, and is
/// written only by the job's own delivery loop.
#[derive(Debug)]
pub struct DispatchJob {
    id: String,
    recipients: Vec<String>,
    message: String,
    pacer: SendPacer,
    started_at: DateTime<Utc>,
    ledger: RwLock<Ledger>,
}

impl DispatchJob {
    pub fn new(id: String, recipients: Vec<String>, message: String, pacer: SendPacer) -> Self {
        let capacity = recipients.len();
        Self {
            id,
            recipients,
            message,
            pacer,
            started_at: Utc::now(),
            ledger: RwLock::new(Ledger {
                status: JobStatus::Running,
                results: Vec::with_capacity(capacity),
                finished_at: None,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn rate_per_minute(&self) -> u32 {
        self.pacer.rate_per_minute()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn total(&self) -> usize {
        self.recipients.len()
    }

    pub fn status(&self) -> JobStatus {
        self.ledger.read().status
    }

    pub fn is_running(&self) -> bool {
        self.status() == JobStatus::Running
    }

    pub fn results(&self) -> Vec<DeliveryResult> {
        self.ledger.read().results.clone()
    }

    pub fn counters(&self) -> JobCounters {
        let ledger = self.ledger.read();
        let (sent, failed) = tally(&ledger.results);
        JobCounters {
            id: self.id.clone(),
            total: self.total(),
            sent,
            failed,
            remaining: self.total() - sent - failed,
            status: ledger.status,
            started_at: self.started_at,
            finished_at: ledger.finished_at,
        }
    }

    pub fn report(&self) -> JobReport {
        let ledger = self.ledger.read();
        let (sent, failed) = tally(&ledger.results);
        JobReport {
            id: self.id.clone(),
            total: self.total(),
            sent,
            failed,
            status: ledger.status,
            messages_per_minute: self.rate_per_minute(),
            results: ledger.results.clone(),
            started_at: self.started_at,
            finished_at: ledger.finished_at,
        }
    }

    fn record(&self, result: DeliveryResult) {
        let mut ledger = self.ledger.write();
        if ledger.results.len() >= self.recipients.len() {
            warn!(job_id = %self.id, "Ledger already complete, dropping result");
            return;
        }
        ledger.results.push(result);
    }

    fn finish(&self) {
        let mut ledger = self.ledger.write();
        if ledger.status == JobStatus::Running {
            ledger.status = JobStatus::Finished;
            ledger.finished_at = Some(Utc::now());
        }
    }

    /// Deliver to every recipient in order, one at a time, pausing one
    /// interval between sends. Delivery errors go to the ledger.
    pub async fn run(self: Arc<Self>, client: Arc<dyn MessagingClient>) {
        info!(
            job_id = %self.id,
            total = self.total(),
            rate_per_minute = self.rate_per_minute(),
            interval_ms = self.pacer.interval().as_millis() as u64,
            "Broadcast started"
        );

        let total = self.total();
        for (index, recipient) in self.recipients.iter().enumerate() {
            if !self.is_running() {
                break;
            }

            let start = Instant::now();
            let result = match client.send_text(recipient, &self.message).await {
                Ok(provider_id) => {
                    metrics::counter!("dispatch.messages_sent").increment(1);
                    debug!(job_id = %self.id, recipient = %recipient, provider_id = %provider_id, "Message sent");
                    DeliveryResult::success(recipient.as_str())
                }
                Err(e) => {
                    metrics::counter!("dispatch.messages_failed").increment(1);
                    warn!(job_id = %self.id, recipient = %recipient, reason = %e, "Message delivery failed");
                    DeliveryResult::failure(recipient.as_str(), e.reason)
                }
            };
            metrics::histogram!("dispatch.send_latency_ms").record(start.elapsed().as_millis() as f64);
            self.record(result);

            if index + 1 < total {
                self.pacer.pause().await;
            }
        }

        self.finish();
        let counters = self.counters();
        info!(
            job_id = %self.id,
            sent = counters.sent,
            failed = counters.failed,
            "Broadcast finished"
        );
    }
}

fn tally(results: &[DeliveryResult]) -> (usize, usize) {
    let sent = results.iter().filter(|r| r.is_success()).count();
    (sent, results.len() - sent)
}
