//! Job registry: single slot holding the current or last broadcast.
//!
//! Only one broadcast runs at a time. A submission while the current job is
//! still running is rejected; a finished job stays readable until the next
//! accepted submission replaces it.

use crate::job::DispatchJob;
use crate::pacing::SendPacer;
use chrono::Utc;
use parking_lot::RwLock;
use relay_channels::SessionManager;
use relay_core::config::DispatchConfig;
use relay_core::types::{DispatchRequest, JobProgress, JobReport};
use relay_core::{normalize, RelayError, RelayResult, ValidationError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub struct JobRegistry {
    session: Arc<SessionManager>,
    config: DispatchConfig,
    current: RwLock<Option<Arc<DispatchJob>>>,
    last_id: AtomicU64,
}

impl JobRegistry {
    pub fn new(session: Arc<SessionManager>, config: DispatchConfig) -> Self {
        Self {
            session,
            config,
            current: RwLock::new(None),
            last_id: AtomicU64::new(0),
        }
    }

    /// Validate a broadcast, install it as the current job, and start its
    /// delivery loop in the background. Returns the job id immediately.
    pub fn submit(&self, request: DispatchRequest) -> RelayResult<String> {
        let result = self.try_submit(request);
        match &result {
            Ok(job_id) => {
                metrics::counter!("dispatch.jobs_submitted").increment(1);
                info!(job_id = %job_id, "Broadcast accepted");
            }
            Err(e) => {
                metrics::counter!("dispatch.jobs_rejected", "reason" => e.code()).increment(1);
                warn!(error = %e, "Broadcast rejected");
            }
        }
        result
    }

    fn try_submit(&self, request: DispatchRequest) -> RelayResult<String> {
        let client = self.session.ready_client()?;

        if request.numbers.is_empty() {
            return Err(ValidationError::EmptyRecipients.into());
        }
        if request.message.trim().is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }
        let rate = request
            .messages_per_minute
            .unwrap_or(i64::from(self.config.default_rate_per_minute));
        let pacer = SendPacer::new(rate)?;

        let country_code = request
            .country_code
            .as_deref()
            .or(self.config.default_country_code.as_deref());
        let recipients = normalize(&request.numbers, country_code);
        if recipients.is_empty() {
            return Err(ValidationError::EmptyRecipients.into());
        }
        if let Some(max) = self.config.max_recipients.filter(|max| recipients.len() > *max) {
            return Err(ValidationError::TooManyRecipients { max }.into());
        }

        let job = {
            let mut slot = self.current.write();
            if let Some(running) = slot.as_ref().filter(|job| job.is_running()) {
                return Err(RelayError::JobAlreadyRunning {
                    job_id: running.id().to_string(),
                });
            }
            let job = Arc::new(DispatchJob::new(
                self.next_id(),
                recipients,
                request.message,
                pacer,
            ));
            *slot = Some(job.clone());
            job
        };

        let job_id = job.id().to_string();
        tokio::spawn(job.run(client));
        Ok(job_id)
    }

    /// Progress of the current job. When `job_id` is given and does not
    /// match the current job, reports no job.
    pub fn progress(&self, job_id: Option<&str>) -> JobProgress {
        match self.current() {
            Some(job) if job_id.map_or(true, |id| id == job.id()) => JobProgress::of(job.counters()),
            _ => JobProgress::none(),
        }
    }

    pub fn report(&self) -> RelayResult<JobReport> {
        self.current()
            .map(|job| job.report())
            .ok_or(RelayError::NoJob)
    }

    pub fn current(&self) -> Option<Arc<DispatchJob>> {
        self.current.read().clone()
    }

    /// Millisecond timestamp, bumped past the previous id if the clock has
    /// not moved on.
    fn next_id(&self) -> String {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let previous = self
            .last_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| Some(now.max(prev + 1)))
            .unwrap_or(now);
        now.max(previous + 1).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_channels::mock::MockClientFactory;
    use relay_channels::SessionEvent;
    use relay_core::types::{JobStatus, SessionPhase};
    use std::time::Duration;

    struct Harness {
        factory: Arc<MockClientFactory>,
        session: Arc<SessionManager>,
        registry: JobRegistry,
    }

    async fn ready() -> Harness {
        let factory = MockClientFactory::auto_ready();
        let session = SessionManager::start(factory.clone());
        session.status();
        session.wait_for_phase(SessionPhase::Ready).await;
        let registry = JobRegistry::new(session.clone(), DispatchConfig::default());
        Harness {
            factory,
            session,
            registry,
        }
    }

    fn request(numbers: &[&str], message: &str, rate: Option<i64>) -> DispatchRequest {
        DispatchRequest {
            numbers: numbers.iter().map(|n| n.to_string()).collect(),
            message: message.to_string(),
            country_code: Some("+94".to_string()),
            messages_per_minute: rate,
        }
    }

    async fn wait_finished(registry: &JobRegistry) {
        while registry.current().is_some_and(|job| job.is_running()) {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    fn rejection(result: RelayResult<String>) -> RelayError {
        result.expect_err("submission should be rejected")
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_recipients_run_to_completion() {
        let h = ready().await;
        h.factory.fail_recipient("94772222222");
        let id = h
            .registry
            .submit(request(&["771111111", "772222222", "773333333"], "Hi", Some(60)))
            .unwrap();

        let before = h.registry.progress(None).job.unwrap();
        assert_eq!(before.id, id);
        assert_eq!((before.sent, before.failed, before.remaining), (0, 0, 3));
        assert_eq!(before.status, JobStatus::Running);

        wait_finished(&h.registry).await;
        let report = h.registry.report().unwrap();
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.sent + report.failed, 3);
        assert_eq!(report.failed, 1);
        assert_eq!(report.status, JobStatus::Finished);
        assert!(report.finished_at.unwrap() >= report.started_at);
        assert_eq!(report.results[1].recipient, "94772222222");
        assert_eq!(report.results[1].reason.as_deref(), Some("94772222222 rejected"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_numbers_at_sixty_per_minute() {
        let h = ready().await;
        h.registry
            .submit(DispatchRequest {
                numbers: vec!["0771234567".to_string(), "0779999999".to_string()],
                message: "Hi".to_string(),
                country_code: Some("+94".to_string()),
                messages_per_minute: Some(60),
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(2100)).await;
        let progress = h.registry.progress(None).job.unwrap();
        assert_eq!(progress.sent + progress.failed, 2);
        assert_eq!(progress.status, JobStatus::Finished);

        let sent = h.factory.sent();
        assert_eq!(sent[0].recipient, "940771234567");
        assert!(sent[1].at - sent[0].at >= Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_empty_recipients_wins_over_other_errors() {
        let h = ready().await;
        let err = rejection(h.registry.submit(request(&[], "", Some(0))));
        assert!(matches!(err, RelayError::Validation(ValidationError::EmptyRecipients)));

        let err = rejection(h.registry.submit(request(&["abc", "  ", ""], "Hi", Some(10))));
        assert!(matches!(err, RelayError::Validation(ValidationError::EmptyRecipients)));
        assert!(h.registry.current().is_none());
    }

    #[tokio::test]
    async fn test_blank_message_rejected() {
        let h = ready().await;
        let err = rejection(h.registry.submit(request(&["771234567"], " \n ", Some(10))));
        assert!(matches!(err, RelayError::Validation(ValidationError::EmptyMessage)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_large_list_accepted_by_default() {
        let h = ready().await;
        let numbers: Vec<String> = (0..10_001).map(|i| format!("77{i:07}")).collect();
        let numbers: Vec<&str> = numbers.iter().map(String::as_str).collect();
        let id = h.registry.submit(request(&numbers, "Hi", Some(60))).unwrap();

        let progress = h.registry.progress(Some(&id)).job.unwrap();
        assert_eq!(progress.total, 10_001);
        assert_eq!(progress.status, JobStatus::Running);
    }

    #[tokio::test]
    async fn test_configured_cap_counts_normalized_recipients() {
        let factory = MockClientFactory::auto_ready();
        let session = SessionManager::start(factory);
        session.status();
        session.wait_for_phase(SessionPhase::Ready).await;
        let registry = JobRegistry::new(
            session,
            DispatchConfig {
                max_recipients: Some(2),
                ..DispatchConfig::default()
            },
        );

        let err = rejection(registry.submit(request(&["771111111", "772222222", "773333333"], "Hi", None)));
        assert!(matches!(
            err,
            RelayError::Validation(ValidationError::TooManyRecipients { max: 2 })
        ));

        // Blank rows are dropped before the cap applies.
        registry
            .submit(request(&["771111111", "", "  ", "772222222"], "Hi", None))
            .unwrap();
        assert_eq!(registry.current().unwrap().total(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_bounds() {
        let h = ready().await;
        for rate in [0, 61] {
            let err = rejection(h.registry.submit(request(&["771234567"], "Hi", Some(rate))));
            assert!(matches!(
                err,
                RelayError::Validation(ValidationError::InvalidRate(r)) if r == rate
            ));
        }

        h.registry
            .submit(request(&["771234567"], "Hi", Some(1)))
            .unwrap();
        wait_finished(&h.registry).await;
        h.registry
            .submit(request(&["771234567"], "Hi", Some(60)))
            .unwrap();
        wait_finished(&h.registry).await;
        assert_eq!(h.registry.report().unwrap().messages_per_minute, 60);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_rate_applied() {
        let h = ready().await;
        h.registry
            .submit(request(&["771234567"], "Hi", None))
            .unwrap();
        assert_eq!(h.registry.report().unwrap().messages_per_minute, 20);
    }

    #[tokio::test]
    async fn test_not_ready_without_previous_job() {
        let factory = MockClientFactory::new();
        let session = SessionManager::start(factory);
        session.status();
        session.wait_for_phase(SessionPhase::PendingAuth).await;

        let registry = JobRegistry::new(session, DispatchConfig::default());
        let err = rejection(registry.submit(request(&["771234567"], "Hi", Some(10))));
        assert!(matches!(err, RelayError::SessionNotReady));
        assert!(matches!(registry.report(), Err(RelayError::NoJob)));
        assert!(!registry.progress(None).has_job);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_ready_keeps_previous_report() {
        let h = ready().await;
        let first = h
            .registry
            .submit(request(&["771234567"], "Hi", Some(60)))
            .unwrap();
        wait_finished(&h.registry).await;

        h.factory
            .latest()
            .unwrap()
            .emit(SessionEvent::PairingChallenge("re-pair".to_string()));
        h.session.wait_for_phase(SessionPhase::PendingAuth).await;

        let err = rejection(h.registry.submit(request(&["771234567"], "Hi", Some(60))));
        assert!(matches!(err, RelayError::SessionNotReady));
        assert_eq!(h.registry.report().unwrap().id, first);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_submission_rejected_while_running() {
        let h = ready().await;
        let first = h
            .registry
            .submit(request(&["771111111", "772222222"], "Hi", Some(1)))
            .unwrap();

        let err = rejection(h.registry.submit(request(&["773333333"], "Hi", Some(60))));
        assert!(matches!(err, RelayError::JobAlreadyRunning { ref job_id } if *job_id == first));
        assert_eq!(h.registry.progress(None).job.unwrap().id, first);

        wait_finished(&h.registry).await;
        let second = h
            .registry
            .submit(request(&["773333333"], "Hi", Some(60)))
            .unwrap();
        assert_ne!(first, second);
        assert!(second.parse::<u64>().unwrap() > first.parse::<u64>().unwrap());
        assert_eq!(h.registry.report().unwrap().id, second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_filters_by_job_id() {
        let h = ready().await;
        let id = h
            .registry
            .submit(request(&["771234567"], "Hi", Some(60)))
            .unwrap();
        assert!(h.registry.progress(Some(&id)).has_job);
        assert!(!h.registry.progress(Some("nope")).has_job);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_lost_mid_job_still_finishes() {
        let h = ready().await;
        h.registry
            .submit(request(&["771111111", "772222222", "773333333"], "Hi", Some(60)))
            .unwrap();

        // Let the first send go out, then drop the session.
        tokio::time::sleep(Duration::from_millis(500)).await;
        h.factory
            .latest()
            .unwrap()
            .emit(SessionEvent::SessionLost("logout".to_string()));
        h.session.wait_for_phase(SessionPhase::Disconnected).await;

        wait_finished(&h.registry).await;
        let report = h.registry.report().unwrap();
        assert_eq!(report.results.len(), 3);
        assert!(report.results[0].is_success());
        assert_eq!(report.failed, 2);
        assert_eq!(report.results[2].reason.as_deref(), Some("Session closed"));
    }

    #[tokio::test]
    async fn test_ids_are_unique_and_increasing() {
        let session = SessionManager::start(MockClientFactory::new());
        let registry = JobRegistry::new(session, DispatchConfig::default());
        let ids: Vec<u64> = (0..50).map(|_| registry.next_id().parse().unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[1] > w[0]));
    }
}
