use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ─── Session ────────────────────────────────────────────────────────────────

/// Lifecycle phase of the single messaging-account connection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Unauthenticated,
    PendingAuth,
    Ready,
    Disconnected,
}

impl SessionPhase {
    pub fn display_name(&self) -> &'static str {
        match self {
            SessionPhase::Unauthenticated => "unauthenticated",
            SessionPhase::PendingAuth => "pending_auth",
            SessionPhase::Ready => "ready",
            SessionPhase::Disconnected => "disconnected",
        }
    }
}

/// Caller-facing view of the session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct SessionStatus {
    pub ready: bool,
    #[serde(rename = "hasQr")]
    pub has_pairing_artifact: bool,
}

// ─── Delivery ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryOutcome {
    Success,
    Failed,
}

/// Outcome of handing one message to the session for one recipient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct DeliveryResult {
    #[serde(rename = "number")]
    pub recipient: String,
    #[serde(rename = "status")]
    pub outcome: DeliveryOutcome,
    /// Present only for failed deliveries.
    pub reason: Option<String>,
}

impl DeliveryResult {
    pub fn success(recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            outcome: DeliveryOutcome::Success,
            reason: None,
        }
    }

    pub fn failure(recipient: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            outcome: DeliveryOutcome::Failed,
            reason: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == DeliveryOutcome::Success
    }
}

// ─── Dispatch jobs ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Finished,
}

/// Broadcast submission as received from the operator.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    #[serde(default)]
    pub numbers: Vec<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub country_code: Option<String>,
    /// Falls back to the configured default rate when absent.
    #[serde(default)]
    pub messages_per_minute: Option<i64>,
}

/// Counters for the job currently held by the registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobCounters {
    pub id: String,
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
    pub remaining: usize,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Progress snapshot. Serializes as `{"hasJob": false}` when the registry
/// is empty, otherwise `hasJob` plus the flattened counters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub has_job: bool,
    #[serde(flatten)]
    pub job: Option<JobCounters>,
}

impl JobProgress {
    pub fn none() -> Self {
        Self {
            has_job: false,
            job: None,
        }
    }

    pub fn of(counters: JobCounters) -> Self {
        Self {
            has_job: true,
            job: Some(counters),
        }
    }
}

/// Full report for a job, including the per-recipient ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub id: String,
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
    pub status: JobStatus,
    pub messages_per_minute: u32,
    pub results: Vec<DeliveryResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_progress_serializes_compact() {
        let json = serde_json::to_value(JobProgress::none()).unwrap();
        assert_eq!(json, serde_json::json!({ "hasJob": false }));
    }

    #[test]
    fn test_progress_flattens_counters() {
        let progress = JobProgress::of(JobCounters {
            id: "1700000000000".to_string(),
            total: 3,
            sent: 1,
            failed: 1,
            remaining: 1,
            status: JobStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
        });
        let json = serde_json::to_value(&progress).unwrap();
        assert_eq!(json["hasJob"], true);
        assert_eq!(json["remaining"], 1);
        assert_eq!(json["status"], "running");
        assert!(json["finishedAt"].is_null());
    }

    #[test]
    fn test_delivery_result_wire_names() {
        let json = serde_json::to_value(DeliveryResult::failure("94771234567", "blocked")).unwrap();
        assert_eq!(json["number"], "94771234567");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "blocked");

        let ok = serde_json::to_value(DeliveryResult::success("94771234567")).unwrap();
        assert_eq!(ok["status"], "success");
        assert!(ok["reason"].is_null());
    }

    #[test]
    fn test_request_accepts_partial_body() {
        let req: DispatchRequest =
            serde_json::from_str(r#"{"numbers":["0771234567"],"message":"Hi"}"#).unwrap();
        assert_eq!(req.numbers.len(), 1);
        assert!(req.country_code.is_none());
        assert!(req.messages_per_minute.is_none());
    }
}
