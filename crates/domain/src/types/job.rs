//! Long-running job types
//!
//! A job session is created by an initiation call returning `session_id`
//! and then observed through a status endpoint until it reaches a terminal
//! state. The session record enforces two invariants:
//! - `attempt` never exceeds `max_attempts`
//! - `status` never regresses (pending → processing → completed | error)

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Backend-reported job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[serde(alias = "queued")]
    Pending,
    #[serde(alias = "running", alias = "in_progress")]
    Processing,
    #[serde(alias = "done", alias = "success")]
    Completed,
    #[serde(alias = "failed")]
    Error,
}

impl JobStatus {
    /// Completed and error are terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    fn rank(self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Processing => 1,
            JobStatus::Completed | JobStatus::Error => 2,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        };
        f.write_str(label)
    }
}

/// Response of a job initiation call: `{ "session_id": "..." }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTicket {
    #[serde(default)]
    pub session_id: Option<String>,
}

impl JobTicket {
    /// Session id if present and non-blank.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref().filter(|id| !id.trim().is_empty())
    }
}

/// Response of a status poll
///
/// Job-specific result fields are kept verbatim in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusReport {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl JobStatusReport {
    pub fn new(status: JobStatus) -> Self {
        Self { status, message: None, error: None, fields: Map::new() }
    }

    /// Attach a job-specific result field.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Backend failure message, preferring `error` over `message`.
    pub fn failure_message(&self) -> String {
        self.error
            .as_deref()
            .or(self.message.as_deref())
            .filter(|msg| !msg.trim().is_empty())
            .unwrap_or("The job failed without a message")
            .to_string()
    }
}

/// Client-side record of one job session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSession {
    pub session_id: String,
    pub status: JobStatus,
    pub attempt: u32,
    pub max_attempts: u32,
    pub stage_index: usize,
}

impl JobSession {
    pub fn new(session_id: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            session_id: session_id.into(),
            status: JobStatus::Pending,
            attempt: 0,
            max_attempts,
            stage_index: 0,
        }
    }

    /// Consume one poll attempt.
    ///
    /// Returns `false` without changing the counter once the budget is spent.
    pub fn begin_attempt(&mut self) -> bool {
        if self.attempt >= self.max_attempts {
            return false;
        }
        self.attempt += 1;
        true
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    /// Apply an observed status, ignoring regressions and any change after a
    /// terminal state. Returns the effective status.
    pub fn observe(&mut self, reported: JobStatus) -> JobStatus {
        if !self.status.is_terminal() && reported.rank() >= self.status.rank() {
            self.status = reported;
        }
        self.status
    }
}

/// One UI stage the job narrates through
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDefinition {
    pub key: String,
    pub label: String,
}

impl StageDefinition {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self { key: key.into(), label: label.into() }
    }
}

/// Progress snapshot handed to observers after each non-terminal poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobProgress {
    pub session_id: String,
    pub attempt: u32,
    pub max_attempts: u32,
    /// 1-based index into the declared stages
    pub stage_index: usize,
    pub stage: Option<StageDefinition>,
    pub status: JobStatus,
}

/// Body of a CV rewrite initiation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewriteRequest {
    /// Structured CV content as produced by the parser
    pub cv: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cv_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Response of a CV upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadReceipt {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn status_never_regresses() {
        let mut session = JobSession::new("abc", 5);
        assert_eq!(session.observe(JobStatus::Processing), JobStatus::Processing);
        assert_eq!(session.observe(JobStatus::Pending), JobStatus::Processing);
        assert_eq!(session.observe(JobStatus::Completed), JobStatus::Completed);
        assert_eq!(session.observe(JobStatus::Error), JobStatus::Completed);
        assert_eq!(session.observe(JobStatus::Processing), JobStatus::Completed);
    }

    #[test]
    fn pending_may_jump_to_terminal() {
        let mut session = JobSession::new("abc", 5);
        assert_eq!(session.observe(JobStatus::Error), JobStatus::Error);
    }

    #[test]
    fn attempts_are_bounded() {
        let mut session = JobSession::new("abc", 2);
        assert!(session.begin_attempt());
        assert!(session.begin_attempt());
        assert!(!session.begin_attempt());
        assert_eq!(session.attempt, 2);
        assert!(session.attempts_exhausted());
    }

    #[test]
    fn status_report_keeps_result_fields() {
        let report: JobStatusReport = serde_json::from_value(json!({
            "status": "completed",
            "rewritten_cv": { "summary": "Seasoned engineer" },
            "score": 87
        }))
        .unwrap();

        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.fields["score"], json!(87));
        assert!(report.fields.contains_key("rewritten_cv"));
    }

    #[test]
    fn status_aliases_are_accepted() {
        let report: JobStatusReport = serde_json::from_value(json!({"status": "failed"})).unwrap();
        assert_eq!(report.status, JobStatus::Error);
        let report: JobStatusReport = serde_json::from_value(json!({"status": "queued"})).unwrap();
        assert_eq!(report.status, JobStatus::Pending);
    }

    #[test]
    fn failure_message_prefers_error_field() {
        let mut report = JobStatusReport::new(JobStatus::Error);
        assert_eq!(report.failure_message(), "The job failed without a message");
        report.message = Some("generic".into());
        assert_eq!(report.failure_message(), "generic");
        report.error = Some("model quota exceeded".into());
        assert_eq!(report.failure_message(), "model quota exceeded");
    }

    #[test]
    fn blank_session_id_is_absent() {
        let ticket: JobTicket = serde_json::from_value(json!({"session_id": "  "})).unwrap();
        assert!(ticket.session_id().is_none());
        let ticket: JobTicket = serde_json::from_value(json!({})).unwrap();
        assert!(ticket.session_id().is_none());
        let ticket: JobTicket = serde_json::from_value(json!({"session_id": "abc"})).unwrap();
        assert_eq!(ticket.session_id(), Some("abc"));
    }
}
