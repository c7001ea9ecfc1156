//! Conversion job records.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Which input path a conversion took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Markdown,
    Typst,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Markdown => write!(f, "markdown"),
            JobKind::Typst => write!(f, "typst"),
        }
    }
}

/// Terminal state of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Complete,
    Failed,
    Cancelled,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Complete => write!(f, "complete"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One in-flight render.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub id: String,
    pub started_at: DateTime<Utc>,
    started: Instant,
    cancel: CancellationToken,
}

impl ConversionJob {
    pub fn new() -> Self {
        Self {
            id: generate_job_id(),
            started_at: Utc::now(),
            started: Instant::now(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Short label shown in stats in place of an OS process id.
    pub fn display_pid(&self) -> String {
        format!("task-{}", &self.id[..8])
    }
}

impl Default for ConversionJob {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a finished conversion, used for telemetry.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub duration_ms: i64,
    pub input_bytes: usize,
    pub output_bytes: Option<usize>,
    pub error: Option<String>,
}

/// 128-bit random identifier rendered as 32 lowercase hex digits.
pub fn generate_job_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_job_id_format() {
        let id = generate_job_id();

        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_job_ids_are_unique() {
        let ids: HashSet<String> = (0..1000).map(|_| generate_job_id()).collect();

        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_new_job() {
        let job = ConversionJob::new();

        assert!(!job.cancel_token().is_cancelled());
        assert_eq!(job.display_pid(), format!("task-{}", &job.id[..8]));
        assert!(job.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_cloned_job_shares_cancellation() {
        let job = ConversionJob::new();
        let copy = job.clone();

        copy.cancel_token().cancel();

        assert!(job.cancel_token().is_cancelled());
    }
}
