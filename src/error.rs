use thiserror::Error;

use crate::protocol::JobId;

/// Terminal failures of one dispatch attempt. Every variant leaves the
/// supervisor idle and ready for a new attempt; none of them is retried
/// automatically.
#[derive(Debug, Error, Clone)]
pub enum ClientError {
    /// The run/submit request itself failed; no job was created.
    /// Resubmission must be an explicit user action, so this is never
    /// retried internally.
    #[error("dispatch failed: {0}")]
    DispatchFailed(String),

    /// A status fetch failed mid-sequence. The job may still complete on
    /// the backend; its outcome is simply unknown to this client.
    #[error("failed to fetch status of job {job_id}: {message}")]
    PollError { job_id: JobId, message: String },
}
