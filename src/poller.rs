use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::client::JudgeBackend;
use crate::error::ClientError;
use crate::normalize::normalize;
use crate::protocol::{Job, SubmissionResult};

#[derive(Debug, Clone, Copy)]
pub struct PollOptions {
    /// Cadence between status fetches.
    pub interval: Duration,
    /// Attempt budget; total wait is bounded by `interval * max_attempts`.
    pub max_attempts: u32,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_attempts: 10,
        }
    }
}

/// Supervision record of one poll loop, owned exclusively by that loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct PollState {
    pub attempts_made: u32,
    pub cancelled: bool,
}

#[derive(Debug)]
pub enum PollOutcome {
    /// The job reached a terminal verdict; the result is final.
    Resolved(SubmissionResult),
    /// Attempt budget exhausted with the job still pending. Its true
    /// outcome remains unknown to the client.
    TimedOut { attempts_made: u32 },
    /// A status fetch itself failed; the loop stops without retrying.
    Failed(ClientError),
    /// Superseded or explicitly cancelled; nothing may be reported.
    Cancelled,
}

/// Polls `job` on a fixed cadence until it resolves, the attempt budget runs
/// out, a fetch fails, or `token` is cancelled.
///
/// Cancellation is cooperative: a fetch already in flight completes, but its
/// result is discarded unconditionally. `on_attempt` fires after each fetch
/// that leaves the job pending. Fetches are strictly sequential; a slow fetch
/// is not itself timed out but still costs one attempt.
pub async fn poll_job(
    backend: &dyn JudgeBackend,
    job: &Job,
    token: &CancellationToken,
    options: PollOptions,
    mut on_attempt: impl FnMut(u32),
) -> PollOutcome {
    let mut state = PollState::default();
    let job_id = job.id;

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                state.cancelled = true;
                log::debug!("poll loop for job {job_id} cancelled while waiting");
                return PollOutcome::Cancelled;
            }
            _ = tokio::time::sleep(options.interval) => {}
        }

        let fetched = backend.fetch_status(job_id).await;
        state.attempts_made += 1;

        if token.is_cancelled() {
            state.cancelled = true;
            log::debug!(
                "job {job_id} superseded, discarding fetch {}",
                state.attempts_made
            );
            return PollOutcome::Cancelled;
        }

        match fetched {
            Ok(payload) => {
                let result = normalize(job_id, payload, &job.spec.cases);
                if result.overall_status.is_terminal() {
                    log::info!(
                        "job {job_id} resolved as '{}' after {} attempt(s)",
                        result.overall_status,
                        state.attempts_made
                    );
                    return PollOutcome::Resolved(result);
                }
                if state.attempts_made >= options.max_attempts {
                    log::warn!(
                        "gave up on job {job_id} after {} attempts, still pending",
                        state.attempts_made
                    );
                    return PollOutcome::TimedOut {
                        attempts_made: state.attempts_made,
                    };
                }
                on_attempt(state.attempts_made);
            }
            Err(e) => {
                // budget exhaustion outranks the fetch error
                if state.attempts_made >= options.max_attempts {
                    log::warn!(
                        "gave up on job {job_id} after {} attempts, last fetch failed: {e}",
                        state.attempts_made
                    );
                    return PollOutcome::TimedOut {
                        attempts_made: state.attempts_made,
                    };
                }
                log::error!("failed to fetch status of job {job_id}: {e}");
                return PollOutcome::Failed(ClientError::PollError {
                    job_id,
                    message: e.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::protocol::{
        JobId, JobKind, JobSpec, RunRequest, StatusPayload, SubmitRequest, Verdict,
    };

    struct ScriptedBackend {
        fetches: AtomicU32,
        script: Mutex<VecDeque<anyhow::Result<StatusPayload>>>,
    }

    impl ScriptedBackend {
        fn new(script: Vec<anyhow::Result<StatusPayload>>) -> Self {
            Self {
                fetches: AtomicU32::new(0),
                script: Mutex::new(script.into()),
            }
        }
    }

    #[async_trait]
    impl JudgeBackend for ScriptedBackend {
        async fn post_run(&self, _request: &RunRequest) -> anyhow::Result<JobId> {
            Ok(1)
        }

        async fn post_submit(&self, _request: &SubmitRequest) -> anyhow::Result<JobId> {
            Ok(1)
        }

        async fn fetch_status(&self, _job_id: JobId) -> anyhow::Result<StatusPayload> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .pop_front()
                .unwrap_or_else(|| anyhow::bail!("script exhausted"))
        }
    }

    fn pending() -> anyhow::Result<StatusPayload> {
        Ok(StatusPayload {
            status: Verdict::Pending,
            results: None,
        })
    }

    fn accepted() -> anyhow::Result<StatusPayload> {
        Ok(StatusPayload {
            status: Verdict::Accepted,
            results: None,
        })
    }

    fn test_job() -> Job {
        Job {
            id: 1,
            spec: JobSpec {
                kind: JobKind::Submit,
                problem_id: 1,
                language: "python".to_string(),
                source_code: "print(1)".to_string(),
                cases: vec![],
            },
        }
    }

    fn fast_options(max_attempts: u32) -> PollOptions {
        PollOptions {
            interval: Duration::from_millis(5),
            max_attempts,
        }
    }

    #[tokio::test]
    async fn test_resolves_on_terminal_verdict() {
        let backend = ScriptedBackend::new(vec![pending(), pending(), accepted()]);
        let token = CancellationToken::new();
        let mut seen = Vec::new();

        let outcome = poll_job(&backend, &test_job(), &token, fast_options(10), |n| {
            seen.push(n)
        })
        .await;

        match outcome {
            PollOutcome::Resolved(result) => {
                assert_eq!(result.overall_status, Verdict::Accepted);
                assert_eq!(result.job_id, 1);
            }
            other => panic!("expected Resolved, got {other:?}"),
        }
        assert_eq!(seen, vec![1, 2]);
        assert_eq!(backend.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_times_out_when_budget_exhausted() {
        let backend = ScriptedBackend::new((0..4).map(|_| pending()).collect());
        let token = CancellationToken::new();

        let outcome = poll_job(&backend, &test_job(), &token, fast_options(3), |_| {}).await;

        match outcome {
            PollOutcome::TimedOut { attempts_made } => assert_eq!(attempts_made, 3),
            other => panic!("expected TimedOut, got {other:?}"),
        }
        // never a fourth fetch
        assert_eq!(backend.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fetch_error_stops_immediately() {
        let backend = ScriptedBackend::new(vec![
            pending(),
            Err(anyhow::anyhow!("connection refused")),
            accepted(),
        ]);
        let token = CancellationToken::new();

        let outcome = poll_job(&backend, &test_job(), &token, fast_options(10), |_| {}).await;

        match outcome {
            PollOutcome::Failed(ClientError::PollError { job_id, message }) => {
                assert_eq!(job_id, 1);
                assert!(message.contains("connection refused"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert_eq!(backend.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_final_fetch_counts_as_timeout() {
        let backend = ScriptedBackend::new(vec![
            pending(),
            pending(),
            Err(anyhow::anyhow!("connection refused")),
        ]);
        let token = CancellationToken::new();

        let outcome = poll_job(&backend, &test_job(), &token, fast_options(3), |_| {}).await;

        match outcome {
            PollOutcome::TimedOut { attempts_made } => assert_eq!(attempts_made, 3),
            other => panic!("expected TimedOut, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancellation_before_first_fetch() {
        let backend = ScriptedBackend::new(vec![accepted()]);
        let token = CancellationToken::new();
        token.cancel();

        let outcome = poll_job(&backend, &test_job(), &token, fast_options(10), |_| {}).await;

        assert!(matches!(outcome, PollOutcome::Cancelled));
        assert_eq!(backend.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancellation_discards_in_flight_terminal_result() {
        struct CancellingBackend {
            token: CancellationToken,
        }

        #[async_trait]
        impl JudgeBackend for CancellingBackend {
            async fn post_run(&self, _request: &RunRequest) -> anyhow::Result<JobId> {
                Ok(1)
            }

            async fn post_submit(&self, _request: &SubmitRequest) -> anyhow::Result<JobId> {
                Ok(1)
            }

            async fn fetch_status(&self, _job_id: JobId) -> anyhow::Result<StatusPayload> {
                // cancellation lands while this fetch is in flight
                self.token.cancel();
                Ok(StatusPayload {
                    status: Verdict::Accepted,
                    results: None,
                })
            }
        }

        let token = CancellationToken::new();
        let backend = CancellingBackend {
            token: token.clone(),
        };

        let outcome = poll_job(&backend, &test_job(), &token, fast_options(10), |_| {}).await;

        // the fetch completed with a terminal verdict, but it must be discarded
        assert!(matches!(outcome, PollOutcome::Cancelled));
    }
}
