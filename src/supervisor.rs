use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::client::{self, JudgeBackend};
use crate::poller::{self, PollOptions, PollOutcome};
use crate::protocol::{JobId, JobKind, JobSpec, SubmissionResult};

/// What the presentation layer sees of the current job. Every transition
/// replaces the whole snapshot; readers never observe a half-updated job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobSnapshot {
    Idle,
    Dispatching { kind: JobKind, problem_id: u32 },
    Polling { job_id: JobId, attempts_made: u32 },
    Resolved(SubmissionResult),
}

/// One-shot terminal notices suitable for toast/alert display. Each
/// dispatched job produces at most one, and a superseded job produces none.
#[derive(Debug, Clone)]
pub enum Notice {
    Resolved(SubmissionResult),
    DispatchFailed { message: String },
    PollTimeout { job_id: JobId, attempts_made: u32 },
    PollError { job_id: JobId, message: String },
}

struct CurrentJob {
    /// Bumped on every submit/cancel; publications from a stale epoch lose.
    epoch: u64,
    cancel: Option<CancellationToken>,
}

/// Owns the single current-job slot: at most one active poll loop at a time,
/// a new dispatch cancels the previous one, and only the most recently
/// dispatched job can ever publish a state or a notice.
pub struct Supervisor {
    backend: Arc<dyn JudgeBackend>,
    options: PollOptions,
    current: Mutex<CurrentJob>,
    snapshot_tx: watch::Sender<JobSnapshot>,
    notice_tx: mpsc::UnboundedSender<Notice>,
    notice_rx: Mutex<Option<mpsc::UnboundedReceiver<Notice>>>,
}

impl Supervisor {
    pub fn new(backend: Arc<dyn JudgeBackend>, options: PollOptions) -> Arc<Self> {
        let (snapshot_tx, _) = watch::channel(JobSnapshot::Idle);
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();

        Arc::new(Self {
            backend,
            options,
            current: Mutex::new(CurrentJob {
                epoch: 0,
                cancel: None,
            }),
            snapshot_tx,
            notice_tx,
            notice_rx: Mutex::new(Some(notice_rx)),
        })
    }

    /// Subscribes to current-job snapshots. Any number of readers.
    pub fn subscribe(&self) -> watch::Receiver<JobSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// The terminal notification stream. Can be taken once.
    pub fn notices(&self) -> Option<mpsc::UnboundedReceiver<Notice>> {
        self.notice_rx.lock().take()
    }

    /// Dispatches a new job, superseding whatever is currently tracked.
    /// Fire-and-forget: progress is observed through `subscribe` and
    /// `notices`.
    pub fn submit(self: &Arc<Self>, spec: JobSpec) {
        let (epoch, token) = self.begin_epoch();
        log::info!(
            "submit requested: {} for problem {}",
            spec.kind,
            spec.problem_id
        );

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_job(epoch, token, spec).await;
        });
    }

    /// Cancels and clears the current-job slot, e.g. when the problem view
    /// closes. A superseded job never surfaces anything.
    pub fn cancel(&self) {
        let mut current = self.current.lock();
        if let Some(token) = current.cancel.take() {
            token.cancel();
            log::info!("current job cancelled");
        }
        current.epoch += 1;
        self.snapshot_tx.send_replace(JobSnapshot::Idle);
    }

    fn begin_epoch(&self) -> (u64, CancellationToken) {
        let mut current = self.current.lock();
        if let Some(token) = current.cancel.take() {
            token.cancel();
            log::info!("superseding previously tracked job");
        }
        current.epoch += 1;
        let token = CancellationToken::new();
        current.cancel = Some(token.clone());
        (current.epoch, token)
    }

    /// Publishes a snapshot (and optionally a notice) if `epoch` is still
    /// current. Stale writers are dropped here, which is what guarantees
    /// that a superseded job can never overwrite the published state.
    fn report(&self, epoch: u64, snapshot: JobSnapshot, notice: Option<Notice>) {
        self.report_inner(epoch, snapshot, notice, false);
    }

    /// Like `report`, but also releases the cancellation handle: the job is
    /// terminal and there is nothing left to cancel.
    fn conclude(&self, epoch: u64, snapshot: JobSnapshot, notice: Option<Notice>) {
        self.report_inner(epoch, snapshot, notice, true);
    }

    fn report_inner(&self, epoch: u64, snapshot: JobSnapshot, notice: Option<Notice>, terminal: bool) {
        let mut current = self.current.lock();
        if current.epoch != epoch {
            log::debug!("dropping publication from superseded job");
            return;
        }
        if terminal {
            current.cancel = None;
        }
        self.snapshot_tx.send_replace(snapshot);
        if let Some(notice) = notice {
            let _ = self.notice_tx.send(notice);
        }
    }

    async fn run_job(&self, epoch: u64, token: CancellationToken, spec: JobSpec) {
        self.report(
            epoch,
            JobSnapshot::Dispatching {
                kind: spec.kind,
                problem_id: spec.problem_id,
            },
            None,
        );

        let job = match client::dispatch(self.backend.as_ref(), spec).await {
            Ok(job) => job,
            Err(e) => {
                log::error!("{e}");
                self.conclude(
                    epoch,
                    JobSnapshot::Idle,
                    Some(Notice::DispatchFailed {
                        message: e.to_string(),
                    }),
                );
                return;
            }
        };

        // Superseded while the dispatch call was in flight: the job exists
        // backend-side, but this client no longer tracks it.
        if token.is_cancelled() {
            log::debug!("job {} superseded during dispatch, not polling", job.id);
            return;
        }

        self.report(
            epoch,
            JobSnapshot::Polling {
                job_id: job.id,
                attempts_made: 0,
            },
            None,
        );

        let outcome = poller::poll_job(
            self.backend.as_ref(),
            &job,
            &token,
            self.options,
            |attempts_made| {
                self.report(
                    epoch,
                    JobSnapshot::Polling {
                        job_id: job.id,
                        attempts_made,
                    },
                    None,
                );
            },
        )
        .await;

        match outcome {
            PollOutcome::Resolved(result) => {
                self.conclude(
                    epoch,
                    JobSnapshot::Resolved(result.clone()),
                    Some(Notice::Resolved(result)),
                );
            }
            PollOutcome::TimedOut { attempts_made } => {
                self.conclude(
                    epoch,
                    JobSnapshot::Idle,
                    Some(Notice::PollTimeout {
                        job_id: job.id,
                        attempts_made,
                    }),
                );
            }
            PollOutcome::Failed(e) => {
                let message = match e {
                    crate::error::ClientError::PollError { message, .. } => message,
                    other => other.to_string(),
                };
                self.conclude(
                    epoch,
                    JobSnapshot::Idle,
                    Some(Notice::PollError {
                        job_id: job.id,
                        message,
                    }),
                );
            }
            PollOutcome::Cancelled => {
                log::debug!("job {} superseded, outcome discarded", job.id);
            }
        }
    }
}
