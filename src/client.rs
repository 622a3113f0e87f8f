use async_trait::async_trait;

use crate::error::ClientError;
use crate::protocol::{
    DispatchResponse, Job, JobId, JobKind, JobSpec, RunRequest, StatusPayload, SubmitRequest,
};

/// The judge backend as this client sees it: two dispatch endpoints and one
/// status endpoint. Tests substitute a scripted implementation.
#[async_trait]
pub trait JudgeBackend: Send + Sync {
    async fn post_run(&self, request: &RunRequest) -> anyhow::Result<JobId>;

    async fn post_submit(&self, request: &SubmitRequest) -> anyhow::Result<JobId>;

    async fn fetch_status(&self, job_id: JobId) -> anyhow::Result<StatusPayload>;
}

/// Sends one run or submit request and returns the job the backend assigned.
///
/// Exactly one network call, never retried: a duplicate grading attempt must
/// only ever come from an explicit user action. On failure no job exists and
/// no polling starts.
pub async fn dispatch(backend: &dyn JudgeBackend, spec: JobSpec) -> Result<Job, ClientError> {
    if spec.source_code.trim().is_empty() {
        return Err(ClientError::DispatchFailed(
            "empty code provided".to_string(),
        ));
    }

    let dispatched = match spec.kind {
        JobKind::Run => {
            if spec.cases.is_empty() {
                return Err(ClientError::DispatchFailed(
                    "a run needs at least one test case".to_string(),
                ));
            }
            backend.post_run(&RunRequest::from_spec(&spec)).await
        }
        JobKind::Submit => backend.post_submit(&SubmitRequest::from_spec(&spec)).await,
    };

    match dispatched {
        Ok(id) => {
            log::info!(
                "dispatched {} for problem {} as job {id}",
                spec.kind,
                spec.problem_id
            );
            Ok(Job { id, spec })
        }
        Err(e) => Err(ClientError::DispatchFailed(e.to_string())),
    }
}

/// `JudgeBackend` over HTTP, talking to the real judge API.
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

/// Turns a non-2xx response into an error carrying the backend-provided
/// message when the body has one.
async fn check(response: reqwest::Response) -> anyhow::Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let body = body.trim();
    if body.is_empty() {
        anyhow::bail!("backend returned {status}");
    }
    anyhow::bail!("{body}")
}

#[async_trait]
impl JudgeBackend for HttpBackend {
    async fn post_run(&self, request: &RunRequest) -> anyhow::Result<JobId> {
        let response = self.http.post(self.url("run")).json(request).send().await?;
        let response: DispatchResponse = check(response).await?.json().await?;
        Ok(response.run_id)
    }

    async fn post_submit(&self, request: &SubmitRequest) -> anyhow::Result<JobId> {
        let response = self
            .http
            .post(self.url("submit"))
            .json(request)
            .send()
            .await?;
        let response: DispatchResponse = check(response).await?.json().await?;
        Ok(response.run_id)
    }

    async fn fetch_status(&self, job_id: JobId) -> anyhow::Result<StatusPayload> {
        let response = self
            .http
            .get(self.url(&format!("submission/{job_id}")))
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }
}
