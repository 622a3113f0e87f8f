use std::fmt;

use serde::{Deserialize, Serialize};

/// Backend-assigned identifier of one dispatched job, unique per dispatch.
pub type JobId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Evaluate against the client-supplied sample test cases.
    Run,
    /// Evaluate against the full grading suite.
    Submit,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Run => write!(f, "run"),
            Self::Submit => write!(f, "submit"),
        }
    }
}

/// Verdict strings as the backend reports them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "accepted")]
    Accepted,
    #[serde(rename = "wrong answer")]
    WrongAnswer,
    #[serde(rename = "runtime error")]
    RuntimeError,
    #[serde(rename = "time limit exceeded")]
    TimeLimitExceeded,
    #[serde(rename = "memory limit exceeded")]
    MemoryLimitExceeded,
    #[serde(rename = "compilation error")]
    CompilationError,
    /// Catch-all for verdict strings this client does not know about.
    /// Anything other than `pending` still counts as terminal.
    #[serde(other, rename = "unknown")]
    Unknown,
}

impl Verdict {
    pub fn is_terminal(&self) -> bool {
        *self != Self::Pending
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::WrongAnswer => "wrong answer",
            Self::RuntimeError => "runtime error",
            Self::TimeLimitExceeded => "time limit exceeded",
            Self::MemoryLimitExceeded => "memory limit exceeded",
            Self::CompilationError => "compilation error",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// One sample test case as the client submits it with a run request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct TestCase {
    #[serde(rename = "ID")]
    pub id: u32,
    pub input: String,
    pub expected_output: String,
}

/// Immutable inputs of one dispatch attempt, captured at dispatch time.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub kind: JobKind,
    pub problem_id: u32,
    pub language: String,
    pub source_code: String,
    /// Used by `Run` only; `Submit` always grades against the full suite.
    pub cases: Vec<TestCase>,
}

/// One dispatched job. Created only after the backend assigned an id,
/// never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub spec: JobSpec,
}

// ====================== wire shapes ======================

#[derive(Serialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct RunRequest {
    #[serde(rename = "ProblemID")]
    pub problem_id: u32,
    pub language: String,
    pub code: String,
    pub cases: Vec<TestCase>,
}

impl RunRequest {
    pub fn from_spec(spec: &JobSpec) -> Self {
        Self {
            problem_id: spec.problem_id,
            language: spec.language.clone(),
            code: spec.source_code.clone(),
            cases: spec.cases.clone(),
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct SubmitRequest {
    #[serde(rename = "ProblemID")]
    pub problem_id: u32,
    pub language: String,
    pub code: String,
}

impl SubmitRequest {
    pub fn from_spec(spec: &JobSpec) -> Self {
        Self {
            problem_id: spec.problem_id,
            language: spec.language.clone(),
            code: spec.source_code.clone(),
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct DispatchResponse {
    pub run_id: JobId,
}

/// Raw per-case entry as it arrives off the wire. Runtime and memory are
/// signed here because the backend has been seen emitting negatives; the
/// normalizer clamps them.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct RawCaseResult {
    #[serde(rename = "ID")]
    pub id: u32,
    pub status: Verdict,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub expected_output: String,
    #[serde(default)]
    pub output: String,
    #[serde(default, rename = "StdErr")]
    pub stderr: String,
    #[serde(default, rename = "RuntimeMS")]
    pub runtime_ms: i64,
    #[serde(default, rename = "MemoryKB")]
    pub memory_kb: i64,
}

/// Raw status payload from `GET submission/{run_id}`. `results` is absent
/// in the degraded/legacy response shape.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct StatusPayload {
    pub status: Verdict,
    #[serde(default)]
    pub results: Option<Vec<RawCaseResult>>,
}

// ====================== canonical results ======================

/// One test case's canonical outcome.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CaseResult {
    pub id: u32,
    pub status: Verdict,
    pub input: String,
    pub expected_output: String,
    pub output: String,
    pub stderr: String,
    pub runtime_ms: u64,
    pub memory_kb: u64,
}

/// Aggregate outcome of one job. Once `overall_status` is terminal this is
/// final; no further polling happens for the job.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SubmissionResult {
    pub job_id: JobId,
    pub overall_status: Verdict,
    pub cases: Vec<CaseResult>,
}
