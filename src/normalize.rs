use crate::protocol::{
    CaseResult, JobId, RawCaseResult, StatusPayload, SubmissionResult, TestCase, Verdict,
};

/// Canonicalizes one raw status payload.
///
/// Runs on every fetch, including intermediate pending ones, so downstream
/// consumers can always iterate a non-empty case list without branching on
/// payload shape. Pure and deterministic.
pub fn normalize(
    job_id: JobId,
    payload: StatusPayload,
    requested: &[TestCase],
) -> SubmissionResult {
    let cases = match payload.results {
        Some(raw) if !raw.is_empty() => canonical_cases(raw, requested),
        // Degraded/legacy shape: only an aggregate verdict, no per-case
        // detail. Synthesize a single placeholder case.
        _ => vec![placeholder_case(payload.status.clone())],
    };

    SubmissionResult {
        job_id,
        overall_status: payload.status,
        cases,
    }
}

fn placeholder_case(status: Verdict) -> CaseResult {
    CaseResult {
        id: 1,
        status,
        input: String::new(),
        expected_output: String::new(),
        output: String::new(),
        stderr: String::new(),
        runtime_ms: 0,
        memory_kb: 0,
    }
}

fn canonical_cases(raw: Vec<RawCaseResult>, requested: &[TestCase]) -> Vec<CaseResult> {
    let mut cases: Vec<CaseResult> = raw.into_iter().map(canonical_case).collect();

    // Keep the order the cases were submitted in, stable across polls.
    // Case ids the client never sent keep their arrival order at the end.
    if !requested.is_empty() {
        let rank = |id: u32| {
            requested
                .iter()
                .position(|c| c.id == id)
                .unwrap_or(requested.len())
        };
        cases.sort_by_key(|c| rank(c.id));
    }

    cases
}

fn canonical_case(raw: RawCaseResult) -> CaseResult {
    CaseResult {
        id: raw.id,
        status: raw.status,
        input: raw.input,
        expected_output: raw.expected_output,
        output: raw.output,
        stderr: raw.stderr,
        runtime_ms: raw.runtime_ms.max(0) as u64,
        memory_kb: raw.memory_kb.max(0) as u64,
    }
}
