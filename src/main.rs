use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use oj_client::client::HttpBackend;
use oj_client::config::{CliArgs, Command, Config};
use oj_client::protocol::{JobKind, JobSpec, SubmissionResult, TestCase};
use oj_client::supervisor::{JobSnapshot, Notice, Supervisor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = CliArgs::parse();
    let config = cli.to_config().context("Failed to load configuration")?;
    let spec = build_spec(&cli.command, &config)?;

    let backend = Arc::new(HttpBackend::new(config.backend.base_url.clone()));
    let supervisor = Supervisor::new(backend, config.polling.to_options());

    let mut snapshots = supervisor.subscribe();
    let mut notices = supervisor
        .notices()
        .expect("notice stream taken before anyone else could");

    log::info!("dispatching at {}", oj_client::create_timestamp());
    supervisor.submit(spec);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Ctrl-c received, cancelling current job");
                supervisor.cancel();
                return Ok(());
            }

            changed = snapshots.changed() => {
                if changed.is_err() {
                    continue;
                }
                if let JobSnapshot::Polling { job_id, attempts_made } = &*snapshots.borrow()
                    && *attempts_made > 0
                {
                    log::info!("job {job_id} still pending after {attempts_made} attempt(s)");
                }
            }

            notice = notices.recv() => {
                match notice {
                    Some(Notice::Resolved(result)) => {
                        print_result(&result);
                        return Ok(());
                    }
                    Some(Notice::PollTimeout { job_id, attempts_made }) => {
                        eprintln!(
                            "Could not retrieve the result of job {job_id} after \
                             {attempts_made} attempts. Try again."
                        );
                        std::process::exit(2);
                    }
                    Some(Notice::DispatchFailed { message }) => {
                        eprintln!("Dispatch failed: {message}");
                        std::process::exit(1);
                    }
                    Some(Notice::PollError { job_id, message }) => {
                        eprintln!("Could not retrieve the result of job {job_id}: {message}");
                        std::process::exit(1);
                    }
                    None => return Ok(()),
                }
            }
        }
    }
}

fn build_spec(command: &Command, config: &Config) -> anyhow::Result<JobSpec> {
    let pick_language = |cli_language: &Option<String>| {
        cli_language
            .clone()
            .or_else(|| config.backend.default_language.clone())
            .context("no language given and no default_language configured")
    };

    match command {
        Command::Run {
            problem,
            language,
            file,
            cases,
        } => {
            let source_code = std::fs::read_to_string(file)
                .with_context(|| format!("Failed to read solution file {file}"))?;
            let cases_json = std::fs::read_to_string(cases)
                .with_context(|| format!("Failed to read test case file {cases}"))?;
            let cases: Vec<TestCase> = serde_json::from_str(&cases_json)
                .context("Failed to parse test case file")?;

            Ok(JobSpec {
                kind: JobKind::Run,
                problem_id: *problem,
                language: pick_language(language)?,
                source_code,
                cases,
            })
        }
        Command::Submit {
            problem,
            language,
            file,
        } => {
            let source_code = std::fs::read_to_string(file)
                .with_context(|| format!("Failed to read solution file {file}"))?;

            Ok(JobSpec {
                kind: JobKind::Submit,
                problem_id: *problem,
                language: pick_language(language)?,
                source_code,
                cases: Vec::new(),
            })
        }
    }
}

fn print_result(result: &SubmissionResult) {
    println!("Job {} finished: {}", result.job_id, result.overall_status);
    println!(
        "{:<6} {:<22} {:>12} {:>12}",
        "Case", "Verdict", "Time (ms)", "Memory (KB)"
    );
    for case in &result.cases {
        println!(
            "{:<6} {:<22} {:>12} {:>12}",
            case.id, case.status, case.runtime_ms, case.memory_kb
        );
        if !case.stderr.is_empty() {
            println!("       stderr: {}", case.stderr);
        }
    }
}
