use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Deserialize;

use crate::poller::PollOptions;

#[derive(Parser)]
#[command(name = "oj-client", version = "1.0", about, long_about = None)]
pub struct CliArgs {
    /// Path to the configuration file
    #[arg(long = "config", short = 'c')]
    pub config_path: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a solution against sample test cases
    Run {
        /// Problem id the solution targets
        #[arg(long, short = 'p')]
        problem: u32,

        /// Language the solution is written in (falls back to the
        /// configured default)
        #[arg(long, short = 'l')]
        language: Option<String>,

        /// Path to the solution source file
        #[arg(long, short = 'f')]
        file: String,

        /// Path to a JSON file with the sample test cases
        #[arg(long)]
        cases: String,
    },

    /// Submit a solution for full grading
    Submit {
        /// Problem id the solution targets
        #[arg(long, short = 'p')]
        problem: u32,

        /// Language the solution is written in (falls back to the
        /// configured default)
        #[arg(long, short = 'l')]
        language: Option<String>,

        /// Path to the solution source file
        #[arg(long, short = 'f')]
        file: String,
    },
}

impl CliArgs {
    /// Load the configuration from the specified file
    pub fn to_config(&self) -> std::io::Result<Config> {
        let file = std::fs::File::open(&self.config_path)?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| e.into())
    }
}

#[derive(Deserialize, Debug)]
pub struct Config {
    pub backend: BackendConfig,
    #[serde(default)]
    pub polling: PollingConfig,
}

#[derive(Deserialize, Debug)]
pub struct BackendConfig {
    pub base_url: String,
    pub default_language: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct PollingConfig {
    pub interval_seconds: Option<u64>,
    pub max_attempts: Option<u32>,
}

impl PollingConfig {
    pub fn to_options(&self) -> PollOptions {
        let defaults = PollOptions::default();
        PollOptions {
            interval: self
                .interval_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.interval),
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let file = std::fs::File::open("data/example.json").unwrap();
        let reader = std::io::BufReader::new(file);
        let config: Config = serde_json::from_reader(reader).unwrap();
        assert_eq!(config.backend.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.backend.default_language, Some("python".to_string()));
        assert_eq!(config.polling.max_attempts, Some(10));
        assert_eq!(config.polling.interval_seconds, Some(3));
    }

    #[test]
    fn test_polling_defaults_applied() {
        let config: Config = serde_json::from_str(
            r#"{ "backend": { "base_url": "http://judge.local" } }"#,
        )
        .unwrap();
        let options = config.polling.to_options();
        assert_eq!(options.interval, Duration::from_secs(3));
        assert_eq!(options.max_attempts, 10);
    }
}
