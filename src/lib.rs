pub mod client;
pub mod config;
pub mod error;
pub mod normalize;
pub mod poller;
pub mod protocol;
pub mod supervisor;

pub fn create_timestamp() -> String {
    use chrono::{SecondsFormat, Utc};
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
