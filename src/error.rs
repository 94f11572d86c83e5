//! Error taxonomy for the display bridge.
//!
//! Every variant is terminal: there is no degraded mode, the bridge either runs
//! the full poll/render cycle or stops.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Config file missing, unreadable or malformed
    #[error("config error: {0}")]
    Config(String),

    /// Credentials missing or rejected, or no token could be issued
    #[error("authentication error: {0}")]
    Auth(String),

    /// Telemetry request failed or returned an unexpected document
    #[error("failed to fetch telemetry: {0:#}")]
    Fetch(anyhow::Error),

    /// Display hub unreachable, display absent or a display command failed
    #[error("display error: {0}")]
    Hardware(String),
}

impl Error {
    pub fn auth(message: impl Into<String>) -> Self {
        Error::Auth(message.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
