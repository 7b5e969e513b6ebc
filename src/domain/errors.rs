use crate::domain::entities::{Method, ResponseEnvelope};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result of a completed request attempt.
///
/// Every expected failure mode (validation, file access, timeout, transport)
/// travels through the `Err` variant; nothing in the library panics or throws
/// across the API boundary.
pub type Outcome = Result<ResponseEnvelope, ClientError>;

/// Typed failure channel for the whole request pipeline.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no URL could be determined from the given arguments")]
    MissingUrl,

    #[error("invalid URL '{0}'")]
    InvalidUrl(String),

    #[error("cannot read '{path}' for field '{field}': {source}")]
    FileAccess {
        path: PathBuf,
        field: String,
        #[source]
        source: std::io::Error,
    },

    #[error("body cannot be sent with the selected content mode: {0}")]
    InvalidBodyType(String),

    #[error("{method} {url} timed out after {timeout_ms} ms")]
    Timeout {
        timeout_ms: u64,
        method: Method,
        url: String,
        /// Time actually spent before the timeout fired.
        elapsed: Duration,
    },

    #[error("{method} {url} was cancelled after {elapsed:?}")]
    Cancelled {
        method: Method,
        url: String,
        elapsed: Duration,
    },

    #[error("{method} {url} failed: {source}")]
    Network {
        method: Method,
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{method} {url} returned {status} {status_text}")]
    HttpStatus {
        status: u16,
        status_text: String,
        method: Method,
        url: String,
        body: String,
    },
}

impl ClientError {
    /// Process exit code for the CLI: 0 success, 1 request/application error,
    /// 2 connection error, 3 timeout, 4 invalid arguments.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidArgument(_) | Self::MissingUrl | Self::InvalidUrl(_) => 4,
            Self::Timeout { .. } => 3,
            Self::Network { .. } => 2,
            _ => 1,
        }
    }
}
