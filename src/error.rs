//! Unified error type.

use std::num::ParseIntError;

use reqwest::StatusCode;
use thiserror::Error;

/// Error type produced by a handler invocation.
///
/// Handlers and middlewares return this boxed trait object so that an error
/// raised deep inside the stack reaches the caller untouched. Errors from this
/// crate are [`Error`] values and can be recovered with
/// `err.downcast_ref::<Error>()`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by the crate's fallible operations.
///
/// Configuration errors (`MissingSessionToken`, `InvalidPort`, `Client`) surface from
/// [`ParametersAndSecrets::build`](crate::middleware::ParametersAndSecrets::build)
/// and mean no middleware was produced. Everything else is a fetch error: one
/// parameter could not be retrieved, so the whole fetch failed.
#[derive(Debug, Error)]
pub enum Error {
    #[error("AWS_SESSION_TOKEN not set")]
    MissingSessionToken,

    #[error("can not parse PARAMETERS_SECRETS_EXTENSION_HTTP_PORT as int: {value:?}: {source}")]
    InvalidPort {
        value: String,
        source: ParseIntError,
    },

    #[error("can not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The sidecar answered with anything other than `200 OK`.
    #[error("HTTP Status {}: {status}", .status.as_u16())]
    Status { name: String, status: StatusCode },

    #[error("request for parameter `{name}` failed: {source}")]
    Request {
        name: String,
        source: reqwest::Error,
    },

    #[error("malformed sidecar response for parameter `{name}`: {source}")]
    Decode {
        name: String,
        source: serde_json::Error,
    },

    #[error("deadline exceeded while fetching parameter `{name}`")]
    DeadlineExceeded { name: String },

    #[error("fetch task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    /// HTTP status returned by the sidecar, if that is what failed.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
