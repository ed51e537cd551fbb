use thiserror::Error;

/// Failure talking to the study backend.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("request to {endpoint} failed: {message}")]
    Transport {
        endpoint: &'static str,
        message: String,
    },
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: &'static str, status: u16 },
    #[error("{endpoint} reported an error: {message}")]
    Remote {
        endpoint: &'static str,
        message: String,
    },
    #[error("{endpoint} rejected the request{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Rejected {
        endpoint: &'static str,
        message: Option<String>,
    },
    #[error("unexpected payload from {endpoint}: {message}")]
    Decode {
        endpoint: &'static str,
        message: String,
    },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("range {start}..{end} is outside of a {len} byte buffer")]
    InvalidRange { start: usize, end: usize, len: usize },
    #[error("offset {offset} does not fall on a character boundary")]
    NotCharBoundary { offset: usize },
}
