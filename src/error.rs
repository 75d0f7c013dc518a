/// Errors from building a table out of resource records.
#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum TableError {
    /// No record to infer the header row from
    #[error("cannot infer columns from an empty collection")]
    EmptyCollection,
}

/// Errors from a single GET against the REST API. Every variant is terminal for its call.
#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum FetchError {
    /// Request never produced a response
    #[error("request to {path} failed: {reason}")]
    Transport { path: String, reason: String },

    /// Response arrived with a non-success status
    #[error("{path} responded with HTTP {status}")]
    HttpStatus { path: String, status: u16 },

    /// Success status, but the body is not the expected envelope
    #[error("unexpected response from {path}: {detail}")]
    EnvelopeMismatch { path: String, detail: String },

    #[error(transparent)]
    Table(#[from] TableError),
}

impl FetchError {
    pub fn envelope(path: &str, detail: impl Into<String>) -> Self {
        Self::EnvelopeMismatch {
            path: path.to_string(),
            detail: detail.into(),
        }
    }

    /// Network or non-2xx failures, as opposed to malformed bodies.
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::HttpStatus { .. })
    }
}

/// Errors from a mutation (restart / scale) request.
#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum ActionError {
    #[error(transparent)]
    Request(#[from] FetchError),

    /// Server answered `success: false`
    #[error("{reason}")]
    Rejected { reason: String },
}
