use thiserror::Error;

/// Platform client and scheduler error.
#[derive(Debug, Error)]
pub enum BrainError {
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("session credentials expired")]
    AuthExpired,

    #[error("submission rejected (HTTP {status}): {body}")]
    SubmitRejected { status: u16, body: String },

    #[error("submission accepted without a Location header")]
    MissingHandle,

    #[error("transient network error: {0}")]
    Transport(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BrainError {
    /// Transient errors are retried once (after re-authentication); anything
    /// else ends the job immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, BrainError::Transport(_))
    }
}
