use reqwest::StatusCode;
use seasonroom_core::FlowError;

use crate::refresh::RefreshError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Tokens could not be refreshed; the stored session has been cleared.
    #[error("session expired: {reason}")]
    SessionExpired { reason: RefreshError },

    #[error("server returned {status} (code {code:?}): {message}")]
    Api {
        status: StatusCode,
        code: Option<i32>,
        message: String,
    },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("could not decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("response from {path} carried no data")]
    MissingData { path: String },

    #[error("token store: {0:#}")]
    TokenStore(#[from] anyhow::Error),
}

impl ClientError {
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired { .. })
    }
}

/// Failure of a session-level operation: either the board refused the
/// transition or the backend call failed.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error(transparent)]
    Client(#[from] ClientError),
}
