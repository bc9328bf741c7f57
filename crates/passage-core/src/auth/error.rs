use thiserror::Error;

use crate::api::ApiError;

/// Why a session operation was rejected.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The auth API failed; the underlying error is passed through unchanged.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The profile's role cannot back a session.
    #[error("Invalid role: {0}")]
    InvalidRole(String),

    /// The profile payload does not have the expected shape.
    #[error("Malformed profile: {0}")]
    MalformedProfile(String),
}

impl SessionError {
    /// True for rejections caused by the profile payload rather than the network.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SessionError::InvalidRole(_) | SessionError::MalformedProfile(_)
        )
    }
}
