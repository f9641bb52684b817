use thiserror::Error;

use crate::api::ApiError;
use crate::storage::StorageError;
use crate::validation::ValidationErrors;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Network error: {0}")]
    Network(String),

    /// The server rejected the credentials; carries its message
    #[error("{0}")]
    Authentication(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("{0}")]
    Avatar(String),

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Already signed in")]
    AlreadyAuthenticated,

    #[error("Session restore still in progress")]
    RestoreInProgress,
}

impl From<ApiError> for SessionError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized(message) | ApiError::Rejected { message, .. } => {
                SessionError::Authentication(message)
            }
            ApiError::NetworkError(e) => SessionError::Network(e.to_string()),
            ApiError::RateLimited | ApiError::ServerError(_) => {
                SessionError::Server(err.to_string())
            }
            ApiError::Avatar(message) => SessionError::Avatar(message),
            ApiError::NotFound(_)
            | ApiError::InvalidResponse(_)
            | ApiError::InvalidUrl(_)
            | ApiError::InvalidToken(_) => {
                SessionError::InvalidResponse(err.to_string())
            }
        }
    }
}

impl SessionError {
    /// Text suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Authentication(message) => message.clone(),
            SessionError::Network(e) if e.to_lowercase().contains("timed out") => {
                "Connection timed out. Please try again.".to_string()
            }
            SessionError::Network(_) => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            SessionError::Server(_) | SessionError::InvalidResponse(_) => {
                "The server could not complete the request. Please try again later.".to_string()
            }
            SessionError::Storage(_) => {
                "Your changes may not have been saved on this device.".to_string()
            }
            other => other.to_string(),
        }
    }
}
