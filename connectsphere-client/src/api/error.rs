use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ApiError {
    /// Map a non-success status and its already extracted message
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            400 => ApiError::BadRequest(message),
            401 => ApiError::Unauthorized(message),
            403 => ApiError::Forbidden(message),
            404 => ApiError::NotFound(message),
            _ => ApiError::Api { status, message },
        }
    }

    /// The stored credential is no longer usable and the user must log in again
    pub fn requires_reauth(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }

    /// HTTP status behind the error, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::BadRequest(_) => Some(400),
            ApiError::Unauthorized(_) => Some(401),
            ApiError::Forbidden(_) => Some(403),
            ApiError::NotFound(_) => Some(404),
            ApiError::Api { status, .. } => Some(*status),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            ApiError::Serialization(_) => None,
        }
    }

    /// Message as the server phrased it, for errors that carry one
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg) => Some(msg),
            ApiError::Api { message, .. } => Some(message),
            ApiError::Network(_) | ApiError::Serialization(_) => None,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
