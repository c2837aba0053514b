use std::fmt;

use crate::api::ApiError;
use crate::error::{StoreError, StoreResult};

/// Fallback text for failures without a usable server message
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";
pub const REAUTH_MESSAGE: &str = "Your session has expired. Please log in again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Failure,
}

/// User-visible outcome of an action
///
/// Every user-initiated mutation ends in exactly one notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    /// The stored credential should be discarded and the user sent to log in
    pub requires_reauth: bool,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
            requires_reauth: false,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Failure,
            message: message.into(),
            requires_reauth: false,
        }
    }

    pub fn reauth() -> Self {
        Self {
            kind: NoticeKind::Failure,
            message: REAUTH_MESSAGE.to_string(),
            requires_reauth: true,
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == NoticeKind::Success
    }

    pub fn from_error(error: &StoreError) -> Self {
        if error.requires_reauth() {
            return Self::reauth();
        }
        match error {
            StoreError::Validation(e) => Self::failure(e.to_string()),
            StoreError::InFlight(_) => Self::failure(error.to_string()),
            StoreError::Api(api) => match api {
                ApiError::NotFound(msg) | ApiError::Forbidden(msg) | ApiError::BadRequest(msg)
                    if !msg.is_empty() =>
                {
                    Self::failure(msg.clone())
                }
                _ => Self::failure(GENERIC_FAILURE),
            },
            StoreError::NoSession => Self::reauth(),
        }
    }

    /// Success text when `result` is `Ok`, otherwise the error's notice
    pub fn from_outcome<T>(result: &StoreResult<T>, success: impl Into<String>) -> Self {
        match result {
            Ok(_) => Self::success(success),
            Err(e) => Self::from_error(e),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            NoticeKind::Success => write!(f, "✓ {}", self.message),
            NoticeKind::Failure => write!(f, "✗ {}", self.message),
        }
    }
}
