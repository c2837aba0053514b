use thiserror::Error;

use crate::api::ApiError;
use crate::validation::ValidationError;

/// Failure of a post store operation
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("{0} is already in progress")]
    InFlight(String),

    #[error("You need to be logged in to do that")]
    NoSession,
}

impl StoreError {
    /// The user must log in again before retrying
    pub fn requires_reauth(&self) -> bool {
        match self {
            StoreError::Api(e) => e.requires_reauth(),
            StoreError::NoSession => true,
            StoreError::Validation(_) | StoreError::InFlight(_) => false,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reauth_classification() {
        assert!(StoreError::NoSession.requires_reauth());
        assert!(StoreError::from(ApiError::Unauthorized("expired".into())).requires_reauth());
        assert!(!StoreError::from(ApiError::Forbidden("no".into())).requires_reauth());
        assert!(!StoreError::from(ValidationError::EmptyContent).requires_reauth());
        assert!(!StoreError::InFlight("Like".into()).requires_reauth());
    }

    #[test]
    fn test_messages_pass_through() {
        let err = StoreError::from(ValidationError::EmptyContent);
        assert_eq!(err.to_string(), "Content cannot be empty");
        assert_eq!(
            StoreError::InFlight("Liking post 3".into()).to_string(),
            "Liking post 3 is already in progress"
        );
    }
}
