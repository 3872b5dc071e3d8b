use serde::Serialize;
use thiserror::Error;

/// Errors produced by the completion client.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("could not reach the completion service: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("completion service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected completion response: {0}")]
    Decode(String),
    #[error("completion stream failed: {0}")]
    Stream(String),
    #[error("completion service returned an empty reply")]
    EmptyResponse,
}

/// Errors surfaced by the coaching components.
#[derive(Debug, Error)]
pub enum CoachError {
    #[error("{0}")]
    Validation(String),
    #[error("profile {0} not found")]
    NotFound(i64),
    #[error("{0}")]
    Policy(String),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

pub type CoachResult<T> = Result<T, CoachError>;

/// Coarse classification used by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Policy,
    Service,
    Storage,
}

impl CoachError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Policy(_) => ErrorKind::Policy,
            Self::Service(_) => ErrorKind::Service,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Only completion failures are worth resubmitting unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Service(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_are_the_only_retryable_kind() {
        let service = CoachError::from(ServiceError::EmptyResponse);
        assert_eq!(service.kind(), ErrorKind::Service);
        assert!(service.is_retryable());

        let policy = CoachError::Policy("cannot delete the last profile".into());
        assert_eq!(policy.kind(), ErrorKind::Policy);
        assert!(!policy.is_retryable());
        assert!(!CoachError::NotFound(3).is_retryable());
    }

    #[test]
    fn storage_errors_keep_their_context_chain() {
        let cause = anyhow::anyhow!("disk full").context("Failed to insert log entry");
        let err = CoachError::from(cause);
        assert_eq!(err.to_string(), "storage failure: Failed to insert log entry: disk full");
    }
}
