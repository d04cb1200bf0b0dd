use thiserror::Error;

use crate::repositories::StoreError;

/// Stable machine-readable error kinds surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    NotFound,
    Forbidden,
    Invalid,
    Conflict,
    Unavailable,
    Internal,
}

impl ErrorKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Invalid => "invalid",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Internal => "internal",
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum ReviewError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Invalid(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unavailable(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReviewError {
    pub(crate) fn not_found(what: &str) -> Self {
        ReviewError::NotFound(format!("{what} not found"))
    }

    pub(crate) fn forbidden(reason: impl Into<String>) -> Self {
        ReviewError::Forbidden(reason.into())
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        ReviewError::Invalid(reason.into())
    }

    pub(crate) fn kind(&self) -> ErrorKind {
        match self {
            ReviewError::NotFound(_) => ErrorKind::NotFound,
            ReviewError::Forbidden(_) => ErrorKind::Forbidden,
            ReviewError::Invalid(_) => ErrorKind::Invalid,
            ReviewError::Conflict(_) => ErrorKind::Conflict,
            ReviewError::Unavailable(_) => ErrorKind::Unavailable,
            ReviewError::Store(_) => ErrorKind::Internal,
        }
    }
}

pub(crate) type ReviewResult<T> = Result<T, ReviewError>;
