//! Error taxonomy for pipeline runs and retry classification.
use anyhow::Error;
use reqwest::StatusCode;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

/// Failures that abort a pipeline run.
///
/// Everything else in the pipeline is absorbed: an exhausted image sub-job
/// leaves its step without an image, and best-effort work (categorization,
/// quality enhancement, the caller-owned copy) is reduced to a warning on the
/// run result.
#[derive(Debug, ThisError)]
pub enum PipelineError {
    #[error("content generation failed: {0:#}")]
    ContentGeneration(#[source] anyhow::Error),
    #[error("generated recipe failed validation: {0}")]
    InvalidContent(String),
    #[error("canonical persistence failed: {0:#}")]
    CanonicalPersist(#[source] anyhow::Error),
}

/// Broad error classes used to decide whether a phase attempt is worth
/// repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    /// Transient network errors, timeouts, 5xx, pool exhaustion.
    Retryable,
    /// Client-side errors that will fail the same way again.
    NonRetryable,
    /// Authentication or configuration errors.
    Fatal,
}

/// Classify an error chain by downcasting to the transport/store error types.
#[must_use]
pub(crate) fn classify_error(error: &Error) -> ErrorKind {
    if let Some(reqwest_err) = error.downcast_ref::<reqwest::Error>() {
        if reqwest_err.is_timeout() || reqwest_err.is_connect() {
            return ErrorKind::Retryable;
        }

        if let Some(status) = reqwest_err.status() {
            match status {
                StatusCode::INTERNAL_SERVER_ERROR
                | StatusCode::BAD_GATEWAY
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT
                | StatusCode::TOO_MANY_REQUESTS => return ErrorKind::Retryable,
                StatusCode::BAD_REQUEST
                | StatusCode::NOT_FOUND
                | StatusCode::UNPROCESSABLE_ENTITY => return ErrorKind::NonRetryable,
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return ErrorKind::Fatal,
                _ => {}
            }
        }
    }

    if let Some(sqlx_err) = error.downcast_ref::<SqlxError>() {
        match sqlx_err {
            SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::Database(_) => {
                return ErrorKind::Retryable;
            }
            SqlxError::RowNotFound => return ErrorKind::NonRetryable,
            SqlxError::Configuration(_) => return ErrorKind::Fatal,
            _ => {}
        }
    }

    ErrorKind::NonRetryable
}

#[must_use]
pub(crate) fn is_retryable(error: &Error) -> bool {
    matches!(classify_error(error), ErrorKind::Retryable)
}
