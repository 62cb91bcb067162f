//! Failure taxonomy for every call that crosses the API boundary.

use shared::error::{ApiError, FieldViolation};
use thiserror::Error;

/// Why a fetch or mutation did not produce a usable value.
///
/// A superseded response is not represented here: the query slot reports it as
/// [`crate::query_slot::Settlement::Discarded`] and nothing user-visible happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("server unreachable: {0}")]
    NetworkUnreachable(String),
    #[error("server rejected request: {0}")]
    ServerRejected(ApiError),
    #[error("unexpected response shape: {0}")]
    ShapeMismatch(String),
}

impl FetchError {
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        FetchError::ServerRejected(ApiError::new(status, message))
    }

    /// Field-keyed validation failures. Shape mismatches count as a rejection
    /// with no detail.
    pub fn violations(&self) -> &[FieldViolation] {
        match self {
            FetchError::ServerRejected(err) => &err.violations,
            FetchError::NetworkUnreachable(_) | FetchError::ShapeMismatch(_) => &[],
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::ServerRejected(err) => Some(err.status),
            _ => None,
        }
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, FetchError::NetworkUnreachable(_))
    }

    pub fn user_message(&self) -> String {
        match self {
            FetchError::NetworkUnreachable(_) => {
                "Server unreachable; check the connection and retry.".to_string()
            }
            FetchError::ServerRejected(err) if !err.message.is_empty() => err.message.clone(),
            FetchError::ServerRejected(err) => {
                format!("Request rejected by server (status {}).", err.status)
            }
            FetchError::ShapeMismatch(_) => {
                "Server returned an unexpected response; retry later.".to_string()
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("api base url must be an absolute http(s) url, got '{0}'")]
    InvalidBaseUrl(String),
    #[error("{0} must be greater than zero")]
    ZeroPageSize(&'static str),
    #[error("failed to build http client: {0}")]
    HttpClient(String),
}
