//! Fetching catalog data from the remote API.
//!
//! `SyncClient` owns the freshness cache, talks to a `Transport` and hands
//! decoded collections to the local mirror for reconciliation.

mod client;
pub mod freshness;
mod payload;

pub use client::SyncClient;
pub use freshness::{FreshnessCache, FreshnessRecord};

use thiserror::Error;

use crate::transport::TransportError;

/// Result of a successful load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome<T> {
    /// The server sent new data.
    Fresh(T),
    /// The stored validator still matches; the mirror is already current.
    NotModified,
}

impl<T> LoadOutcome<T> {
    pub const fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> LoadOutcome<U> {
        match self {
            Self::Fresh(value) => LoadOutcome::Fresh(f(value)),
            Self::NotModified => LoadOutcome::NotModified,
        }
    }
}

/// Failures of a sync client call or an outbound operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// Suppressed: the endpoint is in flight or its data is still fresh.
    #[error("Request throttled")]
    Throttled,

    /// A required parameter or credential is missing; nothing was sent.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Failed to decode response from {endpoint}: {message}")]
    Decoding { endpoint: String, message: String },

    /// Timeout or connectivity failure.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Server rejected request with HTTP {0}")]
    ServerRejected(u16),

    #[error("Local mirror error: {0}")]
    Mirror(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl SyncError {
    /// Status code attached to report events.
    pub const fn code(&self) -> Option<u16> {
        match self {
            Self::ServerRejected(status) => Some(*status),
            _ => None,
        }
    }

    /// Whether a queued operation failing this way should stay queued.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::ServerRejected(_) | Self::Mirror(_) | Self::Unknown(_) => {
                true
            }
            Self::Throttled | Self::PreconditionFailed(_) | Self::Decoding { .. } => false,
        }
    }
}

impl From<TransportError> for SyncError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Timeout => Self::Transport("request timed out".to_string()),
            TransportError::Offline(message) => Self::Transport(message),
            TransportError::Status { status, .. } => Self::ServerRejected(status),
            TransportError::Other(message) => Self::Unknown(message),
        }
    }
}

impl From<crate::error::Error> for SyncError {
    fn from(error: crate::error::Error) -> Self {
        Self::Mirror(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_classified() {
        assert_eq!(
            SyncError::from(TransportError::Timeout),
            SyncError::Transport("request timed out".to_string())
        );
        assert_eq!(
            SyncError::from(TransportError::Status {
                status: 404,
                body: "missing".to_string()
            }),
            SyncError::ServerRejected(404)
        );
        assert!(matches!(
            SyncError::from(TransportError::Other("tls".to_string())),
            SyncError::Unknown(_)
        ));
    }

    #[test]
    fn retry_policy_by_variant() {
        assert!(SyncError::Transport("offline".to_string()).is_retryable());
        assert!(SyncError::ServerRejected(503).is_retryable());
        assert!(SyncError::ServerRejected(400).is_retryable());
        assert!(!SyncError::Decoding {
            endpoint: "GET /me".to_string(),
            message: "missing field".to_string()
        }
        .is_retryable());
        assert!(!SyncError::PreconditionFailed("token".to_string()).is_retryable());
        assert!(!SyncError::Throttled.is_retryable());
    }

    #[test]
    fn only_server_rejections_carry_a_code() {
        assert_eq!(SyncError::ServerRejected(418).code(), Some(418));
        assert_eq!(SyncError::Throttled.code(), None);
    }

    #[test]
    fn load_outcome_map() {
        assert_eq!(LoadOutcome::Fresh(2).map(|n| n * 2), LoadOutcome::Fresh(4));
        assert_eq!(
            LoadOutcome::<i32>::NotModified.map(|n| n * 2),
            LoadOutcome::NotModified
        );
    }
}
