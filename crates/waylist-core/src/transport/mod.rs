//! Transport boundary.
//!
//! The engine never performs network I/O itself. It hands a fully specified
//! `TransportRequest` to a `Transport` and classifies whatever comes back.

mod http;

pub use http::HttpTransport;

use async_trait::async_trait;
use thiserror::Error;

use crate::endpoint::Endpoint;

pub const STATUS_NOT_MODIFIED: u16 = 304;

/// Binary body attached to an upload.
#[derive(Clone, PartialEq, Eq)]
pub struct Upload {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for Upload {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Upload")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    pub endpoint: Endpoint,
    /// Conditional-request validator (sent as `If-None-Match`).
    pub validator: Option<String>,
    pub bearer_token: Option<String>,
    pub upload: Option<Upload>,
}

impl TransportRequest {
    pub const fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            validator: None,
            bearer_token: None,
            upload: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
    /// Response validator (`ETag`), if the server sent one.
    pub validator: Option<String>,
}

impl TransportResponse {
    pub const fn is_not_modified(&self) -> bool {
        self.status == STATUS_NOT_MODIFIED
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Transport-level failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,
    #[error("Network unavailable: {0}")]
    Offline(String),
    #[error("Server rejected request with HTTP {status}")]
    Status { status: u16, body: String },
    #[error("Transport failure: {0}")]
    Other(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: TransportRequest)
        -> Result<TransportResponse, TransportError>;
}
