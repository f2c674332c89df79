//! Transport abstraction: deliver one request, return the matching response

use async_trait::async_trait;
use thiserror::Error;

use super::protocol::{RpcRequest, RpcResponse};
use crate::error::ErrorKind;

/// Failures while moving a request to the server and back
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("tool server unavailable: {0}")]
    Unavailable(String),

    #[error("no JSON response after reading {attempts} line(s) from the tool server")]
    Exhausted { attempts: usize },

    #[error("malformed response from tool server: {0}")]
    Malformed(String),

    #[error("unexpected response shape: {raw}")]
    ProtocolMismatch { raw: String },

    #[error("failed to launch tool server `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error talking to tool server: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

impl TransportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::Unavailable(_)
            | TransportError::Spawn { .. }
            | TransportError::Io(_)
            | TransportError::Encode(_) => ErrorKind::TransportUnavailable,
            TransportError::Exhausted { .. } => ErrorKind::TransportExhausted,
            TransportError::Malformed(_) => ErrorKind::TransportMalformed,
            TransportError::ProtocolMismatch { .. } => ErrorKind::ProtocolMismatch,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            TransportError::Malformed(e.to_string())
        } else {
            TransportError::Unavailable(e.to_string())
        }
    }
}

/// A way of reaching the tool server.
///
/// Calls are strictly sequential: the caller awaits each `send` before
/// issuing the next, so at most one request is outstanding.
#[async_trait]
pub trait Transport: Send {
    /// Short name for logs and metrics ("pipe", "http", ...)
    fn name(&self) -> &'static str;

    /// Deliver `request` and return the response carrying the same id
    async fn send(&mut self, request: &RpcRequest) -> Result<RpcResponse, TransportError>;

    /// Wait until a freshly spawned server can take requests
    async fn warm_up(&mut self) {}

    /// Release whatever the transport owns (e.g. terminate a spawned server)
    async fn shutdown(&mut self) {}
}
