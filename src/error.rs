//! Error taxonomy shared across the crate
//!
//! Each area has its own `thiserror` enum; all of them map onto [`ErrorKind`]
//! so the conversation loop can decide how to surface a failure.

/// Coarse classification of every failure the session can hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connection refused, timed out, or the server went away
    TransportUnavailable,
    /// Pipe binding read too many lines without a JSON response
    TransportExhausted,
    /// Response body was not valid JSON
    TransportMalformed,
    /// Response JSON had an unexpected shape
    ProtocolMismatch,
    /// Agent emitted a directive whose arguments do not parse
    DirectiveMalformed,
    /// Server reported an error for a tool call
    ToolExecutionError,
    /// The language-model backend failed
    AgentUnavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::TransportUnavailable => "transport_unavailable",
            ErrorKind::TransportExhausted => "transport_exhausted",
            ErrorKind::TransportMalformed => "transport_malformed",
            ErrorKind::ProtocolMismatch => "protocol_mismatch",
            ErrorKind::DirectiveMalformed => "directive_malformed",
            ErrorKind::ToolExecutionError => "tool_execution_error",
            ErrorKind::AgentUnavailable => "agent_unavailable",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
