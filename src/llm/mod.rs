//! Language-model integration
//!
//! This module provides the chat client used to query the agent and the
//! parser that recognises tool directives in its replies.

pub mod chat;
pub mod directive;

pub use chat::{ApiFlavor, ChatBackend, ChatClient, ChatConfig, ChatError, ChatMessage, Role};
pub use directive::{parse_directive, Directive, ParsedReply, ARGS_MARKER, TOOL_MARKER};
