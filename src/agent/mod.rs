//! Agent module: the conversation loop around the tool server
//!
//! # Architecture
//!
//! ```text
//! User input → ConversationController → ChatBackend (full history)
//!                    ↓
//!            parse_directive(reply)
//!          ↙          ↓            ↘
//!     plain reply   malformed     TOOL/ARGS directive
//!     (shown)       (reported)         ↓
//!                              McpClient.call_tool()
//!                                      ↓
//!                     display + truncated result into history
//!                                      ↓
//!                     ChatBackend again → interpretation shown
//! ```

pub mod controller;
pub mod display;
pub mod history;
pub mod prompt;

pub use controller::{
    ControllerConfig, ConversationController, SessionError, ToolInvocation, TurnError, TurnOutcome,
};
pub use display::format_result;
pub use history::{ConversationContext, ConversationTurn};
pub use prompt::build_system_prompt;
