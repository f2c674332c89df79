//! KubeBridge - conversational bridge between a language model and an MCP tool server
//!
//! This library lets a chat agent discover the tools a Kubernetes MCP server
//! exposes, ask for one by name in plain text, and fold the result back into
//! the conversation.
//!
//! # Modules
//!
//! - `mcp` - JSON-RPC protocol, pipe and network transports, tool catalog
//! - `llm` - Chat backend client and `TOOL:` / `ARGS:` directive parser
//! - `agent` - Conversation controller, history, result display
//! - `repl` - Interruptible terminal input loop
//! - `metrics` - Prometheus metrics for observability
//! - `telemetry` - Logging and OpenTelemetry export
//! - `error` - Shared error classification
//!
//! # Quick Start
//!
//! ```ignore
//! use kubebridge::agent::{ControllerConfig, ConversationController};
//! use kubebridge::llm::{ChatClient, ChatConfig};
//! use kubebridge::mcp::{HttpConfig, HttpTransport, McpClient, ServerCommand};
//!
//! let command = ServerCommand::network("k8s-mcp-server", "streamable-http", 8080);
//! let transport = HttpTransport::connect(HttpConfig::default(), &command).await?;
//! let agent = ChatClient::new(ChatConfig::default())?;
//!
//! let mut controller = ConversationController::start(
//!     Box::new(agent),
//!     McpClient::new(Box::new(transport)),
//!     ControllerConfig::default(),
//!     Box::new(std::io::stdout()),
//! )
//! .await?;
//!
//! controller.handle_input("list pods in gsoc namespace").await;
//! controller.shutdown().await;
//! ```

pub mod agent;
pub mod error;
pub mod llm;
pub mod mcp;
pub mod metrics;
pub mod repl;
pub mod telemetry;

// Re-export commonly used types at crate root for convenience
pub use agent::{ControllerConfig, ConversationController, TurnOutcome};
pub use error::ErrorKind;
pub use mcp::{McpClient, ToolCatalog, Transport};
