//! Tool server integration (Model Context Protocol over JSON-RPC)
//!
//! # Architecture
//!
//! ```text
//! ToolCatalog / ConversationController
//!                  ↓
//!            McpClient (ids, tools/list, tools/call)
//!                  ↓
//!         Box<dyn Transport>
//!          ↙              ↘
//!  PipeTransport        HttpTransport
//!  (stdin/stdout of     (POST /mcp, probe +
//!   a spawned server)    spawn-or-reuse)
//! ```

pub mod catalog;
pub mod client;
pub mod http;
pub mod pipe;
pub mod process;
pub mod protocol;
pub mod transport;

pub use catalog::{CatalogError, ToolCatalog, ToolSummary};
pub use client::McpClient;
pub use http::{HttpConfig, HttpTransport, ServerLaunch};
pub use pipe::{PipeConfig, PipeTransport};
pub use process::{ServerCommand, ServerProcess};
pub use protocol::{RpcMethod, RpcRequest, RpcResponse, ToolDescriptor, ToolOutput};
pub use transport::{Transport, TransportError};
