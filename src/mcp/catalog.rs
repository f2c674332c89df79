//! Tool discovery and the per-session catalog

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use super::client::McpClient;
use super::protocol::ToolDescriptor;
use super::transport::TransportError;
use crate::error::ErrorKind;

/// Why the session could not obtain a usable tool set
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("tool discovery failed: {0}")]
    Transport(#[from] TransportError),

    #[error("tool server advertised no tools")]
    Empty,
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::Transport(e) => e.kind(),
            CatalogError::Empty => ErrorKind::ProtocolMismatch,
        }
    }
}

/// Reduced view of a tool embedded into the agent's instructions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSummary<'a> {
    pub name: &'a str,
    pub description: &'a str,
    #[serde(rename = "inputSchema")]
    pub input_schema: &'a Value,
}

/// The discovered tools for one session, in server order, unique by name
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: Vec<ToolDescriptor>,
}

impl ToolCatalog {
    /// Issue one discovery request; an empty result is fatal
    pub async fn discover(client: &mut McpClient) -> Result<Self, CatalogError> {
        let tools = client.list_tools().await?;
        let catalog = Self::from_descriptors(tools)?;
        info!(
            tools = catalog.len(),
            transport = client.transport_name(),
            "Tool catalog loaded"
        );
        Ok(catalog)
    }

    /// Build from already-fetched descriptors; later duplicates are dropped
    pub fn from_descriptors(descriptors: Vec<ToolDescriptor>) -> Result<Self, CatalogError> {
        let mut tools: Vec<ToolDescriptor> = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            if tools.iter().any(|t| t.name == descriptor.name) {
                warn!(tool = %descriptor.name, "Duplicate tool name, keeping the first");
                continue;
            }
            tools.push(descriptor);
        }

        if tools.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(Self { tools })
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter()
    }

    pub fn summaries(&self) -> Vec<ToolSummary<'_>> {
        self.tools
            .iter()
            .map(|t| ToolSummary {
                name: &t.name,
                description: &t.description,
                input_schema: &t.input_schema,
            })
            .collect()
    }

    /// Pretty-printed JSON of [`summaries`](Self::summaries)
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(&self.summaries()).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::{RpcRequest, RpcResponse};
    use crate::mcp::transport::Transport;
    use async_trait::async_trait;
    use serde_json::json;

    struct FixedTools(Value);

    #[async_trait]
    impl Transport for FixedTools {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn send(&mut self, request: &RpcRequest) -> Result<RpcResponse, TransportError> {
            Ok(RpcResponse::success(request.id, json!({"tools": self.0.clone()})))
        }
    }

    struct Down;

    #[async_trait]
    impl Transport for Down {
        fn name(&self) -> &'static str {
            "down"
        }

        async fn send(&mut self, _request: &RpcRequest) -> Result<RpcResponse, TransportError> {
            Err(TransportError::Unavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_zero_tools_fails_session_start() {
        let mut client = McpClient::new(Box::new(FixedTools(json!([]))));
        let err = ToolCatalog::discover(&mut client).await.unwrap_err();
        assert!(matches!(err, CatalogError::Empty));
    }

    #[tokio::test]
    async fn test_descriptor_count_matches_server() {
        let tools = json!([
            {"name": "listResources", "description": "List resources", "inputSchema": {"type": "object"}},
            {"name": "getAPIResources", "description": "API resources"},
            {"name": "describeResource", "description": "Describe"}
        ]);
        let mut client = McpClient::new(Box::new(FixedTools(tools)));
        let catalog = ToolCatalog::discover(&mut client).await.unwrap();

        assert_eq!(catalog.len(), 3);
        assert!(catalog.contains("describeResource"));
        assert_eq!(catalog.get("listResources").unwrap().input_schema["type"], "object");
    }

    #[tokio::test]
    async fn test_transport_failure_is_fatal() {
        let mut client = McpClient::new(Box::new(Down));
        let err = ToolCatalog::discover(&mut client).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportUnavailable);
    }

    #[test]
    fn test_duplicates_keep_first() {
        let catalog = ToolCatalog::from_descriptors(vec![
            ToolDescriptor::new("a", "first", json!({})),
            ToolDescriptor::new("a", "second", json!({})),
        ])
        .unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("a").unwrap().description, "first");
    }

    #[test]
    fn test_prompt_json_is_reduced_view() {
        let catalog = ToolCatalog::from_descriptors(vec![ToolDescriptor::new(
            "listResources",
            "List resources",
            json!({"type": "object"}),
        )])
        .unwrap();
        let parsed: Value = serde_json::from_str(&catalog.to_prompt_json()).unwrap();
        assert_eq!(parsed[0]["name"], "listResources");
        assert_eq!(parsed[0]["inputSchema"]["type"], "object");
        assert_eq!(parsed[0].as_object().unwrap().len(), 3);
    }
}
