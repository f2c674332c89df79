//! Session-level client: assigns request ids and speaks the two tool methods

use std::time::Instant;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::protocol::{RpcPayload, RpcRequest, RpcResponse, ToolDescriptor, ToolOutput};
use super::transport::{Transport, TransportError};
use crate::metrics::{RPC_DURATION, RPC_REQUESTS};

/// Wraps a transport with per-session id assignment and response correlation
pub struct McpClient {
    transport: Box<dyn Transport>,
    next_id: u64,
}

impl McpClient {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            next_id: 1,
        }
    }

    /// Name of the underlying transport
    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    async fn request(&mut self, request: RpcRequest) -> Result<RpcResponse, TransportError> {
        let method = request.method;
        let start = Instant::now();

        let result = self.transport.send(&request).await;

        RPC_DURATION
            .with_label_values(&[method.as_str()])
            .observe(start.elapsed().as_secs_f64());
        let status = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind().as_str(),
        };
        RPC_REQUESTS.with_label_values(&[method.as_str(), status]).inc();

        let response = result?;
        if response.id != Some(request.id) {
            warn!(expected = request.id, got = ?response.id, %method, "Response id does not match request");
            return Err(TransportError::ProtocolMismatch {
                raw: response.raw_text(),
            });
        }
        debug!(id = request.id, %method, "Request correlated");
        Ok(response)
    }

    /// `tools/list`; a result without a `tools` array is a protocol mismatch
    pub async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>, TransportError> {
        let id = self.allocate_id();
        let response = self.request(RpcRequest::list(id)).await?;

        match response.tools() {
            Some(tools) => Ok(tools),
            None => {
                let raw = match &response.payload {
                    RpcPayload::Error(err) => format!("Error: {}", err.message),
                    _ => response.raw_text(),
                };
                Err(TransportError::ProtocolMismatch { raw })
            }
        }
    }

    /// `tools/call`; server errors and odd shapes come back as [`ToolOutput`] variants
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolOutput, TransportError> {
        let id = self.allocate_id();
        let response = self.request(RpcRequest::call(id, name, arguments)).await?;
        Ok(response.tool_output())
    }

    /// Release the transport's resources
    pub async fn shutdown(&mut self) {
        self.transport.shutdown().await;
    }
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("transport", &self.transport.name())
            .field("next_id", &self.next_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::RpcMethod;
    use crate::error::ErrorKind;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// Records every request and answers from a fixed closure
    struct Recorder {
        seen: Arc<Mutex<Vec<RpcRequest>>>,
        reply: fn(&RpcRequest) -> RpcResponse,
    }

    #[async_trait]
    impl Transport for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        async fn send(&mut self, request: &RpcRequest) -> Result<RpcResponse, TransportError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok((self.reply)(request))
        }
    }

    fn client(reply: fn(&RpcRequest) -> RpcResponse) -> (McpClient, Arc<Mutex<Vec<RpcRequest>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let transport = Recorder {
            seen: seen.clone(),
            reply,
        };
        (McpClient::new(Box::new(transport)), seen)
    }

    #[tokio::test]
    async fn test_ids_increase_monotonically() {
        let (mut client, seen) = client(|req| {
            RpcResponse::success(req.id, json!({"content": [{"text": "x"}], "tools": []}))
        });

        client.list_tools().await.unwrap();
        client.call_tool("a", Map::new()).await.unwrap();
        client.call_tool("b", Map::new()).await.unwrap();

        let ids: Vec<u64> = seen.lock().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_foreign_id_is_mismatch() {
        let (mut client, _) = client(|req| RpcResponse::success(req.id + 100, json!({"tools": []})));
        let err = client.list_tools().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProtocolMismatch);
    }

    #[tokio::test]
    async fn test_list_without_tools_array_is_mismatch() {
        let (mut client, _) = client(|req| RpcResponse::success(req.id, json!({"items": []})));
        let err = client.list_tools().await.unwrap_err();
        assert!(matches!(err, TransportError::ProtocolMismatch { .. }));
    }

    #[tokio::test]
    async fn test_call_server_error_is_output_not_failure() {
        let (mut client, seen) = client(|req| RpcResponse::failure(req.id, "not found"));
        let output = client.call_tool("describeResource", Map::new()).await.unwrap();
        assert_eq!(output, ToolOutput::ServerError("not found".to_string()));

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].method, RpcMethod::Call);
        assert_eq!(seen[0].params["name"], "describeResource");
    }
}
