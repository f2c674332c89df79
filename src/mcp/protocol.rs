//! JSON-RPC 2.0 message shapes used on the wire with the tool server
//!
//! Requests are built by [`McpClient`](super::McpClient), which assigns ids.
//! Responses are decoded leniently from raw JSON so that a shape the client
//! does not understand can still be shown to the user as text.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Protocol version string carried by every request
pub const JSONRPC_VERSION: &str = "2.0";

/// The two methods this client speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcMethod {
    #[serde(rename = "tools/list")]
    List,
    #[serde(rename = "tools/call")]
    Call,
}

impl RpcMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RpcMethod::List => "tools/list",
            RpcMethod::Call => "tools/call",
        }
    }
}

impl std::fmt::Display for RpcMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single request sent to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: RpcMethod,
    pub params: Value,
}

impl RpcRequest {
    /// `tools/list` with empty params
    pub fn list(id: u64) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: RpcMethod::List,
            params: json!({}),
        }
    }

    /// `tools/call` for `name` with the given argument object
    pub fn call(id: u64, name: &str, arguments: Map<String, Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: RpcMethod::Call,
            params: json!({
                "name": name,
                "arguments": Value::Object(arguments),
            }),
        }
    }

    /// Encode as a single line of JSON (no trailing newline)
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Error object reported by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
}

/// What the response carries
#[derive(Debug, Clone, PartialEq)]
pub enum RpcPayload {
    Result(Value),
    Error(RpcErrorObject),
    /// Neither `result` nor `error`: a protocol violation
    Missing,
}

/// A decoded response, keeping the raw JSON for degraded display
#[derive(Debug, Clone, PartialEq)]
pub struct RpcResponse {
    pub id: Option<u64>,
    pub payload: RpcPayload,
    raw: Value,
}

impl RpcResponse {
    /// Decode a response from an already-parsed JSON value.
    ///
    /// Never fails: anything unexpected ends up as [`RpcPayload::Missing`]
    /// or as an error object with an empty message.
    pub fn from_value(raw: Value) -> Self {
        let id = raw.get("id").and_then(Value::as_u64);

        let payload = match (raw.get("error"), raw.get("result")) {
            (Some(err), _) if !err.is_null() => {
                let error = serde_json::from_value::<RpcErrorObject>(err.clone())
                    .unwrap_or_else(|_| RpcErrorObject {
                        code: None,
                        message: err.to_string(),
                    });
                RpcPayload::Error(error)
            }
            (_, Some(result)) if !result.is_null() => RpcPayload::Result(result.clone()),
            _ => RpcPayload::Missing,
        };

        Self { id, payload, raw }
    }

    /// A successful response, mainly for test doubles
    pub fn success(id: u64, result: Value) -> Self {
        Self::from_value(json!({"jsonrpc": JSONRPC_VERSION, "id": id, "result": result}))
    }

    /// An error response, mainly for test doubles
    pub fn failure(id: u64, message: impl Into<String>) -> Self {
        Self::from_value(json!({
            "jsonrpc": JSONRPC_VERSION,
            "id": id,
            "error": {"message": message.into()}
        }))
    }

    /// The raw JSON as received
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// The raw JSON rendered as a string
    pub fn raw_text(&self) -> String {
        self.raw.to_string()
    }

    /// Extract the `tools` array of a discovery response
    pub fn tools(&self) -> Option<Vec<ToolDescriptor>> {
        match &self.payload {
            RpcPayload::Result(result) => {
                let tools = result.get("tools")?.as_array()?;
                Some(tools.iter().filter_map(ToolDescriptor::from_value).collect())
            }
            _ => None,
        }
    }

    /// Interpret the response of a `tools/call` request
    pub fn tool_output(&self) -> ToolOutput {
        match &self.payload {
            RpcPayload::Error(err) => ToolOutput::ServerError(err.message.clone()),
            RpcPayload::Result(result) => match result
                .get("content")
                .and_then(|c| c.get(0))
                .and_then(|c| c.get("text"))
                .and_then(Value::as_str)
            {
                Some(text) => ToolOutput::Text(text.to_string()),
                None => ToolOutput::Mismatch(self.raw_text()),
            },
            RpcPayload::Missing => ToolOutput::Mismatch(self.raw_text()),
        }
    }
}

/// Outcome of a tool call as the server reported it
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// `result.content[0].text`
    Text(String),
    /// The server filled the `error` field
    ServerError(String),
    /// Unexpected shape; carries the raw response
    Mismatch(String),
}

impl ToolOutput {
    /// Text shown to the user and fed back to the agent
    pub fn into_text(self) -> String {
        match self {
            ToolOutput::Text(text) => text,
            ToolOutput::ServerError(message) => format!("Error: {}", message),
            ToolOutput::Mismatch(raw) => raw,
        }
    }

    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            ToolOutput::Text(_) => "ok",
            ToolOutput::ServerError(_) => "server_error",
            ToolOutput::Mismatch(_) => "protocol_mismatch",
        }
    }
}

/// A tool advertised by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default = "empty_schema")]
    pub input_schema: Value,
}

fn empty_schema() -> Value {
    json!({})
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Lenient projection from the server's JSON; entries without a name are dropped
    pub fn from_value(value: &Value) -> Option<Self> {
        let name = value.get("name")?.as_str()?.to_string();
        let description = value
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let input_schema = value
            .get("inputSchema")
            .filter(|s| !s.is_null())
            .cloned()
            .unwrap_or_else(empty_schema);
        Some(Self {
            name,
            description,
            input_schema,
        })
    }
}
