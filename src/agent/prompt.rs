//! System instructions for the agent

use crate::llm::directive::{ARGS_MARKER, TOOL_MARKER};
use crate::mcp::ToolCatalog;

/// Default preamble describing the agent's role
pub const DEFAULT_PREAMBLE: &str =
    "You are an expert Kubernetes assistant with access to a real K8s cluster via MCP tools.";

/// Build the system prompt: preamble, tool list, directive format, hints
pub fn build_system_prompt(preamble: Option<&str>, catalog: &ToolCatalog) -> String {
    let preamble = preamble.unwrap_or(DEFAULT_PREAMBLE);

    format!(
        r#"{preamble}

Available tools:
{tools}

When users ask about Kubernetes resources:
1. Determine which tool(s) to use based on their question
2. Respond in this EXACT format:
   {tool} <tool_name>
   {args} {{"param": "value"}}

3. After tool execution, interpret the results naturally for the user

Common patterns:
- "list/show pods" → listResources with Kind="Pod"
- "get api resources" → getAPIResources
- "describe <resource>" → describeResource with Kind, name, namespace
- "what namespaces" → listResources with Kind="Namespace"

If no tool is needed (general questions), respond conversationally."#,
        preamble = preamble,
        tools = catalog.to_prompt_json(),
        tool = TOOL_MARKER,
        args = ARGS_MARKER,
    )
}
