//! Conversation Controller - per-turn orchestration of agent and tool server
//!
//! Each user turn goes through:
//!
//! ```text
//! IDLE → AWAITING_COMPLETION ─┬─ plain reply ──────────────────────────────→ IDLE
//!                             ├─ directive → TOOL_EXECUTING
//!                             │              → AWAITING_INTERPRETATION ───→ IDLE
//!                             └─ malformed directive (reported) ──────────→ IDLE
//! ```
//!
//! The controller is the only owner of the conversation history.

use std::io::Write;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::display::format_result;
use super::history::{ConversationContext, ConversationTurn};
use super::prompt::build_system_prompt;
use crate::error::ErrorKind;
use crate::llm::{parse_directive, ChatBackend, ChatError, Directive, ParsedReply};
use crate::mcp::{CatalogError, McpClient, ToolCatalog, ToolOutput, TransportError};
use crate::metrics::{DIRECTIVES, TOOL_CALLS};

/// Configuration for the conversation controller
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Character budget for a tool result stored in history
    pub result_budget: usize,
    /// List entries shown before "... and N more"
    pub display_item_cap: usize,
    /// Characters of non-JSON tool output shown
    pub display_text_cap: usize,
    /// Inputs that end the session (case-insensitive)
    pub exit_keywords: Vec<String>,
    /// Synthetic user turn asking the agent to explain a tool result
    pub interpretation_request: String,
    /// Custom preamble for the system prompt (uses default if None)
    pub system_prompt: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            result_budget: 500,
            display_item_cap: 15,
            display_text_cap: 1000,
            exit_keywords: vec!["exit".to_string(), "quit".to_string(), "bye".to_string()],
            interpretation_request: "Please summarize what we found in a natural way.".to_string(),
            system_prompt: None,
        }
    }
}

/// Failure to start a session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to load tools: {0}")]
    Catalog(#[from] CatalogError),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Catalog(e) => e.kind(),
        }
    }
}

/// Failure inside one turn; reported to the user, never fatal
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("Agent request failed: {0}")]
    Agent(#[from] ChatError),

    #[error("Tool call failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Malformed tool directive: {reason} (args: {payload})")]
    Directive { reason: String, payload: String },
}

impl TurnError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TurnError::Agent(e) => e.kind(),
            TurnError::Transport(e) => e.kind(),
            TurnError::Directive { .. } => ErrorKind::DirectiveMalformed,
        }
    }
}

/// A tool call requested by the agent together with what the server returned
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub arguments: Map<String, Value>,
    pub raw_result_text: String,
}

/// What happened to one line of user input
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Exit keyword; the caller should end the session
    Exit,
    /// Blank input, nothing sent
    Skipped,
    /// Agent answered without a directive
    Replied,
    /// A tool ran and the agent interpreted its result
    ToolExecuted { tool: String, output: &'static str },
    /// The turn failed; the session continues
    Failed(ErrorKind),
}

/// Conversation Controller orchestrating agent queries and tool calls
pub struct ConversationController {
    agent: Box<dyn ChatBackend>,
    client: McpClient,
    catalog: ToolCatalog,
    context: ConversationContext,
    config: ControllerConfig,
    output: Box<dyn Write + Send>,
    session_id: String,
}

impl ConversationController {
    /// Discover tools and build the system instructions.
    ///
    /// Discovery failure is fatal: the client is shut down (reaping any
    /// server it spawned) and the error is returned.
    ///
    /// # Arguments
    /// * `agent` - Language-model backend
    /// * `client` - Tool server client over either transport
    /// * `config` - Controller configuration
    /// * `output` - Where user-visible text is written
    pub async fn start(
        agent: Box<dyn ChatBackend>,
        mut client: McpClient,
        config: ControllerConfig,
        output: Box<dyn Write + Send>,
    ) -> Result<Self, SessionError> {
        let catalog = match ToolCatalog::discover(&mut client).await {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(error = %e, "Tool discovery failed");
                client.shutdown().await;
                return Err(e.into());
            }
        };

        Ok(Self::new(agent, client, catalog, config, output))
    }

    /// Build a session around an already discovered catalog
    pub fn new(
        agent: Box<dyn ChatBackend>,
        client: McpClient,
        catalog: ToolCatalog,
        config: ControllerConfig,
        output: Box<dyn Write + Send>,
    ) -> Self {
        let session_id = Uuid::now_v7().to_string();
        let system_prompt = build_system_prompt(config.system_prompt.as_deref(), &catalog);
        let context = ConversationContext::new(system_prompt, config.result_budget);

        info!(
            session_id = %session_id,
            tools = catalog.len(),
            model = %agent.model(),
            transport = client.transport_name(),
            "Session started"
        );

        Self {
            agent,
            client,
            catalog,
            context,
            config,
            output,
            session_id,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// Conversation so far, system turn first
    pub fn history(&self) -> &[ConversationTurn] {
        self.context.turns()
    }

    /// Print the welcome banner
    pub fn greet(&mut self) {
        let rule = "=".repeat(60);
        let banner = format!(
            "\n{rule}\n💬 K8s Chat with {model} + MCP Server\n{rule}\n✅ Loaded {count} Kubernetes tools\n\n\
             💡 Examples:\n  • List all pods in the gsoc namespace\n  • Show me the API resources\n  \
             • Describe the xyz pod in gsoc namespace\n  • What deployments are running?\n\n\
             Type 'exit' or 'quit' to end the conversation\n",
            rule = rule,
            model = self.agent.model(),
            count = self.catalog.len(),
        );
        self.say(&banner);
    }

    /// Print the closing line
    pub fn farewell(&mut self) {
        self.say("👋 Goodbye!");
    }

    fn is_exit(&self, input: &str) -> bool {
        self.config
            .exit_keywords
            .iter()
            .any(|k| k.eq_ignore_ascii_case(input))
    }

    /// Handle one line of user input
    pub async fn handle_input(&mut self, input: &str) -> TurnOutcome {
        let input = input.trim();
        if input.is_empty() {
            return TurnOutcome::Skipped;
        }
        if self.is_exit(input) {
            self.farewell();
            return TurnOutcome::Exit;
        }

        let span = info_span!(
            "turn",
            session_id = %self.session_id,
            turn = self.context.len(),
            otel.name = "conversation_turn"
        );

        match self.run_turn(input).instrument(span).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(session_id = %self.session_id, kind = %e.kind(), error = %e, "Turn failed");
                self.say(&format!("❌ {}\n", e));
                TurnOutcome::Failed(e.kind())
            }
        }
    }

    async fn run_turn(&mut self, input: &str) -> Result<TurnOutcome, TurnError> {
        self.context.push_user(input);

        let reply = self.agent.complete(self.context.turns()).await?;

        let parsed = parse_directive(&reply);
        DIRECTIVES.with_label_values(&[parsed.label()]).inc();

        match parsed {
            ParsedReply::Plain => {
                self.say(&format!("\n🤖 Assistant: {}\n", reply));
                self.context.push_assistant(reply);
                Ok(TurnOutcome::Replied)
            }
            ParsedReply::Malformed { reason, payload } => {
                Err(TurnError::Directive { reason, payload })
            }
            ParsedReply::Invocation(directive) => self.execute(directive).await,
        }
    }

    async fn execute(&mut self, directive: Directive) -> Result<TurnOutcome, TurnError> {
        let Directive {
            tool_name,
            arguments,
        } = directive;

        if !self.catalog.contains(&tool_name) {
            warn!(tool = %tool_name, "Agent asked for a tool the server did not advertise");
        }

        self.say(&format!(
            "\n🔧 Executing: {}({})",
            tool_name,
            Value::Object(arguments.clone())
        ));

        let output = match self.client.call_tool(&tool_name, arguments.clone()).await {
            Ok(output) => output,
            Err(e) => {
                TOOL_CALLS.with_label_values(&[tool_name.as_str(), e.kind().as_str()]).inc();
                return Err(e.into());
            }
        };

        let label = output.label();
        TOOL_CALLS.with_label_values(&[tool_name.as_str(), label]).inc();
        match &output {
            ToolOutput::ServerError(message) => {
                warn!(tool = %tool_name, kind = %ErrorKind::ToolExecutionError, error = %message, "Tool reported an error")
            }
            ToolOutput::Mismatch(_) => {
                warn!(tool = %tool_name, kind = %ErrorKind::ProtocolMismatch, "Unexpected tool response shape, showing raw")
            }
            ToolOutput::Text(_) => info!(tool = %tool_name, "Tool call succeeded"),
        }

        let invocation = ToolInvocation {
            tool_name,
            arguments,
            raw_result_text: output.into_text(),
        };

        self.say(&format!(
            "\n📋 Results:\n{}",
            format_result(
                &invocation.raw_result_text,
                self.config.display_item_cap,
                self.config.display_text_cap
            )
        ));

        self.context
            .push_tool_result(&invocation.tool_name, &invocation.raw_result_text);
        self.context.push_user(self.config.interpretation_request.clone());

        let interpretation = self.agent.complete(self.context.turns()).await?;
        self.say(&format!("\n🤖 Assistant: {}\n", interpretation));
        self.context.push_assistant(interpretation);

        Ok(TurnOutcome::ToolExecuted {
            tool: invocation.tool_name,
            output: label,
        })
    }

    /// Release the tool server; every exit path ends here
    pub async fn shutdown(&mut self) {
        info!(session_id = %self.session_id, turns = self.context.len(), "Session ending");
        self.client.shutdown().await;
    }

    fn say(&mut self, text: &str) {
        let result = writeln!(self.output, "{}", text).and_then(|_| self.output.flush());
        if let Err(e) = result {
            warn!(error = %e, "Failed to write to output");
        }
    }
}
