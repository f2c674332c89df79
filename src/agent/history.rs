//! Conversation context owned by the controller
//!
//! Append-only; insertion order is the order sent to the model. Synthetic
//! tool-result turns are cut to a fixed character budget when appended so
//! large tool outputs cannot grow the context without bound.

use crate::llm::chat::{ChatMessage, Role};

/// A single entry in the conversation
pub type ConversationTurn = ChatMessage;

/// Append-only conversation history
#[derive(Debug, Clone)]
pub struct ConversationContext {
    turns: Vec<ConversationTurn>,
    result_budget: usize,
}

impl ConversationContext {
    /// Start a context with the system instructions as its first turn
    pub fn new(system_prompt: impl Into<String>, result_budget: usize) -> Self {
        Self {
            turns: vec![ChatMessage::system(system_prompt)],
            result_budget,
        }
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(ChatMessage::assistant(content));
    }

    /// Record a tool result as an assistant turn.
    ///
    /// The budget caps the whole stored turn, prefix included, so the result
    /// text kept is the budget minus the `Tool <name> executed successfully.
    /// Result: ` prefix. A stored turn is never longer than the budget.
    pub fn push_tool_result(&mut self, tool_name: &str, result: &str) {
        let content = format!("Tool {} executed successfully. Result: {}", tool_name, result);
        self.turns.push(ConversationTurn {
            role: Role::Assistant,
            content: truncate_chars(&content, self.result_budget),
        });
    }
}

/// First `max_chars` characters of `s`
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
