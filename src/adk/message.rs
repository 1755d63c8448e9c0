// SPDX-License-Identifier: MIT

//! Conversation messages and the tool call/result pair
//!
//! These are the only values exchanged between the model capability, the
//! tool invoker and the workflow state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Author of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(alias = "assistant")]
    Agent,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "agent",
            Role::Tool => "tool",
        }
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Value,
    pub call_id: String,
}

impl ToolCallRequest {
    pub fn new(tool_name: impl Into<String>, arguments: Value, call_id: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
            call_id: call_id.into(),
        }
    }
}

/// Outcome of one tool call, paired with its request by `call_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub payload: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(call_id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            payload: payload.into(),
            is_error: false,
        }
    }

    pub fn error(call_id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            payload: payload.into(),
            is_error: true,
        }
    }
}

/// One entry of the append-only message log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    /// Node that produced the message, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// Position in the log; assigned on merge
    #[serde(default)]
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    /// Tool calls requested alongside an agent message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    /// For tool messages, the call this result answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(default)]
    pub is_error: bool,
}

impl ConversationMessage {
    pub fn new(role: Role, content: impl Into<String>, origin: Option<&str>) -> Self {
        Self {
            role,
            content: content.into(),
            origin: origin.map(str::to_string),
            sequence: 0,
            timestamp: Utc::now(),
            tool_calls: Vec::new(),
            call_id: None,
            is_error: false,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, None)
    }

    pub fn agent(content: impl Into<String>, origin: &str) -> Self {
        Self::new(Role::Agent, content, Some(origin))
    }

    /// Agent message carrying the tool calls it requested
    pub fn agent_with_calls(
        content: impl Into<String>,
        origin: &str,
        tool_calls: Vec<ToolCallRequest>,
    ) -> Self {
        let mut msg = Self::agent(content, origin);
        msg.tool_calls = tool_calls;
        msg
    }

    /// Tool message recording a result
    pub fn tool(result: &ToolResult, origin: &str) -> Self {
        let mut msg = Self::new(Role::Tool, result.payload.clone(), Some(origin));
        msg.call_id = Some(result.call_id.clone());
        msg.is_error = result.is_error;
        msg
    }
}
