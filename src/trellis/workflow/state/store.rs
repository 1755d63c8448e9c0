// SPDX-License-Identifier: MIT

//! Workflow state and the merge operation
//!
//! Nodes never touch a `WorkflowState` directly. They return a [`StateDelta`]
//! and the executor folds it in with [`WorkflowState::merge`], which builds a
//! new value and leaves the base untouched.

use super::fields::{AgentKind, BookingRecord, RoutingDecision};
use crate::adk::message::{ConversationMessage, Role};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Runtime state threaded through one workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Fixed at creation
    pub session_id: String,
    /// Append-only conversation log
    pub messages: Vec<ConversationMessage>,
    #[serde(default)]
    pub current_query: String,
    #[serde(default)]
    pub current_agent: Option<AgentKind>,
    #[serde(default)]
    pub routing: Option<RoutingDecision>,
    #[serde(default)]
    pub booking: Option<BookingRecord>,
    #[serde(default)]
    pub final_answer: Option<String>,
    #[serde(default)]
    pub is_complete: bool,
    /// Set when the hop limit stopped the run
    #[serde(default)]
    pub truncated: bool,
    /// A specialist asked to be routed again
    #[serde(default)]
    pub reroute_requested: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    /// Agent-specific scratch data
    #[serde(default)]
    pub extensions: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update returned by a node
///
/// `messages` are appended. Every `Some` field overwrites, `None` keeps the
/// prior value. Extension keys are inserted one by one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDelta {
    pub messages: Vec<ConversationMessage>,
    pub current_query: Option<String>,
    pub current_agent: Option<AgentKind>,
    pub routing: Option<RoutingDecision>,
    pub booking: Option<BookingRecord>,
    pub final_answer: Option<String>,
    pub is_complete: Option<bool>,
    pub truncated: Option<bool>,
    pub reroute_requested: Option<bool>,
    pub error_message: Option<String>,
    pub extensions: HashMap<String, Value>,
    /// Clear per-turn fields before applying the rest of the delta
    pub reset_turn: bool,
}

impl StateDelta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delta that starts a new user turn on a fresh or resumed state
    pub fn user_turn(query: &str) -> Self {
        Self {
            messages: vec![ConversationMessage::user(query)],
            current_query: Some(query.to_string()),
            reset_turn: true,
            ..Self::default()
        }
    }

    pub fn message(mut self, message: ConversationMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn messages(mut self, messages: impl IntoIterator<Item = ConversationMessage>) -> Self {
        self.messages.extend(messages);
        self
    }

    pub fn agent(mut self, agent: AgentKind) -> Self {
        self.current_agent = Some(agent);
        self
    }

    pub fn routing(mut self, decision: RoutingDecision) -> Self {
        self.routing = Some(decision);
        self
    }

    pub fn booking(mut self, record: BookingRecord) -> Self {
        self.booking = Some(record);
        self
    }

    pub fn final_answer(mut self, answer: impl Into<String>) -> Self {
        self.final_answer = Some(answer.into());
        self
    }

    pub fn complete(mut self, complete: bool) -> Self {
        self.is_complete = Some(complete);
        self
    }

    pub fn truncated(mut self, truncated: bool) -> Self {
        self.truncated = Some(truncated);
        self
    }

    pub fn reroute(mut self, reroute: bool) -> Self {
        self.reroute_requested = Some(reroute);
        self
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn extension(mut self, key: &str, value: Value) -> Self {
        self.extensions.insert(key.to_string(), value);
        self
    }
}

impl WorkflowState {
    /// Create an empty state for a session
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            messages: Vec::new(),
            current_query: String::new(),
            current_agent: None,
            routing: None,
            booking: None,
            final_answer: None,
            is_complete: false,
            truncated: false,
            reroute_requested: false,
            error_message: None,
            extensions: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Fold a delta into a copy of this state
    pub fn merge(&self, delta: StateDelta) -> WorkflowState {
        let mut next = self.clone();

        if delta.reset_turn {
            next.final_answer = None;
            next.is_complete = false;
            next.truncated = false;
            next.reroute_requested = false;
            next.error_message = None;
            next.routing = None;
        }

        let base_len = next.messages.len() as u64;
        next.messages
            .extend(delta.messages.into_iter().enumerate().map(|(i, mut msg)| {
                msg.sequence = base_len + i as u64;
                msg
            }));

        if let Some(query) = delta.current_query {
            next.current_query = query;
        }
        if let Some(agent) = delta.current_agent {
            next.current_agent = Some(agent);
        }
        if let Some(routing) = delta.routing {
            next.routing = Some(routing);
        }
        if let Some(booking) = delta.booking {
            next.booking = Some(booking);
        }
        if let Some(answer) = delta.final_answer {
            next.final_answer = Some(answer);
        }
        if let Some(complete) = delta.is_complete {
            next.is_complete = complete;
        }
        if let Some(truncated) = delta.truncated {
            next.truncated = truncated;
        }
        if let Some(reroute) = delta.reroute_requested {
            next.reroute_requested = reroute;
        }
        if let Some(error) = delta.error_message {
            next.error_message = Some(error);
        }
        next.extensions.extend(delta.extensions);

        next.updated_at = Utc::now().max(self.updated_at);
        next
    }

    /// Append one message
    pub fn append_message(&self, role: Role, content: &str, origin: Option<&str>) -> WorkflowState {
        self.merge(StateDelta::new().message(ConversationMessage::new(role, content, origin)))
    }

    /// Most recent user message text
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }

    /// Typed read of an extension entry; absent or mistyped reads as `None`
    pub fn extension<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.extensions
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}
