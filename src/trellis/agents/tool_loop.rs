// SPDX-License-Identifier: MIT

//! Single-agent tool loop
//!
//! ```text
//! agent --(tool calls)--> tools --> agent
//!   \--(final answer)--> finalize
//! ```

use super::finalizer::{FinalizerNode, FINALIZE_NODE};
use crate::adk::agent::AgentEvent;
use crate::adk::error::{GraphError, TrellisError};
use crate::adk::model::ModelCaller;
use crate::trellis::workflow::graph::{CompiledGraph, GraphBuilder, Node, RouteLabel, RunContext};
use crate::trellis::workflow::registry::ToolRegistry;
use crate::trellis::workflow::state::{ConversationMessage, Role, StateDelta, ToolCallRequest, WorkflowState};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

pub const AGENT_NODE: &str = "agent";
pub const TOOLS_NODE: &str = "tools";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a research assistant. Decide which tools to use (if any) to answer the user. \
Use web search for fresh information, fetch a page only when you need details from a specific source, \
and use the data query tool when structured statistics are relevant. Do not call tools unnecessarily. \
Answer concisely and list the URLs you relied on.";

/// Apology appended when the model cannot be reached
pub const MODEL_FAILURE_MESSAGE: &str =
    "I'm sorry, but I couldn't reach the language model to finish answering your question. Please try again in a moment.";

/// Where the agent node goes next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentRoute {
    Tools,
    Finalize,
}

impl RouteLabel for AgentRoute {
    const ALL: &'static [Self] = &[AgentRoute::Tools, AgentRoute::Finalize];

    fn as_str(&self) -> &'static str {
        match self {
            AgentRoute::Tools => "tools",
            AgentRoute::Finalize => "finalize",
        }
    }
}

/// Go to `tools` only while the latest message is an agent turn with
/// pending tool calls and nothing has failed.
pub fn route_after_agent(state: &WorkflowState) -> AgentRoute {
    if state.is_complete || state.error_message.is_some() {
        return AgentRoute::Finalize;
    }
    match state.messages.last() {
        Some(last) if last.role == Role::Agent && !last.tool_calls.is_empty() => AgentRoute::Tools,
        _ => AgentRoute::Finalize,
    }
}

/// Make every call id in one turn non-empty and unique. Generated ids are
/// `call_{scope}_{index}`, so callers pass a scope unique within the run.
pub fn assign_call_ids(calls: Vec<ToolCallRequest>, scope: &str) -> Vec<ToolCallRequest> {
    let mut seen = HashSet::new();
    calls
        .into_iter()
        .enumerate()
        .map(|(i, mut call)| {
            if call.call_id.is_empty() || seen.contains(&call.call_id) {
                call.call_id = format!("call_{}_{}", scope, i);
            }
            seen.insert(call.call_id.clone());
            call
        })
        .collect()
}

/// Calls the model with the conversation and the registered tools
pub struct AgentNode {
    id: String,
    caller: ModelCaller,
    registry: ToolRegistry,
    system_prompt: String,
}

impl AgentNode {
    pub fn new(caller: ModelCaller, registry: ToolRegistry, system_prompt: impl Into<String>) -> Self {
        Self {
            id: AGENT_NODE.to_string(),
            caller,
            registry,
            system_prompt: system_prompt.into(),
        }
    }
}

#[async_trait]
impl Node for AgentNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, state: &WorkflowState, ctx: &RunContext) -> Result<StateDelta, TrellisError> {
        let tools = self.registry.signatures().await;

        let response = match self.caller.call(&self.system_prompt, &state.messages, &tools).await {
            Ok(response) => response,
            Err(e) => {
                log::error!("Agent model call failed on hop {}: {}", ctx.hop, e);
                return Ok(StateDelta::new()
                    .message(ConversationMessage::agent(MODEL_FAILURE_MESSAGE, &self.id))
                    .error(e.to_string())
                    .complete(true));
            }
        };

        if response.tool_calls.is_empty() {
            log::info!("Agent produced a final answer on hop {}", ctx.hop);
            return Ok(StateDelta::new().message(ConversationMessage::agent(response.content.trim(), &self.id)));
        }

        let calls = assign_call_ids(response.tool_calls, &ctx.hop.to_string());
        for call in &calls {
            log::info!("Agent requested tool '{}' ({})", call.tool_name, call.call_id);
            ctx.emit(AgentEvent::ToolCall {
                name: call.tool_name.clone(),
                call_id: call.call_id.clone(),
                args: call.arguments.clone(),
            })
            .await;
        }

        Ok(StateDelta::new().message(ConversationMessage::agent_with_calls(
            response.content.trim(),
            &self.id,
            calls,
        )))
    }
}

/// Executes the tool calls of the latest agent message
pub struct ToolsNode {
    id: String,
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolsNode {
    pub fn new(registry: ToolRegistry, timeout: Duration) -> Self {
        Self {
            id: TOOLS_NODE.to_string(),
            registry,
            timeout,
        }
    }
}

#[async_trait]
impl Node for ToolsNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, state: &WorkflowState, ctx: &RunContext) -> Result<StateDelta, TrellisError> {
        let pending: &[ToolCallRequest] = match state.messages.last() {
            Some(last) if last.role == Role::Agent => last.tool_calls.as_slice(),
            _ => &[],
        };
        if pending.is_empty() {
            log::warn!("Tools node reached without pending tool calls");
            return Ok(StateDelta::new());
        }

        let results = self.registry.invoke_all(pending, self.timeout).await;
        let mut messages = Vec::with_capacity(results.len());
        for result in &results {
            ctx.emit(AgentEvent::ToolResult {
                call_id: result.call_id.clone(),
                is_error: result.is_error,
                payload: result.payload.clone(),
            })
            .await;
            messages.push(ConversationMessage::tool(result, &self.id));
        }

        Ok(StateDelta::new().messages(messages))
    }
}

/// Build the agent/tools/finalize loop
pub fn tool_loop_graph(
    caller: ModelCaller,
    registry: ToolRegistry,
    system_prompt: &str,
    tool_timeout: Duration,
    finalize_window: usize,
    max_hops: usize,
) -> Result<CompiledGraph, GraphError> {
    GraphBuilder::new("tool_loop")
        .add_node(Arc::new(AgentNode::new(caller, registry.clone(), system_prompt)))
        .add_node(Arc::new(ToolsNode::new(registry, tool_timeout)))
        .add_node(Arc::new(FinalizerNode::new(finalize_window)))
        .set_entry(AGENT_NODE)
        .add_conditional_edges(
            AGENT_NODE,
            route_after_agent,
            &[(AgentRoute::Tools, TOOLS_NODE), (AgentRoute::Finalize, FINALIZE_NODE)],
        )
        .add_edge(TOOLS_NODE, AGENT_NODE)
        .set_finalizer(FINALIZE_NODE)
        .max_hops(max_hops)
        .compile()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::{ModelError, ToolError};
    use crate::adk::message::ToolResult;
    use crate::adk::model::{Model, ModelResponse};
    use crate::adk::tool::{Tool, ToolArgs, ToolSchema, ToolSignature};
    use crate::trellis::workflow::graph::{RunOptions, RunStatus};
    use once_cell::sync::Lazy;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Replays scripted responses, then errors
    struct ScriptedModel {
        responses: Mutex<Vec<Result<ModelResponse, ModelError>>>,
        seen: Mutex<Vec<usize>>,
    }

    impl ScriptedModel {
        fn new(responses: Vec<Result<ModelResponse, ModelError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Model for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn invoke(
            &self,
            _system: &str,
            messages: &[ConversationMessage],
            _tools: &[ToolSignature],
        ) -> Result<ModelResponse, ModelError> {
            self.seen.lock().unwrap().push(messages.len());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(ModelError::ApiKeyMissing("script exhausted".to_string()));
            }
            responses.remove(0)
        }
    }

    static DATE_SCHEMA: Lazy<ToolSchema> = Lazy::new(ToolSchema::empty);

    struct FixedDate;

    #[async_trait]
    impl Tool for FixedDate {
        fn name(&self) -> &str {
            "current_datetime"
        }

        fn description(&self) -> &str {
            "Fixed date"
        }

        fn schema(&self) -> &ToolSchema {
            &DATE_SCHEMA
        }

        async fn execute(&self, _args: ToolArgs) -> Result<Value, ToolError> {
            Ok(json!({"date": "2025-01-01"}))
        }
    }

    async fn graph(model: ScriptedModel, retries: u32, max_hops: usize) -> CompiledGraph {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(FixedDate)).await;
        let caller = ModelCaller::new(Arc::new(model), Duration::from_secs(1), retries, Duration::from_millis(1));
        tool_loop_graph(caller, registry, DEFAULT_SYSTEM_PROMPT, Duration::from_secs(1), 3, max_hops).unwrap()
    }

    fn start(query: &str) -> WorkflowState {
        WorkflowState::new("s").merge(StateDelta::user_turn(query))
    }

    #[test]
    fn test_assign_call_ids() {
        let calls = vec![
            ToolCallRequest::new("a", json!({}), ""),
            ToolCallRequest::new("b", json!({}), "x"),
            ToolCallRequest::new("c", json!({}), "x"),
        ];
        let ids: Vec<String> = assign_call_ids(calls, "4").into_iter().map(|c| c.call_id).collect();
        assert_eq!(ids, vec!["call_4_0", "x", "call_4_2"]);
    }

    #[test]
    fn test_route_after_agent() {
        let state = start("q");
        assert_eq!(route_after_agent(&state), AgentRoute::Finalize);

        let with_calls = state.merge(StateDelta::new().message(ConversationMessage::agent_with_calls(
            "",
            AGENT_NODE,
            vec![ToolCallRequest::new("current_datetime", Value::Null, "c1")],
        )));
        assert_eq!(route_after_agent(&with_calls), AgentRoute::Tools);
        assert_eq!(
            route_after_agent(&with_calls.merge(StateDelta::new().error("boom"))),
            AgentRoute::Finalize
        );
    }

    #[tokio::test]
    async fn test_tool_round_trip() {
        let model = ScriptedModel::new(vec![
            Ok(ModelResponse::calls(vec![ToolCallRequest::new(
                "current_datetime",
                json!({}),
                "call_1",
            )])),
            Ok(ModelResponse::text("Today is 2025-01-01.")),
        ]);
        let out = graph(model, 0, 15)
            .await
            .execute(start("What is the date?"), RunOptions::default())
            .await
            .unwrap();

        let roles: Vec<Role> = out.state.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Agent, Role::Tool, Role::Agent]);
        assert_eq!(out.state.messages[2].call_id.as_deref(), Some("call_1"));
        assert_eq!(out.state.final_answer.as_deref(), Some("Today is 2025-01-01."));
        assert_eq!(out.status, RunStatus::Completed);
        assert_eq!(out.hops, 4);
    }

    #[tokio::test]
    async fn test_model_failure_is_reported() {
        let model = ScriptedModel::new(vec![
            Err(ModelError::Request("503".to_string())),
            Err(ModelError::Request("503".to_string())),
        ]);
        let out = graph(model, 1, 15)
            .await
            .execute(start("hi"), RunOptions::default())
            .await
            .unwrap();

        assert!(matches!(out.status, RunStatus::Failed(ref reason) if reason.contains("2 attempts")));
        assert!(out.state.is_complete);
        assert_eq!(out.state.final_answer.as_deref(), Some(MODEL_FAILURE_MESSAGE));
    }

    #[tokio::test]
    async fn test_tools_node_without_pending_calls_is_noop() {
        let node = ToolsNode::new(ToolRegistry::new(), Duration::from_secs(1));
        let delta = node.run(&start("q"), &RunContext::new(15)).await.unwrap();
        assert!(delta.messages.is_empty());
    }

    #[tokio::test]
    async fn test_tool_results_follow_request_order() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(FixedDate)).await;
        let node = ToolsNode::new(registry, Duration::from_secs(1));
        let state = start("q").merge(StateDelta::new().message(ConversationMessage::agent_with_calls(
            "",
            AGENT_NODE,
            vec![
                ToolCallRequest::new("current_datetime", json!({}), "b"),
                ToolCallRequest::new("missing", json!({}), "a"),
            ],
        )));

        let delta = node.run(&state, &RunContext::new(15)).await.unwrap();
        let results: Vec<ToolResult> = delta
            .messages
            .iter()
            .map(|m| ToolResult {
                call_id: m.call_id.clone().unwrap(),
                payload: m.content.clone(),
                is_error: m.is_error,
            })
            .collect();
        assert_eq!(results[0].call_id, "b");
        assert!(!results[0].is_error);
        assert_eq!(results[1].call_id, "a");
        assert!(results[1].is_error);
        assert_eq!(results[1].payload, "unknown tool 'missing'");
    }
}
