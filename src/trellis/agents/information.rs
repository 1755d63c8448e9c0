// SPDX-License-Identifier: MIT

//! Information specialist
//!
//! Answers travel questions with a small inner tool loop. The scratch
//! conversation of that loop stays local; only the answer is appended to the
//! workflow state.

use super::tool_loop::assign_call_ids;
use crate::adk::agent::AgentEvent;
use crate::adk::error::{ModelError, TrellisError};
use crate::adk::model::ModelCaller;
use crate::trellis::workflow::graph::{Node, RunContext};
use crate::trellis::workflow::registry::ToolRegistry;
use crate::trellis::workflow::state::{ConversationMessage, StateDelta, WorkflowState};
use async_trait::async_trait;
use std::time::Duration;

pub const INFORMATION_NODE: &str = "information_agent";

const INFORMATION_PROMPT: &str = "You are a knowledgeable travel information specialist. Provide helpful, accurate \
information about destinations, travel requirements, local customs, weather, attractions and practical tips. \
Use the available tools when the question needs current facts. Keep responses informative but concise.";

pub const INFORMATION_FALLBACK_MESSAGE: &str = "I apologize, but I'm having trouble retrieving that travel information right now. \
Could you please rephrase your question or ask about a specific destination?";

pub struct InformationNode {
    caller: ModelCaller,
    registry: ToolRegistry,
    tool_timeout: Duration,
    max_rounds: usize,
}

impl InformationNode {
    pub fn new(caller: ModelCaller, registry: ToolRegistry, tool_timeout: Duration, max_rounds: usize) -> Self {
        Self {
            caller,
            registry,
            tool_timeout,
            max_rounds,
        }
    }

    /// Run up to `max_rounds` tool rounds, then insist on an answer
    async fn answer(&self, state: &WorkflowState, ctx: &RunContext) -> Result<String, ModelError> {
        let tools = self.registry.signatures().await;
        let mut scratch = vec![ConversationMessage::user(&state.current_query)];

        for round in 0..self.max_rounds {
            let response = self.caller.call(INFORMATION_PROMPT, &scratch, &tools).await?;
            if response.tool_calls.is_empty() {
                return Ok(response.content);
            }

            let calls = assign_call_ids(response.tool_calls, &format!("info_{}_{}", ctx.hop, round));
            for call in &calls {
                log::info!("Information agent requested tool '{}' ({})", call.tool_name, call.call_id);
                ctx.emit(AgentEvent::ToolCall {
                    name: call.tool_name.clone(),
                    call_id: call.call_id.clone(),
                    args: call.arguments.clone(),
                })
                .await;
            }

            let results = self.registry.invoke_all(&calls, self.tool_timeout).await;
            scratch.push(ConversationMessage::agent_with_calls(
                response.content.trim(),
                INFORMATION_NODE,
                calls,
            ));
            for result in &results {
                ctx.emit(AgentEvent::ToolResult {
                    call_id: result.call_id.clone(),
                    is_error: result.is_error,
                    payload: result.payload.clone(),
                })
                .await;
                scratch.push(ConversationMessage::tool(result, INFORMATION_NODE));
            }
        }

        log::warn!(
            "Information agent used all {} tool rounds; asking for an answer without tools",
            self.max_rounds
        );
        let response = self.caller.call(INFORMATION_PROMPT, &scratch, &[]).await?;
        Ok(response.content)
    }
}

#[async_trait]
impl Node for InformationNode {
    fn id(&self) -> &str {
        INFORMATION_NODE
    }

    async fn run(&self, state: &WorkflowState, ctx: &RunContext) -> Result<StateDelta, TrellisError> {
        let content = match self.answer(state, ctx).await {
            Ok(text) if !text.trim().is_empty() => format!("Information Agent: {}", text.trim()),
            Ok(_) => INFORMATION_FALLBACK_MESSAGE.to_string(),
            Err(e) => {
                log::warn!("Information agent failed: {}", e);
                INFORMATION_FALLBACK_MESSAGE.to_string()
            }
        };
        Ok(StateDelta::new().message(ConversationMessage::agent(content, INFORMATION_NODE)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::ToolError;
    use crate::adk::model::{Model, ModelResponse};
    use crate::adk::tool::{Tool, ToolArgs, ToolSchema, ToolSignature};
    use crate::trellis::workflow::state::ToolCallRequest;
    use once_cell::sync::Lazy;
    use serde_json::{json, Value};
    use crate::trellis::workflow::graph::RunOptions;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    /// Scripted replies; records how many tools were offered on each call
    struct Scripted {
        replies: Mutex<Vec<ModelResponse>>,
        offered: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl Model for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn invoke(
            &self,
            _system: &str,
            _messages: &[ConversationMessage],
            tools: &[ToolSignature],
        ) -> Result<ModelResponse, ModelError> {
            self.offered.lock().unwrap().push(tools.len());
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                Err(ModelError::Request("offline".to_string()))
            } else {
                Ok(replies.remove(0))
            }
        }
    }

    static WEATHER_SCHEMA: Lazy<ToolSchema> = Lazy::new(ToolSchema::empty);

    struct Weather;

    #[async_trait]
    impl Tool for Weather {
        fn name(&self) -> &str {
            "weather"
        }

        fn description(&self) -> &str {
            "Current weather"
        }

        fn schema(&self) -> &ToolSchema {
            &WEATHER_SCHEMA
        }

        async fn execute(&self, _args: ToolArgs) -> Result<Value, ToolError> {
            Ok(json!({"lisbon": "sunny"}))
        }
    }

    fn weather_call() -> ModelResponse {
        ModelResponse::calls(vec![ToolCallRequest::new("weather", json!({}), "")])
    }

    async fn run(replies: Vec<ModelResponse>, rounds: usize) -> (StateDelta, Arc<Scripted>) {
        let model = Arc::new(Scripted {
            replies: Mutex::new(replies),
            offered: Mutex::new(Vec::new()),
        });
        let registry = ToolRegistry::new();
        registry.register(Arc::new(Weather)).await;
        let caller = ModelCaller::single_shot(model.clone(), Duration::from_secs(1));
        let node = InformationNode::new(caller, registry, Duration::from_secs(1), rounds);
        let state = WorkflowState::new("s").merge(StateDelta::user_turn("weather in Lisbon?"));
        (node.run(&state, &RunContext::new(15)).await.unwrap(), model)
    }

    #[tokio::test]
    async fn test_answer_after_tool_round() {
        let (delta, _) = run(vec![weather_call(), ModelResponse::text("Sunny in Lisbon.")], 3).await;
        assert_eq!(delta.messages.len(), 1);
        assert_eq!(delta.messages[0].content, "Information Agent: Sunny in Lisbon.");
    }

    #[tokio::test]
    async fn test_rounds_are_bounded() {
        let (delta, model) = run(
            vec![weather_call(), weather_call(), ModelResponse::text("Probably sunny.")],
            2,
        )
        .await;
        assert_eq!(delta.messages[0].content, "Information Agent: Probably sunny.");
        assert_eq!(*model.offered.lock().unwrap(), vec![1, 1, 0]);
    }

    #[tokio::test]
    async fn test_model_failure_appends_apology() {
        let (delta, _) = run(vec![], 3).await;
        assert_eq!(delta.messages[0].content, INFORMATION_FALLBACK_MESSAGE);
        assert!(delta.error_message.is_none());
    }

    #[tokio::test]
    async fn test_call_ids_differ_between_passes() {
        let model = Arc::new(Scripted {
            replies: Mutex::new(vec![
                weather_call(),
                ModelResponse::text("Sunny."),
                weather_call(),
                ModelResponse::text("Still sunny."),
            ]),
            offered: Mutex::new(Vec::new()),
        });
        let registry = ToolRegistry::new();
        registry.register(Arc::new(Weather)).await;
        let caller = ModelCaller::single_shot(model, Duration::from_secs(1));
        let node = InformationNode::new(caller, registry, Duration::from_secs(1), 3);
        let state = WorkflowState::new("s").merge(StateDelta::user_turn("weather in Lisbon?"));

        let (tx, mut rx) = mpsc::channel(32);
        let mut ctx = RunContext::from_options(&RunOptions::default().with_events(tx), 15);
        for hop in [2, 4] {
            ctx.hop = hop;
            node.run(&state, &ctx).await.unwrap();
        }
        drop(ctx);

        let mut ids = Vec::new();
        while let Some(event) = rx.recv().await {
            if let AgentEvent::ToolCall { call_id, .. } = event {
                ids.push(call_id);
            }
        }
        assert_eq!(ids, vec!["call_info_2_0_0", "call_info_4_0_0"]);
    }
}
