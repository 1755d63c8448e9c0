// SPDX-License-Identifier: MIT

//! Model module - the language-model capability consumed by the engine
//!
//! The engine only ever sees the `Model` trait: given a system prompt, the
//! conversation so far and the tool signatures on offer, a model returns some
//! text and zero or more tool calls. Implementations live in submodules:
//! - [openai] - OpenAI chat-completions API
//!
//! [`ModelCaller`] wraps any model with a timeout and bounded retries.

pub mod caller;
pub mod openai;

pub use caller::{parse_json_reply, ModelCaller};
pub use openai::OpenAIModel;

use crate::adk::error::ModelError;
use crate::adk::message::{ConversationMessage, ToolCallRequest};
use crate::adk::tool::ToolSignature;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration for model generation
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

/// Raw reply of one model call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,
}

/// What the engine does with a model reply
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    FinalAnswer(String),
    ToolCalls(Vec<ToolCallRequest>),
}

impl ModelResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: String::new(),
            tool_calls,
        }
    }

    /// Classify the reply. A reply with neither text nor calls is an empty
    /// final answer.
    pub fn into_turn(self) -> ModelTurn {
        if self.tool_calls.is_empty() {
            ModelTurn::FinalAnswer(self.content)
        } else {
            ModelTurn::ToolCalls(self.tool_calls)
        }
    }
}

/// Core trait for language-model implementations
#[async_trait]
pub trait Model: Send + Sync {
    /// Identifier used in logs
    fn name(&self) -> &str;

    async fn invoke(
        &self,
        system: &str,
        messages: &[ConversationMessage],
        tools: &[ToolSignature],
    ) -> Result<ModelResponse, ModelError>;
}

/// Build a model for a configured provider
pub fn create_model(
    provider: &str,
    model_name: &str,
    config: GenerationConfig,
) -> Result<Arc<dyn Model>, ModelError> {
    log::debug!("Using provider '{}' with model '{}'", provider, model_name);
    match provider.to_lowercase().as_str() {
        "openai" | "" => Ok(Arc::new(OpenAIModel::new(model_name, config)?)),
        other => Err(ModelError::UnsupportedProvider(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_response_is_empty_final_answer() {
        assert_eq!(
            ModelResponse::default().into_turn(),
            ModelTurn::FinalAnswer(String::new())
        );
    }

    #[test]
    fn test_tool_calls_take_precedence_over_text() {
        let resp = ModelResponse {
            content: "let me check".to_string(),
            tool_calls: vec![ToolCallRequest::new("current_datetime", json!({}), "c1")],
        };
        match resp.into_turn() {
            ModelTurn::ToolCalls(calls) => assert_eq!(calls[0].tool_name, "current_datetime"),
            other => panic!("expected tool calls, got {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_provider() {
        let err = create_model("carrier-pigeon", "m", GenerationConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, ModelError::UnsupportedProvider(_)));
    }
}
