// SPDX-License-Identifier: MIT

//! OpenAI Model - chat-completions API implementation

use super::{GenerationConfig, Model, ModelResponse};
use crate::adk::error::ModelError;
use crate::adk::message::{ConversationMessage, Role, ToolCallRequest};
use crate::adk::tool::ToolSignature;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::env;

/// OpenAI chat model implementation
pub struct OpenAIModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
    config: GenerationConfig,
}

impl OpenAIModel {
    /// Create a new OpenAIModel
    ///
    /// Requires `OPENAI_API_KEY` environment variable to be set.
    /// Optionally uses `OPENAI_BASE_URL` for custom endpoints.
    pub fn new(model_name: &str, config: GenerationConfig) -> Result<Self, ModelError> {
        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| ModelError::ApiKeyMissing("openai".to_string()))?;
        let base_url =
            env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

        Ok(Self {
            client: Client::new(),
            api_key,
            model_name: model_name.to_string(),
            base_url,
            config,
        })
    }

    /// Convert a conversation message to OpenAI message format
    fn message_to_openai(message: &ConversationMessage) -> Value {
        match message.role {
            Role::User => json!({
                "role": "user",
                "content": message.content
            }),
            Role::Tool => json!({
                "role": "tool",
                "tool_call_id": message.call_id.clone().unwrap_or_default(),
                "content": message.content
            }),
            Role::Agent if !message.tool_calls.is_empty() => {
                let tool_calls: Vec<Value> = message
                    .tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.call_id,
                            "type": "function",
                            "function": {
                                "name": call.tool_name,
                                "arguments": call.arguments.to_string()
                            }
                        })
                    })
                    .collect();
                json!({
                    "role": "assistant",
                    "content": if message.content.is_empty() { Value::Null } else { json!(message.content) },
                    "tool_calls": tool_calls
                })
            }
            Role::Agent => json!({
                "role": "assistant",
                "content": message.content
            }),
        }
    }

    /// Convert tool signatures to OpenAI function format
    fn tools_to_openai_format(tools: &[ToolSignature]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters
                    }
                })
            })
            .collect()
    }

    /// Parse an OpenAI response body
    fn parse_openai_response(response: &Value) -> Result<ModelResponse, ModelError> {
        let choice = response["choices"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or_else(|| ModelError::InvalidResponse("no choices in OpenAI response".to_string()))?;

        let message = &choice["message"];
        let content = message["content"].as_str().unwrap_or_default().to_string();

        let mut tool_calls = Vec::new();
        if let Some(calls) = message["tool_calls"].as_array() {
            for tc in calls {
                let name = tc["function"]["name"].as_str().unwrap_or_default();
                let args_str = tc["function"]["arguments"].as_str().unwrap_or("{}");
                // Unparseable arguments are kept as a string so validation reports them.
                let args: Value =
                    serde_json::from_str(args_str).unwrap_or_else(|_| Value::String(args_str.to_string()));
                let call_id = tc["id"].as_str().unwrap_or_default();
                tool_calls.push(ToolCallRequest::new(name, args, call_id));
            }
        }

        Ok(ModelResponse {
            content,
            tool_calls,
        })
    }
}

#[async_trait]
impl Model for OpenAIModel {
    fn name(&self) -> &str {
        &self.model_name
    }

    async fn invoke(
        &self,
        system: &str,
        messages: &[ConversationMessage],
        tools: &[ToolSignature],
    ) -> Result<ModelResponse, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut openai_messages = Vec::with_capacity(messages.len() + 1);
        if !system.is_empty() {
            openai_messages.push(json!({"role": "system", "content": system}));
        }
        openai_messages.extend(messages.iter().map(Self::message_to_openai));

        let mut body = json!({
            "model": self.model_name,
            "messages": openai_messages
        });

        if let Some(temp) = self.config.temperature {
            body["temperature"] = json!(temp);
        }
        if let Some(max_tokens) = self.config.max_output_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        if !tools.is_empty() {
            body["tools"] = json!(Self::tools_to_openai_format(tools));
            body["tool_choice"] = json!("auto");
        }

        log::debug!(
            "OpenAI request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ModelError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            let text = resp.text().await?;
            return Err(ModelError::Request(format!("OpenAI API error ({}): {}", status, text)));
        }

        let resp_json: Value = resp
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        log::debug!("OpenAI response: {}", resp_json);

        Self::parse_openai_response(&resp_json)
    }
}
