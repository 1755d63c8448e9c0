// SPDX-License-Identifier: MIT

//! Tool registry and invoker
//!
//! `invoke` never fails: unknown tools, invalid arguments, tool errors,
//! timeouts and panics all come back as an error-flagged [`ToolResult`].

use crate::adk::error::ToolError;
use crate::adk::message::{ToolCallRequest, ToolResult};
use crate::adk::tool::{Tool, ToolSignature};
use futures::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct ToolRegistry {
    tools: Arc<RwLock<HashMap<String, Arc<dyn Tool>>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let mut tools = self.tools.write().await;
        tools.insert(tool.name().to_string(), tool);
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let tools = self.tools.read().await;
        tools.get(name).cloned()
    }

    /// Signatures of every registered tool, sorted by name
    pub async fn signatures(&self) -> Vec<ToolSignature> {
        let tools = self.tools.read().await;
        let mut sigs: Vec<ToolSignature> = tools.values().map(|t| t.signature()).collect();
        sigs.sort_by(|a, b| a.name.cmp(&b.name));
        sigs
    }

    /// Execute one tool call
    pub async fn invoke(&self, request: &ToolCallRequest, timeout: Duration) -> ToolResult {
        match self.try_invoke(request, timeout).await {
            Ok(value) => {
                log::info!("Tool '{}' ({}) succeeded", request.tool_name, request.call_id);
                ToolResult::ok(&request.call_id, payload_text(value))
            }
            Err(e) => {
                log::warn!("Tool '{}' ({}) failed: {}", request.tool_name, request.call_id, e);
                ToolResult::error(&request.call_id, e.to_string())
            }
        }
    }

    /// Execute every call of one model turn concurrently.
    ///
    /// Results come back in request order, one per request.
    pub async fn invoke_all(&self, requests: &[ToolCallRequest], timeout: Duration) -> Vec<ToolResult> {
        join_all(requests.iter().map(|r| self.invoke(r, timeout))).await
    }

    async fn try_invoke(&self, request: &ToolCallRequest, timeout: Duration) -> Result<Value, ToolError> {
        let tool = self
            .get(&request.tool_name)
            .await
            .ok_or_else(|| ToolError::NotFound(request.tool_name.clone()))?;

        let args = tool.schema().validate(tool.name(), &request.arguments)?;
        log::debug!("Calling tool '{}' with {:?}", request.tool_name, args);

        // A separate task keeps a panicking tool from taking the run down.
        let mut task = tokio::spawn({
            let tool = tool.clone();
            async move { tool.execute(args).await }
        });

        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(ToolError::execution(
                &request.tool_name,
                format!("tool task aborted: {}", join_err),
            )),
            Err(_) => {
                task.abort();
                log::warn!("Tool '{}' timed out after {:?}", request.tool_name, timeout);
                Err(ToolError::Timeout {
                    tool: request.tool_name.clone(),
                    timeout,
                })
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn payload_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::tool::{ParamSpec, ParamType, ToolArgs, ToolSchema};
    use async_trait::async_trait;
    use once_cell::sync::Lazy;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static ECHO_SCHEMA: Lazy<ToolSchema> = Lazy::new(|| {
        ToolSchema::new(vec![
            ParamSpec::required("text", ParamType::String, "Text to echo"),
            ParamSpec::optional("delay_ms", ParamType::Integer, Some(json!(0)), "Delay"),
        ])
    });

    static EMPTY_SCHEMA: Lazy<ToolSchema> = Lazy::new(ToolSchema::empty);

    /// Echoes its input after an optional delay
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo text back"
        }

        fn schema(&self) -> &ToolSchema {
            &ECHO_SCHEMA
        }

        async fn execute(&self, args: ToolArgs) -> Result<Value, ToolError> {
            let delay = args["delay_ms"].as_u64().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(json!({"echo": args["text"]}))
        }
    }

    /// Always fails, or panics when asked to
    struct BrokenTool {
        panic: bool,
    }

    #[async_trait]
    impl Tool for BrokenTool {
        fn name(&self) -> &str {
            if self.panic {
                "panics"
            } else {
                "broken"
            }
        }

        fn description(&self) -> &str {
            "Never works"
        }

        fn schema(&self) -> &ToolSchema {
            &EMPTY_SCHEMA
        }

        async fn execute(&self, _args: ToolArgs) -> Result<Value, ToolError> {
            if self.panic {
                panic!("tool exploded");
            }
            Err(ToolError::execution("broken", "upstream returned 500"))
        }
    }

    async fn registry() -> ToolRegistry {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).await;
        registry.register(Arc::new(BrokenTool { panic: false })).await;
        registry.register(Arc::new(BrokenTool { panic: true })).await;
        registry
    }

    const TIMEOUT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn test_register_and_get_tool() {
        let registry = registry().await;
        assert_eq!(registry.get("echo").await.unwrap().name(), "echo");
        assert!(registry.get("nonexistent").await.is_none());
    }

    #[tokio::test]
    async fn test_registry_is_clone() {
        let registry = ToolRegistry::new();
        let cloned = registry.clone();
        cloned.register(Arc::new(EchoTool)).await;
        assert!(registry.get("echo").await.is_some());
    }

    #[tokio::test]
    async fn test_signatures_sorted() {
        let names: Vec<String> = registry()
            .await
            .signatures()
            .await
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["broken", "echo", "panics"]);
    }

    #[tokio::test]
    async fn test_invoke_success() {
        let registry = registry().await;
        let result = registry
            .invoke(&ToolCallRequest::new("echo", json!({"text": "hi"}), "c1"), TIMEOUT)
            .await;
        assert!(!result.is_error);
        assert_eq!(result.call_id, "c1");
        let payload: Value = serde_json::from_str(&result.payload).unwrap();
        assert_eq!(payload["echo"], "hi");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_error_result() {
        let registry = registry().await;
        let result = registry
            .invoke(&ToolCallRequest::new("teleport", json!({}), "c1"), TIMEOUT)
            .await;
        assert!(result.is_error);
        assert_eq!(result.payload, "unknown tool 'teleport'");
    }

    #[tokio::test]
    async fn test_validation_failure_is_error_result() {
        let registry = registry().await;
        let missing = registry
            .invoke(&ToolCallRequest::new("echo", json!({}), "c1"), TIMEOUT)
            .await;
        assert!(missing.is_error);
        assert!(missing.payload.contains("missing required parameter 'text'"));

        let mistyped = registry
            .invoke(&ToolCallRequest::new("echo", json!({"text": 42}), "c2"), TIMEOUT)
            .await;
        assert!(mistyped.is_error);
        assert!(mistyped.payload.contains("expected string"));
    }

    #[tokio::test]
    async fn test_execution_error_and_panic_are_contained() {
        let registry = registry().await;
        let failed = registry
            .invoke(&ToolCallRequest::new("broken", Value::Null, "c1"), TIMEOUT)
            .await;
        assert!(failed.is_error);
        assert!(failed.payload.contains("upstream returned 500"));

        let panicked = registry
            .invoke(&ToolCallRequest::new("panics", Value::Null, "c2"), TIMEOUT)
            .await;
        assert!(panicked.is_error);
        assert!(panicked.payload.contains("aborted"));
    }

    #[tokio::test]
    async fn test_timeout_is_error_result() {
        let registry = registry().await;
        let result = registry
            .invoke(
                &ToolCallRequest::new("echo", json!({"text": "slow", "delay_ms": 500}), "c1"),
                Duration::from_millis(20),
            )
            .await;
        assert!(result.is_error);
        assert!(result.payload.contains("timed out"));
    }

    /// Sleeps, then records that it ran to completion
    struct SlowCounter {
        finished: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for SlowCounter {
        fn name(&self) -> &str {
            "slow_counter"
        }

        fn description(&self) -> &str {
            "Counts after a delay"
        }

        fn schema(&self) -> &ToolSchema {
            &EMPTY_SCHEMA
        }

        async fn execute(&self, _args: ToolArgs) -> Result<Value, ToolError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"done": true}))
        }
    }

    #[tokio::test]
    async fn test_timed_out_tool_is_stopped() {
        let finished = Arc::new(AtomicUsize::new(0));
        let registry = ToolRegistry::new();
        registry
            .register(Arc::new(SlowCounter {
                finished: finished.clone(),
            }))
            .await;

        let result = registry
            .invoke(
                &ToolCallRequest::new("slow_counter", Value::Null, "c1"),
                Duration::from_millis(20),
            )
            .await;
        assert!(result.is_error);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invoke_all_preserves_request_order() {
        let registry = registry().await;
        let requests = vec![
            ToolCallRequest::new("echo", json!({"text": "slow", "delay_ms": 80}), "a"),
            ToolCallRequest::new("teleport", json!({}), "b"),
            ToolCallRequest::new("echo", json!({"text": "fast"}), "c"),
        ];
        let results = registry.invoke_all(&requests, TIMEOUT).await;
        let ids: Vec<&str> = results.iter().map(|r| r.call_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(!results[0].is_error);
        assert!(results[1].is_error);
        assert!(!results[2].is_error);
    }
}
