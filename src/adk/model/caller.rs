// SPDX-License-Identifier: MIT

//! Timeout and retry wrapper around a [`Model`]

use super::{Model, ModelResponse};
use crate::adk::error::ModelError;
use crate::adk::message::ConversationMessage;
use crate::adk::tool::ToolSignature;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on a single backoff sleep
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Calls a model with a per-attempt timeout and exponential backoff between
/// retryable failures.
#[derive(Clone)]
pub struct ModelCaller {
    model: Arc<dyn Model>,
    timeout: Duration,
    max_retries: u32,
    backoff_base: Duration,
}

impl ModelCaller {
    pub fn new(model: Arc<dyn Model>, timeout: Duration, max_retries: u32, backoff_base: Duration) -> Self {
        Self {
            model,
            timeout,
            max_retries,
            backoff_base,
        }
    }

    /// A caller that never retries
    pub fn single_shot(model: Arc<dyn Model>, timeout: Duration) -> Self {
        Self::new(model, timeout, 0, Duration::ZERO)
    }

    pub fn model(&self) -> &Arc<dyn Model> {
        &self.model
    }

    /// Invoke the model. Returns `ModelError::Exhausted` once every attempt
    /// has failed, or the first non-retryable error unchanged.
    pub async fn call(
        &self,
        system: &str,
        messages: &[ConversationMessage],
        tools: &[ToolSignature],
    ) -> Result<ModelResponse, ModelError> {
        let attempts = self.max_retries + 1;
        let mut last_err = None;

        for attempt in 0..attempts {
            let result =
                match tokio::time::timeout(self.timeout, self.model.invoke(system, messages, tools))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ModelError::Timeout(self.timeout)),
                };

            match result {
                Ok(response) => return Ok(response),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    if attempt + 1 < attempts {
                        let backoff = calculate_backoff(attempt, self.backoff_base);
                        log::warn!(
                            "Retrying model '{}' (attempt {}/{}, backoff {}ms): {}",
                            self.model.name(),
                            attempt + 1,
                            attempts,
                            backoff.as_millis(),
                            e
                        );
                        tokio::time::sleep(backoff).await;
                    }
                    last_err = Some(e);
                }
            }
        }

        Err(ModelError::Exhausted {
            attempts,
            last: last_err.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}

fn calculate_backoff(attempt: u32, base: Duration) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt)).min(MAX_BACKOFF)
}

/// Parse a structured JSON reply, tolerating a surrounding markdown fence
pub fn parse_json_reply<T: DeserializeOwned>(content: &str) -> Result<T, ModelError> {
    let trimmed = content.trim();
    let body = if trimmed.starts_with("```") {
        let without_open = trimmed
            .trim_start_matches("```json")
            .trim_start_matches("```JSON")
            .trim_start_matches("```");
        without_open.trim_end_matches("```").trim()
    } else {
        trimmed
    };

    // Models sometimes wrap the object in prose.
    let body = match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => body,
    };

    serde_json::from_str(body).map_err(|e| ModelError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyModel {
        failures_before_success: u32,
        calls: AtomicU32,
        error: ModelError,
    }

    #[async_trait]
    impl Model for FlakyModel {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn invoke(
            &self,
            _system: &str,
            _messages: &[ConversationMessage],
            _tools: &[ToolSignature],
        ) -> Result<ModelResponse, ModelError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures_before_success {
                Err(self.error.clone())
            } else {
                Ok(ModelResponse::text("ok"))
            }
        }
    }

    struct SlowModel;

    #[async_trait]
    impl Model for SlowModel {
        fn name(&self) -> &str {
            "slow"
        }

        async fn invoke(
            &self,
            _system: &str,
            _messages: &[ConversationMessage],
            _tools: &[ToolSignature],
        ) -> Result<ModelResponse, ModelError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(ModelResponse::text("late"))
        }
    }

    fn flaky(failures: u32, error: ModelError) -> Arc<FlakyModel> {
        Arc::new(FlakyModel {
            failures_before_success: failures,
            calls: AtomicU32::new(0),
            error,
        })
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let model = flaky(2, ModelError::Request("502".to_string()));
        let caller = ModelCaller::new(model.clone(), Duration::from_secs(1), 2, Duration::from_millis(1));
        let resp = caller.call("", &[], &[]).await.unwrap();
        assert_eq!(resp.content, "ok");
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_after_retry_budget() {
        let model = flaky(10, ModelError::Request("503".to_string()));
        let caller = ModelCaller::new(model.clone(), Duration::from_secs(1), 1, Duration::from_millis(1));
        let err = caller.call("", &[], &[]).await.unwrap_err();
        assert!(matches!(err, ModelError::Exhausted { attempts: 2, .. }));
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_error_is_returned_immediately() {
        let model = flaky(10, ModelError::ApiKeyMissing("openai".to_string()));
        let caller = ModelCaller::new(model.clone(), Duration::from_secs(1), 3, Duration::from_millis(1));
        let err = caller.call("", &[], &[]).await.unwrap_err();
        assert!(matches!(err, ModelError::ApiKeyMissing(_)));
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let caller = ModelCaller::single_shot(Arc::new(SlowModel), Duration::from_millis(20));
        let err = caller.call("", &[], &[]).await.unwrap_err();
        match err {
            ModelError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 1);
                assert!(last.contains("timed out"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let base = Duration::from_millis(500);
        assert_eq!(calculate_backoff(0, base), Duration::from_millis(500));
        assert_eq!(calculate_backoff(1, base), Duration::from_millis(1000));
        assert_eq!(calculate_backoff(2, base), Duration::from_millis(2000));
        assert_eq!(calculate_backoff(10, base), MAX_BACKOFF);
    }

    #[derive(Debug, Deserialize)]
    struct Decision {
        agent: String,
    }

    #[test]
    fn test_parse_json_reply_strips_fences() {
        let d: Decision = parse_json_reply("```json\n{\"agent\": \"booking\"}\n```").unwrap();
        assert_eq!(d.agent, "booking");

        let d: Decision = parse_json_reply("Sure! {\"agent\": \"complaint\"} hope that helps").unwrap();
        assert_eq!(d.agent, "complaint");

        assert!(parse_json_reply::<Decision>("no json here").is_err());
    }
}
