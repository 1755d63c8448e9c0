// SPDX-License-Identifier: MIT

//! Agent module - the runnable-agent contract
//!
//! Anything that turns one user input into one answer implements [`Agent`].
//! Compiled workflow graphs are the main implementation.

use crate::adk::error::TrellisError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Progress events emitted while an agent runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    NodeStarted {
        node: String,
        hop: usize,
    },
    NodeFinished {
        node: String,
        hop: usize,
    },
    Routed {
        from: String,
        label: String,
        to: String,
    },
    ToolCall {
        name: String,
        call_id: String,
        args: serde_json::Value,
    },
    ToolResult {
        call_id: String,
        is_error: bool,
        payload: String,
    },
    Answer {
        text: String,
    },
    Truncated {
        hops: usize,
    },
    Error {
        message: String,
    },
}

/// Core agent trait for all agent types
#[async_trait]
pub trait Agent: Send + Sync {
    /// Returns the agent name
    fn name(&self) -> &str;

    /// Run the agent with the given input
    async fn run(&self, input: String) -> Result<String, TrellisError>;

    /// Run the agent with streaming events
    async fn run_stream(
        &self,
        input: String,
        tx: mpsc::Sender<AgentEvent>,
    ) -> Result<String, TrellisError> {
        // Default implementation falls back to run()
        match self.run(input).await {
            Ok(res) => {
                let _ = tx.send(AgentEvent::Answer { text: res.clone() }).await;
                Ok(res)
            }
            Err(e) => {
                let _ = tx
                    .send(AgentEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
                Err(e)
            }
        }
    }
}
