// SPDX-License-Identifier: MIT

//! Request/response surface
//!
//! `ChatService` ties a compiled graph to a session store: load or create the
//! session, append the user turn, run the graph, persist the result. Runs on
//! the same session are serialized; a failed run leaves the stored session
//! untouched.

use crate::adk::agent::AgentEvent;
use crate::adk::error::TrellisError;
use crate::trellis::session::{SessionLocks, SessionStore, SessionSummary};
use crate::trellis::workflow::graph::{CompiledGraph, RunOptions, RunStatus};
use crate::trellis::workflow::state::{ConversationMessage, StateDelta, WorkflowState};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    pub agent_used: Option<String>,
    pub is_complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_data: Option<Map<String, Value>>,
}

impl ChatResponse {
    fn from_state(state: &WorkflowState) -> Result<Self, TrellisError> {
        let mut data = Map::new();
        if let Some(booking) = &state.booking {
            data.insert("booking".to_string(), serde_json::to_value(booking)?);
        }
        if let Some(routing) = &state.routing {
            data.insert("routing".to_string(), serde_json::to_value(routing)?);
        }
        for (key, value) in &state.extensions {
            data.insert(key.clone(), value.clone());
        }

        Ok(Self {
            response: state.final_answer.clone().unwrap_or_default(),
            session_id: state.session_id.clone(),
            agent_used: state.current_agent.map(|a| a.as_str().to_string()),
            is_complete: state.is_complete,
            structured_data: (!data.is_empty()).then_some(data),
        })
    }
}

#[derive(Clone)]
pub struct ChatService {
    graph: Arc<CompiledGraph>,
    store: Arc<dyn SessionStore>,
    locks: SessionLocks,
}

impl ChatService {
    pub fn new(graph: Arc<CompiledGraph>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            graph,
            store,
            locks: SessionLocks::new(),
        }
    }

    pub fn graph(&self) -> &CompiledGraph {
        &self.graph
    }

    pub async fn handle(&self, request: ChatRequest) -> Result<ChatResponse, TrellisError> {
        self.handle_with(request, RunOptions::default()).await
    }

    /// Like [`handle`](Self::handle), streaming run events into `tx`
    pub async fn handle_stream(
        &self,
        request: ChatRequest,
        tx: mpsc::Sender<AgentEvent>,
        cancel: CancellationToken,
    ) -> Result<ChatResponse, TrellisError> {
        self.handle_with(request, RunOptions::default().with_events(tx).with_cancel(cancel))
            .await
    }

    async fn handle_with(&self, request: ChatRequest, options: RunOptions) -> Result<ChatResponse, TrellisError> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(TrellisError::other("message must not be empty"));
        }

        let session_id = match request.session_id {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        };
        let guard = self.locks.acquire(&session_id).await;
        let result = self.run_locked(&session_id, message, options).await;
        drop(guard);
        self.locks.forget(&session_id).await;
        result
    }

    async fn run_locked(
        &self,
        session_id: &str,
        message: &str,
        options: RunOptions,
    ) -> Result<ChatResponse, TrellisError> {
        let state = match self.store.get(session_id).await? {
            Some(existing) => {
                log::info!(
                    "Resuming session {} ({} messages)",
                    session_id,
                    existing.messages.len()
                );
                existing
            }
            None => {
                log::info!("Starting session {}", session_id);
                WorkflowState::new(session_id)
            }
        };
        let state = state.merge(StateDelta::user_turn(message));

        let output = self.graph.execute(state, options).await?;
        match &output.status {
            RunStatus::Completed => {}
            RunStatus::Truncated => log::warn!("Session {} run truncated at {} hops", session_id, output.hops),
            RunStatus::Failed(reason) => log::error!("Session {} run failed: {}", session_id, reason),
        }

        let response = ChatResponse::from_state(&output.state)?;
        self.store.put(session_id, output.state).await?;
        Ok(response)
    }

    /// Message log of a session
    pub async fn history(&self, session_id: &str) -> Result<Option<Vec<ConversationMessage>>, TrellisError> {
        Ok(self.store.get(session_id).await?.map(|state| state.messages))
    }

    pub async fn delete(&self, session_id: &str) -> Result<bool, TrellisError> {
        let removed = {
            let _guard = self.locks.acquire(session_id).await;
            self.store.delete(session_id).await?
        };
        self.locks.forget(session_id).await;
        Ok(removed)
    }

    /// Summaries of all stored sessions, most recently updated first
    pub async fn sessions(&self) -> Result<Vec<SessionSummary>, TrellisError> {
        let mut summaries = Vec::new();
        for id in self.store.list().await? {
            if let Some(state) = self.store.get(&id).await? {
                summaries.push(SessionSummary::from(&state));
            }
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }
}
