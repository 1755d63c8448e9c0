// SPDX-License-Identifier: MIT

//! Session storage
//!
//! A session is the `WorkflowState` of one conversation, keyed by its
//! session id. Stores are injected into the service; the in-memory store is
//! the default backing.

mod memory;

pub use memory::{EvictionPolicy, InMemorySessionStore};

use crate::adk::error::TrellisError;
use crate::trellis::workflow::state::{AgentKind, WorkflowState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Keyed storage of conversation states
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Option<WorkflowState>, TrellisError>;

    async fn put(&self, session_id: &str, state: WorkflowState) -> Result<(), TrellisError>;

    /// Returns whether a session was removed
    async fn delete(&self, session_id: &str) -> Result<bool, TrellisError>;

    async fn list(&self) -> Result<Vec<String>, TrellisError>;
}

/// Listing entry for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub message_count: usize,
    pub current_agent: Option<AgentKind>,
    pub is_complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&WorkflowState> for SessionSummary {
    fn from(state: &WorkflowState) -> Self {
        Self {
            session_id: state.session_id.clone(),
            message_count: state.messages.len(),
            current_agent: state.current_agent,
            is_complete: state.is_complete,
            created_at: state.created_at,
            updated_at: state.updated_at,
        }
    }
}

/// One async mutex per session id, so at most one run mutates a session at
/// a time. Runs on different sessions never wait on each other.
#[derive(Clone, Default)]
pub struct SessionLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a session
    pub async fn acquire(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Number of sessions with a lock entry
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.locks.lock().await.is_empty()
    }

    /// Drop the lock entry of a session nobody is holding or waiting on
    pub async fn forget(&self, session_id: &str) {
        let mut locks = self.locks.lock().await;
        if let Some(lock) = locks.get(session_id) {
            if Arc::strong_count(lock) == 1 {
                locks.remove(session_id);
            }
        }
    }
}
