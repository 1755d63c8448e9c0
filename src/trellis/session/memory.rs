// SPDX-License-Identifier: MIT

use super::SessionStore;
use crate::adk::error::TrellisError;
use crate::trellis::workflow::state::WorkflowState;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Bounds applied on every write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// Keep at most this many most-recently-updated sessions
    pub max_sessions: usize,
    /// Drop sessions not updated for this long
    pub idle_ttl: Duration,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            max_sessions: 100,
            idle_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Process-local session store
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, WorkflowState>>>,
    policy: EvictionPolicy,
}

impl InMemorySessionStore {
    pub fn new(policy: EvictionPolicy) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            policy,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    fn evict(&self, sessions: &mut HashMap<String, WorkflowState>) -> usize {
        let before = sessions.len();

        let ttl = ChronoDuration::from_std(self.policy.idle_ttl).unwrap_or(ChronoDuration::MAX);
        if let Some(cutoff) = Utc::now().checked_sub_signed(ttl) {
            sessions.retain(|_, state| state.updated_at >= cutoff);
        }

        if sessions.len() > self.policy.max_sessions {
            let mut by_age: Vec<(String, chrono::DateTime<Utc>)> = sessions
                .iter()
                .map(|(id, state)| (id.clone(), state.updated_at))
                .collect();
            by_age.sort_by(|a, b| b.1.cmp(&a.1));
            for (id, _) in by_age.into_iter().skip(self.policy.max_sessions) {
                sessions.remove(&id);
            }
        }

        before - sessions.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<WorkflowState>, TrellisError> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn put(&self, session_id: &str, state: WorkflowState) -> Result<(), TrellisError> {
        if state.session_id != session_id {
            return Err(TrellisError::session(format!(
                "state belongs to session '{}', not '{}'",
                state.session_id, session_id
            )));
        }

        let mut sessions = self.sessions.write().await;
        sessions.insert(session_id.to_string(), state);
        let evicted = self.evict(&mut sessions);
        if evicted > 0 {
            log::info!("Evicted {} sessions, {} remain", evicted, sessions.len());
        }
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<bool, TrellisError> {
        Ok(self.sessions.write().await.remove(session_id).is_some())
    }

    async fn list(&self) -> Result<Vec<String>, TrellisError> {
        let sessions = self.sessions.read().await;
        let mut ids: Vec<(&String, chrono::DateTime<Utc>)> =
            sessions.iter().map(|(id, state)| (id, state.updated_at)).collect();
        ids.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(ids.into_iter().map(|(id, _)| id.clone()).collect())
    }
}
