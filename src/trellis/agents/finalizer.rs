// SPDX-License-Identifier: MIT

//! Finalize node - reduce the conversation to one answer

use crate::adk::error::TrellisError;
use crate::trellis::workflow::graph::{Node, RunContext};
use crate::trellis::workflow::state::{Role, StateDelta, WorkflowState};
use async_trait::async_trait;

pub const FINALIZE_NODE: &str = "finalize";

/// Joins the last `window` agent messages of the current turn (everything
/// after the latest user message) into the final answer and marks the state
/// complete. Appends no message of its own, so running it twice over the
/// same log gives the same answer.
pub struct FinalizerNode {
    window: usize,
}

impl FinalizerNode {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
        }
    }

    /// The answer for a given state
    pub fn compose(&self, state: &WorkflowState) -> String {
        let mut recent: Vec<&str> = state
            .messages
            .iter()
            .rev()
            .take_while(|m| m.role != Role::User)
            .filter(|m| m.role == Role::Agent && m.origin.as_deref() != Some(FINALIZE_NODE))
            .map(|m| m.content.trim())
            .filter(|c| !c.is_empty())
            .take(self.window)
            .collect();
        recent.reverse();
        recent.join(" ")
    }
}

#[async_trait]
impl Node for FinalizerNode {
    fn id(&self) -> &str {
        FINALIZE_NODE
    }

    async fn run(&self, state: &WorkflowState, _ctx: &RunContext) -> Result<StateDelta, TrellisError> {
        let answer = self.compose(state);
        log::debug!("Final answer composed from up to {} agent messages", self.window);
        Ok(StateDelta::new().final_answer(answer).complete(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trellis::workflow::state::ConversationMessage;

    fn conversation() -> WorkflowState {
        WorkflowState::new("s")
            .merge(StateDelta::user_turn("hello"))
            .merge(StateDelta::new().messages(vec![
                ConversationMessage::agent("one", "router"),
                ConversationMessage::agent("", "agent"),
                ConversationMessage::agent("two", "booking"),
                ConversationMessage::agent("three", "booking"),
                ConversationMessage::agent("four", "booking"),
            ]))
    }

    #[tokio::test]
    async fn test_takes_last_window_in_order() {
        let node = FinalizerNode::new(3);
        let delta = node.run(&conversation(), &RunContext::new(15)).await.unwrap();
        assert_eq!(delta.final_answer.as_deref(), Some("two three four"));
        assert_eq!(delta.is_complete, Some(true));
        assert!(delta.messages.is_empty());
    }

    #[tokio::test]
    async fn test_idempotent() {
        let node = FinalizerNode::new(3);
        let ctx = RunContext::new(15);
        let state = conversation();
        let first = state.merge(node.run(&state, &ctx).await.unwrap());
        let second = first.merge(node.run(&first, &ctx).await.unwrap());
        assert_eq!(first.final_answer, second.final_answer);
        assert_eq!(first.messages, second.messages);
    }

    #[test]
    fn test_earlier_turns_are_ignored() {
        let state = conversation()
            .merge(StateDelta::user_turn("again"))
            .merge(StateDelta::new().message(ConversationMessage::agent("five", "booking")));
        assert_eq!(FinalizerNode::new(3).compose(&state), "five");
    }

    #[test]
    fn test_no_agent_messages_gives_empty_answer() {
        let state = WorkflowState::new("s").merge(StateDelta::user_turn("hello"));
        assert_eq!(FinalizerNode::new(3).compose(&state), "");
    }
}
