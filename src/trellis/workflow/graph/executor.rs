// SPDX-License-Identifier: MIT

//! Graph workflow executor
//!
//! Steps through the graph one node at a time: run the node, merge its delta,
//! follow the outgoing edge against the post-merge state. A run stops at a
//! terminal node, at the hop limit (finalize and flag truncation) or on a
//! graph contract violation.

use super::builder::Edge;
use super::{Node, RunContext};
use crate::adk::agent::{Agent, AgentEvent};
use crate::adk::error::{GraphError, TrellisError};
use crate::trellis::workflow::state::{StateDelta, WorkflowState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Optional run hooks
#[derive(Clone, Default)]
pub struct RunOptions {
    pub events: Option<mpsc::Sender<AgentEvent>>,
    pub cancel: CancellationToken,
}

impl RunOptions {
    pub fn with_events(mut self, tx: mpsc::Sender<AgentEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Truncated,
    /// A node recorded an unrecoverable failure in the state
    Failed(String),
}

/// Result of one run
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub state: WorkflowState,
    pub status: RunStatus,
    /// Node executions performed, including a truncation finalizer
    pub hops: usize,
}

/// A validated, immutable graph
pub struct CompiledGraph {
    name: String,
    nodes: HashMap<String, Arc<dyn Node>>,
    edges: HashMap<String, Edge>,
    entry: String,
    finalizer: Option<String>,
    max_hops: usize,
}

impl CompiledGraph {
    pub(super) fn new(
        name: String,
        nodes: HashMap<String, Arc<dyn Node>>,
        edges: HashMap<String, Edge>,
        entry: String,
        finalizer: Option<String>,
        max_hops: usize,
    ) -> Self {
        Self {
            name,
            nodes,
            edges,
            entry,
            finalizer,
            max_hops,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn max_hops(&self) -> usize {
        self.max_hops
    }

    /// Run the graph from its entry node
    pub async fn execute(&self, initial: WorkflowState, options: RunOptions) -> Result<RunOutput, TrellisError> {
        let mut ctx = RunContext::from_options(&options, self.max_hops);
        let mut state = initial;
        let mut current = self.entry.clone();
        let mut hops = 0;

        log::info!("Starting graph '{}' for session {}", self.name, state.session_id);

        loop {
            if ctx.is_cancelled() {
                log::warn!("Graph '{}' cancelled after {} hops", self.name, hops);
                return Err(GraphError::Cancelled { hops }.into());
            }

            // The finalizer always gets the last hop of the budget
            let reserved = usize::from(self.finalizer.as_deref().is_some_and(|f| f != current));
            if hops + reserved >= self.max_hops {
                log::warn!(
                    "Graph '{}' reached the hop limit ({}) before '{}'",
                    self.name,
                    self.max_hops,
                    current
                );
                let (state, hops) = self.truncate(state, &mut ctx, hops).await?;
                return Ok(RunOutput {
                    state,
                    status: RunStatus::Truncated,
                    hops,
                });
            }

            hops += 1;
            state = self.step(&current, state, &mut ctx, hops).await?;

            let next = match self.edges.get(&current) {
                None => break,
                Some(Edge::Direct(to)) => to.clone(),
                Some(Edge::Conditional { router, routes, .. }) => {
                    let label = router(&state);
                    let to = routes.get(&label).cloned().ok_or_else(|| {
                        log::error!("Node '{}' produced unmapped route label '{}'", current, label);
                        GraphError::UnknownRouteLabel {
                            node: current.clone(),
                            label: label.clone(),
                        }
                    })?;
                    log::info!("Route {} --[{}]--> {}", current, label, to);
                    ctx.emit(AgentEvent::Routed {
                        from: current.clone(),
                        label,
                        to: to.clone(),
                    })
                    .await;
                    to
                }
            };
            current = next;
        }

        let status = match &state.error_message {
            Some(reason) => RunStatus::Failed(reason.clone()),
            None => RunStatus::Completed,
        };
        log::info!("Graph '{}' finished after {} hops: {:?}", self.name, hops, status);
        if let Some(answer) = &state.final_answer {
            ctx.emit(AgentEvent::Answer { text: answer.clone() }).await;
        }

        Ok(RunOutput { state, status, hops })
    }

    /// Execute one node and merge its delta
    async fn step(
        &self,
        node_id: &str,
        state: WorkflowState,
        ctx: &mut RunContext,
        hop: usize,
    ) -> Result<WorkflowState, TrellisError> {
        let node = self
            .nodes
            .get(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.to_string()))?;

        ctx.hop = hop;
        log::info!("Hop {}/{}: executing node '{}'", hop, self.max_hops, node_id);
        ctx.emit(AgentEvent::NodeStarted {
            node: node_id.to_string(),
            hop,
        })
        .await;

        let delta = match node.run(&state, ctx).await {
            Ok(delta) => delta,
            Err(e) => {
                log::error!("Node '{}' failed: {}", node_id, e);
                ctx.emit(AgentEvent::Error { message: e.to_string() }).await;
                return Err(e);
            }
        };
        let next = state.merge(delta);

        ctx.emit(AgentEvent::NodeFinished {
            node: node_id.to_string(),
            hop,
        })
        .await;
        Ok(next)
    }

    /// Stop at the hop limit: run the finalizer as the final hop, then flag
    /// the state. Never exceeds `max_hops`.
    async fn truncate(
        &self,
        state: WorkflowState,
        ctx: &mut RunContext,
        hops: usize,
    ) -> Result<(WorkflowState, usize), TrellisError> {
        let (state, hops) = match &self.finalizer {
            Some(finalizer) => {
                let state = self.step(finalizer, state, ctx, hops + 1).await?;
                (state, hops + 1)
            }
            None => (state, hops),
        };

        let note = format!(
            "[This interaction was truncated after reaching the limit of {} steps.]",
            self.max_hops
        );
        let answer = match state.final_answer.as_deref() {
            Some(answer) if !answer.is_empty() => format!("{}\n\n{}", answer, note),
            _ => note,
        };

        let state = state.merge(
            StateDelta::new()
                .final_answer(answer.clone())
                .complete(true)
                .truncated(true),
        );
        ctx.emit(AgentEvent::Truncated { hops }).await;
        ctx.emit(AgentEvent::Answer { text: answer }).await;
        Ok((state, hops))
    }
}

#[async_trait]
impl Agent for CompiledGraph {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, input: String) -> Result<String, TrellisError> {
        let state = WorkflowState::new(uuid::Uuid::new_v4().to_string()).merge(StateDelta::user_turn(&input));
        let output = self.execute(state, RunOptions::default()).await?;
        Ok(output.state.final_answer.unwrap_or_default())
    }

    async fn run_stream(&self, input: String, tx: mpsc::Sender<AgentEvent>) -> Result<String, TrellisError> {
        let state = WorkflowState::new(uuid::Uuid::new_v4().to_string()).merge(StateDelta::user_turn(&input));
        let output = self.execute(state, RunOptions::default().with_events(tx)).await?;
        Ok(output.state.final_answer.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trellis::workflow::graph::{GraphBuilder, RouteLabel};
    use crate::trellis::workflow::state::ConversationMessage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Appends a message naming itself
    struct Say(&'static str);

    #[async_trait]
    impl Node for Say {
        fn id(&self) -> &str {
            self.0
        }

        async fn run(&self, _state: &WorkflowState, ctx: &RunContext) -> Result<StateDelta, TrellisError> {
            Ok(StateDelta::new().message(ConversationMessage::agent(format!("{}@{}", self.0, ctx.hop), self.0)))
        }
    }

    /// Counts its invocations into an extension field
    struct Counter {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl Node for Counter {
        fn id(&self) -> &str {
            "counter"
        }

        async fn run(&self, state: &WorkflowState, _ctx: &RunContext) -> Result<StateDelta, TrellisError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let n = state.extension::<u64>("count").unwrap_or(0) + 1;
            Ok(StateDelta::new().extension("count", serde_json::json!(n)))
        }
    }

    /// Sets the final answer and completes
    struct Done;

    #[async_trait]
    impl Node for Done {
        fn id(&self) -> &str {
            "done"
        }

        async fn run(&self, state: &WorkflowState, _ctx: &RunContext) -> Result<StateDelta, TrellisError> {
            let count = state.extension::<u64>("count").unwrap_or(0);
            Ok(StateDelta::new().final_answer(format!("counted {}", count)).complete(true))
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq)]
    enum Loop {
        Again,
        Stop,
    }

    impl RouteLabel for Loop {
        const ALL: &'static [Self] = &[Loop::Again, Loop::Stop];

        fn as_str(&self) -> &'static str {
            match self {
                Loop::Again => "again",
                Loop::Stop => "stop",
            }
        }
    }

    fn counting_graph(stop_at: u64, max_hops: usize) -> CompiledGraph {
        GraphBuilder::new("counting")
            .add_node(Arc::new(Counter {
                runs: AtomicUsize::new(0),
            }))
            .add_node(Arc::new(Done))
            .set_entry("counter")
            .add_conditional_edges(
                "counter",
                move |s: &WorkflowState| {
                    if s.extension::<u64>("count").unwrap_or(0) >= stop_at {
                        Loop::Stop
                    } else {
                        Loop::Again
                    }
                },
                &[(Loop::Again, "counter"), (Loop::Stop, "done")],
            )
            .set_finalizer("done")
            .max_hops(max_hops)
            .compile()
            .unwrap()
    }

    #[tokio::test]
    async fn test_linear_graph_runs_to_terminal() {
        let graph = GraphBuilder::new("linear")
            .add_node(Arc::new(Say("a")))
            .add_node(Arc::new(Say("b")))
            .set_entry("a")
            .add_edge("a", "b")
            .compile()
            .unwrap();

        let out = graph.execute(WorkflowState::new("s"), RunOptions::default()).await.unwrap();
        let contents: Vec<&str> = out.state.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["a@1", "b@2"]);
        assert_eq!(out.hops, 2);
        assert_eq!(out.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_conditional_loop_uses_post_merge_state() {
        let out = counting_graph(3, 15)
            .execute(WorkflowState::new("s"), RunOptions::default())
            .await
            .unwrap();
        assert_eq!(out.state.final_answer.as_deref(), Some("counted 3"));
        assert_eq!(out.hops, 4);
        assert!(!out.state.truncated);
    }

    #[tokio::test]
    async fn test_hop_limit_truncates_and_finalizes() {
        let out = counting_graph(u64::MAX, 5)
            .execute(WorkflowState::new("s"), RunOptions::default())
            .await
            .unwrap();
        assert_eq!(out.status, RunStatus::Truncated);
        assert_eq!(out.hops, 5);
        assert!(out.state.is_complete);
        assert!(out.state.truncated);
        let answer = out.state.final_answer.unwrap();
        assert!(answer.starts_with("counted 4"));
        assert!(answer.contains("truncated"));
    }

    #[tokio::test]
    async fn test_finalizer_on_last_hop_completes_normally() {
        let out = counting_graph(3, 4)
            .execute(WorkflowState::new("s"), RunOptions::default())
            .await
            .unwrap();
        assert_eq!(out.status, RunStatus::Completed);
        assert_eq!(out.hops, 4);
        assert!(!out.state.truncated);
    }

    #[tokio::test]
    async fn test_hop_limit_without_finalizer() {
        let graph = GraphBuilder::new("looping")
            .add_node(Arc::new(Counter {
                runs: AtomicUsize::new(0),
            }))
            .set_entry("counter")
            .add_edge("counter", "counter")
            .max_hops(3)
            .compile()
            .unwrap();
        let out = graph.execute(WorkflowState::new("s"), RunOptions::default()).await.unwrap();
        assert_eq!(out.status, RunStatus::Truncated);
        assert_eq!(out.hops, 3);
        assert_eq!(out.state.extension::<u64>("count"), Some(3));
    }

    #[tokio::test]
    async fn test_unknown_dynamic_label_fails_fast() {
        let mut routes = HashMap::new();
        routes.insert("known".to_string(), "b".to_string());
        let graph = GraphBuilder::new("dynamic")
            .add_node(Arc::new(Say("a")))
            .add_node(Arc::new(Say("b")))
            .set_entry("a")
            .add_dynamic_edges("a", |_| "mystery".to_string(), routes)
            .compile()
            .unwrap();

        let err = graph.execute(WorkflowState::new("s"), RunOptions::default()).await.unwrap_err();
        assert!(matches!(
            err,
            TrellisError::Graph(GraphError::UnknownRouteLabel { ref node, ref label })
                if node == "a" && label == "mystery"
        ));
    }

    #[tokio::test]
    async fn test_cancelled_run_returns_error() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = counting_graph(3, 15)
            .execute(WorkflowState::new("s"), RunOptions::default().with_cancel(cancel))
            .await
            .unwrap_err();
        assert!(matches!(err, TrellisError::Graph(GraphError::Cancelled { hops: 0 })));
    }

    #[tokio::test]
    async fn test_events_are_streamed() {
        let (tx, mut rx) = mpsc::channel(64);
        let out = counting_graph(1, 15)
            .execute(WorkflowState::new("s"), RunOptions::default().with_events(tx))
            .await
            .unwrap();
        assert_eq!(out.hops, 2);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(
            events.first(),
            Some(&AgentEvent::NodeStarted {
                node: "counter".to_string(),
                hop: 1
            })
        );
        assert!(events.contains(&AgentEvent::Routed {
            from: "counter".to_string(),
            label: "stop".to_string(),
            to: "done".to_string()
        }));
        assert_eq!(
            events.last(),
            Some(&AgentEvent::Answer {
                text: "counted 1".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_failed_status_from_error_message() {
        struct Fails;

        #[async_trait]
        impl Node for Fails {
            fn id(&self) -> &str {
                "fails"
            }

            async fn run(&self, _state: &WorkflowState, _ctx: &RunContext) -> Result<StateDelta, TrellisError> {
                Ok(StateDelta::new().error("model unavailable").complete(true))
            }
        }

        let graph = GraphBuilder::new("failing")
            .add_node(Arc::new(Fails))
            .set_entry("fails")
            .compile()
            .unwrap();
        let out = graph.execute(WorkflowState::new("s"), RunOptions::default()).await.unwrap();
        assert_eq!(out.status, RunStatus::Failed("model unavailable".to_string()));
    }

    #[tokio::test]
    async fn test_graph_as_agent() {
        let graph = counting_graph(2, 15);
        assert_eq!(Agent::name(&graph), "counting");
        assert_eq!(graph.run("go".to_string()).await.unwrap(), "counted 2");
    }
}
