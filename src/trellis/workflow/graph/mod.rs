// SPDX-License-Identifier: MIT

//! Graph-based workflow execution
//!
//! A graph is a set of named [`Node`]s plus at most one outgoing edge
//! definition per node. Edges are either direct (`from -> to`) or conditional,
//! where a routing function picks a label and the label maps to a target.
//! A node without an outgoing edge is terminal.
//!
//! ```text
//! GraphBuilder --compile()--> CompiledGraph --execute()--> RunOutput
//! ```

mod builder;
mod executor;

pub use builder::{GraphBuilder, DEFAULT_MAX_HOPS};
pub use executor::{CompiledGraph, RunOptions, RunOutput, RunStatus};

use crate::adk::agent::AgentEvent;
use crate::adk::error::TrellisError;
use crate::trellis::workflow::state::{StateDelta, WorkflowState};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A named state-transform step
#[async_trait]
pub trait Node: Send + Sync {
    /// Unique id within a graph
    fn id(&self) -> &str;

    /// Read the current state and return the update to merge into it
    async fn run(&self, state: &WorkflowState, ctx: &RunContext) -> Result<StateDelta, TrellisError>;
}

/// A closed set of labels a conditional edge can produce.
///
/// `ALL` lets the builder check at compile time that every label has a
/// destination.
pub trait RouteLabel: Copy + Send + Sync + 'static {
    const ALL: &'static [Self];

    fn as_str(&self) -> &'static str;
}

/// Per-hop context handed to nodes
#[derive(Clone)]
pub struct RunContext {
    /// 1-based number of the hop being executed
    pub hop: usize,
    pub max_hops: usize,
    events: Option<mpsc::Sender<AgentEvent>>,
    cancel: CancellationToken,
}

impl RunContext {
    pub fn new(max_hops: usize) -> Self {
        Self {
            hop: 0,
            max_hops,
            events: None,
            cancel: CancellationToken::new(),
        }
    }

    pub(crate) fn from_options(options: &RunOptions, max_hops: usize) -> Self {
        Self {
            hop: 0,
            max_hops,
            events: options.events.clone(),
            cancel: options.cancel.clone(),
        }
    }

    /// Send an event if someone is listening. A closed channel is ignored.
    pub async fn emit(&self, event: AgentEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
