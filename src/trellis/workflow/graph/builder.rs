// SPDX-License-Identifier: MIT

//! Graph builder and compile-time validation

use super::executor::CompiledGraph;
use super::{Node, RouteLabel};
use crate::adk::error::GraphError;
use crate::trellis::workflow::state::WorkflowState;
use std::collections::HashMap;
use std::sync::Arc;

/// Default bound on node executions per run
pub const DEFAULT_MAX_HOPS: usize = 15;

pub(crate) type RouterFn = Arc<dyn Fn(&WorkflowState) -> String + Send + Sync>;

/// Outgoing edge definition of one node
#[derive(Clone)]
pub(crate) enum Edge {
    Direct(String),
    Conditional {
        router: RouterFn,
        routes: HashMap<String, String>,
        /// Labels that must be mapped; empty for runtime-checked edges
        required: Vec<&'static str>,
    },
}

impl Edge {
    fn targets(&self) -> Vec<&str> {
        match self {
            Edge::Direct(to) => vec![to.as_str()],
            Edge::Conditional { routes, .. } => routes.values().map(String::as_str).collect(),
        }
    }
}

/// Builds a [`CompiledGraph`]
pub struct GraphBuilder {
    name: String,
    nodes: HashMap<String, Arc<dyn Node>>,
    edges: Vec<(String, Edge)>,
    entry: Option<String>,
    finalizer: Option<String>,
    max_hops: usize,
}

impl GraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: HashMap::new(),
            edges: Vec::new(),
            entry: None,
            finalizer: None,
            max_hops: DEFAULT_MAX_HOPS,
        }
    }

    /// Add a node under its own id. A later node with the same id replaces it.
    pub fn add_node(mut self, node: Arc<dyn Node>) -> Self {
        self.nodes.insert(node.id().to_string(), node);
        self
    }

    pub fn set_entry(mut self, node: &str) -> Self {
        self.entry = Some(node.to_string());
        self
    }

    /// Unconditional edge
    pub fn add_edge(mut self, from: &str, to: &str) -> Self {
        self.edges.push((from.to_string(), Edge::Direct(to.to_string())));
        self
    }

    /// Conditional edge over a closed label set. Every label in `L::ALL`
    /// must appear in `routes`, checked by [`compile`](Self::compile).
    pub fn add_conditional_edges<L, F>(mut self, from: &str, router: F, routes: &[(L, &str)]) -> Self
    where
        L: RouteLabel,
        F: Fn(&WorkflowState) -> L + Send + Sync + 'static,
    {
        let routes = routes
            .iter()
            .map(|(label, to)| (label.as_str().to_string(), to.to_string()))
            .collect();
        let router: RouterFn = Arc::new(move |state: &WorkflowState| router(state).as_str().to_string());
        self.edges.push((
            from.to_string(),
            Edge::Conditional {
                router,
                routes,
                required: L::ALL.iter().map(L::as_str).collect(),
            },
        ));
        self
    }

    /// Conditional edge over free-form labels. A label missing from `routes`
    /// is only detected when it is produced, and aborts the run.
    pub fn add_dynamic_edges<F>(mut self, from: &str, router: F, routes: HashMap<String, String>) -> Self
    where
        F: Fn(&WorkflowState) -> String + Send + Sync + 'static,
    {
        self.edges.push((
            from.to_string(),
            Edge::Conditional {
                router: Arc::new(router),
                routes,
                required: Vec::new(),
            },
        ));
        self
    }

    /// Node run when the hop limit is reached. Must be terminal.
    pub fn set_finalizer(mut self, node: &str) -> Self {
        self.finalizer = Some(node.to_string());
        self
    }

    pub fn max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops.max(1);
        self
    }

    /// Validate the graph and freeze it
    pub fn compile(self) -> Result<CompiledGraph, GraphError> {
        let entry = self
            .entry
            .clone()
            .ok_or_else(|| GraphError::MissingEntry(self.name.clone()))?;
        if !self.nodes.contains_key(&entry) {
            return Err(GraphError::NodeNotFound(entry));
        }

        let mut outgoing: HashMap<String, Edge> = HashMap::new();
        for (from, edge) in self.edges {
            if !self.nodes.contains_key(&from) {
                return Err(GraphError::NodeNotFound(from));
            }
            for target in edge.targets() {
                if !self.nodes.contains_key(target) {
                    return Err(GraphError::NodeNotFound(target.to_string()));
                }
            }
            if let Edge::Conditional { routes, required, .. } = &edge {
                if let Some(missing) = required.iter().find(|label| !routes.contains_key(**label)) {
                    return Err(GraphError::IncompleteRouteMap {
                        node: from,
                        label: missing.to_string(),
                    });
                }
            }
            if outgoing.contains_key(&from) {
                return Err(GraphError::DuplicateOutgoing(from));
            }
            outgoing.insert(from, edge);
        }

        if let Some(finalizer) = &self.finalizer {
            if !self.nodes.contains_key(finalizer) {
                return Err(GraphError::NodeNotFound(finalizer.clone()));
            }
            if outgoing.contains_key(finalizer) {
                return Err(GraphError::FinalizerNotTerminal(finalizer.clone()));
            }
        }

        log::debug!(
            "Compiled graph '{}' ({} nodes, entry '{}')",
            self.name,
            self.nodes.len(),
            entry
        );

        Ok(CompiledGraph::new(
            self.name,
            self.nodes,
            outgoing,
            entry,
            self.finalizer,
            self.max_hops,
        ))
    }
}
