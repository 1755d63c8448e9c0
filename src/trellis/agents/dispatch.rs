// SPDX-License-Identifier: MIT

//! Multi-agent dispatch
//!
//! ```text
//! router --booking-----> booking_agent -----\
//!        --complaint---> complaint_agent ----+--complete--> finalize
//!        --information-> information_agent -/
//!        --complete--------------------------------------> finalize
//! each specialist --continue--> router
//! ```

use super::booking::{BookingNode, BOOKING_NODE};
use super::complaint::{ComplaintNode, COMPLAINT_NODE};
use super::finalizer::{FinalizerNode, FINALIZE_NODE};
use super::information::{InformationNode, INFORMATION_NODE};
use super::router::{route_to_agent, Classifier, DispatchRoute, RouterNode, ROUTER_NODE};
use crate::adk::error::GraphError;
use crate::adk::model::ModelCaller;
use crate::trellis::workflow::graph::{CompiledGraph, GraphBuilder, Node, RouteLabel};
use crate::trellis::workflow::registry::ToolRegistry;
use crate::trellis::workflow::state::WorkflowState;
use std::sync::Arc;
use std::time::Duration;

/// Where a specialist goes next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialistRoute {
    Continue,
    Complete,
}

impl RouteLabel for SpecialistRoute {
    const ALL: &'static [Self] = &[SpecialistRoute::Continue, SpecialistRoute::Complete];

    fn as_str(&self) -> &'static str {
        match self {
            SpecialistRoute::Continue => "continue",
            SpecialistRoute::Complete => "complete",
        }
    }
}

/// Back to the router only when a specialist asked for it and the run is
/// still open
pub fn route_after_specialist(state: &WorkflowState) -> SpecialistRoute {
    if state.reroute_requested && !state.is_complete {
        SpecialistRoute::Continue
    } else {
        SpecialistRoute::Complete
    }
}

/// Tunables for the dispatch graph
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub tool_timeout: Duration,
    pub specialist_tool_rounds: usize,
    pub finalize_window: usize,
    pub max_hops: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            tool_timeout: Duration::from_secs(30),
            specialist_tool_rounds: 3,
            finalize_window: 3,
            max_hops: crate::trellis::workflow::graph::DEFAULT_MAX_HOPS,
        }
    }
}

/// The three specialist nodes. Each must report the id of the slot it fills
/// (`booking_agent`, `complaint_agent`, `information_agent`).
pub struct Specialists {
    pub booking: Arc<dyn Node>,
    pub complaint: Arc<dyn Node>,
    pub information: Arc<dyn Node>,
}

impl Specialists {
    /// The reference travel specialists
    pub fn standard(caller: ModelCaller, registry: ToolRegistry, settings: &DispatchSettings) -> Self {
        Self {
            booking: Arc::new(BookingNode::new(caller.clone())),
            complaint: Arc::new(ComplaintNode::new(caller.clone())),
            information: Arc::new(InformationNode::new(
                caller,
                registry,
                settings.tool_timeout,
                settings.specialist_tool_rounds,
            )),
        }
    }
}

/// Build the router/specialists/finalize graph
pub fn dispatch_graph(
    caller: ModelCaller,
    registry: ToolRegistry,
    settings: &DispatchSettings,
) -> Result<CompiledGraph, GraphError> {
    let specialists = Specialists::standard(caller.clone(), registry, settings);
    dispatch_graph_with(caller, specialists, settings)
}

/// Same wiring as [`dispatch_graph`] around caller-supplied specialists
pub fn dispatch_graph_with(
    caller: ModelCaller,
    specialists: Specialists,
    settings: &DispatchSettings,
) -> Result<CompiledGraph, GraphError> {
    let specialist_routes = [
        (SpecialistRoute::Continue, ROUTER_NODE),
        (SpecialistRoute::Complete, FINALIZE_NODE),
    ];

    GraphBuilder::new("dispatch")
        .add_node(Arc::new(RouterNode::new(Classifier::new(caller))))
        .add_node(specialists.booking)
        .add_node(specialists.complaint)
        .add_node(specialists.information)
        .add_node(Arc::new(FinalizerNode::new(settings.finalize_window)))
        .set_entry(ROUTER_NODE)
        .add_conditional_edges(
            ROUTER_NODE,
            route_to_agent,
            &[
                (DispatchRoute::Booking, BOOKING_NODE),
                (DispatchRoute::Complaint, COMPLAINT_NODE),
                (DispatchRoute::Information, INFORMATION_NODE),
                (DispatchRoute::Complete, FINALIZE_NODE),
            ],
        )
        .add_conditional_edges(BOOKING_NODE, route_after_specialist, &specialist_routes)
        .add_conditional_edges(COMPLAINT_NODE, route_after_specialist, &specialist_routes)
        .add_conditional_edges(INFORMATION_NODE, route_after_specialist, &specialist_routes)
        .set_finalizer(FINALIZE_NODE)
        .max_hops(settings.max_hops)
        .compile()
}
