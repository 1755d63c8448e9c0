// SPDX-License-Identifier: MIT

//! Node implementations and the two graphs built from them
//!
//! - [`tool_loop_graph`] - one agent calling tools until it can answer
//! - [`dispatch_graph`] - a router handing the request to a specialist

pub mod booking;
pub mod complaint;
pub mod dispatch;
pub mod finalizer;
pub mod information;
pub mod router;
pub mod tool_loop;

pub use booking::{BookingNode, BOOKING_NODE};
pub use complaint::{ComplaintNode, COMPLAINT_NODE};
pub use dispatch::{
    dispatch_graph, dispatch_graph_with, route_after_specialist, DispatchSettings, SpecialistRoute, Specialists,
};
pub use finalizer::{FinalizerNode, FINALIZE_NODE};
pub use information::{InformationNode, INFORMATION_NODE};
pub use router::{fallback_classify, route_to_agent, Classifier, DispatchRoute, RouterNode, ROUTER_NODE};
pub use tool_loop::{tool_loop_graph, AgentNode, AgentRoute, ToolsNode, DEFAULT_SYSTEM_PROMPT};
