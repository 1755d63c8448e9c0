// SPDX-License-Identifier: MIT

//! State management for graph workflows
//!
//! This module provides:
//! - `WorkflowState` - the typed state threaded through a run
//! - `StateDelta` - the partial update a node returns
//! - the typed fields the dispatch agents share

mod fields;
mod store;

pub use crate::adk::message::{ConversationMessage, Role, ToolCallRequest, ToolResult};
pub use fields::{AgentKind, BookingRecord, BookingStatus, RoutingDecision};
pub use store::{StateDelta, WorkflowState};
