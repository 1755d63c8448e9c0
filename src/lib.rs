// SPDX-License-Identifier: MIT

//! trellis-rs: a workflow graph engine for tool-using language-model agents
//!
//! - [`adk`] holds the generic building blocks: errors, messages, tools,
//!   models and the agent contract.
//! - [`trellis`] holds the engine (state, graph, registry), the agent nodes,
//!   sessions and the outer surfaces.

pub mod adk;
pub mod trellis;
