// SPDX-License-Identifier: MIT

//! Workflow engine, agent nodes and the surfaces around them

pub mod agents;
pub mod config;
pub mod server;
pub mod service;
pub mod session;
pub mod tools;
pub mod workflow;
