// SPDX-License-Identifier: MIT

//! Agent development kit

pub mod agent;
pub mod error;
pub mod message;
pub mod model;
pub mod tool;
