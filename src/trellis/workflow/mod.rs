// SPDX-License-Identifier: MIT

pub mod graph;
pub mod registry;
pub mod state;
