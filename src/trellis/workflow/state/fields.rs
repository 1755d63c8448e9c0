// SPDX-License-Identifier: MIT

//! Typed state fields shared by the dispatch agents

use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed set of specialist agents a request can be routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Booking,
    Complaint,
    Information,
}

impl AgentKind {
    pub const ALL: [AgentKind; 3] = [AgentKind::Booking, AgentKind::Complaint, AgentKind::Information];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Booking => "booking",
            AgentKind::Complaint => "complaint",
            AgentKind::Information => "information",
        }
    }

    /// Case-insensitive lookup; `None` for anything outside the fixed set
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "booking" => Some(AgentKind::Booking),
            "complaint" => Some(AgentKind::Complaint),
            "information" => Some(AgentKind::Information),
            _ => None,
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the router
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub destination: AgentKind,
    /// Always within `[0, 1]`
    pub confidence: f64,
    pub rationale: String,
}

impl RoutingDecision {
    pub fn new(destination: AgentKind, confidence: f64, rationale: impl Into<String>) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            destination,
            confidence,
            rationale: rationale.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
}

/// Structured booking gathered by the booking agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRecord {
    #[serde(default)]
    pub booking_id: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub departure_date: Option<String>,
    #[serde(default)]
    pub return_date: Option<String>,
    #[serde(default = "default_travelers")]
    pub travelers: u32,
    #[serde(default)]
    pub status: BookingStatus,
    #[serde(default)]
    pub price: Option<f64>,
}

fn default_travelers() -> u32 {
    1
}

impl Default for BookingRecord {
    fn default() -> Self {
        Self {
            booking_id: None,
            destination: None,
            departure_date: None,
            return_date: None,
            travelers: default_travelers(),
            status: BookingStatus::Pending,
            price: None,
        }
    }
}
