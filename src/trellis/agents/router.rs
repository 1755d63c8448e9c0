// SPDX-License-Identifier: MIT

//! Router - classify a request and pick a specialist
//!
//! The model is asked first. Any failure (transport, timeout, unparseable
//! reply, unknown agent name) falls back to keyword matching, which always
//! produces a decision.

use crate::adk::error::TrellisError;
use crate::adk::model::{parse_json_reply, ModelCaller};
use crate::trellis::workflow::graph::{Node, RouteLabel, RunContext};
use crate::trellis::workflow::state::{AgentKind, ConversationMessage, RoutingDecision, StateDelta, WorkflowState};
use async_trait::async_trait;
use serde::Deserialize;

pub const ROUTER_NODE: &str = "router";

const ROUTER_PROMPT: &str = r#"You are a travel customer service router. Analyze the customer's query and determine which specialized agent should handle it.

Available agents:
- booking: For travel reservations, flight bookings, hotel bookings, tour packages
- complaint: For customer complaints, cancellations, refunds, service issues, problems
- information: For travel information, recommendations, destination info, how-to questions

Return a JSON response with:
- agent: The chosen agent name ("booking", "complaint", "information")
- confidence: A score from 0-1 indicating confidence in the routing decision
- reasoning: Brief explanation of why this agent was chosen

If the query doesn't clearly fit any category, default to "information"."#;

const BOOKING_KEYWORDS: &[&str] = &[
    "book",
    "reserve",
    "booking",
    "flight",
    "hotel",
    "tour",
    "package",
    "vacation",
    "trip",
    "travel",
    "reservation",
    "ticket",
];

const COMPLAINT_KEYWORDS: &[&str] = &[
    "complaint",
    "problem",
    "issue",
    "cancel",
    "refund",
    "delay",
    "wrong",
    "mistake",
    "error",
    "dissatisfied",
    "angry",
    "upset",
    "terrible",
    "awful",
    "horrible",
];

const KEYWORD_CONFIDENCE: f64 = 0.7;
const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Deterministic keyword classification. Booking terms win over complaint
/// terms; anything else is an information request.
pub fn fallback_classify(query: &str) -> RoutingDecision {
    let query = query.to_lowercase();
    if BOOKING_KEYWORDS.iter().any(|k| query.contains(k)) {
        RoutingDecision::new(AgentKind::Booking, KEYWORD_CONFIDENCE, "Detected booking-related keywords")
    } else if COMPLAINT_KEYWORDS.iter().any(|k| query.contains(k)) {
        RoutingDecision::new(
            AgentKind::Complaint,
            KEYWORD_CONFIDENCE,
            "Detected complaint-related keywords",
        )
    } else {
        RoutingDecision::new(AgentKind::Information, DEFAULT_CONFIDENCE, "Defaulting to information agent")
    }
}

#[derive(Debug, Deserialize)]
struct ModelDecision {
    agent: Option<String>,
    confidence: Option<f64>,
    reasoning: Option<String>,
}

/// Maps a query to one of the fixed agent kinds
pub struct Classifier {
    caller: Option<ModelCaller>,
}

impl Classifier {
    pub fn new(caller: ModelCaller) -> Self {
        Self { caller: Some(caller) }
    }

    /// Classifier that never calls a model
    pub fn keyword_only() -> Self {
        Self { caller: None }
    }

    /// Always returns a decision
    pub async fn classify(&self, query: &str) -> RoutingDecision {
        let caller = match &self.caller {
            Some(caller) if !query.trim().is_empty() => caller,
            _ => return fallback_classify(query),
        };

        let reply = match caller.call(ROUTER_PROMPT, &[ConversationMessage::user(query)], &[]).await {
            Ok(reply) => reply,
            Err(e) => {
                log::warn!("Router model call failed: {}. Using fallback routing.", e);
                return fallback_classify(query);
            }
        };

        let decision: ModelDecision = match parse_json_reply(&reply.content) {
            Ok(decision) => decision,
            Err(e) => {
                log::warn!("Router reply unparseable: {}. Using fallback routing.", e);
                return fallback_classify(query);
            }
        };

        let destination = match decision.agent.as_deref() {
            None => AgentKind::Information,
            Some(name) => match AgentKind::parse(name) {
                Some(kind) => kind,
                None => {
                    log::warn!("Router returned unknown agent '{}'. Using fallback routing.", name);
                    return fallback_classify(query);
                }
            },
        };

        RoutingDecision::new(
            destination,
            decision.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            decision
                .reasoning
                .unwrap_or_else(|| "Default routing decision".to_string()),
        )
    }
}

/// Where the router sends the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchRoute {
    Booking,
    Complaint,
    Information,
    Complete,
}

impl RouteLabel for DispatchRoute {
    const ALL: &'static [Self] = &[
        DispatchRoute::Booking,
        DispatchRoute::Complaint,
        DispatchRoute::Information,
        DispatchRoute::Complete,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            DispatchRoute::Booking => "booking",
            DispatchRoute::Complaint => "complaint",
            DispatchRoute::Information => "information",
            DispatchRoute::Complete => "complete",
        }
    }
}

/// Routing function for the router's outgoing edge
pub fn route_to_agent(state: &WorkflowState) -> DispatchRoute {
    if state.is_complete {
        return DispatchRoute::Complete;
    }
    match state.current_agent {
        Some(AgentKind::Booking) => DispatchRoute::Booking,
        Some(AgentKind::Complaint) => DispatchRoute::Complaint,
        Some(AgentKind::Information) => DispatchRoute::Information,
        None => DispatchRoute::Complete,
    }
}

/// Classifies the current query and records the decision
pub struct RouterNode {
    classifier: Classifier,
}

impl RouterNode {
    pub fn new(classifier: Classifier) -> Self {
        Self { classifier }
    }
}

#[async_trait]
impl Node for RouterNode {
    fn id(&self) -> &str {
        ROUTER_NODE
    }

    async fn run(&self, state: &WorkflowState, _ctx: &RunContext) -> Result<StateDelta, TrellisError> {
        let query = if state.current_query.is_empty() {
            state.last_user_message().unwrap_or_default()
        } else {
            state.current_query.as_str()
        };

        let decision = self.classifier.classify(query).await;
        log::info!(
            "Routed to {} (confidence {:.2}): {}",
            decision.destination,
            decision.confidence,
            decision.rationale
        );

        let message = format!(
            "Router: I've analyzed your query and determined this is a {} request. {}",
            decision.destination, decision.rationale
        );

        Ok(StateDelta::new()
            .agent(decision.destination)
            .routing(decision)
            .reroute(false)
            .message(ConversationMessage::agent(message, ROUTER_NODE)))
    }
}
