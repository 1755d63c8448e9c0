// SPDX-License-Identifier: MIT

//! Booking specialist
//!
//! Pulls trip details out of the request (model first, regex fallback),
//! folds them into the session's `BookingRecord` and summarises it.

use crate::adk::error::TrellisError;
use crate::adk::model::{parse_json_reply, ModelCaller};
use crate::trellis::workflow::graph::{Node, RunContext};
use crate::trellis::workflow::state::{BookingRecord, ConversationMessage, StateDelta, WorkflowState};
use async_trait::async_trait;
use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const BOOKING_NODE: &str = "booking_agent";

/// Extension key holding the latest extraction
pub const BOOKING_REQUEST_KEY: &str = "booking_request";

const BOOKING_PROMPT: &str = r#"You are a travel booking assistant. Extract booking information from the customer's query.

Extract the following information if available:
- destination: Where they want to travel
- departure_date: When they want to leave (in YYYY-MM-DD format)
- return_date: When they want to return (in YYYY-MM-DD format)
- travelers: Number of people traveling (default: 1)
- budget: Their budget range if mentioned
- preferences: Any specific preferences (hotel type, flight class, etc.)

Return only a JSON object with these keys. Use null for anything not mentioned."#;

static DESTINATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:to|in|for|visit|visiting)\s+(\p{Lu}[\p{L}'-]*(?:\s+\p{Lu}[\p{L}'-]*)*)")
        .expect("destination pattern is valid")
});

static TRAVELERS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\s+(?:people|persons?|travell?ers?|adults?|passengers?|guests?|tickets?)\b")
        .expect("travelers pattern is valid")
});

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").expect("date pattern is valid"));

/// Trip details found in one request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookingExtraction {
    pub destination: Option<String>,
    pub departure_date: Option<String>,
    pub return_date: Option<String>,
    pub travelers: Option<u32>,
    pub budget: Option<String>,
    pub preferences: Option<String>,
}

impl BookingExtraction {
    /// Lenient read of a model reply; numbers may arrive as strings
    fn from_value(value: &Value) -> Self {
        let text = |key: &str| -> Option<String> {
            match value.get(key) {
                Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Some(Value::Number(n)) => Some(n.to_string()),
                Some(Value::Array(items)) if !items.is_empty() => Some(
                    items
                        .iter()
                        .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                        .collect::<Vec<_>>()
                        .join(", "),
                ),
                _ => None,
            }
        };
        let travelers = match value.get("travelers") {
            Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };
        Self {
            destination: text("destination"),
            departure_date: text("departure_date"),
            return_date: text("return_date"),
            travelers: travelers.filter(|n| *n > 0),
            budget: text("budget"),
            preferences: text("preferences"),
        }
    }

    /// Regex extraction used when the model is unavailable
    pub fn from_text(query: &str) -> Self {
        let destination = DESTINATION_RE
            .captures(query)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());
        let travelers = TRAVELERS_RE
            .captures(query)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .filter(|n: &u32| *n > 0);
        let mut dates = DATE_RE.find_iter(query).map(|m| m.as_str().to_string());

        Self {
            destination,
            departure_date: dates.next(),
            return_date: dates.next(),
            travelers,
            budget: None,
            preferences: None,
        }
    }
}

/// Fold an extraction into the current record. A booking id is assigned
/// the first time a destination is known.
pub fn update_booking(current: Option<&BookingRecord>, extracted: &BookingExtraction) -> BookingRecord {
    let mut record = current.cloned().unwrap_or_default();
    if let Some(destination) = &extracted.destination {
        record.destination = Some(destination.clone());
    }
    if let Some(date) = &extracted.departure_date {
        record.departure_date = Some(date.clone());
    }
    if let Some(date) = &extracted.return_date {
        record.return_date = Some(date.clone());
    }
    if let Some(travelers) = extracted.travelers {
        record.travelers = travelers;
    }
    if record.booking_id.is_none() && record.destination.is_some() {
        record.booking_id = Some(format!("BK{}", Local::now().format("%Y%m%d%H%M%S")));
    }
    record
}

/// Customer-facing summary of a record
pub fn booking_summary(record: &BookingRecord) -> String {
    let mut parts = vec!["Booking Agent: I've analyzed your booking request.".to_string()];

    let mut details = Vec::new();
    if let Some(destination) = &record.destination {
        details.push(format!("destination: {}", destination));
    }
    if let Some(date) = &record.departure_date {
        details.push(format!("departure: {}", date));
    }
    if let Some(date) = &record.return_date {
        details.push(format!("return: {}", date));
    }
    details.push(format!("travelers: {}", record.travelers));
    parts.push(format!("Trip details ({}).", details.join(", ")));

    match &record.booking_id {
        Some(id) => {
            parts.push(format!("Booking ID: {}.", id));
            parts.push(
                "Your booking is being processed. Would you like me to: \
                 1. Confirm these details and proceed with booking \
                 2. Check availability for these dates \
                 3. Suggest alternative dates or destinations \
                 4. Provide pricing information"
                    .to_string(),
            );
        }
        None => parts.push(
            "I need more information to process your booking. Could you please specify: \
             your destination, travel dates and number of travelers?"
                .to_string(),
        ),
    }

    parts.join(" ")
}

pub struct BookingNode {
    caller: ModelCaller,
}

impl BookingNode {
    pub fn new(caller: ModelCaller) -> Self {
        Self { caller }
    }

    async fn extract(&self, query: &str) -> BookingExtraction {
        let reply = self
            .caller
            .call(BOOKING_PROMPT, &[ConversationMessage::user(query)], &[])
            .await
            .and_then(|reply| parse_json_reply::<Value>(&reply.content));

        match reply {
            Ok(value) => BookingExtraction::from_value(&value),
            Err(e) => {
                log::warn!("Booking extraction via model failed: {}. Using pattern extraction.", e);
                BookingExtraction::from_text(query)
            }
        }
    }
}

#[async_trait]
impl Node for BookingNode {
    fn id(&self) -> &str {
        BOOKING_NODE
    }

    async fn run(&self, state: &WorkflowState, _ctx: &RunContext) -> Result<StateDelta, TrellisError> {
        let extracted = self.extract(&state.current_query).await;
        let record = update_booking(state.booking.as_ref(), &extracted);
        log::info!(
            "Booking {} updated (destination {:?}, travelers {})",
            record.booking_id.as_deref().unwrap_or("<pending>"),
            record.destination,
            record.travelers
        );

        let summary = booking_summary(&record);
        Ok(StateDelta::new()
            .extension(BOOKING_REQUEST_KEY, serde_json::to_value(&extracted)?)
            .booking(record)
            .message(ConversationMessage::agent(summary, BOOKING_NODE)))
    }
}
