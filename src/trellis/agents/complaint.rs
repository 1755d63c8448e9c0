// SPDX-License-Identifier: MIT

//! Complaint specialist

use crate::adk::error::TrellisError;
use crate::adk::model::{parse_json_reply, ModelCaller};
use crate::trellis::workflow::graph::{Node, RunContext};
use crate::trellis::workflow::state::{ConversationMessage, StateDelta, WorkflowState};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

pub const COMPLAINT_NODE: &str = "complaint_agent";

/// Extension key holding the analysis of the latest complaint
pub const COMPLAINT_ANALYSIS_KEY: &str = "complaint_analysis";

const ANALYSIS_PROMPT: &str = r#"You are a customer service specialist handling travel-related complaints. Analyze the customer's complaint and determine:

1. complaint_type: cancellation, refund, delay, service_issue, booking_error, other
2. severity: low, medium, high, critical
3. urgency: immediate_action_required, response_within_24h, routine
4. required_actions: a list drawn from refund, rebooking, compensation, escalation, information

Return only a JSON object with these keys."#;

const SOLUTION_PROMPT: &str = "You are resolving a customer complaint. Provide a professional, empathetic response that \
acknowledges the customer's issue, explains what happened if known, gives a clear solution or next steps, \
offers compensation if appropriate and gives contact information for follow-up.";

const ESCALATION_PROMPT: &str = "You need to escalate this complaint to a supervisor. Summarise the complaint, \
why escalation is needed, the recommended resolution and the urgency level in a few sentences.";

pub const COMPLAINT_FALLBACK_MESSAGE: &str = "I apologize for the inconvenience. I'm having trouble processing your complaint right now. \
Please contact our customer service team directly at support@travelcompany.com or call 1-800-TRAVEL.";

const REFUND_MESSAGE: &str = "Complaint Agent: I'm sorry to hear you're requesting a refund. Let me help you with that.

To process your refund request, I'll need:
1. Your booking reference number
2. Reason for the refund request
3. Preferred refund method (original payment method or travel credit)

If you have your booking details handy, I can process this immediately. Otherwise, I can look up your booking using your email address or phone number.

Refunds are typically processed within 5-7 business days once approved.";

const CANCELLATION_MESSAGE: &str = "Complaint Agent: I understand you need to cancel your booking. I'll help you through this process.

For cancellations, please note:
- Cancellation policies vary by booking type and timing
- Some bookings may be non-refundable
- Early cancellations typically receive higher refund amounts

Could you provide your booking reference number so I can check your specific cancellation terms and process this for you?";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintType {
    Cancellation,
    Refund,
    Delay,
    ServiceIssue,
    BookingError,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    ImmediateActionRequired,
    #[default]
    #[serde(rename = "response_within_24h")]
    ResponseWithin24h,
    Routine,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplaintAnalysis {
    #[serde(default, deserialize_with = "or_default")]
    pub complaint_type: ComplaintType,
    #[serde(default, deserialize_with = "or_default")]
    pub severity: Severity,
    #[serde(default, deserialize_with = "or_default")]
    pub urgency: Urgency,
    #[serde(default)]
    pub required_actions: Vec<String>,
}

/// Unknown or malformed values read as the field's default
fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

impl ComplaintAnalysis {
    /// Keyword analysis used when the model is unavailable
    pub fn from_keywords(query: &str) -> Self {
        let q = query.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| q.contains(w));

        let complaint_type = if has(&["refund", "money back"]) {
            ComplaintType::Refund
        } else if has(&["cancel"]) {
            ComplaintType::Cancellation
        } else if has(&["delay", "late", "missed"]) {
            ComplaintType::Delay
        } else if has(&["wrong", "mistake", "error", "double charged", "overcharged"]) {
            ComplaintType::BookingError
        } else if has(&["rude", "staff", "service", "dirty", "unhelpful"]) {
            ComplaintType::ServiceIssue
        } else {
            ComplaintType::Other
        };

        let severity = if has(&["emergency", "stranded", "stuck", "unsafe", "injured"]) {
            Severity::Critical
        } else if has(&["angry", "furious", "terrible", "horrible", "awful", "unacceptable"]) {
            Severity::High
        } else {
            Severity::Medium
        };

        let urgency = match severity {
            Severity::Critical => Urgency::ImmediateActionRequired,
            Severity::Low => Urgency::Routine,
            _ => Urgency::ResponseWithin24h,
        };

        let required_actions = match complaint_type {
            ComplaintType::Refund | ComplaintType::Cancellation => vec!["refund".to_string()],
            ComplaintType::Delay | ComplaintType::BookingError => vec!["rebooking".to_string()],
            ComplaintType::ServiceIssue => vec!["compensation".to_string()],
            ComplaintType::Other => vec!["information".to_string()],
        };

        Self {
            complaint_type,
            severity,
            urgency,
            required_actions,
        }
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical || self.urgency == Urgency::ImmediateActionRequired
    }
}

pub struct ComplaintNode {
    caller: ModelCaller,
}

impl ComplaintNode {
    pub fn new(caller: ModelCaller) -> Self {
        Self { caller }
    }

    async fn analyze(&self, query: &str) -> ComplaintAnalysis {
        let reply = self
            .caller
            .call(ANALYSIS_PROMPT, &[ConversationMessage::user(query)], &[])
            .await
            .and_then(|reply| parse_json_reply::<ComplaintAnalysis>(&reply.content));
        match reply {
            Ok(analysis) => analysis,
            Err(e) => {
                log::warn!("Complaint analysis via model failed: {}. Using keyword analysis.", e);
                ComplaintAnalysis::from_keywords(query)
            }
        }
    }

    async fn escalate(&self, query: &str) -> String {
        let summary = match self
            .caller
            .call(ESCALATION_PROMPT, &[ConversationMessage::user(query)], &[])
            .await
        {
            Ok(reply) if !reply.content.trim().is_empty() => format!("{}\n\n", reply.content.trim()),
            Ok(_) => String::new(),
            Err(e) => {
                log::warn!("Escalation summary failed: {}", e);
                String::new()
            }
        };

        format!(
            "Complaint Agent: I understand this is a critical issue that requires immediate attention.\n\n\
             {}I have escalated this to our senior customer service team. A representative will contact you \
             within the next hour at the phone number associated with your account.\n\n\
             For urgent matters, you can also call our emergency line at 1-800-TRAVEL-NOW.\n\n\
             We're truly sorry for the inconvenience and will work to resolve this as quickly as possible.",
            summary
        )
    }

    async fn resolve(&self, state: &WorkflowState, analysis: &ComplaintAnalysis) -> String {
        let recent: Vec<&str> = state
            .messages
            .iter()
            .rev()
            .take(3)
            .map(|m| m.content.as_str())
            .collect();
        let context = json!({
            "analysis": analysis,
            "booking_info": state.booking,
            "conversation_history": recent.into_iter().rev().collect::<Vec<_>>(),
        });
        let system = format!("{}\n\nComplaint context: {}", SOLUTION_PROMPT, context);

        match self
            .caller
            .call(&system, &[ConversationMessage::user(&state.current_query)], &[])
            .await
        {
            Ok(reply) if !reply.content.trim().is_empty() => {
                format!("Complaint Agent: {}", reply.content.trim())
            }
            Ok(_) => COMPLAINT_FALLBACK_MESSAGE.to_string(),
            Err(e) => {
                log::warn!("Complaint resolution failed: {}", e);
                COMPLAINT_FALLBACK_MESSAGE.to_string()
            }
        }
    }
}

#[async_trait]
impl Node for ComplaintNode {
    fn id(&self) -> &str {
        COMPLAINT_NODE
    }

    async fn run(&self, state: &WorkflowState, _ctx: &RunContext) -> Result<StateDelta, TrellisError> {
        let analysis = self.analyze(&state.current_query).await;
        log::info!(
            "Complaint analysed: {:?}, severity {:?}, urgency {:?}",
            analysis.complaint_type,
            analysis.severity,
            analysis.urgency
        );

        let response = if analysis.is_critical() {
            self.escalate(&state.current_query).await
        } else {
            match analysis.complaint_type {
                ComplaintType::Refund => REFUND_MESSAGE.to_string(),
                ComplaintType::Cancellation => CANCELLATION_MESSAGE.to_string(),
                _ => self.resolve(state, &analysis).await,
            }
        };

        Ok(StateDelta::new()
            .extension(COMPLAINT_ANALYSIS_KEY, serde_json::to_value(&analysis)?)
            .message(ConversationMessage::agent(response, COMPLAINT_NODE)))
    }
}
