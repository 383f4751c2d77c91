//! Lead state carried across turns of one session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::channels::Channel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LeadIntent {
    High,
    Medium,
    Low,
    #[default]
    Unknown,
}

impl LeadIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadIntent::High => "high",
            LeadIntent::Medium => "medium",
            LeadIntent::Low => "low",
            LeadIntent::Unknown => "unknown",
        }
    }

    /// Unrecognised labels collapse to `Unknown`
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "high" => LeadIntent::High,
            "medium" => LeadIntent::Medium,
            "low" => LeadIntent::Low,
            _ => LeadIntent::Unknown,
        }
    }
}

impl std::fmt::Display for LeadIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualificationMetadata {
    pub last_qualified_at: Option<DateTime<Utc>>,
    pub qualification_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadQualification {
    pub intent: LeadIntent,
    pub budget: Option<String>,
    pub timeline: Option<String>,
    pub pain_points: Vec<String>,
    pub source: Option<Channel>,
    pub metadata: QualificationMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MicroOffer {
    pub id: String,
    pub title: String,
    pub description: String,
    pub discount: Option<f64>,
    pub valid_until: Option<String>,
    pub conditions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LeadState {
    pub channel: Option<Channel>,
    pub lead_intent: LeadIntent,
    pub lead: LeadQualification,
    pub micro_offers: Vec<MicroOffer>,
    pub last_offer: Option<MicroOffer>,
    pub escalation_needed: bool,
    pub escalation_reason: Option<String>,
}

impl LeadState {
    /// Channel in effect for CTA decisions
    pub fn effective_channel(&self) -> Channel {
        self.channel.unwrap_or_default()
    }

    /// Offer titles, comma separated, for prompt rendering
    pub fn offer_summary(&self) -> String {
        if self.micro_offers.is_empty() {
            return "nenhuma".to_string();
        }
        self.micro_offers
            .iter()
            .map(|o| o.title.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_parse() {
        assert_eq!(LeadIntent::parse("HIGH"), LeadIntent::High);
        assert_eq!(LeadIntent::parse("buying"), LeadIntent::Unknown);
    }

    #[test]
    fn test_state_tolerates_missing_fields() {
        let state: LeadState = serde_json::from_str(r#"{"channel":"whatsapp"}"#).unwrap();
        assert_eq!(state.channel, Some(Channel::Whatsapp));
        assert_eq!(state.lead_intent, LeadIntent::Unknown);
        assert!(state.micro_offers.is_empty());
    }

    #[test]
    fn test_effective_channel_defaults_to_pwa() {
        assert_eq!(LeadState::default().effective_channel(), Channel::Pwa);
        assert_eq!(LeadState::default().offer_summary(), "nenhuma");
    }
}
