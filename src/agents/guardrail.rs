//! Guardrail - pre-generation frustration check
//!
//! Screens the user's text before any backend runs. When enough distinct
//! frustration markers appear, the turn is answered with a fixed handoff
//! message and flagged for a human.

use serde::{Deserialize, Serialize};

/// Markers counted by the guardrail, matched as lower-case substrings
pub const FRUSTRATION_KEYWORDS: [&str; 6] =
    ["não funciona", "péssimo", "horrível", "odeio", "terrível", "ruim"];

/// Distinct markers needed before the turn is intercepted
pub const FRUSTRATION_THRESHOLD: usize = 2;

pub const HANDOFF_MESSAGE: &str = "Entendo sua frustração. Vou conectar você com um especialista humano agora mesmo. Por favor, aguarde um momento.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    UserFrustration,
}

impl EscalationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationReason::UserFrustration => "user_frustration",
        }
    }
}

impl std::fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of the guardrail for one message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardrailVerdict {
    pub escalate: bool,
    pub reason: Option<EscalationReason>,
    /// Set exactly when `escalate` is true
    pub intercept_response: Option<String>,
}

impl GuardrailVerdict {
    pub fn pass() -> Self {
        Self {
            escalate: false,
            reason: None,
            intercept_response: None,
        }
    }

    pub fn intercept(reason: EscalationReason, response: &str) -> Self {
        Self {
            escalate: true,
            reason: Some(reason),
            intercept_response: Some(response.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FrustrationGuardrail;

impl FrustrationGuardrail {
    pub fn new() -> Self {
        Self
    }

    /// Distinct keywords present in `text`
    pub fn matched_keywords(&self, text: &str) -> Vec<&'static str> {
        let lower = text.to_lowercase();
        FRUSTRATION_KEYWORDS
            .iter()
            .copied()
            .filter(|k| lower.contains(k))
            .collect()
    }

    pub fn classify(&self, text: &str) -> GuardrailVerdict {
        if text.trim().is_empty() {
            return GuardrailVerdict::pass();
        }

        let matched = self.matched_keywords(text);
        if matched.len() >= FRUSTRATION_THRESHOLD {
            tracing::info!(keywords = ?matched, "Guardrail intercepted frustrated user");
            GuardrailVerdict::intercept(EscalationReason::UserFrustration, HANDOFF_MESSAGE)
        } else {
            GuardrailVerdict::pass()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_keywords_escalate() {
        let verdict = FrustrationGuardrail::new().classify("Isso não funciona, é horrível");
        assert!(verdict.escalate);
        assert_eq!(verdict.reason, Some(EscalationReason::UserFrustration));
        assert_eq!(verdict.intercept_response.as_deref(), Some(HANDOFF_MESSAGE));
    }

    #[test]
    fn test_single_keyword_passes() {
        let verdict = FrustrationGuardrail::new().classify("Isso é ruim mas ok");
        assert_eq!(verdict, GuardrailVerdict::pass());
    }

    #[test]
    fn test_repeated_keyword_counts_once() {
        let verdict = FrustrationGuardrail::new().classify("ruim, ruim, muito ruim");
        assert!(!verdict.escalate);
    }

    #[test]
    fn test_case_insensitive() {
        let guardrail = FrustrationGuardrail::new();
        assert!(guardrail.classify("PÉSSIMO atendimento, ODEIO isso").escalate);
    }

    #[test]
    fn test_empty_text_never_escalates() {
        let guardrail = FrustrationGuardrail::new();
        assert!(!guardrail.classify("").escalate);
        assert!(!guardrail.classify("   ").escalate);
    }

    #[test]
    fn test_escalate_implies_response() {
        let guardrail = FrustrationGuardrail::new();
        for text in ["odeio, terrível", "tudo certo", "péssimo e ruim"] {
            let verdict = guardrail.classify(text);
            assert_eq!(verdict.escalate, verdict.intercept_response.is_some());
        }
    }

    #[test]
    fn test_reason_serializes_snake_case() {
        let json = serde_json::to_string(&EscalationReason::UserFrustration).unwrap();
        assert_eq!(json, "\"user_frustration\"");
    }
}
