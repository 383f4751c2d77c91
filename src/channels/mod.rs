//! Conversation channels
//!
//! Every inbound message is tagged with the surface it arrived on. Channels
//! drive CTA wording and tone; the sales surfaces (Instagram, WhatsApp, PWA)
//! carry their own profile, everything else borrows the PWA profile.

use serde::{Deserialize, Serialize};

// ============================================================================
// Channel Enum
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Instagram,
    Whatsapp,
    #[default]
    Pwa,
    Terminal,
    Api,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Instagram => "instagram",
            Channel::Whatsapp => "whatsapp",
            Channel::Pwa => "pwa",
            Channel::Terminal => "terminal",
            Channel::Api => "api",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "instagram" => Some(Channel::Instagram),
            "whatsapp" => Some(Channel::Whatsapp),
            "pwa" => Some(Channel::Pwa),
            "terminal" => Some(Channel::Terminal),
            "api" => Some(Channel::Api),
            _ => None,
        }
    }

    /// CTA and tone profile used when adapting replies to this channel
    pub fn profile(&self) -> ChannelProfile {
        match self {
            Channel::Instagram => ChannelProfile {
                name: Channel::Instagram,
                cta_style: CtaStyle::Swipe,
                tone: Tone::Playful,
                cta: "Deslize para ver mais",
            },
            Channel::Whatsapp => ChannelProfile {
                name: Channel::Whatsapp,
                cta_style: CtaStyle::Click,
                tone: Tone::Casual,
                cta: "Clique aqui para continuar",
            },
            Channel::Pwa | Channel::Terminal | Channel::Api => ChannelProfile {
                name: Channel::Pwa,
                cta_style: CtaStyle::Checkout,
                tone: Tone::Professional,
                cta: "Finalize sua compra",
            },
        }
    }

    pub fn all() -> Vec<Channel> {
        vec![
            Channel::Instagram,
            Channel::Whatsapp,
            Channel::Pwa,
            Channel::Terminal,
            Channel::Api,
        ]
    }
}

// ============================================================================
// Channel Profiles
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CtaStyle {
    Swipe,
    Click,
    Checkout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Casual,
    Professional,
    Playful,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    pub name: Channel,
    pub cta_style: CtaStyle,
    pub tone: Tone,
    pub cta: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_from_str() {
        assert_eq!(Channel::from_str("instagram"), Some(Channel::Instagram));
        assert_eq!(Channel::from_str(" WhatsApp "), Some(Channel::Whatsapp));
        assert_eq!(Channel::from_str("telegram"), None);
    }

    #[test]
    fn test_channel_serde_is_lowercase() {
        let json = serde_json::to_string(&Channel::Terminal).unwrap();
        assert_eq!(json, "\"terminal\"");
        let parsed: Channel = serde_json::from_str("\"api\"").unwrap();
        assert_eq!(parsed, Channel::Api);
    }

    #[test]
    fn test_profiles() {
        assert_eq!(Channel::Instagram.profile().cta_style, CtaStyle::Swipe);
        assert_eq!(Channel::Whatsapp.profile().tone, Tone::Casual);
        // Non-sales surfaces borrow the PWA profile
        let profile = Channel::Terminal.profile();
        assert_eq!(profile.name, Channel::Pwa);
        assert_eq!(profile.cta, "Finalize sua compra");
    }
}
