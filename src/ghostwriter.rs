//! Ghostwriter - ready-made pitches for humans to send
//!
//! Pure text assembly: channel decides greeting and CTA, lead type decides
//! the value angle.

use serde::{Deserialize, Serialize};

const CLOSING_INVITE: &str = "Quer que monte a cópia + entrega no fluxo completo? Me dá OK e te mando a proposta personalizada no WhatsApp.";
const SIGNATURE: &str = "Isso aqui não é um site. É sua presença inegociável no digital.";
const URGENCY_LINE: &str = "Essas zonas visuais e estrutura de entrega não são repetidas para qualquer um. Só produção de elite.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PitchChannel {
    Instagram,
    Whatsapp,
    #[default]
    Api,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LeadType {
    Tecnico,
    #[default]
    Estetico,
    Gestor,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LeadContext {
    pub name: Option<String>,
    pub project_type: Option<String>,
    pub pain_points: Vec<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitchOptions {
    #[serde(default)]
    pub channel: PitchChannel,
    #[serde(default)]
    pub lead_type: Option<LeadType>,
    #[serde(default)]
    pub urgency: bool,
    #[serde(default = "default_true")]
    pub include_portfolio: bool,
}

impl Default for PitchOptions {
    fn default() -> Self {
        Self {
            channel: PitchChannel::Api,
            lead_type: None,
            urgency: false,
            include_portfolio: true,
        }
    }
}

struct ChannelStyle {
    greeting: &'static str,
    cta: &'static str,
}

impl PitchChannel {
    fn style(&self) -> ChannelStyle {
        match self {
            PitchChannel::Instagram => ChannelStyle {
                greeting: "E aí! 👋",
                cta: "Deslize para ver mais ➡️",
            },
            PitchChannel::Whatsapp => ChannelStyle {
                greeting: "Oi",
                cta: "Quer que eu monte pra você agora?",
            },
            PitchChannel::Api => ChannelStyle {
                greeting: "Olá",
                cta: "Vamos conversar?",
            },
        }
    }
}

impl LeadType {
    fn focus(&self) -> &'static str {
        match self {
            LeadType::Tecnico => "performance, escalabilidade, arquitetura técnica",
            LeadType::Estetico => "design, experiência visual, identidade de marca",
            LeadType::Gestor => "ROI, resultados mensuráveis, gestão de equipe",
        }
    }

    fn value(&self) -> &'static str {
        match self {
            LeadType::Tecnico => "sistema robusto que escala",
            LeadType::Estetico => "presença visual que converte",
            LeadType::Gestor => "solução que entrega resultados",
        }
    }
}

pub fn generate_pitch(lead: &LeadContext, options: &PitchOptions, portfolio_url: Option<&str>) -> String {
    let style = options.channel.style();
    let lead_type = options.lead_type.unwrap_or_default();

    let mut pitch = match &lead.name {
        Some(name) => format!("{} {}!\n\n", style.greeting, name),
        None => format!("{}!\n\n", style.greeting),
    };

    if let Some(pain) = lead.pain_points.first() {
        pitch.push_str(&format!("Vi que você precisa de {}. ", pain));
    }
    pitch.push_str("O que vou te mostrar não é um site comum. É um sistema vivo. ");

    if let Some(url) = portfolio_url.filter(|u| options.include_portfolio && !u.is_empty()) {
        pitch.push_str(&format!(
            "\n\nDá uma olhada nesse flow visual que montei, ele mostra como seu {} pode ficar, com valor e profissionalismo:\n{}\n\n",
            lead.project_type.as_deref().unwrap_or("projeto"),
            url
        ));
    }

    pitch.push_str(&format!("Foco em {}. ", lead_type.focus()));
    pitch.push_str(&format!("O resultado é {}.\n\n", lead_type.value()));

    if options.urgency {
        pitch.push_str(URGENCY_LINE);
        pitch.push_str("\n\n");
    }

    pitch.push_str(style.cta);
    pitch.push_str("\n\n");
    pitch.push_str(CLOSING_INVITE);
    pitch.push_str("\n\n");
    pitch.push_str(SIGNATURE);
    pitch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whatsapp_pitch_for_gestor() {
        let lead = LeadContext {
            name: Some("Ana".to_string()),
            project_type: None,
            pain_points: vec!["um site que venda".to_string(), "outra".to_string()],
        };
        let options = PitchOptions {
            channel: PitchChannel::Whatsapp,
            lead_type: Some(LeadType::Gestor),
            ..Default::default()
        };

        let pitch = generate_pitch(&lead, &options, None);
        assert!(pitch.starts_with("Oi Ana!\n\n"));
        assert!(pitch.contains("Vi que você precisa de um site que venda."));
        assert!(!pitch.contains("outra"));
        assert!(pitch.contains("Foco em ROI"));
        assert!(pitch.contains("Quer que eu monte pra você agora?"));
        assert!(pitch.ends_with(SIGNATURE));
        assert!(!pitch.contains(URGENCY_LINE));
    }

    #[test]
    fn test_portfolio_requires_url_and_flag() {
        let lead = LeadContext {
            project_type: Some("e-commerce".to_string()),
            ..Default::default()
        };
        let url = Some("https://canva.com/neoflow");

        let with = generate_pitch(&lead, &PitchOptions::default(), url);
        assert!(with.contains("como seu e-commerce pode ficar"));
        assert!(with.contains("https://canva.com/neoflow"));

        let without_url = generate_pitch(&lead, &PitchOptions::default(), None);
        assert!(!without_url.contains("flow visual"));

        let disabled = PitchOptions {
            include_portfolio: false,
            ..Default::default()
        };
        assert!(!generate_pitch(&lead, &disabled, url).contains("flow visual"));
    }

    #[test]
    fn test_defaults_to_estetico_and_urgency() {
        let options = PitchOptions {
            channel: PitchChannel::Instagram,
            urgency: true,
            ..Default::default()
        };
        let pitch = generate_pitch(&LeadContext::default(), &options, None);
        assert!(pitch.starts_with("E aí! 👋!"));
        assert!(pitch.contains("presença visual que converte"));
        assert!(pitch.contains(URGENCY_LINE));
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: PitchOptions = serde_json::from_str(r#"{"channel":"whatsapp"}"#).unwrap();
        assert!(options.include_portfolio);
        assert!(!options.urgency);
        assert!(options.lead_type.is_none());
    }
}
