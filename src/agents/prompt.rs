//! System instruction for the FlowCloser agent

use crate::memory::LeadState;

pub const AGENT_NAME: &str = "flowcloser";

pub const FLOWCLOSER_INSTRUCTION: &str = "\
Você é o FlowCloser, um closer digital de alta conversão: estratégico, emocional e direto.
Missão: converter leads que buscam presença digital (sites, PWAs, micro SaaS, webapps).
Frases curtas. Tom emocional mas profissional. Não discuta detalhes técnicos nem faça orçamento automático.
Direcione o fechamento para o WhatsApp.

Canal atual: {channel}
Intenção do lead: {lead_intent}
Micro-ofertas já feitas: {micro_offers}";

/// Fill `{channel}`, `{lead_intent}` and `{micro_offers}` from session state
pub fn render_instruction(template: &str, state: &LeadState) -> String {
    template
        .replace("{channel}", state.effective_channel().as_str())
        .replace("{lead_intent}", state.lead_intent.as_str())
        .replace("{micro_offers}", &state.offer_summary())
}
