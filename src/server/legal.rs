//! Static legal pages required for the Meta app review

use axum::response::{Html, IntoResponse};

const PRIVACY_POLICY: &str = r#"<!DOCTYPE html>
<html lang="pt-BR">
  <head><meta charset="utf-8"><title>Política de Privacidade - FlowCloser</title></head>
  <body>
    <h1>Política de Privacidade</h1>
    <p>O FlowCloser processa as mensagens enviadas por Instagram, WhatsApp e pela web apenas para responder às suas perguntas sobre nossos serviços.</p>
    <p>Guardamos o histórico da conversa e o estado do atendimento para dar continuidade ao contato. Não vendemos nem compartilhamos esses dados com terceiros, exceto os provedores de IA usados para gerar as respostas.</p>
    <p>Para solicitar a remoção dos seus dados, responda a conversa pedindo a exclusão.</p>
  </body>
</html>"#;

const TERMS_OF_SERVICE: &str = r#"<!DOCTYPE html>
<html lang="pt-BR">
  <head><meta charset="utf-8"><title>Termos de Serviço - FlowCloser</title></head>
  <body>
    <h1>Termos de Serviço</h1>
    <p>O FlowCloser é um assistente automatizado de atendimento comercial. As respostas são geradas por IA e não constituem proposta formal.</p>
    <p>Propostas, prazos e valores só valem quando confirmados por um especialista humano.</p>
    <p>Ao continuar a conversa você concorda com estes termos e com a Política de Privacidade.</p>
  </body>
</html>"#;

pub async fn privacy_policy() -> impl IntoResponse {
    Html(PRIVACY_POLICY)
}

pub async fn terms_of_service() -> impl IntoResponse {
    Html(TERMS_OF_SERVICE)
}
