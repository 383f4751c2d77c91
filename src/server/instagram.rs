//! Instagram webhook and OAuth callback routes

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{error, info, warn};

use crate::agents::ConversationTurn;
use crate::channels::Channel;
use crate::server::state::AppState;
use crate::utils::{mask_secret, truncate_chars};

// ============================================================================
// Webhook
// ============================================================================

pub async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token").map(String::as_str);

    if mode == Some("subscribe") && token == Some(state.config.webhook_verify_token.as_str()) {
        info!("Instagram webhook verified");
        let challenge = params.get("hub.challenge").cloned().unwrap_or_default();
        (StatusCode::OK, challenge).into_response()
    } else {
        warn!("Instagram webhook verification rejected");
        StatusCode::FORBIDDEN.into_response()
    }
}

/// Sender id and text of every messaging event carrying text
pub fn extract_messages(body: &Value) -> Vec<(String, String)> {
    body.get("entry")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.get("messaging").and_then(Value::as_array))
        .flatten()
        .filter_map(|event| {
            let text = event.pointer("/message/text")?.as_str()?;
            let sender = event.pointer("/sender/id")?;
            let sender = match sender {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((sender, text.to_string()))
        })
        .collect()
}

pub async fn receive_webhook(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    if body.get("object").and_then(Value::as_str) != Some("instagram") {
        return StatusCode::NOT_FOUND.into_response();
    }

    for (sender, text) in extract_messages(&body) {
        info!("Message from {}: {}", sender, truncate_chars(&text, 120));
        let closer = state.closer.clone();
        tokio::spawn(async move {
            let turn = ConversationTurn::new(text, Channel::Instagram, sender);
            match closer.ask(&turn).await {
                Ok(result) => info!(
                    user_id = %turn.user_id,
                    backend = %result.backend,
                    "Instagram reply: {}",
                    truncate_chars(&result.final_text, 200)
                ),
                Err(e) => error!("Error processing Instagram message: {}", e),
            }
        });
    }

    (StatusCode::OK, "EVENT_RECEIVED").into_response()
}

// ============================================================================
// OAuth callback
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<TokenError>,
}

#[derive(Debug, Deserialize)]
struct TokenError {
    message: Option<String>,
}

const AUTH_SUCCESS_PAGE: &str = r#"<html>
  <head>
    <title>Instagram Auth Success</title>
    <style>
      body { font-family: Arial, sans-serif; text-align: center; padding: 50px; background: #f5f5f5; }
      .success { background: white; padding: 30px; border-radius: 10px; display: inline-block; box-shadow: 0 2px 10px rgba(0,0,0,0.1); }
      .check { color: #4CAF50; font-size: 48px; }
    </style>
  </head>
  <body>
    <div class="success">
      <div class="check">✓</div>
      <h2>Autenticado com sucesso!</h2>
      <p>Você pode fechar esta janela.</p>
    </div>
  </body>
</html>"#;

pub async fn oauth_callback(State(state): State<AppState>, Query(query): Query<CallbackQuery>) -> Response {
    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Missing authorization code.").into_response();
    };

    let instagram = &state.config.instagram;
    let (Some(app_id), Some(app_secret), Some(redirect_uri)) = (
        instagram.app_id.as_deref(),
        instagram.app_secret.as_deref(),
        instagram.redirect_uri.as_deref(),
    ) else {
        error!("Missing Instagram OAuth configuration");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Server configuration error.").into_response();
    };

    let url = match url::Url::parse_with_params(
        &state.token_url,
        &[
            ("client_id", app_id),
            ("client_secret", app_secret),
            ("redirect_uri", redirect_uri),
            ("code", code.as_str()),
        ],
    ) {
        Ok(url) => url,
        Err(e) => {
            error!("Invalid token endpoint {}: {}", state.token_url, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Server configuration error.").into_response();
        }
    };

    info!("Exchanging Instagram code for access token");
    let data: TokenResponse = match state.http.get(url).send().await {
        Ok(response) => match response.json().await {
            Ok(data) => data,
            Err(e) => {
                error!("Instagram token response unreadable: {}", e);
                return (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e)).into_response();
            }
        },
        Err(e) => {
            error!("Instagram callback error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e)).into_response();
        }
    };

    if let Some(err) = data.error {
        let message = err
            .message
            .unwrap_or_else(|| "Failed to get access token".to_string());
        error!("Instagram OAuth error: {}", message);
        return (StatusCode::BAD_REQUEST, format!("Error: {}", message)).into_response();
    }

    match data.access_token.as_deref() {
        Some(token) => info!("Instagram access token received: {}", mask_secret(token, 10)),
        None => warn!("Instagram token response had no access token"),
    }

    Html(AUTH_SUCCESS_PAGE).into_response()
}
