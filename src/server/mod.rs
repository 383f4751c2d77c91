//! FlowCloser HTTP Server
//!
//! Exposes the conversational agent over REST, receives Instagram webhooks
//! and serves the pages the Meta app review asks for.

pub mod api;
pub mod instagram;
pub mod legal;
pub mod state;

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

pub use crate::config::server::ServerConfig;
pub use state::AppState;

/// FlowCloser server instance
pub struct FlowCloserServer {
    config: ServerConfig,
    state: AppState,
}

impl FlowCloserServer {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Start the HTTP server
    pub async fn start(&self) -> anyhow::Result<()> {
        self.config.validate().map_err(|e| anyhow::anyhow!(e))?;

        let addr: SocketAddr = self
            .config
            .bind_addr()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid address: {}", e))?;

        let app = build_router(self.state.clone(), &self.config);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind: {}", e))?;

        info!("FlowCloser server listening on {}", addr);
        info!("Agent endpoint: http://{}/api/agents/flowcloser/message", addr);
        info!("Instagram webhook: http://{}/api/webhooks/instagram", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

        Ok(())
    }
}

/// Build the Axum router
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let cors = if config.enable_cors {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(api::health_handler))
        .route("/metrics", get(api::metrics_handler))
        .route("/api/agents", get(api::get_agents))
        .route("/api/agents/flowcloser/message", post(api::post_message))
        .route("/api/agents/flowcloser/ghostwriter", post(api::post_ghostwriter))
        .route(
            "/api/webhooks/instagram",
            get(instagram::verify_webhook).post(instagram::receive_webhook),
        )
        .route("/api/auth/instagram/callback", get(instagram::oauth_callback))
        .route("/privacy-policy", get(legal::privacy_policy))
        .route("/terms-of-service", get(legal::terms_of_service))
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Root handler - returns server info
async fn root_handler() -> impl axum::response::IntoResponse {
    axum::Json(serde_json::json!({
        "name": "FlowCloser",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "health": "/health",
            "agents": "/api/agents",
            "message": "/api/agents/flowcloser/message",
            "webhook": "/api/webhooks/instagram"
        }
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Initialize server logging
pub fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "flowcloser_lib=debug,flowcloser_server=debug,tower_http=debug"
    } else {
        "flowcloser_lib=info,flowcloser_server=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::traits::{AgentResult, Backend, BackendReply, ConversationTurn};
    use crate::agents::{AgentError, Dispatcher, FlowCloser};
    use crate::config::AppConfig;
    use crate::memory::{SessionKey, SessionStore};
    use crate::observability::FanoutSink;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct Echo;

    #[async_trait]
    impl Backend for Echo {
        fn id(&self) -> &str {
            "echo"
        }

        async fn respond(&self, turn: &ConversationTurn) -> AgentResult<BackendReply> {
            Ok(format!("[{}:{}] {}", turn.channel, turn.user_id, turn.text).into())
        }
    }

    struct Broken;

    #[async_trait]
    impl Backend for Broken {
        fn id(&self) -> &str {
            "broken"
        }

        async fn respond(&self, _turn: &ConversationTurn) -> AgentResult<BackendReply> {
            Err(AgentError::Config("no key".to_string()))
        }
    }

    fn state_with(backend: Arc<dyn Backend>, config: AppConfig) -> AppState {
        let store = SessionStore::in_memory().unwrap();
        let dispatcher = Dispatcher::new(backend.clone(), backend, Arc::new(FanoutSink::new()));
        AppState::new(
            Arc::new(FlowCloser::new(dispatcher, store)),
            Arc::new(config),
        )
    }

    fn app(state: AppState) -> Router {
        build_router(state, &ServerConfig::default())
    }

    fn echo_app() -> Router {
        app(state_with(Arc::new(Echo), AppConfig::default()))
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        serde_json::from_str(&body_string(response).await).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_server_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8042);
        assert_eq!(config.host, "0.0.0.0");
    }

    #[tokio::test]
    async fn test_health() {
        let response = echo_app().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert!(body["timestamp"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_list_agents() {
        let response = echo_app().oneshot(get("/api/agents")).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["agents"], json!(["flowcloser"]));
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_message_defaults() {
        let response = echo_app()
            .oneshot(post_json("/api/agents/flowcloser/message", json!({"message": "Oi"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["response"], "[api:user] Oi");
        assert_eq!(body["sessionId"], "default");
    }

    #[tokio::test]
    async fn test_message_with_channel_and_session() {
        let request = json!({
            "message": "Quanto custa?",
            "sessionId": "abc",
            "channel": "whatsapp",
            "userId": "5511999"
        });
        let response = echo_app()
            .oneshot(post_json("/api/agents/flowcloser/message", request))
            .await
            .unwrap();

        let body = body_json(response).await;
        assert_eq!(body["response"], "[whatsapp:5511999] Quanto custa?");
        assert_eq!(body["sessionId"], "abc");
    }

    #[tokio::test]
    async fn test_message_required() {
        for body in [json!({}), json!({"message": "   "}), json!({"message": 42})] {
            let response = echo_app()
                .oneshot(post_json("/api/agents/flowcloser/message", body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_json(response).await["error"], "Message is required");
        }
    }

    #[tokio::test]
    async fn test_message_guardrail_escalates() {
        let state = state_with(Arc::new(Echo), AppConfig::default());
        let store = state.closer.store().clone();
        let request = json!({
            "message": "Isso é péssimo e não funciona",
            "userId": "lead-1",
            "sessionId": "s9"
        });

        let response = app(state)
            .oneshot(post_json("/api/agents/flowcloser/message", request))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert!(body["response"].as_str().unwrap().contains("especialista"));

        let saved = store.load_state(&SessionKey::new("lead-1", "s9")).await.unwrap();
        assert!(saved.escalation_needed);
    }

    #[tokio::test]
    async fn test_message_backend_failure_is_500() {
        let response = app(state_with(Arc::new(Broken), AppConfig::default()))
            .oneshot(post_json("/api/agents/flowcloser/message", json!({"message": "Oi"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "Failed to process message");
    }

    #[tokio::test]
    async fn test_ghostwriter() {
        let mut config = AppConfig::default();
        config.portfolio_url = Some("https://canva.com/neoflow".to_string());
        let request = json!({
            "lead": {"name": "Rafa", "projectType": "landing page"},
            "options": {"channel": "instagram", "leadType": "tecnico"}
        });

        let response = app(state_with(Arc::new(Echo), config))
            .oneshot(post_json("/api/agents/flowcloser/ghostwriter", request))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let pitch = body_json(response).await["pitch"].as_str().unwrap().to_string();
        assert!(pitch.starts_with("E aí! 👋 Rafa!"));
        assert!(pitch.contains("https://canva.com/neoflow"));
        assert!(pitch.contains("performance"));
    }

    #[tokio::test]
    async fn test_webhook_verification() {
        let ok = echo_app()
            .oneshot(get(
                "/api/webhooks/instagram?hub.mode=subscribe&hub.verify_token=flowcloser_webhook_neo&hub.challenge=12345",
            ))
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(body_string(ok).await, "12345");

        let wrong = echo_app()
            .oneshot(get(
                "/api/webhooks/instagram?hub.mode=subscribe&hub.verify_token=nope&hub.challenge=12345",
            ))
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::FORBIDDEN);

        let missing = echo_app().oneshot(get("/api/webhooks/instagram")).await.unwrap();
        assert_eq!(missing.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_webhook_events() {
        let event = json!({
            "object": "instagram",
            "entry": [{"messaging": [{"sender": {"id": "777"}, "message": {"text": "Oi"}}]}]
        });
        let response = echo_app()
            .oneshot(post_json("/api/webhooks/instagram", event))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "EVENT_RECEIVED");

        let other = echo_app()
            .oneshot(post_json("/api/webhooks/instagram", json!({"object": "page"})))
            .await
            .unwrap();
        assert_eq!(other.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_oauth_callback_validation() {
        let missing_code = echo_app()
            .oneshot(get("/api/auth/instagram/callback"))
            .await
            .unwrap();
        assert_eq!(missing_code.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(missing_code).await, "Missing authorization code.");

        let unconfigured = echo_app()
            .oneshot(get("/api/auth/instagram/callback?code=abc"))
            .await
            .unwrap();
        assert_eq!(unconfigured.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(unconfigured).await, "Server configuration error.");
    }

    async fn fake_token_endpoint(reply: Value) -> String {
        let graph = Router::new().route(
            "/oauth/access_token",
            axum::routing::get(move || async move { axum::Json(reply) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, graph).await.unwrap();
        });
        format!("http://{}/oauth/access_token", addr)
    }

    fn instagram_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.instagram.app_id = Some("app".to_string());
        config.instagram.app_secret = Some("secret".to_string());
        config.instagram.redirect_uri = Some("https://example.com/cb".to_string());
        config
    }

    #[tokio::test]
    async fn test_oauth_callback_exchange() {
        let token_url = fake_token_endpoint(json!({"access_token": "IGQVJ-token-1234567890"})).await;
        let state = state_with(Arc::new(Echo), instagram_config()).with_token_url(token_url);

        let response = app(state)
            .oneshot(get("/api/auth/instagram/callback?code=abc"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("Autenticado com sucesso!"));
    }

    #[tokio::test]
    async fn test_oauth_callback_provider_error() {
        let token_url =
            fake_token_endpoint(json!({"error": {"message": "Invalid verification code"}})).await;
        let state = state_with(Arc::new(Echo), instagram_config()).with_token_url(token_url);

        let response = app(state)
            .oneshot(get("/api/auth/instagram/callback?code=bad"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await, "Error: Invalid verification code");
    }

    #[tokio::test]
    async fn test_legal_pages_and_metrics() {
        for uri in ["/privacy-policy", "/terms-of-service"] {
            let response = echo_app().oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(body_string(response).await.contains("<h1>"));
        }

        let metrics = echo_app().oneshot(get("/metrics")).await.unwrap();
        assert!(body_string(metrics).await.contains("flowcloser_turns_total"));
    }
}
