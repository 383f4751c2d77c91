//! Server State Management
//!
//! Shared, read-only handles for request handlers: the FlowCloser facade,
//! resolved configuration and an outbound HTTP client for the OAuth exchange.

use std::sync::Arc;

use crate::agents::FlowCloser;
use crate::config::AppConfig;

pub const INSTAGRAM_TOKEN_URL: &str = "https://graph.facebook.com/v17.0/oauth/access_token";

#[derive(Clone)]
pub struct AppState {
    pub closer: Arc<FlowCloser>,
    pub config: Arc<AppConfig>,
    pub http: reqwest::Client,
    /// Token endpoint for the Instagram code exchange
    pub token_url: String,
    pub start_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(closer: Arc<FlowCloser>, config: Arc<AppConfig>) -> Self {
        Self {
            closer,
            config,
            http: reqwest::Client::new(),
            token_url: INSTAGRAM_TOKEN_URL.to_string(),
            start_time: chrono::Utc::now(),
        }
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> i64 {
        chrono::Utc::now()
            .signed_duration_since(self.start_time)
            .num_seconds()
    }
}
