//! AI Provider Trait and Factory
//!
//! Defines a unified interface for hosted model providers so the agent runner
//! can treat every model the same way. Each adapter normalises its vendor's
//! response into one [`ModelReply`]; callers never probe vendor JSON.
//!
//! Supported providers:
//! - OpenAI (and any OpenAI-compatible chat completions API)
//! - Google Gemini

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::ProviderCredentials;

pub mod gemini_client;
pub mod openai_client;

pub use gemini_client::GeminiClient;
pub use openai_client::OpenAIClient;

// ============================================================================
// Provider Trait
// ============================================================================

#[async_trait]
pub trait Provider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Get the model name
    fn model(&self) -> &str;

    /// Check if the provider is reachable with the configured credentials
    async fn is_available(&self) -> bool;

    /// Run one generation step
    async fn generate(&self, request: &ModelRequest) -> Result<ModelReply, ProviderError>;

    /// Get provider info for display
    fn info(&self) -> ProviderInfo;
}

// ============================================================================
// Request / Reply Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "tool" => Some(Role::Tool),
            _ => None,
        }
    }
}

/// One message of the conversation sent to a model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Tool calls requested by the assistant in this message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// For `Role::Tool`: the call this message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// For `Role::Tool`: the tool that produced this message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn assistant_tool_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::assistant(content)
        }
    }

    pub fn tool_result(call: &ToolCall, result: &serde_json::Value) -> Self {
        Self {
            role: Role::Tool,
            content: result.to_string(),
            tool_calls: Vec::new(),
            tool_call_id: Some(call.id.clone()),
            name: Some(call.name.clone()),
        }
    }
}

/// A function call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Function declaration offered to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments object
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub temperature: Option<f64>,
    pub max_tokens: Option<usize>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: Some(0.7),
            max_tokens: Some(1024),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
    pub options: CompletionOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Normalised model output, identical for every provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelReply {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<TokenUsage>,
}

impl ModelReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub model: String,
    pub supports_tools: bool,
    pub context_window: usize,
}

// ============================================================================
// Provider Errors
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProviderError {
    NotConfigured(String),
    Auth(String),
    RateLimited(String),
    InvalidRequest(String),
    APIError(String),
    MalformedResponse(String),
    NetworkError(String),
    Timeout,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderError::NotConfigured(p) => write!(f, "Provider {} not configured", p),
            ProviderError::Auth(msg) => write!(f, "Authentication failed: {}", msg),
            ProviderError::RateLimited(msg) => write!(f, "Rate limited: {}", msg),
            ProviderError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ProviderError::APIError(msg) => write!(f, "API error: {}", msg),
            ProviderError::MalformedResponse(msg) => write!(f, "Malformed response: {}", msg),
            ProviderError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            ProviderError::Timeout => write!(f, "Request timed out"),
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    /// Classify a non-success HTTP status from a provider
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let detail = format!("Status {}: {}", status, crate::utils::truncate_chars(body, 300));
        match status.as_u16() {
            401 | 403 => ProviderError::Auth(detail),
            429 => ProviderError::RateLimited(detail),
            400 | 404 | 422 => ProviderError::InvalidRequest(detail),
            _ => ProviderError::APIError(detail),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_decode() {
            ProviderError::MalformedResponse(e.to_string())
        } else {
            ProviderError::NetworkError(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(e: serde_json::Error) -> Self {
        ProviderError::MalformedResponse(e.to_string())
    }
}

// ============================================================================
// Provider Type Enum
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAI,
    Gemini,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::OpenAI => write!(f, "openai"),
            ProviderKind::Gemini => write!(f, "gemini"),
        }
    }
}

impl ProviderKind {
    /// Pick the vendor that serves a model identifier
    pub fn for_model(model: &str) -> Self {
        let model = model.trim().to_lowercase();
        if model.starts_with("gemini") || model.starts_with("models/gemini") {
            ProviderKind::Gemini
        } else {
            ProviderKind::OpenAI
        }
    }

    /// Environment variable holding this vendor's API key
    pub fn api_key_var(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "OPENAI_API_KEY",
            ProviderKind::Gemini => "GOOGLE_API_KEY",
        }
    }
}

// ============================================================================
// Provider Factory
// ============================================================================

pub struct ProviderFactory;

impl ProviderFactory {
    /// Create the provider serving `model` from the configured credentials
    pub fn create(
        model: &str,
        credentials: &ProviderCredentials,
    ) -> Result<Arc<dyn Provider>, ProviderError> {
        match ProviderKind::for_model(model) {
            ProviderKind::OpenAI => {
                let api_key = credentials
                    .openai_api_key
                    .as_deref()
                    .ok_or_else(|| ProviderError::NotConfigured("openai".to_string()))?;
                let client = OpenAIClient::new(api_key, model, Some(&credentials.openai_base_url))?
                    .with_organization(
                        credentials.openai_org_id.clone(),
                        credentials.openai_project_id.clone(),
                    );
                Ok(Arc::new(client))
            }
            ProviderKind::Gemini => {
                let api_key = credentials
                    .google_api_key
                    .as_deref()
                    .ok_or_else(|| ProviderError::NotConfigured("gemini".to_string()))?;
                Ok(Arc::new(GeminiClient::new(api_key, model)?))
            }
        }
    }
}
