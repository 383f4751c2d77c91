//! Agent trait definitions and shared types
//! Core abstractions for the dispatcher and the backends it drives

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ai::ProviderError;
use crate::channels::Channel;
use crate::memory::TurnCommit;

pub const DEFAULT_SESSION_ID: &str = "default";

/// Result type for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

/// Agent error types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentError {
    /// Model provider failed (auth, network, malformed output)
    Provider(ProviderError),
    /// Session state could not be loaded or stored
    Session(String),
    /// Model kept requesting tools past the round limit
    ToolLoopExceeded(usize),
    /// Backend call exceeded the configured bound, in milliseconds
    Timeout(u64),
    /// Invalid state or configuration
    Config(String),
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentError::Provider(e) => write!(f, "{}", e),
            AgentError::Session(msg) => write!(f, "Session error: {}", msg),
            AgentError::ToolLoopExceeded(rounds) => {
                write!(f, "Tool loop exceeded {} rounds", rounds)
            }
            AgentError::Timeout(millis) => write!(f, "Backend timed out after {}ms", millis),
            AgentError::Config(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for AgentError {}

impl From<ProviderError> for AgentError {
    fn from(e: ProviderError) -> Self {
        AgentError::Provider(e)
    }
}

/// One inbound user message plus the context it arrived with
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub text: String,
    pub channel: Channel,
    pub user_id: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(text: impl Into<String>, channel: Channel, user_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            channel,
            user_id: user_id.into(),
            session_id: DEFAULT_SESSION_ID.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }
}

/// Reply text plus the session writes it depends on
///
/// The dispatcher applies `commit` only once the attempt is accepted, so a
/// reply that arrives after the timeout never reaches the session.
pub struct BackendReply {
    pub text: String,
    pub commit: Option<TurnCommit>,
}

impl BackendReply {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            commit: None,
        }
    }

    pub fn with_commit(mut self, commit: TurnCommit) -> Self {
        self.commit = Some(commit);
        self
    }
}

impl std::fmt::Debug for BackendReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendReply")
            .field("text", &self.text)
            .field("pending_commit", &self.commit.is_some())
            .finish()
    }
}

impl From<String> for BackendReply {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<&str> for BackendReply {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// A callable over one hosted model
#[async_trait]
pub trait Backend: Send + Sync {
    /// Identifier reported in results and events (usually the model name)
    fn id(&self) -> &str;

    /// Produce the reply for one turn without touching the session
    async fn respond(&self, turn: &ConversationTurn) -> AgentResult<BackendReply>;
}
