//! Sales tools exposed to the model
//!
//! Tools read and update the session's [`LeadState`] through a [`ToolContext`].
//! Failures never abort a turn: the registry turns them into a JSON error the
//! model can read and react to.

pub mod context;
pub mod lead;
pub mod types;

pub use context::{CheckNeoflowTokenTool, GetChannelContextTool, SearchLeadHistoryTool};
pub use lead::{CreateMicroOfferTool, QualifyLeadTool};
pub use types::{JsonSchema, PropertySchema, ToolDescriptor};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::ai::{ToolCall, ToolSpec};
use crate::channels::Channel;
use crate::memory::{LeadState, SessionStore};

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("{0}")]
    Execution(String),
}

/// Mutable view of the session handed to each tool call
pub struct ToolContext {
    pub state: LeadState,
    pub channel: Channel,
    pub user_id: String,
    pub store: Option<SessionStore>,
}

impl ToolContext {
    pub fn new(state: LeadState, channel: Channel, user_id: impl Into<String>) -> Self {
        Self {
            state,
            channel,
            user_id: user_id.into(),
            store: None,
        }
    }

    pub fn with_store(mut self, store: SessionStore) -> Self {
        self.store = Some(store);
        self
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool descriptor for discovery
    fn descriptor(&self) -> ToolDescriptor;

    /// Execute the tool with given arguments
    async fn execute(&self, arguments: Value, ctx: &mut ToolContext) -> Result<Value, ToolError>;

    /// Reject non-object arguments and missing required fields
    fn validate_arguments(&self, arguments: &Value) -> Result<(), ToolError> {
        let object = arguments
            .as_object()
            .ok_or_else(|| ToolError::InvalidArguments("arguments must be an object".to_string()))?;
        for field in &self.descriptor().input_schema.required {
            match object.get(field) {
                None | Some(Value::Null) => {
                    return Err(ToolError::InvalidArguments(format!(
                        "missing required field '{}'",
                        field
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// Deserialize tool arguments into a typed struct
pub(crate) fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The five FlowCloser sales tools
    pub fn with_sales_tools() -> Self {
        Self::new()
            .register(Arc::new(QualifyLeadTool))
            .register(Arc::new(CreateMicroOfferTool))
            .register(Arc::new(GetChannelContextTool))
            .register(Arc::new(SearchLeadHistoryTool))
            .register(Arc::new(CheckNeoflowTokenTool))
    }

    pub fn register(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.descriptor().name).collect()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.descriptor().to_spec()).collect()
    }

    fn find(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.descriptor().name == name)
    }

    /// Run one model-requested call; errors come back as JSON
    pub async fn execute(&self, call: &ToolCall, ctx: &mut ToolContext) -> Value {
        match self.try_execute(call, ctx).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Tool {} failed: {}", call.name, e);
                json!({ "success": false, "error": e.to_string() })
            }
        }
    }

    async fn try_execute(&self, call: &ToolCall, ctx: &mut ToolContext) -> Result<Value, ToolError> {
        let tool = self
            .find(&call.name)
            .ok_or_else(|| ToolError::UnknownTool(call.name.clone()))?;
        tool.validate_arguments(&call.arguments)?;
        tracing::debug!("Executing tool {}", call.name);
        tool.execute(call.arguments.clone(), ctx).await
    }
}
