//! Callback System - lifecycle hooks around the agent runner
//!
//! Two hook points are supported:
//! - before the agent runs (may adjust session state)
//! - once per turn, before the first model call (may short-circuit with an
//!   override reply); tool rounds within the turn do not re-run it
//!
//! Callbacks are synchronous and must not fail; they observe and adjust,
//! they never abort a turn.

use std::sync::Arc;

use crate::ai::{ModelReply, ModelRequest, Role};
use crate::channels::Channel;
use crate::memory::LeadState;

// =============================================================================
// Callback Context
// =============================================================================

/// Context passed to callbacks during execution
#[derive(Debug, Clone)]
pub struct CallbackContext {
    /// Invocation ID for correlation
    pub invocation_id: String,
    /// Agent name
    pub agent_name: String,
    /// Channel the current turn arrived on
    pub channel: Channel,
    /// Session state, owned for the duration of the turn
    pub state: LeadState,
}

impl CallbackContext {
    pub fn new(agent_name: &str, channel: Channel, state: LeadState) -> Self {
        Self {
            invocation_id: uuid::Uuid::new_v4().to_string(),
            agent_name: agent_name.to_string(),
            channel,
            state,
        }
    }
}

// =============================================================================
// Callback Traits
// =============================================================================

pub trait AgentCallback: Send + Sync {
    fn name(&self) -> &str;

    fn before_agent(&self, ctx: &mut CallbackContext);
}

pub trait ModelCallback: Send + Sync {
    fn name(&self) -> &str;

    /// Return `Some` to answer without calling the model
    fn before_model(&self, ctx: &CallbackContext, request: &ModelRequest) -> Option<ModelReply>;
}

// =============================================================================
// Registry
// =============================================================================

#[derive(Default, Clone)]
pub struct CallbackRegistry {
    agent: Vec<Arc<dyn AgentCallback>>,
    model: Vec<Arc<dyn ModelCallback>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel detection plus the discount watch
    pub fn with_defaults() -> Self {
        Self::new()
            .on_before_agent(Arc::new(ChannelDetectionCallback))
            .on_before_model(Arc::new(DiscountWatchCallback))
    }

    pub fn on_before_agent(mut self, callback: Arc<dyn AgentCallback>) -> Self {
        self.agent.push(callback);
        self
    }

    pub fn on_before_model(mut self, callback: Arc<dyn ModelCallback>) -> Self {
        self.model.push(callback);
        self
    }

    pub fn run_before_agent(&self, ctx: &mut CallbackContext) {
        for callback in &self.agent {
            tracing::trace!("before_agent: {}", callback.name());
            callback.before_agent(ctx);
        }
    }

    /// First override wins; later callbacks are skipped
    pub fn run_before_model(&self, ctx: &CallbackContext, request: &ModelRequest) -> Option<ModelReply> {
        self.model.iter().find_map(|callback| {
            let reply = callback.before_model(ctx, request);
            if reply.is_some() {
                tracing::info!("Model call overridden by {}", callback.name());
            }
            reply
        })
    }
}

// =============================================================================
// Built-in Callbacks
// =============================================================================

/// Pins the session to the channel of its first turn
pub struct ChannelDetectionCallback;

impl AgentCallback for ChannelDetectionCallback {
    fn name(&self) -> &str {
        "channel_detection"
    }

    fn before_agent(&self, ctx: &mut CallbackContext) {
        if ctx.state.channel.is_none() {
            ctx.state.channel = Some(ctx.channel);
            ctx.state.lead.source = Some(ctx.channel);
            tracing::debug!("Session channel set to {}", ctx.channel);
        }
    }
}

/// Warns when the user asks for a discount; never blocks
pub struct DiscountWatchCallback;

impl DiscountWatchCallback {
    pub fn is_discount_request(text: &str) -> bool {
        let lower = text.to_lowercase();
        lower.contains("desconto") && !lower.contains("não") && !lower.contains("sem")
    }
}

impl ModelCallback for DiscountWatchCallback {
    fn name(&self) -> &str {
        "discount_watch"
    }

    fn before_model(&self, ctx: &CallbackContext, request: &ModelRequest) -> Option<ModelReply> {
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        if Self::is_discount_request(last_user) {
            tracing::warn!(
                invocation_id = %ctx.invocation_id,
                channel = %ctx.channel,
                "Discount request detected"
            );
        }
        None
    }
}
