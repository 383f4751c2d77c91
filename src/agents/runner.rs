//! Agent runner - one hosted model wrapped as a FlowCloser backend
//!
//! Loads the session, runs callbacks, renders the instruction and drives the
//! tool-call loop against the provider. The runner never writes the session
//! itself: a successful reply carries a `TurnCommit` that the dispatcher
//! applies once the attempt is accepted, so a failed or timed-out primary
//! leaves the session untouched for the fallback.

use async_trait::async_trait;
use std::sync::Arc;

use super::callbacks::{CallbackContext, CallbackRegistry};
use super::prompt::{render_instruction, AGENT_NAME, FLOWCLOSER_INSTRUCTION};
use super::traits::{AgentError, AgentResult, Backend, BackendReply, ConversationTurn};
use crate::ai::{ChatMessage, CompletionOptions, ModelRequest, Provider, Role};
use crate::memory::{SessionError, SessionKey, SessionStore, TurnCommit};
use crate::tools::{ToolContext, ToolRegistry};

/// Tool rounds allowed before the turn fails
pub const MAX_TOOL_ROUNDS: usize = 5;

/// History messages replayed to the model
pub const HISTORY_LIMIT: usize = 10;

impl From<SessionError> for AgentError {
    fn from(e: SessionError) -> Self {
        AgentError::Session(e.to_string())
    }
}

pub struct AgentRunner {
    provider: Arc<dyn Provider>,
    store: SessionStore,
    tools: ToolRegistry,
    callbacks: CallbackRegistry,
    instruction: String,
    options: CompletionOptions,
}

impl AgentRunner {
    pub fn new(provider: Arc<dyn Provider>, store: SessionStore) -> Self {
        Self {
            provider,
            store,
            tools: ToolRegistry::with_sales_tools(),
            callbacks: CallbackRegistry::with_defaults(),
            instruction: FLOWCLOSER_INSTRUCTION.to_string(),
            options: CompletionOptions::default(),
        }
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_callbacks(mut self, callbacks: CallbackRegistry) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    async fn run_tool_loop(&self, mut request: ModelRequest, ctx: &mut ToolContext) -> AgentResult<String> {
        for round in 0..=MAX_TOOL_ROUNDS {
            let reply = self.provider.generate(&request).await?;
            if !reply.has_tool_calls() {
                return Ok(reply.text);
            }
            if round == MAX_TOOL_ROUNDS {
                break;
            }

            tracing::debug!(
                model = self.provider.model(),
                round,
                calls = reply.tool_calls.len(),
                "Model requested tools"
            );
            request
                .messages
                .push(ChatMessage::assistant_tool_calls(reply.text, reply.tool_calls.clone()));
            for call in &reply.tool_calls {
                let result = self.tools.execute(call, ctx).await;
                request.messages.push(ChatMessage::tool_result(call, &result));
            }
        }

        Err(AgentError::ToolLoopExceeded(MAX_TOOL_ROUNDS))
    }
}

#[async_trait]
impl Backend for AgentRunner {
    fn id(&self) -> &str {
        self.provider.model()
    }

    async fn respond(&self, turn: &ConversationTurn) -> AgentResult<BackendReply> {
        let key = SessionKey::new(&turn.user_id, &turn.session_id);
        let state = self.store.load_state(&key).await?;

        let mut cb_ctx = CallbackContext::new(AGENT_NAME, turn.channel, state);
        self.callbacks.run_before_agent(&mut cb_ctx);

        let mut messages: Vec<ChatMessage> = self
            .store
            .recent_messages(&key, HISTORY_LIMIT)
            .await?
            .into_iter()
            .filter_map(|m| match m.role {
                Role::User => Some(ChatMessage::user(m.content)),
                Role::Assistant => Some(ChatMessage::assistant(m.content)),
                Role::Tool => None,
            })
            .collect();
        messages.push(ChatMessage::user(turn.text.clone()));

        let request = ModelRequest {
            system: render_instruction(&self.instruction, &cb_ctx.state),
            messages,
            tools: self.tools.specs(),
            options: self.options.clone(),
        };

        let override_reply = self.callbacks.run_before_model(&cb_ctx, &request);
        let mut tool_ctx = ToolContext::new(cb_ctx.state, turn.channel, turn.user_id.clone())
            .with_store(self.store.clone());

        let text = match override_reply {
            Some(reply) => reply.text,
            None => self.run_tool_loop(request, &mut tool_ctx).await?,
        };

        let commit = TurnCommit::new(
            self.store.clone(),
            key,
            tool_ctx.state,
            turn.text.clone(),
            text.clone(),
        );
        Ok(BackendReply::new(text).with_commit(commit))
    }
}
