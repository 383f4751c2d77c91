//! FlowCloser facade
//!
//! Wires the configured primary and fallback models into runners, puts the
//! dispatcher in front of them and records guardrail escalations on the
//! session. This is what the HTTP layer and the REPL talk to.

use anyhow::Context;
use std::sync::Arc;

use super::dispatcher::{DispatchError, DispatchResult, Dispatcher};
use super::runner::AgentRunner;
use super::traits::ConversationTurn;
use crate::ai::ProviderFactory;
use crate::config::AppConfig;
use crate::memory::{SessionKey, SessionStore};
use crate::observability::{
    EventSink, FanoutSink, IqaiLogSink, MetricsSink, ResponseClassifier, TracingSink,
};

pub struct FlowCloser {
    dispatcher: Dispatcher,
    store: SessionStore,
}

impl FlowCloser {
    pub fn new(dispatcher: Dispatcher, store: SessionStore) -> Self {
        Self { dispatcher, store }
    }

    /// Build providers, session store and sinks from configuration
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        config.validate()?;

        let store = SessionStore::open(&config.database_url)
            .with_context(|| format!("failed to open session store {}", config.database_url))?;

        let primary = ProviderFactory::create(&config.models.primary, &config.credentials)
            .with_context(|| format!("failed to create primary model {}", config.models.primary))?;
        let fallback = ProviderFactory::create(&config.models.fallback, &config.credentials)
            .with_context(|| format!("failed to create fallback model {}", config.models.fallback))?;

        let dispatcher = Dispatcher::new(
            Arc::new(AgentRunner::new(primary, store.clone())),
            Arc::new(AgentRunner::new(fallback, store.clone())),
            Self::build_sinks(config),
        )
        .with_classifier(ResponseClassifier::new(config.portfolio_url.clone()))
        .with_timeout(config.backend_timeout);

        tracing::info!(
            primary = %config.models.primary,
            fallback = %config.models.fallback,
            timeout_secs = config.backend_timeout.map(|d| d.as_secs()),
            "FlowCloser ready"
        );

        Ok(Self::new(dispatcher, store))
    }

    fn build_sinks(config: &AppConfig) -> Arc<dyn EventSink> {
        let mut sinks = FanoutSink::new()
            .with(Arc::new(TracingSink))
            .with(Arc::new(MetricsSink));
        match IqaiLogSink::from_config(&config.iqai) {
            Some(sink) => sinks = sinks.with(Arc::new(sink)),
            None => tracing::warn!("IQAI_API_KEY not set, remote logging disabled"),
        }
        Arc::new(sinks)
    }

    pub fn primary_id(&self) -> &str {
        self.dispatcher.primary_id()
    }

    pub fn fallback_id(&self) -> &str {
        self.dispatcher.fallback_id()
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Dispatch one turn; escalations are recorded on the session
    pub async fn ask(&self, turn: &ConversationTurn) -> Result<DispatchResult, DispatchError> {
        let result = self.dispatcher.dispatch(turn).await?;

        if let Some(reason) = result.escalation {
            let key = SessionKey::new(&turn.user_id, &turn.session_id);
            if let Err(e) = self.store.mark_escalation(&key, reason.as_str()).await {
                tracing::warn!("Failed to record escalation for {}: {}", turn.user_id, e);
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::traits::{AgentResult, Backend, BackendReply};
    use crate::channels::Channel;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl Backend for Echo {
        fn id(&self) -> &str {
            "echo"
        }

        async fn respond(&self, turn: &ConversationTurn) -> AgentResult<BackendReply> {
            Ok(format!("eco: {}", turn.text).into())
        }
    }

    fn closer(store: SessionStore) -> FlowCloser {
        let dispatcher = Dispatcher::new(Arc::new(Echo), Arc::new(Echo), Arc::new(FanoutSink::new()));
        FlowCloser::new(dispatcher, store)
    }

    #[tokio::test]
    async fn test_escalation_marks_session() {
        let store = SessionStore::in_memory().unwrap();
        let closer = closer(store.clone());
        let turn = ConversationTurn::new("péssimo, não funciona", Channel::Whatsapp, "lead-9")
            .with_session("s1");

        let result = closer.ask(&turn).await.unwrap();
        assert_eq!(result.backend, "guardrail");

        let state = store.load_state(&SessionKey::new("lead-9", "s1")).await.unwrap();
        assert!(state.escalation_needed);
        assert_eq!(state.escalation_reason.as_deref(), Some("user_frustration"));
    }

    #[tokio::test]
    async fn test_normal_turn_does_not_escalate() {
        let store = SessionStore::in_memory().unwrap();
        let closer = closer(store.clone());

        let result = closer
            .ask(&ConversationTurn::new("oi", Channel::Pwa, "lead-10"))
            .await
            .unwrap();
        assert_eq!(result.final_text, "eco: oi");

        let state = store.load_state(&SessionKey::new("lead-10", "default")).await.unwrap();
        assert!(!state.escalation_needed);
    }

    #[test]
    fn test_from_config_requires_keys() {
        let err = FlowCloser::from_config(&AppConfig::default()).err().unwrap();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
