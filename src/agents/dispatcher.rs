//! Model dispatcher with fallback and guardrail interception
//!
//! One turn goes through, in order:
//! 1. the frustration guardrail, which may answer on its own;
//! 2. the primary backend;
//! 3. the fallback backend, only if the primary failed for any reason.
//!
//! Attempts are strictly sequential and there is no retry beyond the single
//! fallback. Every attempt is reported to the event sink.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::guardrail::{EscalationReason, FrustrationGuardrail};
use super::traits::{AgentError, Backend, BackendReply, ConversationTurn};
use crate::observability::{DispatchEvent, EventSink, ResponseClassifier};

/// Backend id reported when the guardrail answered
pub const GUARDRAIL_BACKEND_ID: &str = "guardrail";

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Both backends failed. Primary: {primary}. Fallback: {fallback}")]
    AllBackendsFailed { primary: String, fallback: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Primary,
    Fallback,
}

impl Attempt {
    fn next(self) -> Option<Self> {
        match self {
            Attempt::Primary => Some(Attempt::Fallback),
            Attempt::Fallback => None,
        }
    }

    fn is_fallback(self) -> bool {
        self == Attempt::Fallback
    }
}

/// One backend call
#[derive(Debug)]
pub struct ModelAttempt {
    pub backend: String,
    pub outcome: Result<String, AgentError>,
    pub latency: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
    pub final_text: String,
    pub backend: String,
    pub fallback_used: bool,
    pub escalation: Option<EscalationReason>,
}

pub struct Dispatcher {
    primary: Arc<dyn Backend>,
    fallback: Arc<dyn Backend>,
    guardrail: FrustrationGuardrail,
    classifier: ResponseClassifier,
    events: Arc<dyn EventSink>,
    backend_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(
        primary: Arc<dyn Backend>,
        fallback: Arc<dyn Backend>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            primary,
            fallback,
            guardrail: FrustrationGuardrail::new(),
            classifier: ResponseClassifier::default(),
            events,
            backend_timeout: None,
        }
    }

    pub fn with_classifier(mut self, classifier: ResponseClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Bound every backend call; `None` waits indefinitely
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.backend_timeout = timeout;
        self
    }

    pub fn primary_id(&self) -> &str {
        self.primary.id()
    }

    pub fn fallback_id(&self) -> &str {
        self.fallback.id()
    }

    pub async fn dispatch(&self, turn: &ConversationTurn) -> Result<DispatchResult, DispatchError> {
        let verdict = self.guardrail.classify(&turn.text);
        if let (true, Some(reason), Some(text)) =
            (verdict.escalate, verdict.reason, verdict.intercept_response)
        {
            self.events.emit(&DispatchEvent::escalated(
                GUARDRAIL_BACKEND_ID,
                turn.channel,
                &turn.user_id,
                reason,
            ));
            return Ok(DispatchResult {
                final_text: text,
                backend: GUARDRAIL_BACKEND_ID.to_string(),
                fallback_used: false,
                escalation: Some(reason),
            });
        }

        let mut failures: Vec<ModelAttempt> = Vec::with_capacity(2);
        let mut step = Some(Attempt::Primary);

        while let Some(attempt) = step {
            let result = self.attempt(attempt, turn).await;
            match &result.outcome {
                Ok(text) => {
                    let log = self.classifier.classify_for_log(text);
                    self.events.emit(&DispatchEvent::success(
                        &result.backend,
                        turn.channel,
                        &turn.user_id,
                        attempt.is_fallback(),
                        result.latency,
                        text,
                        log,
                    ));
                    return Ok(DispatchResult {
                        final_text: text.clone(),
                        backend: result.backend,
                        fallback_used: attempt.is_fallback(),
                        escalation: None,
                    });
                }
                Err(e) => {
                    self.events.emit(&DispatchEvent::failure(
                        &result.backend,
                        turn.channel,
                        &turn.user_id,
                        attempt.is_fallback(),
                        result.latency,
                        &e.to_string(),
                    ));
                    failures.push(result);
                    step = attempt.next();
                }
            }
        }

        let mut errors = failures.into_iter().map(|a| match a.outcome {
            Err(e) => e.to_string(),
            Ok(_) => String::new(),
        });
        Err(DispatchError::AllBackendsFailed {
            primary: errors.next().unwrap_or_default(),
            fallback: errors.next().unwrap_or_default(),
        })
    }

    async fn attempt(&self, attempt: Attempt, turn: &ConversationTurn) -> ModelAttempt {
        let backend = match attempt {
            Attempt::Primary => &self.primary,
            Attempt::Fallback => &self.fallback,
        };
        let started = Instant::now();

        let reply = match self.backend_timeout {
            Some(limit) => match tokio::time::timeout(limit, backend.respond(turn)).await {
                Ok(result) => result,
                Err(_) => Err(AgentError::Timeout(limit.as_millis() as u64)),
            },
            None => backend.respond(turn).await,
        };

        // Applied outside the timeout; only an accepted attempt reaches the session
        let outcome = match reply {
            Ok(BackendReply { text, commit: Some(commit) }) => {
                commit.apply().await.map(|_| text).map_err(AgentError::from)
            }
            Ok(BackendReply { text, commit: None }) => Ok(text),
            Err(e) => Err(e),
        };

        ModelAttempt {
            backend: backend.id().to_string(),
            outcome,
            latency: started.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::guardrail::HANDOFF_MESSAGE;
    use crate::agents::traits::AgentResult;
    use crate::ai::ProviderError;
    use crate::channels::Channel;
    use crate::observability::{EventOutcome, ResponseClassifier};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    enum Behavior {
        Reply(&'static str),
        Fail(AgentError),
        Hang,
    }

    struct MockBackend {
        id: &'static str,
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl MockBackend {
        fn new(id: &'static str, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                id,
                behavior,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Backend for MockBackend {
        fn id(&self) -> &str {
            self.id
        }

        async fn respond(&self, _turn: &ConversationTurn) -> AgentResult<BackendReply> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Reply(text) => Ok((*text).into()),
                Behavior::Fail(e) => Err(e.clone()),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok("too late".into())
                }
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<DispatchEvent>>);

    impl EventSink for RecordingSink {
        fn emit(&self, event: &DispatchEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    fn auth_error(msg: &str) -> AgentError {
        AgentError::Provider(ProviderError::Auth(msg.to_string()))
    }

    fn turn(text: &str) -> ConversationTurn {
        ConversationTurn::new(text, Channel::Instagram, "lead-1")
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let primary = MockBackend::new("gpt-4o-mini", Behavior::Reply("Oi! Como posso ajudar?"));
        let fallback = MockBackend::new("gemini-2.5-flash", Behavior::Reply("unused"));
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = Dispatcher::new(primary.clone(), fallback.clone(), sink.clone());

        let result = dispatcher.dispatch(&turn("Quero um site")).await.unwrap();

        assert_eq!(result.final_text, "Oi! Como posso ajudar?");
        assert_eq!(result.backend, "gpt-4o-mini");
        assert!(!result.fallback_used);
        assert_eq!(fallback.calls(), 0);
        assert_eq!(sink.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_primary_failure_uses_fallback() {
        let primary = MockBackend::new("gpt-4o-mini", Behavior::Fail(auth_error("invalid key")));
        let fallback = MockBackend::new("gemini-2.5-flash", Behavior::Reply("Olá!"));
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = Dispatcher::new(primary.clone(), fallback.clone(), sink.clone());

        let result = dispatcher.dispatch(&turn("Oi")).await.unwrap();

        assert_eq!(
            result,
            DispatchResult {
                final_text: "Olá!".to_string(),
                backend: "gemini-2.5-flash".to_string(),
                fallback_used: true,
                escalation: None,
            }
        );
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);

        let events = sink.0.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0].outcome, EventOutcome::Failure { .. }));
        assert!(!events[0].is_fallback);
        assert!(events[1].is_fallback);
    }

    #[tokio::test]
    async fn test_both_failing_names_both_errors() {
        let primary = MockBackend::new("gpt-4o-mini", Behavior::Fail(auth_error("invalid key")));
        let fallback = MockBackend::new(
            "gemini-2.5-flash",
            Behavior::Fail(AgentError::Provider(ProviderError::NetworkError("connection refused".to_string()))),
        );
        let dispatcher = Dispatcher::new(primary.clone(), fallback.clone(), Arc::new(RecordingSink::default()));

        let err = dispatcher.dispatch(&turn("Oi")).await.unwrap_err();
        let message = err.to_string();

        assert!(message.contains("invalid key"));
        assert!(message.contains("connection refused"));
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn test_guardrail_intercepts_before_backends() {
        let primary = MockBackend::new("gpt-4o-mini", Behavior::Reply("unused"));
        let fallback = MockBackend::new("gemini-2.5-flash", Behavior::Reply("unused"));
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = Dispatcher::new(primary.clone(), fallback.clone(), sink.clone());

        let result = dispatcher
            .dispatch(&turn("Isso não funciona, é horrível"))
            .await
            .unwrap();

        assert_eq!(result.final_text, HANDOFF_MESSAGE);
        assert_eq!(result.backend, GUARDRAIL_BACKEND_ID);
        assert!(!result.fallback_used);
        assert_eq!(result.escalation, Some(EscalationReason::UserFrustration));
        assert_eq!(primary.calls() + fallback.calls(), 0);
        assert!(matches!(
            sink.0.lock().unwrap()[0].outcome,
            EventOutcome::Escalated { .. }
        ));
    }

    #[tokio::test]
    async fn test_single_keyword_reaches_primary() {
        let primary = MockBackend::new("gpt-4o-mini", Behavior::Reply("Entendi"));
        let fallback = MockBackend::new("gemini-2.5-flash", Behavior::Reply("unused"));
        let dispatcher = Dispatcher::new(primary.clone(), fallback, Arc::new(RecordingSink::default()));

        let result = dispatcher.dispatch(&turn("Isso é ruim mas ok")).await.unwrap();
        assert_eq!(result.backend, "gpt-4o-mini");
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let primary = MockBackend::new("gpt-4o-mini", Behavior::Hang);
        let fallback = MockBackend::new("gemini-2.5-flash", Behavior::Reply("Olá!"));
        let dispatcher = Dispatcher::new(primary, fallback, Arc::new(RecordingSink::default()))
            .with_timeout(Some(Duration::from_millis(50)));

        let result = dispatcher.dispatch(&turn("Oi")).await.unwrap();
        assert!(result.fallback_used);
        assert_eq!(result.final_text, "Olá!");
    }

    #[tokio::test]
    async fn test_timeout_error_reports_milliseconds() {
        let primary = MockBackend::new("gpt-4o-mini", Behavior::Hang);
        let fallback = MockBackend::new("gemini-2.5-flash", Behavior::Hang);
        let dispatcher = Dispatcher::new(primary, fallback, Arc::new(RecordingSink::default()))
            .with_timeout(Some(Duration::from_millis(50)));

        let message = dispatcher.dispatch(&turn("Oi")).await.unwrap_err().to_string();
        assert!(message.contains("Backend timed out after 50ms"));
        assert!(!message.contains("after 0s"));
    }

    #[tokio::test]
    async fn test_success_event_is_classified() {
        let primary = MockBackend::new("gpt-4o-mini", Behavior::Reply("Veja https://canva.com/x"));
        let fallback = MockBackend::new("gemini-2.5-flash", Behavior::Reply("unused"));
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = Dispatcher::new(primary, fallback, sink.clone())
            .with_classifier(ResponseClassifier::new(None));

        dispatcher.dispatch(&turn("portfolio?")).await.unwrap();

        let events = sink.0.lock().unwrap();
        match &events[0].outcome {
            EventOutcome::Success { log, .. } => assert!(log.contains_portfolio_link),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
