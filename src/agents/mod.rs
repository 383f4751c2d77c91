//! FlowCloser agent layer
//! Guardrail, fallback dispatcher and the runner that turns a model into a closer

pub mod callbacks;
pub mod closer;
pub mod dispatcher;
pub mod guardrail;
pub mod prompt;
pub mod runner;
pub mod traits;

pub use closer::FlowCloser;
pub use dispatcher::{DispatchError, DispatchResult, Dispatcher, GUARDRAIL_BACKEND_ID};
pub use guardrail::{EscalationReason, FrustrationGuardrail, GuardrailVerdict};
pub use runner::AgentRunner;
pub use traits::{AgentError, AgentResult, Backend, BackendReply, ConversationTurn};
