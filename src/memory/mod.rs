//! Memory system using an embedded SQLite database
//! Persists per-session lead state and the conversation history tools search over

pub mod session;
pub mod state;

pub use session::{SessionError, SessionKey, SessionStore, StoredMessage, TurnCommit, APP_NAME};
pub use state::{LeadIntent, LeadQualification, LeadState, MicroOffer, QualificationMetadata};
