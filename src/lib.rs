//! FlowCloser
//! A sales closer agent: qualifies leads, drafts micro-offers and hands
//! frustrated users to a human, with automatic fallback between two models.

// Agent core
pub mod agents;
pub mod ai;
pub mod channels;
pub mod config;
pub mod memory;
pub mod tools;

// Surfaces
pub mod ghostwriter;
pub mod server;

pub mod observability;
pub mod utils;
