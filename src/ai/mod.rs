//! AI module - hosted model providers

pub mod providers;

// Re-export commonly used types
pub use providers::{
    ChatMessage, CompletionOptions, GeminiClient, ModelReply, ModelRequest, OpenAIClient,
    Provider, ProviderError, ProviderFactory, ProviderInfo, ProviderKind, Role, ToolCall, ToolSpec,
};
