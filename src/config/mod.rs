//! Config module - application and server configuration

pub mod server;
pub mod settings;

// Re-export commonly used types
pub use server::ServerConfig;
pub use settings::{
    AppConfig, ConfigError, IqaiConfig, InstagramConfig, ModelSettings, ProviderCredentials,
};
