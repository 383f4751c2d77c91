//! Application settings
//!
//! `AppConfig` is resolved once at startup and passed down by reference.
//! Nothing below the binaries reads the process environment.

use std::time::Duration;

use crate::ai::providers::openai_client::DEFAULT_OPENAI_BASE_URL;
use crate::ai::ProviderKind;
use crate::utils::mask_secret;

use super::server::request_timeout_for;
use super::ServerConfig;

pub const DEFAULT_PRIMARY_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_FALLBACK_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_WEBHOOK_VERIFY_TOKEN: &str = "flowcloser_webhook_neo";
pub const DEFAULT_IQAI_BASE_URL: &str = "https://api.iqai.com";
pub const DEFAULT_AGENT_TOKEN_CONTRACT: &str = "0x6C3E3a7aE71AFaf30C89471Cf3080b62a1ad41E4";
pub const DEFAULT_DATABASE_URL: &str = "sqlite:./data/flowcloser.db";
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("model '{model}' requires {var} to be set")]
    MissingKey { model: String, var: &'static str },
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub primary: String,
    pub fallback: String,
}

#[derive(Clone)]
pub struct ProviderCredentials {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_org_id: Option<String>,
    pub openai_project_id: Option<String>,
    pub google_api_key: Option<String>,
}

impl Default for ProviderCredentials {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            openai_org_id: None,
            openai_project_id: None,
            google_api_key: None,
        }
    }
}

impl ProviderCredentials {
    pub fn key_for(&self, kind: ProviderKind) -> Option<&str> {
        match kind {
            ProviderKind::OpenAI => self.openai_api_key.as_deref(),
            ProviderKind::Gemini => self.google_api_key.as_deref(),
        }
    }
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let masked = |k: &Option<String>| k.as_deref().map(|k| mask_secret(k, 4));
        f.debug_struct("ProviderCredentials")
            .field("openai_api_key", &masked(&self.openai_api_key))
            .field("openai_base_url", &self.openai_base_url)
            .field("openai_org_id", &self.openai_org_id)
            .field("openai_project_id", &self.openai_project_id)
            .field("google_api_key", &masked(&self.google_api_key))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct IqaiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub agent_token_contract: String,
}

#[derive(Debug, Clone, Default)]
pub struct InstagramConfig {
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
    pub redirect_uri: Option<String>,
}

// ============================================================================
// AppConfig
// ============================================================================

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub models: ModelSettings,
    pub credentials: ProviderCredentials,
    pub webhook_verify_token: String,
    pub iqai: IqaiConfig,
    pub instagram: InstagramConfig,
    pub portfolio_url: Option<String>,
    pub database_url: String,
    /// Per-backend-call bound; `None` disables it
    pub backend_timeout: Option<Duration>,
    pub server: ServerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            models: ModelSettings {
                primary: DEFAULT_PRIMARY_MODEL.to_string(),
                fallback: DEFAULT_FALLBACK_MODEL.to_string(),
            },
            credentials: ProviderCredentials::default(),
            webhook_verify_token: DEFAULT_WEBHOOK_VERIFY_TOKEN.to_string(),
            iqai: IqaiConfig {
                base_url: DEFAULT_IQAI_BASE_URL.to_string(),
                api_key: None,
                agent_token_contract: DEFAULT_AGENT_TOKEN_CONTRACT.to_string(),
            },
            instagram: InstagramConfig::default(),
            portfolio_url: None,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            backend_timeout: Some(Duration::from_secs(DEFAULT_BACKEND_TIMEOUT_SECS)),
            server: ServerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load `.env` (if any) and resolve from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!("Failed to read .env file: {}", e);
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary variable lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let backend_timeout = match get("FLOWCLOSER_BACKEND_TIMEOUT_SECS") {
            None => defaults.backend_timeout,
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|_| ConfigError::Invalid {
                    key: "FLOWCLOSER_BACKEND_TIMEOUT_SECS",
                    reason: format!("'{}' is not a whole number of seconds", raw),
                })?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
        };

        let mut server = ServerConfig::from_lookup(|key| get(key));
        if get("FLOWCLOSER_REQUEST_TIMEOUT").is_none() {
            if let Some(limit) = backend_timeout {
                server.request_timeout_secs = request_timeout_for(limit.as_secs());
            }
        }

        Ok(Self {
            models: ModelSettings {
                primary: get("LLM_MODEL").unwrap_or(defaults.models.primary),
                fallback: get("LLM_MODEL_FALLBACK").unwrap_or(defaults.models.fallback),
            },
            credentials: ProviderCredentials {
                openai_api_key: get("OPENAI_API_KEY"),
                openai_base_url: get("OPENAI_BASE_URL")
                    .unwrap_or(defaults.credentials.openai_base_url),
                openai_org_id: get("OPENAI_ORG_ID"),
                openai_project_id: get("OPENAI_PROJECT_ID"),
                google_api_key: get("GOOGLE_API_KEY").or_else(|| get("GEMINI_API_KEY")),
            },
            webhook_verify_token: get("WEBHOOK_VERIFY_TOKEN")
                .unwrap_or(defaults.webhook_verify_token),
            iqai: IqaiConfig {
                base_url: get("IQAI_API_BASE_URL").unwrap_or(defaults.iqai.base_url),
                api_key: get("IQAI_API_KEY"),
                agent_token_contract: get("AGENT_TOKEN_CONTRACT")
                    .unwrap_or(defaults.iqai.agent_token_contract),
            },
            instagram: InstagramConfig {
                app_id: get("INSTAGRAM_APP_ID"),
                app_secret: get("INSTAGRAM_APP_SECRET"),
                redirect_uri: get("INSTAGRAM_REDIRECT_URI"),
            },
            portfolio_url: get("PORTFOLIO_URL"),
            database_url: get("FLOWCLOSER_DATABASE_URL").unwrap_or(defaults.database_url),
            backend_timeout,
            server,
        })
    }

    /// Both configured models must have credentials for their vendor
    pub fn validate(&self) -> Result<(), ConfigError> {
        for model in [&self.models.primary, &self.models.fallback] {
            let kind = ProviderKind::for_model(model);
            if self.credentials.key_for(kind).is_none() {
                return Err(ConfigError::MissingKey {
                    model: model.clone(),
                    var: kind.api_key_var(),
                });
            }
        }
        self.server
            .validate()
            .map_err(|reason| ConfigError::Invalid { key: "PORT", reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.models.primary, "gpt-4o-mini");
        assert_eq!(config.models.fallback, "gemini-2.5-flash");
        assert_eq!(config.webhook_verify_token, "flowcloser_webhook_neo");
        assert_eq!(config.backend_timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.server.port, 8042);
        assert_eq!(config.credentials.openai_base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_gemini_key_alias_and_blank_values() {
        let config = AppConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "g-key"),
            ("PORTFOLIO_URL", "   "),
        ]))
        .unwrap();
        assert_eq!(config.credentials.google_api_key.as_deref(), Some("g-key"));
        assert!(config.portfolio_url.is_none());
    }

    #[test]
    fn test_timeout_zero_disables() {
        let config =
            AppConfig::from_lookup(lookup(&[("FLOWCLOSER_BACKEND_TIMEOUT_SECS", "0")])).unwrap();
        assert!(config.backend_timeout.is_none());

        let err = AppConfig::from_lookup(lookup(&[("FLOWCLOSER_BACKEND_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_request_timeout_follows_backend_timeout() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.server.request_timeout_secs, 150);

        let config =
            AppConfig::from_lookup(lookup(&[("FLOWCLOSER_BACKEND_TIMEOUT_SECS", "90")])).unwrap();
        assert_eq!(config.server.request_timeout_secs, 210);

        let config = AppConfig::from_lookup(lookup(&[
            ("FLOWCLOSER_BACKEND_TIMEOUT_SECS", "90"),
            ("FLOWCLOSER_REQUEST_TIMEOUT", "45"),
        ]))
        .unwrap();
        assert_eq!(config.server.request_timeout_secs, 45);
    }

    #[test]
    fn test_invalid_timeout_message_names_variable() {
        let err = AppConfig::from_lookup(lookup(&[("FLOWCLOSER_BACKEND_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value for FLOWCLOSER_BACKEND_TIMEOUT_SECS: 'soon' is not a whole number of seconds"
        );
    }

    #[test]
    fn test_validate_names_missing_variable() {
        let config = AppConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-test")])).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("GOOGLE_API_KEY"));
        assert!(err.to_string().contains("gemini-2.5-flash"));

        let config = AppConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("GOOGLE_API_KEY", "g-key"),
        ]))
        .unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_masks_keys() {
        let config = AppConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-supersecret1234")])).unwrap();
        let printed = format!("{:?}", config.credentials);
        assert!(!printed.contains("supersecret"));
        assert!(printed.contains("***1234"));
    }
}
