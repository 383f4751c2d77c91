//! IQAI remote log sink
//!
//! Posts each dispatch event to the IQAI logging API. The exact endpoint is
//! not fixed, so the known paths are probed in order: a 404 moves on to the
//! next path, any other failure status stops the probe.

use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;

use super::events::{DispatchEvent, EventSink};
use crate::config::IqaiConfig;

const LOG_PATHS: [&str; 4] = ["/api/logs", "/api/log", "/v1/logs", "/v1/log"];

struct Inner {
    client: Client,
    base_url: String,
    api_key: String,
    agent_token_contract: String,
}

pub struct IqaiLogSink {
    inner: Arc<Inner>,
}

impl IqaiLogSink {
    /// `None` when no IQAI API key is configured
    pub fn from_config(config: &IqaiConfig) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        let client = match Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
        {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("IQAI log sink disabled, HTTP client failed: {}", e);
                return None;
            }
        };

        Some(Self {
            inner: Arc::new(Inner {
                client,
                base_url: config.base_url.trim_end_matches('/').to_string(),
                api_key,
                agent_token_contract: config.agent_token_contract.clone(),
            }),
        })
    }

    pub fn endpoints(&self) -> Vec<String> {
        LOG_PATHS
            .iter()
            .map(|p| format!("{}{}", self.inner.base_url, p))
            .collect()
    }

    pub fn payload(&self, event: &DispatchEvent) -> Value {
        build_payload(&self.inner.agent_token_contract, event)
    }
}

fn build_payload(contract: &str, event: &DispatchEvent) -> Value {
    let content = format!(
        "[{}] {} (Model: {}){}",
        event.stage(),
        event.message(),
        event.backend,
        if event.is_fallback { " [FALLBACK]" } else { "" }
    );

    json!({
        "agentTokenContract": contract,
        "content": content,
        "type": if event.is_error() { "Error" } else { "Agent" },
        "metadata": {
            "channel": event.channel,
            "userId": event.user_id,
            "model": event.backend,
            "fallbackUsed": event.is_fallback,
            "timestamp": event.timestamp.to_rfc3339(),
        }
    })
}

impl Inner {
    /// True once an endpoint accepted the log
    async fn deliver(&self, payload: Value) -> bool {
        let mut last_error: Option<String> = None;

        for path in LOG_PATHS {
            let endpoint = format!("{}{}", self.base_url, path);
            let response = self
                .client
                .post(&endpoint)
                .bearer_auth(&self.api_key)
                .json(&payload)
                .send()
                .await;

            match response {
                Ok(r) if r.status().is_success() => {
                    tracing::debug!("IQAI log delivered via {}", endpoint);
                    return true;
                }
                Ok(r) if r.status() == reqwest::StatusCode::NOT_FOUND => continue,
                Ok(r) => {
                    let status = r.status();
                    let text = r.text().await.unwrap_or_default();
                    last_error = Some(format!("{}: {}", status, text));
                    break;
                }
                Err(e) => {
                    last_error = Some(e.to_string());
                }
            }
        }

        match last_error {
            Some(e) => tracing::warn!("IQAI log delivery failed: {}", e),
            None => tracing::warn!("IQAI log delivery failed: no endpoint accepted the log"),
        }
        false
    }
}

impl EventSink for IqaiLogSink {
    fn emit(&self, event: &DispatchEvent) {
        let payload = self.payload(event);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(&self.inner);
                handle.spawn(async move {
                    inner.deliver(payload).await;
                });
            }
            Err(_) => tracing::warn!("IQAI log dropped: no async runtime"),
        }
    }
}
