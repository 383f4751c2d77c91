//! Gemini client for text generation with function calling
//! Uses Google's `generateContent` REST endpoint

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ChatMessage, ModelReply, ModelRequest, Provider, ProviderError, ProviderInfo, Role, TokenUsage, ToolCall};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tools>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tools {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<GeminiError>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    candidates_token_count: usize,
    #[serde(default)]
    total_token_count: usize,
}

impl GeminiClient {
    pub fn new(api_key: &str, model: &str) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: model.trim_start_matches("models/").to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            GEMINI_API_BASE, self.model, self.api_key
        )
    }

    fn build_request(&self, request: &ModelRequest) -> GeminiRequest {
        let system_instruction = if request.system.is_empty() {
            None
        } else {
            Some(Content {
                role: None,
                parts: vec![Part::text(&request.system)],
            })
        };

        let tools = if request.tools.is_empty() {
            Vec::new()
        } else {
            vec![Tools {
                function_declarations: request
                    .tools
                    .iter()
                    .map(|t| FunctionDeclaration {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: t.parameters.clone(),
                    })
                    .collect(),
            }]
        };

        GeminiRequest {
            contents: request.messages.iter().map(encode_message).collect(),
            system_instruction,
            tools,
            generation_config: GenerationConfig {
                temperature: request.options.temperature.unwrap_or(0.7),
                max_output_tokens: request.options.max_tokens.unwrap_or(1024),
            },
        }
    }
}

fn encode_message(message: &ChatMessage) -> Content {
    match message.role {
        Role::User => Content {
            role: Some("user".to_string()),
            parts: vec![Part::text(&message.content)],
        },
        Role::Assistant => {
            let mut parts = Vec::new();
            if !message.content.is_empty() {
                parts.push(Part::text(&message.content));
            }
            for call in &message.tool_calls {
                parts.push(Part {
                    function_call: Some(FunctionCall {
                        name: call.name.clone(),
                        args: call.arguments.clone(),
                    }),
                    ..Default::default()
                });
            }
            Content {
                role: Some("model".to_string()),
                parts,
            }
        }
        Role::Tool => {
            // Gemini wants an object here; wrap anything else
            let response = match serde_json::from_str::<Value>(&message.content) {
                Ok(Value::Object(map)) => Value::Object(map),
                Ok(other) => serde_json::json!({ "result": other }),
                Err(_) => serde_json::json!({ "result": message.content }),
            };
            Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    function_response: Some(FunctionResponse {
                        name: message.name.clone().unwrap_or_default(),
                        response,
                    }),
                    ..Default::default()
                }],
            }
        }
    }
}

fn parse_response(response: GeminiResponse) -> Result<ModelReply, ProviderError> {
    if let Some(error) = response.error {
        return Err(ProviderError::APIError(error.message));
    }

    let parts = response
        .candidates
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.content)
        .map(|c| c.parts)
        .ok_or_else(|| ProviderError::MalformedResponse("No candidates in response".to_string()))?;

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for part in parts {
        if let Some(t) = part.text {
            text.push_str(&t);
        }
        if let Some(call) = part.function_call {
            tool_calls.push(ToolCall {
                id: format!("call_{}", tool_calls.len()),
                name: call.name,
                arguments: call.args,
            });
        }
    }

    if text.trim().is_empty() && tool_calls.is_empty() {
        return Err(ProviderError::MalformedResponse(
            "No content in response".to_string(),
        ));
    }

    Ok(ModelReply {
        text,
        tool_calls,
        usage: response.usage_metadata.map(|u| TokenUsage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        }),
    })
}

#[async_trait]
impl Provider for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn is_available(&self) -> bool {
        let ping = ModelRequest {
            messages: vec![ChatMessage::user("ping")],
            options: super::CompletionOptions {
                temperature: Some(0.0),
                max_tokens: Some(8),
            },
            ..Default::default()
        };
        self.generate(&ping).await.is_ok()
    }

    async fn generate(&self, request: &ModelRequest) -> Result<ModelReply, ProviderError> {
        let body = self.build_request(request);

        let response = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, &text));
        }

        let response: GeminiResponse = response.json().await?;
        parse_response(response)
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.name().to_string(),
            model: self.model.clone(),
            supports_tools: true,
            context_window: 1_000_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::providers::ToolSpec;
    use serde_json::json;

    #[test]
    fn test_model_prefix_stripped() {
        let client = GeminiClient::new("k", "models/gemini-2.5-flash").unwrap();
        assert_eq!(client.model(), "gemini-2.5-flash");
        assert!(client
            .endpoint()
            .contains("/models/gemini-2.5-flash:generateContent?key=k"));
    }

    #[test]
    fn test_request_shape() {
        let client = GeminiClient::new("k", "gemini-2.5-flash").unwrap();
        let call = ToolCall {
            id: "call_0".to_string(),
            name: "get_channel_context".to_string(),
            arguments: json!({}),
        };
        let request = ModelRequest {
            system: "closer".to_string(),
            messages: vec![
                ChatMessage::user("oi"),
                ChatMessage::assistant_tool_calls("", vec![call.clone()]),
                ChatMessage::tool_result(&call, &json!({"channel": "pwa"})),
            ],
            tools: vec![ToolSpec {
                name: "get_channel_context".to_string(),
                description: "channel".to_string(),
                parameters: json!({"type": "object", "properties": {}}),
            }],
            ..Default::default()
        };

        let body = serde_json::to_value(client.build_request(&request)).unwrap();
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "closer");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][1]["parts"][0]["functionCall"]["name"], "get_channel_context");
        assert_eq!(body["contents"][2]["parts"][0]["functionResponse"]["response"]["channel"], "pwa");
        assert_eq!(body["tools"][0]["functionDeclarations"][0]["name"], "get_channel_context");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1024);
    }

    #[test]
    fn test_parse_text_and_calls() {
        let raw: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"role": "model", "parts": [
                {"text": "Vou qualificar. "},
                {"functionCall": {"name": "qualify_lead", "args": {"intent": "high"}}}
            ]}}],
            "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 6, "totalTokenCount": 10}
        }))
        .unwrap();

        let reply = parse_response(raw).unwrap();
        assert_eq!(reply.text, "Vou qualificar. ");
        assert_eq!(reply.tool_calls[0].id, "call_0");
        assert_eq!(reply.tool_calls[0].arguments["intent"], "high");
        assert_eq!(reply.usage.unwrap().total_tokens, 10);
    }

    #[test]
    fn test_parse_error_body() {
        let raw: GeminiResponse = serde_json::from_value(json!({
            "error": {"message": "API key not valid"}
        }))
        .unwrap();
        let err = parse_response(raw).unwrap_err();
        assert!(err.to_string().contains("API key not valid"));
    }

    #[test]
    fn test_parse_without_candidates() {
        let raw: GeminiResponse = serde_json::from_value(json!({"candidates": []})).unwrap();
        assert!(matches!(parse_response(raw), Err(ProviderError::MalformedResponse(_))));
    }
}
