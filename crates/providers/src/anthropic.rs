use crate::error::DispatchError;
use crate::http::{join_url, send_json, shared_client};
use crate::request::{ImageData, Reply, RequestOptions};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::agent_api::TokenUsage;
use shared::settings::ProviderKind;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The messages API requires `max_tokens`.
const FALLBACK_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicContent>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

pub struct AnthropicClient {
    http: Client,
    auth_token: String,
    model: String,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(api_key: &str, options: &RequestOptions) -> Self {
        Self {
            http: shared_client(),
            auth_token: api_key.to_string(),
            model: options.model_for(ProviderKind::Claude),
            base_url: options.base_url_or(DEFAULT_BASE_URL).to_string(),
        }
    }

    pub async fn generate(
        &self,
        prompt: &str,
        options: &RequestOptions,
        image: Option<&ImageData>,
    ) -> Result<Reply, DispatchError> {
        let url = join_url(&self.base_url, "v1/messages");

        let mut messages: Vec<serde_json::Value> = options
            .dialogue()
            .map(|m| serde_json::json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();
        let user = match image {
            Some(img) => serde_json::json!({
                "role": "user",
                "content": [
                    {
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": img.mime_type,
                            "data": img.base64()
                        }
                    },
                    { "type": "text", "text": prompt }
                ]
            }),
            None => serde_json::json!({ "role": "user", "content": prompt }),
        };
        messages.push(user);

        let req = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: options.max_tokens.unwrap_or(FALLBACK_MAX_TOKENS),
            system: options.combined_system_prompt(),
            temperature: options.temperature,
            messages,
        };

        let body: AnthropicResponse = send_json(
            ProviderKind::Claude,
            self.http
                .post(&url)
                .header("x-api-key", &self.auth_token)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&req),
        )
        .await?;

        let text: String = body
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .filter_map(|c| c.text.as_deref())
            .collect();
        let usage = body.usage.map(|u| TokenUsage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
        });
        Reply::new(ProviderKind::Claude, Some(text), usage)
    }
}
