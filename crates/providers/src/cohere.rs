use crate::error::DispatchError;
use crate::http::{join_url, send_json, shared_client};
use crate::request::{Reply, RequestOptions};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::agent_api::{Role, TokenUsage};
use shared::settings::ProviderKind;

const DEFAULT_BASE_URL: &str = "https://api.cohere.ai";

#[derive(Debug, Serialize)]
struct CohereTurn {
    role: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
struct CohereRequest {
    model: String,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    chat_history: Vec<CohereTurn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    preamble: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CohereTokens {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CohereMeta {
    #[serde(default)]
    tokens: Option<CohereTokens>,
}

#[derive(Debug, Deserialize)]
struct CohereResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    meta: Option<CohereMeta>,
}

pub struct CohereClient {
    http: Client,
    auth_token: String,
    model: String,
    base_url: String,
}

impl CohereClient {
    pub fn new(api_key: &str, options: &RequestOptions) -> Self {
        Self {
            http: shared_client(),
            auth_token: api_key.to_string(),
            model: options.model_for(ProviderKind::Cohere),
            base_url: options.base_url_or(DEFAULT_BASE_URL).to_string(),
        }
    }

    pub async fn generate(
        &self,
        prompt: &str,
        options: &RequestOptions,
    ) -> Result<Reply, DispatchError> {
        let url = join_url(&self.base_url, "v1/chat");
        let chat_history = options
            .dialogue()
            .map(|m| CohereTurn {
                role: if m.role == Role::Assistant {
                    "CHATBOT"
                } else {
                    "USER"
                },
                message: m.content.clone(),
            })
            .collect();
        let req = CohereRequest {
            model: self.model.clone(),
            message: prompt.to_string(),
            chat_history,
            preamble: options.combined_system_prompt(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        let body: CohereResponse = send_json(
            ProviderKind::Cohere,
            self.http
                .post(&url)
                .bearer_auth(&self.auth_token)
                .json(&req),
        )
        .await?;

        let usage = body.meta.and_then(|m| m.tokens).map(|t| TokenUsage {
            prompt_tokens: t.input_tokens,
            completion_tokens: t.output_tokens,
        });
        Reply::new(ProviderKind::Cohere, body.text, usage)
    }
}
