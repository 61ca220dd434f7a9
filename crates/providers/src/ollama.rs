use crate::error::DispatchError;
use crate::http::{join_url, send_json, shared_client};
use crate::request::{ImageData, Reply, RequestOptions};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::agent_api::TokenUsage;
use shared::settings::ProviderKind;
use std::env;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaMessage>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

pub struct OllamaClient {
    http: Client,
    base: String,
    model: String,
}

impl OllamaClient {
    pub fn new(options: &RequestOptions) -> Self {
        let base = match options.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(url) => url.to_string(),
            None => env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        };
        Self {
            http: shared_client(),
            base,
            model: options.model_for(ProviderKind::Ollama),
        }
    }

    pub async fn generate(
        &self,
        prompt: &str,
        options: &RequestOptions,
        image: Option<&ImageData>,
    ) -> Result<Reply, DispatchError> {
        let mut conversation: Vec<OllamaMessage> = Vec::new();
        if let Some(system) = options.combined_system_prompt() {
            conversation.push(OllamaMessage {
                role: "system".to_string(),
                content: system,
                images: Vec::new(),
            });
        }
        conversation.extend(options.dialogue().map(|m| OllamaMessage {
            role: m.role.as_str().to_string(),
            content: m.content.clone(),
            images: Vec::new(),
        }));
        conversation.push(OllamaMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
            images: image.map(|i| vec![i.base64()]).unwrap_or_default(),
        });

        let url = join_url(&self.base, "api/chat");
        let req = OllamaChatRequest {
            model: &self.model,
            messages: conversation,
            stream: false,
            options: OllamaOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        };
        let body: OllamaChatResponse =
            send_json(ProviderKind::Ollama, self.http.post(url).json(&req)).await?;

        let usage = match (body.prompt_eval_count, body.eval_count) {
            (None, None) => None,
            (p, e) => Some(TokenUsage {
                prompt_tokens: p.unwrap_or(0),
                completion_tokens: e.unwrap_or(0),
            }),
        };
        Reply::new(ProviderKind::Ollama, body.message.map(|m| m.content), usage)
    }
}
