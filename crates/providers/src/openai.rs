//! OpenAI `chat/completions` client.
//!
//! Groq and Together expose the same wire shape, so one client serves all
//! three; only the base URL and the provider tag differ.

use crate::error::DispatchError;
use crate::http::{join_url, send_json, shared_client};
use crate::request::{ImageData, Reply, RequestOptions};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::agent_api::TokenUsage;
use shared::settings::ProviderKind;

// ── Request types ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

// ── Response types ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

// ── Conversion ───────────────────────────────────────────────────────

fn to_openai_messages(
    prompt: &str,
    options: &RequestOptions,
    image: Option<&ImageData>,
) -> Vec<serde_json::Value> {
    let mut out = Vec::with_capacity(options.history.len() + 2);

    if let Some(system) = options.combined_system_prompt() {
        out.push(serde_json::json!({ "role": "system", "content": system }));
    }
    for m in options.dialogue() {
        out.push(serde_json::json!({
            "role": m.role.as_str(),
            "content": m.content
        }));
    }

    let user = match image {
        Some(img) => serde_json::json!({
            "role": "user",
            "content": [
                { "type": "text", "text": prompt },
                { "type": "image_url", "image_url": { "url": img.data_url() } }
            ]
        }),
        None => serde_json::json!({ "role": "user", "content": prompt }),
    };
    out.push(user);
    out
}

// ── Client ───────────────────────────────────────────────────────────

pub struct OpenAIClient {
    http: Client,
    provider: ProviderKind,
    auth_token: String,
    model: String,
    base_url: String,
}

impl OpenAIClient {
    /// Default API root for each OpenAI-compatible provider.
    pub fn default_base_url(provider: ProviderKind) -> Option<&'static str> {
        match provider {
            ProviderKind::OpenAi => Some("https://api.openai.com/v1"),
            ProviderKind::Groq => Some("https://api.groq.com/openai/v1"),
            ProviderKind::Together => Some("https://api.together.xyz/v1"),
            _ => None,
        }
    }

    pub fn new(
        provider: ProviderKind,
        api_key: &str,
        options: &RequestOptions,
    ) -> Result<Self, DispatchError> {
        let default_base = Self::default_base_url(provider)
            .ok_or_else(|| DispatchError::UnsupportedProvider(provider.to_string()))?;
        Ok(Self {
            http: shared_client(),
            provider,
            auth_token: api_key.to_string(),
            model: options.model_for(provider),
            base_url: options.base_url_or(default_base).to_string(),
        })
    }

    pub async fn generate(
        &self,
        prompt: &str,
        options: &RequestOptions,
        image: Option<&ImageData>,
    ) -> Result<Reply, DispatchError> {
        let url = join_url(&self.base_url, "chat/completions");
        let req = OpenAIRequest {
            model: self.model.clone(),
            messages: to_openai_messages(prompt, options, image),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };
        let body: OpenAIResponse = send_json(
            self.provider,
            self.http
                .post(&url)
                .bearer_auth(&self.auth_token)
                .json(&req),
        )
        .await?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content);
        let usage = body.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        });
        Reply::new(self.provider, text, usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::agent_api::ChatMessage;

    #[test]
    fn test_messages_put_system_first_and_prompt_last() {
        let opts = RequestOptions {
            system_prompt: Some("sys".into()),
            history: vec![ChatMessage::user("a"), ChatMessage::assistant("b")],
            ..Default::default()
        };
        let msgs = to_openai_messages("c", &opts, None);
        let roles: Vec<&str> = msgs.iter().filter_map(|m| m["role"].as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(msgs[3]["content"], "c");
    }

    #[test]
    fn test_image_becomes_content_parts() {
        let img = ImageData::new("image/jpeg", vec![0xff]);
        let msgs = to_openai_messages("look", &RequestOptions::default(), Some(&img));
        let parts = msgs[0]["content"].as_array().unwrap();
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/jpeg;base64,/w==");
    }

    #[test]
    fn test_non_compatible_provider_rejected() {
        assert!(OpenAIClient::new(ProviderKind::Cohere, "k", &RequestOptions::default()).is_err());
    }
}
