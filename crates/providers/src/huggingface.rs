//! Hugging Face serverless inference (`text-generation` task).
//!
//! The endpoint takes a single prompt string, so history is flattened into
//! a plain transcript.

use crate::error::DispatchError;
use crate::http::{join_url, send_json, shared_client};
use crate::request::{Reply, RequestOptions};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::agent_api::Role;
use shared::settings::ProviderKind;

const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co";

#[derive(Debug, Serialize)]
struct HfParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_new_tokens: Option<u32>,
    return_full_text: bool,
}

#[derive(Debug, Serialize)]
struct HfRequest {
    inputs: String,
    parameters: HfParameters,
}

#[derive(Debug, Deserialize)]
struct HfGeneration {
    #[serde(default)]
    generated_text: Option<String>,
}

/// The API answers with either a list or a single object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HfResponse {
    Many(Vec<HfGeneration>),
    One(HfGeneration),
}

fn build_transcript(prompt: &str, options: &RequestOptions) -> String {
    let mut out = String::new();
    if let Some(system) = options.combined_system_prompt() {
        out.push_str(&system);
        out.push_str("\n\n");
    }
    for m in options.dialogue() {
        let speaker = if m.role == Role::Assistant {
            "Assistant"
        } else {
            "User"
        };
        out.push_str(&format!("{}: {}\n", speaker, m.content));
    }
    out.push_str(&format!("User: {}\nAssistant:", prompt));
    out
}

pub struct HuggingFaceClient {
    http: Client,
    auth_token: String,
    model: String,
    base_url: String,
}

impl HuggingFaceClient {
    pub fn new(api_key: &str, options: &RequestOptions) -> Self {
        Self {
            http: shared_client(),
            auth_token: api_key.to_string(),
            model: options.model_for(ProviderKind::HuggingFace),
            base_url: options.base_url_or(DEFAULT_BASE_URL).to_string(),
        }
    }

    pub async fn generate(
        &self,
        prompt: &str,
        options: &RequestOptions,
    ) -> Result<Reply, DispatchError> {
        let url = join_url(&self.base_url, &format!("models/{}", self.model));
        let req = HfRequest {
            inputs: build_transcript(prompt, options),
            parameters: HfParameters {
                temperature: options.temperature,
                max_new_tokens: options.max_tokens,
                return_full_text: false,
            },
        };

        let body: HfResponse = send_json(
            ProviderKind::HuggingFace,
            self.http
                .post(&url)
                .bearer_auth(&self.auth_token)
                .json(&req),
        )
        .await?;

        let text = match body {
            HfResponse::Many(list) => list.into_iter().next().and_then(|g| g.generated_text),
            HfResponse::One(g) => g.generated_text,
        };
        Reply::new(
            ProviderKind::HuggingFace,
            text.map(|t| t.trim().to_string()),
            None,
        )
    }
}
