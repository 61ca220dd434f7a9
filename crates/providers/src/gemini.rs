use crate::error::DispatchError;
use crate::http::{join_url, send_json, shared_client};
use crate::request::{ImageData, Reply, RequestOptions};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::agent_api::{Role, TokenUsage};
use shared::settings::ProviderKind;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    Inline { inline_data: GeminiInlineData },
}

#[derive(Debug, Serialize)]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsage>,
}

pub struct GeminiClient {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, options: &RequestOptions) -> Self {
        Self {
            http: shared_client(),
            api_key: api_key.to_string(),
            model: options.model_for(ProviderKind::Gemini),
            base_url: options.base_url_or(DEFAULT_BASE_URL).to_string(),
        }
    }

    pub async fn generate(
        &self,
        prompt: &str,
        options: &RequestOptions,
        image: Option<&ImageData>,
    ) -> Result<Reply, DispatchError> {
        let url = join_url(
            &self.base_url,
            &format!("v1beta/models/{}:generateContent", self.model),
        );

        let mut contents: Vec<GeminiContent> = options
            .dialogue()
            .map(|m| GeminiContent {
                // Gemini expects roles: "user" | "model".
                role: match m.role {
                    Role::Assistant => "model".to_string(),
                    _ => "user".to_string(),
                },
                parts: vec![GeminiPart::Text {
                    text: m.content.clone(),
                }],
            })
            .collect();

        let mut parts = vec![GeminiPart::Text {
            text: prompt.to_string(),
        }];
        if let Some(img) = image {
            parts.push(GeminiPart::Inline {
                inline_data: GeminiInlineData {
                    mime_type: img.mime_type.clone(),
                    data: img.base64(),
                },
            });
        }
        contents.push(GeminiContent {
            role: "user".to_string(),
            parts,
        });

        let req = GeminiRequest {
            contents,
            system_instruction: options.combined_system_prompt().map(|text| GeminiContent {
                role: "system".to_string(),
                parts: vec![GeminiPart::Text { text }],
            }),
            generation_config: GeminiGenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_tokens,
            },
        };

        let body: GeminiResponse = send_json(
            ProviderKind::Gemini,
            self.http
                .post(url)
                .header("x-goog-api-key", self.api_key.as_str())
                .json(&req),
        )
        .await?;

        let text = body
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            });
        let usage = body.usage_metadata.map(|u| TokenUsage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
        });
        Reply::new(ProviderKind::Gemini, text, usage)
    }
}
