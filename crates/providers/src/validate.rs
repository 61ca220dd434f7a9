//! Cheap "is this key accepted?" probes used by the settings screen.

use crate::error::DispatchError;
use crate::http::{join_url, shared_client};
use crate::openai::OpenAIClient;
use reqwest::RequestBuilder;
use shared::settings::ProviderKind;
use std::time::Duration;

/// Probes give up after this long.
pub const VALIDATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Ask the provider whether `api_key` is usable.
///
/// Returns `Ok(true)` when the probe succeeds, `Ok(false)` when the provider
/// answers 401/403, and an error for anything else (network, 5xx, ...).
pub async fn validate_key(
    provider: &str,
    api_key: &str,
    base_url: Option<&str>,
) -> Result<bool, DispatchError> {
    let kind: ProviderKind = provider.parse()?;
    let api_key = api_key.trim();
    if kind.requires_api_key() && api_key.is_empty() {
        return Err(DispatchError::MissingApiKey(kind));
    }

    let probe = build_probe(kind, api_key, base_url.filter(|u| !u.trim().is_empty()));
    let resp = probe
        .timeout(VALIDATION_TIMEOUT)
        .send()
        .await
        .map_err(|source| DispatchError::network(kind, source))?;

    let status = resp.status();
    tracing::debug!(provider = %kind, status = status.as_u16(), "key probe finished");
    if status.is_success() {
        Ok(true)
    } else if status.as_u16() == 401 || status.as_u16() == 403 {
        Ok(false)
    } else {
        Err(crate::http::check_status(kind, resp)
            .await
            .err()
            .unwrap_or(DispatchError::Http {
                provider: kind,
                status: status.as_u16(),
                detail: String::new(),
            }))
    }
}

fn build_probe(kind: ProviderKind, api_key: &str, base_url: Option<&str>) -> RequestBuilder {
    let http = shared_client();
    match kind {
        ProviderKind::Gemini => {
            let base = base_url.unwrap_or("https://generativelanguage.googleapis.com");
            http.get(join_url(base, "v1beta/models"))
                .header("x-goog-api-key", api_key)
        }
        ProviderKind::OpenAi | ProviderKind::Groq | ProviderKind::Together => {
            let base = base_url
                .or_else(|| OpenAIClient::default_base_url(kind))
                .unwrap_or("https://api.openai.com/v1");
            http.get(join_url(base, "models")).bearer_auth(api_key)
        }
        ProviderKind::Claude => {
            let base = base_url.unwrap_or("https://api.anthropic.com");
            http.get(join_url(base, "v1/models"))
                .header("x-api-key", api_key)
                .header("anthropic-version", "2023-06-01")
        }
        ProviderKind::Cohere => {
            let base = base_url.unwrap_or("https://api.cohere.ai");
            http.get(join_url(base, "v1/models")).bearer_auth(api_key)
        }
        ProviderKind::HuggingFace => {
            let base = base_url.unwrap_or("https://huggingface.co");
            http.get(join_url(base, "api/whoami-v2")).bearer_auth(api_key)
        }
        ProviderKind::Ollama => {
            let base = match base_url {
                Some(url) => url.to_string(),
                None => std::env::var("OLLAMA_BASE_URL")
                    .unwrap_or_else(|_| "http://127.0.0.1:11434".to_string()),
            };
            http.get(join_url(&base, "api/tags"))
        }
    }
}
