use crate::anthropic::AnthropicClient;
use crate::cohere::CohereClient;
use crate::error::DispatchError;
use crate::gemini::GeminiClient;
use crate::huggingface::HuggingFaceClient;
use crate::ollama::OllamaClient;
use crate::openai::OpenAIClient;
use crate::request::{ImageData, Reply, RequestOptions};
use async_trait::async_trait;
use shared::settings::ProviderKind;

/// Anything that can turn a prompt into a reply.
///
/// [`Dispatcher`] talks to the real vendor APIs; the request queue and test
/// doubles implement it too so callers don't care which one they hold.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(
        &self,
        provider: &str,
        message: &str,
        api_key: &str,
        options: &RequestOptions,
        image: Option<&ImageData>,
    ) -> Result<Reply, DispatchError>;
}

/// Maps a provider identifier to its request template. One call, one request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dispatcher;

impl Dispatcher {
    pub fn new() -> Self {
        Self
    }

    /// Send `message` to `provider` and return only the reply text.
    pub async fn send_request(
        &self,
        provider: &str,
        message: &str,
        api_key: &str,
        options: &RequestOptions,
        image: Option<&ImageData>,
    ) -> Result<String, DispatchError> {
        self.send_request_detailed(provider, message, api_key, options, image)
            .await
            .map(|reply| reply.text)
    }

    pub async fn send_request_detailed(
        &self,
        provider: &str,
        message: &str,
        api_key: &str,
        options: &RequestOptions,
        image: Option<&ImageData>,
    ) -> Result<Reply, DispatchError> {
        let kind: ProviderKind = provider.parse()?;
        let api_key = api_key.trim();
        if kind.requires_api_key() && api_key.is_empty() {
            return Err(DispatchError::MissingApiKey(kind));
        }
        if image.is_some() && !supports_images(kind) {
            return Err(DispatchError::Unsupported {
                provider: kind,
                feature: "image input",
            });
        }

        let model = options.model_for(kind);
        tracing::info!(provider = %kind, %model, history = options.history.len(), "dispatching request");

        let result = match kind {
            ProviderKind::Gemini => {
                GeminiClient::new(api_key, options)
                    .generate(message, options, image)
                    .await
            }
            ProviderKind::OpenAi | ProviderKind::Groq | ProviderKind::Together => {
                OpenAIClient::new(kind, api_key, options)?
                    .generate(message, options, image)
                    .await
            }
            ProviderKind::Claude => {
                AnthropicClient::new(api_key, options)
                    .generate(message, options, image)
                    .await
            }
            ProviderKind::Cohere => CohereClient::new(api_key, options).generate(message, options).await,
            ProviderKind::HuggingFace => {
                HuggingFaceClient::new(api_key, options)
                    .generate(message, options)
                    .await
            }
            ProviderKind::Ollama => {
                OllamaClient::new(options)
                    .generate(message, options, image)
                    .await
            }
        };

        match &result {
            Ok(reply) => tracing::debug!(provider = %kind, chars = reply.text.len(), "reply received"),
            Err(e) => tracing::warn!(provider = %kind, error = %e, "request failed"),
        }
        result
    }
}

fn supports_images(kind: ProviderKind) -> bool {
    matches!(
        kind,
        ProviderKind::Gemini
            | ProviderKind::OpenAi
            | ProviderKind::Groq
            | ProviderKind::Together
            | ProviderKind::Claude
            | ProviderKind::Ollama
    )
}

#[async_trait]
impl Dispatch for Dispatcher {
    async fn dispatch(
        &self,
        provider: &str,
        message: &str,
        api_key: &str,
        options: &RequestOptions,
        image: Option<&ImageData>,
    ) -> Result<Reply, DispatchError> {
        self.send_request_detailed(provider, message, api_key, options, image)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_provider_fails_fast() {
        let err = Dispatcher::new()
            .send_request("watson", "hi", "key", &RequestOptions::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnsupportedProvider(ref p) if p == "watson"));
        assert_eq!(err.kind(), shared::ErrorKind::UnsupportedProvider);
    }

    #[tokio::test]
    async fn test_missing_key_fails_fast() {
        let err = Dispatcher::new()
            .send_request("gemini", "hi", "   ", &RequestOptions::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::MissingApiKey(ProviderKind::Gemini)));
    }

    #[tokio::test]
    async fn test_image_rejected_for_text_only_provider() {
        let img = ImageData::new("image/png", vec![0]);
        let err = Dispatcher::new()
            .send_request("cohere", "hi", "key", &RequestOptions::default(), Some(&img))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Unsupported { .. }));
    }
}
