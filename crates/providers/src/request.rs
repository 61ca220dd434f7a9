use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use shared::agent_api::{ChatMessage, Role, TokenUsage};
use shared::settings::{ProviderKind, Settings};

/// Per-request knobs. Unset fields fall back to provider defaults.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub system_prompt: Option<String>,
    /// Earlier turns of the conversation, oldest first.
    pub history: Vec<ChatMessage>,
    pub base_url: Option<String>,
}

impl RequestOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            model: Some(settings.effective_model().to_string()),
            temperature: Some(settings.temperature),
            max_tokens: Some(settings.max_tokens),
            system_prompt: settings
                .system_prompt
                .clone()
                .filter(|s| !s.trim().is_empty()),
            history: Vec::new(),
            base_url: settings.base_url.clone(),
        }
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn model_for(&self, provider: ProviderKind) -> String {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(provider.default_model())
            .to_string()
    }

    pub(crate) fn base_url_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(default)
    }

    /// System prompt plus any system-role history, joined by blank lines.
    pub(crate) fn combined_system_prompt(&self) -> Option<String> {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(prompt) = &self.system_prompt {
            parts.push(prompt);
        }
        parts.extend(
            self.history
                .iter()
                .filter(|m| m.role == Role::System)
                .map(|m| m.content.as_str()),
        );
        let joined = parts.join("\n\n");
        if joined.trim().is_empty() {
            None
        } else {
            Some(joined)
        }
    }

    /// History without system messages, in order.
    pub(crate) fn dialogue(&self) -> impl Iterator<Item = &ChatMessage> {
        self.history.iter().filter(|m| m.role != Role::System)
    }
}

/// An image attached to a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageData {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64())
    }
}

/// Reply text plus whatever usage numbers the provider reported.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

impl Reply {
    pub(crate) fn new(
        provider: ProviderKind,
        text: Option<String>,
        usage: Option<TokenUsage>,
    ) -> Result<Self, crate::DispatchError> {
        match text {
            Some(text) if !text.trim().is_empty() => Ok(Self { text, usage }),
            _ => Err(crate::DispatchError::EmptyReply(provider)),
        }
    }
}
