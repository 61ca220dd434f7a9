pub mod error_kind;

pub use error_kind::ErrorKind;

pub mod settings {
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;
    use std::fmt;
    use std::str::FromStr;
    use zeroize::Zeroize;

    fn default_temperature() -> f32 {
        0.7
    }

    fn default_max_tokens() -> u32 {
        2048
    }

    fn default_max_history() -> usize {
        20
    }

    /// Hosted (or local) LLM backends the panel can talk to.
    #[derive(
        Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    )]
    #[serde(rename_all = "lowercase")]
    pub enum ProviderKind {
        #[default]
        Gemini,
        #[serde(alias = "open_ai")]
        OpenAi,
        #[serde(alias = "anthropic")]
        Claude,
        Groq,
        Cohere,
        #[serde(alias = "hf")]
        HuggingFace,
        Together,
        #[serde(alias = "local")]
        Ollama,
    }

    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    #[error("unsupported provider: {0}")]
    pub struct UnknownProvider(pub String);

    impl ProviderKind {
        pub const ALL: [ProviderKind; 8] = [
            ProviderKind::Gemini,
            ProviderKind::OpenAi,
            ProviderKind::Claude,
            ProviderKind::Groq,
            ProviderKind::Cohere,
            ProviderKind::HuggingFace,
            ProviderKind::Together,
            ProviderKind::Ollama,
        ];

        pub fn as_str(&self) -> &'static str {
            match self {
                ProviderKind::Gemini => "gemini",
                ProviderKind::OpenAi => "openai",
                ProviderKind::Claude => "claude",
                ProviderKind::Groq => "groq",
                ProviderKind::Cohere => "cohere",
                ProviderKind::HuggingFace => "huggingface",
                ProviderKind::Together => "together",
                ProviderKind::Ollama => "ollama",
            }
        }

        pub fn display_name(&self) -> &'static str {
            match self {
                ProviderKind::Gemini => "Google Gemini",
                ProviderKind::OpenAi => "OpenAI",
                ProviderKind::Claude => "Anthropic Claude",
                ProviderKind::Groq => "Groq",
                ProviderKind::Cohere => "Cohere",
                ProviderKind::HuggingFace => "Hugging Face",
                ProviderKind::Together => "Together AI",
                ProviderKind::Ollama => "Ollama (local)",
            }
        }

        pub fn default_model(&self) -> &'static str {
            match self {
                ProviderKind::Gemini => "gemini-1.5-flash",
                ProviderKind::OpenAi => "gpt-4o-mini",
                ProviderKind::Claude => "claude-3-5-sonnet-20241022",
                ProviderKind::Groq => "llama-3.1-8b-instant",
                ProviderKind::Cohere => "command-r",
                ProviderKind::HuggingFace => "mistralai/Mistral-7B-Instruct-v0.2",
                ProviderKind::Together => "meta-llama/Llama-3-8b-chat-hf",
                ProviderKind::Ollama => "llama3.2:3b",
            }
        }

        /// Environment variable consulted when no key is stored.
        pub fn env_key(&self) -> Option<&'static str> {
            match self {
                ProviderKind::Gemini => Some("GEMINI_API_KEY"),
                ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
                ProviderKind::Claude => Some("ANTHROPIC_API_KEY"),
                ProviderKind::Groq => Some("GROQ_API_KEY"),
                ProviderKind::Cohere => Some("COHERE_API_KEY"),
                ProviderKind::HuggingFace => Some("HF_API_KEY"),
                ProviderKind::Together => Some("TOGETHER_API_KEY"),
                ProviderKind::Ollama => None,
            }
        }

        pub fn requires_api_key(&self) -> bool {
            !matches!(self, ProviderKind::Ollama)
        }
    }

    impl fmt::Display for ProviderKind {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    impl FromStr for ProviderKind {
        type Err = UnknownProvider;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s.trim().to_ascii_lowercase().as_str() {
                "gemini" | "google" => Ok(ProviderKind::Gemini),
                "openai" | "open_ai" | "chatgpt" => Ok(ProviderKind::OpenAi),
                "claude" | "anthropic" => Ok(ProviderKind::Claude),
                "groq" => Ok(ProviderKind::Groq),
                "cohere" => Ok(ProviderKind::Cohere),
                "huggingface" | "hf" => Ok(ProviderKind::HuggingFace),
                "together" => Ok(ProviderKind::Together),
                "ollama" | "local" => Ok(ProviderKind::Ollama),
                _ => Err(UnknownProvider(s.to_string())),
            }
        }
    }

    /// API key that is wiped from memory when dropped and never printed.
    #[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct SecretKey(String);

    impl SecretKey {
        pub fn new(key: impl Into<String>) -> Self {
            Self(key.into())
        }

        pub fn expose(&self) -> &str {
            &self.0
        }

        pub fn is_empty(&self) -> bool {
            self.0.trim().is_empty()
        }
    }

    impl fmt::Debug for SecretKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            if self.is_empty() {
                f.write_str("SecretKey(<empty>)")
            } else {
                f.write_str("SecretKey(<redacted>)")
            }
        }
    }

    impl Drop for SecretKey {
        fn drop(&mut self) {
            self.0.zeroize();
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Settings {
        #[serde(default)]
        pub provider: ProviderKind,
        /// Empty means "use the provider's default model".
        #[serde(default)]
        pub model: String,
        #[serde(default)]
        pub api_keys: BTreeMap<ProviderKind, SecretKey>,
        #[serde(default = "default_temperature")]
        pub temperature: f32,
        #[serde(default = "default_max_tokens")]
        pub max_tokens: u32,
        /// Overrides the provider endpoint (self-hosted gateways, tests).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub base_url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub system_prompt: Option<String>,
        /// How many prior messages are sent along with a new prompt.
        #[serde(default = "default_max_history")]
        pub max_history_messages: usize,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                provider: ProviderKind::default(),
                model: String::new(),
                api_keys: BTreeMap::new(),
                temperature: default_temperature(),
                max_tokens: default_max_tokens(),
                base_url: None,
                system_prompt: Some(
                    "You are an assistant inside a motion graphics application. \
                     When asked for expressions or scripts, answer with a single fenced code block."
                        .into(),
                ),
                max_history_messages: default_max_history(),
            }
        }
    }

    impl Settings {
        pub fn effective_model(&self) -> &str {
            if self.model.trim().is_empty() {
                self.provider.default_model()
            } else {
                self.model.trim()
            }
        }

        pub fn set_api_key(&mut self, provider: ProviderKind, key: impl Into<String>) {
            self.api_keys.insert(provider, SecretKey::new(key));
        }

        /// Stored key for `provider`, falling back to its environment variable.
        pub fn api_key_for(&self, provider: ProviderKind) -> Option<SecretKey> {
            if let Some(key) = self.api_keys.get(&provider) {
                if !key.is_empty() {
                    return Some(key.clone());
                }
            }
            provider
                .env_key()
                .and_then(|var| std::env::var(var).ok())
                .filter(|v| !v.trim().is_empty())
                .map(SecretKey::new)
        }
    }
}

pub mod agent_api {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Role {
        User,
        #[serde(alias = "ai", alias = "bot", alias = "model")]
        Assistant,
        System,
    }

    impl Role {
        pub fn as_str(&self) -> &'static str {
            match self {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::System => "system",
            }
        }
    }

    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct TokenUsage {
        pub prompt_tokens: u32,
        pub completion_tokens: u32,
    }

    /// Extra facts recorded alongside a message at send time.
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct MessageMetadata {
        /// File references attached by the user
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub attachments: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub provider: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub model: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub usage: Option<TokenUsage>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct ChatMessage {
        pub role: Role,
        pub content: String,
        #[serde(default = "Utc::now")]
        pub timestamp: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub metadata: Option<MessageMetadata>,
    }

    impl ChatMessage {
        pub fn new(role: Role, content: impl Into<String>) -> Self {
            Self {
                role,
                content: content.into(),
                timestamp: Utc::now(),
                metadata: None,
            }
        }

        pub fn user(content: impl Into<String>) -> Self {
            Self::new(Role::User, content)
        }

        pub fn assistant(content: impl Into<String>) -> Self {
            Self::new(Role::Assistant, content)
        }

        pub fn system(content: impl Into<String>) -> Self {
            Self::new(Role::System, content)
        }

        pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
            self.metadata = Some(metadata);
            self
        }
    }
}
