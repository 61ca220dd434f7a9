//! Coarse failure categories shown to the user.
//!
//! Typed errors from the dispatcher map onto these directly. Errors that
//! only arrive as text (host bridge replies, legacy log lines) are sorted
//! with [`ErrorKind::classify`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingApiKey,
    UnsupportedProvider,
    Unauthorized,
    RateLimited,
    Network,
    Parse,
    Other,
}

impl ErrorKind {
    /// Sort an error message into a category by substring search.
    pub fn classify(message: &str) -> Self {
        let text = message.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| text.contains(n));

        if has(&["missing api key", "no api key", "api key not set", "api key is required"]) {
            ErrorKind::MissingApiKey
        } else if has(&["unsupported provider", "unknown provider"]) {
            ErrorKind::UnsupportedProvider
        } else if has(&["429", "rate limit", "too many requests", "quota"]) {
            ErrorKind::RateLimited
        } else if has(&["401", "403", "unauthorized", "forbidden", "invalid api key", "api key"]) {
            ErrorKind::Unauthorized
        } else if has(&[
            "failed to fetch",
            "network",
            "connection",
            "timed out",
            "timeout",
            "dns",
        ]) {
            ErrorKind::Network
        } else if has(&["parse", "json", "unexpected token", "malformed"]) {
            ErrorKind::Parse
        } else {
            ErrorKind::Other
        }
    }

    /// Canned text appended to the chat when a request fails.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::MissingApiKey => {
                "No API key is configured for this provider. Add one in settings and try again."
            }
            ErrorKind::UnsupportedProvider => {
                "The selected provider is not supported. Pick another provider in settings."
            }
            ErrorKind::Unauthorized => {
                "The provider rejected the API key. Check that it is valid and has access to this model."
            }
            ErrorKind::RateLimited => {
                "The provider is rate limiting requests. Wait a moment before sending again."
            }
            ErrorKind::Network => {
                "Could not reach the provider. Check your network connection."
            }
            ErrorKind::Parse => "The provider sent a response that could not be read.",
            ErrorKind::Other => "Something went wrong while talking to the provider.",
        }
    }
}
