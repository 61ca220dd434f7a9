use shared::settings::{ProviderKind, UnknownProvider};
use shared::ErrorKind;

/// Why a provider request failed.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("missing API key for {0}")]
    MissingApiKey(ProviderKind),

    #[error("{provider} does not support {feature}")]
    Unsupported {
        provider: ProviderKind,
        feature: &'static str,
    },

    #[error("{provider} rejected the API key (unauthorized): {detail}")]
    Unauthorized {
        provider: ProviderKind,
        detail: String,
    },

    #[error("{provider} rate limited the request (429): {detail}")]
    RateLimited {
        provider: ProviderKind,
        detail: String,
    },

    #[error("{provider} error: HTTP {status}: {detail}")]
    Http {
        provider: ProviderKind,
        status: u16,
        detail: String,
    },

    #[error("network error talking to {provider}: {source}")]
    Network {
        provider: ProviderKind,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not parse {provider} response: {message}")]
    Parse {
        provider: ProviderKind,
        message: String,
    },

    #[error("{0} returned an empty reply")]
    EmptyReply(ProviderKind),

    #[error("request queue is closed")]
    QueueClosed,
}

impl DispatchError {
    /// Wrap a transport error. The URL is dropped so query strings never
    /// reach logs or user-facing text.
    pub(crate) fn network(provider: ProviderKind, source: reqwest::Error) -> Self {
        DispatchError::Network {
            provider,
            source: source.without_url(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::UnsupportedProvider(_) => ErrorKind::UnsupportedProvider,
            DispatchError::MissingApiKey(_) => ErrorKind::MissingApiKey,
            DispatchError::Unauthorized { .. } => ErrorKind::Unauthorized,
            DispatchError::RateLimited { .. } => ErrorKind::RateLimited,
            DispatchError::Network { .. } => ErrorKind::Network,
            DispatchError::Parse { .. } | DispatchError::EmptyReply(_) => ErrorKind::Parse,
            DispatchError::Unsupported { .. }
            | DispatchError::Http { .. }
            | DispatchError::QueueClosed => ErrorKind::Other,
        }
    }
}

impl From<UnknownProvider> for DispatchError {
    fn from(err: UnknownProvider) -> Self {
        DispatchError::UnsupportedProvider(err.0)
    }
}
