//! HTTP plumbing shared by every provider client.

use crate::error::DispatchError;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::settings::ProviderKind;
use std::sync::LazyLock;
use std::time::Duration;

/// Maximum characters of an error body kept in a `DispatchError`.
const ERROR_DETAIL_CHARS: usize = 800;

static SHARED_HTTP: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(120))
        .pool_max_idle_per_host(2)
        .build()
        .unwrap_or_else(|_| Client::new())
});

pub(crate) fn shared_client() -> Client {
    SHARED_HTTP.clone()
}

/// Send one request and decode a successful JSON body into `T`.
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: ProviderKind,
    request: RequestBuilder,
) -> Result<T, DispatchError> {
    let resp = request
        .send()
        .await
        .map_err(|source| DispatchError::network(provider, source))?;
    let resp = check_status(provider, resp).await?;
    let body = resp
        .text()
        .await
        .map_err(|source| DispatchError::network(provider, source))?;
    serde_json::from_str(&body).map_err(|e| DispatchError::Parse {
        provider,
        message: e.to_string(),
    })
}

pub(crate) async fn check_status(
    provider: ProviderKind,
    resp: Response,
) -> Result<Response, DispatchError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let detail: String = body.trim().chars().take(ERROR_DETAIL_CHARS).collect();
    tracing::debug!(%provider, status = status.as_u16(), "provider returned error status");
    Err(match status.as_u16() {
        401 | 403 => DispatchError::Unauthorized { provider, detail },
        429 => DispatchError::RateLimited { provider, detail },
        code => DispatchError::Http {
            provider,
            status: code,
            detail,
        },
    })
}

/// Join a base URL and a path without doubling slashes.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
