//! Common utilities shared across HTTP providers.

use crate::error::{Result, SourceError};
use reconflow_core::{SettingsProvider, SourcesConfig};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::error::Error as StdError;
use std::time::Duration;

/// Build the HTTP client shared by every provider.
///
/// # Errors
/// Returns error if the HTTP client cannot be created.
pub fn build_http_client(config: &SourcesConfig) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| SourceError::Internal(format!("failed to create HTTP client: {e}")))
}

/// Read a credential that the provider cannot work without.
pub(crate) async fn require_setting(
    settings: &dyn SettingsProvider,
    key: &str,
    provider: &'static str,
    credential: &'static str,
) -> Result<String> {
    optional_setting(settings, key)
        .await?
        .ok_or(SourceError::Configuration {
            provider,
            credential,
        })
}

/// Read a credential the provider can do without.
pub(crate) async fn optional_setting(
    settings: &dyn SettingsProvider,
    key: &str,
) -> Result<Option<String>> {
    settings
        .get_value(key)
        .await
        .map_err(|e| SourceError::Settings(e.to_string()))
}

/// Send a request and reject non-success statuses.
pub(crate) async fn send(provider: &'static str, request: RequestBuilder) -> Result<Response> {
    let response = request.send().await.map_err(|e| SourceError::Transport {
        provider,
        cause: error_chain(&e),
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Remote {
            provider,
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        });
    }
    Ok(response)
}

/// Send a request and decode its JSON body.
pub(crate) async fn get_json<T: DeserializeOwned>(
    provider: &'static str,
    request: RequestBuilder,
) -> Result<T> {
    let body = get_text(provider, request).await?;
    serde_json::from_str(&body).map_err(|e| SourceError::Parse {
        provider,
        cause: e.to_string(),
    })
}

/// Send a request and return its body as text.
pub(crate) async fn get_text(provider: &'static str, request: RequestBuilder) -> Result<String> {
    send(provider, request)
        .await?
        .text()
        .await
        .map_err(|e| SourceError::Transport {
            provider,
            cause: error_chain(&e),
        })
}

/// Join an error with its sources, e.g. "error sending request: connection refused".
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
