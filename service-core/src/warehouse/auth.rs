use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::WarehouseError;
use crate::observability::TracedClientExt;

/// Refresh this long before the metadata server says the token expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: Secret<String>,
    refresh_at: Instant,
}

/// Bearer tokens for Google APIs.
///
/// A configured static token wins. Otherwise the runtime service account's
/// token is fetched from the metadata server and cached until shortly
/// before it expires.
pub enum TokenSource {
    Static(Secret<String>),
    Metadata {
        client: reqwest::Client,
        token_url: String,
        cached: RwLock<Option<CachedToken>>,
    },
}

impl TokenSource {
    pub fn new(client: reqwest::Client, static_token: Option<Secret<String>>, metadata_host: &str) -> Self {
        match static_token {
            Some(token) => TokenSource::Static(token),
            None => {
                let host = metadata_host.trim_end_matches('/');
                let base = if host.starts_with("http://") || host.starts_with("https://") {
                    host.to_string()
                } else {
                    format!("http://{}", host)
                };
                TokenSource::Metadata {
                    client,
                    token_url: format!("{}{}", base, TOKEN_PATH),
                    cached: RwLock::new(None),
                }
            }
        }
    }

    pub async fn token(&self) -> Result<String, WarehouseError> {
        match self {
            TokenSource::Static(token) => Ok(token.expose_secret().clone()),
            TokenSource::Metadata {
                client,
                token_url,
                cached,
            } => {
                {
                    let guard = cached.read().await;
                    if let Some(token) = guard.as_ref().filter(|t| Instant::now() < t.refresh_at) {
                        return Ok(token.value.expose_secret().clone());
                    }
                }

                let mut guard = cached.write().await;
                // Another task may have refreshed while we waited for the lock.
                if let Some(token) = guard.as_ref().filter(|t| Instant::now() < t.refresh_at) {
                    return Ok(token.value.expose_secret().clone());
                }

                tracing::debug!(url = %token_url, "Fetching access token from metadata server");

                let response = client
                    .traced_get(token_url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await
                    .map_err(|e| WarehouseError::Auth(e.to_string()))?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(WarehouseError::Auth(format!(
                        "metadata server returned {}: {}",
                        status, body
                    )));
                }

                let token: MetadataToken = response
                    .json()
                    .await
                    .map_err(|e| WarehouseError::Auth(e.to_string()))?;

                let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
                let value = token.access_token;
                *guard = Some(CachedToken {
                    value: Secret::new(value.clone()),
                    refresh_at: Instant::now() + lifetime,
                });

                Ok(value)
            }
        }
    }
}
