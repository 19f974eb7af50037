use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{Result, StayError};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// OAuth2 client-credentials token for the PMS API.
///
/// The token is cached until `refresh_margin` before it expires. A 401 from
/// the API calls [`TokenManager::invalidate`] so the next request fetches a
/// fresh one.
pub struct TokenManager {
    http: Client,
    auth_url: String,
    client_id: String,
    client_secret: String,
    refresh_margin: Duration,
    cached: RwLock<Option<CachedToken>>,
}

impl TokenManager {
    pub fn new(
        http: Client,
        auth_url: String,
        client_id: String,
        client_secret: String,
        refresh_margin_secs: u64,
    ) -> Self {
        Self {
            http,
            auth_url,
            client_id,
            client_secret,
            refresh_margin: Duration::from_secs(refresh_margin_secs),
            cached: RwLock::new(None),
        }
    }

    pub async fn token(&self) -> Result<String> {
        {
            let guard = self.cached.read().await;
            if let Some(ref cached) = *guard
                && Instant::now() < cached.refresh_at
            {
                return Ok(cached.value.clone());
            }
        }

        let mut guard = self.cached.write().await;
        // Another caller may have refreshed while we waited for the lock
        if let Some(ref cached) = *guard
            && Instant::now() < cached.refresh_at
        {
            return Ok(cached.value.clone());
        }

        let fresh = self.fetch().await?;
        let value = fresh.value.clone();
        *guard = Some(fresh);
        Ok(value)
    }

    pub async fn invalidate(&self) {
        debug!("Invalidating cached PMS token");
        *self.cached.write().await = None;
    }

    async fn fetch(&self) -> Result<CachedToken> {
        debug!(auth_url = %self.auth_url, "Requesting PMS access token");
        let body = serde_json::json!({
            "grant_type": "client_credentials",
            "client_id": self.client_id,
            "client_secret": self.client_secret,
        });
        let response = self.http.post(&self.auth_url).json(&body).send().await?;
        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            warn!(%status, "PMS token endpoint unavailable");
            return Err(StayError::transient(format!(
                "PMS token endpoint returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(StayError::UpstreamRejected {
                status: status.as_u16(),
                reason: "client credentials rejected".into(),
            });
        }
        let parsed: TokenResponse = response.json().await?;
        if parsed.access_token.is_empty() {
            return Err(StayError::UpstreamRejected {
                status: status.as_u16(),
                reason: "token response had an empty access_token".into(),
            });
        }
        let lifetime = Duration::from_secs(parsed.expires_in);
        Ok(CachedToken {
            value: parsed.access_token,
            refresh_at: Instant::now() + lifetime.saturating_sub(self.refresh_margin),
        })
    }
}
