use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh this long before the reported expiry.
const EXPIRY_SLACK: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

struct Cached {
    token: String,
    expires_at: Instant,
}

/// Supplies OAuth bearer tokens for Google APIs.
///
/// A configured static token is used as-is. Otherwise the token is fetched
/// from the instance metadata server and cached until shortly before it
/// expires. Failing to get a token is an error; requests are never sent
/// unauthenticated.
pub struct TokenSource {
    static_token: Option<String>,
    http: reqwest::Client,
    cache: Mutex<Option<Cached>>,
}

impl TokenSource {
    pub fn new(static_token: &str) -> Self {
        let static_token = Some(static_token.trim().to_string()).filter(|t| !t.is_empty());
        Self {
            static_token,
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
            cache: Mutex::new(None),
        }
    }

    pub async fn token(&self) -> Result<String> {
        if let Some(t) = &self.static_token {
            return Ok(t.clone());
        }
        let mut cache = self.cache.lock().await;
        if let Some(c) = cache.as_ref() {
            if Instant::now() < c.expires_at {
                return Ok(c.token.clone());
            }
        }
        let fetched = self.fetch().await?;
        let lifetime = Duration::from_secs(fetched.expires_in).saturating_sub(EXPIRY_SLACK);
        debug!(expires_in = fetched.expires_in, "refreshed metadata access token");
        let token = fetched.access_token;
        *cache = Some(Cached {
            token: token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token)
    }

    async fn fetch(&self) -> Result<MetadataToken> {
        let resp = self
            .http
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .context("metadata server unreachable; set GOOGLE_ACCESS_TOKEN when running outside Google Cloud")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("metadata server returned {status} for access token request");
        }
        resp.json().await.context("invalid metadata token response")
    }
}
