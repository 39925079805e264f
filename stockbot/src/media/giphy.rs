use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::GifProvider;
use crate::{Error, Result};

const RANDOM_ENDPOINT: &str = "https://api.giphy.com/v1/gifs/random";

/// Giphy's random endpoint answers `data: []` when nothing matches, so the payload
/// is kept untyped.
#[derive(Debug, Deserialize)]
struct RandomResponse {
    #[serde(default)]
    data: serde_json::Value,
}

impl RandomResponse {
    fn url(&self) -> Option<&str> {
        self.data
            .get("url")
            .and_then(|url| url.as_str())
            .filter(|url| !url.is_empty())
    }
}

pub struct GiphyClient {
    client: Client,
    api_key: String,
}

impl GiphyClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        storefront::install_rustls_provider();
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, api_key))
    }

    pub fn with_client(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl GifProvider for GiphyClient {
    async fn random_gif(&self, term: &str) -> Result<String> {
        let response = self
            .client
            .get(RANDOM_ENDPOINT)
            .query(&[("api_key", self.api_key.as_str()), ("tag", term)])
            .send()
            .await?
            .error_for_status()?;

        let body: RandomResponse = response.json().await?;
        let url = body
            .url()
            .ok_or_else(|| Error::Other(format!("no gif found for '{term}'")))?;
        debug!(term, url, "Picked gif");
        Ok(url.to_string())
    }
}

/// Provider used when no API key is configured.
pub struct NoGifs;

#[async_trait]
impl GifProvider for NoGifs {
    async fn random_gif(&self, _term: &str) -> Result<String> {
        Err(Error::Other("gif lookups are disabled".to_string()))
    }
}
