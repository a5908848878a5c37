//! Public oEmbed title lookup.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::engine::TitleLookup;
use crate::{Error, Result};

pub const DEFAULT_OEMBED_ENDPOINT: &str = "https://www.youtube.com/oembed";

#[derive(Debug, Deserialize)]
struct OEmbedResponse {
    #[serde(default)]
    title: Option<String>,
}

/// Title lookup against the platform's unauthenticated oEmbed endpoint.
pub struct OEmbedTitleLookup {
    client: reqwest::Client,
    endpoint: String,
}

impl OEmbedTitleLookup {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: DEFAULT_OEMBED_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn request_url(&self, locator: &str) -> Result<Url> {
        Url::parse_with_params(&self.endpoint, &[("url", locator), ("format", "json")])
            .map_err(|e| Error::config(format!("invalid oEmbed endpoint {}: {}", self.endpoint, e)))
    }
}

#[async_trait]
impl TitleLookup for OEmbedTitleLookup {
    async fn lookup_title(&self, locator: &str) -> Result<Option<String>> {
        let url = self.request_url(locator)?;
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            debug!(status = %response.status(), locator, "oEmbed lookup returned no data");
            return Ok(None);
        }

        let body: OEmbedResponse = response.json().await?;
        Ok(body
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()))
    }
}
