use async_trait::async_trait;
use bytes::Bytes;
use now_playing_common::config::PlexConfig;
use std::time::Duration;
use tracing::debug;

/// Where artwork bytes come from.
#[async_trait]
pub trait ArtworkSource: Send + Sync {
    /// Fetch the encoded image for an artwork reference. Single attempt.
    async fn fetch(&self, reference: &str) -> Result<Bytes, FetchError>;
}

/// Fetches `{host}{reference}?X-Plex-Token={token}` from a Plex server.
pub struct PlexArtwork {
    client: reqwest::Client,
    host: String,
    token: String,
}

impl PlexArtwork {
    pub fn new(config: &PlexConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.fetch_timeout_secs.min(10)))
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self {
            client,
            host: config.host.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn url(&self, reference: &str) -> String {
        format!("{}{}", self.host, reference)
    }
}

#[async_trait]
impl ArtworkSource for PlexArtwork {
    async fn fetch(&self, reference: &str) -> Result<Bytes, FetchError> {
        let url = self.url(reference);
        debug!(url, "fetching artwork");

        let response = self
            .client
            .get(&url)
            .query(&[("X-Plex-Token", self.token.as_str())])
            .send()
            .await
            .map_err(FetchError::Request)?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let body = response.bytes().await.map_err(FetchError::Request)?;
        debug!(bytes = body.len(), "artwork downloaded");
        Ok(body)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),
    #[error("artwork request failed: {0}")]
    Request(reqwest::Error),
    #[error("artwork server returned HTTP {0}")]
    Status(u16),
}
