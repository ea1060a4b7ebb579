//! HTTP client for the SoundCloud catalog API
//!
//! Covers what playback needs: looking tracks up by id or permalink, and
//! turning a track into a signed HLS manifest URL.
//!
//! # Example
//!
//! ```no_run
//! use pmosoundcloud::SoundCloudClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SoundCloudClient::builder().client_id("my-client-id").build()?;
//!
//!     let track = client.resolve_url("https://soundcloud.com/artist/title").await?;
//!     let location = client.stream_location(&track).await?;
//!     println!("{} -> {} ({:?})", track.title, location.manifest_url, location.stream_type);
//!
//!     Ok(())
//! }
//! ```

use crate::error::{Error, Result};
use crate::models::{StreamLocation, StreamType, StreamUrlResponse, Track};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default SoundCloud API base URL
pub const DEFAULT_BASE_URL: &str = "https://api-v2.soundcloud.com";

/// Default timeout for HTTP requests (30 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default User-Agent
pub const DEFAULT_USER_AGENT: &str = concat!("PMOVoice/", env!("CARGO_PKG_VERSION"), " (pmosoundcloud)");

/// SoundCloud HTTP client
///
/// Stateless; every call goes to the API. The client id is appended to each
/// request as the `client_id` query parameter.
#[derive(Debug, Clone)]
pub struct SoundCloudClient {
    client: Client,
    base_url: String,
    client_id: String,
    timeout: Duration,
}

impl SoundCloudClient {
    /// Create a client with default settings and the given client id
    pub fn new(client_id: impl Into<String>) -> Result<Self> {
        Self::builder().client_id(client_id).build()
    }

    /// Create a builder for configuring the client
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Get the internal HTTP client
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    // ========================================================================
    // Track lookup
    // ========================================================================

    /// Fetch several tracks in one request
    ///
    /// Unknown ids are silently absent from the result, as the API does.
    pub async fn fetch_tracks(&self, ids: &[u64]) -> Result<Vec<Track>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let joined = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let url = self.api_url("tracks", &[("ids", &joined)])?;

        debug!(ids = %joined, "Fetching SoundCloud tracks");
        self.get_json(url, || Error::TrackNotFound(joined.clone()))
            .await
    }

    /// Fetch one track by id
    pub async fn fetch_track(&self, id: u64) -> Result<Track> {
        self.fetch_tracks(&[id])
            .await?
            .into_iter()
            .find(|track| track.id == id)
            .ok_or_else(|| Error::TrackNotFound(id.to_string()))
    }

    /// Resolve a track page URL (e.g. `https://soundcloud.com/artist/title`)
    pub async fn resolve_url(&self, permalink: &str) -> Result<Track> {
        let url = self.api_url("resolve", &[("url", permalink)])?;

        debug!(permalink, "Resolving SoundCloud permalink");
        self.get_json(url, || Error::TrackNotFound(permalink.to_string()))
            .await
    }

    // ========================================================================
    // Streams
    // ========================================================================

    /// Obtain the signed manifest URL of a track
    ///
    /// Picks the last HLS transcoding the API lists (the Opus one when
    /// available) and derives the stream type from its MIME type.
    pub async fn stream_location(&self, track: &Track) -> Result<StreamLocation> {
        let transcoding = track
            .hls_transcodings()
            .last()
            .ok_or(Error::NoPlayableFormat(track.id))?;

        let mut url = Url::parse(&transcoding.url)?;
        url.query_pairs_mut().append_pair("client_id", &self.client_id);

        debug!(
            track = track.id,
            mime = %transcoding.format.mime_type,
            "Requesting signed stream URL"
        );
        let response: StreamUrlResponse = self
            .get_json(url, || Error::TrackNotFound(track.id.to_string()))
            .await?;
        let manifest = response.url.ok_or_else(|| {
            Error::api_error(format!("no stream URL returned for track {}", track.id))
        })?;

        Ok(StreamLocation {
            manifest_url: Url::parse(&manifest)?,
            stream_type: StreamType::from_mime(&transcoding.format.mime_type),
        })
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn api_url(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint
        ))?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                query.append_pair(key, value);
            }
            query.append_pair("client_id", &self.client_id);
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        not_found: impl FnOnce() -> Error,
    ) -> Result<T> {
        let response = self.client.get(url).timeout(self.timeout).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(not_found());
        }
        if !status.is_success() {
            return Err(Error::ApiError(format!("API returned status: {}", status)));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Builder for SoundCloudClient
pub struct ClientBuilder {
    client: Option<Client>,
    base_url: String,
    client_id: Option<String>,
    timeout: Duration,
    user_agent: String,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            client: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            client_id: None,
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ClientBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom HTTP client
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the API client id
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Build the client
    ///
    /// Fails with [`Error::MissingClientId`] when no (or an empty) client id
    /// was given.
    pub fn build(self) -> Result<SoundCloudClient> {
        let client_id = self
            .client_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(Error::MissingClientId)?;

        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .user_agent(&self.user_agent)
                .timeout(self.timeout)
                .build()?,
        };

        Ok(SoundCloudClient {
            client,
            base_url: self.base_url,
            client_id,
            timeout: self.timeout,
        })
    }
}
