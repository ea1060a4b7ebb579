//! Error types for the SoundCloud client

/// Result type alias for SoundCloud operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when using the SoundCloud client
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// API returned an error status or an unexpected payload
    #[error("API error: {0}")]
    ApiError(String),

    /// Track not found
    #[error("Track not found: {0}")]
    TrackNotFound(String),

    /// The track offers no segmented (HLS) transcoding
    #[error("No playable HLS format for track {0}")]
    NoPlayableFormat(u64),

    /// No client id configured
    #[error("SoundCloud client id is not configured")]
    MissingClientId,

    /// Configuration error (from pmoconfig/anyhow)
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an API error
    pub fn api_error(msg: impl Into<String>) -> Self {
        Self::ApiError(msg.into())
    }

    /// True when the catalog does not know the requested track
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::TrackNotFound(_))
    }
}
