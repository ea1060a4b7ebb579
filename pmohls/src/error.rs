//! Error types for segmented stream ingestion

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, HlsError>;

/// Errors raised while resolving a manifest or downloading its segments
#[derive(Debug, thiserror::Error)]
pub enum HlsError {
    /// Manifest document is empty or cannot be parsed
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Transport-level failure (connection, TLS, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Final response (after following redirects) was not a success
    #[error("{url} returned HTTP status {status}")]
    Status { url: String, status: u16 },

    /// Redirect without a usable Location, or too many hops
    #[error("Redirect error: {0}")]
    Redirect(String),

    /// Invalid URL in a manifest or a Location header
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl HlsError {
    /// Create a manifest error
    pub fn manifest(msg: impl Into<String>) -> Self {
        Self::Manifest(msg.into())
    }

    /// True for failures of the network transport: request errors,
    /// non-success statuses and broken redirects
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            HlsError::Http(_) | HlsError::Status { .. } | HlsError::Redirect(_)
        )
    }
}

impl From<HlsError> for std::io::Error {
    fn from(err: HlsError) -> Self {
        std::io::Error::other(err)
    }
}
