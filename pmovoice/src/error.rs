//! Error types for the voice player

use pmohls::HlsError;
use thiserror::Error;

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, VoiceError>;

/// Result type alias for queue store operations
pub type QueueResult<T> = std::result::Result<T, QueueError>;

/// Failures of a queue store
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Queue persistence error: {0}")]
    Persistence(String),
    #[error("Invalid queue entry: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for QueueError {
    fn from(err: rusqlite::Error) -> Self {
        QueueError::Persistence(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum VoiceError {
    /// A required collaborator was not provided before use
    #[error("{0} is not initialized")]
    NotInitialized(&'static str),
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
    /// Track lookup or manifest resolution failed
    #[error("Catalog error: {0}")]
    Catalog(#[from] pmosoundcloud::Error),
    #[error("Stream error: {0}")]
    Stream(#[from] HlsError),
    #[error("Audio sink error: {0}")]
    Sink(String),
    /// The player task has exited (disposed or crashed)
    #[error("Player is closed")]
    PlayerClosed,
}

impl VoiceError {
    pub fn sink(msg: impl Into<String>) -> Self {
        VoiceError::Sink(msg.into())
    }

    /// The catalog has no segmented format for the track
    pub fn is_no_playable_format(&self) -> bool {
        matches!(
            self,
            VoiceError::Catalog(pmosoundcloud::Error::NoPlayableFormat(_))
        )
    }

    /// Empty or unparsable manifest
    pub fn is_manifest(&self) -> bool {
        matches!(self, VoiceError::Stream(HlsError::Manifest(_)))
    }

    /// Fetch failure or non-success status, from the catalog or the stream
    pub fn is_network(&self) -> bool {
        match self {
            VoiceError::Stream(err) => err.is_network(),
            VoiceError::Catalog(pmosoundcloud::Error::Http(_))
            | VoiceError::Catalog(pmosoundcloud::Error::ApiError(_)) => true,
            _ => false,
        }
    }
}
