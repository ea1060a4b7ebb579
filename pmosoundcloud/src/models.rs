//! Data models for SoundCloud API responses

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

// ============================================================================
// Tracks
// ============================================================================

/// A track as returned by `/tracks` and `/resolve`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Track {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    /// Canonical page of the track
    #[serde(rename = "permalink_url", default)]
    pub url: String,
    #[serde(rename = "artwork_url", default)]
    pub thumbnail_url: Option<String>,
    /// Track length in milliseconds
    #[serde(rename = "duration", default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub media: Media,
}

impl Track {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Transcodings delivered as segmented (HLS) streams, in API order
    pub fn hls_transcodings(&self) -> impl Iterator<Item = &Transcoding> {
        self.media
            .transcodings
            .iter()
            .filter(|t| t.format.protocol == "hls")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Media {
    #[serde(default)]
    pub transcodings: Vec<Transcoding>,
}

/// One encoding of a track
///
/// `url` does not point at the audio: requesting it with a client id
/// returns a JSON document holding the signed manifest URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transcoding {
    pub url: String,
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub snipped: bool,
    pub format: Format,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Format {
    /// `hls` or `progressive`
    pub protocol: String,
    pub mime_type: String,
}

// ============================================================================
// Streams
// ============================================================================

/// Content hint handed to the audio sink with the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamType {
    /// Ogg container with Opus audio, playable without transcoding
    OggOpus,
    /// Anything else; the sink has to probe and transcode
    Arbitrary,
}

impl StreamType {
    pub fn from_mime(mime_type: &str) -> Self {
        if mime_type.starts_with("audio/ogg") {
            StreamType::OggOpus
        } else {
            StreamType::Arbitrary
        }
    }
}

/// Signed manifest of a track, ready for ingestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamLocation {
    pub manifest_url: Url,
    pub stream_type: StreamType,
}

/// Body of a transcoding URL lookup
#[derive(Debug, Deserialize)]
pub(crate) struct StreamUrlResponse {
    pub url: Option<String>,
}
