//! # pmosoundcloud - SoundCloud catalog client
//!
//! Resolves SoundCloud tracks to playable, signed HLS manifests:
//!
//! - [`SoundCloudClient::fetch_tracks`] / [`SoundCloudClient::fetch_track`]:
//!   lookup by numeric id
//! - [`SoundCloudClient::resolve_url`]: lookup by track page URL
//! - [`SoundCloudClient::stream_location`]: signed manifest URL plus the
//!   [`StreamType`] hint for the audio sink
//!
//! Search and client-id discovery are not provided; the client id comes
//! from the caller or from the configuration.

pub mod client;
pub mod error;
pub mod models;

#[cfg(feature = "pmoconfig")]
pub mod config_ext;

pub use client::{ClientBuilder, SoundCloudClient};
pub use error::{Error, Result};
pub use models::{Format, Media, StreamLocation, StreamType, Track, Transcoding};

#[cfg(feature = "pmoconfig")]
pub use config_ext::SoundCloudConfigExt;
