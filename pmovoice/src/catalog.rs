//! Track resolution used by the player

use async_trait::async_trait;
use pmosoundcloud::{SoundCloudClient, StreamLocation, Track};

use crate::error::Result;

/// Turns queued track ids into fresh metadata and signed manifests
///
/// Resolution happens right before playback because manifest URLs expire.
#[async_trait]
pub trait CatalogResolver: Send + Sync {
    /// Current metadata of a track; fails when the catalog does not know it
    async fn resolve(&self, track_id: u64) -> Result<Track>;

    /// Signed manifest of a track; fails when it has no segmented format
    async fn resolve_manifest(&self, track: &Track) -> Result<StreamLocation>;
}

#[async_trait]
impl CatalogResolver for SoundCloudClient {
    async fn resolve(&self, track_id: u64) -> Result<Track> {
        Ok(self.fetch_track(track_id).await?)
    }

    async fn resolve_manifest(&self, track: &Track) -> Result<StreamLocation> {
        Ok(self.stream_location(track).await?)
    }
}
