//! Per-session playback queue
//!
//! A [`QueueStore`] keeps one ordered list of [`QueueEntry`] per session,
//! addressed by zero-based position. Deleting position `p` shifts every
//! later entry down by one.

mod memory;
mod sqlite;

pub use memory::MemoryQueueStore;
pub use sqlite::SqliteQueueStore;

use std::ops::Range;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pmosoundcloud::Track;
use serde::{Deserialize, Serialize};

use crate::error::QueueResult;

/// Who enqueued a track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub id: u64,
    pub nickname: String,
}

impl Requester {
    pub fn new(id: u64, nickname: impl Into<String>) -> Self {
        Self {
            id,
            nickname: nickname.into(),
        }
    }
}

/// One queued track, immutable once created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    #[serde(rename = "soundcloud_id")]
    pub track_id: u64,
    pub title: String,
    pub url: String,
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    pub thumbnail_url: Option<String>,
    pub added_by: Requester,
    pub added_at: DateTime<Utc>,
}

impl QueueEntry {
    pub fn new(track: &Track, added_by: Requester) -> Self {
        Self {
            track_id: track.id,
            title: track.title.clone(),
            url: track.url.clone(),
            duration_ms: track.duration_ms,
            thumbnail_url: track.thumbnail_url.clone(),
            added_by,
            added_at: Utc::now(),
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Storage of the per-session queues
///
/// Implementors provide the primitives; `get` and `is_empty` are derived.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Appends an entry, returning its position
    async fn append(&self, session: &str, entry: &QueueEntry) -> QueueResult<usize>;

    /// Entries in `range` (half-open); positions past the end are ignored
    async fn range(&self, session: &str, range: Range<usize>) -> QueueResult<Vec<QueueEntry>>;

    /// Deletes the entry at `position`, returning false when there is none
    async fn delete_at(&self, session: &str, position: usize) -> QueueResult<bool>;

    /// Drops the whole queue of a session
    async fn clear(&self, session: &str) -> QueueResult<()>;

    async fn len(&self, session: &str) -> QueueResult<usize>;

    async fn get(&self, session: &str, position: usize) -> QueueResult<Option<QueueEntry>> {
        Ok(self
            .range(session, position..position.saturating_add(1))
            .await?
            .into_iter()
            .next())
    }

    async fn is_empty(&self, session: &str) -> QueueResult<bool> {
        Ok(self.len(session).await? == 0)
    }
}
