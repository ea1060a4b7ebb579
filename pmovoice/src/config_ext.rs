//! Player settings stored in pmoconfig
//!
//! Keys live under `voice.*`; ingestion settings come from
//! [`HlsConfigExt`].

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use pmoconfig::Config;
use pmohls::HlsConfigExt;
use serde_yaml::Value;

use crate::player::PlayerSettings;
use crate::queue::SqliteQueueStore;

pub const DEFAULT_IDLE_DISCONNECT_SECS: u64 = 180;
pub const DEFAULT_QUEUE_DB: &str = "queue.db";

/// Extension trait adding player settings to `pmoconfig::Config`
pub trait VoiceConfigExt {
    /// Delay before leaving the channel once idle (seconds)
    fn get_voice_idle_disconnect_secs(&self) -> Result<u64>;
    fn set_voice_idle_disconnect_secs(&self, secs: u64) -> Result<()>;

    /// Queue database path, relative paths resolved against the config
    /// directory
    fn get_voice_queue_db(&self) -> Result<PathBuf>;
    fn set_voice_queue_db(&self, path: &str) -> Result<()>;

    fn get_player_settings(&self) -> Result<PlayerSettings>;

    /// Opens the configured queue database
    fn open_queue_store(&self) -> Result<SqliteQueueStore>;
}

impl VoiceConfigExt for Config {
    fn get_voice_idle_disconnect_secs(&self) -> Result<u64> {
        self.get_u64_or(&["voice", "idle_disconnect_secs"], DEFAULT_IDLE_DISCONNECT_SECS)
    }

    fn set_voice_idle_disconnect_secs(&self, secs: u64) -> Result<()> {
        self.set_u64(&["voice", "idle_disconnect_secs"], secs)
    }

    fn get_voice_queue_db(&self) -> Result<PathBuf> {
        let path = self.get_string_or(&["voice", "queue_db"], DEFAULT_QUEUE_DB)?;
        Ok(self.resolve_path(&path))
    }

    fn set_voice_queue_db(&self, path: &str) -> Result<()> {
        self.set_value(&["voice", "queue_db"], Value::String(path.to_string()))
    }

    fn get_player_settings(&self) -> Result<PlayerSettings> {
        Ok(PlayerSettings {
            idle_disconnect: Duration::from_secs(self.get_voice_idle_disconnect_secs()?),
            ingest: self.get_ingest_settings()?,
            max_redirects: usize::try_from(self.get_hls_max_redirects()?)?,
            read_timeout: Duration::from_secs(self.get_hls_read_timeout_secs()?),
        })
    }

    fn open_queue_store(&self) -> Result<SqliteQueueStore> {
        let path = self.get_voice_queue_db()?;
        Ok(SqliteQueueStore::open(&path)?)
    }
}
