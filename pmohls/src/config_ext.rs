//! Ingestion settings stored in pmoconfig
//!
//! Keys live under `hls.*`. Getters persist the default value when the key
//! is missing, like the other `*ConfigExt` traits of the workspace.
//!
//! ```no_run
//! use pmoconfig::get_config;
//! use pmohls::HlsConfigExt;
//!
//! # fn main() -> anyhow::Result<()> {
//! let settings = get_config().get_ingest_settings()?;
//! println!("refresh every {:?}", settings.refresh_period);
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use pmoconfig::Config;
use tokio::time::Duration;

use crate::fetch::{DEFAULT_MAX_REDIRECTS, DEFAULT_READ_TIMEOUT};
use crate::ingester::IngestSettings;

pub const DEFAULT_REFRESH_PERIOD_SECS: u64 = 280;
pub const DEFAULT_PASS_DURATION_CAP_SECS: u64 = 300;
pub const DEFAULT_BUFFER_BYTES: u64 = 5_000_000;
pub const DEFAULT_CHUNK_BYTES: u64 = 65_536;

/// Extension trait adding segmented-stream settings to `pmoconfig::Config`
pub trait HlsConfigExt {
    // ========================================================================
    // Refresh cycle
    // ========================================================================

    /// Period between manifest re-resolutions (seconds)
    fn get_hls_refresh_period_secs(&self) -> Result<u64>;
    fn set_hls_refresh_period_secs(&self, secs: u64) -> Result<()>;

    /// Audio fetched per pass before waiting for a refresh (seconds)
    fn get_hls_pass_duration_cap_secs(&self) -> Result<u64>;
    fn set_hls_pass_duration_cap_secs(&self, secs: u64) -> Result<()>;

    // ========================================================================
    // Buffering and transport
    // ========================================================================

    fn get_hls_buffer_bytes(&self) -> Result<u64>;
    fn set_hls_buffer_bytes(&self, bytes: u64) -> Result<()>;

    fn get_hls_chunk_bytes(&self) -> Result<u64>;
    fn set_hls_chunk_bytes(&self, bytes: u64) -> Result<()>;

    fn get_hls_max_redirects(&self) -> Result<u64>;
    fn set_hls_max_redirects(&self, hops: u64) -> Result<()>;

    /// Longest silence tolerated while reading a response (seconds)
    fn get_hls_read_timeout_secs(&self) -> Result<u64>;
    fn set_hls_read_timeout_secs(&self, secs: u64) -> Result<()>;

    /// Assembles the ingestion settings from the individual keys
    fn get_ingest_settings(&self) -> Result<IngestSettings>;
}

impl HlsConfigExt for Config {
    fn get_hls_refresh_period_secs(&self) -> Result<u64> {
        self.get_u64_or(&["hls", "refresh_period_secs"], DEFAULT_REFRESH_PERIOD_SECS)
    }

    fn set_hls_refresh_period_secs(&self, secs: u64) -> Result<()> {
        self.set_u64(&["hls", "refresh_period_secs"], secs)
    }

    fn get_hls_pass_duration_cap_secs(&self) -> Result<u64> {
        self.get_u64_or(&["hls", "pass_duration_cap_secs"], DEFAULT_PASS_DURATION_CAP_SECS)
    }

    fn set_hls_pass_duration_cap_secs(&self, secs: u64) -> Result<()> {
        self.set_u64(&["hls", "pass_duration_cap_secs"], secs)
    }

    fn get_hls_buffer_bytes(&self) -> Result<u64> {
        self.get_u64_or(&["hls", "buffer_bytes"], DEFAULT_BUFFER_BYTES)
    }

    fn set_hls_buffer_bytes(&self, bytes: u64) -> Result<()> {
        self.set_u64(&["hls", "buffer_bytes"], bytes)
    }

    fn get_hls_chunk_bytes(&self) -> Result<u64> {
        self.get_u64_or(&["hls", "chunk_bytes"], DEFAULT_CHUNK_BYTES)
    }

    fn set_hls_chunk_bytes(&self, bytes: u64) -> Result<()> {
        self.set_u64(&["hls", "chunk_bytes"], bytes)
    }

    fn get_hls_max_redirects(&self) -> Result<u64> {
        self.get_u64_or(&["hls", "max_redirects"], DEFAULT_MAX_REDIRECTS as u64)
    }

    fn set_hls_max_redirects(&self, hops: u64) -> Result<()> {
        self.set_u64(&["hls", "max_redirects"], hops)
    }

    fn get_hls_read_timeout_secs(&self) -> Result<u64> {
        self.get_u64_or(&["hls", "read_timeout_secs"], DEFAULT_READ_TIMEOUT.as_secs())
    }

    fn set_hls_read_timeout_secs(&self, secs: u64) -> Result<()> {
        self.set_u64(&["hls", "read_timeout_secs"], secs)
    }

    fn get_ingest_settings(&self) -> Result<IngestSettings> {
        let chunk_bytes = self.get_hls_chunk_bytes()?;
        if chunk_bytes == 0 {
            anyhow::bail!("hls.chunk_bytes must be greater than zero");
        }

        Ok(IngestSettings {
            refresh_period: Duration::from_secs(self.get_hls_refresh_period_secs()?),
            pass_duration_cap: Duration::from_secs(self.get_hls_pass_duration_cap_secs()?),
            buffer_bytes: usize::try_from(self.get_hls_buffer_bytes()?)?,
            chunk_bytes: usize::try_from(chunk_bytes)?,
        })
    }
}
