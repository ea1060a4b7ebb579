//! # pmohls - Segmented stream ingestion
//!
//! Turns a short-lived, signed media playlist into one continuous byte
//! stream:
//!
//! - [`CountdownTimer`]: pausable, reusable single-shot delay
//! - [`parse_manifest`]: ordered `(duration, url)` segment list
//! - [`HttpFetcher`]: GET with explicit redirect following
//! - [`SegmentIngester`]: producer task with periodic manifest refresh and
//!   a bounded, backpressured output ([`SegmentStream`])
//!
//! ## Example
//!
//! ```no_run
//! use futures::StreamExt;
//! use pmohls::{HttpFetcher, IngestSettings, SegmentIngester};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = HttpFetcher::new(10)?;
//! let url = url::Url::parse("https://cdn.example.com/track/playlist.m3u8")?;
//! let (_ingester, mut stream) = SegmentIngester::spawn(fetcher, url, IngestSettings::default());
//!
//! while let Some(chunk) = stream.next().await {
//!     let bytes = chunk?;
//!     println!("{} bytes", bytes.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod fetch;
pub mod ingester;
pub mod manifest;
pub mod stream;
pub mod timer;

#[cfg(feature = "pmoconfig")]
pub mod config_ext;

pub use error::{HlsError, Result};
pub use fetch::{HttpFetcher, DEFAULT_MAX_REDIRECTS, DEFAULT_READ_TIMEOUT};
pub use ingester::{IngestSettings, IngestStats, SegmentIngester};
pub use manifest::{parse_manifest, Manifest, Segment};
pub use stream::SegmentStream;
pub use timer::{CountdownTimer, TimerState};

#[cfg(feature = "pmoconfig")]
pub use config_ext::HlsConfigExt;
