//! Media playlist parsing
//!
//! Only what the ingester needs is extracted: the ordered list of segment
//! durations (`#EXTINF`) and segment URIs. Other tags are ignored. Relative
//! URIs are resolved against the manifest URL.

use std::collections::VecDeque;

use tokio::time::Duration;
use url::Url;

use crate::error::{HlsError, Result};

const EXTINF: &str = "#EXTINF:";

/// One media segment listed by a manifest
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub duration: Duration,
    pub url: Url,
}

/// Ordered segment list of a resolved manifest
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    segments: VecDeque<Segment>,
}

impl Manifest {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    /// Sum of all segment durations
    pub fn total_duration(&self) -> Duration {
        self.segments.iter().map(|s| s.duration).sum()
    }

    pub fn into_segments(self) -> VecDeque<Segment> {
        self.segments
    }
}

/// Parses a media playlist fetched from `base`
///
/// Fails when the document is empty, lists no segment, has a segment URI
/// that is not preceded by an `#EXTINF` duration, or has an unreadable
/// duration.
pub fn parse_manifest(body: &str, base: &Url) -> Result<Manifest> {
    if body.trim().is_empty() {
        return Err(HlsError::manifest(format!("empty manifest at {}", base)));
    }

    let mut segments = VecDeque::new();
    let mut pending_duration: Option<Duration> = None;

    for (line_no, raw) in body.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(info) = line.strip_prefix(EXTINF) {
            pending_duration = Some(parse_duration(info, line_no + 1)?);
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        let duration = pending_duration.take().ok_or_else(|| {
            HlsError::manifest(format!(
                "line {}: segment URI without #EXTINF duration",
                line_no + 1
            ))
        })?;
        let url = base.join(line)?;
        segments.push_back(Segment { duration, url });
    }

    if segments.is_empty() {
        return Err(HlsError::manifest(format!("no segments in manifest at {}", base)));
    }

    Ok(Manifest { segments })
}

fn parse_duration(info: &str, line_no: usize) -> Result<Duration> {
    let value = info.split(',').next().unwrap_or_default().trim();
    let secs: f64 = value.parse().map_err(|_| {
        HlsError::manifest(format!("line {}: invalid segment duration '{}'", line_no, value))
    })?;
    Duration::try_from_secs_f64(secs).map_err(|_| {
        HlsError::manifest(format!("line {}: invalid segment duration '{}'", line_no, value))
    })
}
