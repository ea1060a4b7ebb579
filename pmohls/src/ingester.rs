//! Segment ingestion task
//!
//! One task per track. It resolves the manifest, downloads segments strictly
//! in order (one request at a time) and pushes their bodies through a bounded
//! channel. A recurring countdown re-resolves the manifest before its signed
//! URLs expire; after each refresh the segments already consumed are skipped
//! so the output never repeats or loses audio.
//!
//! The channel is the only cancellation signal: once the consumer closes or
//! drops its [`SegmentStream`], the task tears down its timer and drops any
//! in-flight response.

use std::collections::VecDeque;

use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::Result;
use crate::fetch::HttpFetcher;
use crate::manifest::{parse_manifest, Segment};
use crate::stream::SegmentStream;
use crate::timer::CountdownTimer;

/// Tuning of an ingestion session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSettings {
    /// Period of the manifest refresh countdown
    pub refresh_period: Duration,
    /// Audio duration fetched per pass before waiting for the next refresh
    pub pass_duration_cap: Duration,
    /// Upper bound of bytes buffered between producer and consumer
    pub buffer_bytes: usize,
    /// Size of the chunks pushed into the channel
    pub chunk_bytes: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            refresh_period: Duration::from_secs(280),
            pass_duration_cap: Duration::from_secs(300),
            buffer_bytes: 5_000_000,
            chunk_bytes: 64 * 1024,
        }
    }
}

impl IngestSettings {
    fn channel_capacity(&self) -> usize {
        (self.buffer_bytes / self.chunk_bytes.max(1)).max(1)
    }
}

/// Progress of an ingestion session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Segments consumed since the session started
    pub segments: usize,
    /// Audio duration consumed since the session started
    pub duration: Duration,
    /// Manifest re-resolutions performed
    pub refreshes: usize,
    /// Set once the task has exited, whatever the reason
    pub finished: bool,
}

#[derive(Debug, Clone, Copy)]
enum IngestCommand {
    Pause,
    Resume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Closed,
}

/// Control handle of a running ingestion
#[derive(Debug, Clone)]
pub struct SegmentIngester {
    commands: mpsc::UnboundedSender<IngestCommand>,
    stats: watch::Receiver<IngestStats>,
}

impl SegmentIngester {
    /// Starts ingesting `manifest_url` on the current tokio runtime
    pub fn spawn(
        fetcher: HttpFetcher,
        manifest_url: Url,
        settings: IngestSettings,
    ) -> (Self, SegmentStream) {
        let (ingester, stream, task) = Self::prepare(fetcher, manifest_url, settings);
        tokio::spawn(task.run());
        (ingester, stream)
    }

    fn prepare(
        fetcher: HttpFetcher,
        manifest_url: Url,
        settings: IngestSettings,
    ) -> (Self, SegmentStream, IngestTask) {
        let (tx, rx) = mpsc::channel(settings.channel_capacity());
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (stats_tx, stats_rx) = watch::channel(IngestStats::default());

        let task = IngestTask {
            timer: CountdownTimer::start(settings.refresh_period),
            fetcher,
            manifest_url,
            settings,
            tx,
            commands: cmd_rx,
            commands_open: true,
            stats: stats_tx,
            pending: VecDeque::new(),
            consumed_segments: 0,
            session_duration: Duration::ZERO,
            pass_duration: Duration::ZERO,
            resolutions: 0,
            refresh_due: false,
            paused: false,
        };

        (
            Self {
                commands: cmd_tx,
                stats: stats_rx,
            },
            SegmentStream::new(rx),
            task,
        )
    }

    /// Suspends the refresh countdown
    ///
    /// Downloads in progress are not interrupted. Returns false once the
    /// task has exited.
    pub fn pause(&self) -> bool {
        self.commands.send(IngestCommand::Pause).is_ok()
    }

    /// Restarts the refresh countdown from its remaining time
    pub fn resume(&self) -> bool {
        self.commands.send(IngestCommand::Resume).is_ok()
    }

    pub fn stats(&self) -> IngestStats {
        *self.stats.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.stats.borrow().finished
    }

    /// Waits until the task has exited
    pub async fn finished(&mut self) -> IngestStats {
        if self.stats.wait_for(|stats| stats.finished).await.is_err() {
            debug!("Ingestion task dropped its progress channel");
        }
        *self.stats.borrow()
    }
}

struct IngestTask {
    fetcher: HttpFetcher,
    manifest_url: Url,
    settings: IngestSettings,
    tx: mpsc::Sender<Result<Bytes>>,
    commands: mpsc::UnboundedReceiver<IngestCommand>,
    commands_open: bool,
    stats: watch::Sender<IngestStats>,
    timer: CountdownTimer,
    pending: VecDeque<Segment>,
    consumed_segments: usize,
    session_duration: Duration,
    pass_duration: Duration,
    resolutions: usize,
    refresh_due: bool,
    /// Pause requested by the consumer; survives a refresh that was
    /// already due when it arrived
    paused: bool,
}

impl IngestTask {
    async fn run(mut self) {
        info!(manifest = %self.manifest_url, "Starting segment ingestion");

        match self.drive().await {
            Ok(Flow::Continue) => info!(
                segments = self.consumed_segments,
                duration_secs = self.session_duration.as_secs_f64(),
                "Segment ingestion finished"
            ),
            Ok(Flow::Closed) => debug!(
                segments = self.consumed_segments,
                "Output stream closed, ingestion canceled"
            ),
            Err(err) => {
                warn!(manifest = %self.manifest_url, error = %err, "Segment ingestion failed");
                let _ = self.tx.send(Err(err)).await;
            }
        }

        self.timer.destroy();
        self.pending.clear();
        self.stats.send_modify(|stats| stats.finished = true);
    }

    async fn drive(&mut self) -> Result<Flow> {
        if self.resolve().await? == Flow::Closed {
            return Ok(Flow::Closed);
        }

        loop {
            if self.refresh_due {
                self.refresh_due = false;
                self.rearm_refresh();
                if self.resolve().await? == Flow::Closed {
                    return Ok(Flow::Closed);
                }
                continue;
            }

            if self.pending.is_empty() {
                return Ok(Flow::Continue);
            }

            if self.pass_duration >= self.settings.pass_duration_cap {
                if self.wait_for_refresh().await == Flow::Closed {
                    return Ok(Flow::Closed);
                }
                continue;
            }

            let Some(segment) = self.pending.pop_front() else {
                return Ok(Flow::Continue);
            };
            self.consumed_segments += 1;
            self.pass_duration += segment.duration;
            self.session_duration += segment.duration;
            self.publish();

            if self.pump_segment(segment).await? == Flow::Closed {
                return Ok(Flow::Closed);
            }
        }
    }

    /// Fetches the manifest and skips the segments already consumed
    async fn resolve(&mut self) -> Result<Flow> {
        let body = tokio::select! {
            biased;
            _ = self.tx.closed() => return Ok(Flow::Closed),
            body = self.fetcher.get_text(&self.manifest_url) => body?,
        };
        let mut segments = parse_manifest(&body, &self.manifest_url)?.into_segments();

        let listed = segments.len();
        segments.drain(..self.consumed_segments.min(listed));
        self.pending = segments;
        self.pass_duration = Duration::ZERO;
        self.resolutions += 1;

        if self.resolutions > 1 {
            info!(
                skipped = self.consumed_segments,
                remaining = self.pending.len(),
                "Manifest refreshed"
            );
        } else {
            debug!(segments = listed, "Manifest resolved");
        }
        self.publish();
        Ok(Flow::Continue)
    }

    /// Streams one segment body into the channel
    ///
    /// A refresh that comes due meanwhile is only recorded; it runs after
    /// the segment completes.
    async fn pump_segment(&mut self, segment: Segment) -> Result<Flow> {
        debug!(
            segment = self.consumed_segments - 1,
            url = %segment.url,
            duration_secs = segment.duration.as_secs_f64(),
            "Fetching segment"
        );

        let response = tokio::select! {
            biased;
            _ = self.tx.closed() => return Ok(Flow::Closed),
            response = self.fetcher.get(&segment.url) => response?,
        };
        let body = response.bytes_stream();
        tokio::pin!(body);

        loop {
            let chunk = tokio::select! {
                biased;
                _ = self.tx.closed() => return Ok(Flow::Closed),
                command = self.commands.recv(), if self.commands_open => {
                    self.apply(command);
                    continue;
                }
                _ = self.timer.expired(), if !self.refresh_due => {
                    debug!("Refresh due during segment download, deferring");
                    self.refresh_due = true;
                    continue;
                }
                chunk = body.next() => chunk,
            };

            match chunk {
                Some(Ok(bytes)) => {
                    if self.forward(bytes).await == Flow::Closed {
                        return Ok(Flow::Closed);
                    }
                }
                Some(Err(err)) => return Err(err.into()),
                None => return Ok(Flow::Continue),
            }
        }
    }

    /// Pushes bytes into the channel in bounded chunks, waiting for room
    async fn forward(&mut self, mut bytes: Bytes) -> Flow {
        enum Step {
            Sent,
            Closed,
            Command(Option<IngestCommand>),
            RefreshDue,
        }

        while !bytes.is_empty() {
            let piece = bytes.split_to(self.settings.chunk_bytes.max(1).min(bytes.len()));
            loop {
                let step = tokio::select! {
                    permit = self.tx.reserve() => match permit {
                        Ok(permit) => {
                            permit.send(Ok(piece.clone()));
                            Step::Sent
                        }
                        Err(_) => Step::Closed,
                    },
                    command = self.commands.recv(), if self.commands_open => Step::Command(command),
                    _ = self.timer.expired(), if !self.refresh_due => Step::RefreshDue,
                };
                match step {
                    Step::Sent => break,
                    Step::Closed => return Flow::Closed,
                    Step::Command(command) => self.apply(command),
                    Step::RefreshDue => self.refresh_due = true,
                }
            }
        }
        Flow::Continue
    }

    /// Idles until the next refresh once the pass cap is reached
    async fn wait_for_refresh(&mut self) -> Flow {
        debug!(
            pass_secs = self.pass_duration.as_secs_f64(),
            "Pass duration cap reached, waiting for manifest refresh"
        );
        loop {
            tokio::select! {
                biased;
                _ = self.tx.closed() => return Flow::Closed,
                command = self.commands.recv(), if self.commands_open => self.apply(command),
                _ = self.timer.expired() => {
                    self.refresh_due = true;
                    return Flow::Continue;
                }
            }
        }
    }

    /// Restarts the refresh countdown, still paused if a pause is pending
    fn rearm_refresh(&mut self) {
        self.timer.reuse();
        if self.paused {
            self.timer.pause();
        }
    }

    fn apply(&mut self, command: Option<IngestCommand>) {
        match command {
            Some(IngestCommand::Pause) => {
                self.paused = true;
                if self.timer.pause() {
                    debug!(remaining = ?self.timer.remaining(), "Refresh countdown paused");
                }
            }
            Some(IngestCommand::Resume) => {
                self.paused = false;
                if self.timer.resume() {
                    debug!(remaining = ?self.timer.remaining(), "Refresh countdown resumed");
                }
            }
            None => self.commands_open = false,
        }
    }

    fn publish(&self) {
        self.stats.send_replace(IngestStats {
            segments: self.consumed_segments,
            duration: self.session_duration,
            refreshes: self.resolutions.saturating_sub(1),
            finished: false,
        });
    }
}
