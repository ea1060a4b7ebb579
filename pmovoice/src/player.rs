//! Playback state machine
//!
//! A player is a task owning one session: queue cursor, repeat mode,
//! playback state, the running ingestion and the idle-disconnect countdown.
//! Callers talk to it through a cloneable [`PlayerHandle`]; sink status
//! transitions arrive on a channel. Both are handled one at a time by the
//! task, so no state is ever shared between concurrent code paths.
//!
//! The sink is the only source of the `Playing`, `Paused` and `Idle` states.
//! The player itself only ever sets `Stopped` (explicit stop, queue end,
//! failed advance).

use std::future;
use std::ops::Range;
use std::sync::Arc;

use pmohls::{
    CountdownTimer, HttpFetcher, IngestSettings, SegmentIngester, DEFAULT_MAX_REDIRECTS,
    DEFAULT_READ_TIMEOUT,
};
use pmosoundcloud::{StreamLocation, StreamType, Track};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Duration;
use tracing::{debug, error, info};

use crate::catalog::CatalogResolver;
use crate::error::{Result, VoiceError};
use crate::events::{PlayerEvent, PlayerEvents};
use crate::queue::{QueueEntry, QueueStore, Requester};
use crate::sink::{AudioSink, AudioStream, SinkStatus, VoiceConnection};

/// Default delay before leaving the voice channel once idle
pub const DEFAULT_IDLE_DISCONNECT: Duration = Duration::from_secs(180);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Nothing playing; initial state and the gap between two tracks
    Idle,
    Playing,
    Paused,
    /// Halted until a new track is enqueued or playback is forced
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatMode {
    #[default]
    Off,
    /// Replay the current entry forever
    Track,
    /// Wrap to the first entry after the last
    Queue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSettings {
    pub idle_disconnect: Duration,
    pub ingest: IngestSettings,
    pub max_redirects: usize,
    /// Longest silence tolerated from a manifest or segment response
    pub read_timeout: Duration,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            idle_disconnect: DEFAULT_IDLE_DISCONNECT,
            ingest: IngestSettings::default(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Track currently handed to the sink
#[derive(Debug, Clone)]
pub struct NowPlaying {
    /// Metadata resolved right before playback
    pub track: Track,
    pub entry: QueueEntry,
    pub stream_type: StreamType,
}

/// Snapshot of a player
#[derive(Debug, Clone)]
pub struct PlayerStatus {
    pub state: PlaybackState,
    pub repeat: RepeatMode,
    /// Queue cursor, `None` before anything was played
    pub current_index: Option<usize>,
    pub now_playing: Option<NowPlaying>,
    pub idle_disconnect_armed: bool,
}

type Reply<T> = oneshot::Sender<T>;

enum PlayerCommand {
    Play {
        track: Box<Track>,
        requested_by: Requester,
        reply: Reply<Result<bool>>,
    },
    Pause(Reply<bool>),
    Resume(Reply<bool>),
    Stop(Reply<bool>),
    Skip(Reply<Result<bool>>),
    PlayPrev(Reply<Result<bool>>),
    SetRepeat(RepeatMode, Reply<bool>),
    QueueRemove(usize, Reply<Result<bool>>),
    QueueClear(Reply<Result<bool>>),
    Queue(Range<usize>, Reply<Result<Vec<QueueEntry>>>),
    QueueLen(Reply<Result<usize>>),
    Status(Reply<PlayerStatus>),
    Dispose(Reply<Result<()>>),
}

// ============================================================================
// Builder
// ============================================================================

/// Collects the collaborators of a player and spawns it
pub struct PlayerBuilder {
    session_id: String,
    store: Option<Arc<dyn QueueStore>>,
    sink: Option<Arc<dyn AudioSink>>,
    catalog: Option<Arc<dyn CatalogResolver>>,
    connection: Option<Arc<dyn VoiceConnection>>,
    fetcher: Option<HttpFetcher>,
    settings: PlayerSettings,
}

impl PlayerBuilder {
    /// `session_id` must be unique per voice session (a guild id, say)
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            store: None,
            sink: None,
            catalog: None,
            connection: None,
            fetcher: None,
            settings: PlayerSettings::default(),
        }
    }

    pub fn store(mut self, store: Arc<dyn QueueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn AudioSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn catalog(mut self, catalog: Arc<dyn CatalogResolver>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn connection(mut self, connection: Arc<dyn VoiceConnection>) -> Self {
        self.connection = Some(connection);
        self
    }

    /// HTTP client used for manifests and segments
    ///
    /// Built from the settings when not provided.
    pub fn fetcher(mut self, fetcher: HttpFetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn settings(mut self, settings: PlayerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Starts the player task on the current tokio runtime
    ///
    /// Fails with [`VoiceError::NotInitialized`] if a collaborator is missing.
    pub fn spawn(self) -> Result<PlayerHandle> {
        let store = self.store.ok_or(VoiceError::NotInitialized("queue store"))?;
        let sink = self.sink.ok_or(VoiceError::NotInitialized("audio sink"))?;
        let catalog = self.catalog.ok_or(VoiceError::NotInitialized("catalog"))?;
        let connection = self
            .connection
            .ok_or(VoiceError::NotInitialized("voice connection"))?;
        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => HttpFetcher::with_read_timeout(
                self.settings.max_redirects,
                self.settings.read_timeout,
            )?,
        };

        let events = PlayerEvents::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = PlayerActor {
            session_id: self.session_id.clone(),
            sink_status: Some(sink.subscribe()),
            store,
            sink,
            catalog,
            connection,
            fetcher,
            settings: self.settings,
            events: events.clone(),
            state: PlaybackState::Idle,
            repeat: RepeatMode::Off,
            current_index: -1,
            now_playing: None,
            ingest: None,
            idle_timer: None,
            disposed: false,
        };
        tokio::spawn(actor.run(rx));

        Ok(PlayerHandle {
            session_id: Arc::from(self.session_id),
            commands: tx,
            events,
        })
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Cloneable access to a running player
///
/// Every method fails with [`VoiceError::PlayerClosed`] once the player has
/// been disposed. Dropping the last handle disposes the player.
#[derive(Clone, Debug)]
pub struct PlayerHandle {
    session_id: Arc<str>,
    commands: mpsc::UnboundedSender<PlayerCommand>,
    events: PlayerEvents,
}

impl std::fmt::Debug for PlayerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PlayerCommand::Play { .. } => "Play",
            PlayerCommand::Pause(_) => "Pause",
            PlayerCommand::Resume(_) => "Resume",
            PlayerCommand::Stop(_) => "Stop",
            PlayerCommand::Skip(_) => "Skip",
            PlayerCommand::PlayPrev(_) => "PlayPrev",
            PlayerCommand::SetRepeat(..) => "SetRepeat",
            PlayerCommand::QueueRemove(..) => "QueueRemove",
            PlayerCommand::QueueClear(_) => "QueueClear",
            PlayerCommand::Queue(..) => "Queue",
            PlayerCommand::QueueLen(_) => "QueueLen",
            PlayerCommand::Status(_) => "Status",
            PlayerCommand::Dispose(_) => "Dispose",
        };
        f.write_str(name)
    }
}

impl PlayerHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Event slots of this player
    pub fn events(&self) -> &PlayerEvents {
        &self.events
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> PlayerCommand) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .map_err(|_| VoiceError::PlayerClosed)?;
        rx.await.map_err(|_| VoiceError::PlayerClosed)
    }

    /// Enqueues a track; starts it when the player is stopped or has never
    /// played
    ///
    /// Returns `Ok(true)` when playback started, `Ok(false)` when the track
    /// was only enqueued.
    pub async fn play(&self, track: Track, requested_by: Requester) -> Result<bool> {
        self.request(|reply| PlayerCommand::Play {
            track: Box::new(track),
            requested_by,
            reply,
        })
        .await?
    }

    /// Pauses the sink; false unless playing
    pub async fn pause(&self) -> Result<bool> {
        self.request(PlayerCommand::Pause).await
    }

    /// Unpauses the sink; false unless paused
    pub async fn resume(&self) -> Result<bool> {
        self.request(PlayerCommand::Resume).await
    }

    /// Stops playback; false unless playing or paused
    pub async fn stop(&self) -> Result<bool> {
        self.request(PlayerCommand::Stop).await
    }

    /// Moves to the next entry whatever the current state
    ///
    /// Ignores `Track` repeat but wraps around in `Queue` mode. Returns
    /// false when stopped on the last entry, or when the queue ended.
    pub async fn skip(&self) -> Result<bool> {
        self.request(PlayerCommand::Skip).await?
    }

    /// Replays the previous entry (the first one when already at the start)
    pub async fn play_prev(&self) -> Result<bool> {
        self.request(PlayerCommand::PlayPrev).await?
    }

    /// Returns whether the mode changed
    pub async fn set_repeat(&self, mode: RepeatMode) -> Result<bool> {
        self.request(|reply| PlayerCommand::SetRepeat(mode, reply)).await
    }

    pub async fn repeat(&self) -> Result<RepeatMode> {
        Ok(self.status().await?.repeat)
    }

    /// Deletes an entry, keeping the cursor on the same logical slot
    ///
    /// Returns false when `index` is out of range.
    pub async fn queue_remove(&self, index: usize) -> Result<bool> {
        self.request(|reply| PlayerCommand::QueueRemove(index, reply))
            .await?
    }

    /// Empties the queue; false when it was already empty
    pub async fn queue_clear(&self) -> Result<bool> {
        self.request(PlayerCommand::QueueClear).await?
    }

    /// Entries in `range` (half-open)
    pub async fn queue(&self, range: Range<usize>) -> Result<Vec<QueueEntry>> {
        self.request(|reply| PlayerCommand::Queue(range, reply))
            .await?
    }

    pub async fn queue_len(&self) -> Result<usize> {
        self.request(PlayerCommand::QueueLen).await?
    }

    pub async fn status(&self) -> Result<PlayerStatus> {
        self.request(PlayerCommand::Status).await
    }

    pub async fn state(&self) -> Result<PlaybackState> {
        Ok(self.status().await?.state)
    }

    pub async fn current_index(&self) -> Result<Option<usize>> {
        Ok(self.status().await?.current_index)
    }

    pub async fn now_playing(&self) -> Result<Option<NowPlaying>> {
        Ok(self.status().await?.now_playing)
    }

    /// Stops playback, detaches from the sink, clears the queue and the
    /// event slots, then ends the player task
    pub async fn dispose(&self) -> Result<()> {
        self.request(PlayerCommand::Dispose).await?
    }
}

// ============================================================================
// Actor
// ============================================================================

struct PlayerActor {
    session_id: String,
    store: Arc<dyn QueueStore>,
    sink: Arc<dyn AudioSink>,
    catalog: Arc<dyn CatalogResolver>,
    connection: Arc<dyn VoiceConnection>,
    fetcher: HttpFetcher,
    settings: PlayerSettings,
    events: PlayerEvents,
    state: PlaybackState,
    repeat: RepeatMode,
    /// `-1` until something was played
    current_index: i64,
    now_playing: Option<NowPlaying>,
    ingest: Option<SegmentIngester>,
    idle_timer: Option<CountdownTimer>,
    sink_status: Option<mpsc::UnboundedReceiver<SinkStatus>>,
    disposed: bool,
}

async fn next_status(rx: &mut Option<mpsc::UnboundedReceiver<SinkStatus>>) -> Option<SinkStatus> {
    match rx {
        Some(rx) => rx.recv().await,
        None => future::pending().await,
    }
}

async fn idle_expired(timer: &mut Option<CountdownTimer>) {
    match timer {
        Some(timer) => timer.expired().await,
        None => future::pending().await,
    }
}

impl PlayerActor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<PlayerCommand>) {
        info!(session = %self.session_id, "Player started");

        while !self.disposed {
            // Sink transitions first so a command always sees the effects
            // of the transitions reported before it.
            tokio::select! {
                biased;
                status = next_status(&mut self.sink_status) => match status {
                    Some(status) => self.on_sink_status(status).await,
                    None => {
                        debug!(session = %self.session_id, "Sink status channel closed");
                        self.sink_status = None;
                    }
                },
                _ = idle_expired(&mut self.idle_timer) => self.on_idle_timeout().await,
                command = commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => {
                        debug!(session = %self.session_id, "All player handles dropped");
                        if let Err(err) = self.dispose().await {
                            error!(session = %self.session_id, error = %err, "Dispose failed");
                        }
                    }
                },
            }
        }

        info!(session = %self.session_id, "Player stopped");
    }

    async fn handle(&mut self, command: PlayerCommand) {
        debug!(session = %self.session_id, ?command, "Player command");
        match command {
            PlayerCommand::Play {
                track,
                requested_by,
                reply,
            } => {
                let _ = reply.send(self.play(*track, requested_by).await);
            }
            PlayerCommand::Pause(reply) => {
                let _ = reply.send(self.pause().await);
            }
            PlayerCommand::Resume(reply) => {
                let _ = reply.send(self.resume().await);
            }
            PlayerCommand::Stop(reply) => {
                let _ = reply.send(self.stop().await);
            }
            PlayerCommand::Skip(reply) => {
                let _ = reply.send(self.skip().await);
            }
            PlayerCommand::PlayPrev(reply) => {
                let _ = reply.send(self.play_prev().await);
            }
            PlayerCommand::SetRepeat(mode, reply) => {
                let changed = self.repeat != mode;
                self.repeat = mode;
                let _ = reply.send(changed);
            }
            PlayerCommand::QueueRemove(index, reply) => {
                let _ = reply.send(self.queue_remove(index).await);
            }
            PlayerCommand::QueueClear(reply) => {
                let _ = reply.send(self.queue_clear().await);
            }
            PlayerCommand::Queue(range, reply) => {
                let entries = self.store.range(&self.session_id, range).await;
                let _ = reply.send(entries.map_err(VoiceError::from));
            }
            PlayerCommand::QueueLen(reply) => {
                let len = self.store.len(&self.session_id).await;
                let _ = reply.send(len.map_err(VoiceError::from));
            }
            PlayerCommand::Status(reply) => {
                let _ = reply.send(self.status());
            }
            PlayerCommand::Dispose(reply) => {
                let _ = reply.send(self.dispose().await);
            }
        }
    }

    fn status(&self) -> PlayerStatus {
        PlayerStatus {
            state: self.state,
            repeat: self.repeat,
            current_index: usize::try_from(self.current_index).ok(),
            now_playing: self.now_playing.clone(),
            idle_disconnect_armed: self.idle_timer.is_some(),
        }
    }

    // ------------------------------------------------------------------------
    // Sink transitions and timers
    // ------------------------------------------------------------------------

    async fn on_sink_status(&mut self, status: SinkStatus) {
        match status {
            SinkStatus::Playing => {
                self.state = PlaybackState::Playing;
                if let Some(mut timer) = self.idle_timer.take() {
                    timer.destroy();
                    debug!(session = %self.session_id, "Idle disconnect canceled");
                }
            }
            SinkStatus::Paused => self.state = PlaybackState::Paused,
            SinkStatus::Idle => self.on_track_end().await,
            SinkStatus::Buffering | SinkStatus::AutoPaused => {
                debug!(session = %self.session_id, ?status, "Ignoring sink status");
            }
        }
    }

    async fn on_track_end(&mut self) {
        self.idle_timer = Some(CountdownTimer::start(self.settings.idle_disconnect));
        self.ingest = None;
        self.events.emit(&PlayerEvent::SongEnd);

        if self.state == PlaybackState::Stopped {
            debug!(session = %self.session_id, "Track ended while stopped");
            return;
        }
        self.state = PlaybackState::Idle;

        let advanced = if self.repeat == RepeatMode::Track {
            self.replay_current().await
        } else {
            self.play_next().await
        };
        if let Err(err) = advanced {
            error!(
                session = %self.session_id,
                index = self.current_index,
                error = %err,
                "Failed to start the next track, stopping"
            );
            self.now_playing = None;
            self.state = PlaybackState::Stopped;
        }
    }

    async fn on_idle_timeout(&mut self) {
        self.idle_timer = None;
        info!(session = %self.session_id, "Idle for too long, disconnecting");
        self.events.emit(&PlayerEvent::BotDisconnect);
        self.connection.disconnect().await;
    }

    // ------------------------------------------------------------------------
    // Queue navigation
    // ------------------------------------------------------------------------

    async fn entry_at(&self, index: i64) -> Result<Option<QueueEntry>> {
        match usize::try_from(index) {
            Ok(index) => Ok(self.store.get(&self.session_id, index).await?),
            Err(_) => Ok(None),
        }
    }

    /// Advances the cursor, wrapping in `Queue` mode
    ///
    /// Returns false after handling the end of the queue.
    async fn play_next(&mut self) -> Result<bool> {
        let mut next = self.current_index + 1;
        let mut entry = self.entry_at(next).await?;

        if entry.is_none() && self.repeat == RepeatMode::Queue && next != 0 {
            debug!(session = %self.session_id, "Wrapping around to the first entry");
            next = 0;
            entry = self.entry_at(next).await?;
        }

        match entry {
            Some(entry) => {
                self.play_entry(next, entry).await?;
                Ok(true)
            }
            None => {
                self.on_queue_end().await;
                Ok(false)
            }
        }
    }

    async fn replay_current(&mut self) -> Result<bool> {
        match self.entry_at(self.current_index).await? {
            Some(entry) => {
                self.play_entry(self.current_index, entry).await?;
                Ok(true)
            }
            None => self.play_next().await,
        }
    }

    async fn on_queue_end(&mut self) {
        info!(session = %self.session_id, "Queue ended");
        self.state = PlaybackState::Stopped;
        self.now_playing = None;
        self.ingest = None;
        self.sink.stop().await;
        self.events.emit(&PlayerEvent::QueueEnd);
    }

    /// Resolves a queued entry and starts streaming it
    ///
    /// The cursor only moves once the stream is handed to the sink.
    async fn play_entry(&mut self, index: i64, entry: QueueEntry) -> Result<()> {
        let track = self.catalog.resolve(entry.track_id).await?;
        let location = self.catalog.resolve_manifest(&track).await?;
        self.start_stream(index, entry, track, location).await
    }

    async fn start_stream(
        &mut self,
        index: i64,
        entry: QueueEntry,
        track: Track,
        location: StreamLocation,
    ) -> Result<()> {
        let (ingester, stream) = SegmentIngester::spawn(
            self.fetcher.clone(),
            location.manifest_url,
            self.settings.ingest.clone(),
        );
        self.sink
            .play(AudioStream {
                stream,
                stream_type: location.stream_type,
            })
            .await?;

        self.current_index = index;
        self.ingest = Some(ingester);
        info!(
            session = %self.session_id,
            index,
            track = track.id,
            title = %track.title,
            "Now playing"
        );
        self.events.emit(&PlayerEvent::PlayingNow {
            track: track.clone(),
            added_by: entry.added_by.clone(),
        });
        self.now_playing = Some(NowPlaying {
            track,
            entry,
            stream_type: location.stream_type,
        });
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    async fn play(&mut self, track: Track, requested_by: Requester) -> Result<bool> {
        let entry = QueueEntry::new(&track, requested_by);
        let position = self.store.append(&self.session_id, &entry).await?;
        debug!(session = %self.session_id, position, track = track.id, "Track enqueued");

        let startable = match self.state {
            PlaybackState::Stopped => true,
            PlaybackState::Idle => self.now_playing.is_none(),
            PlaybackState::Playing | PlaybackState::Paused => false,
        };
        if !startable {
            return Ok(false);
        }

        let location = self.catalog.resolve_manifest(&track).await?;
        self.start_stream(position as i64, entry, track, location)
            .await?;
        Ok(true)
    }

    async fn pause(&mut self) -> bool {
        if self.state != PlaybackState::Playing {
            return false;
        }
        let paused = self.sink.pause().await;
        if paused {
            if let Some(ingest) = &self.ingest {
                ingest.pause();
            }
        }
        paused
    }

    async fn resume(&mut self) -> bool {
        if self.state != PlaybackState::Paused {
            return false;
        }
        let resumed = self.sink.unpause().await;
        if resumed {
            if let Some(ingest) = &self.ingest {
                ingest.resume();
            }
        }
        resumed
    }

    async fn stop(&mut self) -> bool {
        if !matches!(self.state, PlaybackState::Playing | PlaybackState::Paused) {
            return false;
        }
        self.state = PlaybackState::Stopped;
        self.now_playing = None;
        self.ingest = None;
        self.sink.stop().await;
        true
    }

    async fn skip(&mut self) -> Result<bool> {
        let len = self.store.len(&self.session_id).await? as i64;
        if self.state == PlaybackState::Stopped && self.current_index + 1 >= len {
            return Ok(false);
        }
        self.play_next().await
    }

    async fn play_prev(&mut self) -> Result<bool> {
        let target = (self.current_index - 1).max(0);
        match self.entry_at(target).await? {
            Some(entry) => {
                self.play_entry(target, entry).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn queue_remove(&mut self, index: usize) -> Result<bool> {
        if !self.store.delete_at(&self.session_id, index).await? {
            return Ok(false);
        }
        if index as i64 <= self.current_index {
            self.current_index -= 1;
        }
        debug!(session = %self.session_id, index, cursor = self.current_index, "Queue entry removed");
        Ok(true)
    }

    async fn queue_clear(&mut self) -> Result<bool> {
        if self.store.is_empty(&self.session_id).await? {
            return Ok(false);
        }
        self.store.clear(&self.session_id).await?;
        self.current_index = -1;
        Ok(true)
    }

    async fn dispose(&mut self) -> Result<()> {
        info!(session = %self.session_id, "Disposing player");
        self.disposed = true;
        self.sink_status = None;
        if let Some(mut timer) = self.idle_timer.take() {
            timer.destroy();
        }
        self.state = PlaybackState::Stopped;
        self.now_playing = None;
        self.ingest = None;
        self.sink.stop().await;
        self.events.dispose();
        self.store.clear(&self.session_id).await?;
        Ok(())
    }
}
