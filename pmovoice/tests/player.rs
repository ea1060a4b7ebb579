//! Player behavior against fake voice collaborators

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pmosoundcloud::{SoundCloudClient, StreamLocation, StreamType, Track};
use pmovoice::{
    AudioSink, AudioStream, CatalogResolver, MemoryQueueStore, PlaybackState, PlayerBuilder,
    PlayerEventKind, PlayerHandle, PlayerSettings, QueueStore, RepeatMode, Requester, SinkStatus,
    SinkStatusBus, VoiceConnection, VoiceError,
};
use serde_json::json;
use tokio::io::AsyncReadExt;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SESSION: &str = "guild-1";
const OFFLINE: &str = "http://127.0.0.1:1";

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
struct SinkState {
    current: Option<AudioStream>,
    active: bool,
    paused: bool,
    plays: usize,
}

/// Sink reporting transitions synchronously, like a voice library would
#[derive(Default)]
struct FakeSink {
    bus: SinkStatusBus,
    state: Mutex<SinkState>,
}

impl FakeSink {
    fn take_stream(&self) -> Option<AudioStream> {
        self.state.lock().unwrap().current.take()
    }

    fn plays(&self) -> usize {
        self.state.lock().unwrap().plays
    }

    fn is_active(&self) -> bool {
        self.state.lock().unwrap().active
    }

    /// The current stream played to its end
    fn end_track(&self) {
        {
            let mut state = self.state.lock().unwrap();
            state.current = None;
            state.active = false;
            state.paused = false;
        }
        self.bus.broadcast(SinkStatus::Idle);
    }
}

#[async_trait]
impl AudioSink for FakeSink {
    async fn play(&self, stream: AudioStream) -> pmovoice::Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            state.current = Some(stream);
            state.active = true;
            state.paused = false;
            state.plays += 1;
        }
        self.bus.broadcast(SinkStatus::Playing);
        Ok(())
    }

    async fn pause(&self) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            if !state.active || state.paused {
                return false;
            }
            state.paused = true;
        }
        self.bus.broadcast(SinkStatus::Paused);
        true
    }

    async fn unpause(&self) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            if !state.paused {
                return false;
            }
            state.paused = false;
        }
        self.bus.broadcast(SinkStatus::Playing);
        true
    }

    async fn stop(&self) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            if !state.active {
                return false;
            }
            state.current = None;
            state.active = false;
            state.paused = false;
        }
        self.bus.broadcast(SinkStatus::Idle);
        true
    }

    fn subscribe(&self) -> tokio::sync::mpsc::UnboundedReceiver<SinkStatus> {
        self.bus.subscribe()
    }
}

#[derive(Default)]
struct FakeConnection {
    disconnects: AtomicUsize,
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

impl FakeConnection {
    fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

/// Catalog serving manifests under `{base}/tracks/{id}/playlist.m3u8`
struct FakeCatalog {
    base: String,
    unknown: Mutex<HashSet<u64>>,
    unplayable: Mutex<HashSet<u64>>,
    resolves: AtomicUsize,
}

impl FakeCatalog {
    fn new(base: &str) -> Self {
        Self {
            base: base.to_string(),
            unknown: Mutex::new(HashSet::new()),
            unplayable: Mutex::new(HashSet::new()),
            resolves: AtomicUsize::new(0),
        }
    }

    fn forget(&self, id: u64) {
        self.unknown.lock().unwrap().insert(id);
    }

    fn make_unplayable(&self, id: u64) {
        self.unplayable.lock().unwrap().insert(id);
    }

    fn resolves(&self) -> usize {
        self.resolves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogResolver for FakeCatalog {
    async fn resolve(&self, track_id: u64) -> pmovoice::Result<Track> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        if self.unknown.lock().unwrap().contains(&track_id) {
            return Err(pmosoundcloud::Error::TrackNotFound(track_id.to_string()).into());
        }
        Ok(track(track_id))
    }

    async fn resolve_manifest(&self, track: &Track) -> pmovoice::Result<StreamLocation> {
        if self.unplayable.lock().unwrap().contains(&track.id) {
            return Err(pmosoundcloud::Error::NoPlayableFormat(track.id).into());
        }
        Ok(StreamLocation {
            manifest_url: Url::parse(&format!("{}/tracks/{}/playlist.m3u8", self.base, track.id))
                .unwrap(),
            stream_type: StreamType::OggOpus,
        })
    }
}

fn track(id: u64) -> Track {
    Track {
        id,
        title: format!("Track {}", id),
        url: format!("https://soundcloud.com/artist/track-{}", id),
        thumbnail_url: None,
        duration_ms: 2_000,
        media: Default::default(),
    }
}

fn dj() -> Requester {
    Requester::new(7, "dj")
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    player: PlayerHandle,
    sink: Arc<FakeSink>,
    catalog: Arc<FakeCatalog>,
    connection: Arc<FakeConnection>,
    store: Arc<MemoryQueueStore>,
    log: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    fn new(base: &str) -> Self {
        let sink = Arc::new(FakeSink::default());
        let catalog = Arc::new(FakeCatalog::new(base));
        let connection = Arc::new(FakeConnection::default());
        let store = Arc::new(MemoryQueueStore::new());

        let player = PlayerBuilder::new(SESSION)
            .store(store.clone())
            .sink(sink.clone())
            .catalog(catalog.clone())
            .connection(connection.clone())
            .spawn()
            .unwrap();
        let log = record_events(&player);

        Self {
            player,
            sink,
            catalog,
            connection,
            store,
            log,
        }
    }

    async fn play(&self, id: u64) -> bool {
        self.player.play(track(id), dj()).await.unwrap()
    }

    async fn playing_id(&self) -> Option<u64> {
        self.player
            .now_playing()
            .await
            .unwrap()
            .map(|now| now.track.id)
    }

    fn events(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

fn record_events(player: &PlayerHandle) -> Arc<Mutex<Vec<String>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let events = player.events();

    let l = log.clone();
    events.on_queue_end(move || l.lock().unwrap().push("queue_end".to_string()));
    let l = log.clone();
    events.on_playing_now(move |track, by| {
        l.lock()
            .unwrap()
            .push(format!("playing:{}:{}", track.id, by.nickname))
    });
    let l = log.clone();
    events.on_song_end(move || l.lock().unwrap().push("song_end".to_string()));
    let l = log.clone();
    events.on_bot_disconnect(move || l.lock().unwrap().push("bot_disconnect".to_string()));

    log
}

// ============================================================================
// Queue progression
// ============================================================================

#[tokio::test]
async fn test_first_play_starts_and_later_plays_enqueue() {
    let h = Harness::new(OFFLINE);

    assert!(h.play(1).await);
    assert!(!h.play(2).await);
    assert!(!h.play(3).await);

    let status = h.player.status().await.unwrap();
    assert_eq!(status.state, PlaybackState::Playing);
    assert_eq!(status.current_index, Some(0));
    assert_eq!(status.now_playing.unwrap().entry.added_by, dj());
    assert_eq!(h.player.queue_len().await.unwrap(), 3);
    assert_eq!(h.sink.plays(), 1);
    assert_eq!(h.events(), vec!["playing:1:dj"]);
}

#[tokio::test]
async fn test_tracks_advance_until_queue_end() {
    let h = Harness::new(OFFLINE);
    h.play(1).await;
    h.play(2).await;

    h.sink.end_track();
    assert_eq!(h.playing_id().await, Some(2));
    assert_eq!(h.player.current_index().await.unwrap(), Some(1));

    h.sink.end_track();
    let status = h.player.status().await.unwrap();
    assert_eq!(status.state, PlaybackState::Stopped);
    assert!(status.now_playing.is_none());
    assert!(status.idle_disconnect_armed);

    assert_eq!(
        h.events(),
        vec!["playing:1:dj", "song_end", "playing:2:dj", "song_end", "queue_end"]
    );
    // The queue survives its end
    assert_eq!(h.player.queue_len().await.unwrap(), 2);
}

#[tokio::test]
async fn test_remove_before_cursor_keeps_the_next_track() {
    let h = Harness::new(OFFLINE);
    for id in 1..=3 {
        h.play(id).await;
    }
    h.sink.end_track();
    assert_eq!(h.player.current_index().await.unwrap(), Some(1));

    assert!(h.player.queue_remove(0).await.unwrap());
    assert_eq!(h.player.current_index().await.unwrap(), Some(0));

    h.sink.end_track();
    assert_eq!(h.playing_id().await, Some(3));
    assert_eq!(h.player.current_index().await.unwrap(), Some(1));
}

#[tokio::test]
async fn test_removing_the_playing_entry_plays_its_successor_next() {
    let h = Harness::new(OFFLINE);
    for id in 1..=3 {
        h.play(id).await;
    }
    h.sink.end_track();
    assert_eq!(h.playing_id().await, Some(2));

    assert!(h.player.queue_remove(1).await.unwrap());
    assert_eq!(h.player.current_index().await.unwrap(), Some(0));

    h.sink.end_track();
    assert_eq!(h.playing_id().await, Some(3));
    assert_eq!(h.player.current_index().await.unwrap(), Some(1));
    assert!(!h.events().contains(&"queue_end".to_string()));
}

#[tokio::test]
async fn test_remove_after_cursor_and_out_of_range() {
    let h = Harness::new(OFFLINE);
    for id in 1..=3 {
        h.play(id).await;
    }

    assert!(h.player.queue_remove(2).await.unwrap());
    assert!(!h.player.queue_remove(5).await.unwrap());
    assert_eq!(h.player.current_index().await.unwrap(), Some(0));

    let ids: Vec<u64> = h
        .player
        .queue(0..10)
        .await
        .unwrap()
        .iter()
        .map(|entry| entry.track_id)
        .collect();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test]
async fn test_play_after_stop_starts_the_new_entry() {
    let h = Harness::new(OFFLINE);
    h.play(1).await;
    h.play(2).await;

    assert!(h.player.stop().await.unwrap());
    assert_eq!(h.player.state().await.unwrap(), PlaybackState::Stopped);
    assert!(!h.sink.is_active());

    assert!(h.play(3).await);
    assert_eq!(h.player.current_index().await.unwrap(), Some(2));
    assert_eq!(h.playing_id().await, Some(3));
    assert_eq!(h.player.state().await.unwrap(), PlaybackState::Playing);
}

#[tokio::test]
async fn test_play_prev() {
    let h = Harness::new(OFFLINE);
    assert!(!h.player.play_prev().await.unwrap());

    for id in 1..=3 {
        h.play(id).await;
    }
    h.sink.end_track();

    assert!(h.player.play_prev().await.unwrap());
    assert_eq!(h.player.current_index().await.unwrap(), Some(0));
    assert_eq!(h.playing_id().await, Some(1));

    // Already at the start: the first entry plays again
    assert!(h.player.play_prev().await.unwrap());
    assert_eq!(h.player.current_index().await.unwrap(), Some(0));
    assert_eq!(h.sink.plays(), 4);
}

#[tokio::test]
async fn test_queue_clear() {
    let h = Harness::new(OFFLINE);
    assert!(!h.player.queue_clear().await.unwrap());

    h.play(1).await;
    h.play(2).await;
    assert!(h.player.queue_clear().await.unwrap());

    assert_eq!(h.player.queue_len().await.unwrap(), 0);
    assert_eq!(h.player.current_index().await.unwrap(), None);
}

// ============================================================================
// Repeat modes
// ============================================================================

#[tokio::test]
async fn test_set_repeat_reports_changes() {
    let h = Harness::new(OFFLINE);

    assert_eq!(h.player.repeat().await.unwrap(), RepeatMode::Off);
    assert!(h.player.set_repeat(RepeatMode::Queue).await.unwrap());
    assert!(!h.player.set_repeat(RepeatMode::Queue).await.unwrap());
    assert_eq!(h.player.repeat().await.unwrap(), RepeatMode::Queue);
}

#[tokio::test]
async fn test_repeat_track_replays_current_entry() {
    let h = Harness::new(OFFLINE);
    h.play(1).await;
    h.play(2).await;
    h.player.set_repeat(RepeatMode::Track).await.unwrap();

    for _ in 0..3 {
        h.sink.end_track();
        assert_eq!(h.playing_id().await, Some(1));
        assert_eq!(h.player.current_index().await.unwrap(), Some(0));
    }
    assert_eq!(h.catalog.resolves(), 3);

    // Skip ignores the track loop
    assert!(h.player.skip().await.unwrap());
    assert_eq!(h.playing_id().await, Some(2));
}

#[tokio::test]
async fn test_repeat_queue_wraps_around() {
    let h = Harness::new(OFFLINE);
    h.play(1).await;
    h.play(2).await;
    h.player.set_repeat(RepeatMode::Queue).await.unwrap();

    h.sink.end_track();
    h.sink.end_track();
    assert_eq!(h.player.current_index().await.unwrap(), Some(0));
    assert_eq!(h.playing_id().await, Some(1));

    // Skipping past the end wraps as well
    h.player.skip().await.unwrap();
    assert!(h.player.skip().await.unwrap());
    assert_eq!(h.player.current_index().await.unwrap(), Some(0));

    assert!(!h.events().contains(&"queue_end".to_string()));
}

#[tokio::test]
async fn test_repeat_queue_with_empty_queue_ends() {
    let h = Harness::new(OFFLINE);
    h.player.set_repeat(RepeatMode::Queue).await.unwrap();

    h.sink.bus.broadcast(SinkStatus::Idle);

    assert_eq!(h.player.state().await.unwrap(), PlaybackState::Stopped);
    assert_eq!(h.events(), vec!["song_end", "queue_end"]);
}

// ============================================================================
// Transport commands
// ============================================================================

#[tokio::test]
async fn test_commands_refused_in_the_wrong_state() {
    let h = Harness::new(OFFLINE);

    assert!(!h.player.pause().await.unwrap());
    assert!(!h.player.resume().await.unwrap());
    assert!(!h.player.stop().await.unwrap());

    h.play(1).await;
    assert!(!h.player.resume().await.unwrap());
    assert!(h.player.pause().await.unwrap());
    assert_eq!(h.player.state().await.unwrap(), PlaybackState::Paused);
    assert!(!h.player.pause().await.unwrap());

    assert!(h.player.resume().await.unwrap());
    assert_eq!(h.player.state().await.unwrap(), PlaybackState::Playing);

    assert!(h.player.stop().await.unwrap());
    assert!(!h.player.stop().await.unwrap());
}

#[tokio::test]
async fn test_stop_from_pause() {
    let h = Harness::new(OFFLINE);
    h.play(1).await;
    h.play(2).await;
    h.player.pause().await.unwrap();

    assert!(h.player.stop().await.unwrap());

    let status = h.player.status().await.unwrap();
    assert_eq!(status.state, PlaybackState::Stopped);
    // The sink's idle report after a stop does not advance the queue
    assert_eq!(status.current_index, Some(0));
    assert_eq!(h.events(), vec!["playing:1:dj", "song_end"]);
}

#[tokio::test]
async fn test_skip() {
    let h = Harness::new(OFFLINE);
    h.play(1).await;
    h.play(2).await;

    assert!(h.player.skip().await.unwrap());
    assert_eq!(h.playing_id().await, Some(2));

    // Stopped on the last entry: nothing to skip to
    h.player.stop().await.unwrap();
    assert!(!h.player.skip().await.unwrap());
    assert_eq!(h.player.current_index().await.unwrap(), Some(1));
}

#[tokio::test]
async fn test_skip_while_stopped_resumes_the_queue() {
    let h = Harness::new(OFFLINE);
    h.play(1).await;
    h.play(2).await;
    h.player.stop().await.unwrap();

    assert!(h.player.skip().await.unwrap());
    assert_eq!(h.playing_id().await, Some(2));
    assert_eq!(h.player.state().await.unwrap(), PlaybackState::Playing);
}

#[tokio::test]
async fn test_skip_past_last_entry_ends_the_queue() {
    let h = Harness::new(OFFLINE);
    h.play(1).await;

    assert!(!h.player.skip().await.unwrap());

    assert_eq!(h.player.state().await.unwrap(), PlaybackState::Stopped);
    assert!(!h.sink.is_active());
    assert!(h.events().contains(&"queue_end".to_string()));
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_unplayable_track_is_reported_and_kept() {
    let h = Harness::new(OFFLINE);
    h.catalog.make_unplayable(5);

    let err = h.player.play(track(5), dj()).await.unwrap_err();
    assert!(err.is_no_playable_format());

    let status = h.player.status().await.unwrap();
    assert_eq!(status.state, PlaybackState::Idle);
    assert!(status.now_playing.is_none());
    assert_eq!(status.current_index, None);
    assert_eq!(h.player.queue_len().await.unwrap(), 1);

    // Nothing is playing, so the next track starts
    assert!(h.play(6).await);
    assert_eq!(h.player.current_index().await.unwrap(), Some(1));
}

#[tokio::test]
async fn test_failed_advance_stops_the_player() {
    let h = Harness::new(OFFLINE);
    h.play(1).await;
    h.play(2).await;
    h.catalog.forget(2);

    h.sink.end_track();

    let status = h.player.status().await.unwrap();
    assert_eq!(status.state, PlaybackState::Stopped);
    assert_eq!(status.current_index, Some(0));
    assert!(status.now_playing.is_none());
    assert_eq!(h.events(), vec!["playing:1:dj", "song_end"]);
}

#[tokio::test]
async fn test_failed_skip_keeps_the_cursor() {
    let h = Harness::new(OFFLINE);
    h.play(1).await;
    h.play(2).await;
    h.catalog.make_unplayable(2);

    let err = h.player.skip().await.unwrap_err();
    assert!(matches!(err, VoiceError::Catalog(_)));

    let status = h.player.status().await.unwrap();
    assert_eq!(status.current_index, Some(0));
    assert_eq!(status.state, PlaybackState::Playing);
    assert_eq!(status.now_playing.unwrap().track.id, 1);
}

// ============================================================================
// Idle disconnect
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_idle_disconnect_fires_after_delay() {
    let h = Harness::new(OFFLINE);

    h.sink.bus.broadcast(SinkStatus::Idle);
    assert!(h.player.status().await.unwrap().idle_disconnect_armed);

    tokio::time::sleep(Duration::from_secs(179)).await;
    assert_eq!(h.connection.disconnects(), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.connection.disconnects(), 1);
    assert!(!h.player.status().await.unwrap().idle_disconnect_armed);
    assert_eq!(h.events().last().map(String::as_str), Some("bot_disconnect"));

    // Fires once
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(h.connection.disconnects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_playing_cancels_idle_disconnect() {
    let h = Harness::new(OFFLINE);

    h.sink.bus.broadcast(SinkStatus::Idle);
    tokio::time::sleep(Duration::from_secs(100)).await;
    h.sink.bus.broadcast(SinkStatus::Playing);

    let status = h.player.status().await.unwrap();
    assert!(!status.idle_disconnect_armed);
    assert_eq!(status.state, PlaybackState::Playing);

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(h.connection.disconnects(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_idle_delay_restarts_on_each_song_end() {
    let sink = Arc::new(FakeSink::default());
    let connection = Arc::new(FakeConnection::default());
    let player = PlayerBuilder::new(SESSION)
        .store(Arc::new(MemoryQueueStore::new()))
        .sink(sink.clone())
        .catalog(Arc::new(FakeCatalog::new(OFFLINE)))
        .connection(connection.clone())
        .settings(PlayerSettings {
            idle_disconnect: Duration::from_secs(10),
            ..PlayerSettings::default()
        })
        .spawn()
        .unwrap();

    sink.bus.broadcast(SinkStatus::Idle);
    tokio::time::sleep(Duration::from_secs(8)).await;
    sink.bus.broadcast(SinkStatus::Idle);
    player.status().await.unwrap();

    tokio::time::sleep(Duration::from_secs(8)).await;
    assert_eq!(connection.disconnects(), 0);
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(connection.disconnects(), 1);
}

#[tokio::test]
async fn test_ignored_sink_statuses() {
    let h = Harness::new(OFFLINE);
    h.play(1).await;

    h.sink.bus.broadcast(SinkStatus::Buffering);
    h.sink.bus.broadcast(SinkStatus::AutoPaused);

    assert_eq!(h.player.state().await.unwrap(), PlaybackState::Playing);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_dispose() {
    let h = Harness::new(OFFLINE);
    h.play(1).await;
    h.play(2).await;

    h.player.dispose().await.unwrap();

    assert!(!h.sink.is_active());
    assert_eq!(h.store.len(SESSION).await.unwrap(), 0);
    assert!(!h.player.events().is_set(PlayerEventKind::PlayingNow));
    assert!(matches!(
        h.player.status().await,
        Err(VoiceError::PlayerClosed)
    ));

    // Statuses reported after disposal reach nobody
    h.sink.end_track();
    assert_eq!(h.sink.bus.subscriber_count(), 0);
    assert_eq!(h.connection.disconnects(), 0);
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let store = Arc::new(MemoryQueueStore::new());
    let spawn = |session: &str| {
        PlayerBuilder::new(session)
            .store(store.clone())
            .sink(Arc::new(FakeSink::default()))
            .catalog(Arc::new(FakeCatalog::new(OFFLINE)))
            .connection(Arc::new(FakeConnection::default()))
            .spawn()
            .unwrap()
    };
    let a = spawn("a");
    let b = spawn("b");

    a.play(track(1), dj()).await.unwrap();
    a.play(track(2), dj()).await.unwrap();
    b.play(track(3), dj()).await.unwrap();

    assert_eq!(a.queue_len().await.unwrap(), 2);
    assert_eq!(b.queue_len().await.unwrap(), 1);
    assert_eq!(b.session_id(), "b");

    b.dispose().await.unwrap();
    assert_eq!(store.len("a").await.unwrap(), 2);
}

// ============================================================================
// Streaming
// ============================================================================

async fn mount_segments(server: &MockServer, prefix: &str, count: usize) -> Vec<u8> {
    let mut manifest = String::from("#EXTM3U\n#EXT-X-TARGETDURATION:2\n");
    let mut expected = Vec::new();
    for i in 0..count {
        manifest.push_str(&format!("#EXTINF:2.000,\nseg/{}.ts\n", i));
        let body = format!("[{} segment {}]", prefix, i).into_bytes();
        expected.extend_from_slice(&body);
        Mock::given(method("GET"))
            .and(path(format!("{}/seg/{}.ts", prefix, i)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(server)
            .await;
    }
    manifest.push_str("#EXT-X-ENDLIST\n");

    Mock::given(method("GET"))
        .and(path(format!("{}/playlist.m3u8", prefix)))
        .respond_with(ResponseTemplate::new(200).set_body_string(manifest))
        .mount(server)
        .await;
    expected
}

async fn read_stream(stream: AudioStream) -> Vec<u8> {
    let mut reader = stream.stream.into_async_read();
    let mut bytes = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), reader.read_to_end(&mut bytes))
        .await
        .expect("stream did not end")
        .unwrap();
    bytes
}

#[tokio::test]
async fn test_segments_reach_the_sink_in_order() {
    let server = MockServer::start().await;
    let expected = mount_segments(&server, "/tracks/99", 30).await;
    let h = Harness::new(&server.uri());

    assert!(h.play(99).await);

    let stream = h.sink.take_stream().unwrap();
    assert_eq!(stream.stream_type, StreamType::OggOpus);
    assert_eq!(read_stream(stream).await, expected);

    h.sink.end_track();
    let status = h.player.status().await.unwrap();
    assert_eq!(status.state, PlaybackState::Stopped);
    assert!(status.idle_disconnect_armed);
    assert_eq!(
        h.events(),
        vec!["playing:99:dj", "song_end", "queue_end"]
    );

    // Streaming is over: the rest runs on the paused clock
    tokio::time::pause();
    tokio::time::sleep(Duration::from_secs(181)).await;

    assert_eq!(h.connection.disconnects(), 1);
    assert_eq!(
        h.events(),
        vec!["playing:99:dj", "song_end", "queue_end", "bot_disconnect"]
    );
}

fn api_track(server: &MockServer, id: u64) -> serde_json::Value {
    json!({
        "id": id,
        "title": format!("Remote {}", id),
        "permalink_url": format!("https://soundcloud.com/artist/remote-{}", id),
        "duration": 6000,
        "media": {
            "transcodings": [{
                "url": format!("{}/media/{}/hls-opus", server.uri(), id),
                "preset": "opus_0_0",
                "format": {"protocol": "hls", "mime_type": "audio/ogg; codecs=\"opus\""}
            }]
        }
    })
}

async fn mount_api_track(server: &MockServer, id: u64) -> Vec<u8> {
    Mock::given(method("GET"))
        .and(path("/tracks"))
        .and(query_param("ids", id.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([api_track(server, id)])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/media/{}/hls-opus", id)))
        .and(query_param("client_id", "test-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": format!("{}/cdn/{}/playlist.m3u8", server.uri(), id)
        })))
        .mount(server)
        .await;
    mount_segments(server, &format!("/cdn/{}", id), 3).await
}

#[tokio::test]
async fn test_soundcloud_catalog_end_to_end() {
    let server = MockServer::start().await;
    let first = mount_api_track(&server, 7).await;
    let second = mount_api_track(&server, 8).await;

    let client = SoundCloudClient::builder()
        .client_id("test-id")
        .base_url(server.uri())
        .build()
        .unwrap();
    let sink = Arc::new(FakeSink::default());
    let player = PlayerBuilder::new(SESSION)
        .store(Arc::new(MemoryQueueStore::new()))
        .sink(sink.clone())
        .catalog(Arc::new(client.clone()))
        .connection(Arc::new(FakeConnection::default()))
        .spawn()
        .unwrap();

    assert!(player
        .play(client.fetch_track(7).await.unwrap(), dj())
        .await
        .unwrap());
    assert!(!player
        .play(client.fetch_track(8).await.unwrap(), dj())
        .await
        .unwrap());
    assert_eq!(read_stream(sink.take_stream().unwrap()).await, first);

    sink.end_track();
    let now = player.now_playing().await.unwrap().unwrap();
    assert_eq!(now.track.title, "Remote 8");
    assert_eq!(now.stream_type, StreamType::OggOpus);
    assert_eq!(read_stream(sink.take_stream().unwrap()).await, second);
}
