//! # pmovoice - Voice-channel playback engine
//!
//! One [`PlayerHandle`] per voice session. The player keeps a persistent
//! queue, follows repeat modes, streams segmented audio to an
//! [`AudioSink`] and leaves the channel after a configurable idle delay.
//!
//! The host application provides the collaborators:
//!
//! - [`QueueStore`]: [`SqliteQueueStore`] or [`MemoryQueueStore`]
//! - [`AudioSink`] and [`VoiceConnection`]: the chat platform's voice layer
//! - [`CatalogResolver`]: implemented for `pmosoundcloud::SoundCloudClient`
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use pmoconfig::get_config;
//! use pmosoundcloud::SoundCloudConfigExt;
//! use pmovoice::{
//!     init_logging, AudioSink, PlayerBuilder, Requester, VoiceConfigExt, VoiceConnection,
//! };
//!
//! # async fn example(
//! #     sink: Arc<dyn AudioSink>,
//! #     connection: Arc<dyn VoiceConnection>,
//! # ) -> anyhow::Result<()> {
//! let config = get_config();
//! init_logging(&config);
//!
//! let client = config.get_soundcloud_client_builder()?.build()?;
//! let track = client.fetch_track(13158665).await?;
//!
//! let player = PlayerBuilder::new("guild-42")
//!     .store(Arc::new(config.open_queue_store()?))
//!     .catalog(Arc::new(client))
//!     .sink(sink)
//!     .connection(connection)
//!     .settings(config.get_player_settings()?)
//!     .spawn()?;
//!
//! player.events().on_playing_now(|track, by| {
//!     println!("Now playing {} (requested by {})", track.title, by.nickname);
//! });
//! player.play(track, Requester::new(1, "dj")).await?;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config_ext;
pub mod error;
pub mod events;
pub mod logging;
pub mod player;
pub mod queue;
pub mod sink;

pub use catalog::CatalogResolver;
pub use config_ext::VoiceConfigExt;
pub use error::{QueueError, QueueResult, Result, VoiceError};
pub use events::{PlayerEvent, PlayerEventKind, PlayerEvents};
pub use logging::init_logging;
pub use player::{
    NowPlaying, PlaybackState, PlayerBuilder, PlayerHandle, PlayerSettings, PlayerStatus,
    RepeatMode,
};
pub use queue::{MemoryQueueStore, QueueEntry, QueueStore, Requester, SqliteQueueStore};
pub use sink::{AudioSink, AudioStream, SinkStatus, SinkStatusBus, VoiceConnection};
