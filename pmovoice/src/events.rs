//! Player notifications for the host application
//!
//! Exactly four slots exist, one per [`PlayerEventKind`]. Each slot holds at
//! most one handler; setting a slot replaces the previous handler. Empty
//! slots behave as no-ops.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use pmosoundcloud::Track;

use crate::queue::Requester;

type QueueEndHandler = Arc<dyn Fn() + Send + Sync>;
type PlayingNowHandler = Arc<dyn Fn(&Track, &Requester) + Send + Sync>;
type SongEndHandler = Arc<dyn Fn() + Send + Sync>;
type BotDisconnectHandler = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerEventKind {
    QueueEnd,
    PlayingNow,
    SongEnd,
    BotDisconnect,
}

/// An event emitted by the player
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    /// The queue ran out with repeat off
    QueueEnd,
    /// A track started streaming; carries who enqueued it
    PlayingNow { track: Track, added_by: Requester },
    /// The sink finished a track
    SongEnd,
    /// The idle delay elapsed and the connection is being closed
    BotDisconnect,
}

impl PlayerEvent {
    pub fn kind(&self) -> PlayerEventKind {
        match self {
            PlayerEvent::QueueEnd => PlayerEventKind::QueueEnd,
            PlayerEvent::PlayingNow { .. } => PlayerEventKind::PlayingNow,
            PlayerEvent::SongEnd => PlayerEventKind::SongEnd,
            PlayerEvent::BotDisconnect => PlayerEventKind::BotDisconnect,
        }
    }
}

#[derive(Default)]
struct Slots {
    queue_end: Option<QueueEndHandler>,
    playing_now: Option<PlayingNowHandler>,
    song_end: Option<SongEndHandler>,
    bot_disconnect: Option<BotDisconnectHandler>,
}

/// Handler table shared between a player and its handles
#[derive(Clone, Default)]
pub struct PlayerEvents {
    slots: Arc<Mutex<Slots>>,
}

impl std::fmt::Debug for PlayerEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.lock();
        f.debug_struct("PlayerEvents")
            .field("queue_end", &slots.queue_end.is_some())
            .field("playing_now", &slots.playing_now.is_some())
            .field("song_end", &slots.song_end.is_some())
            .field("bot_disconnect", &slots.bot_disconnect.is_some())
            .finish()
    }
}

impl PlayerEvents {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn on_queue_end(&self, handler: impl Fn() + Send + Sync + 'static) {
        self.lock().queue_end = Some(Arc::new(handler));
    }

    pub fn on_playing_now(&self, handler: impl Fn(&Track, &Requester) + Send + Sync + 'static) {
        self.lock().playing_now = Some(Arc::new(handler));
    }

    pub fn on_song_end(&self, handler: impl Fn() + Send + Sync + 'static) {
        self.lock().song_end = Some(Arc::new(handler));
    }

    pub fn on_bot_disconnect(&self, handler: impl Fn() + Send + Sync + 'static) {
        self.lock().bot_disconnect = Some(Arc::new(handler));
    }

    /// Empties one slot
    pub fn remove(&self, kind: PlayerEventKind) {
        let mut slots = self.lock();
        match kind {
            PlayerEventKind::QueueEnd => slots.queue_end = None,
            PlayerEventKind::PlayingNow => slots.playing_now = None,
            PlayerEventKind::SongEnd => slots.song_end = None,
            PlayerEventKind::BotDisconnect => slots.bot_disconnect = None,
        }
    }

    /// Empties every slot
    pub fn dispose(&self) {
        *self.lock() = Slots::default();
    }

    pub fn is_set(&self, kind: PlayerEventKind) -> bool {
        let slots = self.lock();
        match kind {
            PlayerEventKind::QueueEnd => slots.queue_end.is_some(),
            PlayerEventKind::PlayingNow => slots.playing_now.is_some(),
            PlayerEventKind::SongEnd => slots.song_end.is_some(),
            PlayerEventKind::BotDisconnect => slots.bot_disconnect.is_some(),
        }
    }

    /// Calls the handler of the event's slot
    ///
    /// The handler runs outside the lock, so it may itself replace or remove
    /// handlers.
    pub(crate) fn emit(&self, event: &PlayerEvent) {
        match event {
            PlayerEvent::QueueEnd => {
                let handler = self.lock().queue_end.clone();
                if let Some(handler) = handler {
                    handler();
                }
            }
            PlayerEvent::PlayingNow { track, added_by } => {
                let handler = self.lock().playing_now.clone();
                if let Some(handler) = handler {
                    handler(track, added_by);
                }
            }
            PlayerEvent::SongEnd => {
                let handler = self.lock().song_end.clone();
                if let Some(handler) = handler {
                    handler();
                }
            }
            PlayerEvent::BotDisconnect => {
                let handler = self.lock().bot_disconnect.clone();
                if let Some(handler) = handler {
                    handler();
                }
            }
        }
    }
}
