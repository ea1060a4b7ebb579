//! Audio output and voice connection interfaces
//!
//! The player never decodes audio. It hands an [`AudioStream`] to an
//! [`AudioSink`] and follows the sink's status transitions.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use pmohls::SegmentStream;
use pmosoundcloud::StreamType;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::Result;

/// Status transitions reported by a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkStatus {
    Playing,
    Paused,
    /// Nothing to play: the stream ended or was stopped
    Idle,
    Buffering,
    /// Paused by the sink itself, e.g. nobody is listening
    AutoPaused,
}

/// Byte stream of one track plus its content hint
#[derive(Debug)]
pub struct AudioStream {
    pub stream: SegmentStream,
    pub stream_type: StreamType,
}

/// Audio output of a voice session
///
/// Contract expected by the player:
/// - `play` replaces the current stream without reporting `Idle` for the
///   replaced one; `Idle` means the stream played to its end or was stopped.
/// - `stop` on an idle sink reports nothing and returns false.
/// - Dropping a stream (on replace or stop) cancels its ingestion.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn play(&self, stream: AudioStream) -> Result<()>;

    /// Returns false when nothing is playing
    async fn pause(&self) -> bool;

    /// Returns false when not paused
    async fn unpause(&self) -> bool;

    /// Returns false when already idle
    async fn stop(&self) -> bool;

    /// Registers a listener for status transitions
    fn subscribe(&self) -> mpsc::UnboundedReceiver<SinkStatus>;
}

/// Voice transport of a session
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    async fn disconnect(&self);
}

/// Fan-out of sink status transitions, for sink implementations
///
/// Dropped receivers are pruned on the next broadcast.
#[derive(Clone, Default)]
pub struct SinkStatusBus {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<SinkStatus>>>>,
}

impl SinkStatusBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<mpsc::UnboundedSender<SinkStatus>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SinkStatus> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        rx
    }

    pub fn broadcast(&self, status: SinkStatus) {
        trace!(?status, "Sink status");
        self.lock().retain(|tx| tx.send(status).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }
}
