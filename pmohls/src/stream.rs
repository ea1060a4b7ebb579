//! Consumer side of an ingestion session

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::io::StreamReader;

use crate::error::{HlsError, Result};

/// Ordered, finite byte stream produced by a [`crate::SegmentIngester`]
///
/// The stream ends after the last segment of the manifest. A failure yields
/// one `Err` item and then ends. Closing or dropping the stream cancels the
/// ingestion: the producer stops its refresh countdown and aborts any
/// in-flight request.
#[derive(Debug)]
pub struct SegmentStream {
    rx: mpsc::Receiver<Result<Bytes>>,
}

impl SegmentStream {
    pub(crate) fn new(rx: mpsc::Receiver<Result<Bytes>>) -> Self {
        Self { rx }
    }

    /// Stops the ingestion while keeping already buffered chunks readable
    pub fn close(&mut self) {
        self.rx.close();
    }

    /// Adapts the chunk stream into a byte reader
    pub fn into_async_read(self) -> impl AsyncRead + Send + Unpin {
        StreamReader::new(self.map(|item| item.map_err(std::io::Error::from)))
    }
}

impl Stream for SegmentStream {
    type Item = std::result::Result<Bytes, HlsError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
