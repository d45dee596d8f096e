//! FakeClient: an [`AsyncRead`] transport backed by a channel.
//!
//! Stands in for a client socket so sessions can be driven chunk by chunk,
//! with exact control over where one read ends and the next begins. Each
//! `send_chunk` becomes exactly one read on the session side.

use bytes::Bytes;
use futures::Stream;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::io::StreamReader;

/// A handle for pushing raw chunks into a [`FakeClient`].
pub struct FakeClientWriter {
    tx: mpsc::UnboundedSender<io::Result<Bytes>>,
}

impl FakeClientWriter {
    /// Send one chunk of raw bytes, unmodified.
    pub fn send_chunk(&self, chunk: impl Into<Bytes>) {
        let _ = self.tx.send(Ok(chunk.into()));
    }

    /// Send several chunks in order.
    pub fn send_chunks(&self, chunks: &[Vec<u8>]) {
        for chunk in chunks {
            self.send_chunk(chunk.clone());
        }
    }

    /// Fail the next read with a transport error (connection reset).
    pub fn reset(self) {
        let _ = self
            .tx
            .send(Err(io::Error::new(io::ErrorKind::ConnectionReset, "fake reset")));
    }

    /// Close the stream, causing the session to see EOF.
    pub fn close(self) {
        // tx is dropped, causing the channel to close.
    }
}

/// Chunk stream behind a [`FakeClient`].
pub struct FakeChunks {
    rx: mpsc::UnboundedReceiver<io::Result<Bytes>>,
}

impl Stream for FakeChunks {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

pub type FakeClient = StreamReader<FakeChunks, Bytes>;

/// Create a linked writer/transport pair.
///
/// ```rust
/// let (writer, client) = fake_client();
/// writer.send_chunk(&b"Title\n"[..]);
/// writer.close();
/// let outcome = run_session(&ctx, client, peer(1)).await;
/// ```
pub fn fake_client() -> (FakeClientWriter, FakeClient) {
    let (tx, rx) = mpsc::unbounded_channel();
    (FakeClientWriter { tx }, StreamReader::new(FakeChunks { rx }))
}
