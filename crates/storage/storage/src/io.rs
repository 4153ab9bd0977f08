use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

/// Byte stream handed to [`put`](crate::StorageBackend::put) and returned
/// by [`get`](crate::StorageBackend::get). Dropping it closes the
/// underlying file or connection.
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Wrap an in-memory buffer as an [`ObjectReader`].
pub fn reader_from_bytes(bytes: impl Into<Vec<u8>>) -> ObjectReader {
    Box::pin(std::io::Cursor::new(bytes.into()))
}

/// An [`ObjectReader`] that yields nothing.
pub fn empty_reader() -> ObjectReader {
    Box::pin(tokio::io::empty())
}

/// Drain a reader into memory.
pub async fn read_to_vec(mut reader: ObjectReader) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await?;
    Ok(buf)
}

/// Marker carried inside the [`std::io::Error`] raised by [`LimitedReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("stream exceeds the {limit} byte limit")]
pub struct LimitExceeded {
    pub limit: u64,
}

/// Reader that fails once more than `limit` bytes have been pulled through
/// it, so oversized uploads abort before the backend commits anything.
#[derive(Debug)]
pub struct LimitedReader<R> {
    inner: R,
    limit: u64,
    read: u64,
}

impl<R> LimitedReader<R> {
    pub fn new(inner: R, limit: u64) -> Self {
        Self {
            inner,
            limit,
            read: 0,
        }
    }

    /// Bytes read so far.
    pub fn bytes_read(&self) -> u64 {
        self.read
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for LimitedReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = &mut *self;
        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        this.read += (buf.filled().len() - before) as u64;
        if this.read > this.limit {
            return Poll::Ready(Err(std::io::Error::other(LimitExceeded {
                limit: this.limit,
            })));
        }
        Poll::Ready(Ok(()))
    }
}
