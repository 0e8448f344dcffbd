//! Response tee-streaming.
//!
//! [`TeeBody`] wraps the upstream response body. Frames are relayed to the
//! caller untouched and in order while the first `limit` data bytes are
//! copied into a pooled side buffer. When the stream ends, or the body is
//! dropped early, the captured prefix is copied out, the buffer goes back
//! to the pool and the completion callback receives the bytes.

use bytes::{BufMut, Bytes, BytesMut};
use http_body::{Body as HttpBody, Frame, SizeHint};
use pin_project::{pin_project, pinned_drop};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use crate::capture::pool::BufferPool;

/// Size-bounded copy of the leading bytes of a stream.
#[derive(Debug)]
pub struct BoundedCapture {
    buf: Option<BytesMut>,
    limit: usize,
    pool: Arc<BufferPool>,
}

impl BoundedCapture {
    /// Start a capture of at most `limit` bytes. A zero limit captures nothing
    /// and never touches the pool.
    pub fn new(pool: Arc<BufferPool>, limit: usize) -> Self {
        let buf = (limit > 0).then(|| {
            let mut buf = pool.acquire();
            buf.clear();
            buf
        });
        Self { buf, limit, pool }
    }

    /// Record a chunk that has just been relayed.
    pub fn observe(&mut self, chunk: &[u8]) {
        if let Some(buf) = self.buf.as_mut() {
            let room = self.limit.saturating_sub(buf.len());
            if room > 0 {
                buf.put_slice(&chunk[..chunk.len().min(room)]);
            }
        }
    }

    /// Bytes captured so far.
    pub fn len(&self) -> usize {
        self.buf.as_ref().map_or(0, BytesMut::len)
    }

    /// Copy the capture out and hand the backing buffer back to the pool.
    pub fn finish(mut self) -> Bytes {
        match self.buf.take() {
            Some(buf) => {
                let captured = Bytes::copy_from_slice(&buf);
                self.pool.release(buf);
                captured
            }
            None => Bytes::new(),
        }
    }
}

/// Body adapter relaying an inner body while capturing its prefix.
#[pin_project(PinnedDrop)]
pub struct TeeBody<B, F>
where
    F: FnOnce(Bytes),
{
    #[pin]
    inner: B,
    capture: Option<BoundedCapture>,
    on_complete: Option<F>,
}

impl<B, F> TeeBody<B, F>
where
    F: FnOnce(Bytes),
{
    pub fn new(inner: B, capture: BoundedCapture, on_complete: F) -> Self {
        Self {
            inner,
            capture: Some(capture),
            on_complete: Some(on_complete),
        }
    }
}

fn complete<F: FnOnce(Bytes)>(capture: &mut Option<BoundedCapture>, on_complete: &mut Option<F>) {
    if let Some(on_complete) = on_complete.take() {
        let captured = capture.take().map(BoundedCapture::finish).unwrap_or_default();
        on_complete(captured);
    }
}

impl<B, F> HttpBody for TeeBody<B, F>
where
    B: HttpBody<Data = Bytes>,
    F: FnOnce(Bytes),
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();

        match ready!(this.inner.poll_frame(cx)) {
            Some(Ok(frame)) => {
                if let (Some(data), Some(capture)) = (frame.data_ref(), this.capture.as_mut()) {
                    capture.observe(data);
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Some(Err(e)) => {
                complete(this.capture, this.on_complete);
                Poll::Ready(Some(Err(e)))
            }
            None => {
                complete(this.capture, this.on_complete);
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

#[pinned_drop]
impl<B, F> PinnedDrop for TeeBody<B, F>
where
    F: FnOnce(Bytes),
{
    fn drop(self: Pin<&mut Self>) {
        let this = self.project();
        complete(this.capture, this.on_complete);
    }
}
