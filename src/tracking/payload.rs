//! Tracking payload encoding.
//!
//! The wire format is four tagged segments, comma separated, in a fixed
//! order:
//!
//! ```text
//! {$responseBody}…{/responseBody},{$requestBody}…{/requestBody},{$requestQuery}…{/requestQuery},{$requestUrl}…{/requestUrl}
//! ```
//!
//! Captured bytes are inserted verbatim. A body that itself contains a
//! closing marker makes the payload ambiguous to a naive parser; the
//! tracking endpoint's parser defines how that is handled, so nothing is
//! escaped here.

use bytes::{BufMut, Bytes, BytesMut};
use std::sync::Arc;

use crate::capture::BufferPool;

/// Content type declared on every delivery.
pub const CONTENT_TYPE: &str = "text/plain";

/// Encoded, immutable tracking payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingPayload(Bytes);

impl TrackingPayload {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

/// Builds payloads in pooled scratch buffers.
#[derive(Debug, Clone)]
pub struct PayloadEncoder {
    pool: Arc<BufferPool>,
}

impl PayloadEncoder {
    pub fn new(pool: Arc<BufferPool>) -> Self {
        Self { pool }
    }

    /// Render the four segments. The returned payload owns its bytes; the
    /// scratch buffer is back in the pool before this returns.
    pub fn encode(
        &self,
        response_body: &[u8],
        request_body: &[u8],
        raw_query: &str,
        full_url: &str,
    ) -> TrackingPayload {
        let mut buf = self.pool.acquire();
        buf.clear();

        segment(&mut buf, "responseBody", response_body);
        buf.put_u8(b',');
        segment(&mut buf, "requestBody", request_body);
        buf.put_u8(b',');
        segment(&mut buf, "requestQuery", raw_query.as_bytes());
        buf.put_u8(b',');
        segment(&mut buf, "requestUrl", full_url.as_bytes());

        let payload = TrackingPayload(Bytes::copy_from_slice(&buf));
        self.pool.release(buf);
        payload
    }
}

fn segment(buf: &mut BytesMut, name: &str, content: &[u8]) {
    buf.put_slice(b"{$");
    buf.put_slice(name.as_bytes());
    buf.put_u8(b'}');
    buf.put_slice(content);
    buf.put_slice(b"{/");
    buf.put_slice(name.as_bytes());
    buf.put_u8(b'}');
}
