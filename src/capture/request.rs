//! Request body capture.
//!
//! The inbound body is drained once, a clipped prefix is kept for the
//! tracking payload, and the complete content is replayed to the upstream.

use bytes::Bytes;
use http_body::Body as HttpBody;
use http_body_util::{BodyExt, Full};

use crate::capture::CaptureError;

/// Result of draining a request body.
#[derive(Debug)]
pub struct CapturedRequest {
    /// At most `max_capture` leading bytes of the body.
    pub captured: Bytes,
    /// Fresh body carrying the entire original content.
    pub replay: Full<Bytes>,
}

impl CapturedRequest {
    fn empty() -> Self {
        Self {
            captured: Bytes::new(),
            replay: Full::new(Bytes::new()),
        }
    }
}

/// Drain `body`, keep up to `max_capture` bytes and rebuild a replayable body.
///
/// A body that is already at end of stream is not polled and yields an
/// empty capture. Bodies longer than `max_capture` are clipped silently.
pub async fn capture_body<B>(body: B, max_capture: usize) -> Result<CapturedRequest, CaptureError>
where
    B: HttpBody,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    if body.is_end_stream() {
        return Ok(CapturedRequest::empty());
    }

    let all = body
        .collect()
        .await
        .map_err(|e| CaptureError::Read(e.into()))?
        .to_bytes();

    // Shares the allocation; the prefix stays valid after `all` is moved.
    let captured = all.slice(..all.len().min(max_capture));

    Ok(CapturedRequest {
        captured,
        replay: Full::new(all),
    })
}
