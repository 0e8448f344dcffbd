//! Body capture subsystem.
//!
//! # Data Flow
//! ```text
//! inbound request body
//!     → request.rs (drain, clip to max_capture, replay full body upstream)
//!
//! upstream response body
//!     → tee.rs (relay to caller, copy first max_capture bytes aside)
//!     → completion callback (handoff to the delivery task)
//! ```
//!
//! # Design Decisions
//! - Truncation is silent: a capture is a prefix, never an error
//! - The caller always receives the complete, unmodified body
//! - Capture buffers come from a shared pool and are copied out before release

use thiserror::Error;

pub mod pool;
pub mod request;
pub mod tee;

pub use pool::BufferPool;
pub use request::{capture_body, CapturedRequest};
pub use tee::{BoundedCapture, TeeBody};

/// Errors raised while capturing a body.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The inbound body stream failed before it was fully read.
    #[error("failed to read request body: {0}")]
    Read(#[source] Box<dyn std::error::Error + Send + Sync>),
}
