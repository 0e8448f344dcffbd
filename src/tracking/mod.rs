//! Tracking subsystem.
//!
//! # Data Flow
//! ```text
//! handler (before upstream call)
//!     → delivery.rs: dispatch() spawns the task, returns ResponseHandoff
//!
//! tee body end-of-stream
//!     → ResponseHandoff::complete(captured response)
//!     → payload.rs (encode four tagged segments)
//!     → POST tracking_url under the delivery timeout
//!     → DeliveryOutcome (logged, counted, never surfaced to the caller)
//! ```

pub mod delivery;
pub mod payload;

pub use delivery::{
    DeliveryError, DeliveryOutcome, RequestSnapshot, ResponseHandoff, TrackingDispatcher,
};
pub use payload::{PayloadEncoder, TrackingPayload};
