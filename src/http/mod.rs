//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID + trace layers)
//!     → handler.rs (capture, dispatch delivery, forward, tee response)
//!     → request.rs (request ID, upstream URI rewrite)
//!     → response.rs (caller-path error mapping)
//!     → Send to client
//! ```

pub mod handler;
pub mod request;
pub mod response;
pub mod server;

pub use handler::Interceptor;
pub use request::X_REQUEST_ID;
pub use response::ProxyError;
pub use server::HttpServer;
