//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (accepted by server.rs)
//!     → hyper HTTP/1.1 with header-read timeout
//!     → request body timeout, response deadline (tower-http)
//!     → request.rs (x-request-id)
//!     → handler.rs (placeholder response)
//! ```

pub mod handler;
pub mod request;
pub mod server;

pub use request::{MakeRequestUuidV4, X_REQUEST_ID};
pub use server::{ServerHandle, ServerId, ShutdownTimeout};
