//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID, routing-relevant headers)
//!     → middleware/ (subdomain mapping, proxy rule dispatch)
//!     → forwarder.rs (upstream call) | static files
//!     → response.rs (hop-by-hop header hygiene)
//! ```

pub mod forwarder;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use forwarder::{Forwarder, HttpForwarder};
pub use request::{X_ORIGINAL_URI, X_REQUEST_ID};
pub use server::HttpServer;
