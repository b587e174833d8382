//! Public asset proxy: rule resolution and forwarding for a multi-tenant
//! static hosting platform.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod model;
pub mod observability;
pub mod repository;
pub mod routing;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
