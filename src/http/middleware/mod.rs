//! Request middleware.
//!
//! ```text
//! subdomain.rs    Host `{alias}.{base}` → /public/subdomain-alias/{alias}/...
//! proxy_rules.rs  dispatch decision → rewrite | forward | pass through
//! ```

pub mod proxy_rules;
pub mod subdomain;

pub use proxy_rules::{proxy_rules_middleware, ProxyState};
pub use subdomain::subdomain_alias_middleware;
