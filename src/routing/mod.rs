//! Public asset proxy routing.
//!
//! # Data Flow
//! ```text
//! Incoming request path (+ X-Original-URI)
//!     → parser.rs (public path grammar)
//!     → resolver.rs (project / alias → effective rule set)
//!     → cache.rs (rule set → ordered enabled rules)
//!     → matcher.rs (first matching rule)
//!     → rewrite.rs (internal rewrite target) | forwarder
//!     → dispatch.rs: Rewrite / Forward / PassThrough
//! ```
//!
//! # Design Decisions
//! - Deterministic: same repository state and path always give the same result
//! - First match wins (ordered by rule `order`)
//! - Nothing in here fails a request; errors degrade to pass-through

pub mod cache;
pub mod dispatch;
pub mod matcher;
pub mod parser;
pub mod resolver;
pub mod rewrite;

pub use cache::RuleSetCache;
pub use dispatch::{Dispatch, DispatchController};
pub use parser::{AssetRef, PublicPath};
pub use resolver::{ReferenceResolver, Resolution, RuleSetSource};
