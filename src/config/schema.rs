//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from the TOML config
//! file. Every field has a default so an empty file is a valid config.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for the asset proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Static asset directory served when no proxy rule applies.
    pub static_files: StaticFilesConfig,

    /// Wildcard subdomain front end.
    pub subdomain: SubdomainConfig,

    /// Rule set cache settings.
    pub rule_cache: RuleCacheConfig,

    /// Upstream forwarding defaults.
    pub forwarding: ForwardingConfig,

    /// Project, alias and rule data source.
    pub repository: RepositoryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Timeout for requests served locally (static files, health), in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 60 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    /// Root directory; request paths map onto it unchanged.
    pub root: PathBuf,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./storage"),
        }
    }
}

/// Maps `{alias}.{base_domain}` hosts onto the subdomain-alias path grammar.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SubdomainConfig {
    pub enabled: bool,

    /// e.g. "preview.example.com".
    pub base_domain: String,
}

/// Rule set cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RuleCacheConfig {
    /// How long a fetched rule set is trusted, in seconds.
    pub ttl_secs: u64,

    /// How often expired entries are dropped, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for RuleCacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 10,
            sweep_interval_secs: 60,
        }
    }
}

/// Forwarding defaults; rules may override the timeout.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForwardingConfig {
    /// Upstream timeout when a rule sets none, in milliseconds.
    pub default_timeout_ms: u64,

    /// Upstream connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
            connect_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// TOML file with projects, aliases and rules. Empty repository if unset.
    pub path: Option<PathBuf>,

    /// Reload the file when it changes.
    pub watch: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            path: None,
            watch: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
