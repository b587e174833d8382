//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use asset_proxy::config::ProxyConfig;
use asset_proxy::http::{HttpForwarder, HttpServer};
use asset_proxy::lifecycle::Shutdown;
use asset_proxy::repository::{InMemoryRepository, Snapshot};

pub const SHA: &str = "abcdef0123456789abcdef0123456789abcdef01";

/// Start a mock backend that answers every request with its request line
/// followed by the request headers, one per line.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 8192];
                        let mut read = 0;
                        while read < buf.len() {
                            match socket.read(&mut buf[read..]).await {
                                Ok(0) | Err(_) => break,
                                Ok(n) => read += n,
                            }
                            if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                                break;
                            }
                        }
                        let head = String::from_utf8_lossy(&buf[..read]);
                        let body = head.split("\r\n\r\n").next().unwrap_or("").replace("\r\n", "\n");
                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nSet-Cookie: upstream=1\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a backend that accepts connections and never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// Repository file for `acme/site` pointing forwarded rules at `backend`.
pub fn acme_repository(backend: SocketAddr) -> Snapshot {
    Snapshot::from_toml(&format!(
        r#"
        [[projects]]
        id = "p1"
        owner = "acme"
        name = "site"
        default_proxy_rule_set_id = "rs1"

        [[aliases]]
        id = "a1"
        project_id = "p1"
        name = "production"
        commit_sha = "{SHA}"
        proxy_rule_set_id = "rs2"

        [[aliases]]
        id = "a2"
        project_id = "p1"
        name = "preview-abcdef0"
        commit_sha = "{SHA}"
        is_auto_preview = true

        [[rules]]
        id = "api"
        rule_set_id = "rs1"
        path_pattern = "/api/*"
        target_url = "http://{backend}"
        order = 0

        [[rules]]
        id = "env"
        rule_set_id = "rs2"
        path_pattern = "/env.json"
        target_url = "/environments/production.json"
        internal_rewrite = true
        order = 0

        [[rules]]
        id = "graphql"
        rule_set_id = "rs2"
        path_pattern = "/graphql"
        target_url = "http://{backend}/gql"
        order = 1
        forward = {{ headers = {{ x-tenant = "acme" }}, forward_cookies = false }}
        "#
    ))
    .unwrap()
}

/// A running proxy server bound to an ephemeral port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub repository: Arc<InMemoryRepository>,
    pub shutdown: Shutdown,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the proxy with `config` over `snapshot`.
pub async fn start_proxy(config: ProxyConfig, snapshot: Snapshot) -> TestProxy {
    let repository = Arc::new(InMemoryRepository::new(snapshot));
    let forwarder = Arc::new(HttpForwarder::new(&config.forwarding).unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, repository.clone(), forwarder);
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    TestProxy {
        addr,
        repository,
        shutdown,
    }
}

/// Client that never pools or proxies, so each test sees fresh connections.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
