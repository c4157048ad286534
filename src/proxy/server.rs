//! Proxy server: TCP accept loop and per-connection handling.
//!
//! The server owns nothing global: the blocklist, cache, and event log are
//! injected via [`ProxyConfig`] and handed to each request task by `Arc`,
//! so tests can substitute a fresh store per test.
//!
//! Each accepted connection is served by hyper's HTTP/1.1 stack in its own
//! Tokio task, with upgrade support enabled for CONNECT tunneling.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::dispatch::handle_http;
use super::error::{ProxyError, ProxyResult};
use super::tunnel::handle_connect;
use crate::blocklist::Blocklist;
use crate::cache::ResponseCache;
use crate::eventlog::EventLog;

/// Default listen address.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

/// Configuration for the proxy server.
#[derive(Clone)]
pub struct ProxyConfig {
    /// TCP address to listen on.
    pub listen_addr: SocketAddr,
    /// Blocked host substrings, immutable for the server's lifetime.
    pub blocklist: Arc<Blocklist>,
    /// Shared response cache.
    pub cache: Arc<ResponseCache>,
    /// Append-only event log for blocked/erroring requests.
    pub events: Arc<EventLog>,
}

/// The main proxy server.
pub struct ProxyServer {
    config: ProxyConfig,
    /// Shutdown signal receiver.
    shutdown_rx: watch::Receiver<bool>,
}

impl ProxyServer {
    /// Create a new proxy server.
    pub fn new(config: ProxyConfig, shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            config,
            shutdown_rx,
        }
    }

    /// Get a reference to the shared response cache.
    pub fn cache(&self) -> Arc<ResponseCache> {
        self.config.cache.clone()
    }

    /// Get a reference to the blocklist.
    pub fn blocklist(&self) -> Arc<Blocklist> {
        self.config.blocklist.clone()
    }

    /// Bind the configured address and run the accept loop.
    ///
    /// Returns when the shutdown signal is received.
    pub async fn run(self) -> ProxyResult<()> {
        let listener = TcpListener::bind(self.config.listen_addr).await?;
        info!("Proxy listening on {}", self.config.listen_addr);
        self.serve(listener).await
    }

    /// Run the accept loop on an already-bound listener.
    ///
    /// Split out from [`run`](Self::run) so tests can bind port 0
    /// themselves and learn the actual address.
    pub async fn serve(self, listener: TcpListener) -> ProxyResult<()> {
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => {
                            debug!("Accepted connection from {}", addr);
                            self.spawn_connection_handler(stream);
                        }
                        Err(e) => {
                            warn!("Failed to accept connection: {}", e);
                        }
                    }
                }
                changed = shutdown_rx.changed() => {
                    // A dropped sender counts as shutdown
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Proxy shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Spawn a task to handle a single client connection.
    fn spawn_connection_handler(&self, stream: TcpStream) {
        let blocklist = self.config.blocklist.clone();
        let cache = self.config.cache.clone();
        let events = self.config.events.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, blocklist, cache, events).await {
                // Connection resets are routine, not errors
                let err_str = e.to_string();
                if err_str.contains("connection reset")
                    || err_str.contains("broken pipe")
                    || err_str.contains("Connection reset")
                {
                    debug!("Connection ended: {}", e);
                } else {
                    warn!("Connection error: {}", e);
                }
            }
        });
    }
}

/// Serve a single client connection.
async fn handle_connection(
    stream: TcpStream,
    blocklist: Arc<Blocklist>,
    cache: Arc<ResponseCache>,
    events: Arc<EventLog>,
) -> ProxyResult<()> {
    let io = TokioIo::new(stream);

    let service = service_fn(move |req: Request<Incoming>| {
        let blocklist = blocklist.clone();
        let cache = cache.clone();
        let events = events.clone();

        async move { route_request(req, blocklist, cache, events).await }
    });

    // HTTP/1.1 with upgrade support (needed for CONNECT)
    http1::Builder::new()
        .preserve_header_case(true)
        .title_case_headers(true)
        .serve_connection(io, service)
        .with_upgrades()
        .await
        .map_err(ProxyError::from)
}

/// Route a request: CONNECT goes straight to the tunnel relay, everything
/// else through the dispatch pipeline.
async fn route_request(
    req: Request<Incoming>,
    blocklist: Arc<Blocklist>,
    cache: Arc<ResponseCache>,
    events: Arc<EventLog>,
) -> Result<Response<BoxBody<Bytes, hyper::Error>>, ProxyError> {
    if req.method() == Method::CONNECT {
        handle_connect(req, events).await
    } else {
        handle_http(req, blocklist, cache, events).await
    }
}

/// Builder for [`ProxyServer`] configuration.
pub struct ProxyServerBuilder {
    listen_addr: SocketAddr,
    blocklist: Option<Arc<Blocklist>>,
    cache: Option<Arc<ResponseCache>>,
    events: Option<Arc<EventLog>>,
}

impl ProxyServerBuilder {
    /// Create a new builder with the default listen address.
    pub fn new() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR
                .parse()
                .expect("default listen address is valid"),
            blocklist: None,
            cache: None,
            events: None,
        }
    }

    /// Set the TCP listen address.
    pub fn listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    /// Set the blocklist.
    pub fn blocklist(mut self, blocklist: Arc<Blocklist>) -> Self {
        self.blocklist = Some(blocklist);
        self
    }

    /// Set the response cache.
    pub fn cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the event log.
    pub fn events(mut self, events: Arc<EventLog>) -> Self {
        self.events = Some(events);
        self
    }

    /// Build the proxy server.
    ///
    /// # Panics
    ///
    /// Panics if blocklist, cache, or event log are not set.
    pub fn build(self, shutdown_rx: watch::Receiver<bool>) -> ProxyServer {
        let config = ProxyConfig {
            listen_addr: self.listen_addr,
            blocklist: self.blocklist.expect("blocklist is required"),
            cache: self.cache.expect("cache is required"),
            events: self.events.expect("event log is required"),
        };

        ProxyServer::new(config, shutdown_rx)
    }
}

impl Default for ProxyServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_server() -> (ProxyServer, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        let server = ProxyServerBuilder::new()
            .blocklist(Arc::new(Blocklist::new(vec!["blocked.example".to_string()])))
            .cache(Arc::new(ResponseCache::new()))
            .events(Arc::new(EventLog::new_null()))
            .build(rx);
        (server, tx)
    }

    #[test]
    fn test_builder_defaults() {
        let (server, _tx) = test_server();
        assert_eq!(
            server.config.listen_addr,
            DEFAULT_LISTEN_ADDR.parse::<SocketAddr>().unwrap()
        );
        assert!(server.cache().is_empty());
        assert!(!server.blocklist().is_empty());
    }

    #[test]
    fn test_builder_custom_listen_addr() {
        let (_, rx) = watch::channel(false);
        let addr: SocketAddr = "127.0.0.1:3128".parse().unwrap();
        let server = ProxyServerBuilder::new()
            .listen_addr(addr)
            .blocklist(Arc::new(Blocklist::new(vec![])))
            .cache(Arc::new(ResponseCache::new()))
            .events(Arc::new(EventLog::new_null()))
            .build(rx);
        assert_eq!(server.config.listen_addr, addr);
    }

    #[test]
    fn test_injected_cache_is_shared() {
        let cache = Arc::new(ResponseCache::new());
        let (_, rx) = watch::channel(false);
        let server = ProxyServerBuilder::new()
            .blocklist(Arc::new(Blocklist::new(vec![])))
            .cache(cache.clone())
            .events(Arc::new(EventLog::new_null()))
            .build(rx);

        assert!(Arc::ptr_eq(&cache, &server.cache()));
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown_signal() {
        let (server, tx) = test_server();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let handle = tokio::spawn(async move { server.serve(listener).await });
        tx.send(true).unwrap();

        let result = tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .expect("server did not stop after shutdown signal")
            .unwrap();
        assert!(result.is_ok());
    }
}
