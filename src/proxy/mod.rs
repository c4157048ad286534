//! Forward proxy engine: dispatch pipeline, CONNECT tunneling, server loop.
//!
//! # Architecture
//!
//! ```text
//!              ┌───────────────────────────────────────────┐
//!              │                ProxyServer                │
//!   client ───▶│  CONNECT ──────────────▶ tunnel relay ────┼──▶ origin (TCP)
//!              │  other   ──▶ dispatch pipeline            │
//!              │              validate → block → cache ────┼──▶ origin (HTTP)
//!              └───────────────────────────────────────────┘
//! ```
//!
//! Plain requests run the dispatch pipeline: an unparseable target is 400,
//! a blocked host is 403, a cache hit replays the stored snapshot, and a
//! miss forwards to the origin, captures the response, caches it, and
//! serves the client from the cached copy. CONNECT requests skip all of
//! that and become an opaque bidirectional byte relay.
//!
//! Status codes surfaced to clients: 400 (unparseable target), 403
//! (blocked host), 500 (connection takeover unsupported, tunnel only),
//! 503 (upstream dial failed).

pub mod dispatch;
pub mod error;
pub mod server;
pub mod tunnel;

pub use error::{ProxyError, ProxyResult};
pub use server::{ProxyConfig, ProxyServer, ProxyServerBuilder, DEFAULT_LISTEN_ADDR};
