//! cachewall: forward HTTP proxy with blocklisting, caching, and tunneling
//!
//! This crate provides a forward proxy that rejects requests to blocked
//! hosts, serves repeated requests for the same URL from an in-memory
//! time-limited cache, and relays encrypted sessions through opaque
//! CONNECT tunnels without inspecting them.
//!
//! # Architecture
//!
//! - **Blocklist**: immutable set of host substrings, loaded once at startup
//! - **Cache**: mutex-guarded TTL store of materialized response snapshots
//! - **Proxy**: hyper HTTP/1.1 server with the dispatch pipeline and the
//!   CONNECT tunnel relay
//! - **Event log**: append-only JSON-line files for blocked and erroring
//!   requests, separate from operational `tracing` output
//! - **Config**: hierarchical TOML configuration merged with CLI flags

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod blocklist;
pub mod cache;
pub mod cli;
pub mod config;
pub mod eventlog;
pub mod proxy;
