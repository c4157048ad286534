//! Command-line interface definitions for cachewall.
//!
//! Uses clap's derive API for type-safe argument parsing.

use clap::Parser;
use std::path::PathBuf;

/// Forward HTTP proxy with host blocklisting, response caching, and
/// opaque CONNECT tunneling.
///
/// Plain HTTP requests are checked against the blocklist, served from the
/// in-memory cache when possible, and otherwise forwarded to the origin.
/// CONNECT requests become opaque byte tunnels that are never inspected.
#[derive(Parser, Debug)]
#[command(name = "cachewall")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Address to listen on (host:port).
    #[arg(short = 'l', long = "listen", value_name = "ADDR")]
    pub listen: Option<String>,

    /// Path to the blocked-hosts file.
    ///
    /// Newline-delimited host substrings; a request whose target host
    /// contains any of them is rejected with 403. A missing file means an
    /// empty blocklist.
    #[arg(short = 'b', long = "blocklist", value_name = "PATH")]
    pub blocklist: Option<PathBuf>,

    /// Cache entry lifetime in seconds.
    #[arg(long = "cache-ttl", value_name = "SECONDS")]
    pub cache_ttl: Option<u64>,

    /// Directory for the blocked/error event log files.
    #[arg(long = "log-dir", value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Path to additional config file.
    ///
    /// Merged on top of the system and user configs, giving it the
    /// highest priority except for CLI flags.
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity.
    ///
    /// Can be specified multiple times:
    /// -v    = info level
    /// -vv   = debug level
    /// -vvv  = trace level
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}
