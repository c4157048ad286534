//! Blocked-host matching.
//!
//! The blocklist is a set of host substrings loaded once before the server
//! starts accepting connections and immutable afterwards, so request tasks
//! share it behind an `Arc` without locking.
//!
//! # Matching Semantics
//!
//! A host is blocked iff it *contains* any configured pattern as a
//! contiguous substring. This is deliberately cruder than exact or
//! domain-suffix matching and can over-block: the pattern `example.com`
//! also matches `notexample.com.evil.org`. Callers opt into that tradeoff
//! by using substring patterns.
//!
//! Matching is case-insensitive and ignores any `:port` suffix on the host.

use std::fs;
use std::path::Path;

use tracing::{info, warn};

/// Immutable set of blocked host substrings.
pub struct Blocklist {
    /// Lowercased patterns; empty list blocks nothing.
    patterns: Vec<String>,
}

impl Blocklist {
    /// Create a blocklist from a list of host substrings.
    ///
    /// Patterns are lowercased; empty patterns are dropped.
    pub fn new(patterns: Vec<String>) -> Self {
        let patterns = patterns
            .into_iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { patterns }
    }

    /// Load a blocklist from a newline-delimited file.
    ///
    /// One substring per line. Blank lines and lines starting with `#` are
    /// skipped. A missing file yields an empty blocklist rather than an
    /// error, matching the collaborator contract: no blocklist configured
    /// means nothing is blocked.
    pub fn from_file(path: &Path) -> Self {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Blocklist file {:?} not found, blocking nothing", path);
                return Self::new(Vec::new());
            }
            Err(e) => {
                warn!("Failed to read blocklist file {:?}: {}", path, e);
                return Self::new(Vec::new());
            }
        };

        let patterns = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(String::from)
            .collect();

        Self::new(patterns)
    }

    /// Check whether a host is blocked.
    ///
    /// Pure predicate over the immutable pattern set: returns true iff the
    /// port-stripped, lowercased host contains any pattern as a substring.
    pub fn is_blocked(&self, host: &str) -> bool {
        let host = strip_port(host).to_lowercase();
        self.patterns.iter().any(|p| host.contains(p.as_str()))
    }

    /// Number of configured patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// True if no patterns are configured.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Strip a trailing `:port` from a host string, if present.
///
/// Block entries are host-only, so `example.com:8080` must match the
/// pattern `example.com`. Bracketed IPv6 hosts (`[::1]:443`) keep their
/// brackets out of the match.
fn strip_port(host: &str) -> &str {
    if let Some(end) = host.find(']') {
        // Bracketed IPv6 literal; anything after ']' is the port
        return &host[..=end].trim_start_matches('[').trim_end_matches(']');
    }
    match host.rsplit_once(':') {
        Some((h, port)) if port.chars().all(|c| c.is_ascii_digit()) => h,
        _ => host,
    }
}
