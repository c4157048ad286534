//! Append-only log files, one per event kind.
//!
//! Every write is "create-if-absent, open-append, write-line": the writer
//! keeps no open handles and no state between writes. Write failures are
//! swallowed (warn-logged): the event log never affects the
//! client-visible outcome of a request.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{error, warn};

use super::events::{EventKind, ProxyEvent};

/// File name for blocked-request events.
pub const BLOCKED_LOG_FILE: &str = "blocked.log";

/// File name for error events.
pub const ERROR_LOG_FILE: &str = "error.log";

/// Append-only event log writing JSON lines to per-kind files.
///
/// A null log (for tests) discards every event silently.
pub struct EventLog {
    /// Directory holding the log files. None indicates a null log.
    dir: Option<PathBuf>,
}

impl EventLog {
    /// Create an event log writing into the given directory.
    ///
    /// The directory is created on first write if it does not exist.
    pub fn new(dir: PathBuf) -> Self {
        Self { dir: Some(dir) }
    }

    /// Create a null event log that discards all events.
    pub fn new_null() -> Self {
        Self { dir: None }
    }

    /// Check if this is a null log.
    pub fn is_null(&self) -> bool {
        self.dir.is_none()
    }

    /// Append an event to the log file for its kind.
    ///
    /// Failures are swallowed: a proxy request must never fail because a
    /// log line could not be written.
    pub fn log(&self, event: ProxyEvent) {
        let Some(ref dir) = self.dir else {
            return;
        };

        let file_name = match event.kind() {
            EventKind::Blocked => BLOCKED_LOG_FILE,
            EventKind::Error => ERROR_LOG_FILE,
        };
        let path = dir.join(file_name);

        let line = match serde_json::to_string(&event.with_timestamp()) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize event: {}", e);
                return;
            }
        };

        if let Err(e) = append_line(&path, &line) {
            warn!("Failed to write event log {:?}: {}", path, e);
        }
    }
}

/// Create-if-absent, open-append, write one line.
fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)
}
