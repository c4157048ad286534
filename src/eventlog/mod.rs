//! Append-only event logging for blocked and erroring requests.
//!
//! The event log is an external collaborator of the request pipeline: the
//! pipeline emits events, the log appends them as JSON lines to one file
//! per event kind (`blocked.log`, `error.log`), and nothing feeds back.
//! Log write failures never affect a request's outcome.
//!
//! This is completely separate from the operational `tracing` output.
//!
//! # Event Format
//!
//! One JSON object per line with an ISO8601 timestamp:
//!
//! ```json
//! {"ts":"2026-08-25T14:32:01Z","event":"blocked","url":"http://ads.example/track"}
//! ```

mod events;
mod writer;

pub use events::{EventKind, ProxyEvent, TimestampedEvent};
pub use writer::{EventLog, BLOCKED_LOG_FILE, ERROR_LOG_FILE};
