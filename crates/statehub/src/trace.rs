#![forbid(unsafe_code)]

//! JSONL sink recording where writes come from.
//!
//! When enabled, every batch write emits one line describing the origin:
//! sequence number, handle id and label, the keys in the batch, and a
//! captured backtrace of the call site. Ordering is deterministic with
//! respect to call order because writes are serialized behind a mutex.
//! Purely observational: the sink never feeds back into state, and a write
//! error degrades to a warning instead of failing the commit.

use std::backtrace::Backtrace;
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::warn;

use crate::handle::SubscriberHandle;

/// Destination for trace output.
#[derive(Debug, Clone)]
pub enum TraceDestination {
    /// Write to stdout.
    Stdout,
    /// Append to a file at the given path.
    File(PathBuf),
}

impl TraceDestination {
    /// Convenience helper for file destinations.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }
}

/// Configuration for the write-origin trace.
#[derive(Debug, Clone)]
pub struct WriteTraceConfig {
    /// Whether tracing is enabled.
    pub enabled: bool,
    /// Output destination for JSONL lines.
    pub destination: TraceDestination,
    /// Flush after every line (recommended for tests and capture).
    pub flush_on_write: bool,
    /// Capture a backtrace per write. Turning this off keeps the record
    /// cheap when only the key/handle fields are wanted.
    pub capture_backtrace: bool,
}

impl Default for WriteTraceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            destination: TraceDestination::Stdout,
            flush_on_write: true,
            capture_backtrace: true,
        }
    }
}

impl WriteTraceConfig {
    /// Create a disabled config.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Enable tracing to stdout with flush-on-write.
    #[must_use]
    pub fn enabled_stdout() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Enable tracing to a file with flush-on-write.
    #[must_use]
    pub fn enabled_file(path: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            destination: TraceDestination::file(path),
            ..Self::default()
        }
    }

    /// Set whether a backtrace is captured per write.
    #[must_use]
    pub fn with_backtrace(mut self, capture: bool) -> Self {
        self.capture_backtrace = capture;
        self
    }

    /// Set flush-on-write behavior.
    #[must_use]
    pub fn with_flush_on_write(mut self, enabled: bool) -> Self {
        self.flush_on_write = enabled;
        self
    }
}

#[derive(Serialize)]
struct WriteTraceRecord<'a> {
    seq: u64,
    handle: String,
    label: &'a str,
    keys: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    origin: Option<String>,
}

struct TraceInner {
    writer: BufWriter<Box<dyn Write + Send>>,
    flush_on_write: bool,
}

/// Shared, line-oriented JSONL sink for write-origin records.
#[derive(Clone)]
pub struct WriteTraceSink {
    inner: Arc<Mutex<TraceInner>>,
    capture_backtrace: bool,
    seq: Arc<AtomicU64>,
}

impl std::fmt::Debug for WriteTraceSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteTraceSink").finish_non_exhaustive()
    }
}

impl WriteTraceSink {
    /// Build a sink from config. Returns `Ok(None)` when disabled.
    pub fn from_config(config: &WriteTraceConfig) -> io::Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }

        let writer: Box<dyn Write + Send> = match &config.destination {
            TraceDestination::Stdout => Box::new(io::stdout()),
            TraceDestination::File(path) => {
                Box::new(OpenOptions::new().create(true).append(true).open(path)?)
            }
        };

        Ok(Some(Self {
            inner: Arc::new(Mutex::new(TraceInner {
                writer: BufWriter::new(writer),
                flush_on_write: config.flush_on_write,
            })),
            capture_backtrace: config.capture_backtrace,
            seq: Arc::new(AtomicU64::new(0)),
        }))
    }

    pub(crate) fn record(&self, origin: &SubscriberHandle, keys: &[String]) {
        let record = WriteTraceRecord {
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            handle: origin.id().to_string(),
            label: origin.label(),
            keys,
            origin: self
                .capture_backtrace
                .then(|| Backtrace::force_capture().to_string()),
        };
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(err) => {
                warn!(%err, "failed to serialize write trace record");
                return;
            }
        };

        let mut inner = self.inner.lock();
        if let Err(err) = writeln!(inner.writer, "{line}") {
            warn!(%err, "failed to write trace line");
            return;
        }
        if inner.flush_on_write
            && let Err(err) = inner.writer.flush()
        {
            warn!(%err, "failed to flush trace sink");
        }
    }
}
