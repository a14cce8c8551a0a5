//! Human-readable trace of graph construction.
//!
//! Every node and edge creation, similarity decision and temporal score is
//! appended to the trace as one line. The trace is an explicit handle passed
//! to the components that write to it; it is opened before any component is
//! constructed, so there is no uninitialized state to fall back from.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, TraceError};

enum TraceSink {
    File {
        path: PathBuf,
        writer: BufWriter<File>,
    },
    Memory(Vec<String>),
}

/// Cloneable handle to an append-only trace.
#[derive(Clone)]
pub struct TraceLog {
    sink: Arc<Mutex<TraceSink>>,
}

impl std::fmt::Debug for TraceLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &*self.sink.lock() {
            TraceSink::File { path, .. } => f.debug_tuple("TraceLog").field(path).finish(),
            TraceSink::Memory(lines) => f
                .debug_struct("TraceLog")
                .field("lines", &lines.len())
                .finish(),
        }
    }
}

impl TraceLog {
    /// Create a timestamped trace file inside `dir`, creating the directory.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|source| TraceError::CreateDir {
            path: dir.display().to_string(),
            source,
        })?;

        let file_name = format!("{}.log", chrono::Local::now().format("%Y-%m-%d_%H-%M-%S"));
        let path = dir.join(file_name);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| TraceError::OpenFile {
                path: path.display().to_string(),
                source,
            })?;

        tracing::info!("Writing trace to {}", path.display());

        Ok(Self {
            sink: Arc::new(Mutex::new(TraceSink::File {
                path,
                writer: BufWriter::new(file),
            })),
        })
    }

    /// Trace kept in memory; used by tests and dry runs.
    pub fn in_memory() -> Self {
        Self {
            sink: Arc::new(Mutex::new(TraceSink::Memory(Vec::new()))),
        }
    }

    /// Append one line.
    ///
    /// Write failures are reported through `tracing` and otherwise ignored:
    /// a broken trace must not stop graph construction.
    pub fn line(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::trace!(target: "incident_graph::trace", "{}", message);

        let mut sink = self.sink.lock();
        match &mut *sink {
            TraceSink::File { path, writer } => {
                if let Err(e) = writeln!(writer, "{}", message) {
                    tracing::warn!("Failed to write trace {}: {}", path.display(), e);
                }
            }
            TraceSink::Memory(lines) => lines.push(message.to_string()),
        }
    }

    /// Flush buffered lines to disk.
    pub fn flush(&self) {
        if let TraceSink::File { path, writer } = &mut *self.sink.lock() {
            if let Err(e) = writer.flush() {
                tracing::warn!("Failed to flush trace {}: {}", path.display(), e);
            }
        }
    }

    /// Lines captured by an in-memory trace. Empty for file traces.
    pub fn lines(&self) -> Vec<String> {
        match &*self.sink.lock() {
            TraceSink::Memory(lines) => lines.clone(),
            TraceSink::File { .. } => Vec::new(),
        }
    }

    /// Path of the trace file, if file-backed.
    pub fn path(&self) -> Option<PathBuf> {
        match &*self.sink.lock() {
            TraceSink::File { path, .. } => Some(path.clone()),
            TraceSink::Memory(_) => None,
        }
    }
}

impl Drop for TraceSink {
    fn drop(&mut self) {
        if let TraceSink::File { writer, .. } = self {
            let _ = writer.flush();
        }
    }
}
