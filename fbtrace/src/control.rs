// /////////////////////////////////////////////////////////////////////////////
// fbtrace
// /////////////////////////////////////////////////////////////////////////////

//! Control surface (C7): create and tear down a sink bound to a log
//! file. Full command-language parsing and dispatch is out of scope
//! (`SPEC_FULL.md` §1) — this module exposes just the two operations a
//! front end needs.

use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::sync::Arc;

use fbtrace_domain::format::FileHeader;
use fbtrace_domain::Statistics;

use crate::error::SinkError;
use crate::pipeline::{spawn_worker, TraceBufferPool};
use crate::sink::{DefaultEventSink, EventSink};
use crate::writer::LogWriter;

/// Tunables that would otherwise be hardcoded; supplied by
/// `FbtraceConfig` in the front end, defaulted here for direct callers.
#[derive(Debug, Clone, Copy)]
pub struct SinkParams {
    /// Maximum number of not-yet-flushed image-info chunks.
    pub image_info_queue_capacity: usize,
    /// Number of trace-buffer slots kept in the ring.
    pub buffer_slot_count: usize,
    /// Capacity, in bytes, of each trace-buffer slot.
    pub buffer_slot_capacity: usize,
}

impl Default for SinkParams {
    fn default() -> Self {
        Self {
            image_info_queue_capacity: 4096,
            buffer_slot_count: 8,
            buffer_slot_capacity: 16 * 1024,
        }
    }
}

/// Handle returned alongside a freshly-created sink: the caller needs
/// both the sink (to route events to) and the pool (so `record`-style
/// front ends can call `get_buffer` directly if they bypass
/// `EventSink::on_procedure_entry`/`exit`), plus the worker's join
/// handle for orderly shutdown.
pub struct Handles {
    pub pool: Arc<TraceBufferPool>,
    pub worker: std::thread::JoinHandle<()>,
}

/// Creates a log file at `log_path`, failing if one already exists,
/// writes the file header, spawns the trace-buffer drain worker, and
/// returns the sink plus the handles needed to shut the worker down.
///
/// Mirrors `CREATE_NEW` semantics: `AlreadyExists` becomes
/// `SinkError::PathInUse`, `PermissionDenied` becomes
/// `SinkError::AccessDenied`.
pub fn create_default_sink(
    log_path: &Path,
    statistics: Arc<Statistics>,
    params: SinkParams,
) -> Result<(Arc<DefaultEventSink>, Handles), SinkError> {
    let file = match File::options().write(true).create_new(true).open(log_path) {
        Ok(f) => f,
        Err(err) => {
            return Err(match err.kind() {
                io::ErrorKind::AlreadyExists => SinkError::PathInUse(log_path.to_path_buf()),
                io::ErrorKind::PermissionDenied => SinkError::AccessDenied(log_path.to_path_buf()),
                _ => SinkError::Io(err),
            })
        }
    };

    let mut writer = LogWriter::new(file, Arc::clone(&statistics));
    if let Err(err) = writer.write_file_header(&FileHeader::current()) {
        // No partial file left behind: best-effort removal, then
        // surface the original error.
        let _ = fs::remove_file(log_path);
        return Err(SinkError::Io(err));
    }

    let pool = TraceBufferPool::new(params.buffer_slot_count, params.buffer_slot_capacity);
    let sink = Arc::new(DefaultEventSink::new(
        writer,
        statistics,
        params.image_info_queue_capacity,
        log_path.to_path_buf(),
        Arc::clone(&pool),
    ));

    let sink_dyn: Arc<dyn EventSink> = sink.clone();
    let worker = spawn_worker(Arc::clone(&pool), sink_dyn);

    Ok((sink, Handles { pool, worker }))
}

/// Stops the buffer-drain worker and performs the sink's documented
/// teardown. The external producer must already be stopped before
/// calling this (a documented precondition, not enforced).
pub fn delete_sink(sink: Arc<DefaultEventSink>, handles: Handles) {
    handles.pool.request_shutdown();
    let _ = handles.worker.join();
    match Arc::try_unwrap(sink) {
        Ok(sink) => sink.delete(),
        Err(_still_shared) => {
            // A caller kept another strong reference; we cannot run
            // consuming teardown, but the file will still be closed
            // and flushed once the last reference drops.
            tracing::warn!("delete_sink called while other references to the sink are still alive");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creating_over_an_existing_path_is_path_in_use() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.bin");
        std::fs::write(&path, b"existing").unwrap();

        let stats = Arc::new(Statistics::new());
        let err = create_default_sink(&path, stats, SinkParams::default()).unwrap_err();
        assert!(matches!(err, SinkError::PathInUse(_)));
    }

    #[test]
    fn create_then_delete_round_trips_a_header_only_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.bin");
        let stats = Arc::new(Statistics::new());

        let (sink, handles) = create_default_sink(&path, Arc::clone(&stats), SinkParams::default()).unwrap();
        delete_sink(sink, handles);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), FileHeader::LEN);
    }
}
