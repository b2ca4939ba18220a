// /////////////////////////////////////////////////////////////////////////////
// fbtrace
// /////////////////////////////////////////////////////////////////////////////

//! Event sink (C4): the facade instrumented call sites and the
//! trace-buffer pipeline talk to. `EventSink` is the trait;
//! `DefaultEventSink` is the production implementation composing the
//! log writer (C2), the image-info queue (C3), and shared statistics.
//!
//! No failure path here aborts future tracing: every failure increments
//! a counter and returns control to the caller (`SPEC_FULL.md` §4.4,
//! §7).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use fbtrace_domain::format::{
    encode_client, encode_image_info, trace_buffer_header, ChunkHeader, Transition, TransitionKind, CLIENT_LEN,
    TRANSITION_LEN,
};
use fbtrace_domain::constants::MAX_PATH_LEN;
use fbtrace_domain::Statistics;
use parking_lot::Mutex;

use crate::pipeline::TraceBufferPool;
use crate::queue::ImageInfoQueue;
use crate::writer::LogWriter;

/// Context available to a procedure-entry/exit callback. Modeled after
/// the restricted, no-blocking, no-allocation context described in
/// `SPEC_FULL.md` §5: everything here is a plain value, never a handle
/// that requires I/O to read.
#[derive(Debug, Clone, Copy)]
pub struct ProcedureContext {
    pub process_id: u32,
    pub thread_id: u32,
    /// Caller instruction pointer, used as `info` on entry.
    pub caller_ip: u32,
    /// Return-value register, used as `info` on exit.
    pub return_value: u32,
}

/// Monotonic stand-in for a CPU timestamp-counter read: nothing in
/// this crate depends on wall-clock time, only on "later reads compare
/// greater than earlier reads" (`SPEC_FULL.md` GLOSSARY, "TSC").
fn read_timestamp(epoch: &Instant) -> u64 {
    epoch.elapsed().as_nanos() as u64
}

/// Facade for the four event callbacks plus teardown. Implementations
/// must be safe to call from multiple threads concurrently, including
/// restricted, non-blocking contexts for the two procedure callbacks.
pub trait EventSink: Send + Sync {
    fn on_image_load(&self, load_address: u64, image_size: u32, path: &[u8]);
    fn on_procedure_entry(&self, ctx: &ProcedureContext, procedure: u32);
    fn on_procedure_exit(&self, ctx: &ProcedureContext, procedure: u32);
    fn on_process_buffer(&self, buffer: &[u8], process_id: u32, thread_id: u32);
}

/// Production event sink: owns the log writer, the image-info queue,
/// and a handle to the shared statistics the front end reports.
pub struct DefaultEventSink {
    writer: Mutex<LogWriter>,
    queue: ImageInfoQueue,
    stats: Arc<Statistics>,
    epoch: Instant,
    path: PathBuf,
    pool: Arc<TraceBufferPool>,
}

impl DefaultEventSink {
    /// Constructed only by `control::create_default_sink`, which has
    /// already written the file header and built the `pool` this sink
    /// requests buffer slots from on every procedure-entry/exit call.
    pub(crate) fn new(
        writer: LogWriter,
        stats: Arc<Statistics>,
        queue_capacity: usize,
        path: PathBuf,
        pool: Arc<TraceBufferPool>,
    ) -> Self {
        Self {
            writer: Mutex::new(writer),
            queue: ImageInfoQueue::new(queue_capacity),
            stats,
            epoch: Instant::now(),
            path,
            pool,
        }
    }

    pub fn statistics(&self) -> &Arc<Statistics> {
        &self.stats
    }

    pub fn log_path(&self) -> &std::path::Path {
        &self.path
    }

    /// Drains the image-info queue, flushing each already-serialised
    /// chunk through the writer. Invariant upheld: any image-info
    /// chunk referenced by a transition's procedure address reaches
    /// disk before that transition does, because this is always called
    /// immediately ahead of a trace-buffer flush.
    fn drain_image_info(&self, writer: &mut LogWriter) {
        self.queue.drain(|chunk_bytes| {
            // The queued bytes already include the chunk header; hand
            // them to the writer as a headerless "pre-framed" flush by
            // reconstructing the header from the first 8 bytes.
            if chunk_bytes.len() < ChunkHeader::LEN {
                return;
            }
            let header_bytes: [u8; ChunkHeader::LEN] =
                chunk_bytes[0..ChunkHeader::LEN].try_into().expect("checked length above");
            let header = match ChunkHeader::from_bytes(&header_bytes) {
                Ok(h) => h,
                Err(_) => return,
            };
            let body = &chunk_bytes[ChunkHeader::LEN..];
            // Flush failures are already counted by the writer itself.
            let _ = writer.flush_chunk(header, Some(body));
        });
    }

    /// Consumes the sink, performing the documented teardown: drain the
    /// image-info queue a final time, then drop the writer (closing the
    /// file). The caller must have already stopped the external
    /// producer — a documented precondition, not an enforced one.
    pub fn delete(self) {
        let mut writer = self.writer.lock();
        self.drain_image_info(&mut writer);
        let _ = writer.sync_all();
        // `writer` and `self` are dropped here, closing the file.
    }
}

impl EventSink for DefaultEventSink {
    fn on_image_load(&self, load_address: u64, image_size: u32, path: &[u8]) {
        if path.len() > MAX_PATH_LEN {
            self.stats.record_image_info_dropped();
            return;
        }
        let chunk_bytes = match encode_image_info(load_address, image_size, path) {
            Ok(bytes) => bytes,
            Err(_) => {
                self.stats.record_image_info_dropped();
                return;
            }
        };
        if !self.queue.try_push(chunk_bytes) {
            self.stats.record_image_info_dropped();
            tracing::debug!("image-info queue at capacity, dropping event");
        }
    }

    fn on_procedure_entry(&self, ctx: &ProcedureContext, procedure: u32) {
        let transition = Transition {
            kind: TransitionKind::Entry,
            timestamp: read_timestamp(&self.epoch),
            procedure,
            info: ctx.caller_ip,
        };
        match self.pool.get_buffer(ctx.process_id, ctx.thread_id, TRANSITION_LEN) {
            Some(guard) => guard.write(&transition.to_bytes()),
            None => self.stats.record_entry_dropped(),
        }
    }

    fn on_procedure_exit(&self, ctx: &ProcedureContext, procedure: u32) {
        let transition = Transition {
            kind: TransitionKind::Exit,
            timestamp: read_timestamp(&self.epoch),
            procedure,
            info: ctx.return_value,
        };
        match self.pool.get_buffer(ctx.process_id, ctx.thread_id, TRANSITION_LEN) {
            Some(guard) => guard.write(&transition.to_bytes()),
            None => self.stats.record_exit_dropped(),
        }
    }

    fn on_process_buffer(&self, buffer: &[u8], process_id: u32, thread_id: u32) {
        debug_assert!(!buffer.is_empty());
        debug_assert_eq!(buffer.len() % fbtrace_domain::format::TRANSITION_LEN, 0);

        let header = match trace_buffer_header(buffer.len()) {
            Ok(h) => h,
            Err(_) => {
                self.stats.record_entry_dropped();
                return;
            }
        };

        let mut writer = self.writer.lock();
        self.drain_image_info(&mut writer);

        let client = encode_client(process_id, thread_id);
        let mut body = Vec::with_capacity(CLIENT_LEN + buffer.len());
        body.extend_from_slice(&client);
        body.extend_from_slice(buffer);

        // Failures are already accounted for by the writer.
        let _ = writer.flush_chunk(header, Some(&body));
        #[cfg(debug_assertions)]
        writer.assert_position_consistent();
    }
}

/// Test double recording calls instead of touching a file; used by the
/// pipeline's unit tests so they do not need a real sink.
#[cfg(test)]
pub struct CountingSink {
    pub image_loads: std::sync::atomic::AtomicUsize,
    pub entries: std::sync::atomic::AtomicUsize,
    pub exits: std::sync::atomic::AtomicUsize,
    pub buffers: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl CountingSink {
    pub fn new() -> Self {
        use std::sync::atomic::AtomicUsize;
        Self {
            image_loads: AtomicUsize::new(0),
            entries: AtomicUsize::new(0),
            exits: AtomicUsize::new(0),
            buffers: AtomicUsize::new(0),
        }
    }
}

#[cfg(test)]
impl EventSink for CountingSink {
    fn on_image_load(&self, _load_address: u64, _image_size: u32, _path: &[u8]) {
        self.image_loads.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }

    fn on_procedure_entry(&self, _ctx: &ProcedureContext, _procedure: u32) {
        self.entries.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }

    fn on_procedure_exit(&self, _ctx: &ProcedureContext, _procedure: u32) {
        self.exits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }

    fn on_process_buffer(&self, _buffer: &[u8], _process_id: u32, _thread_id: u32) {
        self.buffers.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }
}
