// /////////////////////////////////////////////////////////////////////////////
// fbtrace
// /////////////////////////////////////////////////////////////////////////////

//! Trace buffer pipeline (C5): a fixed-size slot allocator producer
//! callbacks claim byte ranges from at dispatch level, and a background
//! worker that drains completed slots into the sink at passive level.
//!
//! This is a minimal, self-contained stand-in for the production
//! instrumentation engine's buffer manager (out of scope per
//! `SPEC_FULL.md` §1) — just enough to drive `EventSink` end to end.
//! Slots live in a fixed ring; claiming a byte range is wait-free aside
//! from CAS retry (no locks, no allocation once the pool is built).

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::sink::EventSink;

const UNSET_ID: u32 = u32::MAX;

const STATE_FREE: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_SEALED: u8 = 2;
const STATE_DRAINING: u8 = 3;

struct Slot {
    bytes: Box<[AtomicU8]>,
    cursor: AtomicUsize,
    outstanding: AtomicUsize,
    state: AtomicU8,
    process_id: AtomicU32,
    thread_id: AtomicU32,
}

impl Slot {
    fn new(capacity: usize) -> Self {
        let bytes = (0..capacity).map(|_| AtomicU8::new(0)).collect::<Vec<_>>().into_boxed_slice();
        Self {
            bytes,
            cursor: AtomicUsize::new(0),
            outstanding: AtomicUsize::new(0),
            state: AtomicU8::new(STATE_FREE),
            process_id: AtomicU32::new(UNSET_ID),
            thread_id: AtomicU32::new(UNSET_ID),
        }
    }
}

/// A claimed, not-yet-committed byte range inside one slot. Dropping
/// the guard commits the write; if the guard's write was the last one
/// outstanding in a sealed slot, the slot is handed to the background
/// worker.
pub struct BufferGuard<'a> {
    pool: &'a TraceBufferPool,
    slot_index: usize,
    offset: usize,
    len: usize,
}

impl<'a> BufferGuard<'a> {
    pub fn len(&self) -> usize {
        self.len
    }

    /// Writes `bytes` into the claimed range. `bytes.len()` must equal
    /// the length this guard was allocated for.
    pub fn write(&self, bytes: &[u8]) {
        debug_assert_eq!(bytes.len(), self.len);
        let slot = &self.pool.slots[self.slot_index];
        for (i, b) in bytes.iter().enumerate() {
            slot.bytes[self.offset + i].store(*b, Ordering::Relaxed);
        }
    }
}

impl<'a> Drop for BufferGuard<'a> {
    fn drop(&mut self) {
        self.pool.commit(self.slot_index);
    }
}

/// Fixed-size ring of equal-capacity slots. `get_buffer` is the hot
/// path callable from a restricted context; `spawn_worker` starts the
/// passive-level thread that drains sealed slots.
pub struct TraceBufferPool {
    slots: Vec<Slot>,
    slot_capacity: usize,
    active: AtomicUsize,
    ready_tx: mpsc::Sender<usize>,
    ready_rx: Mutex<mpsc::Receiver<usize>>,
    shutdown: AtomicBool,
}

impl TraceBufferPool {
    pub fn new(slot_count: usize, slot_capacity: usize) -> Arc<Self> {
        assert!(slot_count > 0);
        assert!(slot_capacity > 0);
        let (ready_tx, ready_rx) = mpsc::channel();
        Arc::new(Self {
            slots: (0..slot_count).map(|_| Slot::new(slot_capacity)).collect(),
            slot_capacity,
            active: AtomicUsize::new(0),
            ready_tx,
            ready_rx: Mutex::new(ready_rx),
            shutdown: AtomicBool::new(false),
        })
    }

    /// Signals the worker spawned by `spawn_worker` to stop once it has
    /// drained whatever is already queued. The worker polls for this
    /// with a short timeout rather than relying on channel closure,
    /// since the pool's own `Sender` lives inside this struct and an
    /// `Arc`-drop-triggered close would require the worker to give up
    /// the very reference it needs to read slot bytes.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Claims `len` bytes for `process_id`/`thread_id`, returning
    /// `None` if every slot is currently full, sealed, or draining
    /// (modeled the same as an allocation failure).
    pub fn get_buffer(&self, process_id: u32, thread_id: u32, len: usize) -> Option<BufferGuard<'_>> {
        debug_assert!(len <= self.slot_capacity);

        for attempt in 0..self.slots.len() {
            let idx = (self.active.load(Ordering::Relaxed) + attempt) % self.slots.len();
            let slot = &self.slots[idx];

            if slot.state.load(Ordering::Acquire) == STATE_FREE
                && slot
                    .state
                    .compare_exchange(STATE_FREE, STATE_OPEN, Ordering::AcqRel, Ordering::Relaxed)
                    .is_ok()
            {
                slot.cursor.store(0, Ordering::Relaxed);
                slot.outstanding.store(0, Ordering::Relaxed);
                slot.process_id.store(UNSET_ID, Ordering::Relaxed);
                slot.thread_id.store(UNSET_ID, Ordering::Relaxed);
                self.active.store(idx, Ordering::Relaxed);
            }

            if slot.state.load(Ordering::Acquire) != STATE_OPEN {
                continue;
            }

            let old = slot.cursor.fetch_add(len, Ordering::AcqRel);
            if old + len > self.slot_capacity {
                if old < self.slot_capacity {
                    // This claim tipped the slot over; seal it so no
                    // further claims land here.
                    slot.state.store(STATE_SEALED, Ordering::Release);
                    self.maybe_enqueue(idx);
                }
                continue;
            }

            if old == 0 {
                slot.process_id.store(process_id, Ordering::Relaxed);
                slot.thread_id.store(thread_id, Ordering::Relaxed);
            }
            slot.outstanding.fetch_add(1, Ordering::AcqRel);
            if old + len == self.slot_capacity {
                slot.state.store(STATE_SEALED, Ordering::Release);
            }

            return Some(BufferGuard {
                pool: self,
                slot_index: idx,
                offset: old,
                len,
            });
        }

        None
    }

    fn commit(&self, slot_index: usize) {
        let slot = &self.slots[slot_index];
        if slot.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 && slot.state.load(Ordering::Acquire) == STATE_SEALED
        {
            self.maybe_enqueue(slot_index);
        }
    }

    fn maybe_enqueue(&self, slot_index: usize) {
        let slot = &self.slots[slot_index];
        if slot.outstanding.load(Ordering::Acquire) != 0 {
            return;
        }
        if slot
            .state
            .compare_exchange(STATE_SEALED, STATE_DRAINING, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            let _ = self.ready_tx.send(slot_index);
        }
    }

    /// Waits (with a short timeout, so shutdown can be observed
    /// promptly) for a sealed slot, reads it out, and resets it to
    /// `FREE` so it can be claimed again.
    fn try_drain_one(&self) -> DrainOutcome {
        match self
            .ready_rx
            .lock()
            .expect("ready_rx mutex poisoned")
            .recv_timeout(Duration::from_millis(20))
        {
            Ok(idx) => {
                let slot = &self.slots[idx];
                let len = slot.cursor.load(Ordering::Acquire).min(self.slot_capacity);
                let bytes = slot.bytes[..len].iter().map(|b| b.load(Ordering::Relaxed)).collect();
                let process_id = slot.process_id.load(Ordering::Relaxed);
                let thread_id = slot.thread_id.load(Ordering::Relaxed);
                slot.state.store(STATE_FREE, Ordering::Release);
                DrainOutcome::Drained(bytes, process_id, thread_id)
            }
            Err(mpsc::RecvTimeoutError::Timeout) => DrainOutcome::Idle,
            Err(mpsc::RecvTimeoutError::Disconnected) => DrainOutcome::Closed,
        }
    }
}

enum DrainOutcome {
    Drained(Vec<u8>, u32, u32),
    Idle,
    Closed,
}

/// Spawns the passive-level worker thread that drains sealed slots
/// into `sink`, until `TraceBufferPool::request_shutdown` is called.
pub fn spawn_worker(pool: Arc<TraceBufferPool>, sink: Arc<dyn EventSink>) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match pool.try_drain_one() {
            DrainOutcome::Drained(bytes, process_id, thread_id) => {
                if !bytes.is_empty() {
                    sink.on_process_buffer(&bytes, process_id, thread_id);
                }
            }
            DrainOutcome::Idle => {
                if pool.shutdown.load(Ordering::Acquire) {
                    return;
                }
            }
            DrainOutcome::Closed => return,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::CountingSink;
    use fbtrace_domain::format::{Transition, TransitionKind, TRANSITION_LEN};

    #[test]
    fn single_claim_round_trips_its_bytes() {
        let pool = TraceBufferPool::new(2, TRANSITION_LEN * 4);
        let transition = Transition {
            kind: TransitionKind::Entry,
            timestamp: 1,
            procedure: 0x401000,
            info: 0,
        };
        let guard = pool.get_buffer(10, 20, TRANSITION_LEN).unwrap();
        guard.write(&transition.to_bytes());
        drop(guard);
        // Not yet sealed (slot holds 4 transitions' worth), so nothing
        // should have been enqueued.
        assert!(pool.ready_rx.lock().unwrap().try_recv().is_err());
    }

    #[test]
    fn filling_a_slot_exactly_seals_and_enqueues_it() {
        let pool = TraceBufferPool::new(1, TRANSITION_LEN * 2);
        let t = Transition {
            kind: TransitionKind::Entry,
            timestamp: 1,
            procedure: 1,
            info: 0,
        }
        .to_bytes();

        let g1 = pool.get_buffer(1, 2, TRANSITION_LEN).unwrap();
        g1.write(&t);
        drop(g1);
        let g2 = pool.get_buffer(1, 2, TRANSITION_LEN).unwrap();
        g2.write(&t);
        drop(g2);

        match pool.try_drain_one() {
            DrainOutcome::Drained(bytes, pid, tid) => {
                assert_eq!(bytes.len(), TRANSITION_LEN * 2);
                assert_eq!((pid, tid), (1, 2));
            }
            _ => panic!("expected a drained buffer"),
        }
    }

    #[test]
    fn all_slots_full_returns_none_instead_of_blocking() {
        let pool = TraceBufferPool::new(1, TRANSITION_LEN);
        let _g = pool.get_buffer(1, 1, TRANSITION_LEN).unwrap();
        assert!(pool.get_buffer(1, 1, TRANSITION_LEN).is_none());
    }

    #[test]
    fn worker_thread_delivers_drained_buffers_to_the_sink() {
        let pool = TraceBufferPool::new(1, TRANSITION_LEN);
        let sink = Arc::new(CountingSink::new());
        let handle = spawn_worker(Arc::clone(&pool), sink.clone());

        let t = Transition {
            kind: TransitionKind::Exit,
            timestamp: 5,
            procedure: 2,
            info: 0,
        }
        .to_bytes();
        let g = pool.get_buffer(7, 8, TRANSITION_LEN).unwrap();
        g.write(&t);
        drop(g);

        // Poll for delivery instead of a fixed sleep: the worker picks
        // the buffer up within one `recv_timeout` tick.
        for _ in 0..100 {
            if sink.buffers.load(std::sync::atomic::Ordering::Relaxed) == 1 {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        pool.request_shutdown();
        handle.join().unwrap();
        assert_eq!(sink.buffers.load(std::sync::atomic::Ordering::Relaxed), 1);
    }
}
