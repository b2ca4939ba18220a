// /////////////////////////////////////////////////////////////////////////////
// fbtrace
// /////////////////////////////////////////////////////////////////////////////

//! Lock-free image-info queue (C3).
//!
//! A Treiber stack: `push` is a CAS loop any number of passive-level
//! threads may call concurrently (one per loader notification); `pop`
//! is a CAS loop too, but in practice only ever called from the single
//! writer thread that drains the queue ahead of each trace-buffer
//! flush, so there is no concurrent-pop ABA hazard to guard against
//! with hazard pointers or epoch reclamation — a plain `AtomicPtr` CAS
//! on each end is enough.
//!
//! Ordering between pushes is unspecified; nothing downstream relies
//! on it (`SPEC_FULL.md` §4.3). A push publishes its node with
//! `Release`; a successful pop's CAS uses `Acquire`, so the popping
//! thread observes a fully-initialized node.

use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

struct Node {
    next: *mut Node,
    chunk_bytes: Vec<u8>,
}

/// Lock-free LIFO stack of fully-serialised image-info chunks awaiting
/// a flush, bounded by a node-pool capacity so that "allocation
/// failed" (the original's kernel pool exhaustion) has a Rust-idiomatic
/// analogue: `try_push` returning `false` rather than an OOM abort
/// (`SPEC_FULL.md` §9).
pub struct ImageInfoQueue {
    head: AtomicPtr<Node>,
    outstanding: AtomicUsize,
    capacity: usize,
}

impl ImageInfoQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
            outstanding: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Attempts to push an already-serialised image-info chunk onto the
    /// queue. Returns `false` without pushing if the configured node
    /// pool is already at capacity — the caller should treat this the
    /// same as an allocation failure. Wait-free aside from CAS retry
    /// under contention; safe to call from any thread, including one
    /// that may not block.
    pub fn try_push(&self, chunk_bytes: Vec<u8>) -> bool {
        if self.outstanding.fetch_add(1, Ordering::Relaxed) >= self.capacity {
            self.outstanding.fetch_sub(1, Ordering::Relaxed);
            return false;
        }

        let node = Box::into_raw(Box::new(Node {
            next: ptr::null_mut(),
            chunk_bytes,
        }));

        let backoff = crossbeam_utils::Backoff::new();
        loop {
            let head = self.head.load(Ordering::Relaxed);
            // SAFETY: `node` was just created by us and is not yet
            // visible to any other thread.
            unsafe {
                (*node).next = head;
            }
            match self
                .head
                .compare_exchange_weak(head, node, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => return true,
                Err(_) => backoff.spin(),
            }
        }
    }

    /// Pops one entry, if any. Only the single draining thread should
    /// call this; concurrent pops are memory-safe but may reorder
    /// nodes in ways the single-drainer design does not need to
    /// tolerate.
    pub fn pop(&self) -> Option<Vec<u8>> {
        let backoff = crossbeam_utils::Backoff::new();
        loop {
            let head = self.head.load(Ordering::Acquire);
            if head.is_null() {
                return None;
            }
            // SAFETY: `head` is non-null and was published with
            // `Release` by some `push`; we only dereference it to read
            // `next`, never mutate it before taking ownership.
            let next = unsafe { (*head).next };
            match self
                .head
                .compare_exchange_weak(head, next, Ordering::Acquire, Ordering::Relaxed)
            {
                Ok(_) => {
                    // SAFETY: we won the CAS, so we are the unique
                    // owner of `head` now; no other thread can still
                    // be holding a reference to it as the "current"
                    // node (pops are single-drainer by contract).
                    let node = unsafe { Box::from_raw(head) };
                    self.outstanding.fetch_sub(1, Ordering::Relaxed);
                    return Some(node.chunk_bytes);
                }
                Err(_) => backoff.spin(),
            }
        }
    }

    /// Drains the queue, calling `f` with each popped chunk's bytes in
    /// LIFO pop order. Used by the sink ahead of every trace-buffer
    /// flush; an empty queue is a no-op.
    pub fn drain(&self, mut f: impl FnMut(Vec<u8>)) {
        while let Some(bytes) = self.pop() {
            f(bytes);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Relaxed).is_null()
    }
}

impl Default for ImageInfoQueue {
    fn default() -> Self {
        Self::new(usize::MAX)
    }
}

impl Drop for ImageInfoQueue {
    fn drop(&mut self) {
        // Free any nodes nobody drained.
        while self.pop().is_some() {}
    }
}

// SAFETY: the queue only ever hands out owned `Vec<u8>`s; the raw
// pointers never escape this module.
unsafe impl Send for ImageInfoQueue {}
unsafe impl Sync for ImageInfoQueue {}
