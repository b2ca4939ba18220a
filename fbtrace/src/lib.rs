// /////////////////////////////////////////////////////////////////////////////
// fbtrace
// /////////////////////////////////////////////////////////////////////////////

//! # fbtrace
//!
//! The event sink, log writer, and trace-buffer pipeline for a
//! function-boundary tracer. Built on top of the pure data types in
//! `fbtrace_domain`: this crate adds the file I/O, the lock-free
//! image-info queue, the dispatch/passive-level event sink facade, and
//! the buffer pool that stands in for the production instrumentation
//! engine's buffer manager.
//!
//! Module map: [`writer`] (C2), [`queue`] (C3), [`sink`] (C4),
//! [`pipeline`] (C5), [`metrics`] (part of C6), [`control`] (C7).

pub mod config;
pub mod control;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod queue;
pub mod sink;
pub mod writer;

pub use control::{create_default_sink, delete_sink, Handles, SinkParams};
pub use error::SinkError;
pub use sink::{DefaultEventSink, EventSink, ProcedureContext};
