// /////////////////////////////////////////////////////////////////////////////
// fbtrace
// /////////////////////////////////////////////////////////////////////////////

//! Library-side logging surface: every module here calls into
//! `tracing`'s macros directly, but only the front end installs a
//! subscriber. This module is deliberately a thin installer, not the
//! teacher's full alerting/health-scoring observability stack — this
//! crate's logging needs are "route spans and events somewhere
//! readable," nothing more.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs a global `tracing` subscriber: an `EnvFilter` driven by
/// `RUST_LOG` (falling back to `default_directive` when unset) plus a
/// human-readable formatter. Call once, from the process entry point.
pub fn init_logging(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::registry().with(filter).with(fmt::layer()).try_init();
}
