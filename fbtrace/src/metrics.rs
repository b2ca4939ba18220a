// /////////////////////////////////////////////////////////////////////////////
// fbtrace
// /////////////////////////////////////////////////////////////////////////////

//! Prometheus text exposition for a `Statistics` snapshot (C6), used by
//! the CLI's `stats` subcommand and an optional `/metrics` listener.
//! Grounded in the teacher's `prometheus`-crate metrics service: a
//! `Registry` owns a handful of `IntCounter`s that mirror the atomic
//! counters, refreshed from a `StatisticsSnapshot` on demand rather
//! than incremented independently, since `Statistics` is the single
//! source of truth.

use fbtrace_domain::StatisticsSnapshot;
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

/// Owns the Prometheus counters mirroring `Statistics`. Call `sync`
/// before `render` to publish the latest snapshot.
pub struct MetricsRegistry {
    registry: Registry,
    image_info_dropped: IntCounter,
    entry_dropped: IntCounter,
    exit_dropped: IntCounter,
    failed_chunk_flushes: IntCounter,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let registry = Registry::new();
        let image_info_dropped =
            IntCounter::new("fbtrace_image_info_dropped_total", "Image-info events dropped").unwrap();
        let entry_dropped = IntCounter::new("fbtrace_entry_dropped_total", "Procedure-entry events dropped").unwrap();
        let exit_dropped = IntCounter::new("fbtrace_exit_dropped_total", "Procedure-exit events dropped").unwrap();
        let failed_chunk_flushes =
            IntCounter::new("fbtrace_failed_chunk_flushes_total", "Chunk flushes that failed").unwrap();

        registry.register(Box::new(image_info_dropped.clone())).unwrap();
        registry.register(Box::new(entry_dropped.clone())).unwrap();
        registry.register(Box::new(exit_dropped.clone())).unwrap();
        registry.register(Box::new(failed_chunk_flushes.clone())).unwrap();

        Self {
            registry,
            image_info_dropped,
            entry_dropped,
            exit_dropped,
            failed_chunk_flushes,
        }
    }

    /// Advances each counter up to `snapshot`'s value. `IntCounter` is
    /// monotonic-increment-only, matching `Statistics`'s own contract,
    /// so this adds the delta since the last sync rather than setting
    /// an absolute value.
    pub fn sync(&self, snapshot: StatisticsSnapshot) {
        add_delta(&self.image_info_dropped, snapshot.image_info_dropped);
        add_delta(&self.entry_dropped, snapshot.entry_dropped);
        add_delta(&self.exit_dropped, snapshot.exit_dropped);
        add_delta(&self.failed_chunk_flushes, snapshot.failed_chunk_flushes);
    }

    /// Renders every registered counter as Prometheus text exposition
    /// format.
    pub fn render(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer).expect("encoding to a Vec cannot fail");
        String::from_utf8(buffer).expect("prometheus text format is always UTF-8")
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn add_delta(counter: &IntCounter, target: u64) {
    let current = counter.get();
    if target > current {
        counter.inc_by(target - current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_registry_renders_zeroed_counters() {
        let registry = MetricsRegistry::new();
        registry.sync(StatisticsSnapshot::default());
        let text = registry.render();
        assert!(text.contains("fbtrace_image_info_dropped_total 0"));
    }

    #[test]
    fn sync_advances_counters_to_match_the_snapshot() {
        let registry = MetricsRegistry::new();
        registry.sync(StatisticsSnapshot {
            image_info_dropped: 3,
            entry_dropped: 1,
            exit_dropped: 0,
            failed_chunk_flushes: 2,
        });
        let text = registry.render();
        assert!(text.contains("fbtrace_image_info_dropped_total 3"));
        assert!(text.contains("fbtrace_entry_dropped_total 1"));
        assert!(text.contains("fbtrace_failed_chunk_flushes_total 2"));
    }

    #[test]
    fn sync_is_idempotent_for_an_unchanged_snapshot() {
        let registry = MetricsRegistry::new();
        let snap = StatisticsSnapshot {
            image_info_dropped: 5,
            ..Default::default()
        };
        registry.sync(snap);
        registry.sync(snap);
        assert_eq!(registry.image_info_dropped.get(), 5);
    }
}
