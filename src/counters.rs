use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide drop/suppression counters. Incremented from lanes and the
/// dispatcher, logged on shutdown.
#[derive(Debug, Default)]
pub struct Counters {
    pub bad_ticks: AtomicU64,
    pub stale_ticks: AtomicU64,
    pub dedupe_hits: AtomicU64,
    pub intent_timeouts: AtomicU64,
    pub quarantined_fills: AtomicU64,
}

impl Counters {
    pub fn log_summary(&self) {
        tracing::info!(
            "counters: bad_ticks={} stale_ticks={} dedupe_hits={} intent_timeouts={} quarantined_fills={}",
            self.bad_ticks.load(Ordering::Relaxed),
            self.stale_ticks.load(Ordering::Relaxed),
            self.dedupe_hits.load(Ordering::Relaxed),
            self.intent_timeouts.load(Ordering::Relaxed),
            self.quarantined_fills.load(Ordering::Relaxed),
        );
    }
}

/// Shorthand for the relaxed increment used everywhere.
pub fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}
