use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::artifact::Label;

/// Point-in-time copy of the service counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterTotals {
    /// Classification requests accepted (one per message).
    pub requests: u64,
    /// Predictions produced.
    pub predictions: u64,
    /// Predictions labelled spam.
    pub spam: u64,
    /// Predictions labelled ham.
    pub ham: u64,
    /// Classification calls refused because the model was not ready.
    pub rejected: u64,
}

/// Process-lifetime counters owned by the model service.
///
/// One mutex guards all totals so that a batch lands in a single critical
/// section and every snapshot satisfies `spam + ham == predictions`.
#[derive(Debug)]
pub struct ServiceCounters {
    totals: Mutex<CounterTotals>,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl ServiceCounters {
    /// Fresh counters starting now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            totals: Mutex::new(CounterTotals::default()),
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Records one classified message.
    pub fn record(&self, label: Label) {
        self.record_batch(1, u64::from(label.is_spam()));
    }

    /// Records `total` classified messages of which `spam` were spam.
    pub fn record_batch(&self, total: u64, spam: u64) {
        debug_assert!(spam <= total);
        let mut totals = self.totals.lock();
        totals.requests += total;
        totals.predictions += total;
        totals.spam += spam;
        totals.ham += total - spam;
    }

    /// Records a refused classification call.
    pub fn record_rejected(&self) {
        self.totals.lock().rejected += 1;
    }

    /// Current totals. Never resets anything.
    #[must_use]
    pub fn snapshot(&self) -> CounterTotals {
        *self.totals.lock()
    }

    /// Wall-clock start of the service.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Time elapsed since start, measured on every call.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for ServiceCounters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn batch_keeps_totals_consistent() {
        let counters = ServiceCounters::new();
        counters.record(Label::Spam);
        counters.record_batch(3, 1);
        counters.record_rejected();
        let totals = counters.snapshot();
        assert_eq!(totals.requests, 4);
        assert_eq!(totals.predictions, 4);
        assert_eq!(totals.spam, 2);
        assert_eq!(totals.ham, 2);
        assert_eq!(totals.rejected, 1);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let counters = Arc::new(ServiceCounters::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let counters = Arc::clone(&counters);
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        counters.record(if i % 2 == 0 { Label::Spam } else { Label::Ham });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let totals = counters.snapshot();
        assert_eq!(totals.requests, 8_000);
        assert_eq!(totals.spam, 4_000);
        assert_eq!(totals.ham, 4_000);
    }

    #[test]
    fn snapshot_is_idempotent() {
        let counters = ServiceCounters::new();
        counters.record(Label::Ham);
        assert_eq!(counters.snapshot(), counters.snapshot());
    }
}
