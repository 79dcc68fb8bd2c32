//! Progress tracking for fan-out phases.
//!
//! Counters live behind a mutex that is held only long enough to update them
//! and take a snapshot; log output happens after the guard is released.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Point-in-time view of a phase's progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

impl ProgressSnapshot {
    /// Completion percentage, 100 for an empty phase
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.completed as f64 / self.total as f64 * 100.0).min(100.0)
        }
    }

    pub fn is_done(&self) -> bool {
        self.completed >= self.total
    }
}

#[derive(Debug, Default)]
struct Counters {
    completed: usize,
    failed: usize,
}

/// Shared completion counter for one phase
///
/// Cloning is cheap; clones share the same counters.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    label: &'static str,
    total: usize,
    report_every: usize,
    counters: Arc<Mutex<Counters>>,
    started: Instant,
}

impl ProgressTracker {
    /// Track `total` units, logging every `report_every` completions and at the end
    pub fn new(label: &'static str, total: usize, report_every: usize) -> Self {
        Self {
            label,
            total,
            report_every: report_every.max(1),
            counters: Arc::new(Mutex::new(Counters::default())),
            started: Instant::now(),
        }
    }

    /// Record units that were already done before fan-out started
    pub fn preload(&self, completed: usize) {
        if let Ok(mut counters) = self.counters.lock() {
            counters.completed += completed;
        }
    }

    /// Record one finished unit
    pub fn record(&self, success: bool) -> ProgressSnapshot {
        let snapshot = {
            let mut counters = match self.counters.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            counters.completed += 1;
            if !success {
                counters.failed += 1;
            }
            ProgressSnapshot {
                completed: counters.completed,
                failed: counters.failed,
                total: self.total,
            }
        };

        if snapshot.completed % self.report_every == 0 || snapshot.is_done() {
            tracing::info!(
                "{} processed: {}/{} ({:.1}%)",
                self.label,
                snapshot.completed,
                snapshot.total,
                snapshot.percent()
            );
        }
        snapshot
    }

    /// Current counters
    pub fn snapshot(&self) -> ProgressSnapshot {
        let counters = match self.counters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        ProgressSnapshot {
            completed: counters.completed,
            failed: counters.failed,
            total: self.total,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
