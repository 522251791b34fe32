//! Storage health signal.
//!
//! Counts consecutive commit failures. Crossing the threshold flips the
//! ledger to degraded and logs once; the next successful commit clears it.
//! The engine never retries on its own.

use mobiwallet_persistence::PersistenceError;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub degraded: bool,
    pub consecutive_failures: u32,
}

#[derive(Debug)]
pub struct HealthMonitor {
    threshold: u32,
    consecutive_failures: AtomicU32,
    degraded: AtomicBool,
}

impl HealthMonitor {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive_failures: AtomicU32::new(0),
            degraded: AtomicBool::new(false),
        }
    }

    /// Count a storage failure; returns true while degraded
    pub fn record_failure(&self, reference: &str, cause: &PersistenceError) -> bool {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::error!(
            reference = %reference,
            consecutive_failures = failures,
            error = %cause,
            "Ledger commit failed"
        );

        if failures >= self.threshold && !self.degraded.swap(true, Ordering::SeqCst) {
            tracing::error!(
                consecutive_failures = failures,
                threshold = self.threshold,
                "Ledger storage degraded"
            );
        }
        self.degraded.load(Ordering::SeqCst)
    }

    pub fn record_success(&self) {
        let failures = self.consecutive_failures.swap(0, Ordering::SeqCst);
        if self.degraded.swap(false, Ordering::SeqCst) {
            tracing::info!(
                failures_before_recovery = failures,
                "Ledger storage recovered"
            );
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> HealthStatus {
        HealthStatus {
            degraded: self.is_degraded(),
            consecutive_failures: self.consecutive_failures.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_error() -> PersistenceError {
        PersistenceError::Database(sqlx::Error::PoolTimedOut)
    }

    #[test]
    fn test_degrades_after_threshold_and_recovers() {
        let monitor = HealthMonitor::new(3);

        assert!(!monitor.record_failure("TRF1", &storage_error()));
        assert!(!monitor.record_failure("TRF2", &storage_error()));
        assert!(monitor.record_failure("TRF3", &storage_error()));
        assert_eq!(
            monitor.status(),
            HealthStatus {
                degraded: true,
                consecutive_failures: 3
            }
        );

        monitor.record_success();
        assert!(!monitor.is_degraded());
        assert_eq!(monitor.status().consecutive_failures, 0);
    }

    #[test]
    fn test_success_resets_streak() {
        let monitor = HealthMonitor::new(2);
        monitor.record_failure("TRF1", &storage_error());
        monitor.record_success();
        assert!(!monitor.record_failure("TRF2", &storage_error()));
    }
}
