//! In-process runtime counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// System-wide counters updated by dispatchers and the dead-letter office
#[derive(Debug, Default)]
pub struct SystemMetrics {
    pub actors_spawned: AtomicU64,
    pub actors_stopped: AtomicU64,
    pub messages_processed: AtomicU64,
    pub total_processing_time_ns: AtomicU64,
    pub faults: AtomicU64,
    pub restarts: AtomicU64,
    pub dead_letters: AtomicU64,
}

impl SystemMetrics {
    pub fn record_message_handled(&self, duration: Duration) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
        self.total_processing_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn avg_processing_time_ns(&self) -> f64 {
        let count = self.messages_processed.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        let total = self.total_processing_time_ns.load(Ordering::Relaxed);
        total as f64 / count as f64
    }

    pub fn record_spawned(&self) {
        self.actors_spawned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stopped(&self) {
        self.actors_stopped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_restart(&self) {
        self.restarts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dead_letter(&self) {
        self.dead_letters.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> SystemStats {
        let spawned = self.actors_spawned.load(Ordering::Relaxed);
        let stopped = self.actors_stopped.load(Ordering::Relaxed);
        SystemStats {
            actors_spawned: spawned,
            actors_stopped: stopped,
            actors_running: spawned.saturating_sub(stopped),
            messages_processed: self.messages_processed.load(Ordering::Relaxed),
            avg_processing_time_ns: self.avg_processing_time_ns(),
            faults: self.faults.load(Ordering::Relaxed),
            restarts: self.restarts.load(Ordering::Relaxed),
            dead_letters: self.dead_letters.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of [`SystemMetrics`]
#[derive(Debug, Clone, PartialEq)]
pub struct SystemStats {
    pub actors_spawned: u64,
    pub actors_stopped: u64,
    pub actors_running: u64,
    pub messages_processed: u64,
    pub avg_processing_time_ns: f64,
    pub faults: u64,
    pub restarts: u64,
    pub dead_letters: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_average() {
        let metrics = SystemMetrics::default();
        assert_eq!(metrics.avg_processing_time_ns(), 0.0);

        metrics.record_message_handled(Duration::from_nanos(100));
        metrics.record_message_handled(Duration::from_nanos(300));
        assert_eq!(metrics.avg_processing_time_ns(), 200.0);
    }

    #[test]
    fn test_snapshot_running_count() {
        let metrics = SystemMetrics::default();
        metrics.record_spawned();
        metrics.record_spawned();
        metrics.record_stopped();

        let stats = metrics.snapshot();
        assert_eq!(stats.actors_running, 1);
        assert_eq!(stats.dead_letters, 0);
    }
}
