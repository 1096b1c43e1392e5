/// Snapshot of a pool's counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolMetrics {
    pub workers: usize,
    pub queued_jobs: i64,
    pub completed_jobs: u64,
    pub failed_jobs: u64,
    pub panicked_jobs: u64,
}

impl PoolMetrics {
    pub fn total_finished(&self) -> u64 {
        self.completed_jobs + self.failed_jobs + self.panicked_jobs
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.total_finished();
        if total == 0 {
            return 1.0;
        }
        self.completed_jobs as f64 / total as f64
    }

    /// Queued jobs per worker. Infinite when there are jobs but no workers.
    pub fn queue_pressure(&self) -> f64 {
        if self.workers == 0 {
            return if self.queued_jobs > 0 { f64::INFINITY } else { 0.0 };
        }
        self.queued_jobs as f64 / self.workers as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(workers: usize, queued: i64, ok: u64, failed: u64, panicked: u64) -> PoolMetrics {
        PoolMetrics {
            workers,
            queued_jobs: queued,
            completed_jobs: ok,
            failed_jobs: failed,
            panicked_jobs: panicked,
        }
    }

    #[test]
    fn success_rate_counts_failures_and_panics() {
        assert_eq!(metrics(4, 0, 0, 0, 0).success_rate(), 1.0);
        let m = metrics(4, 0, 6, 1, 1);
        assert_eq!(m.total_finished(), 8);
        assert_eq!(m.success_rate(), 0.75);
    }

    #[test]
    fn queue_pressure_without_workers() {
        assert_eq!(metrics(0, 0, 0, 0, 0).queue_pressure(), 0.0);
        assert!(metrics(0, 3, 0, 0, 0).queue_pressure().is_infinite());
        assert_eq!(metrics(4, 2, 0, 0, 0).queue_pressure(), 0.5);
    }
}
