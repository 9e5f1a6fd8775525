//! Rolling latency window for a service client.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Number of recent calls kept per client.
pub const LATENCY_WINDOW: usize = 100;

/// Summary over the recent calls, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub count: usize,
    pub avg: f64,
    pub min: u64,
    pub max: u64,
    pub p95: u64,
}

#[derive(Debug)]
pub struct LatencyWindow {
    samples: VecDeque<u64>,
    capacity: usize,
}

impl LatencyWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&mut self, latency: Duration) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(latency.as_millis() as u64);
    }

    pub fn stats(&self) -> LatencyStats {
        if self.samples.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        // Nearest-rank percentile.
        let p95_index = ((count as f64 * 0.95).ceil() as usize).saturating_sub(1);

        LatencyStats {
            count,
            avg: sum as f64 / count as f64,
            min: sorted[0],
            max: sorted[count - 1],
            p95: sorted[p95_index.min(count - 1)],
        }
    }
}

impl Default for LatencyWindow {
    fn default() -> Self {
        Self::new(LATENCY_WINDOW)
    }
}
