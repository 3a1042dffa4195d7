use std::collections::VecDeque;

use serde::Serialize;

/// Summary of how late timers fired relative to their deadlines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencyStats {
    pub samples: usize,
    pub mean_ms: f64,
    pub jitter_ms: f64,
    pub max_ms: u64,
}

/// Rolling window of timer lateness samples.
#[derive(Debug, Clone)]
pub struct LatencyRecorder {
    samples: VecDeque<u64>,
    max_samples: usize,
}

impl LatencyRecorder {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples.min(1024)),
            max_samples: max_samples.max(1),
        }
    }

    pub fn record(&mut self, late_ms: u64) {
        if self.samples.len() >= self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(late_ms);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn stats(&self) -> LatencyStats {
        if self.samples.is_empty() {
            return LatencyStats::default();
        }
        let n = self.samples.len() as f64;
        let mean = self.samples.iter().map(|&s| s as f64).sum::<f64>() / n;
        let var = self
            .samples
            .iter()
            .map(|&s| (s as f64 - mean).powi(2))
            .sum::<f64>()
            / n;
        LatencyStats {
            samples: self.samples.len(),
            mean_ms: mean,
            jitter_ms: var.sqrt(),
            max_ms: self.samples.iter().copied().max().unwrap_or(0),
        }
    }
}

impl Default for LatencyRecorder {
    fn default() -> Self {
        Self::new(1000)
    }
}
