//! Frame-rate and memory sampling.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// FPS samples kept for the running average (one minute at one sample per second).
const FPS_SAMPLES: usize = 60;

/// Latest performance readings attached to session summaries.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformanceMetrics {
    pub average_fps: Option<f64>,
    pub memory: Option<MemorySample>,
}

/// Heap usage reading in bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySample {
    pub used: u64,
    pub total: u64,
    pub limit: u64,
    pub timestamp: i64,
}

/// Counts frames and emits one FPS sample per elapsed second.
#[derive(Clone, Debug)]
pub struct FpsMeter {
    window_start: f64,
    frames: u32,
    samples: VecDeque<u32>,
}

impl FpsMeter {
    pub fn new(now_ms: f64) -> Self {
        Self {
            window_start: now_ms,
            frames: 0,
            samples: VecDeque::with_capacity(FPS_SAMPLES),
        }
    }

    /// Count a frame rendered at `now_ms`; returns a sample when a second has passed.
    pub fn frame(&mut self, now_ms: f64) -> Option<u32> {
        self.frames += 1;
        let elapsed = now_ms - self.window_start;
        if elapsed < 1000.0 {
            return None;
        }
        let fps = (f64::from(self.frames) * 1000.0 / elapsed).round() as u32;
        self.samples.push_back(fps);
        if self.samples.len() > FPS_SAMPLES {
            self.samples.pop_front();
        }
        self.frames = 0;
        self.window_start = now_ms;
        Some(fps)
    }

    pub fn average(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: u64 = self.samples.iter().map(|s| u64::from(*s)).sum();
        Some(sum as f64 / self.samples.len() as f64)
    }
}
