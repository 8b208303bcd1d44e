//! Part-boundary progress accounting: counters, instantaneous rate and ETA.

use crate::{
    models::progress::{TransferDirection, TransferProgress},
    services::format::{format_duration, format_rate},
};
use std::time::Duration;
use tracing::debug;

/// Receives progress observations between parts.
///
/// Called synchronously on the transferring task, so implementations must
/// return quickly.
pub trait ProgressSink: Send + Sync {
    fn observe(&self, progress: &TransferProgress);
}

/// Discards every observation.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn observe(&self, _progress: &TransferProgress) {}
}

/// Emits observations as `debug` events.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn observe(&self, p: &TransferProgress) {
        debug!(
            direction = ?p.direction,
            parts_done = p.parts_done,
            parts_total = ?p.parts_total,
            bytes_done = p.bytes_done,
            bytes_total = ?p.bytes_total,
            eta = %p.eta,
            rate = %p.rate,
            "transfer progress"
        );
    }
}

/// Floor for per-part timings so an instant part never divides by zero.
const MIN_PART_ELAPSED: Duration = Duration::from_millis(1);

/// Running counters for one upload or download.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    direction: TransferDirection,
    parts_total: Option<u32>,
    bytes_total: Option<u64>,
    parts_done: u32,
    bytes_done: u64,
}

impl ProgressTracker {
    pub fn new(
        direction: TransferDirection,
        parts_total: Option<u32>,
        bytes_total: Option<u64>,
    ) -> Self {
        Self {
            direction,
            parts_total,
            bytes_total,
            parts_done: 0,
            bytes_done: 0,
        }
    }

    pub fn parts_done(&self) -> u32 {
        self.parts_done
    }

    pub fn bytes_done(&self) -> u64 {
        self.bytes_done
    }

    /// Account for a finished part of `part_bytes` that took `elapsed`.
    pub fn record_part(&mut self, part_bytes: u64, elapsed: Duration) -> TransferProgress {
        self.parts_done += 1;
        self.bytes_done += part_bytes;

        let rate = part_bytes as f64 / elapsed.max(MIN_PART_ELAPSED).as_secs_f64();
        let eta = self
            .eta_at(rate)
            .map(format_duration)
            .unwrap_or_else(|| "unknown".into());

        TransferProgress {
            direction: self.direction,
            parts_done: self.parts_done,
            parts_total: self.parts_total,
            bytes_done: self.bytes_done,
            bytes_total: self.bytes_total,
            eta,
            rate: format_rate(rate),
        }
    }

    /// Remaining time at `bytes_per_sec`, or `None` if it cannot be estimated.
    pub fn eta_at(&self, bytes_per_sec: f64) -> Option<Duration> {
        if !bytes_per_sec.is_finite() || bytes_per_sec <= 0.0 {
            return None;
        }
        let remaining = self.remaining_bytes()?;
        Some(Duration::from_secs_f64(remaining as f64 / bytes_per_sec))
    }

    /// Exact when the byte total is known, otherwise remaining parts times
    /// the mean size of the parts seen so far.
    fn remaining_bytes(&self) -> Option<u64> {
        if let Some(total) = self.bytes_total {
            return Some(total.saturating_sub(self.bytes_done));
        }
        let parts_total = self.parts_total?;
        if self.parts_done == 0 {
            return None;
        }
        let mean = self.bytes_done / u64::from(self.parts_done);
        Some(u64::from(parts_total.saturating_sub(self.parts_done)) * mean)
    }
}
