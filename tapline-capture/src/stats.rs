//! Capture statistics and metrics

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tapline_core::RawStats;

/// Statistics for a capture session
///
/// `packets_received`/`packets_dropped`/`packets_if_dropped` come from the
/// engine; `packets_delivered`/`bytes_delivered` count what the session
/// actually handed to callers after filtering.
#[derive(Debug, Clone, Default)]
pub struct CaptureStats {
    /// Packets received by the engine
    pub packets_received: u64,
    /// Packets dropped for lack of buffer space
    pub packets_dropped: u64,
    /// Packets dropped by the interface or its driver
    pub packets_if_dropped: u64,
    /// Packets delivered to callers
    pub packets_delivered: u64,
    /// Captured bytes delivered to callers
    pub bytes_delivered: u64,
    /// Time since the session was activated
    pub duration: Duration,
    /// Delivered packets per second
    pub packets_per_second: f64,
    /// Delivered bytes per second
    pub bytes_per_second: f64,
}

impl CaptureStats {
    /// Create new empty statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge engine counters into a delivery snapshot
    pub fn from_engine(raw: RawStats, delivered: CaptureStats) -> Self {
        Self {
            packets_received: raw.received as u64,
            packets_dropped: raw.dropped as u64,
            packets_if_dropped: raw.if_dropped as u64,
            ..delivered
        }
    }

    /// Calculate drop rate as percentage
    pub fn drop_rate(&self) -> f64 {
        if self.packets_received == 0 {
            return 0.0;
        }
        (self.packets_dropped as f64 / self.packets_received as f64) * 100.0
    }

    /// Check if there are significant drops
    pub fn has_significant_drops(&self, threshold_percent: f64) -> bool {
        self.drop_rate() > threshold_percent
    }

    /// Get total packets (received + dropped)
    pub fn total_packets(&self) -> u64 {
        self.packets_received + self.packets_dropped
    }

    /// Format statistics as human-readable string
    pub fn format(&self) -> String {
        format!(
            "Received: {} packets\n\
             Delivered: {} packets ({} bytes)\n\
             Dropped: {} packets ({:.2}%)\n\
             IF Dropped: {} packets\n\
             Duration: {:.2}s\n\
             Rate: {:.2} pps, {:.2} KB/s",
            self.packets_received,
            self.packets_delivered,
            self.bytes_delivered,
            self.packets_dropped,
            self.drop_rate(),
            self.packets_if_dropped,
            self.duration.as_secs_f64(),
            self.packets_per_second,
            self.bytes_per_second / 1024.0
        )
    }
}

/// Delivery counters for a session
///
/// Cloning shares the counters, so a monitoring thread can watch a session
/// that another thread drives.
#[derive(Debug, Clone)]
pub struct StatsAccumulator {
    packets: Arc<AtomicU64>,
    bytes: Arc<AtomicU64>,
    start_time: Instant,
}

impl StatsAccumulator {
    /// Create a new statistics accumulator
    pub fn new() -> Self {
        Self {
            packets: Arc::new(AtomicU64::new(0)),
            bytes: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    /// Record a delivered packet
    pub fn record_packet(&self, size: usize) {
        self.packets.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(size as u64, Ordering::Relaxed);
    }

    /// Get current statistics snapshot
    pub fn snapshot(&self) -> CaptureStats {
        let packets = self.packets.load(Ordering::Relaxed);
        let bytes = self.bytes.load(Ordering::Relaxed);
        let duration = self.start_time.elapsed();

        let secs = duration.as_secs_f64();
        let (packets_per_second, bytes_per_second) = if secs > 0.0 {
            (packets as f64 / secs, bytes as f64 / secs)
        } else {
            (0.0, 0.0)
        };

        CaptureStats {
            packets_delivered: packets,
            bytes_delivered: bytes,
            duration,
            packets_per_second,
            bytes_per_second,
            ..CaptureStats::default()
        }
    }

    /// Reset counters and restart the clock
    pub fn reset(&mut self) {
        self.packets.store(0, Ordering::Relaxed);
        self.bytes.store(0, Ordering::Relaxed);
        self.start_time = Instant::now();
    }

    /// Packets delivered so far
    pub fn packets(&self) -> u64 {
        self.packets.load(Ordering::Relaxed)
    }

    /// Bytes delivered so far
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

impl Default for StatsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
