//! Rolling audio output statistics
//!
//! The audio callback records one entry per batch; the control thread
//! reads snapshots during playback. All fields are relaxed atomics so
//! neither side ever locks (f64 values are stored as bit patterns in
//! `AtomicU64`).

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Snapshot of a track's audio output statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AudioOutputStats {
    pub total_frames_read: u64,
    pub total_batches: u64,
    pub batch_size_frames: u32,
    pub total_read_time_ms: f64,
    pub min_batch_time_ms: f64,
    pub max_batch_time_ms: f64,
    pub throughput_frames_per_second: f64,
    pub underrun_count: u64,
    pub overrun_count: u64,
}

impl AudioOutputStats {
    /// Mean batch wall-clock time.
    pub fn average_batch_time_ms(&self) -> f64 {
        if self.total_batches == 0 {
            0.0
        } else {
            self.total_read_time_ms / self.total_batches as f64
        }
    }
}

impl fmt::Display for AudioOutputStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioOutputStats(frames={}, batches={}, batch_size={}, avg_batch={:.3}ms, \
             min_batch={:.3}ms, max_batch={:.3}ms, throughput={:.0}Hz, underruns={}, overruns={})",
            self.total_frames_read,
            self.total_batches,
            self.batch_size_frames,
            self.average_batch_time_ms(),
            self.min_batch_time_ms,
            self.max_batch_time_ms,
            self.throughput_frames_per_second,
            self.underrun_count,
            self.overrun_count
        )
    }
}

/// Lock-free accumulator behind [`AudioOutputStats`].
#[derive(Default)]
pub(crate) struct StatsCell {
    total_frames_read: AtomicU64,
    total_batches: AtomicU64,
    batch_size_frames: AtomicU32,
    total_read_time_ms: AtomicU64,
    min_batch_time_ms: AtomicU64,
    max_batch_time_ms: AtomicU64,
    throughput: AtomicU64,
    underrun_count: AtomicU64,
    overrun_count: AtomicU64,
}

fn load_f64(cell: &AtomicU64) -> f64 {
    f64::from_bits(cell.load(Ordering::Relaxed))
}

fn store_f64(cell: &AtomicU64, value: f64) {
    cell.store(value.to_bits(), Ordering::Relaxed);
}

fn add_f64(cell: &AtomicU64, value: f64) {
    let _ = cell.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
        Some((f64::from_bits(bits) + value).to_bits())
    });
}

impl StatsCell {
    /// Record one completed batch. Not called on the silent early-exit
    /// path.
    pub fn record_batch(&self, n_frames: usize, batch_time_ms: f64, stream_time: f64) {
        let frames_after = self
            .total_frames_read
            .fetch_add(n_frames as u64, Ordering::Relaxed)
            + n_frames as u64;
        let batches_after = self.total_batches.fetch_add(1, Ordering::Relaxed) + 1;

        self.batch_size_frames
            .store(n_frames as u32, Ordering::Relaxed);
        add_f64(&self.total_read_time_ms, batch_time_ms);

        if batches_after == 1 {
            store_f64(&self.min_batch_time_ms, batch_time_ms);
            store_f64(&self.max_batch_time_ms, batch_time_ms);
        } else {
            let _ = self
                .min_batch_time_ms
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                    Some(f64::from_bits(bits).min(batch_time_ms).to_bits())
                });
            let _ = self
                .max_batch_time_ms
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                    Some(f64::from_bits(bits).max(batch_time_ms).to_bits())
                });
        }

        // Instantaneous throughput; stream time below 1ms is clamped
        // so startup batches do not divide by ~zero.
        let throughput = frames_after as f64 / stream_time.max(0.001);
        store_f64(&self.throughput, throughput);
    }

    pub fn add_underruns(&self, count: u64) {
        self.underrun_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_overruns(&self, count: u64) {
        self.overrun_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> AudioOutputStats {
        AudioOutputStats {
            total_frames_read: self.total_frames_read.load(Ordering::Relaxed),
            total_batches: self.total_batches.load(Ordering::Relaxed),
            batch_size_frames: self.batch_size_frames.load(Ordering::Relaxed),
            total_read_time_ms: load_f64(&self.total_read_time_ms),
            min_batch_time_ms: load_f64(&self.min_batch_time_ms),
            max_batch_time_ms: load_f64(&self.max_batch_time_ms),
            throughput_frames_per_second: load_f64(&self.throughput),
            underrun_count: self.underrun_count.load(Ordering::Relaxed),
            overrun_count: self.overrun_count.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batches_accumulate() {
        let cell = StatsCell::default();
        cell.record_batch(512, 0.4, 0.01);
        cell.record_batch(512, 0.2, 0.02);
        cell.record_batch(512, 0.6, 0.03);

        let stats = cell.snapshot();
        assert_eq!(stats.total_frames_read, 1536);
        assert_eq!(stats.total_batches, 3);
        assert_eq!(stats.batch_size_frames, 512);
        assert!((stats.total_read_time_ms - 1.2).abs() < 1e-9);
        assert!((stats.min_batch_time_ms - 0.2).abs() < 1e-9);
        assert!((stats.max_batch_time_ms - 0.6).abs() < 1e-9);
        assert!((stats.average_batch_time_ms() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn first_batch_sets_min_and_max() {
        let cell = StatsCell::default();
        cell.record_batch(128, 0.5, 0.01);
        let stats = cell.snapshot();
        assert_eq!(stats.min_batch_time_ms, 0.5);
        assert_eq!(stats.max_batch_time_ms, 0.5);
    }

    #[test]
    fn throughput_clamps_early_stream_time() {
        let cell = StatsCell::default();
        cell.record_batch(441, 0.1, 0.0);
        let stats = cell.snapshot();
        // 441 frames over the clamped 1ms floor.
        assert!((stats.throughput_frames_per_second - 441_000.0).abs() < 1.0);

        cell.record_batch(441, 0.1, 0.02);
        let stats = cell.snapshot();
        assert!((stats.throughput_frames_per_second - 882.0 / 0.02).abs() < 1.0);
    }

    #[test]
    fn shortfall_counters_are_independent() {
        let cell = StatsCell::default();
        cell.add_underruns(6);
        cell.add_overruns(2);
        let stats = cell.snapshot();
        assert_eq!(stats.underrun_count, 6);
        assert_eq!(stats.overrun_count, 2);
        assert_eq!(stats.total_batches, 0);
    }
}
