//! Audio callback dispatch
//!
//! The backend invokes one callback per buffer with the raw device
//! output slice. The callback context is built by the controller while
//! the stream is stopped and is read-only for the stream's lifetime;
//! it holds shared references to the active data planes.

use std::cell::Cell;
use std::sync::Arc;
use std::time::Instant;

use super::dataplane::AudioDataPlane;
use crate::logging;

thread_local! {
    static CALLBACK_THREAD_LABELED: Cell<bool> = const { Cell::new(false) };
}

/// Shared state for one running audio stream.
pub struct AudioCallbackContext {
    /// Tracks scheduled for this stream. All agree on the output
    /// channel count (forced at stream start).
    active_planes: Vec<Arc<AudioDataPlane>>,
    output_channels: u16,
    started: Instant,
}

impl AudioCallbackContext {
    pub fn new(active_planes: Vec<Arc<AudioDataPlane>>, output_channels: u16) -> Self {
        Self {
            active_planes,
            output_channels,
            started: Instant::now(),
        }
    }

    pub fn active_track_count(&self) -> usize {
        self.active_planes.len()
    }

    pub fn output_channels(&self) -> u16 {
        self.output_channels
    }

    /// Seconds since the stream started.
    pub fn stream_time(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Fill one device buffer: zero it, then let every active plane
    /// add its batch. Called on the audio callback thread.
    pub fn render(&self, out: &mut [f32], n_frames: usize, stream_time: f64) {
        CALLBACK_THREAD_LABELED.with(|labeled| {
            if !labeled.get() {
                logging::set_thread_name("audio-callback");
                labeled.set(true);
            }
        });

        if self.active_planes.is_empty() || out.is_empty() {
            return;
        }

        let span = (n_frames * self.output_channels as usize).min(out.len());
        out[..span].fill(0.0);

        for plane in &self.active_planes {
            plane.render(&mut out[..span], n_frames, stream_time);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_and_mixes_all_active_planes() {
        let first = Arc::new(AudioDataPlane::new());
        first.preload_buffer(&[0.25, 0.25, 0.25, 0.25], 1);
        first.set_output_channels(2);
        first.start();

        let second = Arc::new(AudioDataPlane::new());
        second.preload_buffer(&[0.5, 0.5, 0.5, 0.5], 2);
        second.set_output_channels(2);
        second.start();

        let context = AudioCallbackContext::new(vec![first, second], 2);
        // Stale garbage in the device buffer must be cleared first.
        let mut out = vec![7.0f32; 4];
        context.render(&mut out, 2, 0.01);

        assert_eq!(out, vec![0.75, 0.75, 0.75, 0.75]);
    }

    #[test]
    fn empty_context_leaves_buffer_untouched() {
        let context = AudioCallbackContext::new(Vec::new(), 2);
        let mut out = vec![1.0f32; 4];
        context.render(&mut out, 2, 0.0);
        assert_eq!(out, vec![1.0; 4]);
    }

    #[test]
    fn stopped_plane_contributes_silence() {
        let plane = Arc::new(AudioDataPlane::new());
        plane.preload_buffer(&[0.5, 0.5], 1);
        plane.set_output_channels(1);
        // Not started.

        let context = AudioCallbackContext::new(vec![plane.clone()], 1);
        let mut out = vec![3.0f32; 2];
        context.render(&mut out, 2, 0.0);

        assert_eq!(out, vec![0.0, 0.0]);
        assert_eq!(plane.stats().total_batches, 0);
    }

    #[test]
    fn stream_time_is_monotonic() {
        let context = AudioCallbackContext::new(Vec::new(), 2);
        let first = context.stream_time();
        let second = context.stream_time();
        assert!(second >= first);
    }
}
