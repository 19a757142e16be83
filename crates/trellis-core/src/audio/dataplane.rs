//! Per-track audio data plane
//!
//! Pull-driven by the audio callback: each batch it fills the track's
//! output buffer from the preloaded or streaming source, applies the
//! channel remap and the processor chain, and adds the result into the
//! device buffer.
//!
//! Shared-state discipline: statistics, the running flag, and the read
//! cursor are atomics; the buffers live behind a mutex the callback
//! takes with `try_lock` (a contended batch yields silence rather than
//! blocking). The control plane only takes that lock while the plane
//! is stopped, so the lock is uncontended during playback.

use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use super::stats::{AudioOutputStats, StatsCell};
use crate::processor::{AudioProcessor, SharedProcessor};
use crate::ring;
use crate::track::TrackEvent;
use crate::wav::WavFile;

/// Widest device input the streaming path handles per frame.
const MAX_INPUT_CHANNELS: usize = 8;

type EventCallback = Box<dyn Fn(TrackEvent) + Send>;

/// Mutable buffers, guarded; see module docs for the locking rules.
#[derive(Default)]
struct PlaneBuffers {
    /// Fully decoded source, interleaved; empty when no file is
    /// preloaded.
    preloaded: Vec<f32>,
    /// Frame count of `preloaded`.
    preloaded_frames: usize,
    /// Streaming source, if attached.
    stream: Option<ring::Consumer<f32>>,
    /// Track-local output of the last batch, `n_frames * output_channels`.
    output: Vec<f32>,
}

/// Audio data plane of one track.
pub struct AudioDataPlane {
    running: AtomicBool,
    input_channels: AtomicU16,
    output_channels: AtomicU16,
    sample_rate: AtomicU32,
    /// Frame position within the preloaded source.
    read_cursor: AtomicUsize,
    /// Set once the preloaded source has been played to the end.
    finished: AtomicBool,
    stats: StatsCell,
    buffers: Mutex<PlaneBuffers>,
    processors: Mutex<Vec<SharedProcessor>>,
    event_callback: Mutex<Option<EventCallback>>,
}

impl AudioDataPlane {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            input_channels: AtomicU16::new(1),
            output_channels: AtomicU16::new(2),
            sample_rate: AtomicU32::new(44_100),
            read_cursor: AtomicUsize::new(0),
            finished: AtomicBool::new(false),
            stats: StatsCell::default(),
            buffers: Mutex::new(PlaneBuffers::default()),
            processors: Mutex::new(Vec::new()),
            event_callback: Mutex::new(None),
        }
    }

    // ------------------------------------------------------------------
    // Control plane
    // ------------------------------------------------------------------

    /// Begin producing audio. Resets the read cursor.
    pub fn start(&self) {
        self.read_cursor.store(0, Ordering::Release);
        self.finished.store(false, Ordering::Release);
        self.running.store(true, Ordering::Release);
    }

    /// Stop producing audio and drop the preloaded source.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        let mut buffers = self.buffers.lock().unwrap();
        buffers.preloaded.clear();
        buffers.preloaded_frames = 0;
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Decode an entire WAV file into the preloaded buffer. Only legal
    /// while stopped; a running plane logs and ignores the request.
    pub fn preload_wav(&self, wav: &mut WavFile) {
        if self.is_running() {
            log::warn!("AudioDataPlane: cannot preload while running");
            return;
        }

        log::info!("AudioDataPlane: preloading {}", wav);

        if let Err(err) = wav.seek(0) {
            log::error!("AudioDataPlane: seek failed for {}: {}", wav, err);
            return;
        }
        self.read_cursor.store(0, Ordering::Release);
        self.finished.store(false, Ordering::Release);

        let channels = wav.channels();
        let expected = wav.total_frames() as usize;

        let mut buffers = self.buffers.lock().unwrap();
        buffers.preloaded.clear();
        buffers.preloaded.resize(expected * channels as usize, 0.0);
        let read = wav.read_frames(&mut buffers.preloaded, expected);
        if read < expected {
            log::warn!(
                "AudioDataPlane: read fewer frames than expected: {} / {}",
                read,
                expected
            );
            buffers.preloaded.truncate(read * channels as usize);
        }
        buffers.preloaded_frames = read;
        drop(buffers);

        self.input_channels.store(channels, Ordering::Relaxed);
        self.sample_rate.store(wav.sample_rate(), Ordering::Relaxed);
    }

    /// Install raw interleaved samples as the preloaded source.
    pub fn preload_buffer(&self, samples: &[f32], channels: u16) {
        if self.is_running() {
            log::warn!("AudioDataPlane: cannot preload while running");
            return;
        }

        self.read_cursor.store(0, Ordering::Release);
        self.finished.store(false, Ordering::Release);

        let mut buffers = self.buffers.lock().unwrap();
        buffers.preloaded.clear();
        buffers.preloaded.extend_from_slice(samples);
        buffers.preloaded_frames = samples.len() / channels as usize;
        drop(buffers);

        self.input_channels.store(channels, Ordering::Relaxed);
    }

    /// Attach a streaming source. The producer half stays with the
    /// caller; ring overruns are reported via [`note_overruns`].
    ///
    /// [`note_overruns`]: AudioDataPlane::note_overruns
    pub fn attach_stream(&self, consumer: ring::Consumer<f32>, channels: u16) {
        let mut buffers = self.buffers.lock().unwrap();
        buffers.stream = Some(consumer);
        drop(buffers);
        self.input_channels.store(channels, Ordering::Relaxed);
    }

    /// Drop both sources (input unbound from the track).
    pub fn clear_sources(&self) {
        let mut buffers = self.buffers.lock().unwrap();
        buffers.preloaded.clear();
        buffers.preloaded_frames = 0;
        buffers.stream = None;
    }

    pub fn set_input_channels(&self, channels: u16) {
        self.input_channels.store(channels, Ordering::Relaxed);
    }

    pub fn input_channels(&self) -> u16 {
        self.input_channels.load(Ordering::Relaxed)
    }

    pub fn set_output_channels(&self, channels: u16) {
        self.output_channels.store(channels, Ordering::Relaxed);
    }

    pub fn output_channels(&self) -> u16 {
        self.output_channels.load(Ordering::Relaxed)
    }

    pub fn set_sample_rate(&self, sample_rate: u32) {
        self.sample_rate.store(sample_rate, Ordering::Relaxed);
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Relaxed)
    }

    pub fn add_processor(&self, processor: SharedProcessor) {
        self.processors.lock().unwrap().push(processor);
    }

    pub fn processors(&self) -> Vec<SharedProcessor> {
        self.processors.lock().unwrap().clone()
    }

    pub fn set_event_callback(&self, callback: EventCallback) {
        *self.event_callback.lock().unwrap() = Some(callback);
    }

    pub fn stats(&self) -> AudioOutputStats {
        self.stats.snapshot()
    }

    /// Producer-side report of samples dropped on a full stream ring.
    pub fn note_overruns(&self, count: u64) {
        self.stats.add_overruns(count);
    }

    /// Current frame position within the preloaded source.
    pub fn read_cursor(&self) -> usize {
        self.read_cursor.load(Ordering::Acquire)
    }

    /// Control-plane copy of the last batch's track-local output.
    pub fn output_snapshot(&self) -> Vec<f32> {
        self.buffers.lock().unwrap().output.clone()
    }

    // ------------------------------------------------------------------
    // Data plane
    // ------------------------------------------------------------------

    /// Produce `n_frames` frames and add them into `out`.
    ///
    /// Called from the audio callback. `out` is the device buffer,
    /// already zeroed by the dispatch handler; a stopped plane leaves
    /// it untouched and does not update statistics.
    pub fn render(&self, out: &mut [f32], n_frames: usize, stream_time: f64) {
        if !self.is_running() || n_frames == 0 {
            return;
        }

        let out_channels = self.output_channels.load(Ordering::Relaxed) as usize;
        if out_channels == 0 {
            return;
        }

        let source_finished = {
            // Contended only when the control plane is mid-transition.
            let Ok(mut guard) = self.buffers.try_lock() else {
                return;
            };

            let batch_start = Instant::now();

            let needed = n_frames * out_channels;
            if guard.output.len() != needed {
                guard.output.resize(needed, 0.0);
            }
            guard.output.fill(0.0);

            let in_channels = (self.input_channels.load(Ordering::Relaxed) as usize).max(1);

            let mut source_finished = false;
            let buffers = &mut *guard;
            if !buffers.preloaded.is_empty() {
                source_finished = self.read_preloaded(
                    &buffers.preloaded,
                    buffers.preloaded_frames,
                    &mut buffers.output,
                    in_channels,
                    out_channels,
                    n_frames,
                );
            } else if let Some(stream) = buffers.stream.as_mut() {
                let missing =
                    read_stream(stream, &mut buffers.output, in_channels, out_channels, n_frames);
                if missing > 0 {
                    self.stats.add_underruns(missing);
                }
            }

            self.run_processor_chain(&mut buffers.output, out_channels as u16, n_frames);

            for (device, local) in out.iter_mut().zip(buffers.output.iter()) {
                *device += *local;
            }

            let batch_time_ms = batch_start.elapsed().as_secs_f64() * 1_000.0;
            self.stats.record_batch(n_frames, batch_time_ms, stream_time);

            source_finished
        };

        // Buffer lock released; user callbacks run outside it.
        if source_finished {
            self.fire_playback_finished();
        }
    }

    /// Copy from the preloaded source with channel remap; returns true
    /// when this batch consumed the final frames.
    fn read_preloaded(
        &self,
        preloaded: &[f32],
        total_frames: usize,
        output: &mut [f32],
        in_channels: usize,
        out_channels: usize,
        n_frames: usize,
    ) -> bool {
        let cursor = self.read_cursor.load(Ordering::Acquire);

        for i in 0..n_frames {
            let src_frame = cursor + i;
            if src_frame >= total_frames {
                // Tail stays zero.
                break;
            }
            let src = src_frame * in_channels;
            if src + in_channels > preloaded.len() {
                break;
            }
            let dst = i * out_channels;
            remap_frame(
                &preloaded[src..src + in_channels],
                &mut output[dst..dst + out_channels],
            );
        }

        let new_cursor = (cursor + n_frames).min(total_frames);
        self.read_cursor.store(new_cursor, Ordering::Release);

        new_cursor == total_frames && cursor < total_frames
    }

    fn run_processor_chain(&self, output: &mut [f32], out_channels: u16, n_frames: usize) {
        let sample_rate = self.sample_rate.load(Ordering::Relaxed).max(1);
        let chain = self.processors.lock().unwrap();
        for processor in chain.iter() {
            let mut processor = processor.lock().unwrap();
            if processor.is_bypassed() {
                continue;
            }
            processor.process_audio(output, out_channels, n_frames, sample_rate);
        }
    }

    fn fire_playback_finished(&self) {
        if self.finished.swap(true, Ordering::AcqRel) {
            return;
        }
        log::debug!("AudioDataPlane: preloaded source exhausted");
        let callback = self.event_callback.lock().unwrap();
        if let Some(callback) = callback.as_ref() {
            callback(TrackEvent::PlaybackFinished);
        }
    }
}

impl Default for AudioDataPlane {
    fn default() -> Self {
        Self::new()
    }
}

/// Pop one frame per output frame from the stream ring, remapping
/// channels; returns the number of missing samples (substituted with
/// zero).
fn read_stream(
    stream: &mut ring::Consumer<f32>,
    output: &mut [f32],
    in_channels: usize,
    out_channels: usize,
    n_frames: usize,
) -> u64 {
    let in_channels = in_channels.min(MAX_INPUT_CHANNELS);
    let mut scratch = [0.0f32; MAX_INPUT_CHANNELS];
    let mut missing = 0u64;

    for i in 0..n_frames {
        for slot in scratch.iter_mut().take(in_channels) {
            match stream.try_pop() {
                Some(sample) => *slot = sample,
                None => {
                    *slot = 0.0;
                    missing += 1;
                }
            }
        }
        let dst = i * out_channels;
        remap_frame(&scratch[..in_channels], &mut output[dst..dst + out_channels]);
    }

    missing
}

/// Convert one frame from `input.len()` channels to `output.len()`
/// channels: equal counts copy, mono duplicates, extra inputs are
/// discarded, extra outputs are zero-filled.
fn remap_frame(input: &[f32], output: &mut [f32]) {
    if input.len() == 1 && output.len() > 1 {
        output.fill(input[0]);
        return;
    }
    for (ch, slot) in output.iter_mut().enumerate() {
        *slot = input.get(ch).copied().unwrap_or(0.0);
    }
}
