//! Per-track audio processors
//!
//! Processors run inside the track's audio data plane, after the
//! source stage, each modifying the interleaved buffer in place. They
//! are shared between the owning track and any outside holder (a demo
//! keeping a handle to configure a sampler, test code), so chain
//! entries are reference-counted and mutex-guarded; the data plane
//! holds each processor's lock only for the duration of one batch.

mod oscillator;
mod sample;
mod sample_player;

pub use oscillator::Oscillator;
pub use sample::Sample;
pub use sample_player::{SamplePlayer, MAX_POLYPHONY};

use std::sync::{Arc, Mutex};

use crate::midi::MidiMessage;

/// An audio producer or effect pulled from a track's data plane.
///
/// `process_audio` is called on the audio callback thread and must be
/// bounded-time and allocation-free. `handle_midi` is called on the
/// MIDI callback thread and inherits the same contract.
pub trait AudioProcessor: Send {
    /// Process one batch in place. `buffer` holds `n_frames *
    /// channels` interleaved samples.
    fn process_audio(&mut self, buffer: &mut [f32], channels: u16, n_frames: usize, sample_rate: u32);

    /// Drop all internal playback state.
    fn reset(&mut self);

    fn set_bypass(&mut self, bypassed: bool);

    fn is_bypassed(&self) -> bool;

    /// MIDI event hook for processors driven by note input.
    fn handle_midi(&mut self, _message: &MidiMessage) {}
}

/// Shared handle to a processor in a track's chain.
pub type SharedProcessor = Arc<Mutex<dyn AudioProcessor>>;

/// Wrap a processor for attachment to a track.
pub fn shared<P: AudioProcessor + 'static>(processor: P) -> SharedProcessor {
    Arc::new(Mutex::new(processor))
}
