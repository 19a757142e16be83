//! Note-triggered sample playback

use std::collections::HashMap;
use std::sync::Arc;

use super::{AudioProcessor, Sample};
use crate::midi::{MidiMessage, MidiMessageKind};

/// Maximum simultaneous voices. The voice table is allocated at
/// construction; triggering past this limit steals the oldest voice.
pub const MAX_POLYPHONY: usize = 16;

#[derive(Default)]
struct Voice {
    sample: Option<Arc<Sample>>,
    /// Frame position within the sample.
    position: usize,
    note: u8,
    gain: f32,
    /// Monotonic trigger ordinal, used for voice stealing.
    age: u64,
}

/// Plays one-shot samples keyed by MIDI note number.
///
/// Note On messages arriving through the track's MIDI wiring start a
/// voice; each voice plays its sample to the end and is then retired.
/// Note Off is ignored: mapped samples are one-shots.
pub struct SamplePlayer {
    samples: HashMap<u8, Arc<Sample>>,
    voices: Vec<Voice>,
    next_age: u64,
    bypassed: bool,
}

impl SamplePlayer {
    pub fn new() -> Self {
        Self {
            samples: HashMap::new(),
            voices: (0..MAX_POLYPHONY).map(|_| Voice::default()).collect(),
            next_age: 0,
            bypassed: false,
        }
    }

    /// Map a sample to a MIDI note. Replaces any previous mapping for
    /// that note. Configuration-time only.
    pub fn add_sample(&mut self, note: u8, sample: Arc<Sample>) {
        log::info!("SamplePlayer: mapped note {} to {}", note, sample);
        self.samples.insert(note, sample);
    }

    pub fn mapped_notes(&self) -> usize {
        self.samples.len()
    }

    /// Number of voices currently sounding.
    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.sample.is_some()).count()
    }

    fn trigger(&mut self, note: u8, velocity: u8) {
        let Some(sample) = self.samples.get(&note) else {
            return;
        };

        let slot = match self.voices.iter_mut().find(|v| v.sample.is_none()) {
            Some(free) => free,
            // All voices busy: steal the oldest.
            None => match self.voices.iter_mut().min_by_key(|v| v.age) {
                Some(oldest) => oldest,
                None => return,
            },
        };

        slot.sample = Some(sample.clone());
        slot.position = 0;
        slot.note = note;
        slot.gain = velocity as f32 / 127.0;
        slot.age = self.next_age;
        self.next_age += 1;
    }
}

impl Default for SamplePlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioProcessor for SamplePlayer {
    fn process_audio(&mut self, buffer: &mut [f32], channels: u16, n_frames: usize, _sample_rate: u32) {
        let out_channels = channels as usize;

        for voice in &mut self.voices {
            let Some(sample) = &voice.sample else {
                continue;
            };

            let in_channels = sample.channels as usize;
            let remaining = sample.total_frames.saturating_sub(voice.position);
            let frames = remaining.min(n_frames);

            for frame in 0..frames {
                let src = (voice.position + frame) * in_channels;
                let dst = frame * out_channels;

                for ch in 0..out_channels {
                    let value = if in_channels == 1 {
                        sample.data[src]
                    } else if ch < in_channels {
                        sample.data[src + ch]
                    } else {
                        0.0
                    };
                    buffer[dst + ch] += value * voice.gain;
                }
            }

            voice.position += frames;
            if voice.position >= sample.total_frames {
                voice.sample = None;
            }
        }
    }

    fn reset(&mut self) {
        for voice in &mut self.voices {
            voice.sample = None;
            voice.position = 0;
        }
    }

    fn set_bypass(&mut self, bypassed: bool) {
        self.bypassed = bypassed;
    }

    fn is_bypassed(&self) -> bool {
        self.bypassed
    }

    fn handle_midi(&mut self, message: &MidiMessage) {
        // Note On with zero velocity is a running-status Note Off.
        if message.kind == MidiMessageKind::NoteOn && message.data2 > 0 {
            self.trigger(message.data1, message.data2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono_sample(values: &[f32]) -> Arc<Sample> {
        Arc::new(Sample::from_data("test", 44_100, 1, values.to_vec()))
    }

    fn note_on(note: u8, velocity: u8) -> MidiMessage {
        MidiMessage::parse(0.0, &[0x90, note, velocity]).unwrap()
    }

    #[test]
    fn note_on_starts_a_voice_and_plays_to_end() {
        let mut player = SamplePlayer::new();
        player.add_sample(60, mono_sample(&[1.0, 0.5, 0.25]));

        player.handle_midi(&note_on(60, 127));
        assert_eq!(player.active_voices(), 1);

        let mut buffer = vec![0.0f32; 4];
        player.process_audio(&mut buffer, 1, 4, 44_100);

        assert_eq!(&buffer[..3], &[1.0, 0.5, 0.25]);
        assert_eq!(buffer[3], 0.0);
        assert_eq!(player.active_voices(), 0, "voice retired at end of sample");
    }

    #[test]
    fn velocity_scales_gain() {
        let mut player = SamplePlayer::new();
        player.add_sample(60, mono_sample(&[1.0]));

        player.handle_midi(&note_on(60, 64));
        let mut buffer = vec![0.0f32; 2];
        player.process_audio(&mut buffer, 1, 2, 44_100);

        assert!((buffer[0] - 64.0 / 127.0).abs() < 1e-6);
    }

    #[test]
    fn mono_sample_duplicates_into_stereo() {
        let mut player = SamplePlayer::new();
        player.add_sample(60, mono_sample(&[0.5, -0.5]));

        player.handle_midi(&note_on(60, 127));
        let mut buffer = vec![0.0f32; 4];
        player.process_audio(&mut buffer, 2, 2, 44_100);

        assert_eq!(buffer, vec![0.5, 0.5, -0.5, -0.5]);
    }

    #[test]
    fn unmapped_note_is_ignored() {
        let mut player = SamplePlayer::new();
        player.add_sample(60, mono_sample(&[1.0]));

        player.handle_midi(&note_on(61, 127));
        assert_eq!(player.active_voices(), 0);
    }

    #[test]
    fn voices_mix_additively() {
        let mut player = SamplePlayer::new();
        player.add_sample(60, mono_sample(&[0.25, 0.25]));
        player.add_sample(61, mono_sample(&[0.5, 0.5]));

        player.handle_midi(&note_on(60, 127));
        player.handle_midi(&note_on(61, 127));
        assert_eq!(player.active_voices(), 2);

        let mut buffer = vec![0.0f32; 2];
        player.process_audio(&mut buffer, 1, 2, 44_100);
        assert!((buffer[0] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn polyphony_limit_steals_oldest_voice() {
        let mut player = SamplePlayer::new();
        // A long sample so voices stay active.
        player.add_sample(60, mono_sample(&vec![0.1; 1000]));

        for _ in 0..MAX_POLYPHONY + 1 {
            player.handle_midi(&note_on(60, 127));
        }
        assert_eq!(player.active_voices(), MAX_POLYPHONY);
    }

    #[test]
    fn reset_silences_all_voices() {
        let mut player = SamplePlayer::new();
        player.add_sample(60, mono_sample(&vec![0.1; 100]));
        player.handle_midi(&note_on(60, 127));
        player.reset();
        assert_eq!(player.active_voices(), 0);
    }
}
