//! Track graph error types

use crate::audio::AudioError;
use crate::midi::MidiError;

/// Errors from track graph and playback operations.
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error("this track already has an audio input")]
    AudioInputAlreadyBound,

    #[error("this track already has a MIDI input")]
    MidiInputAlreadyBound,

    #[error("audio device {0} has no input channels")]
    NoInputChannels(String),

    #[error("track already has a parent")]
    AlreadyParented,

    #[error("a track cannot be its own child")]
    SelfParent,

    #[error("attaching this track would create a cycle")]
    CycleDetected,

    #[error("the main track cannot be removed from the hierarchy")]
    CannotRemoveMainTrack,

    #[error("operation is only available on the main track")]
    NotMainTrack,

    #[error("track has no main-track ancestor to drive playback")]
    Detached,

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Midi(#[from] MidiError),
}
