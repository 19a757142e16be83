//! Audio control-plane error types

use crate::device::DeviceError;

/// Errors from audio stream control.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// `start_stream` while already playing.
    #[error("audio stream is already playing")]
    AlreadyPlaying,

    /// `stop_stream` without a running stream.
    #[error("audio stream is not playing")]
    NotPlaying,

    /// `start_stream` before an output device was set.
    #[error("no audio output device has been set")]
    NoOutputDevice,

    /// `start_stream` with no registered data planes.
    #[error("no audio data planes registered for playback")]
    NoActiveDataPlanes,

    /// Selected device has no output channels.
    #[error("device {0} is not an output device")]
    NotAnOutputDevice(String),

    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Stream open/start/stop failed in the backend.
    #[error("audio backend error: {0}")]
    Backend(String),
}
