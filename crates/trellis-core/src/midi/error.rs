//! MIDI control-plane error types

/// Errors from MIDI port control.
#[derive(Debug, thiserror::Error)]
pub enum MidiError {
    #[error("failed to initialize MIDI input: {0}")]
    InitFailed(String),

    #[error("MIDI port {port} is out of range ({count} ports available)")]
    PortOutOfRange { port: usize, count: usize },

    #[error("failed to open MIDI input port: {0}")]
    ConnectFailed(String),
}
