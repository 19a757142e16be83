//! MIDI plane: wire-format decoding, data planes, port control
//!
//! Device bytes arrive on the backend's MIDI thread, are decoded into
//! [`MidiMessage`]s and delivered synchronously to each active
//! track's [`MidiDataPlane`], which forwards note and control events
//! to the track's user callbacks and processors.

mod controller;
mod dataplane;
mod error;
mod message;

pub use controller::{MidiCallbackContext, MidiController};
pub use dataplane::{MidiDataPlane, MidiInputStats};
pub use error::MidiError;
pub use message::{
    note_name, MidiControl, MidiControlMessage, MidiMessage, MidiMessageKind, MidiNoteMessage,
    CONTROL_PRESSED, CONTROL_RELEASED, MIDDLE_C,
};
