//! Per-track MIDI data plane
//!
//! Receives decoded messages on the MIDI callback thread and delivers
//! them synchronously: matching user callbacks first, then the
//! track's processors (so note input drives samplers). There is no
//! queue; user callbacks inherit the callback thread's no-blocking
//! contract.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use super::message::{MidiControlMessage, MidiMessage, MidiMessageKind, MidiNoteMessage};
use crate::processor::{AudioProcessor, SharedProcessor};

type NoteCallback = Box<dyn Fn(&MidiNoteMessage) + Send>;
type ControlCallback = Box<dyn Fn(&MidiControlMessage) + Send>;

/// Snapshot of a track's MIDI input statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MidiInputStats {
    pub total_messages_processed: u64,
}

impl fmt::Display for MidiInputStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MidiInputStats(messages={})",
            self.total_messages_processed
        )
    }
}

/// MIDI data plane of one track.
pub struct MidiDataPlane {
    running: AtomicBool,
    messages_processed: AtomicU64,
    note_on: Mutex<Option<NoteCallback>>,
    note_off: Mutex<Option<NoteCallback>>,
    control_change: Mutex<Option<ControlCallback>>,
    /// Processors interested in note input; shares entries with the
    /// track's audio chain.
    processors: Mutex<Vec<SharedProcessor>>,
}

impl MidiDataPlane {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            messages_processed: AtomicU64::new(0),
            note_on: Mutex::new(None),
            note_off: Mutex::new(None),
            control_change: Mutex::new(None),
            processors: Mutex::new(Vec::new()),
        }
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::Release);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn set_note_on_callback(&self, callback: NoteCallback) {
        *self.note_on.lock().unwrap() = Some(callback);
    }

    pub fn set_note_off_callback(&self, callback: NoteCallback) {
        *self.note_off.lock().unwrap() = Some(callback);
    }

    pub fn set_control_change_callback(&self, callback: ControlCallback) {
        *self.control_change.lock().unwrap() = Some(callback);
    }

    pub fn add_processor(&self, processor: SharedProcessor) {
        self.processors.lock().unwrap().push(processor);
    }

    pub fn stats(&self) -> MidiInputStats {
        MidiInputStats {
            total_messages_processed: self.messages_processed.load(Ordering::Relaxed),
        }
    }

    /// Deliver one decoded message. Called on the MIDI callback
    /// thread; a stopped plane ignores the message without counting
    /// it.
    pub fn process_message(&self, message: &MidiMessage) {
        if !self.is_running() {
            return;
        }

        log::debug!("MidiDataPlane: {}", message);

        match message.kind {
            MidiMessageKind::NoteOn => {
                if let Some(note) = message.as_note() {
                    let callback = self.note_on.lock().unwrap();
                    if let Some(callback) = callback.as_ref() {
                        callback(&note);
                    }
                }
            }
            MidiMessageKind::NoteOff => {
                if let Some(note) = message.as_note() {
                    let callback = self.note_off.lock().unwrap();
                    if let Some(callback) = callback.as_ref() {
                        callback(&note);
                    }
                }
            }
            MidiMessageKind::ControlChange => {
                if let Some(control) = message.as_control() {
                    let callback = self.control_change.lock().unwrap();
                    if let Some(callback) = callback.as_ref() {
                        callback(&control);
                    }
                }
            }
            other => {
                log::debug!("MidiDataPlane: unhandled message kind {}", other);
            }
        }

        // Note input also drives processors (sample triggering).
        {
            let processors = self.processors.lock().unwrap();
            for processor in processors.iter() {
                processor.lock().unwrap().handle_midi(message);
            }
        }

        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for MidiDataPlane {
    fn default() -> Self {
        Self::new()
    }
}
