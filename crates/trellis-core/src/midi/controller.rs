//! MIDI input port controller
//!
//! Opens one input port at a time through midir and feeds decoded
//! messages to the active MIDI data planes. The callback context is
//! moved into the midir connection at open time and rebuilt from the
//! registered planes on each open, strictly while no port is open.

use std::cell::Cell;
use std::sync::Arc;

use midir::{Ignore, MidiInput, MidiInputConnection};

use super::dataplane::MidiDataPlane;
use super::error::MidiError;
use super::message::MidiMessage;
use crate::device::MidiPortInfo;
use crate::logging;

const CLIENT_NAME: &str = "trellis-midi";

thread_local! {
    static CALLBACK_THREAD_LABELED: Cell<bool> = const { Cell::new(false) };
}

/// State owned by the midir callback for one open port.
pub struct MidiCallbackContext {
    active_planes: Vec<Arc<MidiDataPlane>>,
    /// Backend timestamp (microseconds) of the previous message.
    last_timestamp: Option<u64>,
}

impl MidiCallbackContext {
    pub fn new(active_planes: Vec<Arc<MidiDataPlane>>) -> Self {
        Self {
            active_planes,
            last_timestamp: None,
        }
    }

    pub fn active_track_count(&self) -> usize {
        self.active_planes.len()
    }

    /// Decode raw bytes and forward to every active plane. Called on
    /// the MIDI callback thread.
    pub fn dispatch(&mut self, timestamp_us: u64, bytes: &[u8]) {
        CALLBACK_THREAD_LABELED.with(|labeled| {
            if !labeled.get() {
                logging::set_thread_name("midi-callback");
                labeled.set(true);
            }
        });

        let delta_time = match self.last_timestamp {
            Some(last) => timestamp_us.saturating_sub(last) as f64 / 1_000_000.0,
            None => 0.0,
        };
        self.last_timestamp = Some(timestamp_us);

        let Some(message) = MidiMessage::parse(delta_time, bytes) else {
            log::debug!("MidiCallbackContext: empty MIDI message ignored");
            return;
        };

        for plane in &self.active_planes {
            plane.process_message(&message);
        }
    }
}

/// Controls the MIDI input port for the track graph.
pub struct MidiController {
    registered: Vec<Arc<MidiDataPlane>>,
    connection: Option<MidiInputConnection<MidiCallbackContext>>,
    open_port: Option<usize>,
}

impl MidiController {
    pub fn new() -> Self {
        Self {
            registered: Vec::new(),
            connection: None,
            open_port: None,
        }
    }

    /// Available MIDI input ports, sorted by port number.
    pub fn ports(&self) -> Result<Vec<MidiPortInfo>, MidiError> {
        let midi_in =
            MidiInput::new(CLIENT_NAME).map_err(|e| MidiError::InitFailed(e.to_string()))?;

        let mut ports = Vec::new();
        for (index, port) in midi_in.ports().iter().enumerate() {
            match midi_in.port_name(port) {
                Ok(name) => ports.push(MidiPortInfo {
                    port_number: index,
                    name,
                }),
                Err(err) => log::error!("MidiController: error getting port name: {}", err),
            }
        }
        Ok(ports)
    }

    /// Register a data plane for the next port open.
    pub fn register_dataplane(&mut self, plane: Arc<MidiDataPlane>) {
        self.registered.push(plane);
    }

    pub fn clear_registered_dataplanes(&mut self) {
        self.registered.clear();
    }

    pub fn registered_count(&self) -> usize {
        self.registered.len()
    }

    pub fn is_port_open(&self) -> bool {
        self.connection.is_some()
    }

    pub fn open_port(&self) -> Option<usize> {
        self.open_port
    }

    /// Open an input port and start delivering messages to the
    /// registered data planes. SysEx and timing messages are ignored
    /// at the backend.
    pub fn open_input_port(&mut self, port_number: usize) -> Result<(), MidiError> {
        let mut midi_in =
            MidiInput::new(CLIENT_NAME).map_err(|e| MidiError::InitFailed(e.to_string()))?;

        let ports = midi_in.ports();
        if port_number >= ports.len() {
            log::error!("MidiController: invalid MIDI port number {}", port_number);
            return Err(MidiError::PortOutOfRange {
                port: port_number,
                count: ports.len(),
            });
        }

        if self.connection.is_some() {
            log::warn!("MidiController: input port already open, closing it first");
            self.close_input_port();
        }

        if self.registered.is_empty() {
            log::warn!("MidiController: no MIDI data planes registered, not opening port");
            return Ok(());
        }

        midi_in.ignore(Ignore::SysexAndTime);

        let context = MidiCallbackContext::new(self.registered.clone());
        let connection = midi_in
            .connect(
                &ports[port_number],
                "trellis-midi-in",
                |timestamp, bytes, context: &mut MidiCallbackContext| {
                    context.dispatch(timestamp, bytes);
                },
                context,
            )
            .map_err(|e| {
                log::error!("MidiController: failed to open MIDI input port: {}", e);
                MidiError::ConnectFailed(e.to_string())
            })?;

        self.connection = Some(connection);
        self.open_port = Some(port_number);
        log::info!("MidiController: input port {} opened", port_number);
        Ok(())
    }

    /// Close the open input port. Idempotent.
    pub fn close_input_port(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
            log::info!("MidiController: input port closed");
        }
        self.open_port = None;
    }
}

impl Default for MidiController {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MidiController {
    fn drop(&mut self) {
        self.close_input_port();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::MidiMessageKind;
    use std::sync::Mutex;

    #[test]
    fn dispatch_computes_delta_time_from_timestamps() {
        let plane = Arc::new(MidiDataPlane::new());
        let deltas: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = deltas.clone();
        plane.set_note_on_callback(Box::new(move |note| {
            sink.lock().unwrap().push(note.delta_time);
        }));
        plane.start();

        let mut context = MidiCallbackContext::new(vec![plane]);
        context.dispatch(1_000_000, &[0x90, 60, 100]);
        context.dispatch(1_250_000, &[0x90, 62, 100]);

        let deltas = deltas.lock().unwrap();
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0], 0.0, "first message has no predecessor");
        assert!((deltas[1] - 0.25).abs() < 1e-9);
    }

    #[test]
    fn dispatch_reaches_every_active_plane() {
        let first = Arc::new(MidiDataPlane::new());
        let second = Arc::new(MidiDataPlane::new());
        first.start();
        second.start();

        let mut context = MidiCallbackContext::new(vec![first.clone(), second.clone()]);
        context.dispatch(0, &[0xB0, 7, 100]);

        assert_eq!(first.stats().total_messages_processed, 1);
        assert_eq!(second.stats().total_messages_processed, 1);
    }

    #[test]
    fn empty_bytes_are_dropped_before_the_planes() {
        let plane = Arc::new(MidiDataPlane::new());
        plane.start();

        let mut context = MidiCallbackContext::new(vec![plane.clone()]);
        context.dispatch(0, &[]);
        assert_eq!(plane.stats().total_messages_processed, 0);
    }

    #[test]
    fn decoded_kind_matches_wire_bytes() {
        let plane = Arc::new(MidiDataPlane::new());
        let kinds: Arc<Mutex<Vec<MidiMessageKind>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = kinds.clone();
        plane.set_note_off_callback(Box::new(move |note| {
            sink.lock().unwrap().push(note.kind);
        }));
        plane.start();

        let mut context = MidiCallbackContext::new(vec![plane]);
        context.dispatch(0, &[0x83, 45, 10]);

        assert_eq!(kinds.lock().unwrap().as_slice(), &[MidiMessageKind::NoteOff]);
    }

    #[test]
    fn controller_without_registration_skips_open() {
        // No hardware dependency: an empty registration returns before
        // the port is touched, whatever ports exist.
        let mut controller = MidiController::new();
        if let Ok(ports) = controller.ports() {
            if !ports.is_empty() {
                controller.open_input_port(0).unwrap();
                assert!(!controller.is_port_open());
            }
        }
    }

    #[test]
    fn out_of_range_port_is_a_typed_error() {
        let mut controller = MidiController::new();
        controller.register_dataplane(Arc::new(MidiDataPlane::new()));
        match controller.open_input_port(usize::MAX) {
            Err(MidiError::PortOutOfRange { port, .. }) => assert_eq!(port, usize::MAX),
            Err(MidiError::InitFailed(_)) => {} // no MIDI subsystem on this machine
            other => panic!("expected out-of-range error, got {:?}", other.err()),
        }
    }

    #[test]
    fn close_is_idempotent() {
        let mut controller = MidiController::new();
        controller.close_input_port();
        controller.close_input_port();
        assert!(!controller.is_port_open());
    }
}
