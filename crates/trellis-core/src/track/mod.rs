//! Track graph
//!
//! A track is a node in the mixing tree. It owns one audio data plane
//! and one MIDI data plane, an ordered processor chain shared with
//! outside holders, and optional input bindings. The distinguished
//! main track is the root of the tree and additionally owns the audio
//! and MIDI controllers; playback on any track in the tree is driven
//! through them.
//!
//! Parent links are weak back-references; children are owned by their
//! parent. Structural mutation (attach, detach, bind, unbind) is a
//! control-plane operation and must not happen while a stream is
//! running over the affected subtree.

mod error;
mod manager;

pub use error::TrackError;
pub use manager::TrackManager;

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use crate::audio::{AudioController, AudioDataPlane, AudioOutputStats};
use crate::device::{AudioDeviceInfo, MidiPortInfo};
use crate::midi::{MidiController, MidiDataPlane, MidiInputStats, MidiMessage};
use crate::processor::SharedProcessor;
use crate::wav::WavFile;

/// Events surfaced through a track's event callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackEvent {
    /// The preloaded source has been played to its end.
    PlaybackFinished,
}

/// Audio input bound to a track.
pub enum AudioInputBinding {
    Device(AudioDeviceInfo),
    File(Arc<Mutex<WavFile>>),
}

impl Clone for AudioInputBinding {
    fn clone(&self) -> Self {
        match self {
            Self::Device(device) => Self::Device(device.clone()),
            Self::File(wav) => Self::File(wav.clone()),
        }
    }
}

/// Per-track statistics bundle.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackStatistics {
    pub audio_output: AudioOutputStats,
    pub midi_input: MidiInputStats,
}

impl fmt::Display for TrackStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TrackStatistics(audio={}, midi={})",
            self.audio_output, self.midi_input
        )
    }
}

/// Controllers owned by the main track.
struct Controllers {
    audio: Mutex<AudioController>,
    midi: Mutex<MidiController>,
}

/// A node in the mixing tree.
pub struct Track {
    is_main: bool,
    parent: Mutex<Weak<Track>>,
    children: Mutex<Vec<Arc<Track>>>,
    audio_plane: Arc<AudioDataPlane>,
    midi_plane: Arc<MidiDataPlane>,
    audio_input: Mutex<Option<AudioInputBinding>>,
    midi_input: Mutex<Option<MidiPortInfo>>,
    /// `Some` only on the main track.
    controllers: Option<Controllers>,
}

impl Track {
    /// Create a detached, non-main track.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(false))
    }

    /// Create the main track, owner of the controllers. One per
    /// engine instance; the track manager calls this on construction.
    pub(crate) fn new_main() -> Arc<Self> {
        Arc::new(Self::build(true))
    }

    fn build(is_main: bool) -> Self {
        Self {
            is_main,
            parent: Mutex::new(Weak::new()),
            children: Mutex::new(Vec::new()),
            audio_plane: Arc::new(AudioDataPlane::new()),
            midi_plane: Arc::new(MidiDataPlane::new()),
            audio_input: Mutex::new(None),
            midi_input: Mutex::new(None),
            controllers: is_main.then(|| Controllers {
                audio: Mutex::new(AudioController::new()),
                midi: Mutex::new(MidiController::new()),
            }),
        }
    }

    pub fn is_main(&self) -> bool {
        self.is_main
    }

    // ------------------------------------------------------------------
    // Hierarchy
    // ------------------------------------------------------------------

    pub fn parent(&self) -> Option<Arc<Track>> {
        self.parent.lock().unwrap().upgrade()
    }

    pub fn children(&self) -> Vec<Arc<Track>> {
        self.children.lock().unwrap().clone()
    }

    pub fn child_count(&self) -> usize {
        self.children.lock().unwrap().len()
    }

    /// Attach `child` under this track. Fails if the child is this
    /// track, already has a parent, or is an ancestor of this track.
    pub fn add_child(self: &Arc<Self>, child: &Arc<Track>) -> Result<(), TrackError> {
        if Arc::ptr_eq(self, child) {
            return Err(TrackError::SelfParent);
        }
        if child.parent().is_some() {
            return Err(TrackError::AlreadyParented);
        }
        if self.has_ancestor(child) {
            return Err(TrackError::CycleDetected);
        }

        self.children.lock().unwrap().push(child.clone());
        *child.parent.lock().unwrap() = Arc::downgrade(self);
        Ok(())
    }

    /// Detach `child` from this track. Idempotent when the child is
    /// not present.
    pub fn remove_child(&self, child: &Arc<Track>) {
        let mut children = self.children.lock().unwrap();
        let before = children.len();
        children.retain(|c| !Arc::ptr_eq(c, child));
        let removed = children.len() != before;
        drop(children);

        if removed {
            *child.parent.lock().unwrap() = Weak::new();
        }
    }

    /// Detach this track from its parent. No-op when already
    /// detached.
    pub fn remove_from_parent(self: &Arc<Self>) {
        if let Some(parent) = self.parent() {
            parent.remove_child(self);
        }
    }

    fn has_ancestor(self: &Arc<Self>, candidate: &Arc<Track>) -> bool {
        let mut current = self.parent();
        while let Some(track) = current {
            if Arc::ptr_eq(&track, candidate) {
                return true;
            }
            current = track.parent();
        }
        false
    }

    /// Root of this track's tree (the track itself when detached).
    pub fn root(self: &Arc<Self>) -> Arc<Track> {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    // ------------------------------------------------------------------
    // Input bindings
    // ------------------------------------------------------------------

    /// Bind an audio input. Device inputs must have input channels.
    pub fn add_audio_input(&self, input: AudioInputBinding) -> Result<(), TrackError> {
        let mut binding = self.audio_input.lock().unwrap();
        if binding.is_some() {
            return Err(TrackError::AudioInputAlreadyBound);
        }

        match &input {
            AudioInputBinding::Device(device) => {
                if device.input_channels < 1 {
                    return Err(TrackError::NoInputChannels(device.name.clone()));
                }
                self.audio_plane.set_input_channels(device.input_channels);
                log::info!("Track: added audio input device: {}", device);
            }
            AudioInputBinding::File(wav) => {
                let wav = wav.lock().unwrap();
                self.audio_plane.set_input_channels(wav.channels());
                log::info!("Track: added audio input file: {}", wav);
            }
        }

        *binding = Some(input);
        Ok(())
    }

    pub fn has_audio_input(&self) -> bool {
        self.audio_input.lock().unwrap().is_some()
    }

    pub fn audio_input(&self) -> Option<AudioInputBinding> {
        self.audio_input.lock().unwrap().clone()
    }

    /// Clear the audio input binding and drop the plane's sources.
    pub fn remove_audio_input(&self) {
        *self.audio_input.lock().unwrap() = None;
        self.audio_plane.clear_sources();
    }

    /// Bind a MIDI input port. The port itself is opened at `play()`.
    pub fn add_midi_input(&self, port: MidiPortInfo) -> Result<(), TrackError> {
        let mut binding = self.midi_input.lock().unwrap();
        if binding.is_some() {
            return Err(TrackError::MidiInputAlreadyBound);
        }
        log::info!("Track: added MIDI input: {}", port);
        *binding = Some(port);
        Ok(())
    }

    pub fn has_midi_input(&self) -> bool {
        self.midi_input.lock().unwrap().is_some()
    }

    pub fn midi_input(&self) -> Option<MidiPortInfo> {
        self.midi_input.lock().unwrap().clone()
    }

    /// Clear the MIDI input binding, closing the port if this track's
    /// tree has one open.
    pub fn remove_midi_input(self: &Arc<Self>) {
        let had_binding = self.midi_input.lock().unwrap().take().is_some();
        if !had_binding {
            return;
        }
        if let Some(controllers) = self.root().controllers.as_ref() {
            controllers.midi.lock().unwrap().close_input_port();
        }
    }

    // ------------------------------------------------------------------
    // Processors and callbacks
    // ------------------------------------------------------------------

    /// Append a processor to this track's chain. It will see audio
    /// batches and MIDI input.
    pub fn add_processor(&self, processor: SharedProcessor) {
        self.audio_plane.add_processor(processor.clone());
        self.midi_plane.add_processor(processor);
    }

    pub fn processors(&self) -> Vec<SharedProcessor> {
        self.audio_plane.processors()
    }

    pub fn set_midi_note_on_callback(
        &self,
        callback: Box<dyn Fn(&crate::midi::MidiNoteMessage) + Send>,
    ) {
        self.midi_plane.set_note_on_callback(callback);
    }

    pub fn set_midi_note_off_callback(
        &self,
        callback: Box<dyn Fn(&crate::midi::MidiNoteMessage) + Send>,
    ) {
        self.midi_plane.set_note_off_callback(callback);
    }

    pub fn set_midi_control_change_callback(
        &self,
        callback: Box<dyn Fn(&crate::midi::MidiControlMessage) + Send>,
    ) {
        self.midi_plane.set_control_change_callback(callback);
    }

    pub fn set_event_callback(&self, callback: Box<dyn Fn(TrackEvent) + Send>) {
        self.audio_plane.set_event_callback(callback);
    }

    /// Dispatch one decoded MIDI message through this track's MIDI
    /// data plane.
    pub fn handle_midi_message(&self, message: &MidiMessage) {
        self.midi_plane.process_message(message);
    }

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    pub fn is_playing(self: &Arc<Self>) -> bool {
        match self.root().controllers.as_ref() {
            Some(controllers) => controllers.audio.lock().unwrap().is_playing(),
            None => false,
        }
    }

    /// Start playback: preload a bound file input, start this track's
    /// data planes, then start the tree's stream and open the bound
    /// MIDI port. No-op when already playing. On failure every started
    /// piece is rolled back and the track stays stopped.
    pub fn play(self: &Arc<Self>) -> Result<(), TrackError> {
        if self.is_playing() {
            log::info!("Track: play requested but already playing");
            return Ok(());
        }

        log::info!("Track: play");

        let audio_binding = self.audio_input.lock().unwrap().clone();
        if let Some(AudioInputBinding::File(wav)) = &audio_binding {
            let mut wav = wav.lock().unwrap();
            self.audio_plane.preload_wav(&mut wav);
        }

        self.audio_plane.start();
        self.midi_plane.start();

        let root = self.root();
        let Some(controllers) = root.controllers.as_ref() else {
            self.rollback_planes();
            return Err(TrackError::Detached);
        };

        {
            let mut audio = controllers.audio.lock().unwrap();
            audio.clear_registered_dataplanes();
            for plane in root.collect_running_audio_planes() {
                audio.register_dataplane(plane);
            }
            if let Err(err) = audio.start_stream() {
                drop(audio);
                self.rollback_planes();
                return Err(err.into());
            }
        }

        // The MIDI port attaches at play() time and closes at stop()
        // or unbind.
        if let Some(port) = self.midi_input.lock().unwrap().clone() {
            let mut midi = controllers.midi.lock().unwrap();
            midi.clear_registered_dataplanes();
            for plane in root.collect_running_midi_planes() {
                midi.register_dataplane(plane);
            }
            if let Err(err) = midi.open_input_port(port.port_number) {
                drop(midi);
                let mut audio = controllers.audio.lock().unwrap();
                if let Err(stop_err) = audio.stop_stream() {
                    log::error!("Track: rollback stop failed: {}", stop_err);
                }
                drop(audio);
                self.rollback_planes();
                return Err(err.into());
            }
        }

        Ok(())
    }

    /// Stop playback: stop this track's data planes (dropping the
    /// preloaded buffer), close the bound MIDI port, and stop the
    /// tree's stream. No-op when not playing.
    pub fn stop(self: &Arc<Self>) -> Result<(), TrackError> {
        if !self.is_playing() {
            log::info!("Track: stop requested but not playing");
            return Ok(());
        }

        log::info!("Track: stop");

        self.audio_plane.stop();
        self.midi_plane.stop();

        let root = self.root();
        if let Some(controllers) = root.controllers.as_ref() {
            if self.has_midi_input() {
                controllers.midi.lock().unwrap().close_input_port();
            }
            controllers.audio.lock().unwrap().stop_stream()?;
        }

        Ok(())
    }

    fn rollback_planes(&self) {
        self.audio_plane.stop();
        self.midi_plane.stop();
    }

    // ------------------------------------------------------------------
    // Main-track delegation
    // ------------------------------------------------------------------

    /// Select the output device for this tree's stream. Main track
    /// only.
    pub fn set_audio_output_device(&self, device: AudioDeviceInfo) -> Result<(), TrackError> {
        let controllers = self.controllers.as_ref().ok_or(TrackError::NotMainTrack)?;
        controllers.audio.lock().unwrap().set_output_device(device)?;
        Ok(())
    }

    /// Open a MIDI input port over the tree's running MIDI planes.
    /// Main track only.
    pub fn open_midi_input_port(self: &Arc<Self>, port: &MidiPortInfo) -> Result<(), TrackError> {
        let controllers = self.controllers.as_ref().ok_or(TrackError::NotMainTrack)?;
        let mut midi = controllers.midi.lock().unwrap();
        midi.clear_registered_dataplanes();
        for plane in self.collect_running_midi_planes() {
            midi.register_dataplane(plane);
        }
        midi.open_input_port(port.port_number)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Data plane access
    // ------------------------------------------------------------------

    pub fn audio_dataplane(&self) -> Arc<AudioDataPlane> {
        self.audio_plane.clone()
    }

    pub fn midi_dataplane(&self) -> Arc<MidiDataPlane> {
        self.midi_plane.clone()
    }

    pub fn statistics(&self) -> TrackStatistics {
        TrackStatistics {
            audio_output: self.audio_plane.stats(),
            midi_input: self.midi_plane.stats(),
        }
    }

    /// Running audio data planes of this subtree, depth-first.
    pub(crate) fn collect_running_audio_planes(&self) -> Vec<Arc<AudioDataPlane>> {
        let mut planes = Vec::new();
        self.collect_audio_planes_into(&mut planes);
        planes
    }

    fn collect_audio_planes_into(&self, out: &mut Vec<Arc<AudioDataPlane>>) {
        if self.audio_plane.is_running() {
            out.push(self.audio_plane.clone());
        }
        for child in self.children.lock().unwrap().iter() {
            child.collect_audio_planes_into(out);
        }
    }

    /// Running MIDI data planes of this subtree, depth-first.
    pub(crate) fn collect_running_midi_planes(&self) -> Vec<Arc<MidiDataPlane>> {
        let mut planes = Vec::new();
        self.collect_midi_planes_into(&mut planes);
        planes
    }

    fn collect_midi_planes_into(&self, out: &mut Vec<Arc<MidiDataPlane>>) {
        if self.midi_plane.is_running() {
            out.push(self.midi_plane.clone());
        }
        for child in self.children.lock().unwrap().iter() {
            child.collect_midi_planes_into(out);
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let audio = match self.audio_input.lock().unwrap().as_ref() {
            None => "None".to_string(),
            Some(AudioInputBinding::Device(device)) => device.to_string(),
            Some(AudioInputBinding::File(wav)) => wav.lock().unwrap().to_string(),
        };
        let midi = match self.midi_input.lock().unwrap().as_ref() {
            None => "None".to_string(),
            Some(port) => port.to_string(),
        };
        write!(
            f,
            "Track(Main={}, AudioInput={}, MidiInput={}, Children={})",
            self.is_main,
            audio,
            midi,
            self.child_count()
        )
    }
}
