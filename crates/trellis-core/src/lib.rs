//! Trellis - minimal real-time audio engine
//!
//! Routes and schedules audio and MIDI data between device callbacks,
//! a tree of mixing tracks, and per-track processors.
//!
//! # Architecture
//!
//! The engine is split into two planes:
//!
//! - **Control plane** (application main thread): builds the track
//!   graph, binds inputs and outputs, preloads sources, starts and
//!   stops streams. All operations are synchronous.
//! - **Data plane** (backend callback threads): pulls audio frames
//!   and receives MIDI messages in bounded time, without allocation
//!   and without blocking on the control plane.
//!
//! ```text
//! MIDI device -> midir callback -> MidiCallbackContext
//!   -> per-track MidiDataPlane: decode + dispatch
//!      -> user callbacks (note on/off, control change)
//!      -> processors (SamplePlayer voice triggering)
//!
//! audio device -> cpal callback -> AudioCallbackContext
//!   -> zero device buffer
//!   -> per-track AudioDataPlane: pull frames, remap channels,
//!      run processor chain, mix into device buffer
//! ```

pub mod audio;
pub mod device;
pub mod engine;
pub mod logging;
pub mod midi;
pub mod processor;
pub mod ring;
pub mod track;
pub mod wav;

pub use engine::Engine;
