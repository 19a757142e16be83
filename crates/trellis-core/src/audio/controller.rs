//! Audio stream controller
//!
//! Owns the device stream for one engine instance and walks the
//! `Idle → Playing → Stopped → Playing → …` state machine. All
//! operations are synchronous control-plane calls; the stream handle
//! never leaves this struct.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};

use super::callback::AudioCallbackContext;
use super::dataplane::AudioDataPlane;
use super::error::AudioError;
use crate::device::{self, AudioDeviceInfo};

/// Frames requested per device buffer. The backend may grant less.
const REQUESTED_BUFFER_FRAMES: u32 = 4096;

/// Stream lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Playing,
    Stopped,
}

/// Controls the audio output stream for the track graph.
pub struct AudioController {
    state: StreamState,
    output_device: Option<AudioDeviceInfo>,
    registered: Vec<Arc<AudioDataPlane>>,
    context: Option<Arc<AudioCallbackContext>>,
    stream: Option<cpal::Stream>,
}

impl AudioController {
    pub fn new() -> Self {
        Self {
            state: StreamState::Idle,
            output_device: None,
            registered: Vec::new(),
            context: None,
            stream: None,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == StreamState::Playing
    }

    pub fn output_device(&self) -> Option<&AudioDeviceInfo> {
        self.output_device.as_ref()
    }

    /// Select the output device for subsequent streams. Closes any
    /// open stream first.
    pub fn set_output_device(&mut self, device: AudioDeviceInfo) -> Result<(), AudioError> {
        if !device.is_output() {
            log::error!("AudioController: {} is not an output device", device.name);
            return Err(AudioError::NotAnOutputDevice(device.name));
        }

        if self.stream.is_some() {
            log::info!("AudioController: closing stream before device change");
            self.stream = None;
            self.state = StreamState::Stopped;
        }

        log::info!("AudioController: output device set to {}", device.name);
        self.output_device = Some(device);
        Ok(())
    }

    /// Register a data plane for the next stream start. The active
    /// list the callback sees is rebuilt from these at `start_stream`,
    /// strictly while the stream is stopped.
    pub fn register_dataplane(&mut self, plane: Arc<AudioDataPlane>) {
        self.registered.push(plane);
    }

    pub fn clear_registered_dataplanes(&mut self) {
        self.registered.clear();
    }

    pub fn registered_count(&self) -> usize {
        self.registered.len()
    }

    /// Open and start the device stream.
    ///
    /// Preconditions, checked in order: not already playing, an output
    /// device set, at least one data plane registered. On any failure
    /// the controller stays in its prior state.
    pub fn start_stream(&mut self) -> Result<(), AudioError> {
        if self.state == StreamState::Playing {
            log::warn!("AudioController: stream already playing");
            return Err(AudioError::AlreadyPlaying);
        }

        let device_info = self
            .output_device
            .clone()
            .ok_or_else(|| {
                log::error!("AudioController: no output device set");
                AudioError::NoOutputDevice
            })?;

        if self.registered.is_empty() {
            log::error!("AudioController: no data planes registered");
            return Err(AudioError::NoActiveDataPlanes);
        }

        // All active planes write at the device's channel count; this
        // is what lets the dispatch handler mix them into one buffer.
        let output_channels = device_info.output_channels;
        let sample_rate = device_info.preferred_sample_rate;
        for plane in &self.registered {
            plane.set_output_channels(output_channels);
            plane.set_sample_rate(sample_rate);
        }

        let context = Arc::new(AudioCallbackContext::new(
            self.registered.clone(),
            output_channels,
        ));

        let device = device::find_output_device(&device_info)?;
        let config = StreamConfig {
            channels: output_channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: BufferSize::Fixed(REQUESTED_BUFFER_FRAMES),
        };

        let stream = match build_stream(&device, &config, context.clone()) {
            Ok(stream) => stream,
            Err(err) => {
                // Some backends reject fixed buffer sizes outright.
                log::warn!(
                    "AudioController: fixed buffer size rejected ({}), retrying with default",
                    err
                );
                let fallback = StreamConfig {
                    buffer_size: BufferSize::Default,
                    ..config
                };
                build_stream(&device, &fallback, context.clone())?
            }
        };

        stream.play().map_err(|e| {
            log::error!("AudioController: failed to start stream: {}", e);
            AudioError::Backend(e.to_string())
        })?;

        log::info!(
            "AudioController: stream started on {} ({} ch, {} Hz, {} tracks)",
            device_info.name,
            output_channels,
            sample_rate,
            context.active_track_count()
        );

        self.context = Some(context);
        self.stream = Some(stream);
        self.state = StreamState::Playing;
        Ok(())
    }

    /// Stop and close the device stream, then clear the registered
    /// data planes.
    pub fn stop_stream(&mut self) -> Result<(), AudioError> {
        if self.state != StreamState::Playing {
            log::warn!("AudioController: stream is not playing, no action taken");
            return Err(AudioError::NotPlaying);
        }

        if let Some(stream) = &self.stream {
            if let Err(err) = stream.pause() {
                log::error!("AudioController: failed to stop stream: {}", err);
                return Err(AudioError::Backend(err.to_string()));
            }
        }

        // Dropping the handle closes the stream.
        self.stream = None;
        self.context = None;
        self.registered.clear();
        self.state = StreamState::Stopped;
        log::info!("AudioController: stream stopped");
        Ok(())
    }

    /// Context of the running stream, if any.
    pub fn callback_context(&self) -> Option<&Arc<AudioCallbackContext>> {
        self.context.as_ref()
    }
}

impl Default for AudioController {
    fn default() -> Self {
        Self::new()
    }
}

fn build_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    context: Arc<AudioCallbackContext>,
) -> Result<cpal::Stream, AudioError> {
    let channels = config.channels as usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let n_frames = data.len() / channels;
                let stream_time = context.stream_time();
                context.render(data, n_frames, stream_time);
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::Backend(e.to_string()))
}
