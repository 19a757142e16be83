//! Audio and MIDI device enumeration
//!
//! Devices are enumerated on demand through cpal and midir and
//! returned as plain descriptor structs; no backend handles are held.
//! Descriptors are identified by their enumeration index, unique
//! within their kind.

use std::fmt;

use cpal::traits::{DeviceTrait, HostTrait};
use midir::MidiInput;

/// Common sample rates probed against each device's supported ranges.
const PROBED_SAMPLE_RATES: [u32; 6] = [44_100, 48_000, 88_200, 96_000, 176_400, 192_000];

/// Errors from device enumeration and lookup.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("no audio devices found")]
    NoAudioDevices,

    #[error("audio device id {0} is out of range")]
    AudioDeviceOutOfRange(u32),

    #[error("MIDI port {0} is out of range")]
    MidiPortOutOfRange(usize),

    #[error("audio device not found: {0}")]
    AudioDeviceNotFound(String),

    #[error("audio backend error: {0}")]
    AudioBackend(String),

    #[error("MIDI backend error: {0}")]
    MidiBackend(String),
}

/// Descriptor for an audio device.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioDeviceInfo {
    /// Enumeration index, unique among audio devices.
    pub id: u32,
    pub name: String,
    pub is_default_input: bool,
    pub is_default_output: bool,
    pub input_channels: u16,
    pub output_channels: u16,
    pub duplex_channels: u16,
    /// Supported rates out of the common set, ascending.
    pub sample_rates: Vec<u32>,
    pub preferred_sample_rate: u32,
}

impl AudioDeviceInfo {
    pub fn is_input(&self) -> bool {
        self.input_channels > 0
    }

    pub fn is_output(&self) -> bool {
        self.output_channels > 0
    }
}

impl fmt::Display for AudioDeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioDevice(id={}, name={}, in={}, out={}, default_out={}, preferred_rate={})",
            self.id,
            self.name,
            self.input_channels,
            self.output_channels,
            self.is_default_output,
            self.preferred_sample_rate
        )
    }
}

/// Descriptor for a MIDI input port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiPortInfo {
    pub port_number: usize,
    pub name: String,
}

impl fmt::Display for MidiPortInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MidiPort(port={}, name={})", self.port_number, self.name)
    }
}

/// Enumerates the system's audio and MIDI devices.
pub struct DeviceRegistry {
    host: cpal::Host,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    /// All audio devices of the default host, defaults first is not
    /// guaranteed; ids follow enumeration order.
    pub fn audio_devices(&self) -> Result<Vec<AudioDeviceInfo>, DeviceError> {
        let default_output_name = self
            .host
            .default_output_device()
            .and_then(|d| d.name().ok());
        let default_input_name = self.host.default_input_device().and_then(|d| d.name().ok());

        let devices = self
            .host
            .devices()
            .map_err(|e| DeviceError::AudioBackend(e.to_string()))?;

        let mut infos = Vec::new();
        for (index, device) in devices.enumerate() {
            let name = match device.name() {
                Ok(name) => name,
                Err(err) => {
                    log::debug!("Skipping unnamed audio device: {}", err);
                    continue;
                }
            };

            let (output_channels, output_rates) = output_capabilities(&device);
            let (input_channels, input_rates) = input_capabilities(&device);

            let mut sample_rates: Vec<u32> = output_rates;
            for rate in input_rates {
                if !sample_rates.contains(&rate) {
                    sample_rates.push(rate);
                }
            }
            sample_rates.sort_unstable();

            let preferred_sample_rate = device
                .default_output_config()
                .map(|c| c.sample_rate().0)
                .or_else(|_| device.default_input_config().map(|c| c.sample_rate().0))
                .unwrap_or(44_100);

            infos.push(AudioDeviceInfo {
                id: index as u32,
                is_default_input: default_input_name.as_ref() == Some(&name),
                is_default_output: default_output_name.as_ref() == Some(&name),
                name,
                input_channels,
                output_channels,
                duplex_channels: input_channels.min(output_channels),
                sample_rates,
                preferred_sample_rate,
            });
        }

        if infos.is_empty() {
            return Err(DeviceError::NoAudioDevices);
        }

        log::info!("Enumerated {} audio devices", infos.len());
        Ok(infos)
    }

    /// Look up an audio device by its enumeration id.
    pub fn audio_device(&self, id: u32) -> Result<AudioDeviceInfo, DeviceError> {
        self.audio_devices()?
            .into_iter()
            .find(|d| d.id == id)
            .ok_or(DeviceError::AudioDeviceOutOfRange(id))
    }

    pub fn default_audio_output_device(&self) -> Option<AudioDeviceInfo> {
        self.audio_devices()
            .ok()?
            .into_iter()
            .find(|d| d.is_default_output)
    }

    pub fn default_audio_input_device(&self) -> Option<AudioDeviceInfo> {
        self.audio_devices()
            .ok()?
            .into_iter()
            .find(|d| d.is_default_input)
    }

    /// All MIDI input ports, sorted by port number.
    pub fn midi_inputs(&self) -> Result<Vec<MidiPortInfo>, DeviceError> {
        let midi_in = MidiInput::new("trellis-device-list")
            .map_err(|e| DeviceError::MidiBackend(e.to_string()))?;

        let ports = midi_in
            .ports()
            .iter()
            .enumerate()
            .filter_map(|(index, port)| {
                midi_in.port_name(port).ok().map(|name| MidiPortInfo {
                    port_number: index,
                    name,
                })
            })
            .collect();

        Ok(ports)
    }

    /// Look up a MIDI input port by number.
    pub fn midi_input(&self, port_number: usize) -> Result<MidiPortInfo, DeviceError> {
        self.midi_inputs()?
            .into_iter()
            .find(|p| p.port_number == port_number)
            .ok_or(DeviceError::MidiPortOutOfRange(port_number))
    }

    /// First MIDI input that is not a virtual loopback port, falling
    /// back to the first port.
    pub fn default_midi_input(&self) -> Option<MidiPortInfo> {
        let ports = self.midi_inputs().ok()?;
        ports
            .iter()
            .find(|p| !p.name.to_lowercase().contains("midi through"))
            .or_else(|| ports.first())
            .cloned()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Find the cpal output device matching a descriptor, by name.
pub(crate) fn find_output_device(info: &AudioDeviceInfo) -> Result<cpal::Device, DeviceError> {
    let host = cpal::default_host();
    host.output_devices()
        .map_err(|e| DeviceError::AudioBackend(e.to_string()))?
        .find(|d| d.name().ok().as_deref() == Some(info.name.as_str()))
        .ok_or_else(|| DeviceError::AudioDeviceNotFound(info.name.clone()))
}

fn output_capabilities(device: &cpal::Device) -> (u16, Vec<u32>) {
    let configs: Vec<_> = match device.supported_output_configs() {
        Ok(configs) => configs.collect(),
        Err(_) => return (0, Vec::new()),
    };

    let channels = configs.iter().map(|c| c.channels()).max().unwrap_or(0);
    (channels, supported_rates(&configs))
}

fn input_capabilities(device: &cpal::Device) -> (u16, Vec<u32>) {
    let configs: Vec<_> = match device.supported_input_configs() {
        Ok(configs) => configs.collect(),
        Err(_) => return (0, Vec::new()),
    };

    let channels = configs.iter().map(|c| c.channels()).max().unwrap_or(0);
    (channels, supported_rates(&configs))
}

fn supported_rates(configs: &[cpal::SupportedStreamConfigRange]) -> Vec<u32> {
    let mut rates = Vec::new();
    for config in configs {
        for rate in PROBED_SAMPLE_RATES {
            if rate >= config.min_sample_rate().0
                && rate <= config.max_sample_rate().0
                && !rates.contains(&rate)
            {
                rates.push(rate);
            }
        }
    }
    rates
}
