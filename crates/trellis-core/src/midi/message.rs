//! MIDI wire-format model
//!
//! Raw status/data bytes decoded into typed messages. Channel voice
//! messages are classified by the high status nibble, system messages
//! by the full status byte. Note and control-change messages narrow
//! into typed views for the user-facing callbacks.

use std::fmt;

/// Decoded MIDI message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MidiMessageKind {
    NoteOff,
    NoteOn,
    PolyphonicKeyPressure,
    ControlChange,
    ProgramChange,
    ChannelPressure,
    PitchBend,
    SystemExclusive,
    TimeCodeQuarterFrame,
    SongPositionPointer,
    SongSelect,
    TuneRequest,
    EndOfSysEx,
    TimingClock,
    Start,
    Continue,
    Stop,
    ActiveSensing,
    SystemReset,
    /// Status byte not in the recognized table.
    Unknown,
}

impl MidiMessageKind {
    /// Classify a status byte.
    pub fn from_status(status: u8) -> Self {
        match status & 0xF0 {
            0x80 => Self::NoteOff,
            0x90 => Self::NoteOn,
            0xA0 => Self::PolyphonicKeyPressure,
            0xB0 => Self::ControlChange,
            0xC0 => Self::ProgramChange,
            0xD0 => Self::ChannelPressure,
            0xE0 => Self::PitchBend,
            0xF0 => match status {
                0xF0 => Self::SystemExclusive,
                0xF1 => Self::TimeCodeQuarterFrame,
                0xF2 => Self::SongPositionPointer,
                0xF3 => Self::SongSelect,
                0xF6 => Self::TuneRequest,
                0xF7 => Self::EndOfSysEx,
                0xF8 => Self::TimingClock,
                0xFA => Self::Start,
                0xFB => Self::Continue,
                0xFC => Self::Stop,
                0xFE => Self::ActiveSensing,
                0xFF => Self::SystemReset,
                _ => Self::Unknown,
            },
            _ => Self::Unknown,
        }
    }

    /// Human-readable kind name.
    pub fn name(self) -> &'static str {
        match self {
            Self::NoteOff => "Note Off",
            Self::NoteOn => "Note On",
            Self::PolyphonicKeyPressure => "Polyphonic Key Pressure",
            Self::ControlChange => "Control Change",
            Self::ProgramChange => "Program Change",
            Self::ChannelPressure => "Channel Pressure",
            Self::PitchBend => "Pitch Bend Change",
            Self::SystemExclusive => "System Exclusive",
            Self::TimeCodeQuarterFrame => "MIDI Time Code Quarter Frame",
            Self::SongPositionPointer => "Song Position Pointer",
            Self::SongSelect => "Song Select",
            Self::TuneRequest => "Tune Request",
            Self::EndOfSysEx => "End of SysEx",
            Self::TimingClock => "Timing Clock",
            Self::Start => "Start",
            Self::Continue => "Continue",
            Self::Stop => "Stop",
            Self::ActiveSensing => "Active Sensing",
            Self::SystemReset => "System Reset",
            Self::Unknown => "Unknown MIDI Message",
        }
    }
}

impl fmt::Display for MidiMessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded MIDI message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MidiMessage {
    /// Seconds since the previous message on the same port.
    pub delta_time: f64,
    /// Raw status byte.
    pub status: u8,
    pub kind: MidiMessageKind,
    /// Channel 0-15 (low status nibble; meaningless for system kinds).
    pub channel: u8,
    pub data1: u8,
    pub data2: u8,
}

impl MidiMessage {
    /// Decode a raw byte sequence. Returns `None` for an empty slice.
    pub fn parse(delta_time: f64, bytes: &[u8]) -> Option<Self> {
        let status = *bytes.first()?;
        Some(Self {
            delta_time,
            status,
            kind: MidiMessageKind::from_status(status),
            channel: status & 0x0F,
            data1: bytes.get(1).copied().unwrap_or(0),
            data2: bytes.get(2).copied().unwrap_or(0),
        })
    }

    /// Narrow to a note view for Note On / Note Off messages.
    pub fn as_note(&self) -> Option<MidiNoteMessage> {
        match self.kind {
            MidiMessageKind::NoteOn | MidiMessageKind::NoteOff => Some(MidiNoteMessage {
                delta_time: self.delta_time,
                kind: self.kind,
                channel: self.channel,
                note_number: self.data1,
                velocity: self.data2,
            }),
            _ => None,
        }
    }

    /// Narrow to a control view for Control Change messages.
    pub fn as_control(&self) -> Option<MidiControlMessage> {
        match self.kind {
            MidiMessageKind::ControlChange => Some(MidiControlMessage {
                delta_time: self.delta_time,
                channel: self.channel,
                controller_number: self.data1,
                controller_value: self.data2,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MidiMessage(Status=0x{:02X}, Type={}, Channel={}, Data1={}, Data2={})",
            self.status, self.kind, self.channel, self.data1, self.data2
        )
    }
}

/// Typed view of a Note On / Note Off message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MidiNoteMessage {
    pub delta_time: f64,
    pub kind: MidiMessageKind,
    pub channel: u8,
    pub note_number: u8,
    pub velocity: u8,
}

impl fmt::Display for MidiNoteMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MidiNoteMessage(Type={}, Channel={}, Note={}, Velocity={})",
            self.kind, self.channel, self.note_number, self.velocity
        )
    }
}

/// Typed view of a Control Change message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MidiControlMessage {
    pub delta_time: f64,
    pub channel: u8,
    pub controller_number: u8,
    pub controller_value: u8,
}

impl fmt::Display for MidiControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MidiControlMessage(Channel={}, Controller={}, Value={})",
            self.channel, self.controller_number, self.controller_value
        )
    }
}

/// MIDI note number of middle C.
pub const MIDDLE_C: u8 = 60;

const NOTE_NAMES: [&str; 12] = [
    "A", "A#", "B", "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#",
];

/// Name for a MIDI note number, for the named range A1 (21) through
/// G#9 (127). Numbers below the named range yield `None`.
///
/// The octave-8 run has no C#8: 108 is C8 and 109 is D8, so every
/// name from 109 up sits one step later in the chromatic cycle.
pub fn note_name(note: u8) -> Option<String> {
    if note < 21 {
        return None;
    }
    let mut offset = (note - 21) as usize;
    if note >= 109 {
        offset += 1;
    }
    Some(format!("{}{}", NOTE_NAMES[offset % 12], offset / 12 + 1))
}

/// Controller numbers of the Launchkey-Mini dialect used by the demo
/// programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MidiControl {
    Play,
    Record,
    ModulationWheel,
    Pot1,
    Pot2,
    Pot3,
    Pot4,
    Pot5,
    Pot6,
    Pot7,
    Pot8,
    PreviousTrack,
    NextTrack,
    Up,
    Down,
}

/// Controller value reported while a dialect button is held.
pub const CONTROL_PRESSED: u8 = 127;
/// Controller value reported when a dialect button is released.
pub const CONTROL_RELEASED: u8 = 0;

impl MidiControl {
    pub fn controller_number(self) -> u8 {
        match self {
            Self::Play => 115,
            Self::Record => 117,
            Self::ModulationWheel => 1,
            Self::Pot1 => 21,
            Self::Pot2 => 22,
            Self::Pot3 => 23,
            Self::Pot4 => 24,
            Self::Pot5 => 25,
            Self::Pot6 => 26,
            Self::Pot7 => 27,
            Self::Pot8 => 28,
            Self::PreviousTrack => 103,
            Self::NextTrack => 102,
            Self::Up => 104,
            Self::Down => 105,
        }
    }

    pub fn from_controller(number: u8) -> Option<Self> {
        const ALL: [MidiControl; 15] = [
            MidiControl::Play,
            MidiControl::Record,
            MidiControl::ModulationWheel,
            MidiControl::Pot1,
            MidiControl::Pot2,
            MidiControl::Pot3,
            MidiControl::Pot4,
            MidiControl::Pot5,
            MidiControl::Pot6,
            MidiControl::Pot7,
            MidiControl::Pot8,
            MidiControl::PreviousTrack,
            MidiControl::NextTrack,
            MidiControl::Up,
            MidiControl::Down,
        ];
        ALL.into_iter().find(|c| c.controller_number() == number)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Play => "Play",
            Self::Record => "Record",
            Self::ModulationWheel => "Modulation Wheel",
            Self::Pot1 => "Pot 1",
            Self::Pot2 => "Pot 2",
            Self::Pot3 => "Pot 3",
            Self::Pot4 => "Pot 4",
            Self::Pot5 => "Pot 5",
            Self::Pot6 => "Pot 6",
            Self::Pot7 => "Pot 7",
            Self::Pot8 => "Pot 8",
            Self::PreviousTrack => "Previous Track",
            Self::NextTrack => "Next Track",
            Self::Up => "Up",
            Self::Down => "Down",
        }
    }
}
