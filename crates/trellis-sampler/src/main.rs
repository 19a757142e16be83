//! Trellis sampler demo
//!
//! Loads WAV drum samples from a directory, maps them to ascending
//! MIDI notes starting at middle C, binds a MIDI input device and
//! plays them through the default (or selected) audio output.
//!
//! ## Command line flags
//!
//! - `--list-midi-devices` / `-lm`, `--list-audio-devices` / `-la`
//! - `--set-midi-input <id>` / `-i`, `--set-audio-output <id>` / `-o`
//! - `--list-samples` / `-ls`, `--verbose` / `-vb`

mod cli;

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context};

use trellis_core::logging::{self, LogConfig};
use trellis_core::midi::{self, MidiControl, CONTROL_RELEASED, MIDDLE_C};
use trellis_core::processor::{Sample, SamplePlayer, SharedProcessor};
use trellis_core::wav::WavFile;
use trellis_core::Engine;

use cli::{Cli, Command};

const PROGRAM_NAME: &str = "trellis-sampler";
const ABOUT: &str = "A MIDI-driven drum sampler built on the trellis audio engine";
const SAMPLE_FOLDER: &str = "samples";
const LOG_FILE: &str = "trellis-sampler.log";

#[derive(Default)]
struct Options {
    midi_input_id: Option<usize>,
    audio_output_id: Option<u32>,
    verbose: bool,
    list_midi: bool,
    list_audio: bool,
    list_samples: bool,
}

fn parse_args() -> Options {
    let options = RefCell::new(Options::default());
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut cli = Cli::new(
        PROGRAM_NAME,
        ABOUT,
        env!("CARGO_PKG_VERSION"),
        vec![
            Command::new("--list-midi-devices", "-lm", "List MIDI input devices", |_| {
                options.borrow_mut().list_midi = true;
            }),
            Command::new("--list-audio-devices", "-la", "List audio devices", |_| {
                options.borrow_mut().list_audio = true;
            }),
            Command::with_value("--set-midi-input", "-i", "MIDI input device id", |value| {
                match value.and_then(|v| v.parse().ok()) {
                    Some(id) => options.borrow_mut().midi_input_id = Some(id),
                    None => eprintln!("--set-midi-input needs a numeric device id"),
                }
            }),
            Command::with_value("--set-audio-output", "-o", "Audio output device id", |value| {
                match value.and_then(|v| v.parse().ok()) {
                    Some(id) => options.borrow_mut().audio_output_id = Some(id),
                    None => eprintln!("--set-audio-output needs a numeric device id"),
                }
            }),
            Command::new("--list-samples", "-ls", "List WAV files in the sample folder", |_| {
                options.borrow_mut().list_samples = true;
            }),
            Command::new("--verbose", "-vb", "Log to the console", |_| {
                options.borrow_mut().verbose = true;
            }),
        ],
    );
    cli.parse(&args);
    drop(cli);

    options.into_inner()
}

fn list_wav_files(directory: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(err) => {
            log::error!("Cannot read sample folder {}: {}", directory.display(), err);
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case("wav"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

fn run(options: Options) -> anyhow::Result<()> {
    let engine = Engine::new();

    if options.list_midi {
        for port in engine.devices().midi_inputs().context("listing MIDI devices")? {
            println!("{}", port);
        }
        return Ok(());
    }

    if options.list_audio {
        for device in engine.devices().audio_devices().context("listing audio devices")? {
            println!("{}", device);
        }
        return Ok(());
    }

    if options.list_samples {
        println!("WAV samples in {}:", SAMPLE_FOLDER);
        for file in list_wav_files(Path::new(SAMPLE_FOLDER)) {
            println!("  {}", file.display());
        }
        return Ok(());
    }

    // Wire the track graph: one child track carrying the sampler.
    let track = engine.tracks().create_child_track(None);
    let main_track = engine.tracks().main_track();

    let output_device = match options.audio_output_id {
        Some(id) => engine.devices().audio_device(id)?,
        None => engine
            .devices()
            .default_audio_output_device()
            .ok_or_else(|| anyhow!("no default audio output device found"))?,
    };
    println!("Audio output: {}", output_device.name);
    main_track.set_audio_output_device(output_device)?;

    let midi_input = match options.midi_input_id {
        Some(id) => engine.devices().midi_input(id)?,
        None => engine
            .devices()
            .default_midi_input()
            .ok_or_else(|| anyhow!("no MIDI input device found"))?,
    };
    println!("MIDI input: {}", midi_input.name);
    track.add_midi_input(midi_input)?;

    // The sampler processor, shared between the track and this setup
    // code.
    let player = Arc::new(Mutex::new(SamplePlayer::new()));
    let shared: SharedProcessor = player.clone();
    track.add_processor(shared);

    // Map samples to notes from middle C upward.
    let files = list_wav_files(Path::new(SAMPLE_FOLDER));
    if files.is_empty() {
        return Err(anyhow!("no WAV samples found in {}", SAMPLE_FOLDER));
    }
    let mut note = MIDDLE_C;
    for file in &files {
        let mut wav = WavFile::open(file).with_context(|| format!("loading {}", file.display()))?;
        let sample = Arc::new(Sample::from_wav(&mut wav));
        println!(
            "Mapped {} to note {} ({})",
            sample.name,
            note,
            midi::note_name(note).unwrap_or_default()
        );
        player.lock().unwrap().add_sample(note, sample);
        note = note.saturating_add(1);
    }

    // Surface incoming MIDI on the console, the dialect buttons by
    // name.
    track.set_midi_note_on_callback(Box::new(|note| {
        println!("Note On: {}", note);
    }));
    track.set_midi_note_off_callback(Box::new(|note| {
        println!("Note Off: {}", note);
    }));
    track.set_midi_control_change_callback(Box::new(|control| {
        if control.controller_value == CONTROL_RELEASED {
            return;
        }
        match MidiControl::from_controller(control.controller_number) {
            Some(button) => println!("Control: {} ({})", button.name(), control.controller_value),
            None => println!("Control Change: {}", control),
        }
    }));

    track.play()?;
    println!("Playing. Press Enter to stop.");

    let mut line = String::new();
    let _ = std::io::stdin().read_line(&mut line);

    track.stop()?;
    println!("{}", track.statistics());
    Ok(())
}

fn main() {
    let options = parse_args();

    let log_config = LogConfig {
        console: options.verbose,
        log_file: Some(PathBuf::from(LOG_FILE)),
        ..LogConfig::default()
    };
    if let Err(err) = logging::init(log_config) {
        eprintln!("Failed to initialize logging: {}", err);
    }
    logging::set_thread_name("sampler");

    if let Err(err) = run(options) {
        log::error!("{}: {:#}", PROGRAM_NAME, err);
        eprintln!("{}: {:#}", PROGRAM_NAME, err);
        std::process::exit(-1);
    }
}
