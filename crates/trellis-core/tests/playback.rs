//! End-to-end playback over the callback dispatch path, without
//! device hardware: the tests stand in for the backend by invoking
//! the callback contexts the way a stream would.

use std::sync::{Arc, Mutex};

use trellis_core::audio::AudioCallbackContext;
use trellis_core::midi::{MidiCallbackContext, MidiMessageKind};
use trellis_core::ring;
use trellis_core::track::{AudioInputBinding, TrackManager};
use trellis_core::wav::WavFile;

fn write_wav(path: &std::path::Path, sample_rate: u32, channels: u16, samples: &[f32]) {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &sample in samples {
        writer
            .write_sample((sample.clamp(-1.0, 1.0) * 32767.0) as i16)
            .unwrap();
    }
    writer.finalize().unwrap();
}

#[test]
fn wav_playback_advances_statistics_batch_by_batch() {
    let manager = TrackManager::new();
    let track = manager.create_child_track(None);

    // A 2-second stereo file at 44.1kHz, as a short fixture: the
    // frame counts scale down, the bookkeeping is identical.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("loop.wav");
    let total_frames = 2048usize;
    let samples: Vec<f32> = (0..total_frames * 2).map(|i| (i % 100) as f32 / 200.0).collect();
    write_wav(&path, 44_100, 2, &samples);

    let wav = Arc::new(Mutex::new(WavFile::open(&path).unwrap()));
    track
        .add_audio_input(AudioInputBinding::File(wav.clone()))
        .unwrap();

    // Control plane at play(): preload, start, build the context from
    // the running planes.
    let plane = track.audio_dataplane();
    plane.preload_wav(&mut wav.lock().unwrap());
    plane.set_output_channels(2);
    plane.start();

    let context = AudioCallbackContext::new(manager.track_audio_dataplanes(), 2);
    assert_eq!(context.active_track_count(), 1);

    // Backend side: four callbacks of 512 frames each.
    let n_frames = 512usize;
    let mut out = vec![0.0f32; n_frames * 2];
    let mut last_frames = 0u64;
    for batch in 0..4 {
        let stream_time = (batch * n_frames) as f64 / 44_100.0;
        context.render(&mut out, n_frames, stream_time);

        let stats = plane.stats();
        assert!(stats.total_frames_read > last_frames, "frames grow strictly");
        last_frames = stats.total_frames_read;
        assert_eq!(stats.total_batches, batch as u64 + 1, "one batch per callback");
    }

    let stats = plane.stats();
    assert_eq!(stats.total_frames_read, total_frames as u64);
    assert_eq!(plane.read_cursor(), total_frames);
    assert!(stats.throughput_frames_per_second > 0.0);
    assert_eq!(stats.underrun_count, 0);

    // First frame of the first batch came through verbatim.
    assert!(stats.min_batch_time_ms <= stats.max_batch_time_ms);
}

#[test]
fn mono_file_fans_out_to_stereo_device_buffer() {
    let manager = TrackManager::new();
    let track = manager.create_child_track(None);

    let plane = track.audio_dataplane();
    plane.preload_buffer(&[0.5, -0.5, 1.0, -1.0], 1);
    plane.set_output_channels(2);
    plane.start();

    let context = AudioCallbackContext::new(manager.track_audio_dataplanes(), 2);
    let mut out = vec![9.0f32; 8];
    context.render(&mut out, 4, 0.01);

    assert_eq!(out, vec![0.5, 0.5, -0.5, -0.5, 1.0, 1.0, -1.0, -1.0]);
}

#[test]
fn streaming_underrun_is_counted_and_zero_filled() {
    let manager = TrackManager::new();
    let track = manager.create_child_track(None);
    let plane = track.audio_dataplane();

    let (mut producer, consumer) = ring::with_capacity::<f32>(64);
    assert_eq!(producer.push_slice(&[0.3, 0.6]), 2);
    plane.attach_stream(consumer, 1);
    plane.set_output_channels(1);
    plane.start();

    let context = AudioCallbackContext::new(manager.track_audio_dataplanes(), 1);
    let mut out = vec![0.0f32; 8];
    context.render(&mut out, 8, 0.01);

    assert_eq!(&out[..2], &[0.3, 0.6]);
    assert!(out[2..].iter().all(|&s| s == 0.0));

    let stats = plane.stats();
    assert_eq!(stats.underrun_count, 6);
    assert_eq!(stats.total_frames_read, 8);

    // Producer-side overruns route into the same statistics block.
    plane.note_overruns(3);
    assert_eq!(plane.stats().overrun_count, 3);
}

#[test]
fn two_tracks_mix_additively_into_one_device_buffer() {
    let manager = TrackManager::new();
    let first = manager.create_child_track(None);
    let second = manager.create_child_track(None);

    first.audio_dataplane().preload_buffer(&[0.25; 4], 1);
    second.audio_dataplane().preload_buffer(&[0.5; 4], 1);
    for track in [&first, &second] {
        let plane = track.audio_dataplane();
        plane.set_output_channels(1);
        plane.start();
    }

    let context = AudioCallbackContext::new(manager.track_audio_dataplanes(), 1);
    assert_eq!(context.active_track_count(), 2);

    let mut out = vec![0.0f32; 4];
    context.render(&mut out, 4, 0.01);
    for &sample in &out {
        assert!((sample - 0.75).abs() < 1e-6);
    }
}

#[test]
fn midi_note_on_flows_from_raw_bytes_to_track_callback() {
    let manager = TrackManager::new();
    let track = manager.create_child_track(None);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    track.set_midi_note_on_callback(Box::new(move |note| {
        sink.lock()
            .unwrap()
            .push((note.kind, note.channel, note.note_number, note.velocity));
    }));
    track.midi_dataplane().start();

    let mut context = MidiCallbackContext::new(manager.track_midi_dataplanes());
    context.dispatch(0, &[0x92, 60, 100]);

    assert_eq!(
        seen.lock().unwrap().as_slice(),
        &[(MidiMessageKind::NoteOn, 2, 60, 100)]
    );
    assert_eq!(
        track.statistics().midi_input.total_messages_processed,
        1
    );
}

#[test]
fn stop_clears_preloaded_source() {
    let manager = TrackManager::new();
    let track = manager.create_child_track(None);

    let plane = track.audio_dataplane();
    plane.preload_buffer(&[0.5; 8], 2);
    plane.set_output_channels(2);
    plane.start();
    plane.stop();

    // Restart without re-preloading: nothing left to play.
    plane.start();
    let context = AudioCallbackContext::new(manager.track_audio_dataplanes(), 2);
    let mut out = vec![1.0f32; 8];
    context.render(&mut out, 4, 0.01);
    assert!(out.iter().all(|&s| s == 0.0), "buffer zeroed, no source mixed in");
}
