//! Decoded sample asset

use std::fmt;
use std::path::PathBuf;

use crate::wav::WavFile;

/// A fully decoded audio sample, loaded by the control plane before
/// playback and shared read-only across processors.
pub struct Sample {
    pub name: String,
    pub path: PathBuf,
    pub sample_rate: u32,
    pub channels: u16,
    pub total_frames: usize,
    /// Interleaved f32 sample data, `total_frames * channels` long.
    pub data: Vec<f32>,
}

impl Sample {
    /// Decode an opened WAV file in full. The file is rewound first.
    pub fn from_wav(wav: &mut WavFile) -> Self {
        let channels = wav.channels();
        let expected_frames = wav.total_frames() as usize;

        if let Err(err) = wav.seek(0) {
            log::warn!("Sample: failed to rewind {}: {}", wav, err);
        }

        let mut data = vec![0.0f32; expected_frames * channels as usize];
        let read = wav.read_frames(&mut data, expected_frames);
        if read < expected_frames {
            log::warn!(
                "Sample: read {} of {} frames from {}",
                read,
                expected_frames,
                wav
            );
            data.truncate(read * channels as usize);
        }

        Self {
            name: wav.name(),
            path: wav.filepath().to_path_buf(),
            sample_rate: wav.sample_rate(),
            channels,
            total_frames: read,
            data,
        }
    }

    /// Build a sample from raw interleaved data (tests, generated
    /// content).
    pub fn from_data(name: &str, sample_rate: u32, channels: u16, data: Vec<f32>) -> Self {
        let total_frames = data.len() / channels as usize;
        Self {
            name: name.to_string(),
            path: PathBuf::new(),
            sample_rate,
            channels,
            total_frames,
            data,
        }
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sample(Name={}, SampleRate={}, Channels={}, TotalFrames={})",
            self.name, self.sample_rate, self.channels, self.total_frames
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wav::test_support::write_wav;

    #[test]
    fn decodes_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kick.wav");
        write_wav(&path, 44_100, 1, &[0.5, -0.5, 0.25, -0.25]);

        let mut wav = WavFile::open(&path).unwrap();
        let sample = Sample::from_wav(&mut wav);

        assert_eq!(sample.name, "kick");
        assert_eq!(sample.channels, 1);
        assert_eq!(sample.total_frames, 4);
        assert_eq!(sample.data.len(), 4);
        assert!((sample.data[0] - 0.5).abs() < 0.001);
    }
}
