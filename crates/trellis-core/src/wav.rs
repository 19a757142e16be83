//! WAV file reading
//!
//! Thin wrapper over `hound` exposing the loader contract the data
//! planes consume: frame-addressed seeking and bulk reads into a
//! caller-provided interleaved f32 buffer, with integer formats
//! normalized to [-1.0, 1.0]. Sources are expected to match the
//! device rate; no resampling happens here.

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Errors from opening or reading a WAV file.
#[derive(Debug, thiserror::Error)]
pub enum WavError {
    #[error("failed to open WAV file {path}: {source}")]
    Open {
        path: String,
        source: hound::Error,
    },

    #[error("unsupported bit depth: {0}")]
    UnsupportedBitDepth(u16),

    #[error("seek failed: {0}")]
    Seek(#[from] std::io::Error),
}

/// A WAV file opened for streaming or preloading.
pub struct WavFile {
    path: PathBuf,
    reader: hound::WavReader<BufReader<File>>,
    spec: hound::WavSpec,
    total_frames: u64,
}

impl WavFile {
    /// Open a WAV file for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WavError> {
        let path = path.as_ref().to_path_buf();
        let reader = hound::WavReader::open(&path).map_err(|source| WavError::Open {
            path: path.display().to_string(),
            source,
        })?;
        let spec = reader.spec();

        match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Float, 32) => {}
            (hound::SampleFormat::Int, 8 | 16 | 24 | 32) => {}
            (_, bits) => return Err(WavError::UnsupportedBitDepth(bits)),
        }

        let total_frames = reader.duration() as u64;

        log::debug!(
            "Opened WAV file {} ({} Hz, {} ch, {} frames, {} bit)",
            path.display(),
            spec.sample_rate,
            spec.channels,
            total_frames,
            spec.bits_per_sample
        );

        Ok(Self {
            path,
            reader,
            spec,
            total_frames,
        })
    }

    pub fn filepath(&self) -> &Path {
        &self.path
    }

    /// File name without extension, used to label samples.
    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.spec.channels
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.spec.bits_per_sample
    }

    /// Total length of the file in frames (samples per channel).
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Seek to an absolute frame position.
    pub fn seek(&mut self, frame: u64) -> Result<(), WavError> {
        self.reader.seek(frame as u32)?;
        Ok(())
    }

    /// Read up to `frames` frames into `out` as interleaved f32.
    ///
    /// `out` must hold at least `frames * channels` samples. Returns
    /// the number of frames actually read; fewer than requested means
    /// the end of the file was reached.
    pub fn read_frames(&mut self, out: &mut [f32], frames: usize) -> usize {
        let channels = self.spec.channels as usize;
        let wanted = frames * channels;
        assert!(out.len() >= wanted, "output buffer too small for read");

        let read = match (self.spec.sample_format, self.spec.bits_per_sample) {
            (hound::SampleFormat::Float, _) => {
                let mut count = 0;
                for sample in self.reader.samples::<f32>().take(wanted) {
                    match sample {
                        Ok(value) => {
                            out[count] = value;
                            count += 1;
                        }
                        Err(err) => {
                            log::warn!("WAV read error in {}: {}", self.path.display(), err);
                            break;
                        }
                    }
                }
                count
            }
            (hound::SampleFormat::Int, bits) => {
                let scale = 1.0 / (1i64 << (bits - 1)) as f32;
                let mut count = 0;
                for sample in self.reader.samples::<i32>().take(wanted) {
                    match sample {
                        Ok(value) => {
                            out[count] = value as f32 * scale;
                            count += 1;
                        }
                        Err(err) => {
                            log::warn!("WAV read error in {}: {}", self.path.display(), err);
                            break;
                        }
                    }
                }
                count
            }
        };

        read / channels
    }
}

impl fmt::Display for WavFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "WavFile({}, {} Hz, {} ch, {} frames)",
            self.path.display(),
            self.spec.sample_rate,
            self.spec.channels,
            self.total_frames
        )
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;

    /// Write a 16-bit PCM WAV fixture.
    pub fn write_wav(path: &Path, sample_rate: u32, channels: u16, samples: &[f32]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &sample in samples {
            let value = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
            writer.write_sample(value).unwrap();
        }
        writer.finalize().unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::write_wav;
    use super::*;

    #[test]
    fn reads_back_written_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 44_100, 2, &[0.0, 0.25, 0.5, -0.5, 1.0, -1.0]);

        let mut wav = WavFile::open(&path).unwrap();
        assert_eq!(wav.sample_rate(), 44_100);
        assert_eq!(wav.channels(), 2);
        assert_eq!(wav.total_frames(), 3);
        assert_eq!(wav.name(), "tone");

        let mut buffer = vec![0.0f32; 6];
        let read = wav.read_frames(&mut buffer, 3);
        assert_eq!(read, 3);
        assert!((buffer[1] - 0.25).abs() < 0.001);
        assert!((buffer[4] - 1.0).abs() < 0.001);
        assert!((buffer[5] + 1.0).abs() < 0.001);
    }

    #[test]
    fn short_read_reports_actual_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.wav");
        write_wav(&path, 48_000, 1, &[0.1, 0.2]);

        let mut wav = WavFile::open(&path).unwrap();
        let mut buffer = vec![0.0f32; 8];
        let read = wav.read_frames(&mut buffer, 8);
        assert_eq!(read, 2);
    }

    #[test]
    fn seek_rewinds_to_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seek.wav");
        write_wav(&path, 44_100, 1, &[0.1, 0.2, 0.3, 0.4]);

        let mut wav = WavFile::open(&path).unwrap();
        let mut buffer = vec![0.0f32; 4];
        assert_eq!(wav.read_frames(&mut buffer, 4), 4);

        wav.seek(1).unwrap();
        let mut again = vec![0.0f32; 2];
        assert_eq!(wav.read_frames(&mut again, 2), 2);
        assert!((again[0] - 0.2).abs() < 0.001);
        assert!((again[1] - 0.3).abs() < 0.001);
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let result = WavFile::open("/nonexistent/missing.wav");
        assert!(matches!(result, Err(WavError::Open { .. })));
    }
}
