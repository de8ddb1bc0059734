//! Audio file I/O for wavclass
//!
//! Decodes WAV files into a mono [`Waveform`] at a fixed target rate. Integer
//! PCM of any supported bit depth and 32-bit float are normalised to
//! `[-1.0, 1.0)`, channels are averaged, and the result is resampled by
//! linear interpolation.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::{ClassifyError, Result};

/// Mono floating-point audio with its sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Waveform {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Return this waveform at `target_rate`, resampling only when needed
    pub fn resampled(self, target_rate: u32) -> Waveform {
        if self.sample_rate == target_rate || self.samples.is_empty() {
            return Waveform {
                samples: self.samples,
                sample_rate: target_rate,
            };
        }

        let ratio = target_rate as f64 / self.sample_rate as f64;
        Waveform {
            samples: resample_linear(&self.samples, ratio),
            sample_rate: target_rate,
        }
    }
}

/// Decode a WAV file and resample it to `target_rate`
///
/// # Arguments
/// * `path` - Path to the WAV file
/// * `target_rate` - Sample rate of the returned waveform
///
/// # Errors
/// * `FileNotFound` - If the file does not exist
/// * `Decode` - If the file is not a readable WAV file
/// * `UnsupportedFormat` - If the header describes an unsupported bit depth
pub fn load_waveform(path: &Path, target_rate: u32) -> Result<Waveform> {
    if !path.exists() {
        return Err(ClassifyError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let reader = WavReader::open(path)
        .map_err(|e| ClassifyError::decode(path, "failed to open WAV file", e))?;

    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(ClassifyError::Decode {
            path: path.to_path_buf(),
            reason: "header declares zero channels".to_string(),
            source: None,
        });
    }
    if spec.sample_rate == 0 {
        return Err(ClassifyError::Decode {
            path: path.to_path_buf(),
            reason: "header declares a zero sample rate".to_string(),
            source: None,
        });
    }

    let interleaved = read_samples_as_f32(reader, spec, path)?;
    let mono = downmix(&interleaved, channels);

    Ok(Waveform::new(mono, spec.sample_rate).resampled(target_rate))
}

/// Write a waveform to a mono WAV file
///
/// # Arguments
/// * `bit_depth` - 16 or 24 for integer PCM, 32 for float
pub fn save_waveform(waveform: &Waveform, path: &Path, bit_depth: u16) -> Result<()> {
    if !matches!(bit_depth, 16 | 24 | 32) {
        return Err(ClassifyError::UnsupportedFormat {
            format: format!("{}-bit audio (only 16, 24, 32 supported)", bit_depth),
        });
    }

    let spec = WavSpec {
        channels: 1,
        sample_rate: waveform.sample_rate,
        bits_per_sample: bit_depth,
        sample_format: if bit_depth == 32 {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    };

    let mut writer = WavWriter::create(path, spec).map_err(hound_to_io)?;

    match bit_depth {
        16 => {
            for &sample in &waveform.samples {
                let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer.write_sample(scaled).map_err(hound_to_io)?;
            }
        }
        24 => {
            for &sample in &waveform.samples {
                let scaled = (sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32;
                writer.write_sample(scaled).map_err(hound_to_io)?;
            }
        }
        _ => {
            for &sample in &waveform.samples {
                writer.write_sample(sample).map_err(hound_to_io)?;
            }
        }
    }

    writer.finalize().map_err(hound_to_io)?;
    Ok(())
}

/// Generate a mono sine tone
pub fn generate_test_tone(frequency: f32, duration_secs: f32, sample_rate: u32) -> Waveform {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;

    let samples = (0..num_samples)
        .map(|i| (angular_freq * i as f32).sin())
        .collect();

    Waveform::new(samples, sample_rate)
}

/// Generate an all-zero waveform
pub fn generate_silence(duration_secs: f32, sample_rate: u32) -> Waveform {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    Waveform::new(vec![0.0; num_samples], sample_rate)
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn hound_to_io(e: hound::Error) -> ClassifyError {
    match e {
        hound::Error::IoError(io) => ClassifyError::Io(io),
        other => ClassifyError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            other.to_string(),
        )),
    }
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    spec: WavSpec,
    path: &Path,
) -> Result<Vec<f32>> {
    match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| ClassifyError::decode(path, "failed to read float samples", e)),
        SampleFormat::Int => {
            let scale = match spec.bits_per_sample {
                8 => 128.0,
                16 => 32768.0,
                24 => 8388608.0,
                32 => 2147483648.0,
                other => {
                    return Err(ClassifyError::UnsupportedFormat {
                        format: format!("{}-bit integer audio", other),
                    })
                }
            };
            // hound widens every integer depth up to 32 bits into i32
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| (v as f64 / scale) as f32))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| {
                    ClassifyError::decode(
                        path,
                        format!("failed to read {}-bit samples", spec.bits_per_sample),
                        e,
                    )
                })
        }
    }
}

/// Average interleaved channels into one mono channel
fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return samples.to_vec();
    }

    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear interpolation resampling (aliases when downsampling)
fn resample_linear(samples: &[f32], ratio: f64) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let source_len = samples.len();
    let target_len = ((source_len as f64) * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(target_len);

    for i in 0..target_len {
        let src_pos = i as f64 / ratio;
        let src_idx = src_pos.floor() as usize;
        let frac = (src_pos - src_idx as f64) as f32;

        let sample = if src_idx + 1 < source_len {
            samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac
        } else if src_idx < source_len {
            samples[src_idx]
        } else {
            0.0
        };

        output.push(sample);
    }

    output
}

// ============================================================================
// Tests
// ============================================================================
