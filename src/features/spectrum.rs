//! Short-time spectral analysis
//!
//! Centred STFT power spectrum, log compression and the orthonormal DCT-II
//! used to turn mel energies into cepstral coefficients.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Smallest power admitted to the log, in linear units
const AMIN: f64 = 1e-10;

/// Dynamic range kept below the loudest cell of a spectrogram
const TOP_DB: f64 = 80.0;

/// Periodic Hann window of length `n`
pub fn hann_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / n as f32).cos())
        .collect()
}

/// Number of frames a centred STFT produces for `len` samples
pub fn frame_count(len: usize, n_fft: usize, hop_length: usize) -> usize {
    let padded = len + 2 * (n_fft / 2);
    if padded < n_fft {
        return 0;
    }
    1 + (padded - n_fft) / hop_length
}

/// Power spectrogram with frames centred on multiples of the hop length
///
/// The signal is treated as zero outside its bounds, which is the same as
/// zero-padding `n_fft / 2` samples on each side.
pub struct Stft {
    n_fft: usize,
    hop_length: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl Stft {
    pub fn new(n_fft: usize, hop_length: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n_fft);

        Stft {
            n_fft,
            hop_length,
            window: hann_window(n_fft),
            fft,
        }
    }

    /// Bins per frame (`1 + n_fft / 2`)
    pub fn n_bins(&self) -> usize {
        1 + self.n_fft / 2
    }

    /// Call `visit` with the power spectrum of every frame in order
    pub fn for_each_power_frame<F>(&self, samples: &[f32], mut visit: F)
    where
        F: FnMut(&[f64]),
    {
        let pad = self.n_fft / 2;
        let frames = frame_count(samples.len(), self.n_fft, self.hop_length);

        let mut buffer = vec![Complex::new(0.0_f32, 0.0); self.n_fft];
        let mut scratch = vec![Complex::new(0.0_f32, 0.0); self.fft.get_inplace_scratch_len()];
        let mut power = vec![0.0_f64; self.n_bins()];

        for frame in 0..frames {
            let start = frame * self.hop_length;
            for (j, (slot, &w)) in buffer.iter_mut().zip(&self.window).enumerate() {
                let sample = (start + j)
                    .checked_sub(pad)
                    .and_then(|idx| samples.get(idx))
                    .copied()
                    .unwrap_or(0.0);
                *slot = Complex::new(sample * w, 0.0);
            }

            self.fft.process_with_scratch(&mut buffer, &mut scratch);

            for (p, c) in power.iter_mut().zip(&buffer) {
                *p = c.norm_sqr() as f64;
            }
            visit(&power);
        }
    }
}

/// Convert power values to decibels in place
///
/// Values are floored at `AMIN` before the log and then at `TOP_DB` below
/// the maximum over the whole slice.
pub fn power_to_db(values: &mut [f64]) {
    let mut max_db = f64::NEG_INFINITY;
    for v in values.iter_mut() {
        *v = 10.0 * v.max(AMIN).log10();
        max_db = max_db.max(*v);
    }

    let floor = max_db - TOP_DB;
    for v in values.iter_mut() {
        *v = v.max(floor);
    }
}

/// Orthonormal DCT-II restricted to its first `n_out` coefficients
#[derive(Debug, Clone)]
pub struct Dct {
    basis: Vec<Vec<f64>>,
}

impl Dct {
    pub fn new(n_in: usize, n_out: usize) -> Self {
        let n = n_in as f64;
        let basis = (0..n_out)
            .map(|k| {
                let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
                (0..n_in)
                    .map(|m| {
                        scale
                            * (std::f64::consts::PI * k as f64 * (2.0 * m as f64 + 1.0) / (2.0 * n))
                                .cos()
                    })
                    .collect()
            })
            .collect();

        Dct { basis }
    }

    pub fn transform(&self, input: &[f64], out: &mut [f64]) {
        for (row, coeff) in self.basis.iter().zip(out.iter_mut()) {
            *coeff = row.iter().zip(input).map(|(b, x)| b * x).sum();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use test_case::test_case;

    #[test_case(0, 2048, 512 => 1 ; "empty signal still yields the padded frame")]
    #[test_case(512, 2048, 512 => 2 ; "one hop")]
    #[test_case(48000, 2048, 512 => 94 ; "one second at 48k")]
    #[test_case(100, 2048, 512 => 1 ; "shorter than a window")]
    fn test_frame_count(len: usize, n_fft: usize, hop: usize) -> usize {
        frame_count(len, n_fft, hop)
    }

    #[test]
    fn test_hann_window_is_periodic() {
        let w = hann_window(8);
        assert_relative_eq!(w[0], 0.0);
        assert_relative_eq!(w[4], 1.0, epsilon = 1e-6);
        // Periodic window: w[1] == w[7]
        assert_relative_eq!(w[1], w[7], epsilon = 1e-6);
    }

    #[test]
    fn test_stft_locates_sine_peak() {
        let sr = 8000.0_f32;
        let n_fft = 256;
        // 1000 Hz lands exactly on bin 32
        let samples: Vec<f32> = (0..2048)
            .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / sr).sin())
            .collect();

        let stft = Stft::new(n_fft, 64);
        let mut peaks = Vec::new();
        stft.for_each_power_frame(&samples, |power| {
            let (bin, _) = power
                .iter()
                .enumerate()
                .fold((0, f64::MIN), |best, (i, &p)| if p > best.1 { (i, p) } else { best });
            peaks.push(bin);
        });

        assert_eq!(peaks.len(), frame_count(2048, n_fft, 64));
        // Interior frames see the full window
        assert!(peaks[4..peaks.len() - 4].iter().all(|&b| b == 32));
    }

    #[test]
    fn test_power_to_db_floors_silence() {
        let mut values = vec![0.0, 0.0, 0.0];
        power_to_db(&mut values);
        assert!(values.iter().all(|&v| (v + 100.0).abs() < 1e-9));
    }

    #[test]
    fn test_power_to_db_applies_top_db() {
        let mut values = vec![1.0, 1e-12];
        power_to_db(&mut values);
        assert_relative_eq!(values[0], 0.0);
        assert_relative_eq!(values[1], -80.0);
    }

    #[test]
    fn test_dct_of_constant_is_dc_only() {
        let dct = Dct::new(16, 4);
        let mut out = vec![0.0; 4];
        dct.transform(&[1.0; 16], &mut out);

        assert_relative_eq!(out[0], 4.0, epsilon = 1e-12);
        for &c in &out[1..] {
            assert!(c.abs() < 1e-12);
        }
    }
}
