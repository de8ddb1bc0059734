//! Mel filter bank
//!
//! Triangular filters spaced evenly on the Slaney mel scale (linear below
//! 1 kHz, logarithmic above) with area normalisation, so that each filter
//! integrates to roughly the same energy regardless of its width.

/// Hz per mel in the linear region of the Slaney scale
const F_SP: f64 = 200.0 / 3.0;

/// Frequency where the scale turns logarithmic
const MIN_LOG_HZ: f64 = 1000.0;

/// Mel value at `MIN_LOG_HZ`
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

/// Convert a frequency in Hz to Slaney mels
pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

/// Convert Slaney mels back to Hz
pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

#[inline]
fn log_step() -> f64 {
    6.4_f64.ln() / 27.0
}

/// One triangular filter, stored from its first non-zero bin
#[derive(Debug, Clone)]
struct MelFilter {
    start: usize,
    weights: Vec<f64>,
}

/// Bank of `n_mels` filters over a `1 + n_fft / 2` bin power spectrum
#[derive(Debug, Clone)]
pub struct MelFilterBank {
    filters: Vec<MelFilter>,
    n_bins: usize,
}

impl MelFilterBank {
    /// Build the filter bank
    ///
    /// # Arguments
    /// * `sample_rate` - Sample rate of the analysed signal
    /// * `n_fft` - FFT size the spectrum was computed with
    /// * `n_mels` - Number of filters
    /// * `fmin` / `fmax` - Outer edges of the first and last filter in Hz
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize, fmin: f64, fmax: f64) -> Self {
        let n_bins = 1 + n_fft / 2;
        let bin_hz = sample_rate as f64 / n_fft as f64;

        let mel_min = hz_to_mel(fmin);
        let mel_max = hz_to_mel(fmax);
        let edges: Vec<f64> = (0..n_mels + 2)
            .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (n_mels + 1) as f64))
            .collect();

        let filters = (0..n_mels)
            .map(|m| {
                let (left, center, right) = (edges[m], edges[m + 1], edges[m + 2]);
                let norm = 2.0 / (right - left);

                let dense: Vec<f64> = (0..n_bins)
                    .map(|bin| {
                        let freq = bin as f64 * bin_hz;
                        let rising = (freq - left) / (center - left);
                        let falling = (right - freq) / (right - center);
                        rising.min(falling).max(0.0) * norm
                    })
                    .collect();

                let start = dense.iter().position(|&w| w > 0.0).unwrap_or(n_bins);
                let end = dense
                    .iter()
                    .rposition(|&w| w > 0.0)
                    .map_or(start, |last| last + 1);

                MelFilter {
                    start,
                    weights: dense[start..end].to_vec(),
                }
            })
            .collect();

        MelFilterBank { filters, n_bins }
    }

    pub fn n_mels(&self) -> usize {
        self.filters.len()
    }

    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    /// Project one power spectrum frame onto the mel bands
    pub fn apply(&self, power: &[f64], out: &mut [f64]) {
        debug_assert_eq!(power.len(), self.n_bins);
        for (filter, energy) in self.filters.iter().zip(out.iter_mut()) {
            *energy = filter
                .weights
                .iter()
                .zip(&power[filter.start..])
                .map(|(w, p)| w * p)
                .sum();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mel_scale_linear_region() {
        assert_relative_eq!(hz_to_mel(0.0), 0.0);
        assert_relative_eq!(hz_to_mel(500.0), 7.5, epsilon = 1e-12);
        assert_relative_eq!(hz_to_mel(1000.0), 15.0, epsilon = 1e-12);
    }

    #[test]
    fn test_mel_scale_round_trip() {
        for hz in [50.0, 999.0, 1000.0, 4000.0, 16000.0, 24000.0] {
            assert_relative_eq!(mel_to_hz(hz_to_mel(hz)), hz, max_relative = 1e-10);
        }
    }

    #[test]
    fn test_filter_bank_shape() {
        let bank = MelFilterBank::new(48000, 2048, 128, 0.0, 24000.0);
        assert_eq!(bank.n_mels(), 128);
        assert_eq!(bank.n_bins(), 1025);
    }

    #[test]
    fn test_filters_are_non_negative_and_ordered() {
        let bank = MelFilterBank::new(48000, 2048, 40, 0.0, 24000.0);

        let mut last_start = 0;
        for filter in &bank.filters {
            assert!(filter.weights.iter().all(|&w| w >= 0.0));
            assert!(filter.start >= last_start);
            last_start = filter.start;
        }
    }

    #[test]
    fn test_apply_picks_up_energy_in_band() {
        let bank = MelFilterBank::new(16000, 512, 20, 0.0, 8000.0);
        let mut power = vec![0.0; bank.n_bins()];
        // Single bin of energy near 4 kHz
        power[128] = 1.0;

        let mut out = vec![0.0; bank.n_mels()];
        bank.apply(&power, &mut out);

        let active = out.iter().filter(|&&e| e > 0.0).count();
        assert!(active >= 1 && active <= 2, "energy spread over {} bands", active);
        assert_eq!(out[0], 0.0);
    }
}
