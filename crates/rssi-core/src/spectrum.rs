// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Block-level spectral transform.
//!
//! Turns one block of complex baseband samples into a frequency-centered
//! log-magnitude spectrum plus the average linear power of the block.

use num_complex::Complex;
use rustfft::FftPlanner;

/// Floor added to every magnitude (and to block power) before taking a logarithm.
pub const MAGNITUDE_FLOOR: f64 = 1e-12;

/// Approximate offset turning relative log power into a dBm-like figure.
pub const RSSI_OFFSET_DB: f64 = 30.0;

/// Spectrum derived from a single sample block.
///
/// `magnitudes_db` and `frequency_axis` always have the same length as the
/// block that produced them. Index `i` of both refers to the same bin.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFrame {
    /// 20·log10(|X[k]| + ε) per bin, zero frequency at the middle index.
    pub magnitudes_db: Vec<f64>,
    /// Bin offsets in Hz relative to the center frequency.
    pub frequency_axis: Vec<f64>,
    /// Mean of |x[n]|² over the block.
    pub power_linear_avg: f64,
}

impl SpectrumFrame {
    /// Number of bins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.magnitudes_db.len()
    }

    /// True when the frame was built from an empty block.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.magnitudes_db.is_empty()
    }

    /// Uncalibrated received signal strength of the whole block.
    #[must_use]
    pub fn rssi_dbm(&self) -> f64 {
        rssi_dbm(self.power_linear_avg)
    }

    /// Strongest bin value, or `None` for an empty frame.
    #[must_use]
    pub fn peak_power_db(&self) -> Option<f64> {
        self.magnitudes_db.iter().copied().reduce(f64::max)
    }
}

/// N evenly spaced offsets spanning `[-sample_rate/2, +sample_rate/2]`, both ends included.
#[allow(
    clippy::cast_precision_loss,
    reason = "block sizes are at most 8192 and fit an f64 exactly"
)]
#[must_use]
pub fn frequency_axis(sample_rate: f64, len: usize) -> Vec<f64> {
    let half = sample_rate / 2.0;
    match len {
        0 => Vec::new(),
        1 => vec![-half],
        _ => {
            let step = sample_rate / (len - 1) as f64;
            (0..len)
                .map(|i| {
                    // Fill from both ends so the axis stays symmetric in floating point
                    if 2 * i < len {
                        -half + i as f64 * step
                    } else {
                        half - (len - 1 - i) as f64 * step
                    }
                })
                .collect()
        }
    }
}

/// Mean of squared magnitudes. Zero for an empty block.
#[allow(
    clippy::cast_precision_loss,
    reason = "block sizes are at most 8192 and fit an f64 exactly"
)]
#[must_use]
pub fn mean_power(samples: &[Complex<f32>]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let total: f64 = samples
        .iter()
        .map(|s| f64::from(s.re).powi(2) + f64::from(s.im).powi(2))
        .sum();
    total / samples.len() as f64
}

/// Convert linear block power to the relative RSSI figure.
#[must_use]
pub fn rssi_dbm(power_linear: f64) -> f64 {
    10.0 * power_linear.max(MAGNITUDE_FLOOR).log10() + RSSI_OFFSET_DB
}

/// Forward FFT with plan caching across blocks of the same size.
pub struct SpectralTransform {
    planner: FftPlanner<f64>,
    scratch: Vec<Complex<f64>>,
}

impl std::fmt::Debug for SpectralTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralTransform")
            .field("scratch_len", &self.scratch.len())
            .finish_non_exhaustive()
    }
}

impl Default for SpectralTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectralTransform {
    /// Create a transform with an empty plan cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
            scratch: Vec::new(),
        }
    }

    /// Compute the spectrum frame of `block` sampled at `sample_rate` Hz.
    ///
    /// Never fails. Exact-zero bins land on `20·log10(ε)` instead of -∞.
    pub fn transform(&mut self, block: &[Complex<f32>], sample_rate: f64) -> SpectrumFrame {
        let n = block.len();
        let power_linear_avg = mean_power(block);

        if n == 0 {
            return SpectrumFrame {
                magnitudes_db: Vec::new(),
                frequency_axis: Vec::new(),
                power_linear_avg,
            };
        }

        self.scratch.clear();
        self.scratch.extend(
            block
                .iter()
                .map(|s| Complex::new(f64::from(s.re), f64::from(s.im))),
        );

        let fft = self.planner.plan_fft_forward(n);
        fft.process(&mut self.scratch);

        // Center the spectrum: bin 0 (DC) moves to index n/2
        self.scratch.rotate_right(n / 2);

        let magnitudes_db = self
            .scratch
            .iter()
            .map(|bin| 20.0 * (bin.norm() + MAGNITUDE_FLOOR).log10())
            .collect();

        SpectrumFrame {
            magnitudes_db,
            frequency_axis: frequency_axis(sample_rate, n),
            power_linear_avg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn tone(n: usize, cycles: f64, amplitude: f32) -> Vec<Complex<f32>> {
        (0..n)
            .map(|i| {
                let phase = 2.0 * PI * cycles * i as f64 / n as f64;
                Complex::new(phase.cos() as f32 * amplitude, phase.sin() as f32 * amplitude)
            })
            .collect()
    }

    #[test]
    fn test_frame_lengths_match_block() {
        let mut transform = SpectralTransform::new();
        for n in [1024, 2048, 4096, 8192] {
            let frame = transform.transform(&tone(n, 10.0, 0.5), 1e6);
            assert_eq!(frame.magnitudes_db.len(), n);
            assert_eq!(frame.frequency_axis.len(), n);
        }
    }

    #[test]
    fn test_frequency_axis_increasing_and_symmetric() {
        let axis = frequency_axis(10e6, 2048);
        assert_eq!(axis[0], -5e6);
        assert_eq!(axis[2047], 5e6);
        for pair in axis.windows(2) {
            assert!(pair[1] > pair[0]);
        }
        for i in 0..axis.len() {
            let mirrored = axis[axis.len() - 1 - i];
            assert!((axis[i] + mirrored).abs() < 1e-6);
        }
    }

    #[test]
    fn test_zero_block_hits_floor() {
        let mut transform = SpectralTransform::new();
        let frame = transform.transform(&vec![Complex::new(0.0, 0.0); 1024], 1e6);
        let floor = 20.0 * MAGNITUDE_FLOOR.log10();
        assert!(frame
            .magnitudes_db
            .iter()
            .all(|&m| m.is_finite() && (m - floor).abs() < 1e-9));
        assert_eq!(frame.power_linear_avg, 0.0);
        assert!(frame.rssi_dbm().is_finite());
    }

    #[test]
    fn test_dc_lands_in_middle_bin() {
        let mut transform = SpectralTransform::new();
        let block = vec![Complex::new(1.0, 0.0); 1024];
        let frame = transform.transform(&block, 1e6);
        let peak = frame
            .magnitudes_db
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, &m)| if m > best.1 { (i, m) } else { best });
        assert_eq!(peak.0, 512);
        // |X[0]| = N for a constant unit block
        assert!((peak.1 - 20.0 * 1024f64.log10()).abs() < 1e-6);
    }

    #[test]
    fn test_positive_tone_right_of_center() {
        let mut transform = SpectralTransform::new();
        let frame = transform.transform(&tone(1024, 100.0, 1.0), 1e6);
        let peak_index = frame
            .magnitudes_db
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, &m)| if m > best.1 { (i, m) } else { best })
            .0;
        assert_eq!(peak_index, 512 + 100);
        assert!(frame.frequency_axis[peak_index] > 0.0);
    }

    #[test]
    fn test_power_and_rssi() {
        let block = vec![Complex::new(0.6, 0.8); 256];
        assert!((mean_power(&block) - 1.0).abs() < 1e-6);
        assert!((rssi_dbm(1.0) - RSSI_OFFSET_DB).abs() < 1e-12);
        assert!((rssi_dbm(0.01) - 10.0).abs() < 1e-9);
    }
}
