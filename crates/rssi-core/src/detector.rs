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

//! Dominant-frequency detection on a spectrum frame.

use serde::Serialize;

use crate::spectrum::SpectrumFrame;

/// A bin that cleared the detection threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
    /// Absolute frequency in Hz (center + offset).
    pub frequency_hz: f64,
    /// Offset in Hz from the center frequency.
    pub offset_hz: f64,
    /// Magnitude of the bin in dB.
    pub power_db: f64,
}

/// Outcome of running the detector on one frame.
///
/// `detection` is present exactly when the strongest bin exceeded the
/// threshold, so frequency fields cannot be read from a non-detection.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DetectionRecord {
    /// Index of the strongest bin (first one on ties). `None` for an empty frame.
    pub peak_index: Option<usize>,
    pub detection: Option<Detection>,
}

impl DetectionRecord {
    #[must_use]
    pub fn detected(&self) -> bool {
        self.detection.is_some()
    }
}

/// Locate the first index holding the maximum value.
#[must_use]
pub fn argmax(values: &[f64]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &value) in values.iter().enumerate() {
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((i, value)),
        }
    }
    best
}

/// Find the strongest bin and classify it against `threshold_db`.
///
/// Detection requires the peak to be strictly greater than the threshold.
#[must_use]
pub fn detect_dominant(
    frame: &SpectrumFrame,
    center_frequency_hz: f64,
    threshold_db: f64,
) -> DetectionRecord {
    let Some((index, peak_db)) = argmax(&frame.magnitudes_db) else {
        return DetectionRecord::default();
    };

    let detection = (peak_db > threshold_db).then(|| {
        let offset_hz = frame.frequency_axis[index];
        Detection {
            frequency_hz: center_frequency_hz + offset_hz,
            offset_hz,
            power_db: peak_db,
        }
    });

    DetectionRecord {
        peak_index: Some(index),
        detection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::frequency_axis;

    fn frame(magnitudes: Vec<f64>, sample_rate: f64) -> SpectrumFrame {
        let axis = frequency_axis(sample_rate, magnitudes.len());
        SpectrumFrame {
            magnitudes_db: magnitudes,
            frequency_axis: axis,
            power_linear_avg: 1.0,
        }
    }

    #[test]
    fn test_argmax_first_occurrence_on_tie() {
        assert_eq!(argmax(&[1.0, 5.0, 3.0, 5.0]), Some((1, 5.0)));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_detection_is_strictly_greater() {
        let f = frame(vec![10.0, 40.0, 20.0, 15.0, 12.0], 4.0);

        let at_peak = detect_dominant(&f, 868e6, 40.0);
        assert!(!at_peak.detected());
        assert_eq!(at_peak.peak_index, Some(1));

        let above_peak = detect_dominant(&f, 868e6, 55.0);
        assert!(!above_peak.detected());

        let below_peak = detect_dominant(&f, 868e6, 39.9);
        let detection = below_peak.detection.unwrap();
        // axis for 5 bins at 4 Hz: [-2, -1, 0, 1, 2]
        assert_eq!(detection.offset_hz, -1.0);
        assert_eq!(detection.frequency_hz, 868e6 - 1.0);
        assert_eq!(detection.power_db, 40.0);
    }

    #[test]
    fn test_empty_frame_never_detects() {
        let record = detect_dominant(&frame(Vec::new(), 1e6), 868e6, -100.0);
        assert_eq!(record, DetectionRecord::default());
    }
}
