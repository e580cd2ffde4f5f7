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

//! Receiver tuning parameters and named presets.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParameterError;
use crate::spectrum::frequency_axis;

/// Center frequency range in MHz
pub const FREQUENCY_RANGE_MHZ: RangeInclusive<f64> = 70.0..=6000.0;
/// Sample rate range in MHz
pub const SAMPLE_RATE_RANGE_MHZ: RangeInclusive<f64> = 0.5..=56.0;
/// RF bandwidth range in MHz
pub const BANDWIDTH_RANGE_MHZ: RangeInclusive<f64> = 0.2..=56.0;
/// Hardware gain range in dB
pub const GAIN_RANGE_DB: RangeInclusive<f64> = 0.0..=76.0;

fn clamp_to(value: f64, range: &RangeInclusive<f64>) -> f64 {
    value.clamp(*range.start(), *range.end())
}

/// Samples per block. Only powers of two between 1024 and 8192 are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum BufferSize {
    S1024,
    #[default]
    S2048,
    S4096,
    S8192,
}

impl BufferSize {
    pub const ALL: [BufferSize; 4] = [Self::S1024, Self::S2048, Self::S4096, Self::S8192];

    #[must_use]
    pub const fn samples(self) -> usize {
        match self {
            Self::S1024 => 1024,
            Self::S2048 => 2048,
            Self::S4096 => 4096,
            Self::S8192 => 8192,
        }
    }
}

impl TryFrom<usize> for BufferSize {
    type Error = ParameterError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|size| size.samples() == value)
            .ok_or(ParameterError::BufferSize(value))
    }
}

impl From<BufferSize> for usize {
    fn from(size: BufferSize) -> Self {
        size.samples()
    }
}

impl fmt::Display for BufferSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.samples())
    }
}

/// Acquisition parameters, applied as a unit at a cycle boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuningParameters {
    pub center_frequency_hz: f64,
    pub sample_rate_hz: f64,
    pub bandwidth_hz: f64,
    pub gain_db: f64,
    pub buffer_size: BufferSize,
}

impl Default for TuningParameters {
    fn default() -> Self {
        Self {
            center_frequency_hz: 868e6,
            sample_rate_hz: 10e6,
            bandwidth_hz: 5e6,
            gain_db: 30.0,
            buffer_size: BufferSize::S2048,
        }
    }
}

impl TuningParameters {
    /// Copy of these parameters with every field forced into its accepted range.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            center_frequency_hz: clamp_to(self.center_frequency_hz / 1e6, &FREQUENCY_RANGE_MHZ)
                * 1e6,
            sample_rate_hz: clamp_to(self.sample_rate_hz / 1e6, &SAMPLE_RATE_RANGE_MHZ) * 1e6,
            bandwidth_hz: clamp_to(self.bandwidth_hz / 1e6, &BANDWIDTH_RANGE_MHZ) * 1e6,
            gain_db: clamp_to(self.gain_db, &GAIN_RANGE_DB),
            buffer_size: self.buffer_size,
        }
    }

    /// Bin offsets for a frame produced under these parameters.
    #[must_use]
    pub fn frequency_axis(&self) -> Vec<f64> {
        frequency_axis(self.sample_rate_hz, self.buffer_size.samples())
    }

    /// Overwrite frequency, sample rate, bandwidth and gain from `preset`.
    pub fn apply_preset(&mut self, preset: Preset) {
        let settings = preset.settings();
        self.center_frequency_hz = settings.frequency_mhz * 1e6;
        self.sample_rate_hz = settings.sample_rate_mhz * 1e6;
        self.bandwidth_hz = settings.bandwidth_mhz * 1e6;
        self.gain_db = settings.gain_db;
    }
}

/// The four values a preset carries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresetSettings {
    pub frequency_mhz: f64,
    pub sample_rate_mhz: f64,
    pub bandwidth_mhz: f64,
    pub gain_db: f64,
}

/// Named tuning bundles for common bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    Lora868,
    Wifi24,
    Bluetooth,
    Ism868,
    Ism915,
    FmRadio,
    GpsL1,
    Lte2100,
}

impl Preset {
    pub const ALL: [Preset; 8] = [
        Self::Lora868,
        Self::Wifi24,
        Self::Bluetooth,
        Self::Ism868,
        Self::Ism915,
        Self::FmRadio,
        Self::GpsL1,
        Self::Lte2100,
    ];

    /// Stable identifier used on the command line and in config files.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Lora868 => "lora_868",
            Self::Wifi24 => "wifi_2.4g",
            Self::Bluetooth => "bluetooth",
            Self::Ism868 => "868",
            Self::Ism915 => "915",
            Self::FmRadio => "fm_radio",
            Self::GpsL1 => "gps_l1",
            Self::Lte2100 => "lte_2100",
        }
    }

    /// Human readable button label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Lora868 => "LoRa 868 MHz",
            Self::Wifi24 => "WiFi 2.4 GHz",
            Self::Bluetooth => "Bluetooth",
            Self::Ism868 => "ISM 868 MHz",
            Self::Ism915 => "ISM 915 MHz",
            Self::FmRadio => "FM Radio",
            Self::GpsL1 => "GPS L1",
            Self::Lte2100 => "LTE 2100",
        }
    }

    #[must_use]
    pub const fn settings(self) -> PresetSettings {
        let (frequency_mhz, sample_rate_mhz, bandwidth_mhz, gain_db) = match self {
            Self::Lora868 => (868.0, 1.0, 0.5, 40.0),
            Self::Wifi24 => (2400.0, 20.0, 10.0, 30.0),
            Self::Bluetooth => (2440.0, 10.0, 5.0, 35.0),
            Self::Ism868 => (868.0, 10.0, 5.0, 35.0),
            Self::Ism915 => (915.0, 10.0, 26.0, 35.0),
            Self::FmRadio => (100.0, 5.0, 2.0, 25.0),
            Self::GpsL1 => (1575.42, 10.0, 5.0, 45.0),
            Self::Lte2100 => (2100.0, 30.0, 20.0, 30.0),
        };
        PresetSettings {
            frequency_mhz,
            sample_rate_mhz,
            bandwidth_mhz,
            gain_db,
        }
    }
}

impl FromStr for Preset {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParameterError::UnknownPreset(s.to_string()))
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = TuningParameters::default();
        assert_eq!(params.center_frequency_hz, 868e6);
        assert_eq!(params.buffer_size.samples(), 2048);
        assert_eq!(params.frequency_axis().len(), 2048);
    }

    #[test]
    fn test_buffer_size_conversion() {
        assert_eq!(BufferSize::try_from(4096), Ok(BufferSize::S4096));
        assert_eq!(
            BufferSize::try_from(3000),
            Err(ParameterError::BufferSize(3000))
        );
        assert_eq!(usize::from(BufferSize::S8192), 8192);
    }

    #[test]
    fn test_preset_overwrites_only_radio_fields() {
        let mut params = TuningParameters {
            buffer_size: BufferSize::S8192,
            ..TuningParameters::default()
        };
        params.apply_preset(Preset::Lora868);
        assert_eq!(params.center_frequency_hz, 868e6);
        assert_eq!(params.sample_rate_hz, 1e6);
        assert_eq!(params.bandwidth_hz, 0.5e6);
        assert_eq!(params.gain_db, 40.0);
        assert_eq!(params.buffer_size, BufferSize::S8192);
    }

    #[test]
    fn test_preset_lookup_by_key() {
        for preset in Preset::ALL {
            assert_eq!(preset.key().parse::<Preset>(), Ok(preset));
        }
        assert_eq!(
            "nope".parse::<Preset>(),
            Err(ParameterError::UnknownPreset("nope".to_string()))
        );
    }

    #[test]
    fn test_clamped() {
        let params = TuningParameters {
            center_frequency_hz: 10e6,
            sample_rate_hz: 100e6,
            bandwidth_hz: 0.1e6,
            gain_db: 90.0,
            buffer_size: BufferSize::S1024,
        }
        .clamped();
        assert_eq!(params.center_frequency_hz, 70e6);
        assert_eq!(params.sample_rate_hz, 56e6);
        assert!((params.bandwidth_hz - 0.2e6).abs() < 1e-6);
        assert_eq!(params.gain_db, 76.0);
    }
}
