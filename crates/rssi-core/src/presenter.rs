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

//! Presentation side of the stream: log events and the presenter trait.

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::detector::DetectionRecord;
use crate::spectrum::SpectrumFrame;
use crate::tuning::TuningParameters;

/// A detection that passed the logging threshold and the dedup filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub frequency_mhz: f64,
    pub offset_khz: f64,
    pub rssi_dbm: f64,
    pub peak_power_db: f64,
    /// Power of the detected bin.
    pub signal_power_db: f64,
    /// Logging threshold in effect when the event was emitted.
    pub log_threshold_db: f64,
}

impl LogEvent {
    /// Render the detailed log line, timestamp in local time.
    #[allow(
        clippy::cast_possible_truncation,
        reason = "threshold is clamped to [-100, 200]"
    )]
    #[must_use]
    pub fn format_line(&self) -> String {
        format!(
            "[{}] Freq: {:8.3} MHz | Offset: {:+7.1} kHz | RSSI: {:6.1} dBm | Peak: {:6.1} dB | Signal: {:6.1} dB | (T:{:+3}dB)",
            self.timestamp.with_timezone(&Local).format("%H:%M:%S%.3f"),
            self.frequency_mhz,
            self.offset_khz,
            self.rssi_dbm,
            self.peak_power_db,
            self.signal_power_db,
            self.log_threshold_db.round() as i64,
        )
    }
}

/// Consumer of stream output. Every method runs on the presentation side.
pub trait Presenter {
    /// Called once per processed block.
    fn on_update(&mut self, frame: &SpectrumFrame, rssi_dbm: f64, detection: &DetectionRecord);

    /// Called at most once per block, only for events the dedup filter approved.
    fn on_log_event(&mut self, event: &LogEvent);

    /// Called for any connection or acquisition failure.
    fn on_error(&mut self, message: &str);

    /// First block arrived from `source`.
    fn on_connected(&mut self, _source: &str) {}

    /// New tuning took effect at a cycle boundary.
    fn on_retuned(&mut self, _params: &TuningParameters) {}

    /// Log history was reset on the acquisition side. Every log event
    /// received before this one predates the reset.
    fn on_log_cleared(&mut self) {}

    /// Acquisition finished and the device was released.
    fn on_stopped(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_line_fields() {
        let event = LogEvent {
            timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
            frequency_mhz: 868.03,
            offset_khz: 30.0,
            rssi_dbm: -42.25,
            peak_power_db: 61.0,
            signal_power_db: 61.0,
            log_threshold_db: 50.0,
        };
        let line = event.format_line();
        assert!(line.starts_with('['));
        assert!(line.contains(".000] Freq:  868.030 MHz"));
        assert!(line.contains("| Offset:   +30.0 kHz |"));
        assert!(line.contains("| RSSI:  -42.2 dBm |") || line.contains("| RSSI:  -42.3 dBm |"));
        assert!(line.contains("| Peak:   61.0 dB | Signal:   61.0 dB |"));
        assert!(line.ends_with("(T:+50dB)"));
    }

    #[test]
    fn test_format_line_negative_offset() {
        let event = LogEvent {
            timestamp: Utc::now(),
            frequency_mhz: 867.5,
            offset_khz: -500.0,
            rssi_dbm: -10.0,
            peak_power_db: 40.0,
            signal_power_db: 40.0,
            log_threshold_db: -5.0,
        };
        let line = event.format_line();
        assert!(line.contains("Offset:  -500.0 kHz"));
        assert!(line.ends_with("(T: -5dB)"));
    }
}
