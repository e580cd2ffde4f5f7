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

//! Streaming RSSI and dominant-frequency monitor.
//!
//! Each block of complex baseband samples is turned into a centered
//! log-magnitude spectrum and an RSSI figure, the strongest bin is checked
//! against a detection threshold, and detections above the logging
//! threshold go through a temporal dedup filter so a channel that stays on
//! air is logged once per interval instead of once per block.
//!
//! # Example
//!
//! ```no_run
//! use rssi_core::{Acquisition, Monitor, StreamConfig, StreamEvent};
//! # fn open() -> Result<Box<dyn Acquisition>, rssi_core::ConnectionError> { unimplemented!() }
//!
//! let mut monitor = Monitor::spawn(open, StreamConfig::default())?;
//! while let Some(event) = monitor.blocking_next() {
//!     match event {
//!         StreamEvent::Cycle(cycle) => {
//!             if let Some(log) = cycle.log_event {
//!                 println!("{}", log.format_line());
//!             }
//!         }
//!         StreamEvent::Error(msg) => eprintln!("{msg}"),
//!         StreamEvent::Stopped => break,
//!         _ => {}
//!     }
//! }
//! # Ok::<(), rssi_core::StreamError>(())
//! ```

pub mod acquisition;
pub mod dedup;
pub mod detector;
pub mod error;
pub mod history;
pub mod presenter;
pub mod spectrum;
pub mod stream;
pub mod thresholds;
pub mod tuning;

pub use acquisition::{Acquisition, SampleBlock};
pub use dedup::{FrequencyLogEntry, TemporalDedupFilter};
pub use detector::{detect_dominant, Detection, DetectionRecord};
pub use error::{AcquisitionError, ConnectionError, ParameterError, StreamError};
pub use history::{MetricHistory, MetricSample, HISTORY_CAPACITY};
pub use presenter::{LogEvent, Presenter};
pub use spectrum::{SpectralTransform, SpectrumFrame};
pub use stream::{
    dispatch, CycleEvent, CyclePipeline, Monitor, StreamCommand, StreamConfig, StreamEvent,
};
pub use thresholds::{
    Reconciliation, Surface, ThresholdController, ThresholdKind, ThresholdUpdate, Thresholds,
};
pub use tuning::{BufferSize, Preset, PresetSettings, TuningParameters};

pub use num_complex::Complex;
