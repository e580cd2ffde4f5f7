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

//! Runtime-adjustable detection and logging thresholds.
//!
//! Each threshold can be edited from two surfaces: a numeric input and a
//! draggable marker on the spectrum plot. [`ThresholdController`] is the
//! single source of truth. A write from one surface yields a
//! [`ThresholdUpdate`] that the caller pushes to the other surface inside a
//! reconciliation window; any write arriving from that surface during the
//! window is treated as an echo and dropped instead of re-emitted.

use std::ops::RangeInclusive;

use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Accepted range for both dB thresholds.
pub const THRESHOLD_RANGE_DB: RangeInclusive<f64> = -100.0..=200.0;
/// Accepted range for the dedup minimum interval.
pub const MIN_INTERVAL_RANGE_SECS: RangeInclusive<f64> = 1.0..=300.0;
/// Accepted range for the dedup channel tolerance.
pub const TOLERANCE_RANGE_KHZ: RangeInclusive<f64> = 1.0..=500.0;

fn clamp_to(value: f64, range: &RangeInclusive<f64>) -> f64 {
    value.clamp(*range.start(), *range.end())
}

/// Snapshot of every threshold the pipeline reads in a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub detection_threshold_db: f64,
    pub log_threshold_db: f64,
    pub tolerance_hz: f64,
    pub min_interval_secs: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            detection_threshold_db: 100.0,
            log_threshold_db: 100.0,
            tolerance_hz: 50_000.0,
            min_interval_secs: 10.0,
        }
    }
}

impl Thresholds {
    /// Copy with every field forced into its accepted range.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            detection_threshold_db: clamp_to(self.detection_threshold_db, &THRESHOLD_RANGE_DB),
            log_threshold_db: clamp_to(self.log_threshold_db, &THRESHOLD_RANGE_DB),
            tolerance_hz: clamp_to(self.tolerance_hz / 1e3, &TOLERANCE_RANGE_KHZ) * 1e3,
            min_interval_secs: clamp_to(self.min_interval_secs, &MIN_INTERVAL_RANGE_SECS),
        }
    }
}

/// Which threshold a write addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThresholdKind {
    Detection,
    Logging,
}

impl ThresholdKind {
    const fn index(self) -> usize {
        match self {
            Self::Detection => 0,
            Self::Logging => 1,
        }
    }
}

/// Control surface a write originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    NumericInput,
    Marker,
}

impl Surface {
    const fn index(self) -> usize {
        match self {
            Self::NumericInput => 0,
            Self::Marker => 1,
        }
    }

    /// The surface that has to be brought in sync after a write from this one.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::NumericInput => Self::Marker,
            Self::Marker => Self::NumericInput,
        }
    }
}

/// An accepted user write, to be mirrored onto the other surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdUpdate {
    pub kind: ThresholdKind,
    /// Stored value after clamping.
    pub value: f64,
    pub origin: Surface,
    /// Controller generation after this write.
    pub generation: u64,
}

impl ThresholdUpdate {
    #[must_use]
    pub const fn target(&self) -> Surface {
        self.origin.other()
    }
}

/// Open reconciliation window. Hand it back to
/// [`ThresholdController::finish_reconcile`] once the target surface shows `value`.
#[must_use]
#[derive(Debug)]
pub struct Reconciliation {
    pub kind: ThresholdKind,
    pub target: Surface,
    pub value: f64,
}

/// Single source of truth for the thresholds.
#[derive(Debug, Clone)]
pub struct ThresholdController {
    thresholds: Thresholds,
    generation: u64,
    // One-shot echo suppression, indexed by [kind][surface]
    suppressed: [[bool; 2]; 2],
    last_writer: [Option<Surface>; 2],
}

impl Default for ThresholdController {
    fn default() -> Self {
        Self::new(Thresholds::default())
    }
}

impl ThresholdController {
    #[must_use]
    pub fn new(initial: Thresholds) -> Self {
        Self {
            thresholds: initial.clamped(),
            generation: 0,
            suppressed: [[false; 2]; 2],
            last_writer: [None; 2],
        }
    }

    /// Consistent copy of every value, as the acquisition flow should see it.
    #[must_use]
    pub fn snapshot(&self) -> Thresholds {
        self.thresholds
    }

    /// Bumped on every accepted write.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn value(&self, kind: ThresholdKind) -> f64 {
        match kind {
            ThresholdKind::Detection => self.thresholds.detection_threshold_db,
            ThresholdKind::Logging => self.thresholds.log_threshold_db,
        }
    }

    /// Surface that produced the current value, `None` if still at its initial value.
    #[must_use]
    pub fn last_writer(&self, kind: ThresholdKind) -> Option<Surface> {
        self.last_writer[kind.index()]
    }

    /// Handle a write coming from `origin`.
    ///
    /// Returns `None` for an echo of a reconciliation in progress (the
    /// suppression flag is consumed) or when the clamped value is unchanged.
    pub fn write(&mut self, kind: ThresholdKind, origin: Surface, value: f64) -> Option<ThresholdUpdate> {
        let flag = &mut self.suppressed[kind.index()][origin.index()];
        if *flag {
            *flag = false;
            debug!("Dropped echoed {kind:?} threshold write from {origin:?}");
            return None;
        }

        let value = clamp_to(value, &THRESHOLD_RANGE_DB);
        if value == self.value(kind) {
            return None;
        }

        match kind {
            ThresholdKind::Detection => self.thresholds.detection_threshold_db = value,
            ThresholdKind::Logging => self.thresholds.log_threshold_db = value,
        }
        self.generation += 1;
        self.last_writer[kind.index()] = Some(origin);

        info!("{kind:?} threshold set to {value:.0} dB from {origin:?}");

        Some(ThresholdUpdate {
            kind,
            value,
            origin,
            generation: self.generation,
        })
    }

    /// Open the window in which `update` is pushed to its target surface.
    pub fn begin_reconcile(&mut self, update: &ThresholdUpdate) -> Reconciliation {
        self.suppressed[update.kind.index()][update.target().index()] = true;
        Reconciliation {
            kind: update.kind,
            target: update.target(),
            value: update.value,
        }
    }

    /// Close a reconciliation window, clearing its flag if no echo consumed it.
    pub fn finish_reconcile(&mut self, reconciliation: Reconciliation) {
        self.suppressed[reconciliation.kind.index()][reconciliation.target.index()] = false;
    }

    /// Set the dedup channel tolerance in kHz, returning the stored value.
    pub fn set_tolerance_khz(&mut self, khz: f64) -> f64 {
        let khz = clamp_to(khz, &TOLERANCE_RANGE_KHZ);
        self.thresholds.tolerance_hz = khz * 1e3;
        self.generation += 1;
        info!("Frequency tolerance set to {khz:.0} kHz");
        khz
    }

    /// Set the dedup minimum interval in seconds, returning the stored value.
    pub fn set_min_interval_secs(&mut self, seconds: f64) -> f64 {
        let seconds = clamp_to(seconds, &MIN_INTERVAL_RANGE_SECS);
        self.thresholds.min_interval_secs = seconds;
        self.generation += 1;
        info!("Log interval set to {seconds:.0} s");
        seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_clamps_to_bounds() {
        let mut controller = ThresholdController::default();
        let update = controller
            .write(ThresholdKind::Detection, Surface::NumericInput, 500.0)
            .unwrap();
        assert_eq!(update.value, 200.0);
        let update = controller
            .write(ThresholdKind::Logging, Surface::Marker, -1000.0)
            .unwrap();
        assert_eq!(update.value, -100.0);
        assert_eq!(controller.snapshot().detection_threshold_db, 200.0);
        assert_eq!(controller.snapshot().log_threshold_db, -100.0);
    }

    #[test]
    fn test_reconciliation_echo_is_dropped() {
        let mut controller = ThresholdController::default();
        let update = controller
            .write(ThresholdKind::Detection, Surface::NumericInput, 60.0)
            .unwrap();
        assert_eq!(update.target(), Surface::Marker);
        let generation = controller.generation();

        let window = controller.begin_reconcile(&update);
        // Moving the marker fires its change handler with the same value
        assert!(controller
            .write(ThresholdKind::Detection, Surface::Marker, window.value)
            .is_none());
        controller.finish_reconcile(window);

        assert_eq!(controller.generation(), generation);
        assert_eq!(controller.last_writer(ThresholdKind::Detection), Some(Surface::NumericInput));
    }

    #[test]
    fn test_suppression_is_one_shot() {
        let mut controller = ThresholdController::default();
        let update = controller
            .write(ThresholdKind::Logging, Surface::Marker, 80.0)
            .unwrap();
        let window = controller.begin_reconcile(&update);
        assert!(controller
            .write(ThresholdKind::Logging, Surface::NumericInput, 80.0)
            .is_none());
        // A second write inside the window is a genuine user edit
        let next = controller
            .write(ThresholdKind::Logging, Surface::NumericInput, 75.0)
            .unwrap();
        assert_eq!(next.origin, Surface::NumericInput);
        controller.finish_reconcile(window);
    }

    #[test]
    fn test_unconsumed_flag_cleared_on_finish() {
        let mut controller = ThresholdController::default();
        let update = controller
            .write(ThresholdKind::Detection, Surface::Marker, 42.0)
            .unwrap();
        let window = controller.begin_reconcile(&update);
        controller.finish_reconcile(window);

        let next = controller.write(ThresholdKind::Detection, Surface::NumericInput, 43.0);
        assert!(next.is_some());
    }

    #[test]
    fn test_suppression_scoped_to_kind_and_surface() {
        let mut controller = ThresholdController::default();
        let update = controller
            .write(ThresholdKind::Detection, Surface::NumericInput, 50.0)
            .unwrap();
        let window = controller.begin_reconcile(&update);
        assert!(controller
            .write(ThresholdKind::Logging, Surface::Marker, 70.0)
            .is_some());
        assert!(controller
            .write(ThresholdKind::Detection, Surface::NumericInput, 55.0)
            .is_some());
        controller.finish_reconcile(window);
    }

    #[test]
    fn test_unchanged_value_is_not_an_update() {
        let mut controller = ThresholdController::default();
        assert!(controller
            .write(ThresholdKind::Detection, Surface::NumericInput, 100.0)
            .is_none());
        assert_eq!(controller.generation(), 0);
    }

    #[test]
    fn test_dedup_settings_clamped() {
        let mut controller = ThresholdController::default();
        assert_eq!(controller.set_tolerance_khz(900.0), 500.0);
        assert_eq!(controller.snapshot().tolerance_hz, 500_000.0);
        assert_eq!(controller.set_min_interval_secs(0.0), 1.0);
        assert_eq!(controller.snapshot().min_interval_secs, 1.0);
    }
}
