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

//! Temporal deduplication of logged frequencies.
//!
//! A channel that keeps showing up on consecutive blocks is logged once and
//! then held back until `min_interval` has elapsed. Matching is by proximity
//! (`tolerance_hz`), not exact equality, so the stored key drifts with the
//! latest observation of the channel.

use chrono::{DateTime, TimeDelta, Utc};
use log::debug;

/// Entries not reported for this long are dropped on the next insertion.
pub const RETENTION_SECS: i64 = 3600;

/// Last time a channel was reported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyLogEntry {
    /// Frequency of the most recent reported observation, in Hz.
    pub frequency_hz: f64,
    pub last_report: DateTime<Utc>,
}

/// Stateful gate deciding whether a detected frequency gets logged now.
#[derive(Debug, Clone)]
pub struct TemporalDedupFilter {
    // Insertion order matters: the scan takes the first entry within tolerance
    entries: Vec<FrequencyLogEntry>,
    tolerance_hz: f64,
    min_interval: TimeDelta,
    retention: TimeDelta,
}

/// Convert fractional seconds to a `TimeDelta` with millisecond resolution.
#[allow(
    clippy::cast_possible_truncation,
    reason = "intervals are bounded to a few minutes"
)]
fn seconds_to_delta(seconds: f64) -> TimeDelta {
    TimeDelta::milliseconds((seconds * 1000.0).round() as i64)
}

impl TemporalDedupFilter {
    /// Create an empty filter.
    #[must_use]
    pub fn new(tolerance_hz: f64, min_interval_secs: f64) -> Self {
        Self {
            entries: Vec::new(),
            tolerance_hz,
            min_interval: seconds_to_delta(min_interval_secs),
            retention: TimeDelta::seconds(RETENTION_SECS),
        }
    }

    pub fn set_tolerance_hz(&mut self, tolerance_hz: f64) {
        self.tolerance_hz = tolerance_hz;
    }

    pub fn set_min_interval_secs(&mut self, seconds: f64) {
        self.min_interval = seconds_to_delta(seconds);
    }

    #[must_use]
    pub fn tolerance_hz(&self) -> f64 {
        self.tolerance_hz
    }

    #[must_use]
    pub fn min_interval(&self) -> TimeDelta {
        self.min_interval
    }

    /// Decide whether `frequency_hz` observed at `now` should be reported.
    ///
    /// - A stored channel within tolerance that was reported less than
    ///   `min_interval` ago rejects the report and stays untouched.
    /// - A stored channel whose interval has elapsed is re-keyed to
    ///   `frequency_hz`, stamped with `now`, and the report goes through.
    /// - No match inserts a new channel and prunes everything older than
    ///   the retention window.
    ///
    /// When several stored channels are within tolerance of the query the
    /// first one in insertion order wins, not the nearest.
    pub fn should_report(&mut self, frequency_hz: f64, now: DateTime<Utc>) -> bool {
        let matched = self
            .entries
            .iter()
            .position(|entry| (frequency_hz - entry.frequency_hz).abs() <= self.tolerance_hz);

        if let Some(index) = matched {
            let entry = self.entries[index];
            if now - entry.last_report < self.min_interval {
                debug!(
                    "Suppressed {:.3} MHz: channel {:.3} MHz last logged {} ms ago",
                    frequency_hz / 1e6,
                    entry.frequency_hz / 1e6,
                    (now - entry.last_report).num_milliseconds()
                );
                return false;
            }

            // Re-center on the latest observation; the refreshed entry moves to the back
            self.entries.remove(index);
            self.entries.push(FrequencyLogEntry {
                frequency_hz,
                last_report: now,
            });
            return true;
        }

        self.entries.push(FrequencyLogEntry {
            frequency_hz,
            last_report: now,
        });
        self.prune(now);
        true
    }

    /// Drop entries last reported at or before `now - retention`.
    fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.retention;
        let before = self.entries.len();
        self.entries.retain(|entry| entry.last_report > cutoff);
        let pruned = before - self.entries.len();
        if pruned > 0 {
            debug!("Pruned {pruned} stale frequency log entries");
        }
    }

    /// Forget every channel. Called when the detailed log is cleared.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored channels in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[FrequencyLogEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + TimeDelta::seconds(seconds)
    }

    fn filter() -> TemporalDedupFilter {
        TemporalDedupFilter::new(50_000.0, 10.0)
    }

    #[test]
    fn test_repeat_channel_suppressed_until_interval() {
        let mut f = filter();
        assert!(f.should_report(868_000_000.0, at(0)));
        assert!(!f.should_report(868_030_000.0, at(1)));
        assert!(f.should_report(868_030_000.0, at(11)));
    }

    #[test]
    fn test_distant_channel_is_new() {
        let mut f = filter();
        assert!(f.should_report(868_000_000.0, at(0)));
        assert!(f.should_report(920_000_000.0, at(1)));
        assert_eq!(f.len(), 2);
    }

    #[test]
    fn test_rejection_leaves_state_untouched() {
        let mut f = filter();
        f.should_report(868_000_000.0, at(0));
        let before = f.entries().to_vec();
        assert!(!f.should_report(868_040_000.0, at(5)));
        assert_eq!(f.entries(), before.as_slice());
    }

    #[test]
    fn test_report_recenters_key() {
        let mut f = filter();
        f.should_report(868_000_000.0, at(0));
        assert!(f.should_report(868_040_000.0, at(10)));
        assert_eq!(f.len(), 1);
        assert_eq!(f.entries()[0].frequency_hz, 868_040_000.0);
        assert_eq!(f.entries()[0].last_report, at(10));

        // 868.08 MHz is now within tolerance of the re-centered key
        assert!(!f.should_report(868_080_000.0, at(12)));
    }

    #[test]
    fn test_tolerance_boundary_is_inclusive() {
        let mut f = filter();
        f.should_report(868_000_000.0, at(0));
        assert!(!f.should_report(868_050_000.0, at(1)));
        assert!(f.should_report(868_050_001.0, at(1)));
    }

    #[test]
    fn test_stale_entry_pruned_on_insert() {
        let mut f = filter();
        f.should_report(868_000_000.0, at(0));
        assert!(f.should_report(2_400_000_000.0, at(3601)));
        assert_eq!(f.len(), 1);
        assert_eq!(f.entries()[0].frequency_hz, 2_400_000_000.0);

        // Original channel is gone, so it is reported as new
        assert!(f.should_report(868_000_000.0, at(3602)));
    }

    #[test]
    fn test_update_does_not_prune() {
        let mut f = filter();
        f.should_report(868_000_000.0, at(0));
        f.should_report(915_000_000.0, at(100));
        // Updating an existing channel long after the first one went stale
        assert!(f.should_report(915_000_000.0, at(4000)));
        assert_eq!(f.len(), 2);
    }

    #[test]
    fn test_first_match_wins() {
        let mut f = TemporalDedupFilter::new(50_000.0, 10.0);
        f.should_report(868_000_000.0, at(0));
        f.should_report(868_060_000.0, at(20));
        // 868.03 MHz is within tolerance of both; the older entry is scanned first
        assert!(f.should_report(868_030_000.0, at(25)));
        assert_eq!(f.len(), 2);
        assert_eq!(f.entries()[1].frequency_hz, 868_030_000.0);
        assert_eq!(f.entries()[0].frequency_hz, 868_060_000.0);
    }

    #[test]
    fn test_clear_resets_state() {
        let mut f = filter();
        f.should_report(868_000_000.0, at(0));
        f.should_report(920_000_000.0, at(0));
        f.clear();
        assert_eq!(f.len(), 0);
        assert!(f.should_report(868_000_000.0, at(1)));
    }

    #[test]
    fn test_runtime_settings() {
        let mut f = filter();
        f.should_report(868_000_000.0, at(0));
        f.set_min_interval_secs(1.0);
        assert!(f.should_report(868_000_000.0, at(1)));
        f.set_tolerance_hz(1_000.0);
        assert!(f.should_report(868_010_000.0, at(1)));
        assert_eq!(f.len(), 2);
    }
}
