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

//! Bounded RSSI / peak-power time series for trend plots.

use std::collections::VecDeque;

/// Number of points kept per series.
pub const HISTORY_CAPACITY: usize = 1000;

/// One sample appended per processed block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricSample {
    /// Seconds since the stream started.
    pub time_secs: f64,
    pub rssi_dbm: f64,
    pub peak_power_db: f64,
}

/// Three index-aligned series, oldest evicted first once full.
#[derive(Debug, Clone)]
pub struct MetricHistory {
    time: VecDeque<f64>,
    rssi: VecDeque<f64>,
    peak_power: VecDeque<f64>,
    capacity: usize,
}

impl Default for MetricHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            time: VecDeque::with_capacity(capacity + 1),
            rssi: VecDeque::with_capacity(capacity + 1),
            peak_power: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest one when over capacity.
    pub fn push(&mut self, sample: MetricSample) {
        self.time.push_back(sample.time_secs);
        self.rssi.push_back(sample.rssi_dbm);
        self.peak_power.push_back(sample.peak_power_db);

        while self.time.len() > self.capacity {
            self.time.pop_front();
            self.rssi.pop_front();
            self.peak_power.pop_front();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.time.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.time.clear();
        self.rssi.clear();
        self.peak_power.clear();
    }

    #[must_use]
    pub fn latest(&self) -> Option<MetricSample> {
        Some(MetricSample {
            time_secs: *self.time.back()?,
            rssi_dbm: *self.rssi.back()?,
            peak_power_db: *self.peak_power.back()?,
        })
    }

    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.time.iter().copied()
    }

    /// `[time, rssi]` pairs ready for plotting.
    #[must_use]
    pub fn rssi_points(&self) -> Vec<[f64; 2]> {
        self.time
            .iter()
            .zip(&self.rssi)
            .map(|(&t, &v)| [t, v])
            .collect()
    }

    /// `[time, peak power]` pairs ready for plotting.
    #[must_use]
    pub fn peak_power_points(&self) -> Vec<[f64; 2]> {
        self.time
            .iter()
            .zip(&self.peak_power)
            .map(|(&t, &v)| [t, v])
            .collect()
    }
}
