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

//! Interface to the radio front end.

use num_complex::Complex;

use crate::error::{AcquisitionError, ConnectionError};
use crate::tuning::TuningParameters;

/// One block of complex baseband samples, owned by the stream for a single cycle.
pub type SampleBlock = Vec<Complex<f32>>;

/// A source of sample blocks that can be retuned.
///
/// Implementations are driven from the acquisition thread only and may keep
/// non-`Send` device handles internally as long as they are created there.
pub trait Acquisition {
    /// Short name used in log messages.
    fn name(&self) -> &str;

    /// Apply a complete set of tuning parameters.
    fn configure(&mut self, params: &TuningParameters) -> Result<(), ConnectionError>;

    /// Block until the next `params.buffer_size` samples are available.
    fn read_block(&mut self) -> Result<SampleBlock, AcquisitionError>;

    /// Tear down the device. Must be safe to call more than once.
    fn release(&mut self);
}

impl<T: Acquisition + ?Sized> Acquisition for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn configure(&mut self, params: &TuningParameters) -> Result<(), ConnectionError> {
        (**self).configure(params)
    }

    fn read_block(&mut self) -> Result<SampleBlock, AcquisitionError> {
        (**self).read_block()
    }

    fn release(&mut self) {
        (**self).release();
    }
}
