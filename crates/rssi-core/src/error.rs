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

//! Error taxonomy for the acquisition stream.
//!
//! Only device and I/O failures are errors. A missing detection or a
//! suppressed log entry is an ordinary outcome and never shows up here.

use thiserror::Error;

/// The device could not be reached or rejected a configuration value.
///
/// Surfaced to the user; the acquisition flow does not start.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("device unreachable: {0}")]
    Unreachable(String),

    #[error("device rejected {parameter}: {reason}")]
    Rejected { parameter: &'static str, reason: String },
}

/// An I/O failure while streaming. Terminates the acquisition flow.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("read failed: {0}")]
    Read(String),

    #[error("end of stream")]
    EndOfStream,

    #[error("device not configured")]
    NotConfigured,
}

/// A runtime parameter outside its accepted set.
#[derive(Debug, Error, PartialEq)]
pub enum ParameterError {
    #[error("unsupported buffer size {0} (expected 1024, 2048, 4096 or 8192)")]
    BufferSize(usize),

    #[error("unknown preset '{0}'")]
    UnknownPreset(String),
}

/// Any error that ends or prevents an acquisition flow.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error("acquisition thread exited before reporting its state")]
    WorkerExited,
}
