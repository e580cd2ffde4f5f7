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

//! Acquisition loop and per-block processing pipeline.
//!
//! [`CyclePipeline`] is the synchronous part: one block in, one
//! [`CycleEvent`] out. [`Monitor`] runs it on a dedicated thread against an
//! [`Acquisition`] source and hands events to the presentation side through
//! a single-slot channel, so a slow consumer paces the producer.
//!
//! Tuning, thresholds and commands written from the presentation side are
//! picked up only at the start of a cycle, never in the middle of one.

use std::sync::{Arc, PoisonError, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use num_complex::Complex;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::acquisition::Acquisition;
use crate::dedup::TemporalDedupFilter;
use crate::detector::{detect_dominant, DetectionRecord};
use crate::error::{ConnectionError, StreamError};
use crate::history::{MetricHistory, MetricSample};
use crate::presenter::{LogEvent, Presenter};
use crate::spectrum::{SpectralTransform, SpectrumFrame, MAGNITUDE_FLOOR};
use crate::thresholds::Thresholds;
use crate::tuning::TuningParameters;

/// Default pause after each cycle.
pub const DEFAULT_CYCLE_PAUSE: Duration = Duration::from_millis(50);

const CYCLE_LOG_INTERVAL: u64 = 100;

/// Everything produced by one processed block.
#[derive(Debug, Clone)]
pub struct CycleEvent {
    /// Zero-based cycle counter since the stream started.
    pub sequence: u64,
    pub frame: SpectrumFrame,
    pub rssi_dbm: f64,
    pub peak_power_db: f64,
    pub detection: DetectionRecord,
    /// Present when the detection was logged.
    pub log_event: Option<LogEvent>,
    /// Point appended to the metric history for this block.
    pub sample: MetricSample,
    /// Tuning the block was acquired with.
    pub tuning: TuningParameters,
}

/// Transform, detect and dedup for one block at a time.
#[derive(Debug)]
pub struct CyclePipeline {
    transform: SpectralTransform,
    dedup: TemporalDedupFilter,
    started: DateTime<Utc>,
    cycles: u64,
    log_count: u64,
}

impl CyclePipeline {
    #[must_use]
    pub fn new(thresholds: &Thresholds, started: DateTime<Utc>) -> Self {
        Self {
            transform: SpectralTransform::new(),
            dedup: TemporalDedupFilter::new(thresholds.tolerance_hz, thresholds.min_interval_secs),
            started,
            cycles: 0,
            log_count: 0,
        }
    }

    /// Run one block through the pipeline.
    ///
    /// A detection reaches the dedup filter only when `reporting_enabled` is
    /// set and its power is above the logging threshold.
    #[allow(
        clippy::cast_precision_loss,
        reason = "elapsed milliseconds stay far below 2^52"
    )]
    pub fn process_block(
        &mut self,
        block: &[Complex<f32>],
        tuning: &TuningParameters,
        thresholds: &Thresholds,
        reporting_enabled: bool,
        now: DateTime<Utc>,
    ) -> CycleEvent {
        self.dedup.set_tolerance_hz(thresholds.tolerance_hz);
        self.dedup.set_min_interval_secs(thresholds.min_interval_secs);

        let frame = self.transform.transform(block, tuning.sample_rate_hz);
        let rssi_dbm = frame.rssi_dbm();
        let peak_power_db = frame
            .peak_power_db()
            .unwrap_or_else(|| 20.0 * MAGNITUDE_FLOOR.log10());
        let detection = detect_dominant(
            &frame,
            tuning.center_frequency_hz,
            thresholds.detection_threshold_db,
        );

        let log_event = detection
            .detection
            .filter(|hit| reporting_enabled && hit.power_db > thresholds.log_threshold_db)
            .filter(|hit| self.dedup.should_report(hit.frequency_hz, now))
            .map(|hit| LogEvent {
                timestamp: now,
                frequency_mhz: hit.frequency_hz / 1e6,
                offset_khz: hit.offset_hz / 1e3,
                rssi_dbm,
                peak_power_db,
                signal_power_db: hit.power_db,
                log_threshold_db: thresholds.log_threshold_db,
            });
        if log_event.is_some() {
            self.log_count += 1;
        }

        let sample = MetricSample {
            time_secs: (now - self.started).num_milliseconds() as f64 / 1000.0,
            rssi_dbm,
            peak_power_db,
        };

        let sequence = self.cycles;
        self.cycles += 1;
        if sequence % CYCLE_LOG_INTERVAL == 0 {
            debug!(
                "Cycle {sequence}: RSSI {rssi_dbm:.1} dBm, peak {peak_power_db:.1} dB, detected {}",
                detection.detected()
            );
        }

        CycleEvent {
            sequence,
            frame,
            rssi_dbm,
            peak_power_db,
            detection,
            log_event,
            sample,
            tuning: *tuning,
        }
    }

    /// Forget every logged channel and reset the log counter.
    pub fn clear_log(&mut self) {
        self.dedup.clear();
        self.log_count = 0;
        info!("Detection log cleared");
    }

    /// Log events emitted since start or the last clear.
    #[must_use]
    pub fn log_count(&self) -> u64 {
        self.log_count
    }

    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    #[must_use]
    pub fn dedup(&self) -> &TemporalDedupFilter {
        &self.dedup
    }
}

/// Settings a [`Monitor`] starts with.
#[derive(Debug, Clone, Copy)]
pub struct StreamConfig {
    pub tuning: TuningParameters,
    pub thresholds: Thresholds,
    pub reporting_enabled: bool,
    pub cycle_pause: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            tuning: TuningParameters::default(),
            thresholds: Thresholds::default(),
            reporting_enabled: true,
            cycle_pause: DEFAULT_CYCLE_PAUSE,
        }
    }
}

/// Control messages processed at the next cycle boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamCommand {
    ClearLog,
    SetReporting(bool),
}

/// Messages from the acquisition thread, delivered in order.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// First block was read successfully.
    Connected { source: String },
    Cycle(Box<CycleEvent>),
    /// A new tuning was accepted by the device.
    Retuned(TuningParameters),
    /// Dedup filter and log counter were reset. Log events sent earlier
    /// were computed before the reset.
    LogCleared,
    /// Connection or acquisition failure. Acquisition errors are followed by `Stopped`.
    Error(String),
    /// Loop exited and the source was released.
    Stopped,
}

/// Forward one event to a presenter.
pub fn dispatch(event: &StreamEvent, presenter: &mut impl Presenter) {
    match event {
        StreamEvent::Connected { source } => presenter.on_connected(source),
        StreamEvent::Cycle(cycle) => {
            presenter.on_update(&cycle.frame, cycle.rssi_dbm, &cycle.detection);
            if let Some(log_event) = &cycle.log_event {
                presenter.on_log_event(log_event);
            }
        }
        StreamEvent::Retuned(params) => presenter.on_retuned(params),
        StreamEvent::LogCleared => presenter.on_log_cleared(),
        StreamEvent::Error(message) => presenter.on_error(message),
        StreamEvent::Stopped => presenter.on_stopped(),
    }
}

/// Handle to a running acquisition thread.
pub struct Monitor {
    events: mpsc::Receiver<StreamEvent>,
    commands: mpsc::UnboundedSender<StreamCommand>,
    tuning: watch::Sender<TuningParameters>,
    thresholds: watch::Sender<Thresholds>,
    history: Arc<RwLock<MetricHistory>>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
    source: String,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("source", &self.source)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

struct Worker {
    events: mpsc::Sender<StreamEvent>,
    commands: mpsc::UnboundedReceiver<StreamCommand>,
    tuning: watch::Receiver<TuningParameters>,
    thresholds: watch::Receiver<Thresholds>,
    history: Arc<RwLock<MetricHistory>>,
    cancel: CancellationToken,
    reporting_enabled: bool,
    cycle_pause: Duration,
}

impl Monitor {
    /// Create the source on a new thread, configure it and start streaming.
    ///
    /// `factory` runs on the acquisition thread so device handles never
    /// cross threads. Returns once the source is configured, or with the
    /// `ConnectionError` that prevented it.
    pub fn spawn<F, A>(factory: F, config: StreamConfig) -> Result<Self, StreamError>
    where
        F: FnOnce() -> Result<A, ConnectionError> + Send + 'static,
        A: Acquisition,
    {
        let tuning_params = config.tuning.clamped();
        let thresholds = config.thresholds.clamped();

        let (events_tx, events_rx) = mpsc::channel(1);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (tuning_tx, tuning_rx) = watch::channel(tuning_params);
        let (thresholds_tx, thresholds_rx) = watch::channel(thresholds);
        let history = Arc::new(RwLock::new(MetricHistory::new()));
        let cancel = CancellationToken::new();

        let worker = Worker {
            events: events_tx,
            commands: commands_rx,
            tuning: tuning_rx,
            thresholds: thresholds_rx,
            history: Arc::clone(&history),
            cancel: cancel.clone(),
            reporting_enabled: config.reporting_enabled,
            cycle_pause: config.cycle_pause,
        };

        let (init_tx, init_rx) = std::sync::mpsc::channel::<Result<String, ConnectionError>>();

        let handle = std::thread::Builder::new()
            .name("rssi-acquisition".to_string())
            .spawn(move || {
                let mut source = match factory() {
                    Ok(source) => source,
                    Err(e) => {
                        error!("Failed to open acquisition source: {e}");
                        let _ = init_tx.send(Err(e));
                        return;
                    }
                };

                if let Err(e) = source.configure(&tuning_params) {
                    error!("Failed to configure {}: {e}", source.name());
                    source.release();
                    let _ = init_tx.send(Err(e));
                    return;
                }

                let name = source.name().to_string();
                info!(
                    "{name} configured: {:.3} MHz, {:.3} MS/s, {} samples per block",
                    tuning_params.center_frequency_hz / 1e6,
                    tuning_params.sample_rate_hz / 1e6,
                    tuning_params.buffer_size
                );
                if init_tx.send(Ok(name)).is_err() {
                    source.release();
                    return;
                }

                worker.run(&mut source, tuning_params);
            })
            .map_err(|e| ConnectionError::Unreachable(format!("failed to spawn acquisition thread: {e}")))?;

        let source = match init_rx.recv() {
            Ok(Ok(name)) => name,
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e.into());
            }
            Err(_) => {
                let _ = handle.join();
                return Err(StreamError::WorkerExited);
            }
        };

        Ok(Self {
            events: events_rx,
            commands: commands_tx,
            tuning: tuning_tx,
            thresholds: thresholds_tx,
            history,
            cancel,
            handle: Some(handle),
            source,
        })
    }

    /// Name reported by the acquisition source.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Next event without waiting.
    pub fn try_next(&mut self) -> Option<StreamEvent> {
        self.events.try_recv().ok()
    }

    /// Wait for the next event from a synchronous context.
    /// `None` once the thread has exited and every event was received.
    pub fn blocking_next(&mut self) -> Option<StreamEvent> {
        self.events.blocking_recv()
    }

    /// Wait for the next event from an async context.
    pub async fn next(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Publish new tuning. Applied as a unit at the next cycle boundary.
    pub fn retune(&self, params: TuningParameters) {
        let params = params.clamped();
        info!(
            "Retune requested: {:.3} MHz, {:.3} MS/s, {:.3} MHz bw, {:.0} dB, {} samples",
            params.center_frequency_hz / 1e6,
            params.sample_rate_hz / 1e6,
            params.bandwidth_hz / 1e6,
            params.gain_db,
            params.buffer_size
        );
        self.tuning.send_replace(params);
    }

    /// Tuning most recently published, whether or not applied yet.
    #[must_use]
    pub fn tuning(&self) -> TuningParameters {
        *self.tuning.borrow()
    }

    /// Publish a new threshold snapshot.
    pub fn set_thresholds(&self, thresholds: Thresholds) {
        self.thresholds.send_replace(thresholds.clamped());
    }

    pub fn set_reporting(&self, enabled: bool) {
        self.send_command(StreamCommand::SetReporting(enabled));
    }

    /// Reset the dedup filter and log counter at the next cycle boundary.
    ///
    /// Followed by [`StreamEvent::LogCleared`]; presenters clear their own
    /// log when that arrives, not here.
    pub fn clear_log(&self) {
        self.send_command(StreamCommand::ClearLog);
    }

    fn send_command(&self, command: StreamCommand) {
        if self.commands.send(command).is_err() {
            warn!("Acquisition thread is gone, dropped {command:?}");
        }
    }

    /// Shared metric history, appended once per cycle.
    #[must_use]
    pub fn history(&self) -> Arc<RwLock<MetricHistory>> {
        Arc::clone(&self.history)
    }

    /// Ask the loop to stop after its current cycle.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            info!("Stopping acquisition from {}", self.source);
            self.cancel.cancel();
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stop, discard pending events and wait for the device to be released.
    pub fn shutdown(mut self) {
        self.stop();
        // Unblocks a producer waiting on the full slot
        self.events.close();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Acquisition thread panicked");
            }
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.events.close();
    }
}

impl Worker {
    fn run<A: Acquisition>(mut self, source: &mut A, initial: TuningParameters) {
        let mut active = initial;
        let mut pipeline = CyclePipeline::new(&self.thresholds.borrow(), Utc::now());
        let mut connected = false;

        loop {
            if self.cancel.is_cancelled() {
                info!("Stop requested for {}", source.name());
                break;
            }

            let mut cleared = false;
            while let Ok(command) = self.commands.try_recv() {
                match command {
                    StreamCommand::ClearLog => {
                        pipeline.clear_log();
                        cleared = true;
                    }
                    StreamCommand::SetReporting(enabled) => {
                        info!("Auto-log {}", if enabled { "enabled" } else { "disabled" });
                        self.reporting_enabled = enabled;
                    }
                }
            }
            if cleared && !self.emit(StreamEvent::LogCleared) {
                break;
            }

            if self.tuning.has_changed().unwrap_or(false) {
                let requested = *self.tuning.borrow_and_update();
                match source.configure(&requested) {
                    Ok(()) => {
                        active = requested;
                        if !self.emit(StreamEvent::Retuned(active)) {
                            break;
                        }
                    }
                    Err(e) => {
                        // Keep streaming with the previous tuning
                        warn!("{} rejected new tuning: {e}", source.name());
                        if !self.emit(StreamEvent::Error(e.to_string())) {
                            break;
                        }
                    }
                }
            }

            let thresholds = *self.thresholds.borrow();

            let block = match source.read_block() {
                Ok(block) => block,
                Err(e) => {
                    error!("Acquisition from {} failed: {e}", source.name());
                    let _ = self.emit(StreamEvent::Error(e.to_string()));
                    break;
                }
            };

            let cycle = pipeline.process_block(
                &block,
                &active,
                &thresholds,
                self.reporting_enabled,
                Utc::now(),
            );
            self.history
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .push(cycle.sample);

            if !connected {
                connected = true;
                info!("Receiving from {}", source.name());
                if !self.emit(StreamEvent::Connected {
                    source: source.name().to_string(),
                }) {
                    break;
                }
            }

            if !self.emit(StreamEvent::Cycle(Box::new(cycle))) {
                break;
            }

            if !self.cycle_pause.is_zero() {
                std::thread::sleep(self.cycle_pause);
            }
        }

        source.release();
        info!(
            "Acquisition from {} stopped after {} cycles, {} detections logged",
            source.name(),
            pipeline.cycles(),
            pipeline.log_count()
        );
        let _ = self.emit(StreamEvent::Stopped);
    }

    /// Blocking hand-off; false once the receiving side is gone.
    fn emit(&self, event: StreamEvent) -> bool {
        if self.events.blocking_send(event).is_err() {
            debug!("Event receiver closed");
            return false;
        }
        true
    }
}
