//! Top-level controller
//!
//! [`Pipeline::tick`] is called from the board's main loop as often as it
//! likes. Each call runs, in order: connectivity check, clock maintenance,
//! sampling, upload. None of the steps wait; anything that needs time to pass
//! reports "not yet" and is picked up again on a later tick.
//!
//! The only error a tick returns is fatal. Every other failure is logged,
//! counted in [`PipelineMetrics`] and retried on its own schedule.

use embassy_time::Instant;
use log::{info, warn};

use crate::app_state::{AppError, AppRunState};
use crate::clock::{ClockReconciler, SyncEvent};
use crate::config::Config;
use crate::metrics::PipelineMetrics;
use crate::platform::{Board, Connectivity, FileStore, TimeSource, Transport};
use crate::sampling::{SamplingOutcome, SamplingScheduler};
use crate::sensors::Sensor;
use crate::storage::SampleStore;
use crate::upload::{UploadGate, UploadOutcome, UploadScheduler};

/// Everything that happened during one tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub run_state: AppRunState,
    /// `None` when the link was down and no SNTP traffic was attempted
    pub sync: Option<SyncEvent>,
    pub sampling: SamplingOutcome,
    pub upload: UploadOutcome,
}

pub struct Pipeline<C, T, S, H, F: FileStore> {
    board: Board<C, T, S, H>,
    clock: ClockReconciler,
    store: SampleStore<F>,
    sampling: SamplingScheduler,
    upload: UploadScheduler,
    metrics: PipelineMetrics,
    run_state: AppRunState,
}

impl<C, T, S, H, F> Pipeline<C, T, S, H, F>
where
    C: Connectivity,
    T: TimeSource,
    S: Sensor<2>,
    H: Transport,
    F: FileStore,
{
    /// Both schedulers start their first interval at `boot`.
    pub fn new(config: &Config<'_>, board: Board<C, T, S, H>, store: SampleStore<F>, boot: Instant) -> Self {
        Self {
            board,
            clock: ClockReconciler::new(&config.time, boot),
            store,
            sampling: SamplingScheduler::new(&config.sampling, boot),
            upload: UploadScheduler::new(&config.upload, boot),
            metrics: PipelineMetrics::default(),
            run_state: AppRunState::Uninitialized,
        }
    }

    pub fn tick(&mut self, now: Instant) -> Result<TickReport, AppError> {
        self.metrics.ticks += 1;

        let connected = self.ensure_connected();

        let sync = if connected {
            let event = self.clock.maintain(&mut self.board.time_source, now)?;
            self.metrics.record_sync(&event);
            Some(event)
        } else {
            self.clock.check_sync_bound(now)?;
            None
        };

        // Sampling only needs wall time, so readings keep accumulating while
        // the link is down.
        let sampling = self
            .sampling
            .tick(now, &self.clock, &mut self.board.sensor, &mut self.store);
        self.metrics.record_sampling(&sampling);

        let gate = UploadGate {
            connected,
            time_valid: self.clock.is_synced(),
        };
        let upload = self
            .upload
            .tick(now, gate, &mut self.board.transport, &mut self.store);
        self.metrics.record_upload(&upload);

        self.update_run_state(AppRunState::from_status(connected, self.clock.is_synced()));

        Ok(TickReport {
            run_state: self.run_state,
            sync,
            sampling,
            upload,
        })
    }

    fn ensure_connected(&mut self) -> bool {
        if self.board.connectivity.is_connected() {
            return true;
        }

        self.metrics.reconnect_attempts += 1;
        match self.board.connectivity.reconnect() {
            Ok(()) => {
                let connected = self.board.connectivity.is_connected();
                if connected {
                    info!("Network reconnected");
                }
                connected
            }
            Err(e) => {
                warn!("Reconnect failed: {}", e);
                false
            }
        }
    }

    fn update_run_state(&mut self, next: AppRunState) {
        if next != self.run_state {
            info!("Run state {:?} -> {:?}", self.run_state, next);
            self.run_state = next;
        }
    }

    pub fn run_state(&self) -> AppRunState {
        self.run_state
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn clock(&self) -> &ClockReconciler {
        &self.clock
    }

    pub fn store(&self) -> &SampleStore<F> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut SampleStore<F> {
        &mut self.store
    }

    pub fn board(&self) -> &Board<C, T, S, H> {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut Board<C, T, S, H> {
        &mut self.board
    }

    /// Tear down, keeping the hardware and the buffered readings.
    pub fn into_parts(self) -> (Board<C, T, S, H>, SampleStore<F>) {
        (self.board, self.store)
    }
}
