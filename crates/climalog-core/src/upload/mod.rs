//! Periodic upload of buffered readings
//!
//! On each interval boundary the whole sample store is drained, sent as one
//! POST and cleared only on a 2xx answer. Anything else leaves the store as it
//! was, so the next firing resends the same readings plus whatever was
//! sampled meanwhile. Delivery is at-least-once: a 2xx that is lost on the way
//! back, or a failed clear, means the server sees those readings again.

pub mod payload;

use alloc::string::{String, ToString};

use embassy_time::{Duration, Instant};
use log::{debug, info, warn};

use crate::app_state::SchedulerState;
use crate::config::UploadConfig;
use crate::platform::{FileStore, Transport, TransportError};
use crate::storage::{SampleStore, StoreError};

pub use payload::{CONTENT_TYPE_JSON, encode_payload};

/// Conditions the pipeline checks before letting an upload run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadGate {
    pub connected: bool,
    pub time_valid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferReason {
    NoConnectivity,
    NoTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    NotDue,
    /// Due, but the gate is closed. Stays armed.
    Deferred(DeferReason),
    /// Nothing buffered
    Empty,
    Delivered { status: u16, count: usize },
    Rejected { status: u16, count: usize },
    Failed(TransportError),
    StoreFailed(StoreError),
    EncodeFailed,
    /// Server accepted the readings but the store could not be cleared
    ClearFailed(StoreError),
}

pub struct UploadScheduler {
    state: SchedulerState,
    interval: Duration,
    endpoint: String,
    content_type: String,
    deferred_logged: bool,
}

impl UploadScheduler {
    pub fn new(config: &UploadConfig<'_>, start: Instant) -> Self {
        Self {
            state: SchedulerState::new(start),
            interval: config.interval(),
            endpoint: config.endpoint.to_string(),
            content_type: config.content_type.to_string(),
            deferred_logged: false,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn tick<H, F>(
        &mut self,
        now: Instant,
        gate: UploadGate,
        transport: &mut H,
        store: &mut SampleStore<F>,
    ) -> UploadOutcome
    where
        H: Transport,
        F: FileStore,
    {
        if self.state.arm_if_due(now, self.interval) {
            debug!("Upload due");
        }
        if !self.state.pending {
            return UploadOutcome::NotDue;
        }

        let reason = if !gate.connected {
            Some(DeferReason::NoConnectivity)
        } else if !gate.time_valid {
            Some(DeferReason::NoTime)
        } else {
            None
        };
        if let Some(reason) = reason {
            if !self.deferred_logged {
                info!("Upload deferred: {:?}", reason);
                self.deferred_logged = true;
            }
            return UploadOutcome::Deferred(reason);
        }

        self.state.pending = false;
        self.deferred_logged = false;

        let readings = match store.drain() {
            Ok(readings) => readings,
            Err(e) => {
                warn!("Could not read buffered readings: {}", e);
                return UploadOutcome::StoreFailed(e);
            }
        };
        if readings.is_empty() {
            debug!("Nothing to upload");
            return UploadOutcome::Empty;
        }
        let count = readings.len();

        let body = match encode_payload(&readings) {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to serialize {} readings: {}", count, e);
                return UploadOutcome::EncodeFailed;
            }
        };

        match transport.post(&self.endpoint, &self.content_type, &body) {
            Ok(status) if (200..300).contains(&status) => {
                info!("Uploaded {} readings, HTTP {}", count, status);
                match store.clear() {
                    Ok(()) => UploadOutcome::Delivered { status, count },
                    Err(e) => {
                        warn!("Uploaded readings could not be cleared and will be resent: {}", e);
                        UploadOutcome::ClearFailed(e)
                    }
                }
            }
            Ok(status) => {
                warn!("Upload rejected with HTTP {}, keeping {} readings", status, count);
                UploadOutcome::Rejected { status, count }
            }
            Err(e) => {
                warn!("Upload failed, keeping {} readings: {}", count, e);
                UploadOutcome::Failed(e)
            }
        }
    }
}
