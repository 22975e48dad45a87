//! Application-wide state and error types for climalog

use embassy_time::{Duration, Instant};
use thiserror_no_std::Error;

use crate::storage::StoreError;

/// Coarse lifecycle of the node, derived each tick from connectivity and
/// clock status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppRunState {
    Uninitialized,
    WifiConnecting,
    TimeSyncing,
    SensorsRunning,
    /// Time is known but the link is down: readings keep accumulating.
    Buffering,
}

impl AppRunState {
    pub const fn from_status(connected: bool, time_known: bool) -> Self {
        match (connected, time_known) {
            (false, false) => Self::WifiConnecting,
            (true, false) => Self::TimeSyncing,
            (true, true) => Self::SensorsRunning,
            (false, true) => Self::Buffering,
        }
    }
}

/// Conditions that stop the pipeline. Everything else is retried in place.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppError {
    #[error("no successful time sync for {hours} h, restart required")]
    ClockDesynchronized { hours: u64 },
    #[error("sample store unavailable: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Storage(e)
    }
}

/// Timer and trigger flag of one scheduler.
///
/// `last_action` is the instant the current (or last) attempt was raised;
/// intervals are measured from it, never from when an attempt finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerState {
    pub last_action: Instant,
    pub pending: bool,
}

impl SchedulerState {
    pub const fn new(start: Instant) -> Self {
        Self {
            last_action: start,
            pending: false,
        }
    }

    /// Raise the trigger if `interval` has elapsed. Returns `true` on the
    /// tick the trigger is raised.
    pub fn arm_if_due(&mut self, now: Instant, interval: Duration) -> bool {
        if self.pending || now.saturating_duration_since(self.last_action) < interval {
            return false;
        }
        self.pending = true;
        self.last_action = now;
        true
    }
}
