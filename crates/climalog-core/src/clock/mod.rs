//! Wall-clock estimate reconciled from SNTP and the monotonic timer
//!
//! The board has no battery-backed RTC. Wall time is known only after an
//! SNTP exchange and is then extrapolated from [`Instant`] until the next
//! one. Every exchange is split across ticks: [`ClockReconciler::request_sync`]
//! sends, [`ClockReconciler::poll_response`] checks for the reply without
//! blocking and gives up after the configured reply timeout.

pub mod sntp;

use embassy_time::{Duration, Instant};
use log::{debug, error, info, warn};

pub use sntp::{NTP_UNIX_OFFSET, SntpError};

use crate::app_state::AppError;
use crate::config::TimeConfig;
use crate::platform::{NTP_PACKET_LEN, TimeSource};

/// Datagrams discarded before each request, so a late reply to an earlier
/// request is not mistaken for the answer to this one
const MAX_STALE_DATAGRAMS: usize = 4;

/// Network time captured at one successful sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeEstimate {
    /// Local Unix seconds reported by the server (UTC offset applied)
    pub epoch_secs: u64,
    /// Monotonic instant the reply was received
    pub synced_at: Instant,
}

impl TimeEstimate {
    pub fn unix_secs_at(&self, now: Instant) -> u64 {
        self.epoch_secs + now.saturating_duration_since(self.synced_at).as_secs()
    }
}

/// What [`ClockReconciler::maintain`] did this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    /// Nothing due
    Idle,
    /// A request was sent
    Requested,
    /// A request is outstanding and still within its timeout
    Awaiting,
    /// A reply was accepted
    Synced(TimeEstimate),
    /// The exchange failed; a new one is scheduled by the retry policy
    Failed(SntpError),
}

pub struct ClockReconciler {
    config: TimeConfig,
    estimate: Option<TimeEstimate>,
    /// Last successful sync, or boot if there was none
    last_sync: Instant,
    /// Send time of the outstanding request
    in_flight: Option<Instant>,
    last_request: Option<Instant>,
}

impl ClockReconciler {
    pub fn new(config: &TimeConfig, boot: Instant) -> Self {
        Self {
            config: *config,
            estimate: None,
            last_sync: boot,
            in_flight: None,
            last_request: None,
        }
    }

    pub fn is_synced(&self) -> bool {
        self.estimate.is_some()
    }

    pub fn estimate(&self) -> Option<TimeEstimate> {
        self.estimate
    }

    pub fn is_awaiting_reply(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Current local Unix seconds, or `0` while no sync has succeeded.
    pub fn now(&self, at: Instant) -> u64 {
        self.estimate.map_or(0, |estimate| estimate.unix_secs_at(at))
    }

    /// Send one SNTP request. Does not wait for the reply.
    pub fn request_sync<T: TimeSource>(&mut self, source: &mut T, now: Instant) -> Result<(), SntpError> {
        let mut stale = [0u8; NTP_PACKET_LEN];
        for _ in 0..MAX_STALE_DATAGRAMS {
            match source.try_recv(&mut stale) {
                Ok(Some(_)) => debug!("Dropping stale SNTP datagram"),
                Ok(None) | Err(_) => break,
            }
        }

        self.last_request = Some(now);
        self.in_flight = None;
        source.send(&sntp::build_request())?;
        self.in_flight = Some(now);
        debug!("SNTP request sent");
        Ok(())
    }

    /// Check for the reply to the outstanding request.
    ///
    /// `Ok(None)` while nothing has arrived (or nothing was requested). A
    /// valid reply replaces the estimate wholesale.
    pub fn poll_response<T: TimeSource>(
        &mut self,
        source: &mut T,
        now: Instant,
    ) -> Result<Option<TimeEstimate>, SntpError> {
        let Some(sent_at) = self.in_flight else {
            return Ok(None);
        };

        let mut packet = [0u8; NTP_PACKET_LEN];
        let len = match source.try_recv(&mut packet) {
            Ok(Some(len)) => len,
            Ok(None) => {
                if now.saturating_duration_since(sent_at) >= self.config.reply_timeout() {
                    self.in_flight = None;
                    return Err(SntpError::Timeout {
                        timeout_ms: self.config.reply_timeout_ms,
                    });
                }
                return Ok(None);
            }
            Err(e) => {
                self.in_flight = None;
                return Err(e.into());
            }
        };
        self.in_flight = None;

        let epoch_secs = sntp::parse_response(&packet, len, self.config.utc_offset_secs())?;
        let estimate = TimeEstimate {
            epoch_secs,
            synced_at: now,
        };
        self.estimate = Some(estimate);
        self.last_sync = now;
        Ok(Some(estimate))
    }

    /// Whether a new request should go out at `now`.
    ///
    /// Unsynced, or after a failed resync, requests repeat every retry delay.
    /// Once synced the next request waits for the resync interval.
    pub fn sync_due(&self, now: Instant) -> bool {
        if self.in_flight.is_some() {
            return false;
        }
        let Some(last_request) = self.last_request else {
            return true;
        };
        let retry_elapsed = now.saturating_duration_since(last_request) >= self.config.retry_delay();
        if !self.is_synced() {
            return retry_elapsed;
        }
        retry_elapsed && now.saturating_duration_since(self.last_sync) >= self.config.resync_interval()
    }

    /// Time since the last successful sync (or boot).
    pub fn unsynced_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_sync)
    }

    /// Fail once the clock has gone too long without a sync.
    pub fn check_sync_bound(&self, now: Instant) -> Result<(), AppError> {
        let elapsed = self.unsynced_for(now);
        if elapsed >= self.config.max_unsynced() {
            let hours = elapsed.as_secs() / 3600;
            error!("No successful time sync for {} h", hours);
            return Err(AppError::ClockDesynchronized { hours });
        }
        Ok(())
    }

    /// Run one step of the sync policy: collect a pending reply, send a
    /// request if one is due, then enforce the desync bound.
    pub fn maintain<T: TimeSource>(&mut self, source: &mut T, now: Instant) -> Result<SyncEvent, AppError> {
        let event = match self.poll_response(source, now) {
            Ok(Some(estimate)) => {
                info!("Time synced: {} s", estimate.epoch_secs);
                SyncEvent::Synced(estimate)
            }
            Ok(None) if self.in_flight.is_some() => SyncEvent::Awaiting,
            Ok(None) if self.sync_due(now) => match self.request_sync(source, now) {
                Ok(()) => SyncEvent::Requested,
                Err(e) => {
                    warn!("Failed to send SNTP request: {}", e);
                    SyncEvent::Failed(e)
                }
            },
            Ok(None) => SyncEvent::Idle,
            Err(e) => {
                warn!("Time sync failed: {}", e);
                SyncEvent::Failed(e)
            }
        };

        self.check_sync_bound(now)?;
        Ok(event)
    }
}
