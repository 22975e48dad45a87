//! Periodic sensor sampling
//!
//! `IDLE -> PENDING` once the sampling interval has elapsed since the last
//! attempt started, `PENDING -> IDLE` after the settle delay, when the sensor
//! is read exactly once. Failed reads are dropped, never retried early.

use embassy_time::{Duration, Instant};
use log::{debug, warn};

use crate::app_state::SchedulerState;
use crate::clock::ClockReconciler;
use crate::config::SamplingConfig;
use crate::platform::FileStore;
use crate::sensors::{DHT22, DhtLimits, HUMIDITY, Sensor, SensorError, SensorReadings, TEMPERATURE};
use crate::storage::{Reading, SampleStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamplingOutcome {
    NotDue,
    /// Due, but wall time is still unknown
    AwaitingTime,
    /// Attempt started; the read happens after the settle delay
    Requested,
    Settling,
    Stored(Reading),
    ReadFailed(SensorError),
    StoreFailed(Reading, StoreError),
}

pub struct SamplingScheduler {
    state: SchedulerState,
    interval: Duration,
    settle: Duration,
    limits: DhtLimits,
}

impl SamplingScheduler {
    pub fn new(config: &SamplingConfig, start: Instant) -> Self {
        Self {
            state: SchedulerState::new(start),
            interval: config.interval(),
            settle: config.settle(),
            limits: DHT22,
        }
    }

    pub fn with_limits(mut self, limits: DhtLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn tick<S, F>(
        &mut self,
        now: Instant,
        clock: &ClockReconciler,
        sensor: &mut S,
        store: &mut SampleStore<F>,
    ) -> SamplingOutcome
    where
        S: Sensor<2>,
        F: FileStore,
    {
        if !self.state.pending {
            if now.saturating_duration_since(self.state.last_action) < self.interval {
                return SamplingOutcome::NotDue;
            }
            if !clock.is_synced() {
                return SamplingOutcome::AwaitingTime;
            }
            self.state.arm_if_due(now, self.interval);
            debug!("Sample requested");
            if self.settle.as_ticks() > 0 {
                return SamplingOutcome::Requested;
            }
        }

        if now.saturating_duration_since(self.state.last_action) < self.settle {
            return SamplingOutcome::Settling;
        }
        self.state.pending = false;

        let (temperature, humidity) = match self.read(sensor) {
            Ok(values) => values,
            Err(e) => {
                warn!("Sensor read failed, skipping sample: {}", e);
                return SamplingOutcome::ReadFailed(e);
            }
        };

        let reading = Reading::new(clock.now(now), temperature, humidity);
        match store.append(&reading) {
            Ok(()) => {
                debug!(
                    "Stored reading {} s: {} C, {} %",
                    reading.timestamp, reading.temperature, reading.humidity
                );
                SamplingOutcome::Stored(reading)
            }
            Err(e) => {
                warn!("Failed to store reading: {}", e);
                SamplingOutcome::StoreFailed(reading, e)
            }
        }
    }

    fn read<S: Sensor<2>>(&self, sensor: &mut S) -> Result<(f32, f32), SensorError> {
        let values = sensor.read()?.to_array();
        let (temperature, humidity) = (values[TEMPERATURE], values[HUMIDITY]);
        self.limits.check(temperature, humidity)?;
        Ok((temperature, humidity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeConfig;
    use crate::storage::MemoryFileStore;
    use crate::testing::{FakeSensor, FakeTimeSource};

    const UNIX: u64 = 1_700_000_000;

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    fn synced_clock() -> ClockReconciler {
        let mut clock = ClockReconciler::new(&TimeConfig::default(), at(0));
        let mut source = FakeTimeSource::new();
        clock.request_sync(&mut source, at(0)).unwrap();
        source.queue_unix(UNIX);
        clock.poll_response(&mut source, at(0)).unwrap();
        clock
    }

    fn scheduler(interval_ms: u64, settle_ms: u64) -> SamplingScheduler {
        SamplingScheduler::new(
            &SamplingConfig {
                interval_ms,
                settle_ms,
            },
            at(0),
        )
    }

    fn store() -> SampleStore<MemoryFileStore> {
        SampleStore::open(MemoryFileStore::new(), None).unwrap()
    }

    #[test]
    fn test_sampling_timing() {
        let clock = synced_clock();
        let mut sampling = scheduler(4000, 2000);
        let mut sensor = FakeSensor::steady(21.5, 55.25);
        let mut store = store();

        for ms in (0..4000).step_by(100) {
            assert_eq!(
                sampling.tick(at(ms), &clock, &mut sensor, &mut store),
                SamplingOutcome::NotDue
            );
        }
        assert_eq!(
            sampling.tick(at(4000), &clock, &mut sensor, &mut store),
            SamplingOutcome::Requested
        );
        assert!(sampling.state().pending);
        assert_eq!(
            sampling.tick(at(5999), &clock, &mut sensor, &mut store),
            SamplingOutcome::Settling
        );
        assert_eq!(sensor.reads, 0);

        let outcome = sampling.tick(at(6000), &clock, &mut sensor, &mut store);
        assert_eq!(outcome, SamplingOutcome::Stored(Reading::new(UNIX + 6, 21.5, 55.25)));
        assert!(!sampling.state().pending);
        assert_eq!(sensor.reads, 1);
        assert_eq!(store.len(), 1);

        // Next attempt is a full interval after the previous one started
        assert_eq!(
            sampling.tick(at(7999), &clock, &mut sensor, &mut store),
            SamplingOutcome::NotDue
        );
        assert_eq!(
            sampling.tick(at(8000), &clock, &mut sensor, &mut store),
            SamplingOutcome::Requested
        );
    }

    #[test]
    fn test_nan_abandons_attempt() {
        let clock = synced_clock();
        let mut sampling = scheduler(4000, 2000);
        let mut sensor = FakeSensor::steady(21.5, 55.25).then_nan();
        let mut store = store();

        sampling.tick(at(4000), &clock, &mut sensor, &mut store);
        assert!(matches!(
            sampling.tick(at(6000), &clock, &mut sensor, &mut store),
            SamplingOutcome::ReadFailed(SensorError::NotANumber { .. })
        ));
        assert!(store.is_empty());
        assert!(!sampling.state().pending);

        // No retry until 4000 + 4000
        assert_eq!(
            sampling.tick(at(7999), &clock, &mut sensor, &mut store),
            SamplingOutcome::NotDue
        );
        assert_eq!(sensor.reads, 1);
        assert_eq!(
            sampling.tick(at(8000), &clock, &mut sensor, &mut store),
            SamplingOutcome::Requested
        );
    }

    #[test]
    fn test_platform_read_failure_abandons_attempt() {
        let clock = synced_clock();
        let mut sampling = scheduler(1000, 0);
        let failure = SensorError::ReadFailed {
            sensor: "DHT22",
            operation: "read",
            details: "no response",
        };
        let mut sensor = FakeSensor::steady(20.0, 40.0).then(Err(failure));
        let mut store = store();

        assert_eq!(
            sampling.tick(at(1000), &clock, &mut sensor, &mut store),
            SamplingOutcome::ReadFailed(failure)
        );
        assert!(store.is_empty());
    }

    #[test]
    fn test_out_of_range_is_a_read_failure() {
        let clock = synced_clock();
        let mut sampling = scheduler(1000, 0);
        let mut sensor = FakeSensor::steady(20.0, 40.0).then(Ok(crate::sensors::DhtReadings {
            temperature_celsius: 150.0,
            humidity_percent: 40.0,
        }));
        let mut store = store();

        assert!(matches!(
            sampling.tick(at(1000), &clock, &mut sensor, &mut store),
            SamplingOutcome::ReadFailed(SensorError::OutOfRange { .. })
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_zero_settle_reads_in_same_tick() {
        let clock = synced_clock();
        let mut sampling = scheduler(1000, 0);
        let mut sensor = FakeSensor::steady(19.994, 40.006);
        let mut store = store();

        let outcome = sampling.tick(at(1000), &clock, &mut sensor, &mut store);
        let SamplingOutcome::Stored(reading) = outcome else {
            panic!("expected a stored reading, got {outcome:?}");
        };
        assert_eq!(reading.timestamp, UNIX + 1);
        assert_eq!(reading, Reading::new(UNIX + 1, 19.99, 40.01));
    }

    #[test]
    fn test_no_sample_without_time() {
        let clock = ClockReconciler::new(&TimeConfig::default(), at(0));
        let mut sampling = scheduler(4000, 2000);
        let mut sensor = FakeSensor::steady(21.5, 55.25);
        let mut store = store();

        for ms in [4000, 6000, 60_000] {
            assert_eq!(
                sampling.tick(at(ms), &clock, &mut sensor, &mut store),
                SamplingOutcome::AwaitingTime
            );
        }
        assert_eq!(sensor.reads, 0);
        assert!(!sampling.state().pending);
    }

    #[test]
    fn test_store_failure_returns_to_idle() {
        let clock = synced_clock();
        let mut sampling = scheduler(1000, 0);
        let mut sensor = FakeSensor::steady(21.5, 55.25);
        let mut store = SampleStore::open(MemoryFileStore::new(), Some(1)).unwrap();

        assert!(matches!(
            sampling.tick(at(1000), &clock, &mut sensor, &mut store),
            SamplingOutcome::Stored(_)
        ));
        assert!(matches!(
            sampling.tick(at(2000), &clock, &mut sensor, &mut store),
            SamplingOutcome::StoreFailed(_, StoreError::Full { capacity: 1 })
        ));
        assert!(!sampling.state().pending);
        assert_eq!(store.len(), 1);
    }
}
