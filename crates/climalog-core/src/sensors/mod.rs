mod dht;

use thiserror_no_std::Error;

pub use dht::{DHT22, DhtLimits, DhtReadings};

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum SensorError {
    #[error("{sensor}: {operation} failed ({details})")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
        details: &'static str,
    },
    #[error("{sensor}: {quantity} is not a number")]
    NotANumber {
        sensor: &'static str,
        quantity: &'static str,
    },
    #[error("{sensor}: {quantity} {value} outside {min}..={max}")]
    OutOfRange {
        sensor: &'static str,
        quantity: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
}

/// Trait for sensor reading data structures.
/// Provides compile-time guarantees about the number of values and their conversion to arrays.
pub trait SensorReadings<const COUNT: usize> {
    /// Convert the readings into a fixed-size array.
    fn to_array(self) -> [f32; COUNT];
}

/// Trait for sensors that produce typed readings.
///
/// Implementations do their own bus work and return as soon as the
/// conversion result is available; the settle delay is handled by the
/// sampling scheduler, not by the driver.
pub trait Sensor<const COUNT: usize> {
    /// The type of readings this sensor produces.
    type Readings: SensorReadings<COUNT>;

    /// Read the sensor and return typed readings.
    fn read(&mut self) -> Result<Self::Readings, SensorError>;
}

pub mod indices {
    // Positions of each quantity in `SensorReadings::to_array` for a
    // temperature/humidity sensor. Keep these in sync with `DhtReadings`.
    pub const TEMPERATURE: usize = 0;
    pub const HUMIDITY: usize = 1;
}

pub use indices::*;
