//! Durable buffer of timestamped readings
//!
//! Readings are appended to a single text log on the board's file store, one
//! record per line, and the whole log is removed after a confirmed upload.
//! See [`record`] for the line format and [`SampleStore`] for the lifecycle.

pub mod memory;
pub mod record;
mod sample_store;

pub use memory::MemoryFileStore;
pub use sample_store::*;

use serde::Serialize;
use thiserror_no_std::Error;

use crate::platform::FileError;

/// Name of the reading log on the file store
pub const LOG_FILE: &str = "readings.log";

/// Staging file a repaired log is written to before replacing [`LOG_FILE`]
pub const REPAIR_FILE: &str = "readings.tmp";

/// Decimal places kept for temperature and humidity
pub const VALUE_DECIMALS: i32 = 2;

/// One timestamped temperature/humidity measurement.
///
/// Field order here is also the JSON field order of the upload payload.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Unix seconds (with the configured UTC offset applied)
    pub timestamp: u64,
    /// Degrees Celsius
    pub temperature: f32,
    /// Percent relative humidity
    pub humidity: f32,
}

impl Reading {
    /// Creates a reading, rounding both values to [`VALUE_DECIMALS`] places.
    pub fn new(timestamp: u64, temperature: f32, humidity: f32) -> Self {
        Self {
            timestamp,
            temperature: round_value(temperature),
            humidity: round_value(humidity),
        }
    }
}

/// Round to two decimal places, half away from zero.
pub fn round_value(value: f32) -> f32 {
    libm::roundf(value * 100.0) / 100.0
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    #[error("file store: {0}")]
    File(FileError),
    #[error("sample store full ({capacity} records)")]
    Full { capacity: usize },
    #[error("reading does not fit a log record")]
    Encode,
}

impl From<FileError> for StoreError {
    fn from(e: FileError) -> Self {
        StoreError::File(e)
    }
}
