//! Text log record format.
//!
//! One reading per line, fields in fixed order, values with two decimals,
//! followed by a CRC-8 of everything before the `*`:
//!
//! ```text
//! 1000,21.50,55.25*7B\n
//! ```
//!
//! Records are only ever appended, and a reader needs no more than one
//! record's worth of buffer, so the log can be written and scanned in small
//! chunks. A line without its terminating `\n` is a torn write.

use alloc::vec::Vec;
use core::fmt::Write;

use heapless::String;
use thiserror_no_std::Error;

use super::Reading;
use crate::platform::{FileError, FileStore};

/// Longest encoded record, terminator included
pub const RECORD_MAX_LEN: usize = 48;

/// Bytes fetched from the file store per read call
const CHUNK_LEN: usize = 64;

// CRC-8/NRSC-5
const CRC8_INITIAL: u8 = 0xFF;
const CRC8_POLYNOMIAL: u8 = 0x31;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    #[error("record has no terminator")]
    Truncated,
    #[error("record checksum mismatch")]
    Checksum,
    #[error("record is malformed")]
    Malformed,
    #[error("record exceeds the maximum record length")]
    TooLong,
}

pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = CRC8_INITIAL;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            if crc & 0x80 != 0 {
                crc = (crc << 1) ^ CRC8_POLYNOMIAL;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Encode one reading as a terminated log line.
pub fn encode(reading: &Reading) -> Result<String<RECORD_MAX_LEN>, RecordError> {
    let mut line: String<RECORD_MAX_LEN> = String::new();
    write!(
        line,
        "{},{:.2},{:.2}",
        reading.timestamp, reading.temperature, reading.humidity
    )
    .map_err(|_| RecordError::TooLong)?;

    let crc = crc8(line.as_bytes());
    writeln!(line, "*{:02X}", crc).map_err(|_| RecordError::TooLong)?;
    Ok(line)
}

/// Decode one line, without its `\n`.
pub fn decode(line: &[u8]) -> Result<Reading, RecordError> {
    let text = core::str::from_utf8(line).map_err(|_| RecordError::Malformed)?;
    let (payload, crc_hex) = text.rsplit_once('*').ok_or(RecordError::Malformed)?;
    if crc_hex.len() != 2 {
        return Err(RecordError::Malformed);
    }
    let expected = u8::from_str_radix(crc_hex, 16).map_err(|_| RecordError::Malformed)?;
    if crc8(payload.as_bytes()) != expected {
        return Err(RecordError::Checksum);
    }

    let mut fields = payload.split(',');
    let timestamp = fields
        .next()
        .and_then(|f| f.parse::<u64>().ok())
        .ok_or(RecordError::Malformed)?;
    let temperature = fields
        .next()
        .and_then(|f| f.parse::<f32>().ok())
        .ok_or(RecordError::Malformed)?;
    let humidity = fields
        .next()
        .and_then(|f| f.parse::<f32>().ok())
        .ok_or(RecordError::Malformed)?;
    if fields.next().is_some() {
        return Err(RecordError::Malformed);
    }

    Ok(Reading::new(timestamp, temperature, humidity))
}

/// Result of walking a log file from the start.
#[derive(Debug, Default)]
pub struct LogScan {
    /// Readings decoded before the first bad record
    pub readings: Vec<Reading>,
    /// Length of the prefix made of good records
    pub valid_len: usize,
    /// Bytes looked at, including any bad tail
    pub scanned_len: usize,
    /// First bad record, if any (it starts at `valid_len`)
    pub error: Option<RecordError>,
}

/// Decode records from `name`, stopping at the first bad one or after
/// `limit` bytes. A missing file scans as empty.
pub fn scan<F: FileStore>(
    files: &mut F,
    name: &str,
    limit: Option<usize>,
) -> Result<LogScan, FileError> {
    let mut result = LogScan::default();
    let mut chunk = [0u8; CHUNK_LEN];
    let mut line: heapless::Vec<u8, RECORD_MAX_LEN> = heapless::Vec::new();
    let mut offset = 0;

    'chunks: loop {
        let want = match limit {
            Some(limit) => limit.saturating_sub(offset).min(CHUNK_LEN),
            None => CHUNK_LEN,
        };
        if want == 0 {
            break;
        }

        let read = match files.read(name, offset, &mut chunk[..want]) {
            Ok(0) | Err(FileError::NotFound) => break,
            Ok(read) => read,
            Err(e) => return Err(e),
        };

        for (i, &byte) in chunk[..read].iter().enumerate() {
            if byte == b'\n' {
                match decode(&line) {
                    Ok(reading) => {
                        result.readings.push(reading);
                        result.valid_len = offset + i + 1;
                    }
                    Err(e) => {
                        result.error = Some(e);
                        result.scanned_len = offset + read;
                        break 'chunks;
                    }
                }
                line.clear();
            } else if line.push(byte).is_err() {
                result.error = Some(RecordError::TooLong);
                result.scanned_len = offset + read;
                break 'chunks;
            }
        }
        offset += read;
        result.scanned_len = offset;
    }

    if result.error.is_none() && !line.is_empty() {
        result.error = Some(RecordError::Truncated);
    }
    Ok(result)
}
