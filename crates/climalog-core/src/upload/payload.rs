//! Upload request body
//!
//! One JSON array holding every buffered reading, oldest first:
//!
//! ```text
//! [{"timestamp":1000,"temperature":21.5,"humidity":55.25}, ...]
//! ```

use alloc::vec::Vec;

use crate::storage::Reading;

pub const CONTENT_TYPE_JSON: &str = "application/json";

pub fn encode_payload(readings: &[Reading]) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(readings)
}
