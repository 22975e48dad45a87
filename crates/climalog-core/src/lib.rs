//! Hardware-independent core library for climalog
//!
//! This crate contains all platform-agnostic logic for the climalog
//! temperature/humidity node: network time reconciliation, the durable
//! sample log, the sampling and upload schedulers, and the pipeline that
//! ticks them in order.
//!
//! Everything the board provides (Wi-Fi, the DHT driver, the UDP socket used
//! for SNTP, the HTTP client and the flash file system) is reached through the
//! traits in [`platform`] and [`sensors`].
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets and desktop hosts (for the simulator and tests).

#![no_std]

extern crate alloc;

pub mod app_state;
pub mod clock;
pub mod config;
pub mod metrics;
pub mod pipeline;
pub mod platform;
pub mod sampling;
pub mod sensors;
pub mod storage;
pub mod upload;

#[cfg(test)]
pub(crate) mod testing;
