//! Board collaborators the pipeline depends on
//!
//! The pipeline never touches hardware directly. Each board (or the desktop
//! simulator) implements these traits and hands the implementations to
//! [`Pipeline::new`](crate::pipeline::Pipeline::new) bundled in a [`Board`].
//!
//! All methods are expected to return promptly. The only blocking call
//! allowed is [`Connectivity::reconnect`], which may retry internally.

use heapless::String;
use thiserror_no_std::Error;

/// Size of an SNTP packet without extension fields
pub const NTP_PACKET_LEN: usize = 48;

/// Wi-Fi association errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    #[error("association with access point failed")]
    AssociationFailed,
    #[error("reconnect timed out")]
    Timeout,
}

/// Network link status and recovery
pub trait Connectivity {
    fn is_connected(&self) -> bool;

    /// Re-associate with the configured network. May block while the
    /// platform retries, but must eventually return.
    fn reconnect(&mut self) -> Result<(), ConnectivityError>;
}

/// UDP socket errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatagramError {
    #[error("socket not bound")]
    NotBound,
    #[error("host name resolution failed")]
    Resolve,
    #[error("datagram send failed")]
    Send,
    #[error("datagram receive failed")]
    Receive,
}

/// Datagram endpoint pointed at an NTP server
pub trait TimeSource {
    /// Send one request packet. Fire-and-forget.
    fn send(&mut self, packet: &[u8; NTP_PACKET_LEN]) -> Result<(), DatagramError>;

    /// Non-blocking receive. `Ok(None)` when nothing has arrived, otherwise
    /// the number of bytes the datagram carried (may exceed the buffer).
    fn try_recv(&mut self, buf: &mut [u8; NTP_PACKET_LEN]) -> Result<Option<usize>, DatagramError>;
}

/// HTTP client errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection to endpoint failed")]
    Connect,
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Other(String<64>),
}

/// HTTP POST capability
pub trait Transport {
    /// POST `body` and return the response status code.
    fn post(&mut self, url: &str, content_type: &str, body: &[u8]) -> Result<u16, TransportError>;
}

/// Flash file system errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileError {
    #[error("file system not mounted")]
    NotMounted,
    #[error("file not found")]
    NotFound,
    #[error("no space left on volume")]
    NoSpace,
    #[error("i/o error")]
    Io,
}

/// Byte-oriented file store (SPIFFS/LittleFS style)
pub trait FileStore {
    fn mount(&mut self) -> Result<(), FileError>;

    fn unmount(&mut self) -> Result<(), FileError>;

    /// Append `data` to `name`, creating the file if needed.
    fn append(&mut self, name: &str, data: &[u8]) -> Result<(), FileError>;

    /// Read from `offset` into `buf`. Returns the number of bytes read, `0`
    /// at end of file, or [`FileError::NotFound`] if the file does not exist.
    fn read(&mut self, name: &str, offset: usize, buf: &mut [u8]) -> Result<usize, FileError>;

    /// Delete `name`. Missing files report [`FileError::NotFound`].
    fn remove(&mut self, name: &str) -> Result<(), FileError>;

    /// Replace `to` with `from` in one step. A failed rename leaves both
    /// files as they were.
    fn rename(&mut self, from: &str, to: &str) -> Result<(), FileError>;
}

/// Hardware handles owned by the pipeline
pub struct Board<C, T, S, H> {
    pub connectivity: C,
    pub time_source: T,
    pub sensor: S,
    pub transport: H,
}
