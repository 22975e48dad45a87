//! In-memory fakes of the platform traits for unit tests

use alloc::collections::VecDeque;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::clock::NTP_UNIX_OFFSET;
use crate::platform::{
    Connectivity, ConnectivityError, DatagramError, FileError, FileStore, NTP_PACKET_LEN,
    TimeSource, Transport, TransportError,
};
use crate::sensors::{DhtReadings, Sensor, SensorError};
use crate::storage::MemoryFileStore;

pub struct FakeConnectivity {
    pub connected: bool,
    pub reconnect_succeeds: bool,
    pub reconnects: usize,
}

impl FakeConnectivity {
    pub fn up() -> Self {
        Self {
            connected: true,
            reconnect_succeeds: true,
            reconnects: 0,
        }
    }

    pub fn down() -> Self {
        Self {
            connected: false,
            reconnect_succeeds: false,
            reconnects: 0,
        }
    }
}

impl Connectivity for FakeConnectivity {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn reconnect(&mut self) -> Result<(), ConnectivityError> {
        self.reconnects += 1;
        if self.reconnect_succeeds {
            self.connected = true;
            Ok(())
        } else {
            Err(ConnectivityError::AssociationFailed)
        }
    }
}

/// Datagram endpoint that only answers when a reply is queued.
#[derive(Default)]
pub struct FakeTimeSource {
    pub sent: usize,
    pub fail_send: bool,
    inbox: VecDeque<([u8; NTP_PACKET_LEN], usize)>,
}

impl FakeTimeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a stratum 2 server reply carrying `ntp_secs`.
    pub fn queue_reply(&mut self, ntp_secs: u32) {
        self.queue_raw(server_reply(ntp_secs), NTP_PACKET_LEN);
    }

    /// Queue a reply carrying local unix seconds `unix_secs` (no offset).
    pub fn queue_unix(&mut self, unix_secs: u64) {
        self.queue_reply((unix_secs + NTP_UNIX_OFFSET) as u32);
    }

    pub fn queue_raw(&mut self, packet: [u8; NTP_PACKET_LEN], len: usize) {
        self.inbox.push_back((packet, len));
    }
}

pub fn server_reply(ntp_secs: u32) -> [u8; NTP_PACKET_LEN] {
    let mut packet = [0u8; NTP_PACKET_LEN];
    // LI=0, VN=4, Mode=4
    packet[0] = 0x24;
    packet[1] = 2;
    packet[40..44].copy_from_slice(&ntp_secs.to_be_bytes());
    packet
}

impl TimeSource for FakeTimeSource {
    fn send(&mut self, _packet: &[u8; NTP_PACKET_LEN]) -> Result<(), DatagramError> {
        if self.fail_send {
            return Err(DatagramError::Send);
        }
        self.sent += 1;
        Ok(())
    }

    fn try_recv(&mut self, buf: &mut [u8; NTP_PACKET_LEN]) -> Result<Option<usize>, DatagramError> {
        Ok(self.inbox.pop_front().map(|(packet, len)| {
            *buf = packet;
            len
        }))
    }
}

/// Sensor that plays back scripted results, then repeats `fallback`.
pub struct FakeSensor {
    pub reads: usize,
    pub fallback: DhtReadings,
    script: VecDeque<Result<DhtReadings, SensorError>>,
}

impl FakeSensor {
    pub fn steady(temperature_celsius: f32, humidity_percent: f32) -> Self {
        Self {
            reads: 0,
            fallback: DhtReadings {
                temperature_celsius,
                humidity_percent,
            },
            script: VecDeque::new(),
        }
    }

    pub fn then(mut self, result: Result<DhtReadings, SensorError>) -> Self {
        self.script.push_back(result);
        self
    }

    pub fn then_nan(self) -> Self {
        self.then(Ok(DhtReadings {
            temperature_celsius: f32::NAN,
            humidity_percent: f32::NAN,
        }))
    }
}

impl Sensor<2> for FakeSensor {
    type Readings = DhtReadings;

    fn read(&mut self) -> Result<DhtReadings, SensorError> {
        self.reads += 1;
        self.script.pop_front().unwrap_or(Ok(self.fallback))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub url: String,
    pub content_type: String,
    pub body: Vec<u8>,
}

/// HTTP client that records every request and answers from a script
/// (200 once the script runs out).
#[derive(Default)]
pub struct FakeTransport {
    pub posts: Vec<Post>,
    responses: VecDeque<Result<u16, TransportError>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, response: Result<u16, TransportError>) -> Self {
        self.responses.push_back(response);
        self
    }
}

impl Transport for FakeTransport {
    fn post(&mut self, url: &str, content_type: &str, body: &[u8]) -> Result<u16, TransportError> {
        self.posts.push(Post {
            url: url.to_string(),
            content_type: content_type.to_string(),
            body: body.to_vec(),
        });
        self.responses.pop_front().unwrap_or(Ok(200))
    }
}

/// [`MemoryFileStore`] with switchable I/O failures.
#[derive(Default)]
pub struct FaultyFileStore {
    pub inner: MemoryFileStore,
    pub fail_append: bool,
    pub fail_read: bool,
    pub fail_remove: bool,
    pub fail_rename: bool,
}

impl FaultyFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite `name` with `data`, bypassing the failure switches.
    pub fn replace(&mut self, name: &str, data: &[u8]) {
        let _ = self.inner.remove(name);
        self.inner.append(name, data).unwrap();
    }
}

impl FileStore for FaultyFileStore {
    fn mount(&mut self) -> Result<(), FileError> {
        self.inner.mount()
    }

    fn unmount(&mut self) -> Result<(), FileError> {
        self.inner.unmount()
    }

    fn append(&mut self, name: &str, data: &[u8]) -> Result<(), FileError> {
        if self.fail_append {
            return Err(FileError::Io);
        }
        self.inner.append(name, data)
    }

    fn read(&mut self, name: &str, offset: usize, buf: &mut [u8]) -> Result<usize, FileError> {
        if self.fail_read {
            return Err(FileError::Io);
        }
        self.inner.read(name, offset, buf)
    }

    fn remove(&mut self, name: &str) -> Result<(), FileError> {
        if self.fail_remove {
            return Err(FileError::Io);
        }
        self.inner.remove(name)
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), FileError> {
        if self.fail_rename {
            return Err(FileError::Io);
        }
        self.inner.rename(from, to)
    }
}
