//! Host implementations of the climalog platform traits

use std::error::Error as _;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

use climalog_core::config::InternetConfig;
use climalog_core::platform::{
    Connectivity, ConnectivityError, DatagramError, NTP_PACKET_LEN, TimeSource, Transport,
    TransportError,
};
use climalog_core::sensors::{DhtReadings, Sensor, SensorError};
use log::{debug, info, warn};

// ---------------------------------------------------------------------------
// Wi-Fi
// ---------------------------------------------------------------------------

/// Link that drops for `outage` at the end of every `period`, to exercise
/// buffering and deferred uploads.
pub struct SimulatedWifi {
    ssid: String,
    /// WPA2 passphrase, empty for an open network
    passphrase: String,
    started: Instant,
    outages: Option<(Duration, Duration)>,
}

impl SimulatedWifi {
    pub fn stable(network: &InternetConfig<'_>) -> Self {
        Self {
            ssid: network.ssid.to_string(),
            passphrase: network.password.to_string(),
            started: Instant::now(),
            outages: None,
        }
    }

    pub fn flaky(network: &InternetConfig<'_>, period: Duration, outage: Duration) -> Self {
        Self {
            outages: Some((period, outage.min(period))),
            ..Self::stable(network)
        }
    }

    pub fn security(&self) -> &'static str {
        if self.passphrase.is_empty() { "open" } else { "WPA2-PSK" }
    }

    fn in_outage(&self) -> bool {
        let Some((period, outage)) = self.outages else {
            return false;
        };
        let phase = self.started.elapsed().as_millis() % period.as_millis().max(1);
        phase >= (period - outage).as_millis()
    }
}

impl Connectivity for SimulatedWifi {
    fn is_connected(&self) -> bool {
        !self.in_outage()
    }

    fn reconnect(&mut self) -> Result<(), ConnectivityError> {
        if self.in_outage() {
            return Err(ConnectivityError::AssociationFailed);
        }
        info!("Associated with '{}' ({})", self.ssid, self.security());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SNTP socket
// ---------------------------------------------------------------------------

/// Non-blocking UDP socket aimed at one NTP server.
pub struct UdpTimeSource {
    server: String,
    /// Address the last request went to; replies from anywhere else are dropped
    server_addr: Option<SocketAddr>,
    socket: Option<UdpSocket>,
}

impl UdpTimeSource {
    pub fn new(server: &str) -> Self {
        Self {
            server: server.to_string(),
            server_addr: None,
            socket: None,
        }
    }

    fn socket(&mut self) -> Result<&UdpSocket, DatagramError> {
        if self.socket.is_none() {
            let socket = UdpSocket::bind("0.0.0.0:0").map_err(|_| DatagramError::NotBound)?;
            socket
                .set_nonblocking(true)
                .map_err(|_| DatagramError::NotBound)?;
            self.socket = Some(socket);
        }
        self.socket.as_ref().ok_or(DatagramError::NotBound)
    }
}

impl TimeSource for UdpTimeSource {
    fn send(&mut self, packet: &[u8; NTP_PACKET_LEN]) -> Result<(), DatagramError> {
        let server = self
            .server
            .to_socket_addrs()
            .map_err(|_| DatagramError::Resolve)?
            .find(|addr| addr.is_ipv4())
            .ok_or(DatagramError::Resolve)?;
        debug!("SNTP request to {}", server);
        self.socket()?
            .send_to(packet, server)
            .map_err(|_| DatagramError::Send)?;
        self.server_addr = Some(server);
        Ok(())
    }

    fn try_recv(&mut self, buf: &mut [u8; NTP_PACKET_LEN]) -> Result<Option<usize>, DatagramError> {
        let Some(socket) = self.socket.as_ref() else {
            return Err(DatagramError::NotBound);
        };
        loop {
            match socket.recv_from(buf) {
                Ok((len, from)) if Some(from) == self.server_addr => return Ok(Some(len)),
                Ok((len, from)) => debug!("Dropped {} byte datagram from {}", len, from),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(_) => return Err(DatagramError::Receive),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

fn truncated(message: &str) -> heapless::String<64> {
    let mut out = heapless::String::new();
    for c in message.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

impl Transport for HttpTransport {
    fn post(&mut self, url: &str, content_type: &str, body: &[u8]) -> Result<u16, TransportError> {
        match self
            .agent
            .post(url)
            .set("Content-Type", content_type)
            .send_bytes(body)
        {
            Ok(response) => Ok(response.status()),
            // Non-2xx statuses are an answer, not a transport failure
            Err(ureq::Error::Status(code, _)) => Ok(code),
            Err(ureq::Error::Transport(transport)) => {
                let timed_out = transport
                    .source()
                    .and_then(|source| source.downcast_ref::<io::Error>())
                    .is_some_and(|e| {
                        matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
                    });
                if timed_out {
                    return Err(TransportError::Timeout);
                }
                match transport.kind() {
                    ureq::ErrorKind::Dns | ureq::ErrorKind::ConnectionFailed => {
                        Err(TransportError::Connect)
                    }
                    _ => Err(TransportError::Other(truncated(&transport.to_string()))),
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Sensor
// ---------------------------------------------------------------------------

/// Synthetic DHT22: slow sinusoidal drift, with a NaN every `glitch_every`
/// reads the way a real single-wire bus occasionally returns garbage.
pub struct MockDht {
    started: Instant,
    reads: u32,
    glitch_every: u32,
}

impl MockDht {
    pub fn new(glitch_every: u32) -> Self {
        Self {
            started: Instant::now(),
            reads: 0,
            glitch_every,
        }
    }
}

impl Sensor<2> for MockDht {
    type Readings = DhtReadings;

    fn read(&mut self) -> Result<DhtReadings, SensorError> {
        self.reads += 1;
        if self.glitch_every > 0 && self.reads % self.glitch_every == 0 {
            warn!("Simulated DHT bus glitch");
            return Ok(DhtReadings {
                temperature_celsius: f32::NAN,
                humidity_percent: f32::NAN,
            });
        }

        let t = self.started.elapsed().as_secs_f64();
        // Temperature: 20–26 °C sinusoidal with slow drift
        let temperature = 23.0 + 3.0 * (t / 120.0).sin() + 0.5 * (t / 37.0).cos();
        // Humidity: 40–60 % with a different period
        let humidity = 50.0 + 10.0 * (t / 180.0).sin() + 2.0 * (t / 23.0).cos();

        Ok(DhtReadings {
            temperature_celsius: temperature as f32,
            humidity_percent: humidity as f32,
        })
    }
}
