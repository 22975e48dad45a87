//! SNTP packet handling
//!
//! Only the parts of RFC 4330 a client needs: build a mode 3 request and
//! pull the transmit timestamp out of a validated reply.

use thiserror_no_std::Error;

use crate::platform::{DatagramError, NTP_PACKET_LEN};

/// Seconds between the NTP era start (1900-01-01) and the Unix epoch
pub const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

/// Length of one 32-bit NTP era in seconds
const NTP_ERA_SECS: u64 = 1 << 32;

/// LI=0, VN=3, Mode=3 (client)
const CLIENT_REQUEST_HEADER: u8 = 0x1B;

const MODE_SERVER: u8 = 4;
const MODE_BROADCAST: u8 = 5;
const LEAP_UNSYNCHRONIZED: u8 = 3;
/// Stratum 16 and above means the server is unsynchronized
const MAX_STRATUM: u8 = 15;

/// Offset of the transmit timestamp seconds
const TRANSMIT_SECS: usize = 40;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SntpError {
    #[error("network: {0}")]
    Network(DatagramError),
    #[error("no reply within {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    #[error("invalid response packet")]
    InvalidResponse,
    #[error("server stratum {0} not accepted")]
    InvalidStratum(u8),
    #[error("server reports an unsynchronized clock")]
    Unsynchronized,
}

impl From<DatagramError> for SntpError {
    fn from(e: DatagramError) -> Self {
        SntpError::Network(e)
    }
}

pub fn build_request() -> [u8; NTP_PACKET_LEN] {
    let mut packet = [0u8; NTP_PACKET_LEN];
    packet[0] = CLIENT_REQUEST_HEADER;
    packet
}

/// Validate a reply and convert its transmit timestamp to local Unix
/// seconds. `len` is the datagram length reported by the socket.
pub fn parse_response(
    packet: &[u8; NTP_PACKET_LEN],
    len: usize,
    utc_offset_secs: i64,
) -> Result<u64, SntpError> {
    if len < NTP_PACKET_LEN {
        return Err(SntpError::InvalidResponse);
    }

    let leap = packet[0] >> 6;
    let mode = packet[0] & 0x07;
    let stratum = packet[1];

    if mode != MODE_SERVER && mode != MODE_BROADCAST {
        return Err(SntpError::InvalidResponse);
    }
    if leap == LEAP_UNSYNCHRONIZED {
        return Err(SntpError::Unsynchronized);
    }
    if stratum == 0 || stratum > MAX_STRATUM {
        return Err(SntpError::InvalidStratum(stratum));
    }

    let ntp_secs = u32::from_be_bytes([
        packet[TRANSMIT_SECS],
        packet[TRANSMIT_SECS + 1],
        packet[TRANSMIT_SECS + 2],
        packet[TRANSMIT_SECS + 3],
    ]) as u64;
    if ntp_secs == 0 {
        return Err(SntpError::InvalidResponse);
    }

    // Seconds below the Unix epoch offset belong to era 1 (from 2036-02-07)
    let unix = if ntp_secs >= NTP_UNIX_OFFSET {
        ntp_secs - NTP_UNIX_OFFSET
    } else {
        ntp_secs + NTP_ERA_SECS - NTP_UNIX_OFFSET
    };
    Ok((unix as i64).saturating_add(utc_offset_secs).max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(header: u8, stratum: u8, ntp_secs: u32) -> [u8; NTP_PACKET_LEN] {
        let mut packet = [0u8; NTP_PACKET_LEN];
        packet[0] = header;
        packet[1] = stratum;
        packet[TRANSMIT_SECS..TRANSMIT_SECS + 4].copy_from_slice(&ntp_secs.to_be_bytes());
        packet
    }

    #[test]
    fn test_request_header() {
        let packet = build_request();
        assert_eq!(packet[0], 0x1B);
        assert!(packet[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_parse_converts_to_unix() {
        // 2023-11-14T22:13:20Z
        let ntp = (1_700_000_000 + NTP_UNIX_OFFSET) as u32;
        let packet = reply(0x24, 2, ntp);
        assert_eq!(parse_response(&packet, 48, 0), Ok(1_700_000_000));
    }

    #[test]
    fn test_parse_applies_offset() {
        let ntp = (1_700_000_000 + NTP_UNIX_OFFSET) as u32;
        let packet = reply(0x24, 2, ntp);
        assert_eq!(parse_response(&packet, 48, 2 * 3600), Ok(1_700_007_200));
        assert_eq!(parse_response(&packet, 48, -5 * 3600), Ok(1_699_982_000));
    }

    #[test]
    fn test_short_packet_rejected() {
        let packet = reply(0x24, 2, 3_900_000_000);
        assert_eq!(parse_response(&packet, 47, 0), Err(SntpError::InvalidResponse));
    }

    #[test]
    fn test_client_mode_rejected() {
        // Our own request echoed back
        let packet = reply(0x1B, 2, 3_900_000_000);
        assert_eq!(parse_response(&packet, 48, 0), Err(SntpError::InvalidResponse));
    }

    #[test]
    fn test_stratum_validation() {
        let ntp = 3_900_000_000;
        assert_eq!(
            parse_response(&reply(0x24, 0, ntp), 48, 0),
            Err(SntpError::InvalidStratum(0))
        );
        assert_eq!(
            parse_response(&reply(0x24, 16, ntp), 48, 0),
            Err(SntpError::InvalidStratum(16))
        );
        assert!(parse_response(&reply(0x24, 15, ntp), 48, 0).is_ok());
    }

    #[test]
    fn test_unsynchronized_server_rejected() {
        // LI=3, VN=4, Mode=4
        let packet = reply(0xE4, 2, 3_900_000_000);
        assert_eq!(parse_response(&packet, 48, 0), Err(SntpError::Unsynchronized));
    }

    #[test]
    fn test_era_one_timestamp_after_2036() {
        let packet = reply(0x24, 2, 1000);
        assert_eq!(parse_response(&packet, 48, 0), Ok(2_085_979_496));

        // Last second of era 0 and first of era 1 are consecutive
        let end = parse_response(&reply(0x24, 2, u32::MAX), 48, 0).unwrap();
        let start = parse_response(&reply(0x24, 2, 1), 48, 0).unwrap();
        assert_eq!(start, end + 2);
    }

    #[test]
    fn test_zero_transmit_timestamp_rejected() {
        let packet = reply(0x24, 2, 0);
        assert_eq!(parse_response(&packet, 48, 0), Err(SntpError::InvalidResponse));
    }
}
