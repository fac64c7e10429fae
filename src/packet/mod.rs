//! Packet sources and the wire primitives shared by all sensor families
//!
//! # Example
//! ```no_run
//! // Listen for packets on default port with default timeout,
//! // alternatively pcap files can be used
//! # fn main() -> Result<(), std::io::Error> {
//! use hesai::packet::{PacketSource, UdpSource};
//!
//! let mut listener = UdpSource::new()?;
//! loop {
//!     match listener.next_packet()? {
//!         Some((src_addr, packet)) => {
//!             // hand `packet` to a decoder
//!         },
//!         // timed out or source is exhausted
//!         None => break,
//!     }
//! }
//! # Ok(()) }
//! ```
use std::io;
use std::net::SocketAddr;

use byteorder::{ByteOrder, LE};
use chrono::{TimeZone, Utc};

use crate::error::DecodeError;

mod udp;
pub use self::udp::UdpSource;
mod pcap;
pub use self::pcap::PcapSource;
mod memory;
pub use self::memory::MemorySource;

/// Upper bound of a sensor datagram
pub const MAX_PACKET_SIZE: usize = 1500;
/// Every packet starts with these two bytes
pub const DELIMITER: [u8; 2] = [0xEE, 0xFF];

pub(crate) const PRE_HEADER_SIZE: usize = 6;
pub(crate) const HEADER_SIZE: usize = 6;

pub(crate) const BODY_CRC_SIZE: usize = 4;
pub(crate) const TAIL_CRC_SIZE: usize = 4;
pub(crate) const FUNCTION_SAFETY_SIZE: usize = 17;
pub(crate) const SEQUENCE_SIZE: usize = 4;
pub(crate) const IMU_SIZE: usize = 22;
pub(crate) const SIGNATURE_SIZE: usize = 32;

/// Return modes starting from this value report two echoes per firing
pub const DUAL_RETURN_MODE: u8 = 0x39;

/// Source of raw sensor packets.
pub trait PacketSource {
    /// Get next raw datagram payload together with its sender.
    ///
    /// Will return `Ok(None)` if source is exhausted or timed out.
    fn next_packet(&mut self) -> io::Result<Option<(SocketAddr, &[u8])>>;
}

/// Fields shared by the first 6 bytes of every packet
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PreHeader {
    pub major: u8,
    pub minor: u8,
    pub status_info_version: u8,
}

/// Optional section flags carried in the last header byte
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct HeaderFlags(pub u8);

impl HeaderFlags {
    pub const SEQUENCE: u8 = 0x01;
    pub const IMU: u8 = 0x02;
    pub const FUNCTION_SAFETY: u8 = 0x04;
    pub const CYBER_SECURITY: u8 = 0x08;
    pub const CONFIDENCE: u8 = 0x10;
    pub const SLOPE: u8 = 0x20;
    pub const SELF_DEFINE: u8 = 0x40;

    #[inline(always)]
    fn has(self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    pub fn sequence(self) -> bool { self.has(Self::SEQUENCE) }
    pub fn imu(self) -> bool { self.has(Self::IMU) }
    pub fn function_safety(self) -> bool { self.has(Self::FUNCTION_SAFETY) }
    pub fn cyber_security(self) -> bool { self.has(Self::CYBER_SECURITY) }
    pub fn confidence(self) -> bool { self.has(Self::CONFIDENCE) }
    pub fn slope(self) -> bool { self.has(Self::SLOPE) }
    pub fn self_define(self) -> bool { self.has(Self::SELF_DEFINE) }
}

/// Packet header following the pre-header
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Header {
    pub laser_num: u8,
    pub block_num: u8,
    pub echo_count: u8,
    /// Distance unit in millimetres
    pub dist_unit: u8,
    pub echo_num: u8,
    pub flags: HeaderFlags,
}

impl Header {
    /// Metres per raw distance count
    pub fn distance_scale(&self) -> f32 {
        self.dist_unit as f32 / 1000.
    }
}

/// Validate the delimiter and read pre-header and header.
///
/// The delimiter is checked before anything else is read.
pub fn parse_headers(data: &[u8]) -> Result<(PreHeader, Header), DecodeError> {
    const MIN: usize = PRE_HEADER_SIZE + HEADER_SIZE;
    if data.len() < DELIMITER.len() {
        return Err(DecodeError::Truncated { expected: MIN, actual: data.len() });
    }
    if data[..2] != DELIMITER {
        return Err(DecodeError::InvalidDelimiter(data[0], data[1]));
    }
    if data.len() < MIN {
        return Err(DecodeError::Truncated { expected: MIN, actual: data.len() });
    }
    let pre = PreHeader {
        major: data[2],
        minor: data[3],
        status_info_version: data[4],
    };
    let h = &data[PRE_HEADER_SIZE..MIN];
    let header = Header {
        laser_num: h[0],
        block_num: h[1],
        echo_count: h[2],
        dist_unit: h[3],
        echo_num: h[4],
        flags: HeaderFlags(h[5]),
    };
    Ok((pre, header))
}

/// Check that the packet belongs to the expected protocol version
pub(crate) fn check_version(pre: &PreHeader, major: u8, minor: u8)
    -> Result<(), DecodeError>
{
    if pre.major != major || pre.minor != minor {
        return Err(DecodeError::UnsupportedVersion {
            major: pre.major,
            minor: pre.minor,
        });
    }
    Ok(())
}

/// Offset bookkeeping over a packet buffer.
///
/// Wire sections are located by reserving their lengths one after another;
/// reserving past the end of the buffer is reported as `Truncated` with the
/// size the layout would need.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cursor {
    pos: usize,
}

impl Cursor {
    pub fn new(start: usize) -> Self {
        Self { pos: start }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Reserve `len` bytes and return their start offset
    pub fn reserve(&mut self, len: usize) -> usize {
        let start = self.pos;
        self.pos += len;
        start
    }

    /// Reserve `len` bytes only when `present` is set
    pub fn reserve_if(&mut self, present: bool, len: usize) -> Option<usize> {
        if present { Some(self.reserve(len)) } else { None }
    }

    /// Ensure everything reserved so far fits into `data`
    pub fn check(&self, data: &[u8]) -> Result<(), DecodeError> {
        if self.pos > data.len() {
            return Err(DecodeError::Truncated {
                expected: self.pos,
                actual: data.len(),
            });
        }
        Ok(())
    }
}

/// One channel return as stored on the wire
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ChannelUnit {
    pub distance: u16,
    pub reflectivity: u8,
}

impl ChannelUnit {
    #[inline(always)]
    pub(crate) fn read(buf: &[u8]) -> Self {
        Self { distance: LE::read_u16(&buf[..2]), reflectivity: buf[2] }
    }
}

/// One azimuth block of a packet body
#[derive(Debug, Copy, Clone)]
pub struct Block<'a> {
    /// Azimuth in centi-degrees
    pub azimuth: u16,
    /// Sub centi-degree azimuth in 1/256 steps, zero for spinning sensors
    pub fine_azimuth: u8,
    units: &'a [u8],
    unit_size: usize,
}

impl<'a> Block<'a> {
    /// Channel returns in wire order
    pub fn units(&self) -> impl Iterator<Item = ChannelUnit> + 'a {
        self.units.chunks_exact(self.unit_size).map(ChannelUnit::read)
    }
}

/// Body geometry shared by all packet families
#[derive(Debug, Copy, Clone)]
pub(crate) struct BodyLayout {
    pub start: usize,
    pub blocks: usize,
    pub lasers: usize,
    pub unit_size: usize,
    /// Fine azimuth byte follows the block azimuth
    pub fine_azimuth: bool,
}

impl BodyLayout {
    pub fn block_size(&self) -> usize {
        self.azimuth_size() + self.lasers * self.unit_size
    }

    fn azimuth_size(&self) -> usize {
        if self.fine_azimuth { 3 } else { 2 }
    }

    pub fn size(&self) -> usize {
        self.blocks * self.block_size()
    }

    /// Iterate blocks of an already size-checked packet
    pub fn blocks<'a>(&self, data: &'a [u8]) -> impl Iterator<Item = Block<'a>> + 'a {
        let unit_size = self.unit_size;
        let fine = self.fine_azimuth;
        let az = self.azimuth_size();
        data[self.start..self.start + self.size()]
            .chunks_exact(self.block_size())
            .map(move |b| Block {
                azimuth: LE::read_u16(&b[..2]),
                fine_azimuth: if fine { b[2] } else { 0 },
                units: &b[az..],
                unit_size,
            })
    }
}

/// Combine tail UTC bytes and the microsecond timestamp into microseconds
/// since Unix epoch.
///
/// When the first UTC byte is set the bytes are calendar fields (years since
/// 1900, month, day, hour, minute, second), otherwise bytes 2..6 hold
/// big-endian Unix seconds.
pub fn sensor_timestamp(utc: &[u8; 6], timestamp_us: u32) -> Option<i64> {
    let seconds = if utc[0] != 0 {
        let mut year = utc[0] as i32;
        if year >= 200 {
            year -= 100;
        }
        Utc.with_ymd_and_hms(
            1900 + year,
            utc[1] as u32,
            utc[2] as u32,
            utc[3] as u32,
            utc[4] as u32,
            utc[5] as u32,
        )
        .single()?
        .timestamp()
    } else {
        byteorder::BE::read_u32(&utc[2..6]) as i64
    };
    Some(seconds * 1_000_000 + timestamp_us as i64)
}

/// Copy 6 UTC bytes starting at `offset`
#[inline]
pub(crate) fn read_utc(data: &[u8], offset: usize) -> [u8; 6] {
    let mut utc = [0u8; 6];
    utc.copy_from_slice(&data[offset..offset + 6]);
    utc
}
