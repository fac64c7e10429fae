//! Pandar128 packet layout, protocol version 1.4
//!
//! ```text
//! pre-header 6 | header 6 | blocks | body CRC 4 | function safety 17?
//! | tail 26 | sequence 4? | IMU 22? | tail CRC 4 | signature 32?
//! ```
//! Sections marked `?` are present only when the matching header flag is set.
use byteorder::{ByteOrder, LE};

use crate::error::DecodeError;
use crate::packet::{
    self, BodyLayout, Block, Cursor, Header, PreHeader, BODY_CRC_SIZE,
    FUNCTION_SAFETY_SIZE, HEADER_SIZE, IMU_SIZE, PRE_HEADER_SIZE,
    SEQUENCE_SIZE, SIGNATURE_SIZE, TAIL_CRC_SIZE,
};

pub const VERSION_MAJOR: u8 = 1;
pub const VERSION_MINOR: u8 = 4;

const TAIL_SIZE: usize = 26;

/// Tail section
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Tail {
    pub reserved: [[u8; 3]; 3],
    pub azimuth_flag: u16,
    pub running_mode: u8,
    pub return_mode: u8,
    /// RPM
    pub motor_speed: u16,
    pub utc: [u8; 6],
    /// Microseconds within the UTC second
    pub timestamp: u32,
    pub factory_info: u8,
}

impl Tail {
    fn read(b: &[u8]) -> Self {
        let status = |i: usize| [b[i], b[i + 1], b[i + 2]];
        Self {
            reserved: [status(0), status(3), status(6)],
            azimuth_flag: LE::read_u16(&b[9..11]),
            running_mode: b[11],
            return_mode: b[12],
            motor_speed: LE::read_u16(&b[13..15]),
            utc: packet::read_utc(b, 15),
            timestamp: LE::read_u32(&b[21..25]),
            factory_info: b[25],
        }
    }
}

/// Validated view over a P128 packet
#[derive(Debug, Clone)]
pub struct Packet<'a> {
    data: &'a [u8],
    pub pre_header: PreHeader,
    pub header: Header,
    body: BodyLayout,
    tail: usize,
    sequence: Option<usize>,
    imu: Option<usize>,
}

impl<'a> Packet<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self, DecodeError> {
        let (pre_header, header) = packet::parse_headers(data)?;
        packet::check_version(&pre_header, VERSION_MAJOR, VERSION_MINOR)?;
        let flags = header.flags;

        let mut c = Cursor::new(PRE_HEADER_SIZE + HEADER_SIZE);
        let body = BodyLayout {
            start: c.position(),
            blocks: header.block_num as usize,
            lasers: header.laser_num as usize,
            unit_size: if flags.confidence() { 4 } else { 3 },
            fine_azimuth: false,
        };
        c.reserve(body.size());
        c.reserve(BODY_CRC_SIZE);
        c.reserve_if(flags.function_safety(), FUNCTION_SAFETY_SIZE);
        let tail = c.reserve(TAIL_SIZE);
        let sequence = c.reserve_if(flags.sequence(), SEQUENCE_SIZE);
        let imu = c.reserve_if(flags.imu(), IMU_SIZE);
        c.reserve(TAIL_CRC_SIZE);
        c.reserve_if(flags.cyber_security(), SIGNATURE_SIZE);
        c.check(data)?;

        Ok(Self { data, pre_header, header, body, tail, sequence, imu })
    }

    pub fn blocks(&self) -> impl Iterator<Item = Block<'a>> + 'a {
        self.body.blocks(self.data)
    }

    pub fn tail(&self) -> Tail {
        Tail::read(&self.data[self.tail..self.tail + TAIL_SIZE])
    }

    pub fn sequence(&self) -> Option<u32> {
        self.sequence.map(|i| LE::read_u32(&self.data[i..i + SEQUENCE_SIZE]))
    }

    /// Raw IMU section
    pub fn imu(&self) -> Option<&'a [u8]> {
        let data = self.data;
        self.imu.map(|i| &data[i..i + IMU_SIZE])
    }
}
