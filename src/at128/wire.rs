//! AT128 packet layout, protocol version 4.3
//!
//! ```text
//! pre-header 6 | header 6 | blocks | body CRC 4 | tail 32
//! | sequence 4? | tail CRC 4 | signature 32?
//! ```
//! Each block starts with a centi-degree azimuth followed by a fine azimuth
//! byte in 1/256 centi-degree steps. Channel units are always 4 bytes.
use byteorder::{ByteOrder, LE};

use crate::error::DecodeError;
use crate::packet::{
    self, BodyLayout, Block, Cursor, Header, PreHeader, BODY_CRC_SIZE,
    HEADER_SIZE, PRE_HEADER_SIZE, SEQUENCE_SIZE, SIGNATURE_SIZE, TAIL_CRC_SIZE,
};

pub const VERSION_MAJOR: u8 = 4;
pub const VERSION_MINOR: u8 = 3;

const TAIL_SIZE: usize = 32;
const UNIT_SIZE: usize = 4;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Tail {
    pub reserved1: [u8; 3],
    pub reserved2: [u8; 3],
    pub shutdown_flag: u8,
    pub reserved3: [u8; 3],
    pub reserved4: [u8; 8],
    pub motor_speed: i16,
    pub timestamp: u32,
    pub return_mode: u8,
    pub factory_info: u8,
    pub utc: [u8; 6],
}

impl Tail {
    fn read(b: &[u8]) -> Self {
        let mut reserved4 = [0u8; 8];
        reserved4.copy_from_slice(&b[10..18]);
        Self {
            reserved1: [b[0], b[1], b[2]],
            reserved2: [b[3], b[4], b[5]],
            shutdown_flag: b[6],
            reserved3: [b[7], b[8], b[9]],
            reserved4,
            motor_speed: LE::read_i16(&b[18..20]),
            timestamp: LE::read_u32(&b[20..24]),
            return_mode: b[24],
            factory_info: b[25],
            utc: packet::read_utc(b, 26),
        }
    }

    pub fn is_dual_return(&self) -> bool {
        self.return_mode >= packet::DUAL_RETURN_MODE
    }
}

/// Validated view over an AT128 packet
#[derive(Debug, Clone)]
pub struct Packet<'a> {
    data: &'a [u8],
    pub pre_header: PreHeader,
    pub header: Header,
    body: BodyLayout,
    tail: usize,
    sequence: Option<usize>,
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
            unit_size: UNIT_SIZE,
            fine_azimuth: true,
        };
        c.reserve(body.size());
        c.reserve(BODY_CRC_SIZE);
        let tail = c.reserve(TAIL_SIZE);
        let sequence = c.reserve_if(flags.sequence(), SEQUENCE_SIZE);
        c.reserve(TAIL_CRC_SIZE);
        c.reserve_if(flags.cyber_security(), SIGNATURE_SIZE);
        c.check(data)?;

        Ok(Self { data, pre_header, header, body, tail, sequence })
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
}
