//! PandarQT128 packet layout, protocol version 3.2
//!
//! ```text
//! pre-header 6 | header 6 | blocks | body CRC 4 | function safety 17?
//! | tail 26 | sequence 4? | tail CRC 4 | signature 32?
//! ```
use byteorder::{ByteOrder, LE};

use crate::error::DecodeError;
use crate::packet::{
    self, BodyLayout, Block, Cursor, Header, PreHeader, BODY_CRC_SIZE,
    FUNCTION_SAFETY_SIZE, HEADER_SIZE, PRE_HEADER_SIZE, SEQUENCE_SIZE,
    SIGNATURE_SIZE, TAIL_CRC_SIZE,
};

pub const VERSION_MAJOR: u8 = 3;
pub const VERSION_MINOR: u8 = 2;

const TAIL_SIZE: usize = 26;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Tail {
    pub reserved1: [u8; 3],
    pub reserved2: [u8; 2],
    /// Selects the firing loop of the first block
    pub mode_flag: u8,
    pub reserved3: [u8; 3],
    pub azimuth_flag: u16,
    pub working_mode: u8,
    pub return_mode: u8,
    /// RPM
    pub motor_speed: u16,
    pub utc: [u8; 6],
    pub timestamp: u32,
    pub factory_info: u8,
}

impl Tail {
    fn read(b: &[u8]) -> Self {
        Self {
            reserved1: [b[0], b[1], b[2]],
            reserved2: [b[3], b[4]],
            mode_flag: b[5],
            reserved3: [b[6], b[7], b[8]],
            azimuth_flag: LE::read_u16(&b[9..11]),
            working_mode: b[11],
            return_mode: b[12],
            motor_speed: LE::read_u16(&b[13..15]),
            utc: packet::read_utc(b, 15),
            timestamp: LE::read_u32(&b[21..25]),
            factory_info: b[25],
        }
    }

    /// Firing loop used by block `block`, either 0 or 1
    pub fn loop_index(&self, block: usize) -> usize {
        let per_loop = if self.return_mode < packet::DUAL_RETURN_MODE { 1 } else { 2 };
        (self.mode_flag as usize + block / per_loop + 1) % 2
    }
}

/// Validated view over a QT128 packet
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
            unit_size: if flags.confidence() { 4 } else { 3 },
            fine_azimuth: false,
        };
        c.reserve(body.size());
        c.reserve(BODY_CRC_SIZE);
        c.reserve_if(flags.function_safety(), FUNCTION_SAFETY_SIZE);
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

#[cfg(test)]
mod tests {
    use super::*;

    fn tail(mode_flag: u8, return_mode: u8) -> Tail {
        let mut b = [0u8; TAIL_SIZE];
        b[5] = mode_flag;
        b[12] = return_mode;
        Tail::read(&b)
    }

    #[test]
    fn loop_index_single_return() {
        let t = tail(0, 0x37);
        assert_eq!((t.loop_index(0), t.loop_index(1)), (1, 0));
        let t = tail(1, 0x37);
        assert_eq!((t.loop_index(0), t.loop_index(1)), (0, 1));
    }

    #[test]
    fn loop_index_dual_return() {
        // both echoes of one firing share a loop
        let t = tail(0, 0x39);
        assert_eq!((t.loop_index(0), t.loop_index(1)), (1, 1));
        assert_eq!((t.loop_index(2), t.loop_index(3)), (0, 0));
    }
}
