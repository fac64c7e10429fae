//! AT128 binary angle correction
//!
//! A 16 byte header (delimiter, version, channel/mirror/frame counts, frame
//! config and resolution) is followed by per-frame start/end azimuths,
//! per-channel base azimuth and elevation, two azimuth indexed offset tables
//! and a SHA-256 digest. Version 3 stores centi-degrees in 16 bit fields and
//! a fixed 36000 entry offset table. Version 5 uses 32 bit fields, sizes the
//! offset tables by channel count and scales everything by `resolution`.
//!
//! After parsing, all angles are in 1/25600 degree units except the offset
//! tables, which stay in 1/100 degree and are scaled when applied.
use byteorder::{ByteOrder, LE};
use log::debug;

use crate::error::{CalibrationError, ChannelError};

/// Fine steps per centi-degree
pub const FINE_AZIMUTH_UNIT: i64 = 256;
/// Full circle in 1/25600 degree units
pub const CIRCLE: i64 = 36_000 * FINE_AZIMUTH_UNIT;
/// Offset table entries per channel
pub const OFFSETS_PER_CHANNEL: usize = 180;
/// Azimuth step between two offset table entries (2 degrees)
pub const OFFSET_STEP: i64 = CIRCLE / OFFSETS_PER_CHANNEL as i64;

const HEADER_SIZE: usize = 16;
const V3_OFFSET_TABLE: usize = 36_000;
const DIGEST_SIZE: usize = 32;

/// Parsed correction table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct At128Calibration {
    pub version: [u8; 2],
    pub channel_number: u8,
    pub mirror_number: u8,
    pub frame_number: u8,
    pub frame_config: [u8; 8],
    pub resolution: u8,
    pub start_frame: Vec<i64>,
    pub end_frame: Vec<i64>,
    pub azimuth: Vec<i32>,
    pub elevation: Vec<i32>,
    pub azimuth_offset: Vec<i32>,
    pub elevation_offset: Vec<i32>,
    pub sha256: [u8; 32],
}

/// Bounds-checked reader over the calibration blob
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize, section: &'static str)
        -> Result<&'a [u8], CalibrationError>
    {
        let end = self.pos + len;
        if end > self.data.len() {
            return Err(CalibrationError::Truncated { section });
        }
        let s = &self.data[self.pos..end];
        self.pos = end;
        Ok(s)
    }

    fn u16s(&mut self, n: usize, section: &'static str) -> Result<Vec<i64>, CalibrationError> {
        Ok(self.take(2 * n, section)?.chunks_exact(2).map(|c| LE::read_u16(c) as i64).collect())
    }

    fn u32s(&mut self, n: usize, section: &'static str) -> Result<Vec<i64>, CalibrationError> {
        Ok(self.take(4 * n, section)?.chunks_exact(4).map(|c| LE::read_u32(c) as i64).collect())
    }

    fn i16s(&mut self, n: usize, section: &'static str) -> Result<Vec<i32>, CalibrationError> {
        Ok(self.take(2 * n, section)?.chunks_exact(2).map(|c| LE::read_i16(c) as i32).collect())
    }

    fn i32s(&mut self, n: usize, section: &'static str) -> Result<Vec<i32>, CalibrationError> {
        Ok(self.take(4 * n, section)?.chunks_exact(4).map(LE::read_i32).collect())
    }

    fn i8s(&mut self, n: usize, section: &'static str) -> Result<Vec<i32>, CalibrationError> {
        Ok(self.take(n, section)?.iter().map(|&b| b as i8 as i32).collect())
    }
}

impl At128Calibration {
    pub fn parse(blob: &[u8]) -> Result<Self, CalibrationError> {
        let mut r = Reader { data: blob, pos: 0 };
        let h = r.take(HEADER_SIZE, "header")?;
        if h[..2] != [0xEE, 0xFF] {
            return Err(CalibrationError::InvalidDelimiter);
        }
        let version = [h[2], h[3]];
        let channel_number = h[4];
        let mirror_number = h[5];
        let frame_number = h[6];
        let mut frame_config = [0u8; 8];
        frame_config.copy_from_slice(&h[7..15]);
        let resolution = h[15];
        if channel_number == 0 || frame_number == 0 {
            return Err(CalibrationError::Empty);
        }
        let ch = channel_number as usize;
        let frames = frame_number as usize;

        let mut c = match version[1] {
            3 => {
                let start_frame = r.u16s(frames, "start frames")?;
                let end_frame = r.u16s(frames, "end frames")?;
                let azimuth = r.i16s(ch, "azimuth")?;
                let elevation = r.i16s(ch, "elevation")?;
                if ch * OFFSETS_PER_CHANNEL > V3_OFFSET_TABLE {
                    return Err(CalibrationError::UnsupportedVersion(version[1]));
                }
                let azimuth_offset = r.i8s(V3_OFFSET_TABLE, "azimuth offsets")?;
                let elevation_offset = r.i8s(V3_OFFSET_TABLE, "elevation offsets")?;
                let fine = FINE_AZIMUTH_UNIT as i32;
                Self {
                    version, channel_number, mirror_number, frame_number,
                    frame_config, resolution,
                    start_frame: start_frame.iter().map(|v| v * FINE_AZIMUTH_UNIT).collect(),
                    end_frame: end_frame.iter().map(|v| v * FINE_AZIMUTH_UNIT).collect(),
                    azimuth: azimuth.iter().map(|v| v * fine).collect(),
                    elevation: elevation.iter().map(|v| v * fine).collect(),
                    azimuth_offset,
                    elevation_offset,
                    sha256: [0; 32],
                }
            },
            5 => {
                let start_frame = r.u32s(frames, "start frames")?;
                let end_frame = r.u32s(frames, "end frames")?;
                let azimuth = r.i32s(ch, "azimuth")?;
                let elevation = r.i32s(ch, "elevation")?;
                let len = ch * OFFSETS_PER_CHANNEL;
                let azimuth_offset = r.i8s(len, "azimuth offsets")?;
                let elevation_offset = r.i8s(len, "elevation offsets")?;
                let res = resolution as i64;
                let scale = |v: &Vec<i32>| -> Vec<i32> {
                    v.iter().map(|&x| (x as i64 * res) as i32).collect()
                };
                Self {
                    version, channel_number, mirror_number, frame_number,
                    frame_config, resolution,
                    start_frame: start_frame.iter().map(|v| v * res).collect(),
                    end_frame: end_frame.iter().map(|v| v * res).collect(),
                    azimuth: scale(&azimuth),
                    elevation: scale(&elevation),
                    azimuth_offset: scale(&azimuth_offset),
                    elevation_offset: scale(&elevation_offset),
                    sha256: [0; 32],
                }
            },
            v => return Err(CalibrationError::UnsupportedVersion(v)),
        };
        c.sha256.copy_from_slice(r.take(DIGEST_SIZE, "digest")?);
        debug!("parsed AT128 correction v{}.{}: {} channels, {} frames",
            version[0], version[1], channel_number, frame_number);
        Ok(c)
    }

    pub fn channels(&self) -> usize {
        self.azimuth.len()
    }

    /// Index of the frame field containing azimuth `a` (1/25600 degree).
    ///
    /// Containment is tested on the circle, so fields may wrap through zero.
    pub fn field(&self, a: i64) -> Option<usize> {
        let a = a.rem_euclid(CIRCLE);
        self.start_frame.iter()
            .zip(self.end_frame.iter())
            .position(|(&start, &end)| {
                let before = (a - start).rem_euclid(CIRCLE);
                let after = (end - a).rem_euclid(CIRCLE);
                before + after == (end - start).rem_euclid(CIRCLE)
            })
    }

    /// Interpolated offset of `channel` at azimuth `a`, in 1/100 degree
    fn adjust(table: &[i32], channel: usize, a: i64) -> i64 {
        let a = a.rem_euclid(CIRCLE);
        let i = (a / OFFSET_STEP) as usize;
        let k = (a - i as i64 * OFFSET_STEP) as f64 / OFFSET_STEP as f64;
        let base = channel * OFFSETS_PER_CHANNEL;
        let lo = table[base + i] as f64;
        let hi = table[base + (i + 1) % OFFSETS_PER_CHANNEL] as f64;
        ((1. - k) * lo + k * hi).round() as i64
    }

    pub fn azimuth_adjust(&self, channel: usize, a: i64) -> i64 {
        Self::adjust(&self.azimuth_offset, channel, a)
    }

    pub fn elevation_adjust(&self, channel: usize, a: i64) -> i64 {
        Self::adjust(&self.elevation_offset, channel, a)
    }

    /// Corrected elevation of `channel` at block azimuth `a`
    #[inline]
    pub fn elevation_at(&self, channel: usize, a: i64) -> i64 {
        self.elevation[channel] as i64
            + self.elevation_adjust(channel, a) * FINE_AZIMUTH_UNIT
    }

    /// Corrected azimuth of `channel` at block azimuth `a` inside `field`.
    ///
    /// The mirror doubles the optical angle relative to the field start.
    #[inline]
    pub fn azimuth_at(&self, channel: usize, field: usize, a: i64) -> i64 {
        (a - self.start_frame[field]).rem_euclid(CIRCLE) * 2
            - self.azimuth[channel] as i64
            + self.azimuth_adjust(channel, a) * FINE_AZIMUTH_UNIT
    }

    /// Base elevation of `channel` in degrees
    pub fn vertical_angle(&self, channel: usize) -> Result<f64, ChannelError> {
        self.elevation.get(channel)
            .map(|&e| e as f64 / (100. * FINE_AZIMUTH_UNIT as f64))
            .ok_or(ChannelError::OutOfRange { channel, loaded: self.channels() })
    }
}
