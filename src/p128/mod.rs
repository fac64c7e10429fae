//! Pandar128 decoder
//!
//! Every block carries one centi-degree azimuth for all 128 channels. The
//! text angle correction gives each channel a fixed elevation and an azimuth
//! offset, both in milli-degrees.
use std::sync::Arc;

use log::{info, warn};

use crate::calib::AngleCorrection;
use crate::constants::{self, DecoderConstants};
use crate::decoder::{check_output, LidarModel, PacketDecoder, PacketMeta};
use crate::error::{CalibrationError, ChannelError, DecodeError};
use crate::frame::FrameSplitter;
use crate::packet::{self, DUAL_RETURN_MODE};
use crate::point::{self, CartesianPoint, SphericalPoint};
use crate::trig::{TrigTable, MILLI_DEGREE};

pub mod wire;

/// Number of physical channels
pub const LASER_NUM: usize = 128;

/// Wire azimuth (centi-degrees) to calibration units (milli-degrees)
pub(crate) const AZIMUTH_SCALE: i64 = 10;

/// Shared trig table, built for `MILLI_DEGREE` resolution
pub(crate) fn milli_degree_table(table: Option<Arc<TrigTable>>) -> Arc<TrigTable> {
    match table {
        Some(t) if t.units_per_degree() == MILLI_DEGREE => t,
        Some(t) => {
            warn!("ignoring trig table with {} units per degree",
                t.units_per_degree());
            Arc::new(TrigTable::new(MILLI_DEGREE))
        },
        None => Arc::new(TrigTable::new(MILLI_DEGREE)),
    }
}

/// Azimuth and elevation bounds of a decoded packet in radians
pub(crate) fn bounds_meta(
    meta: &mut PacketMeta,
    calib: &AngleCorrection,
    lasers: usize,
    azimuths: (u16, u16),
) {
    let to_rad = |centi: u16| (centi as f32 / 100.).to_radians();
    if azimuths.0 <= azimuths.1 {
        meta.min_azimuth = to_rad(azimuths.0);
        meta.max_azimuth = to_rad(azimuths.1);
    }
    if lasers > 0 {
        let (lo, hi) = calib.elevation_bounds(lasers);
        meta.min_elevation = (lo as f32 / MILLI_DEGREE as f32).to_radians();
        meta.max_elevation = (hi as f32 / MILLI_DEGREE as f32).to_radians();
    }
}

/// Decoder for Pandar128 packets
#[derive(Debug, Clone)]
pub struct P128Decoder {
    calibration: Option<AngleCorrection>,
    trig: Arc<TrigTable>,
    splitter: FrameSplitter,
    motor_speed: u16,
    return_mode: u8,
}

impl Default for P128Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl P128Decoder {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create decoder sharing a milli-degree trig table
    pub fn with_trig_table(table: Arc<TrigTable>) -> Self {
        Self::build(Some(table))
    }

    fn build(table: Option<Arc<TrigTable>>) -> Self {
        Self {
            calibration: None,
            trig: milli_degree_table(table),
            splitter: FrameSplitter::new(),
            motor_speed: 0,
            return_mode: 0,
        }
    }

    pub fn calibration(&self) -> Option<&AngleCorrection> {
        self.calibration.as_ref()
    }

    pub fn trig_table(&self) -> &Arc<TrigTable> {
        &self.trig
    }
}

impl PacketDecoder for P128Decoder {
    fn model(&self) -> LidarModel {
        LidarModel::P128
    }

    fn load_calibration(&mut self, blob: &[u8]) -> Result<(), CalibrationError> {
        let calib = AngleCorrection::parse(blob, LASER_NUM)?;
        info!("P128 angle correction loaded, {} channels", calib.len());
        self.calibration = Some(calib);
        Ok(())
    }

    fn is_calibrated(&self) -> bool {
        self.calibration.is_some()
    }

    fn decode(
        &mut self,
        data: &[u8],
        cartesian: &mut [CartesianPoint],
        spherical: &mut [SphericalPoint],
    ) -> Result<PacketMeta, DecodeError> {
        let packet = wire::Packet::parse(data)?;
        let calib = self.calibration.as_ref()
            .ok_or(DecodeError::CalibrationNotLoaded)?;
        let header = packet.header;
        let lasers = header.laser_num as usize;
        if lasers > calib.len() {
            return Err(DecodeError::ChannelMismatch {
                declared: lasers,
                loaded: calib.len(),
            });
        }
        let n_points = lasers * header.block_num as usize;
        check_output(n_points, cartesian, spherical)?;

        let tail = packet.tail();
        let scale = header.distance_scale();
        let trig = &*self.trig;
        let mut splitter = self.splitter;
        let mut scan_complete = false;
        let mut azimuths = (u16::MAX, u16::MIN);
        let mut outputs = cartesian.iter_mut().zip(spherical.iter_mut());

        for block in packet.blocks() {
            let azimuth = block.azimuth as i64 * AZIMUTH_SCALE;
            for (ch, unit) in block.units().enumerate() {
                let (c, s) = point::transform(
                    trig,
                    unit.distance as f32 * scale,
                    calib.elevation[ch] as i64,
                    azimuth + calib.azimuth[ch] as i64,
                    point::intensity(unit.reflectivity),
                );
                if let Some((oc, os)) = outputs.next() {
                    *oc = c;
                    *os = s;
                }
            }
            scan_complete |= splitter.update(block.azimuth);
            azimuths = (azimuths.0.min(block.azimuth), azimuths.1.max(block.azimuth));
        }

        self.splitter = splitter;
        self.motor_speed = tail.motor_speed;
        self.return_mode = tail.return_mode;

        let mut meta = PacketMeta {
            n_points,
            scan_complete,
            sensor_timestamp_us: packet::sensor_timestamp(&tail.utc, tail.timestamp),
            motor_speed: tail.motor_speed as i32,
            return_mode: tail.return_mode,
            dual_return: tail.return_mode >= DUAL_RETURN_MODE,
            sequence: packet.sequence(),
            laser_count: header.laser_num,
            block_count: header.block_num,
            ..Default::default()
        };
        bounds_meta(&mut meta, calib, lasers, azimuths);
        Ok(meta)
    }

    fn constants(&self) -> DecoderConstants {
        let angles = self.calibration.iter()
            .flat_map(|c| c.elevation.iter())
            .map(|&e| (e as f32 / MILLI_DEGREE as f32).to_radians());
        DecoderConstants::mechanical(
            self.motor_speed,
            self.return_mode >= DUAL_RETURN_MODE,
            constants::rows(angles),
        )
    }

    fn vertical_angle(&self, channel: usize) -> Result<f64, ChannelError> {
        let calib = self.calibration.as_ref().ok_or(ChannelError::NotLoaded)?;
        calib.elevation.get(channel)
            .map(|&e| e as f64 / MILLI_DEGREE as f64)
            .ok_or(ChannelError::OutOfRange { channel, loaded: calib.len() })
    }

    fn reset(&mut self) {
        self.splitter.reset();
    }
}
