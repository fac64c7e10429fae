//! AT128 decoder
//!
//! The AT128 scans with a rotating mirror. A block azimuth is first located
//! in one of the configured fields, then each channel's angles are corrected
//! relative to that field's start using the interpolated offset tables.
//! Blocks that fall into no field produce no points.
use std::sync::Arc;

use log::{debug, info, warn};

use crate::constants::{self, DecoderConstants};
use crate::decoder::{check_output, LidarModel, PacketDecoder, PacketMeta};
use crate::error::{CalibrationError, ChannelError, DecodeError};
use crate::frame::FrameSplitter;
use crate::packet;
use crate::point::{self, CartesianPoint, SphericalPoint};
use crate::trig::{TrigTable, FINE_DEGREE};

pub mod wire;
mod calib;
pub use self::calib::{
    At128Calibration, CIRCLE, FINE_AZIMUTH_UNIT, OFFSETS_PER_CHANNEL, OFFSET_STEP,
};

/// Decoder for AT128 packets
#[derive(Debug, Clone)]
pub struct At128Decoder {
    calibration: Option<At128Calibration>,
    trig: Arc<TrigTable>,
    splitter: FrameSplitter,
    motor_speed: i16,
    dual_return: bool,
}

impl Default for At128Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl At128Decoder {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create decoder sharing a 1/25600 degree trig table.
    ///
    /// The table is large, decoders of several sensors should share one.
    pub fn with_trig_table(table: Arc<TrigTable>) -> Self {
        Self::build(Some(table))
    }

    fn build(table: Option<Arc<TrigTable>>) -> Self {
        let trig = match table {
            Some(t) if t.units_per_degree() == FINE_DEGREE => t,
            Some(t) => {
                warn!("ignoring trig table with {} units per degree",
                    t.units_per_degree());
                Arc::new(TrigTable::new(FINE_DEGREE))
            },
            None => Arc::new(TrigTable::new(FINE_DEGREE)),
        };
        Self {
            calibration: None,
            trig,
            splitter: FrameSplitter::new(),
            motor_speed: 0,
            dual_return: true,
        }
    }

    pub fn calibration(&self) -> Option<&At128Calibration> {
        self.calibration.as_ref()
    }

    pub fn trig_table(&self) -> &Arc<TrigTable> {
        &self.trig
    }
}

fn fine_to_radians(a: i64) -> f32 {
    (a as f64 / (100. * FINE_AZIMUTH_UNIT as f64)).to_radians() as f32
}

impl PacketDecoder for At128Decoder {
    fn model(&self) -> LidarModel {
        LidarModel::At128
    }

    fn load_calibration(&mut self, blob: &[u8]) -> Result<(), CalibrationError> {
        let calib = At128Calibration::parse(blob)?;
        info!("AT128 angle correction v{} loaded, {} channels, {} frames",
            calib.version[1], calib.channels(), calib.frame_number);
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
        if lasers > calib.channels() {
            return Err(DecodeError::ChannelMismatch {
                declared: lasers,
                loaded: calib.channels(),
            });
        }
        check_output(lasers * header.block_num as usize, cartesian, spherical)?;

        let tail = packet.tail();
        let scale = header.distance_scale();
        let trig = &*self.trig;
        let mut splitter = self.splitter;
        let mut scan_complete = false;
        let mut bounds: Option<(i64, i64)> = None;
        let mut n_points = 0;
        let mut outputs = cartesian.iter_mut().zip(spherical.iter_mut());

        for block in packet.blocks() {
            let a = (block.azimuth as i64 * FINE_AZIMUTH_UNIT
                + block.fine_azimuth as i64).rem_euclid(CIRCLE);
            let field = match calib.field(a) {
                Some(f) => f,
                None => {
                    debug!("AT128 block azimuth {} outside every field", a);
                    continue;
                },
            };
            for (ch, unit) in block.units().enumerate() {
                let (c, s) = point::transform(
                    trig,
                    unit.distance as f32 * scale,
                    calib.elevation_at(ch, a),
                    calib.azimuth_at(ch, field, a),
                    point::intensity(unit.reflectivity),
                );
                if let Some((oc, os)) = outputs.next() {
                    *oc = c;
                    *os = s;
                    n_points += 1;
                }
            }
            scan_complete |= splitter.update_field(block.azimuth, field);
            bounds = Some(match bounds {
                Some((lo, hi)) => (lo.min(a), hi.max(a)),
                None => (a, a),
            });
        }

        self.splitter = splitter;
        self.motor_speed = tail.motor_speed;
        self.dual_return = tail.is_dual_return();

        let mut meta = PacketMeta {
            n_points,
            scan_complete,
            sensor_timestamp_us: packet::sensor_timestamp(&tail.utc, tail.timestamp),
            motor_speed: tail.motor_speed as i32,
            return_mode: tail.return_mode,
            dual_return: tail.is_dual_return(),
            sequence: packet.sequence(),
            laser_count: header.laser_num,
            block_count: header.block_num,
            ..Default::default()
        };
        if let Some((lo, hi)) = bounds {
            meta.min_azimuth = fine_to_radians(lo);
            meta.max_azimuth = fine_to_radians(hi);
        }
        if let (Some(lo), Some(hi)) = (
            calib.elevation[..lasers].iter().min(),
            calib.elevation[..lasers].iter().max(),
        ) {
            meta.min_elevation = fine_to_radians(*lo as i64);
            meta.max_elevation = fine_to_radians(*hi as i64);
        }
        Ok(meta)
    }

    fn constants(&self) -> DecoderConstants {
        let angles = self.calibration.iter()
            .flat_map(|c| c.elevation.iter())
            .map(|&e| fine_to_radians(e as i64));
        DecoderConstants::at128(self.motor_speed, self.dual_return, constants::rows(angles))
    }

    fn vertical_angle(&self, channel: usize) -> Result<f64, ChannelError> {
        self.calibration.as_ref()
            .ok_or(ChannelError::NotLoaded)?
            .vertical_angle(channel)
    }

    fn reset(&mut self) {
        self.splitter.reset();
    }
}
