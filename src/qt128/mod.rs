//! PandarQT128 decoder
//!
//! The QT128 fires its lasers in two alternating loops. When the packet
//! header announces a self-defined channel table and a channel config is
//! loaded, the wire position of a return is remapped to the calibration
//! channel through the table of the block's loop. Loaded fire times further
//! shift each return's azimuth by the angle swept since the block started.
use std::sync::Arc;

use log::info;

use crate::calib::AngleCorrection;
use crate::constants::{self, DecoderConstants};
use crate::decoder::{check_output, LidarModel, PacketDecoder, PacketMeta};
use crate::error::{CalibrationError, ChannelError, DecodeError};
use crate::frame::FrameSplitter;
use crate::p128::{bounds_meta, milli_degree_table, AZIMUTH_SCALE};
use crate::packet::{self, DUAL_RETURN_MODE};
use crate::point::{self, CartesianPoint, SphericalPoint};
use crate::trig::{TrigTable, MILLI_DEGREE};

pub mod wire;
mod channel_config;
pub use self::channel_config::ChannelConfig;
mod firetime;
pub use self::firetime::Firetimes;

/// Number of physical channels
pub const LASER_NUM: usize = 128;
/// Upper bound of firing loops in the auxiliary tables
pub const MAX_LOOPS: usize = 4;

/// Decoder for PandarQT128 packets
#[derive(Debug, Clone)]
pub struct Qt128Decoder {
    calibration: Option<AngleCorrection>,
    channel_config: Option<ChannelConfig>,
    firetimes: Option<Firetimes>,
    fire_time_correction: bool,
    trig: Arc<TrigTable>,
    splitter: FrameSplitter,
    motor_speed: u16,
    return_mode: u8,
}

impl Default for Qt128Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Qt128Decoder {
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
            channel_config: None,
            firetimes: None,
            fire_time_correction: true,
            trig: milli_degree_table(table),
            splitter: FrameSplitter::new(),
            motor_speed: 0,
            return_mode: 0,
        }
    }

    /// Replace the channel remap table
    pub fn load_channel_config(&mut self, blob: &[u8]) -> Result<(), CalibrationError> {
        let config = ChannelConfig::parse(blob)?;
        info!("QT128 channel config {}.{} loaded, {} lasers in {} loops",
            config.major, config.minor, config.laser_count, config.loop_count());
        self.channel_config = Some(config);
        Ok(())
    }

    /// Replace the fire time table
    pub fn load_firetimes(&mut self, blob: &[u8]) -> Result<(), CalibrationError> {
        let firetimes = Firetimes::parse(blob)?;
        info!("QT128 fire times loaded for {} loops", firetimes.loop_count());
        self.firetimes = Some(firetimes);
        Ok(())
    }

    /// Toggle azimuth correction by fire times, enabled by default.
    ///
    /// Has no effect until fire times are loaded.
    pub fn set_fire_time_correction(&mut self, enable: bool) {
        self.fire_time_correction = enable;
    }

    pub fn calibration(&self) -> Option<&AngleCorrection> {
        self.calibration.as_ref()
    }

    pub fn channel_config(&self) -> Option<&ChannelConfig> {
        self.channel_config.as_ref()
    }

    pub fn firetimes(&self) -> Option<&Firetimes> {
        self.firetimes.as_ref()
    }
}

impl PacketDecoder for Qt128Decoder {
    fn model(&self) -> LidarModel {
        LidarModel::Qt128
    }

    fn load_calibration(&mut self, blob: &[u8]) -> Result<(), CalibrationError> {
        let calib = AngleCorrection::parse(blob, LASER_NUM)?;
        info!("QT128 angle correction loaded, {} channels", calib.len());
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
        let remap = self.channel_config.as_ref()
            .filter(|_| header.flags.self_define());
        let needed = remap.map_or(lasers, |c| lasers.max(c.max_channel() + 1));
        if needed > calib.len() {
            return Err(DecodeError::ChannelMismatch {
                declared: needed,
                loaded: calib.len(),
            });
        }
        let n_points = lasers * header.block_num as usize;
        check_output(n_points, cartesian, spherical)?;

        let tail = packet.tail();
        let scale = header.distance_scale();
        let firetimes = self.firetimes.as_ref()
            .filter(|_| self.fire_time_correction);
        let trig = &*self.trig;
        let mut splitter = self.splitter;
        let mut scan_complete = false;
        let mut azimuths = (u16::MAX, u16::MIN);
        let mut outputs = cartesian.iter_mut().zip(spherical.iter_mut());

        for (i, block) in packet.blocks().enumerate() {
            let loop_index = tail.loop_index(i);
            let azimuth = block.azimuth as i64 * AZIMUTH_SCALE;
            for (j, unit) in block.units().enumerate() {
                let laser = remap
                    .and_then(|c| c.remap(loop_index, j))
                    .unwrap_or(j);
                let mut corrected = azimuth + calib.azimuth[laser] as i64;
                if let Some(f) = firetimes {
                    corrected += f.azimuth_offset(loop_index, laser, tail.motor_speed);
                }
                let (c, s) = point::transform(
                    trig,
                    unit.distance as f32 * scale,
                    calib.elevation[laser] as i64,
                    corrected,
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
