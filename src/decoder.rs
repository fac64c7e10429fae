//! Decoder interface and the sensor model selection
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use log::{info, warn};

use crate::at128::At128Decoder;
use crate::calib::CalibrationSource;
use crate::constants::DecoderConstants;
use crate::error::{CalibrationError, ChannelError, DecodeError};
use crate::p128::P128Decoder;
use crate::point::{CartesianPoint, SphericalPoint};
use crate::qt128::Qt128Decoder;
use crate::trig::TrigTable;

/// Supported sensor families
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LidarModel {
    P128,
    Qt128,
    At128,
}

impl LidarModel {
    pub fn name(&self) -> &'static str {
        match self {
            LidarModel::P128 => "P128",
            LidarModel::Qt128 => "QT128",
            LidarModel::At128 => "AT128",
        }
    }
}

impl fmt::Display for LidarModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sensor type string is not recognized
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown lidar type `{0}`")]
pub struct UnknownModel(pub String);

impl FromStr for LidarModel {
    type Err = UnknownModel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "P128" | "PANDAR128" | "PANDAR128E3X" => Ok(LidarModel::P128),
            "QT128" | "QT128C2X" => Ok(LidarModel::Qt128),
            "AT128" | "AT128E2X" => Ok(LidarModel::At128),
            _ => Err(UnknownModel(s.to_string())),
        }
    }
}

/// Metadata of one decoded packet
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct PacketMeta {
    /// Points written to the output slices
    pub n_points: usize,
    /// Packet completed a frame
    pub scan_complete: bool,
    /// Microseconds since Unix epoch reported by the sensor
    pub sensor_timestamp_us: Option<i64>,
    /// Block azimuth bounds, radians
    pub min_azimuth: f32,
    pub max_azimuth: f32,
    /// Calibrated elevation bounds of the declared lasers, radians
    pub min_elevation: f32,
    pub max_elevation: f32,
    /// RPM for spinning sensors, raw signed value for AT128
    pub motor_speed: i32,
    pub return_mode: u8,
    pub dual_return: bool,
    pub sequence: Option<u32>,
    pub laser_count: u8,
    pub block_count: u8,
}

/// Decoder of one sensor family.
///
/// A decoder owns its calibration and the frame splitting state. Packets have
/// to be fed in arrival order.
pub trait PacketDecoder {
    fn model(&self) -> LidarModel;

    /// Replace calibration with the one parsed from `blob`.
    ///
    /// On error the previously loaded calibration stays in place.
    fn load_calibration(&mut self, blob: &[u8]) -> Result<(), CalibrationError>;

    fn is_calibrated(&self) -> bool;

    /// Number of points `packet` will produce, from its header alone
    fn point_capacity(&self, packet: &[u8]) -> Result<usize, DecodeError> {
        let (_, h) = crate::packet::parse_headers(packet)?;
        Ok(h.laser_num as usize * h.block_num as usize)
    }

    /// Decode `packet` into the first points of `cartesian` and `spherical`.
    ///
    /// A rejected packet does not modify frame state.
    fn decode(
        &mut self,
        packet: &[u8],
        cartesian: &mut [CartesianPoint],
        spherical: &mut [SphericalPoint],
    ) -> Result<PacketMeta, DecodeError>;

    /// Device metadata, usable before calibration is loaded
    fn constants(&self) -> DecoderConstants;

    /// Calibrated elevation of `channel` in degrees
    fn vertical_angle(&self, channel: usize) -> Result<f64, ChannelError>;

    /// Forget frame state, the next packet starts a new frame
    fn reset(&mut self);
}

pub(crate) fn check_output(
    needed: usize,
    cartesian: &[CartesianPoint],
    spherical: &[SphericalPoint],
) -> Result<(), DecodeError> {
    let actual = cartesian.len().min(spherical.len());
    if actual < needed {
        return Err(DecodeError::OutputTooSmall { needed, actual });
    }
    Ok(())
}

/// Decoder selected once from the configured sensor model
#[derive(Debug)]
pub enum Decoder {
    P128(P128Decoder),
    Qt128(Qt128Decoder),
    At128(At128Decoder),
}

macro_rules! dispatch {
    ($self:expr, $d:ident => $e:expr) => {
        match $self {
            Decoder::P128($d) => $e,
            Decoder::Qt128($d) => $e,
            Decoder::At128($d) => $e,
        }
    };
}

impl Decoder {
    pub fn new(model: LidarModel) -> Self {
        match model {
            LidarModel::P128 => Decoder::P128(P128Decoder::new()),
            LidarModel::Qt128 => Decoder::Qt128(Qt128Decoder::new()),
            LidarModel::At128 => Decoder::At128(At128Decoder::new()),
        }
    }

    /// Create decoder reusing an already built trigonometric table.
    ///
    /// Tables of the wrong resolution for `model` are ignored.
    pub fn with_trig_table(model: LidarModel, table: Arc<TrigTable>) -> Self {
        match model {
            LidarModel::P128 => Decoder::P128(P128Decoder::with_trig_table(table)),
            LidarModel::Qt128 => Decoder::Qt128(Qt128Decoder::with_trig_table(table)),
            LidarModel::At128 => Decoder::At128(At128Decoder::with_trig_table(table)),
        }
    }

    /// Try calibration sources in order until one loads.
    ///
    /// Failures are logged and the next source is tried. If all of them fail
    /// the last error is returned and the current calibration is kept.
    pub fn load_calibration_from(
        &mut self,
        sources: &mut [&mut dyn CalibrationSource],
    ) -> Result<(), CalibrationError> {
        let mut last_err = CalibrationError::Empty;
        for source in sources.iter_mut() {
            let res = source.fetch()
                .map_err(CalibrationError::from)
                .and_then(|blob| self.load_calibration(&blob));
            match res {
                Ok(()) => {
                    info!("{} calibration loaded from {}",
                        self.model(), source.describe());
                    return Ok(());
                },
                Err(err) => {
                    warn!("failed to load {} calibration from {}: {}",
                        self.model(), source.describe(), err);
                    last_err = err;
                },
            }
        }
        Err(last_err)
    }

    /// Load QT128 channel remap table
    pub fn load_channel_config(&mut self, blob: &[u8]) -> Result<(), CalibrationError> {
        match self {
            Decoder::Qt128(d) => d.load_channel_config(blob),
            _ => Err(CalibrationError::NotSupported("channel config")),
        }
    }

    /// Load QT128 per-channel fire times
    pub fn load_firetimes(&mut self, blob: &[u8]) -> Result<(), CalibrationError> {
        match self {
            Decoder::Qt128(d) => d.load_firetimes(blob),
            _ => Err(CalibrationError::NotSupported("fire times")),
        }
    }
}

impl PacketDecoder for Decoder {
    fn model(&self) -> LidarModel {
        dispatch!(self, d => d.model())
    }

    fn load_calibration(&mut self, blob: &[u8]) -> Result<(), CalibrationError> {
        dispatch!(self, d => d.load_calibration(blob))
    }

    fn is_calibrated(&self) -> bool {
        dispatch!(self, d => d.is_calibrated())
    }

    fn point_capacity(&self, packet: &[u8]) -> Result<usize, DecodeError> {
        dispatch!(self, d => d.point_capacity(packet))
    }

    fn decode(
        &mut self,
        packet: &[u8],
        cartesian: &mut [CartesianPoint],
        spherical: &mut [SphericalPoint],
    ) -> Result<PacketMeta, DecodeError> {
        dispatch!(self, d => d.decode(packet, cartesian, spherical))
    }

    fn constants(&self) -> DecoderConstants {
        dispatch!(self, d => d.constants())
    }

    fn vertical_angle(&self, channel: usize) -> Result<f64, ChannelError> {
        dispatch!(self, d => d.vertical_angle(channel))
    }

    fn reset(&mut self) {
        dispatch!(self, d => d.reset())
    }
}

impl From<P128Decoder> for Decoder {
    fn from(d: P128Decoder) -> Self { Decoder::P128(d) }
}

impl From<Qt128Decoder> for Decoder {
    fn from(d: Qt128Decoder) -> Self { Decoder::Qt128(d) }
}

impl From<At128Decoder> for Decoder {
    fn from(d: At128Decoder) -> Self { Decoder::At128(d) }
}
