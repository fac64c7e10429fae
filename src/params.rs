//! Sensor parameters given as a `key=value,key=value` string
//!
//! ```
//! use hesai::{LidarModel, SensorParams};
//!
//! let params: SensorParams = "lidar_type=QT128,udp_port=2369".parse().unwrap();
//! assert_eq!(params.lidar_type, Some(LidarModel::Qt128));
//! assert_eq!(params.udp_port, 2369);
//! ```
use std::fs;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;
use std::str::FromStr;

use log::{debug, info, warn};

use crate::calib::FileCalibration;
use crate::decoder::{Decoder, LidarModel, UnknownModel};
use crate::error::CalibrationError;

pub const DEFAULT_SENSOR_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 201);
pub const DEFAULT_UDP_PORT: u16 = 2368;
pub const DEFAULT_PTC_PORT: u16 = 9347;

#[derive(thiserror::Error, Debug)]
pub enum ParamsError {
    #[error("parameter `{0}` has no value")]
    MissingValue(String),
    #[error("invalid value `{value}` for `{key}`")]
    InvalidValue { key: &'static str, value: String },
    #[error(transparent)]
    Model(#[from] UnknownModel),
    #[error("`lidar_type` is not set")]
    NoModel,
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
}

/// Connection and calibration settings of one sensor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorParams {
    pub lidar_type: Option<LidarModel>,
    pub correction_file: Option<PathBuf>,
    pub firetimes_file: Option<PathBuf>,
    pub channel_config_file: Option<PathBuf>,
    /// Sensor address
    pub ip: Ipv4Addr,
    /// Local address point cloud data is received on
    pub host_ip: Ipv4Addr,
    pub multicast_ip: Option<Ipv4Addr>,
    pub udp_port: u16,
    /// Control channel port
    pub ptc_port: u16,
}

impl Default for SensorParams {
    fn default() -> Self {
        Self {
            lidar_type: None,
            correction_file: None,
            firetimes_file: None,
            channel_config_file: None,
            ip: DEFAULT_SENSOR_IP,
            host_ip: Ipv4Addr::UNSPECIFIED,
            multicast_ip: None,
            udp_port: DEFAULT_UDP_PORT,
            ptc_port: DEFAULT_PTC_PORT,
        }
    }
}

fn parse_value<T: FromStr>(key: &'static str, value: &str) -> Result<T, ParamsError> {
    value.parse().map_err(|_| ParamsError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

fn path(value: &str) -> Option<PathBuf> {
    if value.is_empty() { None } else { Some(PathBuf::from(value)) }
}

impl FromStr for SensorParams {
    type Err = ParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut params = SensorParams::default();
        for item in s.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            let (key, value) = match item.split_once('=') {
                Some((k, v)) => (k.trim(), v.trim()),
                None => return Err(ParamsError::MissingValue(item.to_string())),
            };
            match key {
                "lidar_type" => params.lidar_type = Some(value.parse()?),
                "correction_file" => params.correction_file = path(value),
                "firetimes_file" => params.firetimes_file = path(value),
                "channel_config_file" => params.channel_config_file = path(value),
                "ip" => params.ip = parse_value("ip", value)?,
                "host_ip" => params.host_ip = parse_value("host_ip", value)?,
                "multicast_ip" => {
                    params.multicast_ip = match value {
                        "" => None,
                        v => Some(parse_value("multicast_ip", v)?),
                    };
                },
                "udp_port" => params.udp_port = parse_value("udp_port", value)?,
                "ptc_port" => params.ptc_port = parse_value("ptc_port", value)?,
                _ => debug!("ignoring unknown sensor parameter `{}`", key),
            }
        }
        Ok(params)
    }
}

impl SensorParams {
    /// Local address to receive data packets on
    pub fn data_addr(&self) -> SocketAddr {
        SocketAddrV4::new(self.host_ip, self.udp_port).into()
    }

    /// Build the decoder for `lidar_type` and load the configured files.
    ///
    /// QT128 auxiliary tables are skipped with an info message for other
    /// models. An unreadable or malformed auxiliary table is logged and
    /// decoding goes on without it.
    pub fn decoder(&self) -> Result<Decoder, ParamsError> {
        let model = self.lidar_type.ok_or(ParamsError::NoModel)?;
        let mut decoder = Decoder::new(model);
        if let Some(path) = &self.correction_file {
            let mut file = FileCalibration::new(path);
            decoder.load_calibration_from(&mut [&mut file])?;
        }
        if model != LidarModel::Qt128 {
            if self.channel_config_file.is_some() || self.firetimes_file.is_some() {
                info!("{} ignores channel config and fire time files", model);
            }
            return Ok(decoder);
        }
        if let Some(path) = &self.channel_config_file {
            let res = fs::read(path).map_err(CalibrationError::from)
                .and_then(|blob| decoder.load_channel_config(&blob));
            if let Err(err) = res {
                warn!("decoding without channel remap, {}: {}", path.display(), err);
            }
        }
        if let Some(path) = &self.firetimes_file {
            let res = fs::read(path).map_err(CalibrationError::from)
                .and_then(|blob| decoder.load_firetimes(&blob));
            if let Err(err) = res {
                warn!("decoding without fire time correction, {}: {}", path.display(), err);
            }
        }
        Ok(decoder)
    }
}
