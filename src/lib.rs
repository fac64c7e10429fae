//! Decoding of Hesai P128, QT128 and AT128 LiDAR packets into point clouds
//!
//! ```no_run
//! use hesai::{Decoder, FileCalibration, FrameIterator, LidarModel, UdpSource};
//!
//! let mut decoder = Decoder::new(LidarModel::P128);
//! let mut file = FileCalibration::new("angle_correction.csv");
//! decoder.load_calibration_from(&mut [&mut file]).unwrap();
//!
//! let source = UdpSource::new().unwrap();
//! for frame in FrameIterator::new(source, decoder) {
//!     let frame = frame.unwrap();
//!     println!("{} points", frame.len());
//! }
//! ```
pub mod error;
pub mod trig;
pub mod point;
pub mod packet;
pub mod frame;
pub mod calib;
pub mod constants;
pub mod decoder;
pub mod params;

pub mod p128;
pub mod qt128;
pub mod at128;

use std::io;
use std::cmp::max;
use std::net::SocketAddr;

use log::{debug, warn};

pub use crate::at128::{At128Calibration, At128Decoder};
pub use crate::calib::{AngleCorrection, CalibrationSource, FileCalibration};
pub use crate::constants::DecoderConstants;
pub use crate::decoder::{Decoder, LidarModel, PacketDecoder, PacketMeta, UnknownModel};
pub use crate::error::{CalibrationError, ChannelError, DecodeError};
pub use crate::frame::FrameSplitter;
pub use crate::p128::P128Decoder;
pub use crate::packet::{MemorySource, PacketSource, PcapSource, UdpSource};
pub use crate::params::{ParamsError, SensorParams};
pub use crate::point::{CartesianPoint, SphericalPoint};
pub use crate::qt128::{ChannelConfig, Firetimes, Qt128Decoder};
pub use crate::trig::TrigTable;

/// This struct listens to the `packet_source` and decodes packets into
/// internal point buffers
pub struct PointSource<T: PacketSource> {
    packet_source: T,
    decoder: Decoder,
    cartesian: Vec<CartesianPoint>,
    spherical: Vec<SphericalPoint>,
    n_points: usize,
}

impl<T: PacketSource> PointSource<T> {
    pub fn new(packet_source: T, decoder: Decoder) -> Self {
        Self {
            packet_source,
            decoder,
            cartesian: Vec::new(),
            spherical: Vec::new(),
            n_points: 0,
        }
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    /// Access decoder, e.g. to reload calibration between packets
    pub fn decoder_mut(&mut self) -> &mut Decoder {
        &mut self.decoder
    }

    pub fn into_inner(self) -> (T, Decoder) {
        (self.packet_source, self.decoder)
    }

    /// Decode the next received packet.
    ///
    /// `Ok(None)` means the source has no packet. A rejected packet is
    /// returned as the inner error and leaves no points behind.
    pub fn process_packet(&mut self)
        -> io::Result<Option<(SocketAddr, Result<PacketMeta, DecodeError>)>>
    {
        self.n_points = 0;
        let (addr, packet) = match self.packet_source.next_packet()? {
            Some(val) => val,
            None => return Ok(None),
        };

        let cap = match self.decoder.point_capacity(packet) {
            Ok(cap) => cap,
            Err(err) => return Ok(Some((addr, Err(err)))),
        };
        if self.cartesian.len() < cap {
            self.cartesian.resize(cap, Default::default());
            self.spherical.resize(cap, Default::default());
        }
        let res = self.decoder.decode(packet, &mut self.cartesian, &mut self.spherical);
        if let Ok(meta) = &res {
            self.n_points = meta.n_points;
        }
        Ok(Some((addr, res)))
    }

    /// Points of the last decoded packet
    pub fn points(&self) -> (&[CartesianPoint], &[SphericalPoint]) {
        (&self.cartesian[..self.n_points], &self.spherical[..self.n_points])
    }
}

/// Points of one sensor rotation or field sweep
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub cartesian: Vec<CartesianPoint>,
    pub spherical: Vec<SphericalPoint>,
    /// Decoded packets
    pub packets: usize,
    /// Packets rejected by the decoder
    pub rejected: usize,
    /// Sensor timestamp of the packet which completed the frame
    pub sensor_timestamp_us: Option<i64>,
}

impl Frame {
    fn with_capacity(cap: usize) -> Self {
        Self {
            cartesian: Vec::with_capacity(cap),
            spherical: Vec::with_capacity(cap),
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.cartesian.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cartesian.is_empty()
    }
}

/// Iterator which returns points for each frame reported by the decoder
pub struct FrameIterator<T: PacketSource> {
    point_source: PointSource<T>,
    cap: usize,
}

impl<T: PacketSource> FrameIterator<T> {
    pub fn new(packet_source: T, decoder: Decoder) -> Self {
        Self { point_source: PointSource::new(packet_source, decoder), cap: 0 }
    }

    pub fn point_source(&self) -> &PointSource<T> {
        &self.point_source
    }

    pub fn point_source_mut(&mut self) -> &mut PointSource<T> {
        &mut self.point_source
    }
}

impl<T: PacketSource> Iterator for FrameIterator<T> {
    type Item = io::Result<Frame>;

    /// Frames end with the packet reporting `scan_complete`, its points
    /// included. A trailing incomplete frame is dropped when the source
    /// runs out of packets.
    fn next(&mut self) -> Option<Self::Item> {
        let mut frame = Frame::with_capacity(self.cap);
        loop {
            let meta = match self.point_source.process_packet() {
                Ok(Some((_, Ok(meta)))) => meta,
                Ok(Some((addr, Err(err)))) => {
                    warn!("rejected packet from {}: {}", addr, err);
                    frame.rejected += 1;
                    continue;
                },
                Ok(None) => {
                    if frame.packets != 0 {
                        debug!("dropping incomplete frame of {} points", frame.len());
                    }
                    return None;
                },
                Err(err) => return Some(Err(err)),
            };
            let (cartesian, spherical) = self.point_source.points();
            frame.cartesian.extend_from_slice(cartesian);
            frame.spherical.extend_from_slice(spherical);
            frame.packets += 1;
            if meta.scan_complete {
                frame.sensor_timestamp_us = meta.sensor_timestamp_us;
                break;
            }
        }
        self.cap = max(self.cap, (11*frame.len())/10);
        Some(Ok(frame))
    }
}
