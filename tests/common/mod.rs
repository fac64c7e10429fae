#![allow(dead_code)]
//! Synthetic packets and calibration blobs

use hesai::LidarModel;

pub const SEQUENCE: u8 = 0x01;
pub const IMU: u8 = 0x02;
pub const FUNCTION_SAFETY: u8 = 0x04;
pub const CYBER_SECURITY: u8 = 0x08;
pub const CONFIDENCE: u8 = 0x10;
pub const SELF_DEFINE: u8 = 0x40;

#[derive(Debug, Clone)]
pub struct PacketBuilder {
    pub model: LidarModel,
    pub version: (u8, u8),
    pub lasers: u8,
    pub flags: u8,
    /// Millimetres per distance count
    pub dist_unit: u8,
    /// Block azimuths and fine azimuths (AT128 only)
    pub blocks: Vec<(u16, u8)>,
    pub distance: u16,
    pub reflectivity: u8,
    pub return_mode: u8,
    pub motor_speed: i16,
    pub mode_flag: u8,
    pub utc: [u8; 6],
    pub timestamp: u32,
    pub sequence: u32,
}

impl PacketBuilder {
    pub fn new(model: LidarModel, lasers: u8, azimuths: &[u16]) -> Self {
        let version = match model {
            LidarModel::P128 => (1, 4),
            LidarModel::Qt128 => (3, 2),
            LidarModel::At128 => (4, 3),
        };
        Self {
            model,
            version,
            lasers,
            flags: 0,
            dist_unit: 4,
            blocks: azimuths.iter().map(|&a| (a, 0)).collect(),
            distance: 2500,
            reflectivity: 255,
            return_mode: 0x37,
            motor_speed: 600,
            mode_flag: 0,
            utc: [0; 6],
            timestamp: 0,
            sequence: 0,
        }
    }

    pub fn p128(lasers: u8, azimuths: &[u16]) -> Self {
        Self::new(LidarModel::P128, lasers, azimuths)
    }

    pub fn qt128(lasers: u8, azimuths: &[u16]) -> Self {
        Self::new(LidarModel::Qt128, lasers, azimuths)
    }

    pub fn at128(lasers: u8, azimuths: &[(u16, u8)]) -> Self {
        let mut b = Self::new(LidarModel::At128, lasers, &[]);
        b.blocks = azimuths.to_vec();
        b.motor_speed = 2000;
        b.return_mode = 0x39;
        b
    }

    pub fn flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    fn unit_size(&self) -> usize {
        match self.model {
            LidarModel::At128 => 4,
            _ if self.flags & CONFIDENCE != 0 => 4,
            _ => 3,
        }
    }

    fn tail(&self) -> Vec<u8> {
        let speed = self.motor_speed.to_le_bytes();
        let ts = self.timestamp.to_le_bytes();
        match self.model {
            LidarModel::At128 => {
                let mut t = vec![0u8; 32];
                t[18..20].copy_from_slice(&speed);
                t[20..24].copy_from_slice(&ts);
                t[24] = self.return_mode;
                t[26..32].copy_from_slice(&self.utc);
                t
            },
            _ => {
                let mut t = vec![0u8; 26];
                if self.model == LidarModel::Qt128 {
                    t[5] = self.mode_flag;
                }
                t[12] = self.return_mode;
                t[13..15].copy_from_slice(&speed);
                t[15..21].copy_from_slice(&self.utc);
                t[21..25].copy_from_slice(&ts);
                t
            },
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut b = vec![0xEE, 0xFF, self.version.0, self.version.1, 0, 0];
        b.extend_from_slice(&[
            self.lasers, self.blocks.len() as u8, 0, self.dist_unit, 1, self.flags,
        ]);
        let at128 = self.model == LidarModel::At128;
        for &(azimuth, fine) in &self.blocks {
            b.extend_from_slice(&azimuth.to_le_bytes());
            if at128 {
                b.push(fine);
            }
            for _ in 0..self.lasers {
                b.extend_from_slice(&self.distance.to_le_bytes());
                b.push(self.reflectivity);
                if self.unit_size() == 4 {
                    b.push(0);
                }
            }
        }
        b.extend_from_slice(&[0; 4]);
        if !at128 && self.flags & FUNCTION_SAFETY != 0 {
            b.extend_from_slice(&[0; 17]);
        }
        b.extend(self.tail());
        if self.flags & SEQUENCE != 0 {
            b.extend_from_slice(&self.sequence.to_le_bytes());
        }
        if self.model == LidarModel::P128 && self.flags & IMU != 0 {
            b.extend_from_slice(&[0; 22]);
        }
        b.extend_from_slice(&[0; 4]);
        if self.flags & CYBER_SECURITY != 0 {
            b.extend_from_slice(&[0; 32]);
        }
        b
    }
}

/// Text angle correction with `(elevation, azimuth)` degrees per channel
pub fn angle_correction(rows: &[(f64, f64)]) -> Vec<u8> {
    let mut s = String::from("EEFF,1,1\nChannel,Elevation,Azimuth\n");
    for (i, (elevation, azimuth)) in rows.iter().enumerate() {
        s += &format!("{},{},{}\n", i + 1, elevation, azimuth);
    }
    s.into_bytes()
}

/// Angle correction of `n` channels with zero azimuth offsets and
/// elevations spread over -25..+15 degrees
pub fn flat_correction(n: usize) -> Vec<u8> {
    let rows: Vec<(f64, f64)> = (0..n)
        .map(|i| (-25. + 40. * i as f64 / n as f64, 0.))
        .collect();
    angle_correction(&rows)
}

/// QT128 channel config, `rows[position] = [loop 0 id, loop 1 id]` (1-based)
pub fn channel_config(rows: &[[u16; 2]]) -> Vec<u8> {
    let mut s = format!("EEFF,1,1\nLaser num,{},Block num,2\nLoop1,Loop2\n", rows.len());
    for r in rows {
        s += &format!("{},{}\n", r[0], r[1]);
    }
    s.into_bytes()
}

/// QT128 fire times, every laser of loop `l` fires after `us[l]` µs
pub fn firetimes(us: &[f32]) -> Vec<u8> {
    let mut s = format!("EEFF,1,0\nLoop num,,,{}\nheader\n", us.len());
    for i in 1..=128 {
        let pairs: Vec<String> = us.iter().map(|t| format!("{},{}", i, t)).collect();
        s += &pairs.join(",");
        s += "\n";
    }
    s.into_bytes()
}

/// AT128 v5 correction with resolution 1.
///
/// `frames` are start/end azimuths in 1/25600 degree, channel angles are in
/// the same unit and `offset(channel, entry)` fills both offset tables.
pub fn at128_correction<F>(
    frames: &[(u32, u32)],
    azimuth: &[i32],
    elevation: &[i32],
    offset: F,
) -> Vec<u8>
    where F: Fn(usize, usize) -> i8
{
    let channels = azimuth.len();
    let mut b = vec![0xEE, 0xFF, 1, 5, channels as u8, 3, frames.len() as u8];
    b.extend_from_slice(&[0; 8]);
    b.push(1);
    for &(start, _) in frames {
        b.extend_from_slice(&start.to_le_bytes());
    }
    for &(_, end) in frames {
        b.extend_from_slice(&end.to_le_bytes());
    }
    for v in azimuth.iter().chain(elevation.iter()) {
        b.extend_from_slice(&v.to_le_bytes());
    }
    for _ in 0..2 {
        for ch in 0..channels {
            for i in 0..180 {
                b.push(offset(ch, i) as u8);
            }
        }
    }
    b.extend_from_slice(&[0; 32]);
    b
}
