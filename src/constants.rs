//! Device metadata used by consumers to size their buffers
use std::f32::consts::PI;

/// Snapshot of decoder properties
#[derive(Debug, Clone, PartialEq)]
pub struct DecoderConstants {
    /// Upper bound of a packet in bytes
    pub max_payload_size: usize,
    pub packets_per_second: u32,
    pub points_per_second: u32,
    /// Hz
    pub spin_frequency: f32,
    pub packets_per_spin: u32,
    pub points_per_packet: u32,
    pub points_per_spin: u32,
    pub point_stride: u32,
    /// Radians
    pub horizontal_fov_start: f32,
    pub horizontal_fov_end: f32,
    pub vertical_fov_start: f32,
    pub vertical_fov_end: f32,
    pub number_of_rows: u32,
    /// Radians, one per row, zeros until calibration is loaded
    pub vertical_angles: Vec<f32>,
}

pub(crate) const MAX_PAYLOAD_SIZE: usize = crate::packet::MAX_PACKET_SIZE;
pub(crate) const ROWS: usize = 128;

const MECHANICAL_PACKETS_PER_SPIN: u32 = 900;
const MECHANICAL_POINTS_PER_PACKET: u32 = 256;
const MECHANICAL_DEFAULT_RPM: u16 = 600;
const MECHANICAL_VERTICAL_FOV: f32 = 52.6;

const AT128_DEFAULT_SPEED: i16 = 2000;
const AT128_PACKETS_PER_SPIN: f32 = 1250.;
const AT128_POINTS_PER_SPIN: f32 = 320_000.;
const AT128_POINTS_PER_PACKET: u32 = 256;

/// Expand calibrated elevations into one radian value per row
pub(crate) fn rows<I: IntoIterator<Item = f32>>(radians: I) -> Vec<f32> {
    let mut v: Vec<f32> = radians.into_iter().take(ROWS).collect();
    v.resize(ROWS, 0.);
    v
}

impl DecoderConstants {
    /// Constants of the spinning 128 channel sensors (P128, QT128).
    ///
    /// `motor_speed` is the last reported RPM, zero if no packet was decoded.
    pub(crate) fn mechanical(motor_speed: u16, dual_return: bool,
        vertical_angles: Vec<f32>) -> Self
    {
        let rpm = if motor_speed == 0 { MECHANICAL_DEFAULT_RPM } else { motor_speed };
        let spin_frequency = rpm as f32 / 60.;
        let packets_per_spin = MECHANICAL_PACKETS_PER_SPIN
            * if dual_return { 2 } else { 1 };
        let points_per_spin = packets_per_spin * MECHANICAL_POINTS_PER_PACKET;
        let packets_per_second = (packets_per_spin as f32 * spin_frequency).round() as u32;
        Self {
            max_payload_size: MAX_PAYLOAD_SIZE,
            packets_per_second,
            points_per_second: packets_per_second * MECHANICAL_POINTS_PER_PACKET,
            spin_frequency,
            packets_per_spin,
            points_per_packet: MECHANICAL_POINTS_PER_PACKET,
            points_per_spin,
            point_stride: 8,
            horizontal_fov_start: 0.,
            horizontal_fov_end: 2. * PI,
            vertical_fov_start: (-MECHANICAL_VERTICAL_FOV).to_radians(),
            vertical_fov_end: MECHANICAL_VERTICAL_FOV.to_radians(),
            number_of_rows: ROWS as u32,
            vertical_angles,
        }
    }

    /// Constants of the AT128, scaled by the last reported motor speed
    pub(crate) fn at128(motor_speed: i16, dual_return: bool,
        vertical_angles: Vec<f32>) -> Self
    {
        let speed = if motor_speed <= 0 { AT128_DEFAULT_SPEED } else { motor_speed };
        let scale = speed as f32 / AT128_DEFAULT_SPEED as f32
            / if dual_return { 1. } else { 2. };
        let spin_frequency = speed as f32 / 200.;
        let packets_per_spin = (AT128_PACKETS_PER_SPIN * scale).round() as u32;
        let points_per_spin = (AT128_POINTS_PER_SPIN * scale).round() as u32;
        Self {
            max_payload_size: MAX_PAYLOAD_SIZE,
            packets_per_second: (packets_per_spin as f32 * spin_frequency).round() as u32,
            points_per_second: (points_per_spin as f32 * spin_frequency).round() as u32,
            spin_frequency,
            packets_per_spin,
            points_per_packet: AT128_POINTS_PER_PACKET,
            points_per_spin,
            point_stride: 4,
            horizontal_fov_start: 0.5,
            horizontal_fov_end: 2.8,
            vertical_fov_start: -0.216697,
            vertical_fov_end: 0.224673,
            number_of_rows: ROWS as u32,
            vertical_angles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mechanical_defaults() {
        let c = DecoderConstants::mechanical(0, false, rows(Vec::<f32>::new()));
        assert_eq!(c.spin_frequency, 10.);
        assert_eq!(c.packets_per_spin, 900);
        assert_eq!(c.packets_per_second, 9000);
        assert_eq!(c.points_per_second, 2_304_000);
        assert_eq!(c.points_per_spin, 230_400);
        assert_eq!(c.vertical_angles, vec![0.; 128]);
        assert_eq!(c.max_payload_size, 1500);

        let c = DecoderConstants::mechanical(1200, true, rows(Vec::<f32>::new()));
        assert_eq!(c.spin_frequency, 20.);
        assert_eq!(c.packets_per_spin, 1800);
        assert_eq!(c.packets_per_second, 36_000);
    }

    #[test]
    fn at128_scaling() {
        let c = DecoderConstants::at128(0, true, rows(Vec::<f32>::new()));
        assert_eq!(c.spin_frequency, 10.);
        assert_eq!(c.packets_per_spin, 1250);
        assert_eq!(c.points_per_spin, 320_000);
        assert_eq!(c.points_per_second, 3_200_000);

        let c = DecoderConstants::at128(2000, false, rows(Vec::<f32>::new()));
        assert_eq!(c.packets_per_spin, 625);
        assert_eq!(c.points_per_spin, 160_000);
        assert_eq!(c.point_stride, 4);
    }

    #[test]
    fn rows_are_padded_and_truncated() {
        assert_eq!(rows(vec![1., 2.]).len(), 128);
        assert_eq!(rows(vec![1.; 300]).len(), 128);
        assert_eq!(rows(vec![1., 2.])[..3], [1., 2., 0.]);
    }
}
