mod common;

use common::*;
use hesai::p128::wire;
use hesai::{
    CalibrationError, CartesianPoint, ChannelError, DecodeError, Decoder,
    LidarModel, P128Decoder, PacketDecoder, SphericalPoint,
};

fn buffers(n: usize) -> (Vec<CartesianPoint>, Vec<SphericalPoint>) {
    (vec![Default::default(); n], vec![Default::default(); n])
}

fn calibrated(channels: usize) -> P128Decoder {
    let mut d = P128Decoder::new();
    d.load_calibration(&flat_correction(channels)).unwrap();
    d
}

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}

#[test]
fn decode_points() {
    let mut d = calibrated(4);
    let packet = PacketBuilder::p128(4, &[9000, 9010]).build();
    let (mut c, mut s) = buffers(8);
    let meta = d.decode(&packet, &mut c, &mut s).unwrap();

    assert_eq!(meta.n_points, 8);
    assert!(!meta.scan_complete);
    assert_eq!((meta.laser_count, meta.block_count), (4, 2));
    assert_eq!(meta.motor_speed, 600);
    assert!(!meta.dual_return);
    assert_eq!(meta.sequence, None);
    assert!(close(meta.min_azimuth, 90f32.to_radians()));
    assert!(close(meta.max_azimuth, 90.1f32.to_radians()));
    assert!(close(meta.min_elevation, (-25f32).to_radians()));
    assert!(close(meta.max_elevation, 5f32.to_radians()));

    // 2500 counts of 4 mm, first channel at -25 degrees, facing +x
    let p = c[0];
    assert!(close(p.x, 10. * 25f32.to_radians().cos()));
    assert!(p.y.abs() < 1e-4);
    assert!(close(p.z, -10. * 25f32.to_radians().sin()));
    assert_eq!(p.intensity, 1.);
    assert!(close(s[0].radius, 10.));
    assert!(close(s[0].theta, 90f32.to_radians()));
    assert!(close(s[0].phi, (-25f32).to_radians()));
    assert!(close(s[7].theta, 90.1f32.to_radians()));
    assert!(close(s[7].phi, 5f32.to_radians()));

    for (c, s) in c.iter().zip(s.iter()) {
        let r = (c.x * c.x + c.y * c.y + c.z * c.z).sqrt();
        assert!((r - s.radius).abs() < 1e-3);
    }
}

#[test]
fn azimuth_correction_is_added() {
    let mut d = P128Decoder::new();
    d.load_calibration(&angle_correction(&[(0., 1.5), (0., -3.0)])).unwrap();
    let packet = PacketBuilder::p128(2, &[100]).build();
    let (mut c, mut s) = buffers(2);
    d.decode(&packet, &mut c, &mut s).unwrap();
    assert!(close(s[0].theta, 2.5f32.to_radians()));
    // 1 - 3 degrees wraps below zero
    assert!(close(s[1].theta, 358f32.to_radians()));
    assert!(s[1].phi.abs() < 1e-6);
}

#[test]
fn optional_sections() {
    let mut d = calibrated(4);
    let mut b = PacketBuilder::p128(4, &[9000])
        .flags(SEQUENCE | IMU | FUNCTION_SAFETY | CYBER_SECURITY | CONFIDENCE);
    b.sequence = 42;
    b.utc = [121, 3, 4, 5, 6, 7];
    b.timestamp = 250;
    b.return_mode = 0x39;
    let packet = b.build();
    let (mut c, mut s) = buffers(4);
    let meta = d.decode(&packet, &mut c, &mut s).unwrap();
    assert_eq!(meta.sequence, Some(42));
    assert_eq!(meta.sensor_timestamp_us, Some(1_614_834_367_000_250));
    assert!(meta.dual_return);
    assert!(close(s[3].radius, 10.));
    assert_eq!(wire::Packet::parse(&packet).unwrap().imu().map(<[u8]>::len), Some(22));
    let plain = PacketBuilder::p128(4, &[9000]).flags(SEQUENCE).build();
    assert!(wire::Packet::parse(&plain).unwrap().imu().is_none());

    let res = d.decode(&packet[..packet.len() - 1], &mut c, &mut s);
    assert_eq!(res, Err(DecodeError::Truncated {
        expected: packet.len(),
        actual: packet.len() - 1,
    }));
}

#[test]
fn rejects_bad_packets() {
    let mut d = P128Decoder::new();
    let packet = PacketBuilder::p128(4, &[9000]).build();
    let (mut c, mut s) = buffers(8);
    assert_eq!(d.decode(&packet, &mut c, &mut s), Err(DecodeError::CalibrationNotLoaded));

    let mut d = calibrated(4);
    let mut bad = packet.clone();
    bad[0] = 0x00;
    assert_eq!(d.decode(&bad, &mut c, &mut s), Err(DecodeError::InvalidDelimiter(0x00, 0xFF)));
    assert_eq!(d.decode(&packet[..1], &mut c, &mut s),
        Err(DecodeError::Truncated { expected: 12, actual: 1 }));

    let qt = PacketBuilder::qt128(4, &[9000]).build();
    assert_eq!(d.decode(&qt, &mut c, &mut s),
        Err(DecodeError::UnsupportedVersion { major: 3, minor: 2 }));

    let wide = PacketBuilder::p128(8, &[9000]).build();
    assert_eq!(d.decode(&wide, &mut c, &mut s),
        Err(DecodeError::ChannelMismatch { declared: 8, loaded: 4 }));

    let two = PacketBuilder::p128(4, &[9000, 9010]).build();
    let (mut c, mut s) = buffers(7);
    assert_eq!(d.decode(&two, &mut c, &mut s),
        Err(DecodeError::OutputTooSmall { needed: 8, actual: 7 }));
}

#[test]
fn rejected_packet_keeps_frame_state() {
    let mut d = calibrated(4);
    let (mut c, mut s) = buffers(4);
    let first = PacketBuilder::p128(4, &[35_000]).build();
    assert!(!d.decode(&first, &mut c, &mut s).unwrap().scan_complete);

    let truncated = PacketBuilder::p128(4, &[100]).build();
    assert!(d.decode(&truncated[..truncated.len() - 1], &mut c, &mut s).is_err());

    let next = PacketBuilder::p128(4, &[35_100]).build();
    assert!(!d.decode(&next, &mut c, &mut s).unwrap().scan_complete);

    let wrapped = PacketBuilder::p128(4, &[50]).build();
    assert!(d.decode(&wrapped, &mut c, &mut s).unwrap().scan_complete);

    d.reset();
    let after_reset = PacketBuilder::p128(4, &[20_000]).build();
    assert!(!d.decode(&after_reset, &mut c, &mut s).unwrap().scan_complete);
}

#[test]
fn split_inside_packet() {
    let mut d = calibrated(2);
    let (mut c, mut s) = buffers(4);
    let packet = PacketBuilder::p128(2, &[35_950, 40]).build();
    let meta = d.decode(&packet, &mut c, &mut s).unwrap();
    assert!(meta.scan_complete);
    assert!(close(meta.min_azimuth, 0.4f32.to_radians()));
    assert!(close(meta.max_azimuth, 359.5f32.to_radians()));
}

#[test]
fn calibration_reload() {
    let mut d = calibrated(4);
    let first = d.calibration().cloned();
    d.load_calibration(&flat_correction(4)).unwrap();
    assert_eq!(d.calibration().cloned(), first);

    let err = d.load_calibration(b"EEFF,1,1\nChannel,Elevation,Azimuth\n1,abc,0\n");
    assert!(matches!(err, Err(CalibrationError::InvalidField { line: 3, .. })));
    assert_eq!(d.calibration().cloned(), first);
    assert_eq!(d.vertical_angle(0), Ok(-25.));
}

#[test]
fn vertical_angles() {
    let mut d = P128Decoder::new();
    assert_eq!(d.vertical_angle(0), Err(ChannelError::NotLoaded));
    d.load_calibration(&angle_correction(&[(14.436, 0.), (-6.5, 0.)])).unwrap();
    assert_eq!(d.vertical_angle(0), Ok(14.436));
    assert_eq!(d.vertical_angle(1), Ok(-6.5));
    assert_eq!(d.vertical_angle(2), Err(ChannelError::OutOfRange { channel: 2, loaded: 2 }));
}

#[test]
fn constants_follow_packets() {
    let mut d = P128Decoder::new();
    let c = d.constants();
    assert_eq!(c.number_of_rows, 128);
    assert_eq!(c.vertical_angles, vec![0.; 128]);
    assert_eq!(c.spin_frequency, 10.);
    assert_eq!(c.packets_per_spin, 900);
    assert_eq!(c.points_per_packet, 256);

    d.load_calibration(&flat_correction(4)).unwrap();
    let mut b = PacketBuilder::p128(4, &[9000]);
    b.motor_speed = 1200;
    b.return_mode = 0x3B;
    let (mut cart, mut sph) = buffers(4);
    d.decode(&b.build(), &mut cart, &mut sph).unwrap();
    let c = d.constants();
    assert_eq!(c.spin_frequency, 20.);
    assert_eq!(c.packets_per_spin, 1800);
    assert!(close(c.vertical_angles[0], (-25f32).to_radians()));
    assert_eq!(c.vertical_angles[4], 0.);
}

#[test]
fn calibration_fallback() {
    let mut d = Decoder::new(LidarModel::P128);
    let mut broken = b"garbage".to_vec();
    let mut good = flat_correction(4);
    d.load_calibration_from(&mut [&mut broken, &mut good]).unwrap();
    assert!(d.is_calibrated());
    assert_eq!(d.vertical_angle(1), Ok(-15.));

    let mut empty = b"EEFF,1,1\nChannel,Elevation,Azimuth\n".to_vec();
    let err = d.load_calibration_from(&mut [&mut empty]);
    assert!(matches!(err, Err(CalibrationError::Empty)));
    assert_eq!(d.vertical_angle(1), Ok(-15.));

    assert!(matches!(d.load_firetimes(&firetimes(&[1.])),
        Err(CalibrationError::NotSupported(_))));
}
