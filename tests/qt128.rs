mod common;

use common::*;
use hesai::{
    CalibrationError, CartesianPoint, DecodeError, Decoder, LidarModel,
    PacketDecoder, Qt128Decoder, SphericalPoint,
};

fn buffers(n: usize) -> (Vec<CartesianPoint>, Vec<SphericalPoint>) {
    (vec![Default::default(); n], vec![Default::default(); n])
}

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}

/// Channel `i` sits at `i` degrees elevation
fn stepped_correction(n: usize) -> Vec<u8> {
    let rows: Vec<(f64, f64)> = (0..n).map(|i| (i as f64, 0.)).collect();
    angle_correction(&rows)
}

fn phis(s: &[SphericalPoint]) -> Vec<i32> {
    s.iter().map(|p| p.phi.to_degrees().round() as i32).collect()
}

#[test]
fn remap_by_firing_loop() {
    let mut d = Qt128Decoder::new();
    d.load_calibration(&stepped_correction(8)).unwrap();
    // wire position 0 is laser 6 and position 1 laser 3 in the second loop
    d.load_channel_config(&channel_config(&[[1, 6], [2, 3]])).unwrap();

    // single return with mode flag 0: first block fires loop 1, second loop 0
    let packet = PacketBuilder::qt128(2, &[1000, 1010]).flags(SELF_DEFINE).build();
    let (mut c, mut s) = buffers(4);
    let meta = d.decode(&packet, &mut c, &mut s).unwrap();
    assert_eq!(meta.n_points, 4);
    assert_eq!(phis(&s), vec![5, 2, 0, 1]);

    // table is ignored unless the packet announces it
    let packet = PacketBuilder::qt128(2, &[1020, 1030]).build();
    d.decode(&packet, &mut c, &mut s).unwrap();
    assert_eq!(phis(&s), vec![0, 1, 0, 1]);
}

#[test]
fn remap_in_dual_return() {
    let mut d = Qt128Decoder::new();
    d.load_calibration(&stepped_correction(8)).unwrap();
    d.load_channel_config(&channel_config(&[[1, 6], [2, 3]])).unwrap();

    // dual return: both blocks of a pair share loop 1 when mode flag is 0
    let mut b = PacketBuilder::qt128(2, &[1000, 1000, 1010, 1010]).flags(SELF_DEFINE);
    b.return_mode = 0x39;
    let (mut c, mut s) = buffers(8);
    d.decode(&b.build(), &mut c, &mut s).unwrap();
    assert_eq!(phis(&s), vec![5, 2, 5, 2, 0, 1, 0, 1]);

    b.mode_flag = 1;
    d.decode(&b.build(), &mut c, &mut s).unwrap();
    assert_eq!(phis(&s), vec![0, 1, 0, 1, 5, 2, 5, 2]);
}

#[test]
fn remap_must_fit_calibration() {
    let mut d = Qt128Decoder::new();
    d.load_calibration(&stepped_correction(4)).unwrap();
    d.load_channel_config(&channel_config(&[[1, 6], [2, 3]])).unwrap();
    let packet = PacketBuilder::qt128(2, &[1000]).flags(SELF_DEFINE).build();
    let (mut c, mut s) = buffers(2);
    assert_eq!(d.decode(&packet, &mut c, &mut s),
        Err(DecodeError::ChannelMismatch { declared: 6, loaded: 4 }));

    let plain = PacketBuilder::qt128(2, &[1000]).build();
    assert!(d.decode(&plain, &mut c, &mut s).is_ok());
}

#[test]
fn fire_time_correction() {
    let mut d = Qt128Decoder::new();
    d.load_calibration(&stepped_correction(2)).unwrap();
    d.load_firetimes(&firetimes(&[0., 100.1])).unwrap();

    let packet = PacketBuilder::qt128(2, &[9000, 9010]).build();
    let (mut c, mut s) = buffers(4);
    d.decode(&packet, &mut c, &mut s).unwrap();
    // loop 1 fires 100.1 µs late, 0.36 degrees at 600 rpm
    assert!(close(s[0].theta, 90.36f32.to_radians()));
    assert!(close(s[1].theta, 90.36f32.to_radians()));
    assert!(close(s[2].theta, 90.1f32.to_radians()));

    d.set_fire_time_correction(false);
    d.decode(&packet, &mut c, &mut s).unwrap();
    assert!(close(s[0].theta, 90f32.to_radians()));
}

#[test]
fn tail_metadata() {
    let mut d = Qt128Decoder::new();
    d.load_calibration(&stepped_correction(2)).unwrap();
    let mut b = PacketBuilder::qt128(2, &[500]).flags(SEQUENCE | CONFIDENCE | FUNCTION_SAFETY);
    b.sequence = 7;
    b.motor_speed = 1200;
    b.utc = [0, 0, 0x60, 0x40, 0x9F, 0xBF];
    b.timestamp = 12;
    let packet = b.build();
    let (mut c, mut s) = buffers(2);
    let meta = d.decode(&packet, &mut c, &mut s).unwrap();
    assert_eq!(meta.sequence, Some(7));
    assert_eq!(meta.motor_speed, 1200);
    assert_eq!(meta.sensor_timestamp_us, Some(0x6040_9FBF * 1_000_000 + 12));
    assert_eq!(d.constants().spin_frequency, 20.);

    assert_eq!(d.decode(&packet[..packet.len() - 4], &mut c, &mut s),
        Err(DecodeError::Truncated { expected: packet.len(), actual: packet.len() - 4 }));
}

#[test]
fn auxiliary_tables_through_decoder() {
    let mut d = Decoder::new(LidarModel::Qt128);
    d.load_channel_config(&channel_config(&[[1, 2]])).unwrap();
    d.load_firetimes(&firetimes(&[1., 2.])).unwrap();
    assert!(matches!(d.load_firetimes(b"EEFF\n"),
        Err(CalibrationError::MissingHeader(_))));
    match &d {
        Decoder::Qt128(qt) => {
            assert_eq!(qt.firetimes().map(|f| f.get(1, 0)), Some(2.));
            assert_eq!(qt.channel_config().map(|c| c.loop_count()), Some(2));
        },
        _ => panic!("expected QT128 decoder"),
    }
}

#[test]
fn rejects_foreign_delimiter() {
    let mut d = Qt128Decoder::new();
    d.load_calibration(&stepped_correction(4)).unwrap();
    let packet = PacketBuilder::qt128(2, &[1000, 1010]).build();
    let (mut c, mut s) = buffers(4);
    assert!(d.decode(&packet, &mut c, &mut s).is_ok());

    let mut bad = packet.clone();
    bad[0] = 0xFF;
    bad[1] = 0xEE;
    assert_eq!(d.decode(&bad, &mut c, &mut s), Err(DecodeError::InvalidDelimiter(0xFF, 0xEE)));
    let mut bad = packet;
    bad[1] = 0x00;
    assert_eq!(d.decode(&bad, &mut c, &mut s), Err(DecodeError::InvalidDelimiter(0xEE, 0x00)));
}
