use hesai::packet::{self, Header, PacketSource, PcapSource};
use hesai::{at128, p128, qt128, DecodeError, LidarModel};
use std::error::Error;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "hesai packet info", about = "Print header and tail of every packet")]
struct Cli {
    /// Path to pcap file
    path: String,
    /// Sensor model: P128, QT128 or AT128
    #[structopt(long = "model", short = "m", default_value = "P128")]
    model: LidarModel,
}

/// Header, the tail fields common to all models and the P128 IMU section size
fn describe(model: LidarModel, data: &[u8]) -> Result<String, DecodeError> {
    let (header, sequence, return_mode, motor_speed, utc, timestamp, imu) = match model {
        LidarModel::P128 => {
            let p = p128::wire::Packet::parse(data)?;
            let t = p.tail();
            let imu = p.imu().map(|b| b.len());
            (p.header, p.sequence(), t.return_mode, t.motor_speed as i32, t.utc, t.timestamp, imu)
        },
        LidarModel::Qt128 => {
            let p = qt128::wire::Packet::parse(data)?;
            let t = p.tail();
            (p.header, p.sequence(), t.return_mode, t.motor_speed as i32, t.utc, t.timestamp, None)
        },
        LidarModel::At128 => {
            let p = at128::wire::Packet::parse(data)?;
            let t = p.tail();
            (p.header, p.sequence(), t.return_mode, t.motor_speed as i32, t.utc, t.timestamp, None)
        },
    };
    let Header { laser_num, block_num, dist_unit, flags, .. } = header;
    Ok(format!(
        "lasers: {}\tblocks: {}\tunit: {}mm\tflags: {:#04x}\tseq: {:?}\t\
        return: {:#04x}\tspeed: {}\tts: {:?}\timu bytes: {:?}",
        laser_num, block_num, dist_unit, flags.0, sequence,
        return_mode, motor_speed, packet::sensor_timestamp(&utc, timestamp), imu,
    ))
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::from_args();
    let mut source = PcapSource::new(&args.path, false, false)?;
    while let Some((addr, data)) = source.next_packet()? {
        match describe(args.model, data) {
            Ok(info) => println!("{}\t{}", addr, info),
            Err(err) => println!("{}\trejected: {}", addr, err),
        }
    }
    Ok(())
}
