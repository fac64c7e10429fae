use hesai::{packet, FrameIterator, PacketSource, SensorParams};
use std::io;
use std::time::Duration;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(
    name = "hesai frame decoder",
    about = "Decode frames from a Hesai sensor and print point counts")]
enum Cli {
    #[structopt(name = "pcap")]
    /// Replay packets from pcap file
    Pcap {
        /// Path to pcap file
        path: String,
        /// Sensor parameters, e.g. `lidar_type=P128,correction_file=p128.csv`
        params: SensorParams,
        /// Loop playback
        #[structopt(long = "loop", short = "l")]
        loop_play: bool,
        /// Synchronize time
        #[structopt(long = "sync", short = "s")]
        sync: bool,
    },
    #[structopt(name = "udp")]
    /// Read packets from UDP port in real time
    Udp {
        /// Sensor parameters, `host_ip` and `udp_port` select the socket
        params: SensorParams,
        /// Capture timeout, seconds
        #[structopt(long = "timeout", short = "t")]
        timeout: Option<u64>,
    },
}

fn run<T: PacketSource>(packet_source: T, params: &SensorParams) -> io::Result<()> {
    let decoder = params.decoder()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    println!("Decoding {} frames", params.lidar_type.map_or("?", |m| m.name()));

    for (i, frame) in FrameIterator::new(packet_source, decoder).enumerate() {
        let frame = frame?;
        println!("frame {}\tpoints: {}\tpackets: {}\trejected: {}\tts: {:?}",
            i, frame.len(), frame.packets, frame.rejected, frame.sensor_timestamp_us);
    }
    println!("Source does not provide packets anymore.");
    Ok(())
}

fn main() -> io::Result<()> {
    let args = Cli::from_args();
    match args {
        Cli::Pcap{ path, params, loop_play, sync } => {
            let source = packet::PcapSource::new(path, sync, loop_play)?;
            run(source, &params)
        },
        Cli::Udp{ params, timeout } => {
            let timeout = timeout.map(Duration::from_secs);
            let source = packet::UdpSource::new_custom(params.data_addr(), timeout)?;
            run(source, &params)
        },
    }
}
