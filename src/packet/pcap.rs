use byteorder::{ByteOrder, ReadBytesExt, BE, LE};
use std::time::{Instant, Duration};
use std::fs::File;
use std::path::Path;
use std::io;
use std::io::{SeekFrom, Seek, ErrorKind, Cursor};
use std::thread::sleep;
use std::net::{SocketAddr, SocketAddrV4, Ipv4Addr};
use log::{debug, warn};

use memmap::Mmap;

use super::PacketSource;

const NS_IN_SEC: u32 = 1_000_000_000;
const GLOBAL_HEADER_SIZE: u64 = 24;

const ETHERNET_HEADER: usize = 14;
const VLAN_TAG: usize = 4;
const UDP_HEADER: usize = 8;
const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_VLAN: u16 = 0x8100;
const IP_PROTO_UDP: u8 = 17;

// tcpdump -i enp2s0 -w out.pcap udp port 2368

/// Acquires packets from a pre-recorded little-endian pcap file
pub struct PcapSource {
    file: Cursor<Mmap>,
    is_nano: bool,
    do_sync: bool,
    do_loop: bool,
    packet_t0: Option<(u32, u32)>,
    t0: Instant,
    /// Payload offset and length of the last returned packet
    payload: (usize, usize),
}

impl PcapSource {
    /// Initialize source with the given `path`.
    ///
    /// If `do_sync` is `true` will emulate arrival of packets using recorded
    /// timings, otherwise it will emit packets as fast as it can. If `do_loop`
    /// is `true` the capture restarts after its last record.
    pub fn new<P: AsRef<Path>>(path: P, do_sync: bool, do_loop: bool)
        -> io::Result<Self>
    {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        let mut f = Cursor::new(mmap);

        let is_nano = match f.read_u32::<LE>()? {
            0xa1b2c3d4 => false,
            0xa1b23c4d => true,
            0xd4c3b2a1 | 0x4d3cb2a1 => return Err(io::Error::new(
                ErrorKind::InvalidInput,
                "big-endian pcap files are not supported")),
            _ => return Err(io::Error::new(ErrorKind::InvalidInput,
                "invalid pcap magic number")),
        };
        Self::read_header(f, is_nano, do_sync, do_loop)
    }

    fn read_header(
            mut file: Cursor<Mmap>, is_nano: bool, do_sync: bool, do_loop: bool,
        ) -> io::Result<Self>
    {
        let version_major = file.read_u16::<LE>()?;
        let version_minor = file.read_u16::<LE>()?;
        // skip thiszone, sigfigs and snaplen
        file.seek(SeekFrom::Current(12))?;
        let network = file.read_u32::<LE>()?;
        if (version_major, version_minor) != (2, 4) {
            return Err(io::Error::new(ErrorKind::InvalidData,
                format!("unsupported pcap version {}.{}",
                    version_major, version_minor)));
        }
        if network != 1 {
            return Err(io::Error::new(ErrorKind::InvalidData,
                "expected LINKTYPE_ETHERNET"));
        }
        debug!("opened pcap capture, nanosecond timestamps: {}", is_nano);

        let t0 = Instant::now();
        Ok(Self {
            file, is_nano, do_sync, do_loop, packet_t0: None, t0,
            payload: (0, 0),
        })
    }

    pub fn reset(&mut self) {
        self.file.set_position(GLOBAL_HEADER_SIZE);
        self.packet_t0 = None;
        self.t0 = Instant::now();
    }

    /// Read records until an IPv4/UDP one is found, store its payload
    /// location and return the sender address.
    fn read_packet(&mut self) -> io::Result<SocketAddr> {
        loop {
            let mut meta = [0u32; 4];
            self.file.read_u32_into::<LE>(&mut meta)?;
            let [t_s, t_frac, incl_len, orig_len] = meta;
            let eth_start = self.file.position() as usize;
            let eth_end = eth_start + incl_len as usize;
            if eth_end > self.file.get_ref().len() {
                return Err(io::Error::new(ErrorKind::UnexpectedEof,
                    "pcap record runs past end of file"));
            }
            self.file.set_position(eth_end as u64);

            if orig_len > incl_len {
                warn!("skipping truncated pcap record");
                continue;
            }
            let record = &self.file.get_ref()[eth_start..eth_end];
            let (addr, start, len) = match locate_udp_payload(record) {
                Some(v) => v,
                None => {
                    // captures often contain ARP and control traffic
                    warn!("skipping non IPv4/UDP pcap record");
                    continue;
                }
            };
            self.payload = (eth_start + start, len);

            let t = (t_s, t_frac * if self.is_nano { 1 } else { 1000 });
            if self.do_sync { self.time_sync(t); }
            return Ok(addr);
        }
    }

    fn time_sync(&mut self, t: (u32, u32)) {
        let t0 = match self.packet_t0 {
            Some(t0) => t0,
            None => {
                self.packet_t0 = Some(t);
                self.t0 = Instant::now();
                return;
            },
        };
        // realtime time difference
        let rt_dt = self.t0.elapsed();
        // time difference between packets
        let mut dt_s = (t.0 as i64) - (t0.0 as i64);
        let mut dt_ns = (t.1 as i64) - (t0.1 as i64);
        if dt_ns < 0 {
            dt_s -= 1;
            dt_ns += NS_IN_SEC as i64;
        }
        if dt_s < 0 || dt_ns >= NS_IN_SEC as i64 { return; }
        let packet_dt = Duration::new(dt_s as u64, dt_ns as u32);
        if let Some(wait) = packet_dt.checked_sub(rt_dt) {
            sleep(wait);
        }
    }
}

/// Find UDP payload inside an Ethernet frame.
///
/// Returns source address, payload offset and payload length.
fn locate_udp_payload(frame: &[u8]) -> Option<(SocketAddr, usize, usize)> {
    let mut ip = ETHERNET_HEADER;
    if frame.len() < ip {
        return None;
    }
    let mut ethertype = BE::read_u16(&frame[12..14]);
    if ethertype == ETHERTYPE_VLAN {
        if frame.len() < ip + VLAN_TAG {
            return None;
        }
        ethertype = BE::read_u16(&frame[16..18]);
        ip += VLAN_TAG;
    }
    if ethertype != ETHERTYPE_IPV4 || frame.len() < ip + 20 {
        return None;
    }
    let h = &frame[ip..];
    if h[0] >> 4 != 4 || h[9] != IP_PROTO_UDP {
        return None;
    }
    let udp = ip + ((h[0] & 0x0F) as usize) * 4;
    if frame.len() < udp + UDP_HEADER {
        return None;
    }
    let src = Ipv4Addr::new(h[12], h[13], h[14], h[15]);
    let port = BE::read_u16(&frame[udp..udp + 2]);
    let udp_len = BE::read_u16(&frame[udp + 4..udp + 6]) as usize;
    if udp_len < UDP_HEADER || frame.len() < udp + udp_len {
        return None;
    }
    let addr = SocketAddrV4::new(src, port).into();
    Some((addr, udp + UDP_HEADER, udp_len - UDP_HEADER))
}

impl PacketSource for PcapSource {
    fn next_packet(&mut self) -> io::Result<Option<(SocketAddr, &[u8])>> {
        match self.read_packet() {
            Ok(addr) => {
                let (start, len) = self.payload;
                let packet = &self.file.get_ref()[start..start + len];
                Ok(Some((addr, packet)))
            },
            Err(ref e) if e.kind() == ErrorKind::UnexpectedEof => {
                // loop only if the capture holds at least one UDP record
                if self.do_loop && self.payload.0 != 0 {
                    self.reset();
                    self.next_packet()
                } else {
                    Ok(None)
                }
            },
            Err(e) => Err(e),
        }
    }
}
