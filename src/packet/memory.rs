use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use super::PacketSource;

/// Replays a list of datagrams held in memory
#[derive(Debug, Clone)]
pub struct MemorySource {
    addr: SocketAddr,
    packets: Vec<Vec<u8>>,
    pos: usize,
    do_loop: bool,
}

impl MemorySource {
    /// Replay `packets` once, reporting them as sent from `192.168.1.201:2368`
    pub fn new(packets: Vec<Vec<u8>>) -> Self {
        let addr = SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 201), 2368);
        Self { addr: addr.into(), packets, pos: 0, do_loop: false }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    /// Restart from the first packet after the last one was returned
    pub fn looped(mut self) -> Self {
        self.do_loop = true;
        self
    }

    pub fn reset(&mut self) {
        self.pos = 0;
    }
}

impl PacketSource for MemorySource {
    fn next_packet(&mut self) -> io::Result<Option<(SocketAddr, &[u8])>> {
        if self.pos >= self.packets.len() {
            if !self.do_loop || self.packets.is_empty() {
                return Ok(None);
            }
            self.pos = 0;
        }
        let packet = &self.packets[self.pos];
        self.pos += 1;
        Ok(Some((self.addr, packet.as_slice())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay() {
        let mut src = MemorySource::new(vec![vec![1], vec![2, 3]]);
        assert_eq!(src.next_packet().unwrap().unwrap().1, &[1]);
        assert_eq!(src.next_packet().unwrap().unwrap().1, &[2, 3]);
        assert!(src.next_packet().unwrap().is_none());

        let mut src = MemorySource::new(vec![vec![1]]).looped();
        for _ in 0..3 {
            assert_eq!(src.next_packet().unwrap().unwrap().1, &[1]);
        }
    }
}
