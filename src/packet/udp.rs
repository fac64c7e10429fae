use std::io;
use std::net::{UdpSocket, ToSocketAddrs, SocketAddr};
use std::time::Duration;

use super::{PacketSource, MAX_PACKET_SIZE};

/// Default point cloud data port
const DEFAULT_ADDR: &str = "0.0.0.0:2368";

/// Acquires packets from the network
pub struct UdpSource {
    socket: UdpSocket,
    buf: [u8; MAX_PACKET_SIZE],
}

impl UdpSource {
    /// Bind the sensor data port on all interfaces, reads time out after 1 s
    pub fn new() -> io::Result<Self> {
        Self::new_custom(DEFAULT_ADDR, Some(Duration::from_secs(1)))
    }

    /// Bind `addr`, `None` timeout blocks until a datagram arrives
    pub fn new_custom<A>(addr: A, timeout: Option<Duration>)
        -> io::Result<Self>
        where A: ToSocketAddrs
    {
        let socket = UdpSocket::bind(addr)?;
        socket.set_read_timeout(timeout)?;
        Ok(Self::new_custom_socket(socket))
    }

    /// Receive from an already configured socket, e.g. a multicast member
    pub fn new_custom_socket(socket: UdpSocket) -> Self {
        Self { socket, buf: [0u8; MAX_PACKET_SIZE] }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl PacketSource for UdpSource {
    fn next_packet(&mut self) -> io::Result<Option<(SocketAddr, &[u8])>> {
        match self.socket.recv_from(&mut self.buf) {
            Ok((n, addr)) => Ok(Some((addr, &self.buf[..n]))),
            Err(ref e) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}
