//! Multicast receive socket for RTP.
//!
//! Binds the group's port, joins the group and sets a read timeout so a
//! blocking receive returns periodically. Any sender to the group is
//! delivered; demultiplexing happens above this layer.

use std::io::{self, ErrorKind};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

/// Default RTP port when the group string carries none
pub const DEFAULT_RTP_PORT: u16 = 5004;

// Error code for a datagram longer than the receive buffer
#[cfg(windows)]
pub(crate) const MSG_TOO_LONG: i32 = 10040; // WSAEMSGSIZE
#[cfg(target_os = "linux")]
pub(crate) const MSG_TOO_LONG: i32 = 90;
#[cfg(all(not(windows), not(target_os = "linux")))]
pub(crate) const MSG_TOO_LONG: i32 = 40;

/// True when a receive failed only because the datagram did not fit.
///
/// Windows reports this as an error (the datagram is still consumed);
/// Unix truncates silently instead.
pub fn is_oversized(err: &io::Error) -> bool {
    err.raw_os_error() == Some(MSG_TOO_LONG)
}

/// Anything that can hand out one datagram at a time together with its
/// sender. Implemented for sockets and for scripted test sources.
pub trait PacketSource {
    /// Receive one datagram into `buf`.
    ///
    /// Timeouts surface as `WouldBlock`/`TimedOut`, signals as
    /// `Interrupted`.
    fn recv_packet(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

impl PacketSource for UdpSocket {
    fn recv_packet(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.recv_from(buf)
    }
}

/// Resolve `host[:port]` to a socket address, defaulting the port.
pub fn resolve_group(target: &str) -> io::Result<SocketAddr> {
    let target = target.trim();

    // Bare IP literal without a port
    if let Ok(ip) = target.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_RTP_PORT));
    }
    if let Some(inner) = target.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        if let Ok(ip) = inner.parse::<Ipv6Addr>() {
            return Ok(SocketAddr::new(IpAddr::V6(ip), DEFAULT_RTP_PORT));
        }
    }

    let with_port = if target.rsplit_once(':').map_or(true, |(_, p)| p.parse::<u16>().is_err()) {
        format!("{}:{}", target, DEFAULT_RTP_PORT)
    } else {
        target.to_string()
    };

    with_port
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(ErrorKind::NotFound, format!("cannot resolve '{}'", target)))
}

/// Receive-only UDP socket joined to an RTP group.
pub struct McastSocket {
    socket: UdpSocket,
    group: SocketAddr,
}

impl McastSocket {
    /// Open a socket for `group`, joining it when it is a multicast address.
    ///
    /// # Arguments
    /// * `group` - Group (or unicast) address and port
    /// * `interface` - IPv4 interface for the join (None = any interface)
    /// * `timeout` - Read timeout; None blocks indefinitely
    pub fn open(
        group: SocketAddr,
        interface: Option<Ipv4Addr>,
        timeout: Option<Duration>,
    ) -> io::Result<Self> {
        let domain = match group {
            SocketAddr::V4(_) => Domain::IPV4,
            SocketAddr::V6(_) => Domain::IPV6,
        };
        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;

        // Several receivers on one host may listen to the same group
        socket.set_reuse_address(true)?;
        #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
        socket.set_reuse_port(true)?;

        let bind_addr: SocketAddr = if group.ip().is_multicast() {
            match group {
                SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, group.port()).into(),
                SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, group.port()).into(),
            }
        } else {
            group
        };
        socket.bind(&bind_addr.into())?;

        match group.ip() {
            IpAddr::V4(ip) if ip.is_multicast() => {
                let iface = interface.unwrap_or(Ipv4Addr::UNSPECIFIED);
                socket.join_multicast_v4(&ip, &iface)?;
            }
            IpAddr::V6(ip) if ip.is_multicast() => {
                socket.join_multicast_v6(&ip, 0)?;
            }
            _ => {}
        }

        socket.set_read_timeout(timeout)?;

        // Bursty senders; not fatal if the OS caps it
        let _ = socket.set_recv_buffer_size(1024 * 1024);

        Ok(McastSocket {
            socket: socket.into(),
            group,
        })
    }

    /// Resolve `target` and open it.
    pub fn open_str(
        target: &str,
        interface: Option<Ipv4Addr>,
        timeout: Option<Duration>,
    ) -> io::Result<Self> {
        Self::open(resolve_group(target)?, interface, timeout)
    }

    /// Group this socket listens to
    pub fn group(&self) -> SocketAddr {
        self.group
    }

    /// Actual bound local address
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Change the receive timeout.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.socket.set_read_timeout(timeout)
    }
}

impl PacketSource for McastSocket {
    fn recv_packet(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf)
    }
}

impl std::fmt::Debug for McastSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McastSocket")
            .field("group", &self.group)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oversized_detection() {
        assert!(is_oversized(&io::Error::from_raw_os_error(MSG_TOO_LONG)));
        assert!(!is_oversized(&io::Error::new(ErrorKind::TimedOut, "timeout")));
    }

    #[test]
    fn test_resolve_group() {
        let addr = resolve_group("239.1.2.3").unwrap();
        assert_eq!(addr, "239.1.2.3:5004".parse().unwrap());

        let addr = resolve_group("239.1.2.3:6000").unwrap();
        assert_eq!(addr.port(), 6000);

        let addr = resolve_group("[ff02::1]:7000").unwrap();
        assert_eq!(addr, "[ff02::1]:7000".parse().unwrap());

        let addr = resolve_group("ff02::1").unwrap();
        assert_eq!(addr.port(), DEFAULT_RTP_PORT);
    }

    #[test]
    fn test_unicast_socket_receives() {
        let mut rx = McastSocket::open(
            "127.0.0.1:0".parse().unwrap(),
            None,
            Some(Duration::from_millis(500)),
        )
        .unwrap();
        let local = rx.local_addr().unwrap();

        let tx = UdpSocket::bind("127.0.0.1:0").unwrap();
        tx.send_to(&[1, 2, 3], local).unwrap();

        let mut buf = [0u8; 16];
        let (len, from) = rx.recv_packet(&mut buf).unwrap();
        assert_eq!(&buf[..len], &[1, 2, 3]);
        assert_eq!(from, tx.local_addr().unwrap());
    }

    #[test]
    fn test_timeout_surfaces_as_would_block() {
        let mut rx = McastSocket::open(
            "127.0.0.1:0".parse().unwrap(),
            None,
            Some(Duration::from_millis(20)),
        )
        .unwrap();
        let mut buf = [0u8; 16];
        let err = rx.recv_packet(&mut buf).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut));
    }
}
