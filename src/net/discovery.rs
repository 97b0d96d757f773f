use std::io;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Best-effort discovery of this machine's non-loopback IPv4 address.
///
/// Routes a UDP socket toward a public address to learn which local
/// interface the OS would pick; no packet is actually sent. Falls back to
/// the loopback address on any failure. The result is display-only (shown
/// next to the match code) and plays no part in protocol correctness.
pub fn local_ipv4() -> IpAddr {
    fn probe() -> io::Result<IpAddr> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        socket.connect(("8.8.8.8", 80))?;
        Ok(socket.local_addr()?.ip())
    }

    match probe() {
        Ok(ip) if !ip.is_loopback() => ip,
        _ => IpAddr::V4(Ipv4Addr::LOCALHOST),
    }
}
