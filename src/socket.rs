use pnet::packet::icmp::IcmpPacket;
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::Packet;
use pnet::transport::TransportChannelType::Layer4;
use pnet::transport::TransportProtocol::Ipv4;
use pnet::transport::{icmp_packet_iter, transport_channel, TransportReceiver, TransportSender};
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

const RECV_BUFFER_SIZE: usize = 1500;
/// Granularity of the socket read timeout.
const TIMEOUT_RESOLUTION: Duration = Duration::from_micros(1);

/// The operations the probe engine needs from an ICMP endpoint.
///
/// The TTL and the read timeout are endpoint-wide state, so an implementation must not
/// be shared between probes that are in flight at the same time.
pub trait IcmpTransport {
    fn set_ttl(&mut self, ttl: u8) -> io::Result<()>;

    fn send_to(&mut self, icmp_data: &[u8], destination: Ipv4Addr) -> io::Result<()>;

    /// Waits up to `timeout` for the next ICMP message, returned without its IPv4 header.
    ///
    /// Returns `Ok(None)` when the timeout elapses first.
    fn recv(&mut self, timeout: Duration) -> io::Result<Option<(Vec<u8>, IpAddr)>>;
}

/// Raw IPv4 ICMP socket bound to the wildcard address.
pub struct IcmpSocket {
    transport_sender: TransportSender,
    transport_receiver: TransportReceiver,
}

impl IcmpSocket {
    /// Opens the socket. Needs root or `CAP_NET_RAW` on most systems.
    pub fn open() -> io::Result<IcmpSocket> {
        let (transport_sender, transport_receiver) = transport_channel(RECV_BUFFER_SIZE, Layer4(Ipv4(IpNextHeaderProtocols::Icmp)))?;
        Ok(IcmpSocket { transport_sender, transport_receiver })
    }
}

impl IcmpTransport for IcmpSocket {
    fn set_ttl(&mut self, ttl: u8) -> io::Result<()> {
        self.transport_sender.set_ttl(ttl)
    }

    fn send_to(&mut self, icmp_data: &[u8], destination: Ipv4Addr) -> io::Result<()> {
        let icmp_packet = IcmpPacket::new(icmp_data)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "ICMP packet too short"))?;
        self.transport_sender.send_to(icmp_packet, IpAddr::V4(destination))?;
        Ok(())
    }

    fn recv(&mut self, timeout: Duration) -> io::Result<Option<(Vec<u8>, IpAddr)>> {
        let mut iter = icmp_packet_iter(&mut self.transport_receiver);
        Ok(iter.next_with_timeout(socket_timeout(timeout))?
            .map(|(icmp_packet, address)| (icmp_packet.packet().to_vec(), address)))
    }
}

/// Rounds `timeout` up to whole microseconds.
///
/// The read timeout is truncated to microseconds and a zero timeout blocks forever.
fn socket_timeout(timeout: Duration) -> Duration {
    let below_resolution = timeout.subsec_nanos() % 1_000;
    let rounded = if below_resolution == 0 {
        timeout
    } else {
        timeout.saturating_add(Duration::from_nanos(u64::from(1_000 - below_resolution)))
    };
    rounded.max(TIMEOUT_RESOLUTION)
}
