use crate::error::EncodeError;
use crate::messages::ProbeIdentity;

use pnet::packet::icmp::echo_request::{EchoRequestPacket, MutableEchoRequestPacket};
use pnet::packet::icmp::{checksum, IcmpCode, IcmpPacket, IcmpTypes};
use pnet::packet::Packet;

/// Payload carried by every echo request. Content is arbitrary.
const ECHO_PAYLOAD: &[u8] = b"hoptrace";

/// Builds an ICMP Echo Request carrying `identity` in its identifier and sequence fields.
pub fn build_echo_request(identity: ProbeIdentity) -> Result<Vec<u8>, EncodeError> {
    let mut buf = vec![0u8; EchoRequestPacket::minimum_packet_size() + ECHO_PAYLOAD.len()];
    let len = buf.len();
    let mut echo_packet = MutableEchoRequestPacket::new(&mut buf).ok_or(EncodeError::BufferTooSmall(len))?;

    echo_packet.set_icmp_type(IcmpTypes::EchoRequest);
    echo_packet.set_icmp_code(IcmpCode::new(0));
    echo_packet.set_identifier(identity.run_token);
    echo_packet.set_sequence_number(identity.sequence);
    echo_packet.set_payload(ECHO_PAYLOAD);

    let icmp_packet = IcmpPacket::new(echo_packet.packet()).ok_or(EncodeError::BufferTooSmall(len))?;
    let echo_checksum = checksum(&icmp_packet);
    echo_packet.set_checksum(echo_checksum);

    Ok(buf)
}
