use crate::error::DecodeError;
use crate::messages::{IcmpMessage, ProbeIdentity};

use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::echo_request::EchoRequestPacket;
use pnet::packet::icmp::time_exceeded::TimeExceededPacket;
use pnet::packet::icmp::{IcmpPacket, IcmpTypes};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::Packet;

/// Type, code, checksum and the 4 type-specific bytes.
pub const ICMP_HEADER_LEN: usize = 8;

/// How to locate the original ICMP header inside a Time Exceeded payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InnerHeaderLength {
    /// Assume a 20 byte inner IPv4 header with no options.
    #[default]
    Fixed,
    /// Use the IHL field of the inner IPv4 header.
    Declared,
}

/// Parses an ICMP message (IPv4 header already stripped).
///
/// Anything that is neither an Echo Reply nor a well-formed Time Exceeded quoting
/// an echo request decodes to `IcmpMessage::Unrecognized`. Only input shorter than
/// an ICMP header is an error.
pub fn parse(icmp_data: &[u8], inner_header: InnerHeaderLength) -> Result<IcmpMessage, DecodeError> {
    if icmp_data.len() < ICMP_HEADER_LEN {
        return Err(DecodeError::Truncated(icmp_data.len()));
    }
    let icmp_packet = IcmpPacket::new(icmp_data).ok_or(DecodeError::Truncated(icmp_data.len()))?;

    let message = match icmp_packet.get_icmp_type() {
        IcmpTypes::EchoReply => EchoReplyPacket::new(icmp_data)
            .map(|erp| IcmpMessage::EchoReply(ProbeIdentity::new(erp.get_identifier(), erp.get_sequence_number())))
            .unwrap_or(IcmpMessage::Unrecognized),
        IcmpTypes::TimeExceeded => TimeExceededPacket::new(icmp_data)
            .and_then(|tep| original_identity(tep.payload(), inner_header))
            .map(IcmpMessage::TimeExceeded)
            .unwrap_or(IcmpMessage::Unrecognized),
        _ => IcmpMessage::Unrecognized,
    };
    Ok(message)
}

/// Extracts identifier and sequence from the original echo request quoted after the inner IPv4 header.
fn original_identity(payload: &[u8], inner_header: InnerHeaderLength) -> Option<ProbeIdentity> {
    let offset = match inner_header {
        InnerHeaderLength::Fixed => Ipv4Packet::minimum_packet_size(),
        InnerHeaderLength::Declared => {
            let header_len = usize::from(Ipv4Packet::new(payload)?.get_header_length()) * 4;
            if header_len < Ipv4Packet::minimum_packet_size() {
                return None;
            }
            header_len
        }
    };

    let original_echo_request = EchoRequestPacket::new(payload.get(offset..)?)?;
    if original_echo_request.get_icmp_type() != IcmpTypes::EchoRequest {
        return None;
    }
    Some(ProbeIdentity::new(original_echo_request.get_identifier(), original_echo_request.get_sequence_number()))
}
