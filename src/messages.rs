use std::io;
use std::net::IpAddr;
use std::time::{Duration, Instant};

/// Identifies one echo request within one run.
///
/// `run_token` goes into the ICMP identifier field and stays fixed for the run,
/// `sequence` goes into the sequence field and is unique per probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeIdentity {
    pub run_token: u16,
    pub sequence: u16,
}

impl ProbeIdentity {
    pub fn new(run_token: u16, sequence: u16) -> ProbeIdentity {
        ProbeIdentity { run_token, sequence }
    }
}

/// An echo request that has been handed to the socket.
#[derive(Debug, Clone, Copy)]
pub struct Probe {
    pub ttl: u8,
    pub identity: ProbeIdentity,
    pub sent_at: Instant,
}

/// A correlated response to a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub responder: IpAddr,
    pub rtt: Duration,
}

#[derive(Debug)]
pub enum ProbeOutcome {
    EchoReply(Response),
    TimeExceeded(Response),
    Timeout,
    TransportError(io::Error),
}

impl ProbeOutcome {
    pub fn response(&self) -> Option<&Response> {
        match self {
            ProbeOutcome::EchoReply(r) | ProbeOutcome::TimeExceeded(r) => Some(r),
            ProbeOutcome::Timeout | ProbeOutcome::TransportError(_) => None,
        }
    }

    pub fn is_echo_reply(&self) -> bool {
        matches!(self, ProbeOutcome::EchoReply(_))
    }
}

/// Decoded form of an inbound ICMP message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpMessage {
    /// Identity taken from the echo reply header.
    EchoReply(ProbeIdentity),
    /// Identity taken from the original request quoted in the payload.
    TimeExceeded(ProbeIdentity),
    Unrecognized,
}
