use crate::error::{SendError, TraceError, TraceResult};
use crate::messages::{IcmpMessage, Probe, ProbeIdentity, ProbeOutcome, Response};
use crate::parser::{parse, InnerHeaderLength};
use crate::sender::build_echo_request;
use crate::socket::IcmpTransport;

use std::io;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Sends probes toward one destination and correlates the responses.
///
/// Strictly one probe at a time: `send` followed by `await_response` for the same probe.
pub struct ProbeEngine<T> {
    transport: T,
    destination: Ipv4Addr,
    inner_header: InnerHeaderLength,
}

impl<T: IcmpTransport> ProbeEngine<T> {
    pub fn new(transport: T, destination: Ipv4Addr, inner_header: InnerHeaderLength) -> ProbeEngine<T> {
        ProbeEngine { transport, destination, inner_header }
    }

    /// Sets the outbound TTL and writes one echo request.
    pub fn send(&mut self, ttl: u8, identity: ProbeIdentity) -> Result<Probe, SendError> {
        let icmp_buf = build_echo_request(identity)?;
        self.transport.set_ttl(ttl)?;
        let sent_at = Instant::now();
        self.transport.send_to(&icmp_buf, self.destination)?;
        debug!(ttl, sequence = identity.sequence, destination = %self.destination, "probe sent");
        Ok(Probe { ttl, identity, sent_at })
    }

    /// Reads until a message answering `probe` arrives or `deadline` passes.
    ///
    /// Unrelated and undecodable messages are dropped without touching the deadline.
    pub fn await_response(&mut self, probe: &Probe, deadline: Instant) -> ProbeOutcome {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return ProbeOutcome::Timeout;
            }

            let (icmp_data, responder) = match self.transport.recv(remaining) {
                Ok(Some(received)) => received,
                Ok(None) => continue,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    return ProbeOutcome::Timeout;
                }
                Err(e) => return ProbeOutcome::TransportError(e),
            };
            let rtt = probe.sent_at.elapsed();

            let message = match parse(&icmp_data, self.inner_header) {
                Ok(message) => message,
                Err(e) => {
                    trace!(ttl = probe.ttl, %responder, error = %e, "dropping undecodable message");
                    continue;
                }
            };
            let response = Response { responder, rtt };
            match message {
                IcmpMessage::EchoReply(id) if id == probe.identity => return ProbeOutcome::EchoReply(response),
                IcmpMessage::TimeExceeded(id) if id == probe.identity => return ProbeOutcome::TimeExceeded(response),
                message => trace!(ttl = probe.ttl, %responder, ?message, "dropping unrelated message"),
            }
        }
    }

    /// Sends one probe and waits up to `wait` for its outcome.
    ///
    /// Only an encoding failure is returned as an error; every per-probe condition
    /// ends up in the `ProbeOutcome`.
    pub fn probe(&mut self, ttl: u8, identity: ProbeIdentity, wait: Duration) -> TraceResult<ProbeOutcome> {
        let probe = match self.send(ttl, identity) {
            Ok(probe) => probe,
            Err(SendError::Encode(e)) => return Err(TraceError::Encode(e)),
            Err(SendError::Transport(e)) => {
                warn!(ttl, sequence = identity.sequence, error = %e, "unable to send probe");
                return Ok(ProbeOutcome::TransportError(e));
            }
        };

        let outcome = self.await_response(&probe, probe.sent_at + wait);
        match &outcome {
            ProbeOutcome::TransportError(e) => warn!(ttl, sequence = identity.sequence, error = %e, "receive failed"),
            outcome => debug!(ttl, sequence = identity.sequence, ?outcome, "probe complete"),
        }
        Ok(outcome)
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::parser::tests::{echo_reply_for, plain_inner_ip, time_exceeded_for};
    use std::collections::VecDeque;
    use std::net::IpAddr;
    use std::thread;

    pub(crate) enum Scripted {
        Datagram { delay: Duration, icmp_data: Vec<u8>, from: IpAddr },
        Error(io::ErrorKind),
    }

    /// Transport that replays a fixed list of receive events and records what was sent.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        pub script: VecDeque<Scripted>,
        pub sent: Vec<(u8, Vec<u8>)>,
        pub recv_timeouts: Vec<Duration>,
        ttl: u8,
    }

    impl IcmpTransport for ScriptedTransport {
        fn set_ttl(&mut self, ttl: u8) -> io::Result<()> {
            self.ttl = ttl;
            Ok(())
        }

        fn send_to(&mut self, icmp_data: &[u8], _destination: Ipv4Addr) -> io::Result<()> {
            self.sent.push((self.ttl, icmp_data.to_vec()));
            Ok(())
        }

        fn recv(&mut self, timeout: Duration) -> io::Result<Option<(Vec<u8>, IpAddr)>> {
            self.recv_timeouts.push(timeout);
            match self.script.pop_front() {
                Some(Scripted::Datagram { delay, icmp_data, from }) if delay <= timeout => {
                    thread::sleep(delay);
                    Ok(Some((icmp_data, from)))
                }
                Some(Scripted::Error(kind)) => Err(io::Error::from(kind)),
                _ => {
                    thread::sleep(timeout);
                    Ok(None)
                }
            }
        }
    }

    const DESTINATION: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 1);

    fn datagram(delay_ms: u64, icmp_data: Vec<u8>, from: [u8; 4]) -> Scripted {
        Scripted::Datagram { delay: Duration::from_millis(delay_ms), icmp_data, from: IpAddr::from(from) }
    }

    fn engine(script: Vec<Scripted>) -> ProbeEngine<ScriptedTransport> {
        let transport = ScriptedTransport { script: script.into(), ..Default::default() };
        ProbeEngine::new(transport, DESTINATION, InnerHeaderLength::Fixed)
    }

    #[test]
    fn test_send_sets_ttl_and_encodes_identity() {
        let mut engine = engine(vec![]);
        let probe = engine.send(7, ProbeIdentity::new(0x1111, 3)).unwrap();
        assert_eq!(probe.ttl, 7);

        let (ttl, icmp_data) = &engine.transport().sent[0];
        assert_eq!(*ttl, 7);
        assert_eq!(icmp_data[0], 8);
        assert_eq!(&icmp_data[4..8], &[0x11, 0x11, 0x00, 0x03]);
    }

    #[test]
    fn test_await_response_skips_foreign_messages() {
        let identity = ProbeIdentity::new(100, 5);
        let ours = build_echo_request(identity).unwrap();
        let foreign_echo = build_echo_request(ProbeIdentity::new(100, 4)).unwrap();
        let foreign_expired = build_echo_request(ProbeIdentity::new(200, 5)).unwrap();

        let mut engine = engine(vec![
            datagram(20, echo_reply_for(&foreign_echo), [192, 0, 2, 1]),
            datagram(20, time_exceeded_for(&plain_inner_ip(), &foreign_expired), [10, 0, 0, 1]),
            datagram(20, echo_reply_for(&ours), [192, 0, 2, 1]),
        ]);

        let outcome = engine.probe(3, identity, Duration::from_secs(2)).unwrap();
        let ProbeOutcome::EchoReply(response) = outcome else {
            panic!("expected echo reply, got {:?}", outcome);
        };
        assert_eq!(response.responder, IpAddr::from([192, 0, 2, 1]));
        // measured from the send, across all three datagrams
        assert!(response.rtt >= Duration::from_millis(60));

        let timeouts = &engine.transport().recv_timeouts;
        assert_eq!(timeouts.len(), 3);
        assert!(timeouts.windows(2).all(|w| w[1] < w[0]));
        assert!(timeouts[0] <= Duration::from_secs(2));
    }

    #[test]
    fn test_await_response_matches_time_exceeded() {
        let identity = ProbeIdentity::new(9, 1);
        let request = build_echo_request(identity).unwrap();
        let mut engine = engine(vec![datagram(0, time_exceeded_for(&plain_inner_ip(), &request), [10, 0, 0, 1])]);

        let outcome = engine.probe(1, identity, Duration::from_secs(1)).unwrap();
        assert!(matches!(outcome, ProbeOutcome::TimeExceeded(r) if r.responder == IpAddr::from([10, 0, 0, 1])));
    }

    #[test]
    fn test_await_response_drops_noise() {
        let identity = ProbeIdentity::new(9, 2);
        let request = build_echo_request(identity).unwrap();
        let mut engine = engine(vec![
            datagram(0, vec![0, 0, 0], [10, 0, 0, 9]),
            datagram(0, vec![3, 1, 0, 0, 0, 0, 0, 0], [10, 0, 0, 9]),
            datagram(0, echo_reply_for(&request), [192, 0, 2, 1]),
        ]);

        let outcome = engine.probe(4, identity, Duration::from_secs(1)).unwrap();
        assert!(outcome.is_echo_reply());
    }

    #[test]
    fn test_await_response_times_out_at_deadline() {
        let identity = ProbeIdentity::new(1, 1);
        let foreign = build_echo_request(ProbeIdentity::new(1, 0)).unwrap();
        let wait = Duration::from_millis(150);
        let mut engine = engine(vec![datagram(10, echo_reply_for(&foreign), [192, 0, 2, 1])]);

        let started = Instant::now();
        let outcome = engine.probe(1, identity, wait).unwrap();
        let elapsed = started.elapsed();

        assert!(matches!(outcome, ProbeOutcome::Timeout));
        assert!(elapsed >= wait);
        assert!(elapsed < wait + Duration::from_millis(500));
    }

    #[test]
    fn test_await_response_reports_transport_error() {
        let mut engine = engine(vec![Scripted::Error(io::ErrorKind::ConnectionRefused)]);
        let outcome = engine.probe(1, ProbeIdentity::new(1, 1), Duration::from_secs(1)).unwrap();
        assert!(matches!(outcome, ProbeOutcome::TransportError(e) if e.kind() == io::ErrorKind::ConnectionRefused));
    }

    #[test]
    fn test_await_response_read_timeout_error_is_timeout() {
        let mut engine = engine(vec![Scripted::Error(io::ErrorKind::WouldBlock)]);
        let outcome = engine.probe(1, ProbeIdentity::new(1, 1), Duration::from_secs(1)).unwrap();
        assert!(matches!(outcome, ProbeOutcome::Timeout));
    }
}
