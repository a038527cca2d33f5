use crate::config::{StopPolicy, TraceConfig};
use crate::engine::ProbeEngine;
use crate::error::TraceResult;
use crate::messages::{ProbeIdentity, ProbeOutcome};
use crate::socket::IcmpTransport;

use std::net::Ipv4Addr;
use tracing::{debug, info};

/// Hands out the sequence number of each probe. Never reset during a run.
#[derive(Debug)]
pub struct SequenceCounter {
    next: u16,
}

impl SequenceCounter {
    pub fn new() -> SequenceCounter {
        SequenceCounter { next: 1 }
    }

    pub fn next_sequence(&mut self) -> u16 {
        let sequence = self.next;
        self.next = self.next.wrapping_add(1);
        sequence
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        SequenceCounter::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// An echo reply came back for a probe sent with this TTL.
    Reached { ttl: u8 },
    /// Max TTL was probed without an echo reply.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceState {
    Probing(u8),
    Done(Termination),
}

impl TraceState {
    /// Moves past the current TTL once all of its probes are resolved.
    pub fn advance(self, reached: bool, max_ttl: u8) -> TraceState {
        match self {
            TraceState::Probing(ttl) if reached => TraceState::Done(Termination::Reached { ttl }),
            TraceState::Probing(ttl) if ttl >= max_ttl => TraceState::Done(Termination::Exhausted),
            TraceState::Probing(ttl) => TraceState::Probing(ttl + 1),
            done => done,
        }
    }
}

/// All probe outcomes for one TTL.
#[derive(Debug)]
pub struct Hop {
    pub ttl: u8,
    pub outcomes: Vec<ProbeOutcome>,
}

#[derive(Debug)]
pub struct TraceSummary {
    pub hops: Vec<Hop>,
    pub termination: Termination,
}

/// Progress notifications, published as the trace runs.
#[derive(Debug)]
pub enum TraceEvent<'a> {
    HopStarted { ttl: u8 },
    ProbeCompleted { ttl: u8, outcome: &'a ProbeOutcome },
}

/// Escalates the TTL from 1 until the destination answers or max TTL is reached.
pub struct Tracer<T> {
    engine: ProbeEngine<T>,
    config: TraceConfig,
    sequence: SequenceCounter,
}

impl<T: IcmpTransport> Tracer<T> {
    pub fn new(transport: T, destination: Ipv4Addr, config: TraceConfig) -> Tracer<T> {
        let engine = ProbeEngine::new(transport, destination, config.inner_header);
        Tracer { engine, config, sequence: SequenceCounter::new() }
    }

    /// Runs the trace to completion, calling `publish` for every hop and probe.
    ///
    /// Only fatal errors are returned; timeouts and transport errors on individual
    /// probes are recorded in the hop and the trace moves on.
    pub fn trace<F: FnMut(TraceEvent<'_>)>(&mut self, mut publish: F) -> TraceResult<TraceSummary> {
        let mut hops = Vec::new();
        let mut state = TraceState::Probing(1);

        let termination = loop {
            let ttl = match state {
                TraceState::Probing(ttl) => ttl,
                TraceState::Done(termination) => break termination,
            };
            publish(TraceEvent::HopStarted { ttl });
            let mut hop = Hop { ttl, outcomes: Vec::with_capacity(usize::from(self.config.probes_per_hop)) };
            let mut reached = false;

            for _ in 0..self.config.probes_per_hop {
                let identity = ProbeIdentity::new(self.config.run_token, self.sequence.next_sequence());
                let outcome = self.engine.probe(ttl, identity, self.config.wait)?;
                publish(TraceEvent::ProbeCompleted { ttl, outcome: &outcome });

                reached |= outcome.is_echo_reply();
                hop.outcomes.push(outcome);
                if reached && self.config.stop_policy == StopPolicy::Immediate {
                    break;
                }
            }

            hops.push(hop);
            state = state.advance(reached, self.config.max_ttl);
        };

        match termination {
            Termination::Reached { ttl } => info!(hops = ttl, "destination reached"),
            Termination::Exhausted => info!(max_ttl = self.config.max_ttl, "max ttl exhausted"),
        }
        debug!(probes = hops.iter().map(|h| h.outcomes.len()).sum::<usize>(), "trace complete");
        Ok(TraceSummary { hops, termination })
    }
}
