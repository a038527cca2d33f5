use crate::dns_resolver::lookup_name;
use crate::messages::ProbeOutcome;
use crate::tracer::{Termination, TraceEvent, TraceSummary};

use crossterm::style::{Print, PrintStyledContent, Stylize};
use crossterm::ExecutableCommand;
use std::io::{self, Write};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Prints the trace to a terminal as it progresses.
pub struct Reporter<W: Write> {
    out: W,
    destination: Ipv4Addr,
    numeric: bool,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, destination: Ipv4Addr, numeric: bool) -> Reporter<W> {
        Reporter { out, destination, numeric }
    }

    pub fn header(&mut self, host: &str, max_ttl: u8) -> io::Result<()> {
        self.out.execute(Print(format!("traceroute to {} ({}), {} hops max\n", host, self.destination, max_ttl)))?;
        Ok(())
    }

    pub fn event(&mut self, event: TraceEvent<'_>) -> io::Result<()> {
        match event {
            TraceEvent::HopStarted { ttl } => {
                self.out.execute(Print(format!("Hop {}:\n", ttl)))?;
            }
            TraceEvent::ProbeCompleted { outcome, .. } => {
                let line = probe_line(outcome, |address| self.display_name(address));
                if outcome.is_echo_reply() {
                    self.out.execute(PrintStyledContent(line.green()))?;
                } else {
                    self.out.execute(Print(line))?;
                }
                self.out.execute(Print("\n"))?;
            }
        }
        Ok(())
    }

    pub fn footer(&mut self, summary: &TraceSummary, max_ttl: u8) -> io::Result<()> {
        let line = match summary.termination {
            Termination::Reached { ttl } => format!("{} reached in {} hops", self.destination, ttl),
            Termination::Exhausted => format!("{} not reached within {} hops", self.destination, max_ttl),
        };
        self.out.execute(Print(line))?;

        let silent = silent_hops(summary);
        if !silent.is_empty() {
            let ttls = silent.iter().map(|ttl| ttl.to_string()).collect::<Vec<String>>().join(", ");
            self.out.execute(Print(format!(", no response from hop {}", ttls)))?;
        }
        self.out.execute(Print("\n"))?;
        Ok(())
    }

    fn display_name(&self, address: IpAddr) -> String {
        if self.numeric {
            return address.to_string();
        }
        match lookup_name(address) {
            Some(name) => format!("{} ({})", name, address),
            None => address.to_string(),
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

/// One line per probe: responder and round trip, or `*` when nothing matched.
pub fn probe_line<F: Fn(IpAddr) -> String>(outcome: &ProbeOutcome, display_name: F) -> String {
    match outcome.response() {
        Some(response) => format!("  {:<32} {}", display_name(response.responder), format_rtt(response.rtt)),
        None => String::from("  *"),
    }
}

/// TTLs at which no probe got any response.
pub fn silent_hops(summary: &TraceSummary) -> Vec<u8> {
    summary.hops.iter()
        .filter(|hop| hop.outcomes.iter().all(|outcome| outcome.response().is_none()))
        .map(|hop| hop.ttl)
        .collect()
}

pub fn format_rtt(rtt: Duration) -> String {
    format!("{:.3}ms", rtt.as_secs_f64() * 1000.0)
}
