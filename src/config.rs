use crate::error::ConfigError;
use crate::parser::InnerHeaderLength;

use std::time::{Duration, Instant};

/// What to do once a probe at some TTL gets an echo reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StopPolicy {
    /// Stop right away, skipping the remaining probes at that TTL.
    #[default]
    Immediate,
    /// Finish every configured probe at that TTL, then stop.
    CompleteHop,
}

/// Parameters of one trace run.
#[derive(Debug, Clone, Copy)]
pub struct TraceConfig {
    pub probes_per_hop: u16,
    pub wait: Duration,
    pub max_ttl: u8,
    pub run_token: u16,
    pub stop_policy: StopPolicy,
    pub inner_header: InnerHeaderLength,
}

impl TraceConfig {
    pub fn new(probes_per_hop: u16, wait: Duration, max_ttl: u8, run_token: u16) -> Result<TraceConfig, ConfigError> {
        if probes_per_hop == 0 {
            return Err(ConfigError::NoProbes);
        }
        if wait.is_zero() {
            return Err(ConfigError::ZeroWait);
        }
        if Instant::now().checked_add(wait).is_none() {
            return Err(ConfigError::WaitTooLong(wait));
        }
        if max_ttl == 0 {
            return Err(ConfigError::ZeroMaxTtl);
        }
        // every probe of the run needs its own sequence number
        if u32::from(probes_per_hop) * u32::from(max_ttl) > u32::from(u16::MAX) {
            return Err(ConfigError::SequenceSpaceExhausted { probes: probes_per_hop, max_ttl });
        }
        Ok(TraceConfig {
            probes_per_hop,
            wait,
            max_ttl,
            run_token,
            stop_policy: StopPolicy::default(),
            inner_header: InnerHeaderLength::default(),
        })
    }

    pub fn with_stop_policy(mut self, stop_policy: StopPolicy) -> TraceConfig {
        self.stop_policy = stop_policy;
        self
    }

    pub fn with_inner_header(mut self, inner_header: InnerHeaderLength) -> TraceConfig {
        self.inner_header = inner_header;
        self
    }
}
