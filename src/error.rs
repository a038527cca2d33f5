use std::io;
use std::time::Duration;
use thiserror::Error;

pub type TraceResult<T> = Result<T, TraceError>;

/// Errors that abort the whole run.
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("unable to resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },
    #[error("{0} has no IPv4 address")]
    NoIpv4Address(String),
    #[error("unable to open ICMP socket (raw sockets usually need root or CAP_NET_RAW): {0}")]
    Socket(#[source] io::Error),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("unable to write report: {0}")]
    Output(#[source] io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EncodeError {
    #[error("echo request buffer too small: {0} bytes")]
    BufferTooSmall(usize),
}

/// Failure to put one probe on the wire.
#[derive(Error, Debug)]
pub enum SendError {
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("send failed: {0}")]
    Transport(#[from] io::Error),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("ICMP message truncated: {0} bytes")]
    Truncated(usize),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("probes per hop must be at least 1")]
    NoProbes,
    #[error("wait time must be greater than zero")]
    ZeroWait,
    #[error("wait time of {0:?} is too long")]
    WaitTooLong(Duration),
    #[error("max ttl must be at least 1")]
    ZeroMaxTtl,
    #[error("{probes} probes per hop over {max_ttl} hops exceeds the 16-bit sequence space")]
    SequenceSpaceExhausted { probes: u16, max_ttl: u8 },
}
