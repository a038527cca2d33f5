mod config;
mod dns_resolver;
mod engine;
mod error;
mod messages;
mod parser;
mod report;
mod sender;
mod socket;
mod tracer;

use crate::config::{StopPolicy, TraceConfig};
use crate::dns_resolver::resolve_destination;
use crate::error::{TraceError, TraceResult};
use crate::parser::InnerHeaderLength;
use crate::report::Reporter;
use crate::socket::IcmpSocket;
use crate::tracer::Tracer;

use clap::Parser;
use std::io;
use std::process::{self, ExitCode};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Host name or IPv4 address to trace
    destination: String,

    /// Number of probes per hop
    #[arg(short, long, default_value_t = 3)]
    queries: u16,

    /// Time (in seconds) to wait for a response to a probe
    #[arg(short, long, default_value_t = 5)]
    wait: u64,

    /// Max time-to-live (max number of hops)
    #[arg(short, long, default_value_t = 64)]
    max_ttl: u8,

    /// Print hop addresses numerically (skip reverse DNS)
    #[arg(short, long)]
    numeric: bool,

    /// ICMP identifier for this run. Default: random.
    #[arg(short, long)]
    ident: Option<u16>,

    /// Send every probe for the hop that reaches the destination before stopping
    #[arg(long)]
    complete_hop: bool,

    /// Honor IP options in the header quoted by Time Exceeded messages
    #[arg(long)]
    ip_options: bool,

    /// Debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = ctrlc::set_handler(|| {
        println!();
        process::exit(130);
    }) {
        warn!(error = %e, "unable to install Ctrl-C handler");
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("hoptrace: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(args: &Args) -> TraceResult<()> {
    let run_token = args.ident.unwrap_or_else(rand::random);
    let stop_policy = if args.complete_hop { StopPolicy::CompleteHop } else { StopPolicy::Immediate };
    let inner_header = if args.ip_options { InnerHeaderLength::Declared } else { InnerHeaderLength::Fixed };
    let config = TraceConfig::new(args.queries, Duration::from_secs(args.wait), args.max_ttl, run_token)?
        .with_stop_policy(stop_policy)
        .with_inner_header(inner_header);

    let destination = resolve_destination(&args.destination)?;
    let socket = IcmpSocket::open().map_err(TraceError::Socket)?;
    info!(%destination, run_token, "starting trace");

    let mut reporter = Reporter::new(io::stdout(), destination, args.numeric);
    reporter.header(&args.destination, config.max_ttl).map_err(TraceError::Output)?;

    let mut tracer = Tracer::new(socket, destination, config);
    let summary = tracer.trace(|event| {
        if let Err(e) = reporter.event(event) {
            warn!(error = %e, "unable to print probe result");
        }
    })?;

    reporter.footer(&summary, config.max_ttl).map_err(TraceError::Output)?;
    Ok(())
}
