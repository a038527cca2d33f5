use crate::error::{TraceError, TraceResult};

use std::net::{IpAddr, Ipv4Addr};

/// Resolves the destination to its first IPv4 address. Literals skip the lookup.
pub fn resolve_destination(host: &str) -> TraceResult<Ipv4Addr> {
    if let Ok(address) = host.parse::<Ipv4Addr>() {
        return Ok(address);
    }
    let addresses = dns_lookup::lookup_host(host)
        .map_err(|source| TraceError::Resolve { host: host.to_string(), source })?;
    first_ipv4(&addresses).ok_or_else(|| TraceError::NoIpv4Address(host.to_string()))
}

fn first_ipv4(addresses: &[IpAddr]) -> Option<Ipv4Addr> {
    addresses.iter().find_map(|address| match address {
        IpAddr::V4(v4) => Some(*v4),
        IpAddr::V6(_) => None,
    })
}

/// Reverse lookup for display. Failures and numeric-only answers give `None`.
pub fn lookup_name(address: IpAddr) -> Option<String> {
    dns_lookup::lookup_addr(&address)
        .ok()
        .filter(|name| name.parse::<IpAddr>().is_err())
}
