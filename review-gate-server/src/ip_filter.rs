//! Source address allow-listing for inbound webhooks.

use anyhow::{anyhow, Context, Result};
use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

/// A single allowed network in CIDR notation. A bare address is a /32 or /128.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpNetwork {
    addr: IpAddr,
    prefix_len: u8,
}

impl IpNetwork {
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (addr_part, prefix_part) = match s.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (s, None),
        };

        let addr: IpAddr = addr_part
            .parse()
            .with_context(|| format!("invalid IP address '{}'", addr_part))?;
        let max_len = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        let prefix_len = match prefix_part {
            Some(p) => p
                .parse::<u8>()
                .with_context(|| format!("invalid prefix length in '{}'", s))?,
            None => max_len,
        };
        if prefix_len > max_len {
            return Err(anyhow!("prefix length {} too long in '{}'", prefix_len, s));
        }

        Ok(Self { addr, prefix_len })
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.addr, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                prefix_matches(u32::from(net) as u128, u32::from(ip) as u128, 32, self.prefix_len)
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                prefix_matches(u128::from(net), u128::from(ip), 128, self.prefix_len)
            }
            (IpAddr::V4(_), IpAddr::V6(ip)) => match ip.to_ipv4_mapped() {
                Some(v4) => self.contains(IpAddr::V4(v4)),
                None => false,
            },
            (IpAddr::V6(_), IpAddr::V4(_)) => false,
        }
    }
}

fn prefix_matches(net: u128, ip: u128, width: u32, prefix_len: u8) -> bool {
    if prefix_len == 0 {
        return true;
    }
    let shift = width - prefix_len as u32;
    (net >> shift) == (ip >> shift)
}

/// The configured allow-list. An empty list allows nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedNetworks(Vec<IpNetwork>);

impl AllowedNetworks {
    /// Parse a comma-separated list of addresses and CIDR ranges.
    pub fn parse(list: &str) -> Result<Self> {
        list.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(IpNetwork::parse)
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn allows(&self, ip: IpAddr) -> bool {
        self.0.iter().any(|network| network.contains(ip))
    }
}

/// Determine the client address of a request.
///
/// The first `X-Forwarded-For` entry wins, otherwise the peer address is
/// used. That entry is whatever the sender wrote unless the fronting proxy
/// overwrites the header, so the allow-list only holds behind such a proxy;
/// the signature check applies either way.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|first| first.trim().parse().ok())
        .or_else(|| peer.map(|addr| addr.ip()))
}
