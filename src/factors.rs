//! CIDR factor expansion.
//!
//! An address expands into the ladder of every CIDR range containing it,
//! broadest first: index 0 is the /1 network, the last entry is the
//! address itself (/32 or /128). Signature files list ranges in exactly
//! these textual forms, so the formatting here is part of the file format.

use ipnet::IpNet;
use regex::Regex;
use serde::Serialize;
use std::net::{IpAddr, Ipv6Addr};
use std::sync::LazyLock;

/// Number of factors for a full IPv4 expansion.
pub const IPV4_FACTORS: usize = 32;

/// Number of factors for a full IPv6 expansion.
pub const IPV6_FACTORS: usize = 128;

const OCTET: &str = r"([01]?[0-9]{1,2}|2[0-4][0-9]|25[0-5])";

static IPV4_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^{o}\.{o}\.{o}\.{o}$", o = OCTET)).expect("IPv4 pattern is valid")
});

static IPV6_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let h = "[0-9a-f]{1,4}";
    let o = r"(?:25[0-5]|2[0-4]\d|1\d{2}|[1-9]?\d)";
    let v4 = format!(r"(?:{o}\.){{3}}{o}", o = o);
    let forms = [
        format!("(?:{h}:){{7}}{h}"),
        format!("(?:{h}:){{6}}:{h}"),
        format!("(?:{h}:){{5}}:(?:{h}:)?{h}"),
        format!("(?:{h}:){{4}}:(?:{h}:){{0,2}}{h}"),
        format!("(?:{h}:){{3}}:(?:{h}:){{0,3}}{h}"),
        format!("(?:{h}:){{2}}:(?:{h}:){{0,4}}{h}"),
        format!("(?:{h}:){{6}}{v4}"),
        format!("(?:{h}:){{0,5}}:{v4}"),
        format!("::(?:{h}:){{0,5}}{v4}"),
        format!("{h}::(?:{h}:){{0,5}}{h}"),
        format!("::(?:{h}:){{0,6}}{h}"),
        format!("(?:{h}:){{1,7}}:"),
    ];
    Regex::new(&format!("(?i)^(?:{})$", forms.join("|"))).expect("IPv6 pattern is valid")
});

static TRAILING_ZERO_GROUPS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(:0){2,}/").expect("trailing zero pattern is valid"));

static INTERIOR_ZERO_GROUPS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(:0)+:(0:)+").expect("interior zero pattern is valid"));

/// Address family of a factor ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    /// Suffix used to build default signature tags.
    pub fn tag_suffix(factor_count: usize) -> &'static str {
        match factor_count {
            IPV4_FACTORS => "IPv4",
            IPV6_FACTORS => "IPv6",
            _ => "Unknown",
        }
    }
}

/// Whether `addr` is a dotted-quad IPv4 address.
pub fn is_ipv4(addr: &str) -> bool {
    IPV4_PATTERN.is_match(addr)
}

/// Whether `addr` is an IPv6 literal that [`expand_ipv6`] accepts.
pub fn is_ipv6(addr: &str) -> bool {
    IPV6_PATTERN.is_match(addr) && addr.parse::<Ipv6Addr>().is_ok()
}

/// Expand an IPv4 address into all 32 factors.
pub fn expand_ipv4(addr: &str) -> Option<Vec<String>> {
    expand_ipv4_limited(addr, IPV4_FACTORS)
}

/// Expand an IPv4 address into its first `limit` factors.
pub fn expand_ipv4_limited(addr: &str, limit: usize) -> Option<Vec<String>> {
    let caps = IPV4_PATTERN.captures(addr)?;
    let mut octets = [0u8; 4];
    for (i, octet) in octets.iter_mut().enumerate() {
        *octet = caps.get(i + 1)?.as_str().parse().ok()?;
    }

    let limit = limit.min(IPV4_FACTORS);
    let mut factors = Vec::with_capacity(limit);
    let mut base = [0u8; 4];
    'outer: for cycle in 0..4 {
        for step in 0..8 {
            if factors.len() == limit {
                break 'outer;
            }
            let size = 128u16 >> step;
            base[cycle] = ((octets[cycle] as u16 / size) * size) as u8;
            factors.push(format!(
                "{}.{}.{}.{}/{}",
                base[0],
                base[1],
                base[2],
                base[3],
                cycle * 8 + step + 1
            ));
        }
    }
    Some(factors)
}

/// Expand an IPv6 address into all 128 factors.
pub fn expand_ipv6(addr: &str) -> Option<Vec<String>> {
    expand_ipv6_limited(addr, IPV6_FACTORS)
}

/// Expand an IPv6 address into its first `limit` factors.
pub fn expand_ipv6_limited(addr: &str, limit: usize) -> Option<Vec<String>> {
    if !is_ipv6(addr) {
        return None;
    }
    let groups = addr.parse::<Ipv6Addr>().ok()?.segments();

    let limit = limit.min(IPV6_FACTORS);
    let mut factors = Vec::with_capacity(limit);
    let mut base = [0u16; 8];
    'outer: for cycle in 0..8 {
        for step in 0..16 {
            if factors.len() == limit {
                break 'outer;
            }
            let size = 32768u32 >> step;
            base[cycle] = ((groups[cycle] as u32 / size) * size) as u16;
            let joined = base
                .iter()
                .map(|g| format!("{:x}", g))
                .collect::<Vec<_>>()
                .join(":");
            factors.push(compress(&format!("{}/{}", joined, cycle * 16 + step + 1)));
        }
    }
    Some(factors)
}

/// Collapse one run of zero groups into `::`.
///
/// A trailing run wins; otherwise the leftmost interior run of two or more
/// zero groups is collapsed.
fn compress(factor: &str) -> String {
    if factor.contains(":0:0/") {
        return TRAILING_ZERO_GROUPS.replacen(factor, 1, "::/").into_owned();
    }
    if factor.contains(":0:0:") {
        return INTERIOR_ZERO_GROUPS
            .replacen(factor, 1, "::")
            .replace("::0/", "::/");
    }
    factor.to_string()
}

/// Strip the prefix length from the narrowest factor, giving the bare
/// address as signature files may spell it.
pub fn bare_address(factor: &str) -> &str {
    factor.split_once('/').map_or(factor, |(addr, _)| addr)
}

/// First and last address covered by a factor.
pub fn address_range(factor: &str) -> Option<(IpAddr, IpAddr)> {
    let net: IpNet = factor.parse().ok()?;
    Some((net.network(), net.broadcast()))
}
