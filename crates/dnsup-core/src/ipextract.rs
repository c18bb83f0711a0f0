//! IP literal extraction from response bodies
//!
//! Echo services and dyndns-style providers answer with free-form text
//! that embeds the address somewhere. Regexes find candidate literals
//! and `std::net` parsing filters out false positives.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

static IPV4_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)")
        .expect("hardcoded regex")
});

// Loose on purpose, candidates are re-parsed before being accepted.
static IPV6_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{0,4}(?::[0-9a-fA-F]{0,4}){2,7}").expect("hardcoded regex")
});

/// All IPv4 literals in the text, in order of appearance.
pub fn extract_ipv4(text: &str) -> Vec<Ipv4Addr> {
    IPV4_RE
        .find_iter(text)
        .filter_map(|m| Ipv4Addr::from_str(m.as_str()).ok())
        .collect()
}

/// All IPv6 literals in the text, in order of appearance.
pub fn extract_ipv6(text: &str) -> Vec<Ipv6Addr> {
    IPV6_RE
        .find_iter(text)
        .filter_map(|m| Ipv6Addr::from_str(m.as_str()).ok())
        .collect()
}

/// First IP literal of either family in the text, IPv4 checked first.
pub fn extract_first(text: &str) -> Option<IpAddr> {
    if let Some(v4) = extract_ipv4(text).into_iter().next() {
        return Some(IpAddr::V4(v4));
    }
    extract_ipv6(text).into_iter().next().map(IpAddr::V6)
}
