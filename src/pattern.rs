//! Textual forms of the pattern fields (MAC, IPv4, IPv6 and preamble).
//!
//! Patterns are handled by the generation engine as big-endian integers of the pattern width.

use crate::catalog::PatternKind;
use crate::error::ConfigError;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Parse a pattern string into its numeric form.
pub fn parse(kind: PatternKind, text: &str) -> Result<u128, ConfigError> {
    let malformed = || ConfigError::MalformedPattern {
        kind: kind.name(),
        text: text.to_string(),
    };
    let text = text.trim();
    match kind {
        PatternKind::Mac => parse_mac(text).ok_or_else(malformed),
        PatternKind::Ipv4 => text
            .parse::<Ipv4Addr>()
            .map(|ip| u32::from(ip) as u128)
            .map_err(|_| malformed()),
        PatternKind::Ipv6 => text
            .parse::<Ipv6Addr>()
            .map(u128::from)
            .map_err(|_| malformed()),
        PatternKind::Preamble => {
            if text.len() == 16 && text.chars().all(|c| c.is_ascii_hexdigit()) {
                u64::from_str_radix(text, 16)
                    .map(|v| v as u128)
                    .map_err(|_| malformed())
            } else {
                Err(malformed())
            }
        }
    }
}

/// Six pairs of hex digits, each of the first five optionally followed by a colon
fn parse_mac(text: &str) -> Option<u128> {
    let bytes = text.as_bytes();
    let mut value = 0u128;
    let mut pos = 0;
    for octet in 0..6 {
        let pair = text.get(pos..pos + 2)?;
        if !pair.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        value = (value << 8) | u8::from_str_radix(pair, 16).ok()? as u128;
        pos += 2;
        if octet < 5 && bytes.get(pos) == Some(&b':') {
            pos += 1;
        }
    }
    (pos == bytes.len()).then_some(value)
}

/// Canonical text of a pattern value
pub fn format(kind: PatternKind, value: u128) -> String {
    match kind {
        PatternKind::Mac => (0..6)
            .rev()
            .map(|i| format!("{:02x}", (value >> (8 * i)) as u8))
            .collect::<Vec<_>>()
            .join(":"),
        PatternKind::Ipv4 => Ipv4Addr::from(value as u32).to_string(),
        PatternKind::Ipv6 => Ipv6Addr::from(value).to_string(),
        PatternKind::Preamble => format!("{:016x}", value as u64),
    }
}
