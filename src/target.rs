// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Parses heterogeneous target strings (single addresses, dash ranges,
//! CIDR blocks) into a deduplicated, ordered list of IPv4 addresses.
//!
//! Pure and side-effect free: the same input always expands to the same
//! output, and a single malformed token aborts the whole expansion so the
//! caller sees the first error rather than a partial list.

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;

use crate::error::CoreError;

/// Parses one target string into the IPv4 addresses it denotes.
///
/// Accepts a single dotted-quad, an inclusive dash range (full form
/// `A.B.C.D-A.B.C.E` or short form `A.B.C.D-N` where `N` replaces the last
/// octet), or a CIDR block. For CIDR prefixes of 31 or 32 bits every
/// address in the block is yielded; for wider blocks the network and
/// broadcast addresses are excluded.
pub fn parse_target(target: &str) -> Result<Vec<Ipv4Addr>, CoreError> {
    let target = target.trim();

    if target.is_empty() {
        return Err(CoreError::validation("target", "empty target string"));
    }

    if let Some((network, prefix)) = target.split_once('/') {
        return parse_cidr(target, network, prefix);
    }

    if let Some((start, end)) = target.split_once('-') {
        return parse_range(target, start, end);
    }

    let addr: Ipv4Addr = target
        .parse()
        .map_err(|_| CoreError::validation("target", format!("invalid IP address '{target}'")))?;
    Ok(vec![addr])
}

fn parse_cidr(original: &str, network: &str, prefix: &str) -> Result<Vec<Ipv4Addr>, CoreError> {
    let net: Ipv4Network = format!("{network}/{prefix}")
        .parse()
        .map_err(|e| CoreError::validation("target", format!("invalid CIDR notation '{original}': {e}")))?;

    let addrs: Vec<Ipv4Addr> = if net.size() <= 2 {
        net.iter().collect()
    } else {
        // ipnetwork's `iter()` yields every address in the block including
        // the network and broadcast addresses; `hosts()` excludes both.
        net.iter().filter(|a| *a != net.network() && *a != net.broadcast()).collect()
    };
    Ok(addrs)
}

fn parse_range(original: &str, start_str: &str, end_str: &str) -> Result<Vec<Ipv4Addr>, CoreError> {
    let start_str = start_str.trim();
    let end_str = end_str.trim();

    let start: Ipv4Addr = start_str
        .parse()
        .map_err(|_| CoreError::validation("target", format!("invalid IP range '{original}': bad start address")))?;

    // Short form: "192.168.1.1-254" -> "192.168.1.1-192.168.1.254".
    let end_full = if end_str.contains('.') {
        end_str.to_string()
    } else {
        let octets: Vec<&str> = start_str.splitn(4, '.').collect();
        if octets.len() != 4 {
            return Err(CoreError::validation("target", format!("invalid IP range '{original}': malformed start address")));
        }
        format!("{}.{}.{}.{}", octets[0], octets[1], octets[2], end_str)
    };

    let end: Ipv4Addr = end_full
        .parse()
        .map_err(|_| CoreError::validation("target", format!("invalid IP range '{original}': bad end address")))?;

    if u32::from(start) > u32::from(end) {
        return Err(CoreError::validation(
            "target",
            format!("invalid IP range '{original}': start {start} is greater than end {end}"),
        ));
    }

    Ok((u32::from(start)..=u32::from(end)).map(Ipv4Addr::from).collect())
}

/// Expands a list of target strings into a deduplicated list of address
/// strings, preserving the order of first occurrence. A single invalid
/// target aborts the whole expansion.
pub fn expand_targets(targets: &[String]) -> Result<Vec<String>, CoreError> {
    let mut seen = std::collections::HashSet::new();
    let mut result = Vec::new();

    for target in targets {
        for addr in parse_target(target)? {
            let s = addr.to_string();
            if seen.insert(s.clone()) {
                result.push(s);
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_ip() {
        let result = parse_target("192.168.1.1").unwrap();
        assert_eq!(result, vec![Ipv4Addr::new(192, 168, 1, 1)]);
    }

    #[test]
    fn parses_full_range() {
        let result = parse_target("192.168.1.1-192.168.1.3").unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result[2], Ipv4Addr::new(192, 168, 1, 3));
    }

    #[test]
    fn parses_short_range() {
        let full = parse_target("192.168.1.1-192.168.1.3").unwrap();
        let short = parse_target("192.168.1.1-3").unwrap();
        assert_eq!(full, short);
    }

    #[test]
    fn rejects_inverted_range() {
        let err = parse_target("192.168.1.10-5").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("10") || msg.contains("start"));
    }

    #[test]
    fn cidr_32_yields_single_address() {
        let result = parse_target("192.168.1.1/32").unwrap();
        assert_eq!(result, vec![Ipv4Addr::new(192, 168, 1, 1)]);
    }

    #[test]
    fn cidr_31_yields_two_addresses() {
        let result = parse_target("192.168.1.0/31").unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn cidr_30_excludes_network_and_broadcast() {
        let result = parse_target("192.168.1.0/30").unwrap();
        assert_eq!(result, vec![Ipv4Addr::new(192, 168, 1, 1), Ipv4Addr::new(192, 168, 1, 2)]);
    }

    #[test]
    fn cidr_24_yields_254_hosts() {
        let result = parse_target("192.168.1.0/24").unwrap();
        assert_eq!(result.len(), 254);
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(parse_target("256.1.1.1").is_err());
        assert!(parse_target("1.2.3").is_err());
        assert!(parse_target("1.2.3.4.5").is_err());
    }

    #[test]
    fn expand_mixed_list_dedupes_and_preserves_order() {
        let targets = vec![
            "192.168.1.1".to_string(),
            "192.168.1.10-12".to_string(),
            "192.168.1.0/30".to_string(),
        ];
        let result = expand_targets(&targets).unwrap();
        assert_eq!(
            result,
            vec!["192.168.1.1", "192.168.1.10", "192.168.1.11", "192.168.1.12", "192.168.1.2"]
        );
    }

    #[test]
    fn expansion_is_idempotent() {
        let targets = vec!["192.168.1.0/28".to_string()];
        let once = expand_targets(&targets).unwrap();
        let twice = expand_targets(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn single_invalid_target_aborts_whole_expansion() {
        let targets = vec!["192.168.1.1".to_string(), "not-an-ip".to_string()];
        assert!(expand_targets(&targets).is_err());
    }
}
