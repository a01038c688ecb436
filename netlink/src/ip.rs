//! IPv4/IPv6/MAC text parsing and raw-byte conversion helpers shared by
//! every object module. Grounded on the teacher's `vec_to_addr` (rsln) and
//! `parse_mac`, generalized per spec §9's open question: the IPv6 parser
//! here is not a stub.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::{NetlinkError, Result};

/// Converts raw address bytes (4 or 16 bytes, as carried in an RTA_DST /
/// IFA_ADDRESS / NDA_DST payload) into an `IpAddr`.
pub fn bytes_to_addr(buf: &[u8]) -> Result<IpAddr> {
    match buf.len() {
        4 => Ok(IpAddr::V4(Ipv4Addr::new(buf[0], buf[1], buf[2], buf[3]))),
        16 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(buf);
            Ok(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        _ => Err(NetlinkError::Malformed("address payload is neither 4 nor 16 bytes")),
    }
}

pub fn addr_to_bytes(addr: &IpAddr) -> Vec<u8> {
    match addr {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    }
}

/// Parses a dotted-quad IPv4 address: four decimal octets 0-255 joined by
/// `.`, no extraneous characters, no missing segments.
pub fn parse_ipv4(text: &str) -> Result<Ipv4Addr> {
    let parts: Vec<&str> = text.split('.').collect();
    if parts.len() != 4 {
        return Err(NetlinkError::Malformed("IPv4 address must have 4 octets"));
    }

    let mut octets = [0u8; 4];
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(NetlinkError::Malformed("IPv4 octet must be decimal digits"));
        }
        octets[i] = part
            .parse::<u16>()
            .ok()
            .filter(|v| *v <= 255)
            .ok_or(NetlinkError::Malformed("IPv4 octet out of range 0-255"))? as u8;
    }

    Ok(Ipv4Addr::from(octets))
}

/// Parses a full or `::`-compressed IPv6 literal. A zone suffix (`%eth0`)
/// is rejected explicitly rather than silently dropped, since this
/// toolkit has no concept of scoped addresses outside the interface an
/// operation is already keyed on.
pub fn parse_ipv6(text: &str) -> Result<Ipv6Addr> {
    if text.contains('%') {
        return Err(NetlinkError::Malformed("zone-qualified IPv6 literals are not supported"));
    }

    text.parse::<Ipv6Addr>()
        .map_err(|_| NetlinkError::Malformed("invalid IPv6 literal"))
}

/// Parses either family, returning the address and, if present, the
/// `/prefix` length (defaulting to the address family's full width).
pub fn parse_ip_with_prefix(text: &str, default_prefix: Option<u8>) -> Result<(IpAddr, u8)> {
    let (addr_part, prefix_part) = match text.split_once('/') {
        Some((a, p)) => (a, Some(p)),
        None => (text, None),
    };

    let (addr, max_prefix) = if addr_part.contains(':') {
        (IpAddr::V6(parse_ipv6(addr_part)?), 128u8)
    } else {
        (IpAddr::V4(parse_ipv4(addr_part)?), 32u8)
    };

    let prefix = match prefix_part {
        Some(p) => p
            .parse::<u8>()
            .ok()
            .filter(|v| *v <= max_prefix)
            .ok_or(NetlinkError::Malformed("prefix length out of range"))?,
        None => default_prefix.unwrap_or(max_prefix),
    };

    Ok((addr, prefix))
}

/// Parses a MAC-48 address, accepting `:` or `-` separators, case
/// insensitive, rejecting anything but exactly six octets.
pub fn parse_mac(text: &str) -> Result<[u8; 6]> {
    let sep = if text.contains('-') { '-' } else { ':' };
    let parts: Vec<&str> = text.split(sep).collect();
    if parts.len() != 6 {
        return Err(NetlinkError::Malformed("MAC address must have 6 octets"));
    }

    let mut mac = [0u8; 6];
    for (i, part) in parts.iter().enumerate() {
        mac[i] = u8::from_str_radix(part, 16)
            .map_err(|_| NetlinkError::Malformed("MAC octet is not valid hex"))?;
    }
    Ok(mac)
}

pub fn format_mac(mac: &[u8]) -> String {
    mac.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Writes `s` followed by a single NUL byte — the builder's string
/// attribute contract.
pub fn zero_terminated(s: &str) -> Vec<u8> {
    let mut v = Vec::with_capacity(s.len() + 1);
    v.extend_from_slice(s.as_bytes());
    v.push(0);
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_round_trips_every_valid_octet_boundary() {
        for text in ["0.0.0.0", "255.255.255.255", "10.0.0.1", "192.168.1.254"] {
            let parsed = parse_ipv4(text).unwrap();
            assert_eq!(parsed.to_string(), text);
        }
    }

    #[test]
    fn ipv4_rejects_out_of_range_octet() {
        assert!(parse_ipv4("256.0.0.1").is_err());
        assert!(parse_ipv4("10.0.0").is_err());
        assert!(parse_ipv4("10.0.0.1.2").is_err());
        assert!(parse_ipv4("10.0.a.1").is_err());
        assert!(parse_ipv4("").is_err());
    }

    #[test]
    fn ipv6_parses_full_and_compressed_forms() {
        assert!(parse_ipv6("fe80::1").is_ok());
        assert!(parse_ipv6("2001:db8:0:0:0:0:0:1").is_ok());
        assert!(parse_ipv6("::1").is_ok());
    }

    #[test]
    fn ipv6_rejects_zone_suffix() {
        assert!(parse_ipv6("fe80::1%eth0").is_err());
    }

    #[test]
    fn prefix_defaults_when_absent() {
        let (addr, prefix) = parse_ip_with_prefix("10.0.0.1", None).unwrap();
        assert!(addr.is_ipv4());
        assert_eq!(prefix, 32);

        let (_, prefix6) = parse_ip_with_prefix("::1", None).unwrap();
        assert_eq!(prefix6, 128);
    }

    #[test]
    fn prefix_rejects_out_of_range() {
        assert!(parse_ip_with_prefix("10.0.0.0/33", None).is_err());
        assert!(parse_ip_with_prefix("::/129", None).is_err());
    }

    #[test]
    fn mac_accepts_colon_and_dash_separators_case_insensitive() {
        let a = parse_mac("02:1A:79:35:1C:5D").unwrap();
        let b = parse_mac("02-1a-79-35-1c-5d").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, [0x02, 0x1A, 0x79, 0x35, 0x1C, 0x5D]);
    }

    #[test]
    fn mac_rejects_short_address() {
        assert!(parse_mac("02:1a:79:35:1c").is_err());
    }

    #[test]
    fn bytes_to_addr_rejects_wrong_length() {
        assert!(bytes_to_addr(&[1, 2, 3]).is_err());
    }
}
