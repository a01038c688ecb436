//! Address operations (spec §4.4 "Address operations"). Grounded on
//! `rsln/src/types/addr.rs`'s `Address` struct and the teacher's
//! `handle/addr.rs` add/delete flow.

use std::net::IpAddr;

use crate::attr::{collect, Attr};
use crate::error::{NetlinkError, Result};
use crate::ip::{addr_to_bytes, bytes_to_addr};
use crate::message::{MessageBuilder, NLM_F_ACK, NLM_F_CREATE, NLM_F_EXCL, NLM_F_DUMP, NLM_F_REPLACE};
use crate::transactor::Transactor;

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct AddressHeader {
    pub family: u8,
    pub prefix_len: u8,
    pub flags: u8,
    pub scope: u8,
    pub index: i32,
}

/// An address attached to an interface (spec §3 Address).
#[derive(Debug, Clone)]
pub struct Address {
    pub index: i32,
    pub family: u8,
    pub addr: IpAddr,
    pub prefix_len: u8,
    pub scope: u8,
    pub label: Option<String>,
    pub broadcast: Option<IpAddr>,
}

impl Address {
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() < std::mem::size_of::<AddressHeader>() {
            return None;
        }

        let hdr_len = std::mem::size_of::<AddressHeader>();
        let raw = &payload[..hdr_len];
        let header = AddressHeader {
            family: raw[0],
            prefix_len: raw[1],
            flags: raw[2],
            scope: raw[3],
            index: i32::from_ne_bytes(raw[4..8].try_into().ok()?),
        };

        let attrs = collect(&payload[hdr_len..]);

        let addr = attrs
            .get(&(libc::IFA_ADDRESS as u16))
            .or_else(|| attrs.get(&(libc::IFA_LOCAL as u16)))
            .and_then(|a| bytes_to_addr(a.payload).ok())?;

        let broadcast = attrs
            .get(&(libc::IFA_BROADCAST as u16))
            .and_then(|a| bytes_to_addr(a.payload).ok());

        let label = attrs
            .get(&(libc::IFA_LABEL as u16))
            .and_then(|a| a.as_str())
            .map(str::to_string);

        Some(Address {
            index: header.index,
            family: header.family,
            addr,
            prefix_len: header.prefix_len,
            scope: header.scope,
            label,
            broadcast,
        })
    }
}

pub struct AddrHandle<'a> {
    tx: &'a mut Transactor,
}

impl<'a> AddrHandle<'a> {
    pub fn new(tx: &'a mut Transactor) -> Self {
        Self { tx }
    }

    /// Dumps every address, optionally restricted to one interface.
    pub fn list(&mut self, index: Option<i32>) -> Result<Vec<Address>> {
        let mut b = MessageBuilder::new(libc::RTM_GETADDR as u16, NLM_F_DUMP);
        let mut hdr = AddressHeader::default();
        hdr.family = libc::AF_UNSPEC as u8;
        b.append_struct(&hdr);

        let msgs = self.tx.request(b)?;
        let all = msgs.iter().filter_map(|m| Address::parse(&m.payload));
        Ok(match index {
            Some(idx) => all.filter(|a| a.index == idx).collect(),
            None => all.collect(),
        })
    }

    /// Adds an address to an interface. Replaces an exact duplicate
    /// rather than failing, per spec §4.4 idempotency note.
    pub fn add(&mut self, index: i32, addr: IpAddr, prefix_len: u8) -> Result<()> {
        let mut b = MessageBuilder::new(
            libc::RTM_NEWADDR as u16,
            NLM_F_CREATE | NLM_F_REPLACE | NLM_F_ACK,
        );
        let mut hdr = AddressHeader::default();
        hdr.family = family_of(&addr);
        hdr.prefix_len = prefix_len;
        hdr.index = index;
        b.append_struct(&hdr);

        let raw = addr_to_bytes(&addr);
        b.append_attr(&Attr::new(libc::IFA_LOCAL as u16, &raw));
        b.append_attr(&Attr::new(libc::IFA_ADDRESS as u16, &raw));

        match self.tx.request(b) {
            Ok(_) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Adds without replace/excl, used when the caller wants to know if
    /// the address already exists rather than have it silently replaced.
    pub fn add_strict(&mut self, index: i32, addr: IpAddr, prefix_len: u8) -> Result<()> {
        let mut b = MessageBuilder::new(libc::RTM_NEWADDR as u16, NLM_F_CREATE | NLM_F_EXCL | NLM_F_ACK);
        let mut hdr = AddressHeader::default();
        hdr.family = family_of(&addr);
        hdr.prefix_len = prefix_len;
        hdr.index = index;
        b.append_struct(&hdr);

        let raw = addr_to_bytes(&addr);
        b.append_attr(&Attr::new(libc::IFA_LOCAL as u16, &raw));
        b.append_attr(&Attr::new(libc::IFA_ADDRESS as u16, &raw));

        self.tx.request(b).map_err(|e| match e {
            NetlinkError::NetlinkReply(code) if -code == libc::EEXIST => {
                NetlinkError::AlreadyExists { kind: "address" }
            }
            other => other,
        })?;
        Ok(())
    }

    pub fn delete(&mut self, index: i32, addr: IpAddr, prefix_len: u8) -> Result<()> {
        let mut b = MessageBuilder::new(libc::RTM_DELADDR as u16, NLM_F_ACK);
        let mut hdr = AddressHeader::default();
        hdr.family = family_of(&addr);
        hdr.prefix_len = prefix_len;
        hdr.index = index;
        b.append_struct(&hdr);

        let raw = addr_to_bytes(&addr);
        b.append_attr(&Attr::new(libc::IFA_LOCAL as u16, &raw));

        self.tx.request(b).map_err(|e| match e {
            NetlinkError::NetlinkReply(code) if -code == libc::EADDRNOTAVAIL => {
                NetlinkError::Malformed("address not present on interface")
            }
            other => other,
        })?;
        Ok(())
    }
}

fn family_of(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => libc::AF_INET as u8,
        IpAddr::V6(_) => libc::AF_INET6 as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(index: i32, family: u8, prefix_len: u8, addr: &[u8], label: Option<&str>) -> Vec<u8> {
        let mut buf = vec![family, prefix_len, 0, 0];
        buf.extend_from_slice(&index.to_ne_bytes());
        buf.extend_from_slice(&Attr::new(libc::IFA_ADDRESS as u16, addr).serialize());
        if let Some(l) = label {
            buf.extend_from_slice(&Attr::string(libc::IFA_LABEL as u16, l).serialize());
        }
        buf
    }

    #[test]
    fn parses_ipv4_address_with_label() {
        let buf = record(3, libc::AF_INET as u8, 24, &[10, 0, 0, 1], Some("eth0"));
        let addr = Address::parse(&buf).unwrap();
        assert_eq!(addr.index, 3);
        assert_eq!(addr.prefix_len, 24);
        assert_eq!(addr.addr.to_string(), "10.0.0.1");
        assert_eq!(addr.label.as_deref(), Some("eth0"));
    }

    #[test]
    fn parses_ipv6_address_without_label() {
        let buf = record(4, libc::AF_INET6 as u8, 64, &[0u8; 16], None);
        let addr = Address::parse(&buf).unwrap();
        assert!(addr.addr.is_ipv6());
        assert!(addr.label.is_none());
    }

    #[test]
    fn rejects_truncated_header() {
        assert!(Address::parse(&[0, 1, 2]).is_none());
    }
}
