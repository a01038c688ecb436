//! Neighbor table and bridge FDB operations (spec §4.4 "Neighbor
//! operations" / "FDB operations"). Grounded on
//! `netlink/src/route/neigh.rs`'s `Neigh` struct; the bridge FDB variant
//! reuses the same wire struct with `AF_BRIDGE` family per that file's
//! own handling.

use crate::attr::{collect, Attr};
use crate::consts::{AF_BRIDGE, NTF_SELF, NUD_PERMANENT, NUD_REACHABLE, NUD_STALE};
use crate::error::{NetlinkError, Result};
use crate::ip::bytes_to_addr;
use crate::message::{MessageBuilder, NLM_F_ACK, NLM_F_CREATE, NLM_F_DUMP, NLM_F_EXCL, NLM_F_REPLACE};
use crate::transactor::Transactor;
use std::net::IpAddr;

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct NeighHeader {
    pub family: u8,
    pub _pad1: u8,
    pub _pad2: u16,
    pub index: i32,
    pub state: u16,
    pub flags: u8,
    pub neigh_type: u8,
}

#[derive(Debug, Clone)]
pub struct Neighbor {
    pub index: i32,
    pub family: u8,
    pub dst: Option<IpAddr>,
    pub lladdr: Option<Vec<u8>>,
    pub state: u16,
    pub is_bridge_fdb: bool,
}

impl Neighbor {
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() < std::mem::size_of::<NeighHeader>() {
            return None;
        }
        let hdr_len = std::mem::size_of::<NeighHeader>();
        let raw = &payload[..hdr_len];
        let header = NeighHeader {
            family: raw[0],
            index: i32::from_ne_bytes(raw[4..8].try_into().ok()?),
            state: u16::from_ne_bytes(raw[8..10].try_into().ok()?),
            flags: raw[10],
            neigh_type: raw[11],
            ..Default::default()
        };

        let attrs = collect(&payload[hdr_len..]);

        let dst = attrs
            .get(&(libc::NDA_DST as u16))
            .and_then(|a| bytes_to_addr(a.payload).ok());

        let lladdr = attrs
            .get(&(libc::NDA_LLADDR as u16))
            .map(|a| a.payload.to_vec());

        Some(Neighbor {
            index: header.index,
            family: header.family,
            dst,
            lladdr,
            state: header.state,
            is_bridge_fdb: header.family == AF_BRIDGE,
        })
    }

    pub fn is_reachable(&self) -> bool {
        self.state & NUD_REACHABLE != 0
    }

    pub fn is_permanent(&self) -> bool {
        self.state & NUD_PERMANENT != 0
    }

    pub fn is_stale(&self) -> bool {
        self.state & NUD_STALE != 0
    }
}

pub struct NeighHandle<'a> {
    tx: &'a mut Transactor,
}

impl<'a> NeighHandle<'a> {
    pub fn new(tx: &'a mut Transactor) -> Self {
        Self { tx }
    }

    pub fn list(&mut self, family: u8) -> Result<Vec<Neighbor>> {
        let mut b = MessageBuilder::new(libc::RTM_GETNEIGH as u16, NLM_F_DUMP);
        let mut hdr = NeighHeader::default();
        hdr.family = family;
        b.append_struct(&hdr);

        let msgs = self.tx.request(b)?;
        Ok(msgs.iter().filter_map(|m| Neighbor::parse(&m.payload)).collect())
    }

    /// Adds or replaces a neighbor (ARP/NDP) entry.
    pub fn add(&mut self, index: i32, dst: IpAddr, lladdr: &[u8], state: u16) -> Result<()> {
        let mut b = MessageBuilder::new(
            libc::RTM_NEWNEIGH as u16,
            NLM_F_CREATE | NLM_F_REPLACE | NLM_F_ACK,
        );
        let mut hdr = NeighHeader::default();
        hdr.family = family_of(&dst);
        hdr.index = index;
        hdr.state = state;
        b.append_struct(&hdr);

        b.append_attr(&Attr::new(libc::NDA_DST as u16, &crate::ip::addr_to_bytes(&dst)));
        if !lladdr.is_empty() {
            b.append_attr(&Attr::new(libc::NDA_LLADDR as u16, lladdr));
        }

        self.tx.request(b).map_err(map_err)?;
        Ok(())
    }

    pub fn delete(&mut self, index: i32, dst: IpAddr) -> Result<()> {
        let mut b = MessageBuilder::new(libc::RTM_DELNEIGH as u16, NLM_F_ACK);
        let mut hdr = NeighHeader::default();
        hdr.family = family_of(&dst);
        hdr.index = index;
        b.append_struct(&hdr);
        b.append_attr(&Attr::new(libc::NDA_DST as u16, &crate::ip::addr_to_bytes(&dst)));

        self.tx.request(b).map_err(map_err)?;
        Ok(())
    }

    /// Adds a bridge FDB entry: an `AF_BRIDGE`-family neighbor record
    /// keyed by MAC with `NTF_SELF` set, per spec §4.4 "FDB operations".
    pub fn fdb_add(&mut self, index: i32, mac: [u8; 6], dst: Option<IpAddr>) -> Result<()> {
        let mut b = MessageBuilder::new(
            libc::RTM_NEWNEIGH as u16,
            NLM_F_CREATE | NLM_F_REPLACE | NLM_F_ACK,
        );
        let mut hdr = NeighHeader::default();
        hdr.family = AF_BRIDGE;
        hdr.index = index;
        hdr.flags = NTF_SELF;
        hdr.state = NUD_PERMANENT;
        b.append_struct(&hdr);

        b.append_attr(&Attr::new(libc::NDA_LLADDR as u16, &mac));
        if let Some(d) = dst {
            b.append_attr(&Attr::new(libc::NDA_DST as u16, &crate::ip::addr_to_bytes(&d)));
        }

        self.tx.request(b).map_err(map_err)?;
        Ok(())
    }

    pub fn fdb_delete(&mut self, index: i32, mac: [u8; 6]) -> Result<()> {
        let mut b = MessageBuilder::new(libc::RTM_DELNEIGH as u16, NLM_F_ACK);
        let mut hdr = NeighHeader::default();
        hdr.family = AF_BRIDGE;
        hdr.index = index;
        hdr.flags = NTF_SELF;
        b.append_struct(&hdr);
        b.append_attr(&Attr::new(libc::NDA_LLADDR as u16, &mac));

        self.tx.request(b).map_err(map_err)?;
        Ok(())
    }
}

fn family_of(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => libc::AF_INET as u8,
        IpAddr::V6(_) => libc::AF_INET6 as u8,
    }
}

fn map_err(e: NetlinkError) -> NetlinkError {
    match e {
        NetlinkError::NetlinkReply(code) if -code == libc::ENOENT => NetlinkError::NeighborNotFound,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reachable_ipv4_neighbor() {
        let mut buf = vec![libc::AF_INET as u8, 0, 0, 0];
        buf.extend_from_slice(&3i32.to_ne_bytes());
        buf.extend_from_slice(&NUD_REACHABLE.to_ne_bytes());
        buf.push(0);
        buf.push(0);
        buf.extend_from_slice(&Attr::new(libc::NDA_DST as u16, &[10, 0, 0, 2]).serialize());
        buf.extend_from_slice(&Attr::new(libc::NDA_LLADDR as u16, &[0, 1, 2, 3, 4, 5]).serialize());

        let n = Neighbor::parse(&buf).unwrap();
        assert!(n.is_reachable());
        assert!(!n.is_bridge_fdb);
        assert_eq!(n.dst.unwrap().to_string(), "10.0.0.2");
    }

    #[test]
    fn bridge_family_marks_fdb_entry() {
        let mut buf = vec![AF_BRIDGE, 0, 0, 0];
        buf.extend_from_slice(&3i32.to_ne_bytes());
        buf.extend_from_slice(&0u16.to_ne_bytes());
        buf.push(NTF_SELF);
        buf.push(0);

        let n = Neighbor::parse(&buf).unwrap();
        assert!(n.is_bridge_fdb);
    }
}
