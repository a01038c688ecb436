//! Routing-policy rule operations (spec §4.4 "Rule operations"). No
//! direct teacher analog; built in the same header-plus-attrs idiom as
//! `route.rs`, keyed on `FRA_TABLE` the way iproute2's rule dump is.

use std::net::IpAddr;

use crate::attr::{collect, Attr};
use crate::consts::{FRA_DST, FRA_PRIORITY, FRA_SRC, FRA_TABLE, FR_ACT_TO_TBL};
use crate::error::{NetlinkError, Result};
use crate::ip::{addr_to_bytes, bytes_to_addr};
use crate::message::{MessageBuilder, NLM_F_ACK, NLM_F_CREATE, NLM_F_DUMP, NLM_F_EXCL};
use crate::transactor::Transactor;

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleHeader {
    pub family: u8,
    pub dst_len: u8,
    pub src_len: u8,
    pub tos: u8,
    pub table: u8,
    pub res1: u8,
    pub res2: u8,
    pub action: u8,
    pub flags: u32,
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub priority: u32,
    pub table: u32,
    pub src: Option<(IpAddr, u8)>,
    pub dst: Option<(IpAddr, u8)>,
    pub action: u8,
}

impl Rule {
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() < std::mem::size_of::<RuleHeader>() {
            return None;
        }
        let hdr_len = std::mem::size_of::<RuleHeader>();
        let raw = &payload[..hdr_len];
        let header = RuleHeader {
            family: raw[0],
            dst_len: raw[1],
            src_len: raw[2],
            tos: raw[3],
            table: raw[4],
            action: raw[7],
            flags: u32::from_ne_bytes(raw[8..12].try_into().ok()?),
            ..Default::default()
        };

        let attrs = collect(&payload[hdr_len..]);

        let priority = attrs
            .get(&(FRA_PRIORITY))
            .and_then(|a| a.as_u32())
            .unwrap_or(0);

        let table = attrs
            .get(&FRA_TABLE)
            .and_then(|a| a.as_u32())
            .unwrap_or(header.table as u32);

        let src = attrs
            .get(&(FRA_SRC))
            .and_then(|a| bytes_to_addr(a.payload).ok())
            .map(|a| (a, header.src_len));

        let dst = attrs
            .get(&(FRA_DST))
            .and_then(|a| bytes_to_addr(a.payload).ok())
            .map(|a| (a, header.dst_len));

        Some(Rule {
            priority,
            table,
            src,
            dst,
            action: header.action,
        })
    }
}

pub struct RuleHandle<'a> {
    tx: &'a mut Transactor,
}

impl<'a> RuleHandle<'a> {
    pub fn new(tx: &'a mut Transactor) -> Self {
        Self { tx }
    }

    pub fn list(&mut self, family: u8) -> Result<Vec<Rule>> {
        let mut b = MessageBuilder::new(libc::RTM_GETRULE as u16, NLM_F_DUMP);
        let mut hdr = RuleHeader::default();
        hdr.family = family;
        b.append_struct(&hdr);

        let msgs = self.tx.request(b)?;
        Ok(msgs.iter().filter_map(|m| Rule::parse(&m.payload)).collect())
    }

    pub fn add(&mut self, family: u8, priority: u32, table: u32, src: Option<(IpAddr, u8)>) -> Result<()> {
        let mut b = MessageBuilder::new(libc::RTM_NEWRULE as u16, NLM_F_CREATE | NLM_F_EXCL | NLM_F_ACK);
        let mut hdr = RuleHeader::default();
        hdr.family = family;
        hdr.action = FR_ACT_TO_TBL;
        if let Some((_, len)) = &src {
            hdr.src_len = *len;
        }
        b.append_struct(&hdr);

        b.append_attr(&Attr::u32(FRA_PRIORITY, priority));
        b.append_attr(&Attr::u32(FRA_TABLE, table));
        if let Some((addr, _)) = &src {
            b.append_attr(&Attr::new(FRA_SRC, &addr_to_bytes(addr)));
        }

        self.tx.request(b).map_err(map_err)?;
        Ok(())
    }

    pub fn delete(&mut self, family: u8, priority: u32) -> Result<()> {
        let mut b = MessageBuilder::new(libc::RTM_DELRULE as u16, NLM_F_ACK);
        let mut hdr = RuleHeader::default();
        hdr.family = family;
        b.append_struct(&hdr);
        b.append_attr(&Attr::u32(FRA_PRIORITY, priority));

        self.tx.request(b).map_err(map_err)?;
        Ok(())
    }
}

fn map_err(e: NetlinkError) -> NetlinkError {
    match e {
        NetlinkError::NetlinkReply(code) if -code == libc::ENOENT => NetlinkError::RuleNotFound,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rule_with_table_and_priority() {
        let mut buf = vec![libc::AF_INET as u8, 0, 0, 0, 254, 0, 0, FR_ACT_TO_TBL as u8];
        buf.extend_from_slice(&0u32.to_ne_bytes());
        buf.extend_from_slice(&Attr::u32(FRA_PRIORITY, 100).serialize());
        buf.extend_from_slice(&Attr::u32(FRA_TABLE, 200).serialize());

        let rule = Rule::parse(&buf).unwrap();
        assert_eq!(rule.priority, 100);
        assert_eq!(rule.table, 200);
    }
}
