//! Route operations (spec §4.4 "Route operations"), including ECMP
//! multipath. Grounded on `rsln/src/handle/routing.rs`'s `RouteHandle`
//! and `netlink/src/route/routing.rs`'s attribute layout.

use std::net::IpAddr;

use crate::attr::{collect, Attr, ParsedAttr};
use crate::consts::RTA_MULTIPATH;
use crate::error::{NetlinkError, Result};
use crate::ip::{addr_to_bytes, bytes_to_addr};
use crate::message::{MessageBuilder, NLM_F_ACK, NLM_F_CREATE, NLM_F_DUMP, NLM_F_EXCL, NLM_F_REPLACE};
use crate::transactor::Transactor;

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct RouteHeader {
    pub family: u8,
    pub dst_len: u8,
    pub src_len: u8,
    pub tos: u8,
    pub table: u8,
    pub protocol: u8,
    pub scope: u8,
    pub route_type: u8,
    pub flags: u32,
}

/// One next hop of an ECMP route (spec §3 Route.next_hops).
#[derive(Debug, Clone)]
pub struct NextHop {
    pub gateway: Option<IpAddr>,
    pub index: i32,
    pub weight: u8,
}

#[derive(Debug, Clone)]
pub struct Route {
    pub dst: Option<(IpAddr, u8)>,
    pub src: Option<IpAddr>,
    pub gateway: Option<IpAddr>,
    pub out_index: Option<i32>,
    pub table: u32,
    pub protocol: u8,
    pub scope: u8,
    pub route_type: u8,
    pub priority: Option<u32>,
    pub next_hops: Vec<NextHop>,
}

impl Route {
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() < std::mem::size_of::<RouteHeader>() {
            return None;
        }
        let hdr_len = std::mem::size_of::<RouteHeader>();
        let raw = &payload[..hdr_len];
        let header = RouteHeader {
            family: raw[0],
            dst_len: raw[1],
            src_len: raw[2],
            tos: raw[3],
            table: raw[4],
            protocol: raw[5],
            scope: raw[6],
            route_type: raw[7],
            flags: u32::from_ne_bytes(raw[8..12].try_into().ok()?),
        };

        let attrs = collect(&payload[hdr_len..]);

        let dst = attrs
            .get(&(libc::RTA_DST as u16))
            .and_then(|a| bytes_to_addr(a.payload).ok())
            .map(|a| (a, header.dst_len));

        let src = attrs
            .get(&(libc::RTA_SRC as u16))
            .and_then(|a| bytes_to_addr(a.payload).ok());

        let gateway = attrs
            .get(&(libc::RTA_GATEWAY as u16))
            .and_then(|a| bytes_to_addr(a.payload).ok());

        let out_index = attrs.get(&(libc::RTA_OIF as u16)).and_then(|a| a.as_i32());

        let priority = attrs.get(&(libc::RTA_PRIORITY as u16)).and_then(|a| a.as_u32());

        let table = attrs
            .get(&(libc::RTA_TABLE as u16))
            .and_then(|a| a.as_u32())
            .unwrap_or(header.table as u32);

        let next_hops = attrs
            .get(&RTA_MULTIPATH)
            .map(|a| parse_multipath(a.payload))
            .unwrap_or_default();

        Some(Route {
            dst,
            src,
            gateway,
            out_index,
            table,
            protocol: header.protocol,
            scope: header.scope,
            route_type: header.route_type,
            priority,
            next_hops,
        })
    }

    pub fn is_default(&self) -> bool {
        self.dst.is_none()
    }
}

/// `rtnexthop` records: a fixed 8-byte header (len, flags, hops, ifindex)
/// followed by that hop's own attribute list, repeated back to back.
fn parse_multipath(buf: &[u8]) -> Vec<NextHop> {
    let mut hops = Vec::new();
    let mut rest = buf;

    while rest.len() >= 8 {
        let len = u16::from_ne_bytes(rest[0..2].try_into().unwrap()) as usize;
        if len < 8 || len > rest.len() {
            break;
        }
        let hops_field = rest[2];
        let index = i32::from_ne_bytes(rest[4..8].try_into().unwrap());
        let attr_buf = &rest[8..len];
        let attrs = collect(attr_buf);
        let gateway = attrs
            .get(&(libc::RTA_GATEWAY as u16))
            .and_then(|a: &ParsedAttr| bytes_to_addr(a.payload).ok());

        hops.push(NextHop {
            gateway,
            index,
            weight: hops_field,
        });

        rest = &rest[len..];
    }

    hops
}

fn serialize_multipath(hops: &[NextHop]) -> Vec<u8> {
    let mut buf = Vec::new();
    for hop in hops {
        let mut hop_attrs = Vec::new();
        if let Some(gw) = &hop.gateway {
            hop_attrs.extend_from_slice(
                &Attr::new(libc::RTA_GATEWAY as u16, &addr_to_bytes(gw)).serialize(),
            );
        }
        let rec_len = 8 + hop_attrs.len();
        buf.extend_from_slice(&(rec_len as u16).to_ne_bytes());
        buf.push(hop.weight);
        buf.push(0);
        buf.extend_from_slice(&hop.index.to_ne_bytes());
        buf.extend_from_slice(&hop_attrs);
    }
    buf
}

pub struct RouteHandle<'a> {
    tx: &'a mut Transactor,
}

impl<'a> RouteHandle<'a> {
    pub fn new(tx: &'a mut Transactor) -> Self {
        Self { tx }
    }

    /// Dumps the route table, keeping only the tables callers actually
    /// care about (spec §4.4 Route List: "skip routes whose table is
    /// neither MAIN nor DEFAULT").
    pub fn list(&mut self, family: u8) -> Result<Vec<Route>> {
        let mut b = MessageBuilder::new(libc::RTM_GETROUTE as u16, NLM_F_DUMP);
        let mut hdr = RouteHeader::default();
        hdr.family = family;
        b.append_struct(&hdr);

        let msgs = self.tx.request(b)?;
        Ok(msgs
            .iter()
            .filter_map(|m| Route::parse(&m.payload))
            .filter(|r| r.table == libc::RT_TABLE_MAIN as u32 || r.table == libc::RT_TABLE_DEFAULT as u32)
            .collect())
    }

    /// Adds a route. A single next hop is carried as plain RTA_GATEWAY /
    /// RTA_OIF; more than one is carried as RTA_MULTIPATH, per spec §4.4
    /// ECMP note.
    pub fn add(&mut self, dst: Option<(IpAddr, u8)>, next_hops: &[NextHop], priority: Option<u32>) -> Result<()> {
        self.upsert(dst, next_hops, priority, NLM_F_CREATE | NLM_F_EXCL | NLM_F_ACK)
    }

    pub fn replace(&mut self, dst: Option<(IpAddr, u8)>, next_hops: &[NextHop], priority: Option<u32>) -> Result<()> {
        self.upsert(dst, next_hops, priority, NLM_F_CREATE | NLM_F_REPLACE | NLM_F_ACK)
    }

    fn upsert(
        &mut self,
        dst: Option<(IpAddr, u8)>,
        next_hops: &[NextHop],
        priority: Option<u32>,
        flags: u16,
    ) -> Result<()> {
        if next_hops.is_empty() {
            return Err(NetlinkError::Malformed("route must have at least one next hop"));
        }

        let mut b = MessageBuilder::new(libc::RTM_NEWROUTE as u16, flags);

        let mut hdr = RouteHeader {
            protocol: libc::RTPROT_STATIC,
            scope: route_scope(next_hops),
            route_type: libc::RTN_UNICAST,
            table: libc::RT_TABLE_MAIN as u8,
            ..Default::default()
        };

        match &dst {
            Some((addr, prefix_len)) => {
                hdr.family = family_of(addr);
                hdr.dst_len = *prefix_len;
            }
            None => hdr.family = libc::AF_INET as u8,
        }
        b.append_struct(&hdr);

        if let Some((addr, _)) = &dst {
            b.append_attr(&Attr::new(libc::RTA_DST as u16, &addr_to_bytes(addr)));
        }

        match next_hops {
            [single] => {
                if let Some(gw) = &single.gateway {
                    b.append_attr(&Attr::new(libc::RTA_GATEWAY as u16, &addr_to_bytes(gw)));
                }
                b.append_attr(&Attr::i32(libc::RTA_OIF as u16, single.index));
            }
            many => {
                let payload = serialize_multipath(many);
                b.append_attr(&Attr::new(RTA_MULTIPATH, &payload));
            }
        }

        if let Some(metric) = priority {
            b.append_attr(&Attr::u32(libc::RTA_PRIORITY as u16, metric));
        }

        self.tx.request(b).map_err(map_err)?;
        Ok(())
    }

    pub fn delete(&mut self, dst: (IpAddr, u8)) -> Result<()> {
        let mut b = MessageBuilder::new(libc::RTM_DELROUTE as u16, NLM_F_ACK);
        let mut hdr = RouteHeader::default();
        hdr.family = family_of(&dst.0);
        hdr.dst_len = dst.1;
        b.append_struct(&hdr);
        b.append_attr(&Attr::new(libc::RTA_DST as u16, &addr_to_bytes(&dst.0)));

        self.tx.request(b).map_err(map_err)?;
        Ok(())
    }
}

/// Spec §4.4 Route Add: UNIVERSE when a gateway is present, LINK for a
/// bare device route.
fn route_scope(next_hops: &[NextHop]) -> u8 {
    if next_hops.iter().any(|h| h.gateway.is_some()) {
        libc::RT_SCOPE_UNIVERSE
    } else {
        libc::RT_SCOPE_LINK
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
        NetlinkError::NetlinkReply(code) if -code == libc::ESRCH => NetlinkError::RouteNotFound,
        NetlinkError::NetlinkReply(code) if -code == libc::EEXIST => {
            NetlinkError::AlreadyExists { kind: "route" }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_route_record() -> Vec<u8> {
        let mut buf = vec![libc::AF_INET as u8, 0, 0, 0, libc::RT_TABLE_MAIN as u8, libc::RTPROT_STATIC, libc::RT_SCOPE_UNIVERSE, libc::RTN_UNICAST];
        buf.extend_from_slice(&0u32.to_ne_bytes());
        buf.extend_from_slice(&Attr::new(libc::RTA_GATEWAY as u16, &[192, 168, 1, 1]).serialize());
        buf.extend_from_slice(&Attr::i32(libc::RTA_OIF as u16, 2).serialize());
        buf
    }

    #[test]
    fn parses_default_route() {
        let route = Route::parse(&default_route_record()).unwrap();
        assert!(route.is_default());
        assert_eq!(route.gateway.unwrap().to_string(), "192.168.1.1");
        assert_eq!(route.out_index, Some(2));
    }

    #[test]
    fn multipath_round_trips() {
        let hops = vec![
            NextHop { gateway: Some("10.0.0.1".parse().unwrap()), index: 2, weight: 0 },
            NextHop { gateway: Some("10.0.0.2".parse().unwrap()), index: 3, weight: 1 },
        ];
        let bytes = serialize_multipath(&hops);
        let parsed = parse_multipath(&bytes);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].index, 2);
        assert_eq!(parsed[1].weight, 1);
    }

    #[test]
    fn scope_is_universe_when_gateway_present() {
        let hops = vec![NextHop { gateway: Some("10.0.0.254".parse().unwrap()), index: 0, weight: 0 }];
        assert_eq!(route_scope(&hops), libc::RT_SCOPE_UNIVERSE);
    }

    #[test]
    fn scope_is_link_for_dev_only_route() {
        let hops = vec![NextHop { gateway: None, index: 2, weight: 0 }];
        assert_eq!(route_scope(&hops), libc::RT_SCOPE_LINK);
    }

    #[test]
    fn list_keeps_only_main_and_default_tables() {
        let mut main = default_route_record();
        main[4] = libc::RT_TABLE_MAIN as u8;
        let mut other = default_route_record();
        other[4] = 200;

        let kept = Route::parse(&main).filter(|r| r.table == libc::RT_TABLE_MAIN as u32 || r.table == libc::RT_TABLE_DEFAULT as u32);
        let dropped = Route::parse(&other).filter(|r| r.table == libc::RT_TABLE_MAIN as u32 || r.table == libc::RT_TABLE_DEFAULT as u32);
        assert!(kept.is_some());
        assert!(dropped.is_none());
    }
}
