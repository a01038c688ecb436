//! Tunnel (vxlan/gre/gretap) creation parameters, attached to
//! `link::Kind`. Grounded on the teacher's `route::link::LinkAttributes`
//! builder approach, generalized to the kind-specific payloads spec §9
//! calls for.

use std::net::IpAddr;

use crate::attr::Attr;
use crate::consts::{
    IFLA_GRE_LOCAL, IFLA_GRE_REMOTE, IFLA_GRE_TTL, IFLA_VXLAN_GROUP, IFLA_VXLAN_GROUP6,
    IFLA_VXLAN_ID, IFLA_VXLAN_LEARNING, IFLA_VXLAN_LINK, IFLA_VXLAN_LOCAL, IFLA_VXLAN_LOCAL6,
    IFLA_VXLAN_PORT, IFLA_VXLAN_TOS, IFLA_VXLAN_TTL,
};
use crate::ip::addr_to_bytes;

#[derive(Debug, Clone, Default)]
pub struct VxlanParams {
    pub vni: u32,
    pub link_index: Option<i32>,
    pub local: Option<IpAddr>,
    pub group: Option<IpAddr>,
    pub port: Option<u16>,
    pub ttl: Option<u8>,
    pub tos: Option<u8>,
    pub learning: bool,
}

impl VxlanParams {
    pub fn to_attrs(&self) -> Vec<Attr> {
        let mut attrs = vec![Attr::u32(IFLA_VXLAN_ID, self.vni)];

        if let Some(idx) = self.link_index {
            attrs.push(Attr::i32(IFLA_VXLAN_LINK, idx));
        }
        if let Some(local) = &self.local {
            let kind = if local.is_ipv4() { IFLA_VXLAN_LOCAL } else { IFLA_VXLAN_LOCAL6 };
            attrs.push(Attr::new(kind, &addr_to_bytes(local)));
        }
        if let Some(group) = &self.group {
            let kind = if group.is_ipv4() { IFLA_VXLAN_GROUP } else { IFLA_VXLAN_GROUP6 };
            attrs.push(Attr::new(kind, &addr_to_bytes(group)));
        }
        if let Some(port) = self.port {
            // vxlan port is carried big-endian, matching the UDP port it
            // configures on the wire.
            attrs.push(Attr::new(IFLA_VXLAN_PORT, &port.to_be_bytes()));
        }
        if let Some(ttl) = self.ttl {
            attrs.push(Attr::u8(IFLA_VXLAN_TTL, ttl));
        }
        if let Some(tos) = self.tos {
            attrs.push(Attr::u8(IFLA_VXLAN_TOS, tos));
        }
        attrs.push(Attr::u8(IFLA_VXLAN_LEARNING, self.learning as u8));

        attrs
    }
}

#[derive(Debug, Clone, Default)]
pub struct GreParams {
    pub local: Option<IpAddr>,
    pub remote: Option<IpAddr>,
    pub ttl: Option<u8>,
}

impl GreParams {
    pub fn to_attrs(&self) -> Vec<Attr> {
        let mut attrs = Vec::new();
        if let Some(local) = &self.local {
            attrs.push(Attr::new(IFLA_GRE_LOCAL, &addr_to_bytes(local)));
        }
        if let Some(remote) = &self.remote {
            attrs.push(Attr::new(IFLA_GRE_REMOTE, &addr_to_bytes(remote)));
        }
        if let Some(ttl) = self.ttl {
            attrs.push(Attr::u8(IFLA_GRE_TTL, ttl));
        }
        attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vxlan_params_always_carry_vni() {
        let p = VxlanParams { vni: 42, ..Default::default() };
        let attrs = p.to_attrs();
        assert!(attrs.iter().any(|a| a.kind == IFLA_VXLAN_ID));
    }

    #[test]
    fn vxlan_port_is_big_endian() {
        let p = VxlanParams { vni: 1, port: Some(4789), ..Default::default() };
        let attr = p.to_attrs().into_iter().find(|a| a.kind == IFLA_VXLAN_PORT).unwrap();
        assert_eq!(attr.serialize()[4..6], 4789u16.to_be_bytes());
    }

    #[test]
    fn gre_params_with_no_fields_is_empty() {
        assert!(GreParams::default().to_attrs().is_empty());
    }
}
