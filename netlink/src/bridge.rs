//! Bridge master and VLAN-filtering operations (spec §4.4 "Bridge
//! operations"). Port VLAN membership rides the `IFLA_AF_SPEC` nest
//! the same way the teacher's `LinkAttributes` carries kind-specific
//! nests, generalized to `AF_BRIDGE`'s own attribute family.

use crate::attr::{collect, Attr};
use crate::consts::{BRIDGE_VLAN_INFO, IFLA_AF_SPEC, IFLA_BR_VLAN_FILTERING};
use crate::error::{NetlinkError, Result};
use crate::link::{Interface, LinkHandle};
use crate::message::{MessageBuilder, NLM_F_ACK};
use crate::transactor::Transactor;

#[derive(Debug, Clone, Copy)]
pub struct BridgeView {
    pub vlan_filtering: bool,
}

impl BridgeView {
    pub fn from_interface(iface: &Interface) -> Option<Self> {
        if iface.kind != "bridge" {
            return None;
        }
        let attrs = collect(&iface.info_data);
        let vlan_filtering = attrs
            .get(&IFLA_BR_VLAN_FILTERING)
            .and_then(|a| a.as_u8())
            .map(|v| v != 0)
            .unwrap_or(false);
        Some(BridgeView { vlan_filtering })
    }
}

pub fn attach(handle: &mut LinkHandle, bridge: &Interface, port_index: i32) -> Result<()> {
    if bridge.kind != "bridge" {
        return Err(NetlinkError::NotABridge(bridge.name.clone()));
    }
    handle.set_master(port_index, bridge.index)
}

pub fn detach(handle: &mut LinkHandle, port_index: i32) -> Result<()> {
    handle.set_master(port_index, 0)
}

/// Adds or removes a VLAN on a bridge port via `RTM_SETLINK` with an
/// `AF_BRIDGE` family header and an `IFLA_AF_SPEC` nest carrying a
/// `BRIDGE_VLAN_INFO` record.
pub fn set_port_vlan(tx: &mut Transactor, port_index: i32, vlan_id: u16, add: bool) -> Result<()> {
    let mut b = MessageBuilder::new(libc::RTM_SETLINK as u16, NLM_F_ACK);
    let mut hdr = crate::link::LinkHeader::new(crate::consts::AF_BRIDGE);
    hdr.index = port_index;
    b.append_struct(&hdr);

    let vlan_info = Attr::u16(BRIDGE_VLAN_INFO, vlan_id);
    let af_spec = Attr::nested(IFLA_AF_SPEC, &[vlan_info]);
    b.append_attr(&af_spec);

    let result = tx.request(b);
    match (result, add) {
        (Ok(_), _) => Ok(()),
        (Err(NetlinkError::NetlinkReply(code)), false) if -code == libc::ENOENT => Ok(()),
        (Err(e), _) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_view_defaults_filtering_off() {
        let iface = Interface { kind: "bridge".into(), ..Default::default() };
        assert!(!BridgeView::from_interface(&iface).unwrap().vlan_filtering);
    }
}
