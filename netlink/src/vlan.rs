//! Typed view over a VLAN interface's `IFLA_INFO_DATA` blob, re-parsed
//! on demand per spec §9's kind-polymorphism note — no struct field
//! stores this redundantly on `Interface`.

use crate::attr::collect;
use crate::consts::IFLA_VLAN_ID;
use crate::link::Interface;

#[derive(Debug, Clone, Copy)]
pub struct VlanView {
    pub id: u16,
}

impl VlanView {
    pub fn from_interface(iface: &Interface) -> Option<Self> {
        if iface.kind != "vlan" {
            return None;
        }
        let attrs = collect(&iface.info_data);
        let id = attrs.get(&IFLA_VLAN_ID)?.as_u16()?;
        Some(VlanView { id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::Attr;

    #[test]
    fn extracts_vlan_id_from_info_data() {
        let iface = Interface {
            kind: "vlan".into(),
            info_data: Attr::u16(IFLA_VLAN_ID, 200).serialize()[4..].to_vec(),
            ..Default::default()
        };
        assert_eq!(VlanView::from_interface(&iface).unwrap().id, 200);
    }

    #[test]
    fn wrong_kind_yields_none() {
        let iface = Interface { kind: "bridge".into(), ..Default::default() };
        assert!(VlanView::from_interface(&iface).is_none());
    }
}
