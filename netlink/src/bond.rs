//! Bond master operations (spec §4.4 "Bond operations"). Listing reuses
//! the kind-tag dump directly per SPEC_FULL.md's open-question
//! resolution, rather than a dedicated RTM query.

use crate::attr::collect;
use crate::consts::IFLA_BOND_MODE;
use crate::error::{NetlinkError, Result};
use crate::link::{Interface, LinkHandle};

#[derive(Debug, Clone, Copy)]
pub struct BondView {
    pub mode: u8,
}

impl BondView {
    pub fn from_interface(iface: &Interface) -> Option<Self> {
        if iface.kind != "bond" {
            return None;
        }
        let attrs = collect(&iface.info_data);
        let mode = attrs.get(&IFLA_BOND_MODE)?.as_u8()?;
        Some(BondView { mode })
    }
}

/// Lists every bond master by filtering the full link dump on kind tag.
pub fn list_bonds(handle: &mut LinkHandle) -> Result<Vec<Interface>> {
    Ok(handle.list()?.into_iter().filter(|i| i.kind == "bond").collect())
}

/// Attaches `slave_index` to `bond_index` by setting `IFLA_MASTER`.
pub fn enslave(handle: &mut LinkHandle, bond: &Interface, slave_index: i32) -> Result<()> {
    if bond.kind != "bond" {
        return Err(NetlinkError::NotABond(bond.name.clone()));
    }
    handle.set_master(slave_index, bond.index)
}

pub fn release(handle: &mut LinkHandle, slave_index: i32) -> Result<()> {
    handle.set_master(slave_index, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_bond_is_rejected_for_enslave() {
        let iface = Interface { kind: "bridge".into(), name: "br0".into(), ..Default::default() };
        match BondView::from_interface(&iface) {
            None => {}
            Some(_) => panic!("expected None for non-bond kind"),
        }
    }
}
