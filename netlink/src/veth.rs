//! Typed view for veth peers. The peer attributes live only inside the
//! create request (`link::Kind::Veth`); once created, the kernel
//! reports each end as its own plain `Interface` linked via
//! `link_index`, so there is no info-data to re-parse here — this
//! module exists to locate a veth's peer by that link.

use crate::error::Result;
use crate::link::{Interface, LinkHandle};

pub fn find_peer(handle: &mut LinkHandle, veth: &Interface) -> Result<Option<Interface>> {
    let Some(peer_index) = veth.link_index else {
        return Ok(None);
    };
    let peers = handle.list()?;
    Ok(peers.into_iter().find(|i| i.index == peer_index && i.kind == "veth"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interface_without_link_index_has_no_peer() {
        let iface = Interface { kind: "veth".into(), ..Default::default() };
        assert!(iface.link_index.is_none());
    }
}
