//! Executor (C6, spec §4.6). Validates a command, lowers it to C4
//! object operations, and for bare listings gathers a live snapshot for
//! the analyzers. Single-threaded per spec §5 — "parallel dumps" means
//! back-to-back dump requests on one transactor, not OS threads.

use netlink::addr::AddrHandle;
use netlink::bond;
use netlink::bridge;
use netlink::ip::{parse_ip_with_prefix, parse_mac};
use netlink::link::{Kind, LinkAttrs, LinkHandle};
use netlink::neigh::NeighHandle;
use netlink::route::{NextHop, RouteHandle};
use netlink::rule::RuleHandle;
use netlink::tc::TcHandle;
use netlink::tunnel::{GreParams, VxlanParams};
use netlink::{Address, Interface, NetlinkError, Neighbor, Route, Rule, Transactor};

use crate::error::{CfgError, ExecutionError, Result};
use crate::parser::Command;
use crate::validator::validate;

/// A point-in-time view across every listable subsystem, handed to the
/// analyzers for bare listing/diagnose commands.
#[derive(Debug, Default, Clone)]
pub struct Snapshot {
    pub interfaces: Vec<Interface>,
    pub addresses: Vec<Address>,
    pub routes: Vec<Route>,
    pub neighbors: Vec<Neighbor>,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone)]
pub enum Outcome {
    /// A listing command's result, ready for an analyzer or direct
    /// display by the frontend.
    Snapshot(Snapshot),
    /// A mutating command completed without error.
    Applied,
    /// A validator warning the executor is surfacing rather than
    /// treating as fatal.
    AppliedWithWarnings(Vec<String>),
}

pub struct Executor {
    tx: Transactor,
}

impl Executor {
    pub fn new(tx: Transactor) -> Self {
        Self { tx }
    }

    pub fn snapshot(&mut self) -> Result<Snapshot> {
        let interfaces = LinkHandle::new(&mut self.tx).list().map_err(wrap)?;
        let addresses = AddrHandle::new(&mut self.tx).list(None).map_err(wrap)?;
        let routes = RouteHandle::new(&mut self.tx).list(libc::AF_UNSPEC as u8).map_err(wrap)?;
        let neighbors = NeighHandle::new(&mut self.tx).list(libc::AF_UNSPEC as u8).map_err(wrap)?;
        let rules = RuleHandle::new(&mut self.tx).list(libc::AF_UNSPEC as u8).map_err(wrap)?;

        Ok(Snapshot { interfaces, addresses, routes, neighbors, rules })
    }

    /// Validates then executes one command.
    pub fn run(&mut self, cmd: &Command) -> Result<Outcome> {
        let warnings = validate(cmd).map_err(CfgError::from)?;

        if cmd.verb == "show" {
            return Ok(Outcome::Snapshot(self.snapshot()?));
        }

        self.dispatch(cmd)?;

        if warnings.is_empty() {
            Ok(Outcome::Applied)
        } else {
            Ok(Outcome::AppliedWithWarnings(warnings))
        }
    }

    fn dispatch(&mut self, cmd: &Command) -> Result<()> {
        match cmd.subject.as_str() {
            "interface" => self.exec_interface(cmd),
            "route" => self.exec_route(cmd),
            "bond" => self.exec_bond(cmd),
            "bridge" => self.exec_bridge(cmd),
            "vlan" => self.exec_vlan(cmd),
            "veth" => self.exec_veth(cmd),
            "neighbor" => self.exec_neighbor(cmd),
            "tc" => self.exec_tc(cmd),
            "tunnel" => self.exec_tunnel(cmd),
            "namespace" => self.exec_namespace(cmd),
            _ => Ok(()),
        }
    }

    fn resolve(&mut self, name: &str) -> Result<Interface> {
        LinkHandle::new(&mut self.tx)
            .get(&LinkAttrs::named(name))
            .map_err(wrap)
    }

    fn exec_interface(&mut self, cmd: &Command) -> Result<()> {
        let name = cmd.name.as_deref().unwrap_or_default();

        if cmd.verb == "create" {
            return LinkHandle::new(&mut self.tx)
                .create(&LinkAttrs::named(name), &Kind::Plain)
                .map_err(wrap);
        }

        let iface = self.resolve(name)?;

        match cmd.verb.as_str() {
            "set" => {
                if let Some(state) = cmd.attr("state") {
                    LinkHandle::new(&mut self.tx).set_up(iface.index, state == "up").map_err(wrap)?;
                }
                if let Some(mtu) = cmd.attr("mtu") {
                    LinkHandle::new(&mut self.tx).set_mtu(iface.index, mtu.parse().unwrap_or(0)).map_err(wrap)?;
                }
                if let Some(master) = cmd.attr("master") {
                    let master_iface = self.resolve(master)?;
                    LinkHandle::new(&mut self.tx).set_master(iface.index, master_iface.index).map_err(wrap)?;
                }
                Ok(())
            }
            "add" => {
                if let Some(addr) = cmd.attr("address") {
                    let (parsed, prefix) = parse_ip_with_prefix(addr, None)
                        .map_err(ExecutionError::Netlink)?;
                    AddrHandle::new(&mut self.tx).add(iface.index, parsed, prefix).map_err(wrap)?;
                }
                Ok(())
            }
            "del" => {
                if let Some(addr) = cmd.attr("address") {
                    let (parsed, prefix) = parse_ip_with_prefix(addr, None)
                        .map_err(ExecutionError::Netlink)?;
                    AddrHandle::new(&mut self.tx).delete(iface.index, parsed, prefix).map_err(wrap)?;
                } else {
                    LinkHandle::new(&mut self.tx).delete(iface.index).map_err(wrap)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn exec_route(&mut self, cmd: &Command) -> Result<()> {
        let dst = cmd
            .attr("to")
            .map(|t| parse_ip_with_prefix(t, None))
            .transpose()
            .map_err(ExecutionError::Netlink)?;

        match cmd.verb.as_str() {
            "add" | "create" => {
                let index = match cmd.attr("dev") {
                    Some(dev) => self.resolve(dev)?.index,
                    None => 0,
                };
                let gateway = cmd
                    .attr("via")
                    .map(|v| parse_ip_with_prefix(v, Some(32)).map(|(a, _)| a))
                    .transpose()
                    .map_err(ExecutionError::Netlink)?;
                let priority = cmd.attr("metric").and_then(|m| m.parse().ok());

                let hop = NextHop { gateway, index, weight: 0 };
                RouteHandle::new(&mut self.tx).add(dst, &[hop], priority).map_err(wrap)
            }
            "del" | "delete" => {
                let (addr, prefix) = dst.ok_or_else(|| {
                    CfgError::from(crate::error::ValidationError::MissingRouteDestination)
                })?;
                RouteHandle::new(&mut self.tx).delete((addr, prefix)).map_err(wrap)
            }
            _ => Ok(()),
        }
    }

    fn exec_bond(&mut self, cmd: &Command) -> Result<()> {
        let name = cmd.name.as_deref().unwrap_or_default();
        match cmd.verb.as_str() {
            "create" => LinkHandle::new(&mut self.tx)
                .create(&LinkAttrs::named(name), &Kind::Bond)
                .map_err(wrap),
            "add" => {
                let bond_iface = self.resolve(name)?;
                if let Some(members) = cmd.attr("members") {
                    for member in members.split(',') {
                        let slave = self.resolve(member)?;
                        bond::enslave(&mut LinkHandle::new(&mut self.tx), &bond_iface, slave.index)
                            .map_err(wrap)?;
                    }
                }
                Ok(())
            }
            "del" | "delete" => {
                let index = self.resolve(name)?.index;
                LinkHandle::new(&mut self.tx).delete(index).map_err(wrap)
            }
            _ => Ok(()),
        }
    }

    fn exec_bridge(&mut self, cmd: &Command) -> Result<()> {
        let name = cmd.name.as_deref().unwrap_or_default();
        match cmd.verb.as_str() {
            "create" => LinkHandle::new(&mut self.tx)
                .create(&LinkAttrs::named(name), &Kind::Bridge)
                .map_err(wrap),
            "add" => {
                let bridge_iface = self.resolve(name)?;
                if let Some(dev) = cmd.attr("dev") {
                    let port = self.resolve(dev)?;
                    bridge::attach(&mut LinkHandle::new(&mut self.tx), &bridge_iface, port.index)
                        .map_err(wrap)?;
                }
                Ok(())
            }
            "del" | "delete" => {
                let index = self.resolve(name)?.index;
                LinkHandle::new(&mut self.tx).delete(index).map_err(wrap)
            }
            _ => Ok(()),
        }
    }

    fn exec_vlan(&mut self, cmd: &Command) -> Result<()> {
        match cmd.verb.as_str() {
            "create" => {
                let id: u16 = cmd.attr("id").and_then(|s| s.parse().ok()).unwrap_or(0);
                let dev = cmd.attr("dev").unwrap_or_default();
                let link_index = if dev.is_empty() { 0 } else { self.resolve(dev)?.index };
                // `vlan <id> on <dev>` (spec §8.5) carries no explicit name;
                // synthesize the conventional "<dev>.<id>" IFNAME.
                let name = cmd.name.clone().unwrap_or_else(|| format!("{dev}.{id}"));
                LinkHandle::new(&mut self.tx)
                    .create(&LinkAttrs::named(&name), &Kind::Vlan { id, link_index })
                    .map_err(wrap)
            }
            "del" | "delete" => {
                let name = cmd.name.as_deref().unwrap_or_default();
                let index = self.resolve(name)?.index;
                LinkHandle::new(&mut self.tx).delete(index).map_err(wrap)
            }
            _ => Ok(()),
        }
    }

    fn exec_veth(&mut self, cmd: &Command) -> Result<()> {
        let name = cmd.name.as_deref().unwrap_or_default();
        match cmd.verb.as_str() {
            "create" => {
                let peer_name = cmd.attr("peer").unwrap_or_default().to_string();
                LinkHandle::new(&mut self.tx)
                    .create(
                        &LinkAttrs::named(name),
                        &Kind::Veth { peer_name, peer_hw_addr: None },
                    )
                    .map_err(wrap)
            }
            "del" | "delete" => {
                let index = self.resolve(name)?.index;
                LinkHandle::new(&mut self.tx).delete(index).map_err(wrap)
            }
            _ => Ok(()),
        }
    }

    fn exec_neighbor(&mut self, cmd: &Command) -> Result<()> {
        let dev = cmd.name.as_deref().unwrap_or_default();
        let iface = self.resolve(dev)?;

        match cmd.verb.as_str() {
            "add" => {
                let dst = cmd
                    .positional
                    .first()
                    .map(|s| parse_ip_with_prefix(s, Some(32)).map(|(a, _)| a))
                    .transpose()
                    .map_err(ExecutionError::Netlink)?
                    .ok_or(ExecutionError::VerificationFailed("missing neighbor address".into()))?;
                let mac = cmd
                    .attr("with")
                    .map(parse_mac)
                    .transpose()
                    .map_err(ExecutionError::Netlink)?
                    .unwrap_or_default();

                NeighHandle::new(&mut self.tx)
                    .add(iface.index, dst, &mac, netlink::consts::NUD_PERMANENT)
                    .map_err(wrap)
            }
            "del" | "delete" => {
                let dst = cmd
                    .positional
                    .first()
                    .map(|s| parse_ip_with_prefix(s, Some(32)).map(|(a, _)| a))
                    .transpose()
                    .map_err(ExecutionError::Netlink)?
                    .ok_or(ExecutionError::VerificationFailed("missing neighbor address".into()))?;
                NeighHandle::new(&mut self.tx).delete(iface.index, dst).map_err(wrap)
            }
            _ => Ok(()),
        }
    }

    fn exec_tc(&mut self, cmd: &Command) -> Result<()> {
        let dev = cmd.name.as_deref().unwrap_or_default();
        let iface = self.resolve(dev)?;
        match cmd.verb.as_str() {
            "add" | "create" => TcHandle::new(&mut self.tx)
                .add_root_qdisc(iface.index, "fq_codel", &netlink::tc::QdiscParams::FqCodel)
                .map_err(wrap),
            "del" | "delete" => TcHandle::new(&mut self.tx)
                .delete_qdisc(iface.index, netlink::tc::make_handle(1, 0))
                .map_err(wrap),
            _ => Ok(()),
        }
    }

    fn exec_tunnel(&mut self, cmd: &Command) -> Result<()> {
        let name = cmd.name.as_deref().unwrap_or_default();
        match cmd.verb.as_str() {
            "create" => {
                let local = cmd
                    .attr("from")
                    .map(|s| parse_ip_with_prefix(s, Some(32)).map(|(a, _)| a))
                    .transpose()
                    .map_err(ExecutionError::Netlink)?;
                let remote = cmd
                    .attr("to")
                    .map(|s| parse_ip_with_prefix(s, Some(32)).map(|(a, _)| a))
                    .transpose()
                    .map_err(ExecutionError::Netlink)?;

                let kind = if let Some(dev) = cmd.attr("on") {
                    let link_index = self.resolve(dev)?.index;
                    Kind::Vxlan(VxlanParams {
                        vni: 1,
                        link_index: Some(link_index),
                        local,
                        group: remote,
                        ..Default::default()
                    })
                } else {
                    Kind::Gre(GreParams { local, remote, ttl: Some(64) })
                };

                LinkHandle::new(&mut self.tx).create(&LinkAttrs::named(name), &kind).map_err(wrap)
            }
            "del" | "delete" => {
                let index = self.resolve(name)?.index;
                LinkHandle::new(&mut self.tx).delete(index).map_err(wrap)
            }
            _ => Ok(()),
        }
    }

    fn exec_namespace(&mut self, cmd: &Command) -> Result<()> {
        let name = cmd.name.as_deref().unwrap_or_default();
        match cmd.verb.as_str() {
            "create" => netlink::netns::create(name).map_err(wrap),
            "del" | "delete" => netlink::netns::delete(name).map_err(wrap),
            _ => Ok(()),
        }
    }
}

fn wrap(e: NetlinkError) -> CfgError {
    CfgError::from(ExecutionError::from(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_defaults_are_empty() {
        let snap = Snapshot::default();
        assert!(snap.interfaces.is_empty());
        assert!(snap.routes.is_empty());
    }
}
