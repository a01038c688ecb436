//! Analyzers (C7, spec §4.7). Pure functions over a `Snapshot`,
//! producing the two labelled reports spec.md describes; no netlink
//! I/O happens here.

use std::collections::HashMap;
use std::fs;
use std::net::IpAddr;

use netlink::bond::BondView;
use netlink::bridge::BridgeView;
use netlink::vlan::VlanView;

use crate::executor::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone)]
pub struct Record {
    pub status_label: String,
    pub message: String,
    pub recommendation: Option<String>,
}

fn record(status: impl ToString, message: impl Into<String>, rec: Option<&str>) -> Record {
    Record {
        status_label: status.to_string(),
        message: message.into(),
        recommendation: rec.map(str::to_string),
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Ok => "ok",
            Status::Warning => "warning",
            Status::Error => "error",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for Health {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Health::Healthy => "healthy",
            Health::Degraded => "degraded",
            Health::Unhealthy => "unhealthy",
        };
        write!(f, "{s}")
    }
}

fn is_routable(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => !v4.is_loopback() && !v4.octets().starts_with(&[169, 254]),
        IpAddr::V6(v6) => {
            !v6.is_loopback() && (v6.segments()[0] & 0xffc0) != 0xfe80
        }
    }
}

fn nameserver_count(path: &str) -> usize {
    fs::read_to_string(path)
        .map(|contents| {
            contents
                .lines()
                .filter(|l| l.trim_start().starts_with("nameserver"))
                .count()
        })
        .unwrap_or(0)
}

/// Connectivity report: default gateway, DNS, carrier, routable address.
pub fn connectivity(snapshot: &Snapshot) -> Vec<Record> {
    let mut records = Vec::new();

    let has_default_gateway = snapshot.routes.iter().any(|r| r.is_default() && r.gateway.is_some());
    records.push(if has_default_gateway {
        record(Status::Ok, "default gateway present", None)
    } else {
        record(
            Status::Error,
            "no default gateway",
            Some("add a default route: route add via <gateway-ip>"),
        )
    });

    let nameservers = nameserver_count("/etc/resolv.conf");
    records.push(if nameservers > 0 {
        record(Status::Ok, format!("DNS configured ({nameservers} nameserver(s))"), None)
    } else {
        record(
            Status::Warning,
            "no nameserver entries in /etc/resolv.conf",
            Some("configure at least one nameserver"),
        )
    });

    let carrier_up = snapshot
        .interfaces
        .iter()
        .any(|i| !i.is_loopback() && i.is_up() && i.has_carrier());
    records.push(if carrier_up {
        record(Status::Ok, "at least one non-loopback interface up with carrier", None)
    } else {
        record(
            Status::Error,
            "no non-loopback interface is up with carrier",
            Some("bring up a physical interface"),
        )
    });

    let routable = snapshot.addresses.iter().any(|a| is_routable(&a.addr));
    records.push(if routable {
        record(Status::Ok, "at least one routable address assigned", None)
    } else {
        record(Status::Warning, "no routable address assigned", None)
    });

    records
}

/// Health report: bond quorum, bridge port count, VLAN parent liveness,
/// duplicate IPv4 assignments, multiple default routes.
pub fn health(snapshot: &Snapshot) -> Vec<Record> {
    let mut records = Vec::new();

    for bond in snapshot.interfaces.iter().filter(|i| BondView::from_interface(i).is_some()) {
        let members: Vec<&netlink::Interface> = snapshot
            .interfaces
            .iter()
            .filter(|i| i.master_index == Some(bond.index))
            .collect();
        let active = members.iter().filter(|m| m.has_carrier()).count();

        let (h, msg) = if members.len() >= 2 && active == members.len() {
            (Health::Healthy, format!("bond {} has {} active members", bond.name, active))
        } else if active > 0 {
            (Health::Degraded, format!("bond {} has only {active}/{} members active", bond.name, members.len()))
        } else {
            (Health::Unhealthy, format!("bond {} has no active members", bond.name))
        };
        records.push(record(h, msg, None));
    }

    for bridge in snapshot.interfaces.iter().filter(|i| BridgeView::from_interface(i).is_some()) {
        let port_count = snapshot
            .interfaces
            .iter()
            .filter(|i| i.master_index == Some(bridge.index))
            .count();
        records.push(record(Status::Ok, format!("bridge {} has {port_count} port(s)", bridge.name), None));
    }

    for vlan in snapshot.interfaces.iter().filter_map(|i| VlanView::from_interface(i).map(|v| (i, v))) {
        let (iface, view) = vlan;
        let parent_alive = iface
            .link_index
            .and_then(|idx| snapshot.interfaces.iter().find(|p| p.index == idx))
            .map(|p| p.is_up())
            .unwrap_or(false);
        records.push(if parent_alive {
            record(Health::Healthy, format!("vlan {} (id {}) parent is up", iface.name, view.id), None)
        } else {
            record(
                Health::Unhealthy,
                format!("vlan {} (id {}) parent is down or missing", iface.name, view.id),
                Some("bring up the parent interface"),
            )
        });
    }

    let mut by_addr: HashMap<IpAddr, usize> = HashMap::new();
    for addr in &snapshot.addresses {
        if addr.addr.is_ipv4() {
            *by_addr.entry(addr.addr).or_insert(0) += 1;
        }
    }
    for (addr, count) in by_addr.into_iter().filter(|(_, c)| *c > 1) {
        records.push(record(
            Status::Error,
            format!("duplicate IPv4 assignment: {addr} appears on {count} interfaces"),
            None,
        ));
    }

    let default_routes = snapshot.routes.iter().filter(|r| r.is_default()).count();
    if default_routes > 1 {
        records.push(record(
            Status::Warning,
            format!("{default_routes} default routes present"),
            Some("routing with multiple default routes depends on metric ordering"),
        ));
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_address_is_not_routable() {
        assert!(!is_routable(&"127.0.0.1".parse().unwrap()));
        assert!(!is_routable(&"::1".parse().unwrap()));
    }

    #[test]
    fn link_local_is_not_routable() {
        assert!(!is_routable(&"169.254.1.1".parse().unwrap()));
        assert!(!is_routable(&"fe80::1".parse().unwrap()));
    }

    #[test]
    fn ordinary_address_is_routable() {
        assert!(is_routable(&"10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn connectivity_flags_missing_default_gateway() {
        let snap = Snapshot::default();
        let records = connectivity(&snap);
        assert!(records.iter().any(|r| r.status_label == "error"));
    }

    #[test]
    fn health_flags_multiple_default_routes() {
        let mut snap = Snapshot::default();
        snap.routes = vec![
            netlink::Route { dst: None, src: None, gateway: None, out_index: None, table: 254, protocol: 0, scope: 0, route_type: 0, priority: None, next_hops: vec![] },
            netlink::Route { dst: None, src: None, gateway: None, out_index: None, table: 254, protocol: 0, scope: 0, route_type: 0, priority: None, next_hops: vec![] },
        ];
        let records = health(&snap);
        assert!(records.iter().any(|r| r.message.contains("default routes")));
    }
}
