//! Semantic validator (C5, spec §4.5). Runs after parsing and before
//! the executor touches the kernel; every rule here is drawn verbatim
//! from spec.md §4.5.

use netlink::ip::parse_ip_with_prefix;

use crate::error::ValidationError;
use crate::parser::Command;

const BOND_MODES: &[&str] = &[
    "balance-rr",
    "active-backup",
    "balance-xor",
    "broadcast",
    "802.3ad",
    "balance-tlb",
    "balance-alb",
];

/// Validates one parsed command, returning the non-fatal warnings the
/// parser already collected plus any the validator itself raises, or
/// the first fatal `ValidationError`.
pub fn validate(cmd: &Command) -> Result<Vec<String>, ValidationError> {
    let mut warnings = cmd.warnings.clone();

    match cmd.subject.as_str() {
        "interface" => validate_interface(cmd)?,
        "route" => validate_route(cmd)?,
        "bond" => validate_bond(cmd)?,
        "vlan" => validate_vlan(cmd)?,
        "veth" => validate_veth(cmd)?,
        "bridge" | "namespace" | "neighbor" | "tc" | "tunnel" => {}
        other => return Err(ValidationError::UnknownSubject(other.to_string())),
    }

    if !matches!(cmd.verb.as_str(), "show" | "set" | "add" | "del" | "create" | "delete" | "analyze" | "trace" | "validate" | "diagnose") {
        return Err(ValidationError::UnknownVerb(cmd.verb.clone(), cmd.subject.clone()));
    }

    for w in extra_attribute_warnings(cmd) {
        warnings.push(w);
    }

    Ok(warnings)
}

fn needs_name(verb: &str) -> bool {
    matches!(verb, "set" | "add" | "del" | "create" | "delete")
}

fn validate_interface(cmd: &Command) -> Result<(), ValidationError> {
    if needs_name(&cmd.verb) && cmd.name.is_none() {
        return Err(ValidationError::MissingInterfaceName(cmd.verb.clone()));
    }

    if let Some(state) = cmd.attr("state") {
        if state != "up" && state != "down" {
            return Err(ValidationError::InvalidState(state.to_string()));
        }
    }

    if let Some(mtu) = cmd.attr("mtu") {
        let n: i64 = mtu.parse().map_err(|_| ValidationError::InvalidMtu(mtu.to_string()))?;
        if !(68..=65535).contains(&n) {
            return Err(ValidationError::InvalidMtu(mtu.to_string()));
        }
    }

    if matches!(cmd.verb.as_str(), "add" | "del") {
        if let Some(addr) = cmd.attr("address") {
            let (parsed, prefix) = parse_ip_with_prefix(addr, None)
                .map_err(|_| ValidationError::InvalidAddress(addr.to_string()))?;
            let max = if parsed.is_ipv4() { 32 } else { 128 };
            if prefix > max {
                return Err(ValidationError::InvalidPrefix(addr.to_string()));
            }
        }
    }

    Ok(())
}

fn validate_route(cmd: &Command) -> Result<(), ValidationError> {
    match cmd.verb.as_str() {
        "add" | "create" => {
            if cmd.attr("via").is_none() && cmd.attr("dev").is_none() {
                return Err(ValidationError::MissingGateway);
            }
        }
        "del" | "delete" => {
            if cmd.attr("to").is_none() && cmd.name.is_none() {
                return Err(ValidationError::MissingRouteDestination);
            }
        }
        _ => {}
    }
    Ok(())
}

fn validate_bond(cmd: &Command) -> Result<(), ValidationError> {
    if matches!(cmd.verb.as_str(), "create" | "add" | "del" | "delete") && cmd.name.is_none() {
        return Err(ValidationError::MissingBondName);
    }
    if let Some(mode) = cmd.attr("mode") {
        if !BOND_MODES.contains(&mode) {
            return Err(ValidationError::InvalidBondMode(mode.to_string()));
        }
    }
    Ok(())
}

fn validate_vlan(cmd: &Command) -> Result<(), ValidationError> {
    if let Some(id) = cmd.attr("id") {
        let n: i64 = id.parse().map_err(|_| ValidationError::InvalidVlanId(id.to_string()))?;
        if !(1..=4094).contains(&n) {
            return Err(ValidationError::InvalidVlanId(id.to_string()));
        }
    }
    Ok(())
}

fn validate_veth(cmd: &Command) -> Result<(), ValidationError> {
    if cmd.verb == "create" && (cmd.name.is_none() || cmd.attr("peer").is_none()) {
        return Err(ValidationError::MissingValue);
    }
    Ok(())
}

/// Per-subject fixed attribute sets; anything outside a subject's set
/// produces a warning, not a hard failure, per spec §4.5's closing rule.
fn allowed_attrs(subject: &str) -> &'static [&'static str] {
    match subject {
        "interface" => &["address", "mtu", "state", "master", "default"],
        "route" => &["via", "dev", "metric", "to", "from", "default"],
        "bond" => &["mode", "members"],
        "vlan" => &["id", "dev"],
        "veth" => &["peer"],
        "neighbor" => &["with", "on"],
        "tc" => &["on", "to"],
        "tunnel" => &["to", "from", "on"],
        _ => &[],
    }
}

fn extra_attribute_warnings(cmd: &Command) -> Vec<String> {
    let allowed = allowed_attrs(&cmd.subject);
    cmd.attrs
        .iter()
        .filter(|(k, _)| !allowed.contains(&k.as_str()))
        .map(|(k, _)| format!("attribute '{k}' is not recognised for subject '{}'", cmd.subject))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn cmd(src: &str) -> Command {
        parse(&tokenize(src)).into_iter().next().unwrap()
    }

    #[test]
    fn interface_set_requires_name() {
        let c = Command { subject: "interface".into(), name: None, verb: "set".into(), attrs: vec![], positional: vec![], warnings: vec![] };
        assert!(matches!(validate(&c), Err(ValidationError::MissingInterfaceName(_))));
    }

    #[test]
    fn bare_listing_does_not_require_name() {
        let c = cmd("interface");
        assert!(validate(&c).is_ok());
    }

    #[test]
    fn mtu_out_of_range_is_rejected() {
        let c = cmd("interface eth0 set mtu 40");
        assert!(matches!(validate(&c), Err(ValidationError::InvalidMtu(_))));
    }

    #[test]
    fn mtu_in_range_is_accepted() {
        let c = cmd("interface eth0 set mtu 1500");
        assert!(validate(&c).is_ok());
    }

    #[test]
    fn state_must_be_up_or_down() {
        let mut c = cmd("interface eth0 set state up");
        assert!(validate(&c).is_ok());
        c.attrs = vec![("state".into(), "sideways".into())];
        assert!(matches!(validate(&c), Err(ValidationError::InvalidState(_))));
    }

    #[test]
    fn address_prefix_bounds_checked() {
        let c = cmd("interface eth0 add address 10.0.0.1/24");
        assert!(validate(&c).is_ok());
    }

    #[test]
    fn route_add_without_via_or_dev_rejected() {
        let c = cmd("route add to 10.0.0.0/24");
        assert!(matches!(validate(&c), Err(ValidationError::MissingGateway)));
    }

    #[test]
    fn route_add_with_dev_only_accepted() {
        let c = cmd("route add to 10.0.0.0/24 dev eth0");
        assert!(validate(&c).is_ok());
    }

    #[test]
    fn bond_mode_must_be_recognised() {
        let c = cmd("bond bond0 create mode turbo");
        assert!(matches!(validate(&c), Err(ValidationError::InvalidBondMode(_))));
    }

    #[test]
    fn vlan_id_out_of_range_rejected() {
        let c = cmd("vlan vlan100 create id 5000");
        assert!(matches!(validate(&c), Err(ValidationError::InvalidVlanId(_))));
    }

    #[test]
    fn veth_create_requires_peer() {
        let c = cmd("veth veth0 create");
        assert!(matches!(validate(&c), Err(ValidationError::MissingValue)));
    }
}
