//! `netcfg`'s own closed error taxonomy (spec §7), layered over
//! `NetlinkError` the way the teacher keeps one small `thiserror` enum
//! per crate rather than a single shared one.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CfgError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("interface name is required for '{0}'")]
    MissingInterfaceName(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid prefix length: {0}")]
    InvalidPrefix(String),

    #[error("invalid mtu: {0} (must be in [68, 65535])")]
    InvalidMtu(String),

    #[error("invalid state: {0} (must be 'up' or 'down')")]
    InvalidState(String),

    #[error("invalid vlan id: {0} (must be in [1, 4094])")]
    InvalidVlanId(String),

    #[error("route requires 'via' or 'dev' (or both)")]
    MissingGateway,

    #[error("route delete requires a destination")]
    MissingRouteDestination,

    #[error("bond requires a name")]
    MissingBondName,

    #[error("invalid bond mode: {0}")]
    InvalidBondMode(String),

    #[error("veth create requires both a name and a 'peer'")]
    MissingValue,

    #[error("ECMP route requires at least one next hop")]
    NoNexthops,

    #[error("unknown subject '{0}'")]
    UnknownSubject(String),

    #[error("unknown verb '{0}' for subject '{1}'")]
    UnknownVerb(String, String),
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Netlink(#[from] netlink::NetlinkError),

    #[error("post-operation verification failed: {0}")]
    VerificationFailed(String),

    #[error("failed to read {0}: {1}")]
    Io(String, std::io::Error),
}

pub type Result<T> = std::result::Result<T, CfgError>;
