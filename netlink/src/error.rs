//! Closed error taxonomy (spec §7). Leaf syscall failures are terminal;
//! precondition and validator errors are recoverable and carry enough
//! context for a caller to react without re-parsing a message string.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetlinkError {
    #[error("failed to create netlink socket: {0}")]
    SocketCreationFailed(#[source] std::io::Error),

    #[error("failed to bind netlink socket: {0}")]
    BindFailed(#[source] std::io::Error),

    #[error("failed to send on netlink socket: {0}")]
    SendFailed(#[source] std::io::Error),

    #[error("failed to receive on netlink socket: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    #[error("kernel returned error code {0}")]
    NetlinkReply(i32),

    #[error("builder buffer too small")]
    BufferTooSmall,

    #[error("interface not found: {0}")]
    InterfaceNotFound(String),

    #[error("interface {0} is not a bond")]
    NotABond(String),

    #[error("interface {0} is not a bridge")]
    NotABridge(String),

    #[error("no bond name available")]
    NoBondNameAvailable,

    #[error("interface {0} is already enslaved")]
    InterfaceAlreadyEnslaved(String),

    #[error("rule not found")]
    RuleNotFound,

    #[error("route not found")]
    RouteNotFound,

    #[error("neighbor not found")]
    NeighborNotFound,

    #[error("{kind} already exists")]
    AlreadyExists { kind: &'static str },

    #[error("{kind} is busy")]
    Busy { kind: &'static str },

    #[error("namespace error: {0}")]
    Namespace(String),

    #[error("post-operation verification failed: {0}")]
    VerificationFailed(String),

    #[error("malformed message: {0}")]
    Malformed(&'static str),
}

pub type Result<T> = std::result::Result<T, NetlinkError>;

impl NetlinkError {
    /// Maps a raw kernel errno (as carried in an NLMSG_ERROR payload) to
    /// the kind-specific variant an object operation promised, falling
    /// back to the generic reply variant for anything else.
    pub fn from_errno(errno: i32, not_found: Option<fn() -> NetlinkError>, kind: &'static str) -> Self {
        match -errno {
            libc::ENOENT if not_found.is_some() => not_found.unwrap()(),
            libc::EEXIST => NetlinkError::AlreadyExists { kind },
            libc::EBUSY => NetlinkError::Busy { kind },
            _ => NetlinkError::NetlinkReply(errno),
        }
    }
}
