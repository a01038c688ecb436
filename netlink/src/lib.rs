//! Netlink protocol codec, transactor, event monitor and typed object
//! operations for Linux network configuration. Grounded on the
//! `rsln`/`netlink` sibling crates: the wire codec and blocking
//! transactor keep their shape, the object modules (link/addr/route/...)
//! are organized one per `RTM_*` family the way `route::link`,
//! `route::neigh` etc. are split in the source crate.

pub mod align;
pub mod attr;
pub mod consts;
pub mod error;
pub mod ip;
pub mod message;
pub mod socket;
pub mod transactor;
pub mod monitor;

pub mod link;
pub mod addr;
pub mod route;
pub mod rule;
pub mod neigh;
pub mod bridge;
pub mod bond;
pub mod vlan;
pub mod veth;
pub mod tunnel;
pub mod tc;
pub mod netns;
pub mod stats;

pub use error::{NetlinkError, Result};
pub use message::{Message, MessageBuilder};
pub use monitor::{Event, EventMonitor, TimestampedEvent};
pub use socket::Socket;
pub use transactor::Transactor;

pub use addr::{AddrHandle, Address};
pub use link::{Interface, Kind, LinkAttrs, LinkHandle};
pub use neigh::{NeighHandle, Neighbor};
pub use route::{NextHop, Route, RouteHandle};
pub use rule::{Rule, RuleHandle};
pub use tc::TcHandle;

/// Opens a request/response socket bound to `NETLINK_ROUTE`, the entry
/// point most callers reach for first.
pub fn open() -> Result<Transactor> {
    Transactor::open(libc::NETLINK_ROUTE)
}
