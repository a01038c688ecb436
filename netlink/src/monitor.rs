//! The event demultiplexer (C3, spec §4.3): a non-blocking subscription
//! to kernel multicast groups that turns unsolicited notifications into
//! typed events. No direct teacher analog (the teacher's sockets are all
//! blocking); built in the same `Socket`/`libc` idiom as the transactor,
//! using `libc::poll` for the timeout wait instead of pulling in an async
//! runtime, matching spec §5's "blocking vs event-driven, do not unify"
//! guidance.

use std::time::{SystemTime, UNIX_EPOCH};

use libc::{pollfd, POLLIN};

use crate::addr::Address;
use crate::consts::{DEFAULT_MONITOR_GROUPS, NLMSG_OVERRUN};
use crate::error::{NetlinkError, Result};
use crate::link::Interface;
use crate::neigh::Neighbor;
use crate::route::Route;
use crate::socket::Socket;

#[derive(Debug, Clone)]
pub enum Event {
    InterfaceAdded(Interface),
    InterfaceRemoved(Interface),
    InterfaceUp(Interface),
    InterfaceDown(Interface),
    InterfaceRenamed(Interface),
    InterfaceMtuChanged(Interface),
    InterfaceMasterChanged(Interface),
    AddressAdded(Address),
    AddressRemoved(Address),
    RouteAdded(Route),
    RouteRemoved(Route),
    NeighborAdded(Neighbor),
    NeighborRemoved(Neighbor),
    NeighborChanged(Neighbor),
}

#[derive(Debug, Clone)]
pub struct TimestampedEvent {
    pub event: Event,
    pub timestamp: u64,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub struct EventMonitor {
    socket: Socket,
    stop: bool,
}

impl EventMonitor {
    pub fn new() -> Result<Self> {
        Self::with_groups(DEFAULT_MONITOR_GROUPS)
    }

    pub fn with_groups(groups: u32) -> Result<Self> {
        let socket = Socket::open(libc::NETLINK_ROUTE, 0, groups)?;
        socket.set_non_blocking(true)?;
        Ok(Self { socket, stop: false })
    }

    pub fn stop(&mut self) {
        self.stop = true;
    }

    /// Waits up to `timeout_ms` (-1 = infinite) for datagrams to become
    /// readable, then drains every pending one, invoking `callback` once
    /// per parsed event. Returns the number of events delivered.
    pub fn poll<F: FnMut(TimestampedEvent)>(&mut self, timeout_ms: i32, mut callback: F) -> Result<usize> {
        let mut fds = [pollfd {
            fd: self.socket.raw_fd(),
            events: POLLIN,
            revents: 0,
        }];

        let ret = unsafe { libc::poll(fds.as_mut_ptr(), 1, timeout_ms) };
        if ret < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                return Ok(0);
            }
            return Err(NetlinkError::ReceiveFailed(err));
        }
        if ret == 0 || fds[0].revents & POLLIN == 0 {
            return Ok(0);
        }

        let mut count = 0;

        loop {
            let messages = match self.socket.recv_messages() {
                Ok((msgs, _from)) => msgs,
                Err(NetlinkError::ReceiveFailed(e))
                    if e.kind() == std::io::ErrorKind::WouldBlock =>
                {
                    break;
                }
                Err(e) => return Err(e),
            };

            for msg in messages {
                if msg.header.msg_type == NLMSG_OVERRUN {
                    return Err(NetlinkError::Malformed("NLMSG_OVERRUN: receive buffer overrun"));
                }

                if let Some(event) = parse_event(msg.header.msg_type, &msg.payload) {
                    callback(TimestampedEvent {
                        event,
                        timestamp: now_secs(),
                    });
                    count += 1;
                }
            }
        }

        Ok(count)
    }

    /// Loops calling `poll` with a 1-second timeout until `self.stop()` is
    /// called from within a callback (or the caller holds a handle and
    /// calls it externally between iterations — not possible with `&mut
    /// self` held by the loop itself, so callbacks are the only way to
    /// stop it from the inside, matching spec §4.3's "or externally").
    pub fn run_until_stopped<F: FnMut(TimestampedEvent)>(&mut self, mut callback: F) -> Result<()> {
        self.stop = false;
        while !self.stop {
            self.poll(1000, &mut callback)?;
        }
        Ok(())
    }
}

fn parse_event(msg_type: u16, payload: &[u8]) -> Option<Event> {
    match msg_type {
        t if t == libc::RTM_NEWLINK as u16 => {
            let iface = Interface::parse(payload)?;
            Some(if iface.flags & libc::IFF_UP as u32 != 0 {
                Event::InterfaceUp(iface)
            } else {
                Event::InterfaceAdded(iface)
            })
        }
        t if t == libc::RTM_DELLINK as u16 => {
            let iface = Interface::parse(payload)?;
            Some(if iface.flags & libc::IFF_UP as u32 == 0 {
                Event::InterfaceDown(iface)
            } else {
                Event::InterfaceRemoved(iface)
            })
        }
        t if t == libc::RTM_NEWADDR as u16 => Address::parse(payload).map(Event::AddressAdded),
        t if t == libc::RTM_DELADDR as u16 => Address::parse(payload).map(Event::AddressRemoved),
        t if t == libc::RTM_NEWROUTE as u16 => {
            let route = Route::parse(payload)?;
            (route.route_type == libc::RTN_UNICAST).then_some(Event::RouteAdded(route))
        }
        t if t == libc::RTM_DELROUTE as u16 => {
            let route = Route::parse(payload)?;
            (route.route_type == libc::RTN_UNICAST).then_some(Event::RouteRemoved(route))
        }
        t if t == libc::RTM_NEWNEIGH as u16 => Neighbor::parse(payload).map(Event::NeighborAdded),
        t if t == libc::RTM_DELNEIGH as u16 => Neighbor::parse(payload).map(Event::NeighborRemoved),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_message_type_yields_no_event() {
        assert!(parse_event(999, &[]).is_none());
    }

    #[test]
    #[ignore = "requires CAP_NET_ADMIN / a live kernel netlink socket"]
    fn poll_with_zero_timeout_returns_promptly() {
        let mut mon = EventMonitor::new().unwrap();
        let n = mon.poll(0, |_| {}).unwrap();
        assert_eq!(n, 0);
    }
}
