//! Raw netlink socket wrapper. Blocking by default; the event monitor
//! flips one of these non-blocking with `set_non_blocking`. Grounded on
//! the teacher's `core::socket::Socket` — same libc calls, same
//! close-on-drop guarantee, generalized to expose the multicast `groups`
//! mask the teacher's request-socket constructor hardcodes to zero.

use std::io::Error as IoError;
use std::mem::{size_of, zeroed};
use std::os::fd::RawFd;

use libc::{c_void, sockaddr, sockaddr_nl, socklen_t, AF_NETLINK, SOCK_CLOEXEC, SOCK_RAW};

use crate::consts::RECV_BUF_SIZE;
use crate::error::{NetlinkError, Result};
use crate::message::Messages;

pub struct Socket {
    fd: RawFd,
}

impl Socket {
    /// Opens a socket for `proto` (e.g. `NETLINK_ROUTE`), binds it with
    /// sender id `pid` (0 lets the kernel assign one) and multicast
    /// `groups` mask (0 for a plain request socket).
    pub fn open(proto: i32, pid: u32, groups: u32) -> Result<Self> {
        let fd = unsafe { libc::socket(AF_NETLINK, SOCK_RAW | SOCK_CLOEXEC, proto) };
        if fd == -1 {
            return Err(NetlinkError::SocketCreationFailed(IoError::last_os_error()));
        }

        let sock = Self { fd };
        sock.bind(pid, groups)?;
        Ok(sock)
    }

    fn bind(&self, pid: u32, groups: u32) -> Result<()> {
        let mut addr: sockaddr_nl = unsafe { zeroed() };
        addr.nl_family = AF_NETLINK as u16;
        addr.nl_pid = pid;
        addr.nl_groups = groups;

        let ret = unsafe {
            libc::bind(
                self.fd,
                &addr as *const _ as *const sockaddr,
                size_of::<sockaddr_nl>() as socklen_t,
            )
        };

        if ret == -1 {
            return Err(NetlinkError::BindFailed(IoError::last_os_error()));
        }
        Ok(())
    }

    pub fn set_non_blocking(&self, enabled: bool) -> Result<()> {
        let current = unsafe { libc::fcntl(self.fd, libc::F_GETFL, 0) };
        let flags = if enabled {
            current | libc::O_NONBLOCK
        } else {
            current & !libc::O_NONBLOCK
        };

        if unsafe { libc::fcntl(self.fd, libc::F_SETFL, flags) } == -1 {
            return Err(NetlinkError::BindFailed(IoError::last_os_error()));
        }
        Ok(())
    }

    pub fn send(&self, buf: &[u8]) -> Result<()> {
        let mut dest: sockaddr_nl = unsafe { zeroed() };
        dest.nl_family = AF_NETLINK as u16;

        loop {
            let ret = unsafe {
                libc::sendto(
                    self.fd,
                    buf.as_ptr() as *const c_void,
                    buf.len(),
                    0,
                    &dest as *const _ as *const sockaddr,
                    size_of::<sockaddr_nl>() as socklen_t,
                )
            };

            if ret >= 0 {
                return Ok(());
            }

            let err = IoError::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return Err(NetlinkError::SendFailed(err));
        }
    }

    /// Reads one datagram (up to `RECV_BUF_SIZE`) and returns the
    /// messages it contained along with the sender's address. Retries on
    /// EINTR and short reads per the transactor's retry policy; any other
    /// I/O error (including EAGAIN on a non-blocking socket) is returned
    /// to the caller untouched so a non-blocking poller can distinguish
    /// "nothing pending" from a real failure.
    pub fn recv(&self) -> Result<(Vec<u8>, sockaddr_nl)> {
        let mut from: sockaddr_nl = unsafe { zeroed() };
        let mut buf = vec![0u8; RECV_BUF_SIZE];

        loop {
            let mut addr_len = size_of::<sockaddr_nl>() as socklen_t;
            let ret = unsafe {
                libc::recvfrom(
                    self.fd,
                    buf.as_mut_ptr() as *mut c_void,
                    buf.len(),
                    0,
                    &mut from as *mut _ as *mut sockaddr,
                    &mut addr_len,
                )
            };

            if ret >= 0 {
                buf.truncate(ret as usize);
                return Ok((buf, from));
            }

            let err = IoError::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return Err(NetlinkError::ReceiveFailed(err));
        }
    }

    /// Parses one received datagram into its constituent messages.
    pub fn recv_messages(&self) -> Result<(Vec<crate::message::Message>, sockaddr_nl)> {
        let (buf, from) = self.recv()?;
        Ok((Messages::new(&buf).collect(), from))
    }

    pub fn pid(&self) -> Result<u32> {
        let mut addr: sockaddr_nl = unsafe { zeroed() };
        let mut addr_len = size_of::<sockaddr_nl>() as socklen_t;

        let ret = unsafe {
            libc::getsockname(
                self.fd,
                &mut addr as *mut _ as *mut sockaddr,
                &mut addr_len,
            )
        };

        if ret == -1 {
            return Err(NetlinkError::BindFailed(IoError::last_os_error()));
        }
        Ok(addr.nl_pid)
    }

    pub fn raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_request_socket_and_query_pid() {
        let sock = Socket::open(libc::NETLINK_ROUTE, 0, 0).unwrap();
        // pid 0 at bind time means "let the kernel assign"; after bind it
        // is always non-zero.
        assert!(sock.pid().unwrap() > 0);
    }

    #[test]
    fn non_blocking_recv_returns_would_block() {
        let sock = Socket::open(libc::NETLINK_ROUTE, 0, crate::consts::RTMGRP_LINK).unwrap();
        sock.set_non_blocking(true).unwrap();
        match sock.recv() {
            Err(NetlinkError::ReceiveFailed(e)) => {
                assert_eq!(e.kind(), std::io::ErrorKind::WouldBlock);
            }
            other => panic!("expected WouldBlock, got {other:?}"),
        }
    }
}
