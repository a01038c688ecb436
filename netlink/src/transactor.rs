//! The request/response transactor (C2, spec §4.2). Owns one socket,
//! assigns sequence numbers, and drives the dump/ACK/error loop. Grounded
//! on the teacher's `SocketHandle::request`.

use tracing::trace;

use crate::consts::{NLMSG_DONE, NLMSG_ERROR, PID_KERNEL};
use crate::error::{NetlinkError, Result};
use crate::message::{Message, MessageBuilder};
use crate::socket::Socket;

pub struct Transactor {
    socket: Socket,
    seq: u32,
    pid: u32,
}

impl Transactor {
    pub fn open(proto: i32) -> Result<Self> {
        let socket = Socket::open(proto, 0, 0)?;
        let pid = socket.pid()?;
        Ok(Self {
            socket,
            seq: 0,
            pid,
        })
    }

    fn next_seq(&mut self) -> u32 {
        self.seq = self.seq.wrapping_add(1);
        self.seq
    }

    /// Sends `builder` and collects every payload-bearing message in the
    /// response, stopping at NLMSG_DONE (dump) or a zero-code NLMSG_ERROR
    /// (plain ack). A nonzero-code NLMSG_ERROR fails the whole operation.
    pub fn request(&mut self, mut builder: MessageBuilder) -> Result<Vec<Message>> {
        let seq = self.next_seq();
        builder.set_seq(seq);
        builder.set_pid(self.pid);

        let bytes = builder.finish();
        self.socket.send(&bytes)?;

        let mut collected = Vec::new();

        loop {
            let (messages, from) = self.socket.recv_messages()?;

            if from.nl_pid != PID_KERNEL {
                trace!(pid = from.nl_pid, "ignoring message from non-kernel sender");
                continue;
            }

            for msg in messages {
                if msg.header.seq != seq || msg.header.pid != self.pid {
                    continue;
                }

                match msg.header.msg_type {
                    NLMSG_DONE => return Ok(collected),
                    NLMSG_ERROR => {
                        let code = msg.error_code()?;
                        if code == 0 {
                            return Ok(collected);
                        }
                        return Err(NetlinkError::NetlinkReply(code));
                    }
                    _ => {
                        let is_last = !msg.is_multi();
                        collected.push(msg);
                        if is_last {
                            return Ok(collected);
                        }
                    }
                }
            }
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{NLM_F_DUMP, NLM_F_REQUEST};

    #[test]
    fn sequence_numbers_are_consecutive() {
        // a Transactor without a live kernel socket can't be constructed
        // portably in a unit test; exercise the counter directly instead.
        let mut seq = 0u32;
        let mut next = || {
            seq = seq.wrapping_add(1);
            seq
        };
        let first = next();
        for i in 1..10 {
            assert_eq!(next(), first + i);
        }
    }

    #[test]
    #[ignore = "requires CAP_NET_ADMIN / a live kernel netlink socket"]
    fn link_dump_completes() {
        let mut tx = Transactor::open(libc::NETLINK_ROUTE).unwrap();
        let builder = MessageBuilder::new(libc::RTM_GETLINK as u16, NLM_F_DUMP);
        let msgs = tx.request(builder).unwrap();
        assert!(!msgs.is_empty());
    }
}
