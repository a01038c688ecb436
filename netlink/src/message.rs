//! Message framing (spec §3, §4.1): the 16-byte header plus a builder that
//! assembles a single request and a parser that splits a receive buffer
//! into however many messages it contains (a dump response is many
//! messages back to back).

use std::mem::size_of;

use serde::{Deserialize, Serialize};

use crate::align::align_of;
use crate::attr::Attr;
use crate::consts::{NLMSG_ALIGN_TO, NLMSG_HDR_LEN};
use crate::error::{NetlinkError, Result};

pub const NLM_F_REQUEST: u16 = libc::NLM_F_REQUEST as u16;
pub const NLM_F_MULTI: u16 = libc::NLM_F_MULTI as u16;
pub const NLM_F_ACK: u16 = libc::NLM_F_ACK as u16;
pub const NLM_F_DUMP: u16 = (libc::NLM_F_ROOT | libc::NLM_F_MATCH) as u16;
pub const NLM_F_REPLACE: u16 = libc::NLM_F_REPLACE as u16;
pub const NLM_F_EXCL: u16 = libc::NLM_F_EXCL as u16;
pub const NLM_F_CREATE: u16 = libc::NLM_F_CREATE as u16;
pub const NLM_F_APPEND: u16 = libc::NLM_F_APPEND as u16;

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct Header {
    pub len: u32,
    pub msg_type: u16,
    pub flags: u16,
    pub seq: u32,
    pub pid: u32,
}

impl Header {
    pub fn new(msg_type: u16, flags: u16) -> Self {
        Self {
            len: NLMSG_HDR_LEN as u32,
            msg_type,
            flags: NLM_F_REQUEST | flags,
            seq: 0,
            pid: 0,
        }
    }
}

/// A message under construction: header plus an opaque body (family
/// struct bytes followed by serialized attributes). Finalizing writes the
/// true length back into the header — the builder's "start / append… /
/// finalize" contract collapsed into incremental `append_*` calls on one
/// growing buffer plus an explicit `finish`.
pub struct MessageBuilder {
    header: Header,
    body: Vec<u8>,
}

impl MessageBuilder {
    pub fn new(msg_type: u16, flags: u16) -> Self {
        Self {
            header: Header::new(msg_type, flags),
            body: Vec::new(),
        }
    }

    pub fn append_struct<T: Copy>(&mut self, value: &T) {
        let bytes = unsafe {
            std::slice::from_raw_parts(value as *const T as *const u8, size_of::<T>())
        };
        self.body.extend_from_slice(bytes);
    }

    pub fn append_attr(&mut self, attr: &Attr) {
        self.body.extend_from_slice(&attr.serialize());
    }

    pub fn set_seq(&mut self, seq: u32) {
        self.header.seq = seq;
    }

    pub fn set_pid(&mut self, pid: u32) {
        self.header.pid = pid;
    }

    /// Finalizes the message: writes the total length (header + body,
    /// 4-byte aligned) back into the header and returns the serialized
    /// bytes.
    pub fn finish(mut self) -> Vec<u8> {
        let total = align_of(NLMSG_HDR_LEN + self.body.len(), NLMSG_ALIGN_TO);
        self.header.len = total as u32;

        let mut buf = Vec::with_capacity(total);
        buf.extend_from_slice(&self.header.len.to_ne_bytes());
        buf.extend_from_slice(&self.header.msg_type.to_ne_bytes());
        buf.extend_from_slice(&self.header.flags.to_ne_bytes());
        buf.extend_from_slice(&self.header.seq.to_ne_bytes());
        buf.extend_from_slice(&self.header.pid.to_ne_bytes());
        buf.extend_from_slice(&self.body);
        buf.resize(total, 0);
        buf
    }

    pub fn header(&self) -> &Header {
        &self.header
    }
}

/// One parsed message: a header plus the payload bytes that follow it
/// (family struct + attributes, for everything but NLMSG_ERROR/DONE).
#[derive(Debug, Clone)]
pub struct Message {
    pub header: Header,
    pub payload: Vec<u8>,
}

impl Message {
    /// Parses a single message from the front of `buf`, returning it
    /// together with the 4-byte-aligned length it consumed. `None` if
    /// `buf` doesn't hold a complete header or the declared length would
    /// run past the end of `buf`.
    pub fn parse(buf: &[u8]) -> Option<(Self, usize)> {
        if buf.len() < NLMSG_HDR_LEN {
            return None;
        }

        let len = u32::from_ne_bytes(buf[0..4].try_into().unwrap()) as usize;
        if len < NLMSG_HDR_LEN || len > buf.len() {
            return None;
        }

        let header = Header {
            len: len as u32,
            msg_type: u16::from_ne_bytes(buf[4..6].try_into().unwrap()),
            flags: u16::from_ne_bytes(buf[6..8].try_into().unwrap()),
            seq: u32::from_ne_bytes(buf[8..12].try_into().unwrap()),
            pid: u32::from_ne_bytes(buf[12..16].try_into().unwrap()),
        };

        let payload = buf[NLMSG_HDR_LEN..len].to_vec();
        let consumed = align_of(len, NLMSG_ALIGN_TO).min(buf.len());

        Some((Self { header, payload }, consumed))
    }

    pub fn is_multi(&self) -> bool {
        self.header.flags & NLM_F_MULTI != 0
    }

    /// If this is an NLMSG_ERROR message, returns the signed error code
    /// embedded at the start of its payload (0 = ack).
    pub fn error_code(&self) -> Result<i32> {
        self.payload
            .get(0..4)
            .map(|b| i32::from_ne_bytes(b.try_into().unwrap()))
            .ok_or(NetlinkError::Malformed("NLMSG_ERROR payload too short"))
    }
}

/// Splits a receive buffer into every message it contains.
pub struct Messages<'a> {
    buf: &'a [u8],
}

impl<'a> Messages<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }
}

impl<'a> Iterator for Messages<'a> {
    type Item = Message;

    fn next(&mut self) -> Option<Self::Item> {
        let (msg, consumed) = Message::parse(self.buf)?;
        self.buf = &self.buf[consumed..];
        Some(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::Attr;

    #[repr(C)]
    #[derive(Clone, Copy)]
    struct Dummy {
        a: u8,
        _pad: [u8; 3],
        b: u32,
    }

    #[test]
    fn builder_finish_sets_aligned_length() {
        let mut b = MessageBuilder::new(16, 0);
        b.append_struct(&Dummy { a: 1, _pad: [0; 3], b: 2 });
        b.append_attr(&Attr::string(3, "lo"));
        let bytes = b.finish();

        assert_eq!(bytes.len() % 4, 0);
        let len = u32::from_ne_bytes(bytes[0..4].try_into().unwrap());
        assert_eq!(len as usize, bytes.len());
    }

    #[test]
    fn parse_round_trips_header_fields() {
        let mut b = MessageBuilder::new(18, NLM_F_DUMP);
        b.set_seq(42);
        b.set_pid(7);
        let bytes = b.finish();

        let (msg, consumed) = Message::parse(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(msg.header.msg_type, 18);
        assert_eq!(msg.header.seq, 42);
        assert_eq!(msg.header.pid, 7);
        assert_eq!(msg.header.flags, NLM_F_REQUEST | NLM_F_DUMP);
    }

    #[test]
    fn messages_iterates_concatenated_buffer() {
        let m1 = MessageBuilder::new(1, 0).finish();
        let m2 = MessageBuilder::new(2, 0).finish();
        let mut buf = m1.clone();
        buf.extend_from_slice(&m2);

        let parsed: Vec<_> = Messages::new(&buf).collect();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].header.msg_type, 1);
        assert_eq!(parsed[1].header.msg_type, 2);
    }

    #[test]
    fn error_code_extracts_leading_i32() {
        let mut b = MessageBuilder::new(2, 0);
        b.append_struct(&(-5i32));
        let bytes = b.finish();
        let (msg, _) = Message::parse(&bytes).unwrap();
        assert_eq!(msg.error_code().unwrap(), -5);
    }

    #[test]
    fn parse_rejects_truncated_buffer() {
        let buf = [20, 0, 0, 0, 1, 0, 0, 0];
        assert!(Message::parse(&buf).is_none());
    }
}
