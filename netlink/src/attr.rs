//! TLV attribute codec (spec §4.1). Mirrors the teacher's `RouteAttr`
//! builder/parser pair but splits encode (owned, nestable tree) from
//! decode (a zero-copy iterator over a borrowed buffer) the way the spec's
//! builder/parser contracts are described separately.

use crate::align::align_of;
use crate::consts::{RTA_ALIGN_TO, RTA_HDR_LEN};
use crate::error::{NetlinkError, Result};

/// An attribute under construction. `payload` holds either raw bytes or,
/// for a nested attribute, the concatenation of each child's serialized
/// form (set via `nest`).
#[derive(Debug, Clone)]
pub struct Attr {
    pub kind: u16,
    payload: Vec<u8>,
}

impl Attr {
    pub fn new(kind: u16, payload: &[u8]) -> Self {
        Self {
            kind,
            payload: payload.to_vec(),
        }
    }

    pub fn u8(kind: u16, v: u8) -> Self {
        Self::new(kind, &[v])
    }

    pub fn u16(kind: u16, v: u16) -> Self {
        Self::new(kind, &v.to_ne_bytes())
    }

    pub fn u32(kind: u16, v: u32) -> Self {
        Self::new(kind, &v.to_ne_bytes())
    }

    pub fn u64(kind: u16, v: u64) -> Self {
        Self::new(kind, &v.to_ne_bytes())
    }

    pub fn i32(kind: u16, v: i32) -> Self {
        Self::new(kind, &v.to_ne_bytes())
    }

    /// Writes `s` followed by a single NUL, per the builder contract.
    pub fn string(kind: u16, s: &str) -> Self {
        let mut buf = Vec::with_capacity(s.len() + 1);
        buf.extend_from_slice(s.as_bytes());
        buf.push(0);
        Self::new(kind, &buf)
    }

    /// An attribute whose payload is itself a sequence of attributes
    /// (begin-nested / append children / end-nested collapsed into one
    /// call, since we build the tree in memory rather than back-patching
    /// a live buffer).
    pub fn nested(kind: u16, children: &[Attr]) -> Self {
        let mut payload = Vec::new();
        for child in children {
            payload.extend_from_slice(&child.serialize());
        }
        Self { kind, payload }
    }

    pub fn unaligned_len(&self) -> usize {
        RTA_HDR_LEN + self.payload.len()
    }

    pub fn aligned_len(&self) -> usize {
        align_of(self.unaligned_len(), RTA_ALIGN_TO)
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.aligned_len());
        buf.extend_from_slice(&(self.unaligned_len() as u16).to_ne_bytes());
        buf.extend_from_slice(&self.kind.to_ne_bytes());
        buf.extend_from_slice(&self.payload);
        buf.resize(self.aligned_len(), 0);
        buf
    }
}

/// A single parsed `{type, payload}` record, borrowing from the source
/// buffer.
#[derive(Debug, Clone, Copy)]
pub struct ParsedAttr<'a> {
    pub kind: u16,
    pub payload: &'a [u8],
}

impl<'a> ParsedAttr<'a> {
    pub fn as_u8(&self) -> Option<u8> {
        self.payload.first().copied()
    }

    pub fn as_u16(&self) -> Option<u16> {
        self.payload
            .get(..2)
            .map(|b| u16::from_ne_bytes(b.try_into().unwrap()))
    }

    pub fn as_u32(&self) -> Option<u32> {
        self.payload
            .get(..4)
            .map(|b| u32::from_ne_bytes(b.try_into().unwrap()))
    }

    pub fn as_i32(&self) -> Option<i32> {
        self.payload
            .get(..4)
            .map(|b| i32::from_ne_bytes(b.try_into().unwrap()))
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.payload
            .get(..8)
            .map(|b| u64::from_ne_bytes(b.try_into().unwrap()))
    }

    /// Strips the trailing NUL a string attribute carries, if present.
    pub fn as_str(&self) -> Option<&'a str> {
        let bytes = match self.payload.last() {
            Some(0) => &self.payload[..self.payload.len() - 1],
            _ => self.payload,
        };
        std::str::from_utf8(bytes).ok()
    }

    /// A fresh iterator over this attribute's payload, for nested TLVs.
    pub fn iter_nested(&self) -> AttrIter<'a> {
        AttrIter::new(self.payload)
    }
}

/// Iterates `{type, payload}` records over a byte range, stopping cleanly
/// (never erroring) on the first malformed header — the parser contract
/// in spec §4.1.
pub struct AttrIter<'a> {
    buf: &'a [u8],
}

impl<'a> AttrIter<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }
}

impl<'a> Iterator for AttrIter<'a> {
    type Item = ParsedAttr<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buf.len() < RTA_HDR_LEN {
            self.buf = &[];
            return None;
        }

        let len = u16::from_ne_bytes(self.buf[0..2].try_into().unwrap()) as usize;
        let kind = u16::from_ne_bytes(self.buf[2..4].try_into().unwrap());

        if len < RTA_HDR_LEN || len > self.buf.len() {
            self.buf = &[];
            return None;
        }

        let payload = &self.buf[RTA_HDR_LEN..len];
        let aligned = align_of(len, RTA_ALIGN_TO).min(self.buf.len());
        self.buf = &self.buf[aligned..];

        Some(ParsedAttr { kind, payload })
    }
}

/// Collects every attribute into a map keyed by type, last write wins.
/// Most object parsers only care about a handful of well-known types and
/// don't need ordering or repeated keys.
pub fn collect<'a>(buf: &'a [u8]) -> std::collections::HashMap<u16, ParsedAttr<'a>> {
    AttrIter::new(buf).map(|a| (a.kind, a)).collect()
}

/// A small append-only buffer used for building a message body: family
/// struct bytes followed by a sequence of serialized attributes. This is
/// the "start message / append family struct / append attribute /
/// finalize" builder contract, minus back-patching since attributes are
/// fully materialized in memory before being written once.
pub struct BodyBuilder {
    buf: Vec<u8>,
    cap: usize,
}

impl BodyBuilder {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
            cap,
        }
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if self.buf.len() + bytes.len() > self.cap && self.cap != 0 {
            return Err(NetlinkError::BufferTooSmall);
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    pub fn append_attr(&mut self, attr: &Attr) -> Result<()> {
        self.append_bytes(&attr.serialize())
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_len_rounds_up_to_four() {
        let a = Attr::new(1, &[1, 2, 3]);
        assert_eq!(a.unaligned_len(), 7);
        assert_eq!(a.aligned_len(), 8);
    }

    #[test]
    fn round_trip_simple_attr() {
        let a = Attr::u32(5, 0xdead_beef);
        let bytes = a.serialize();
        let parsed: Vec<_> = AttrIter::new(&bytes).collect();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].kind, 5);
        assert_eq!(parsed[0].as_u32(), Some(0xdead_beef));
    }

    #[test]
    fn round_trip_string_attr_strips_nul() {
        let a = Attr::string(3, "eth0");
        let bytes = a.serialize();
        let parsed = AttrIter::new(&bytes).next().unwrap();
        assert_eq!(parsed.as_str(), Some("eth0"));
    }

    #[test]
    fn nested_round_trip_preserves_order_and_length() {
        let c1 = Attr::u8(1, 7);
        let c2 = Attr::string(2, "vlan");
        let parent = Attr::nested(10, &[c1.clone(), c2.clone()]);

        let bytes = parent.serialize();
        let top = AttrIter::new(&bytes).next().unwrap();
        assert_eq!(top.kind, 10);

        let children: Vec<_> = top.iter_nested().collect();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].kind, 1);
        assert_eq!(children[0].as_u8(), Some(7));
        assert_eq!(children[1].kind, 2);
        assert_eq!(children[1].as_str(), Some("vlan"));

        let header_and_children_len =
            RTA_HDR_LEN + c1.aligned_len() + c2.aligned_len();
        assert_eq!(parent.unaligned_len(), header_and_children_len);
    }

    #[test]
    fn iterator_stops_cleanly_on_short_header() {
        let buf = [1, 0, 0];
        assert_eq!(AttrIter::new(&buf).count(), 0);
    }

    #[test]
    fn iterator_stops_cleanly_on_length_past_remaining() {
        // declares a length of 100 but only 8 bytes are present
        let buf = [100, 0, 1, 0, 0, 0, 0, 0];
        assert_eq!(AttrIter::new(&buf).count(), 0);
    }

    #[test]
    fn iterator_rejects_length_shorter_than_header() {
        let buf = [2, 0, 1, 0];
        assert_eq!(AttrIter::new(&buf).count(), 0);
    }

    #[test]
    fn multiple_attrs_in_sequence() {
        let a = Attr::u8(1, 1);
        let b = Attr::u32(2, 42);
        let mut buf = a.serialize();
        buf.extend_from_slice(&b.serialize());

        let parsed: Vec<_> = AttrIter::new(&buf).collect();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].as_u32(), Some(42));
    }
}
