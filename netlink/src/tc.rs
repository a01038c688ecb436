//! Traffic control: qdisc/class/filter operations (spec §4.4 "Traffic
//! control"). No direct teacher analog; built in the header-plus-attrs
//! idiom of `route.rs`, using the `tcmsg` layout and handle-encoding
//! rules from `consts.rs`.

use serde::{Deserialize, Serialize};

use crate::attr::{collect, Attr};
use crate::consts::{
    TCA_HTB_CEIL64, TCA_HTB_INIT, TCA_HTB_PARMS, TCA_HTB_RATE64, TCA_KIND, TCA_OPTIONS,
    TCA_TBF_BURST, TCA_TBF_PARMS, TCA_TBF_RATE64, TCA_U32_CLASSID, TCA_U32_SEL, TC_H_ROOT,
};
use crate::error::{NetlinkError, Result};
use crate::message::{MessageBuilder, NLM_F_ACK, NLM_F_CREATE, NLM_F_DUMP, NLM_F_EXCL};
use crate::transactor::Transactor;

/// Returns the raw bytes of a fixed C-ABI struct, the same technique
/// `MessageBuilder::append_struct` uses for message headers, needed here
/// to embed a struct as an attribute's payload rather than the message
/// body.
fn struct_bytes<T: Copy>(value: &T) -> Vec<u8> {
    unsafe { std::slice::from_raw_parts(value as *const T as *const u8, std::mem::size_of::<T>()) }
        .to_vec()
}

/// `struct tc_ratespec`, embedded in both `tc_htb_opt` and `tc_tbf_qopt`.
/// `rate` is left at `u32::MAX` ("see the RATE64 attribute") whenever the
/// real rate doesn't fit in 32 bits.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct TcRatespec {
    cell_log: u8,
    linklayer: u8,
    overhead: u16,
    cell_align: i16,
    mtu: u16,
    rate: u32,
}

fn ratespec(rate: u64) -> TcRatespec {
    TcRatespec {
        rate: if rate > u32::MAX as u64 { u32::MAX } else { rate as u32 },
        ..Default::default()
    }
}

/// `struct tc_htb_glob`, the `TCA_HTB_INIT` payload.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct TcHtbGlob {
    version: u32,
    rate2quantum: u32,
    defcls: u32,
    debug: u32,
    direct_pkts: u32,
}

/// `struct tc_htb_opt`, the `TCA_HTB_PARMS` payload.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct TcHtbOpt {
    rate: TcRatespec,
    ceil: TcRatespec,
    buffer: u32,
    cbuffer: u32,
    quantum: u32,
    level: u32,
    prio: u32,
}

/// `struct tc_tbf_qopt`, the `TCA_TBF_PARMS` payload.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct TcTbfQopt {
    rate: TcRatespec,
    peakrate: TcRatespec,
    limit: u32,
    buffer: u32,
    mtu: u32,
}

/// `struct tc_u32_sel` with `nkeys` fixed to 1 (one `TcU32Key` trails it
/// in the same attribute payload, no TLV header between them).
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct TcU32Sel {
    flags: u8,
    offshift: u8,
    nkeys: u8,
    _pad: u8,
    offmask: u16,
    off: u16,
    offoff: i16,
    hoff: i16,
    hmask: u32,
}

/// `struct tc_u32_key`. A zeroed key (mask 0, val 0) matches every packet
/// — the "catch-all, classify by CLASSID" filter this module builds.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct TcU32Key {
    mask: u32,
    val: u32,
    off: i32,
    offmask: i32,
}

/// Buffer sizing formula from spec §4.4 HTB class create.
fn htb_buffer(rate_bytes: u64) -> u32 {
    (rate_bytes / 10).clamp(1600, u32::MAX as u64) as u32
}

/// `limit = rate * latency + burst`, the standard TBF sizing formula
/// (peak-rate shaping omitted — this module doesn't expose a peakrate).
fn tbf_limit(rate: u64, burst: u32, latency_us: u32) -> u32 {
    let in_latency = rate.saturating_mul(latency_us as u64) / 1_000_000;
    in_latency.saturating_add(burst as u64).min(u32::MAX as u64) as u32
}

/// Packs `tcm_info`: priority in the upper 16 bits, protocol (big-endian,
/// per the kernel's wire convention regardless of host order) in the
/// lower 16, per spec §4.4 Filter create.
fn filter_info(priority: u16, protocol: u16) -> u32 {
    ((priority as u32) << 16) | protocol.to_be() as u32
}

/// Builds a `major:minor` handle from its two halves, per spec §3's
/// Tc::handle encoding.
pub fn make_handle(major: u16, minor: u16) -> u32 {
    ((major as u32) << 16) | minor as u32
}

pub fn handle_major(handle: u32) -> u16 {
    (handle >> 16) as u16
}

pub fn handle_minor(handle: u32) -> u16 {
    (handle & 0xFFFF) as u16
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct TcHeader {
    pub family: u8,
    pub _pad1: u8,
    pub _pad2: u16,
    pub index: i32,
    pub handle: u32,
    pub parent: u32,
    pub info: u32,
}

#[derive(Debug, Clone)]
pub struct Qdisc {
    pub index: i32,
    pub handle: u32,
    pub parent: u32,
    pub kind: String,
}

impl Qdisc {
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() < std::mem::size_of::<TcHeader>() {
            return None;
        }
        let hdr_len = std::mem::size_of::<TcHeader>();
        let header: TcHeader = bincode::deserialize(payload).ok()?;
        let attrs = collect(&payload[hdr_len..]);
        let kind = attrs.get(&TCA_KIND).and_then(|a| a.as_str()).unwrap_or("").to_string();

        Some(Qdisc {
            index: header.index,
            handle: header.handle,
            parent: header.parent,
            kind,
        })
    }
}

pub enum QdiscParams {
    /// "pfifo": OPTIONS carries a u32 queue limit.
    Pfifo { limit: u32 },
    /// "fq_codel": no options.
    FqCodel,
    Htb { default_class: u32 },
    Tbf { rate: u64, burst: u32, latency_us: u32 },
}

pub struct TcHandle<'a> {
    tx: &'a mut Transactor,
}

impl<'a> TcHandle<'a> {
    pub fn new(tx: &'a mut Transactor) -> Self {
        Self { tx }
    }

    pub fn list_qdiscs(&mut self, index: i32) -> Result<Vec<Qdisc>> {
        let mut b = MessageBuilder::new(libc::RTM_GETQDISC as u16, NLM_F_DUMP);
        let mut hdr = TcHeader::default();
        hdr.index = index;
        b.append_struct(&hdr);

        let msgs = self.tx.request(b)?;
        Ok(msgs.iter().filter_map(|m| Qdisc::parse(&m.payload)).collect())
    }

    /// Attaches a root qdisc to `index`. `kind` names it (`"htb"`,
    /// `"tbf"`, `"pfifo_fast"`, `"fq_codel"`); `params` supplies the
    /// kind-specific option payload.
    pub fn add_root_qdisc(&mut self, index: i32, kind: &str, params: &QdiscParams) -> Result<()> {
        let mut b = MessageBuilder::new(libc::RTM_NEWQDISC as u16, NLM_F_CREATE | NLM_F_EXCL | NLM_F_ACK);
        let mut hdr = TcHeader::default();
        hdr.index = index;
        hdr.handle = make_handle(1, 0);
        hdr.parent = TC_H_ROOT;
        b.append_struct(&hdr);

        b.append_attr(&Attr::string(TCA_KIND, kind));

        match params {
            QdiscParams::Pfifo { limit } => {
                b.append_attr(&Attr::u32(TCA_OPTIONS, *limit));
            }
            QdiscParams::FqCodel => {}
            QdiscParams::Htb { default_class } => {
                let glob = TcHtbGlob {
                    version: 3,
                    rate2quantum: 10,
                    defcls: *default_class,
                    debug: 0,
                    direct_pkts: 0,
                };
                let opts = Attr::nested(TCA_OPTIONS, &[Attr::new(TCA_HTB_INIT, &struct_bytes(&glob))]);
                b.append_attr(&opts);
            }
            QdiscParams::Tbf { rate, burst, latency_us } => {
                let qopt = TcTbfQopt {
                    rate: ratespec(*rate),
                    limit: tbf_limit(*rate, *burst, *latency_us),
                    buffer: *burst,
                    mtu: 1600,
                    ..Default::default()
                };
                let mut children = vec![Attr::new(TCA_TBF_PARMS, &struct_bytes(&qopt))];
                children.push(Attr::u32(TCA_TBF_BURST, *burst));
                if *rate > u32::MAX as u64 {
                    children.push(Attr::u64(TCA_TBF_RATE64, *rate));
                }
                b.append_attr(&Attr::nested(TCA_OPTIONS, &children));
            }
        }

        self.tx.request(b).map_err(map_err)?;
        Ok(())
    }

    /// Adds an HTB class under `parent` with the given handle and rates
    /// (bytes/sec). OPTIONS nests `TCA_HTB_PARMS` (the struct the kernel
    /// actually requires to accept the class) plus RATE64/CEIL64 only
    /// when a rate exceeds 32 bits, per spec §4.4 HTB class create.
    pub fn add_htb_class(&mut self, index: i32, parent: u32, handle: u32, rate: u64, ceil: u64) -> Result<()> {
        let mut b = MessageBuilder::new(libc::RTM_NEWTCLASS as u16, NLM_F_CREATE | NLM_F_EXCL | NLM_F_ACK);
        let mut hdr = TcHeader::default();
        hdr.index = index;
        hdr.handle = handle;
        hdr.parent = parent;
        b.append_struct(&hdr);

        b.append_attr(&Attr::string(TCA_KIND, "htb"));

        let opt = TcHtbOpt {
            rate: ratespec(rate),
            ceil: ratespec(ceil),
            buffer: htb_buffer(rate),
            cbuffer: htb_buffer(ceil),
            quantum: 0,
            level: 0,
            prio: 0,
        };
        let mut children = vec![Attr::new(TCA_HTB_PARMS, &struct_bytes(&opt))];
        if rate > u32::MAX as u64 {
            children.push(Attr::u64(TCA_HTB_RATE64, rate));
        }
        if ceil > u32::MAX as u64 {
            children.push(Attr::u64(TCA_HTB_CEIL64, ceil));
        }
        b.append_attr(&Attr::nested(TCA_OPTIONS, &children));

        self.tx.request(b).map_err(map_err)?;
        Ok(())
    }

    /// Adds a u32 filter on `parent` at `priority` that matches every
    /// packet and classifies into `flow_id` (spec §4.4 Filter create).
    pub fn add_u32_filter(&mut self, index: i32, parent: u32, priority: u16, flow_id: u32) -> Result<()> {
        let mut b = MessageBuilder::new(libc::RTM_NEWTFILTER as u16, NLM_F_CREATE | NLM_F_EXCL | NLM_F_ACK);
        let mut hdr = TcHeader::default();
        hdr.index = index;
        hdr.parent = parent;
        hdr.info = filter_info(priority, libc::ETH_P_IP as u16);
        b.append_struct(&hdr);

        b.append_attr(&Attr::string(TCA_KIND, "u32"));

        let sel = TcU32Sel { nkeys: 1, ..Default::default() };
        let key = TcU32Key::default();
        let mut sel_payload = struct_bytes(&sel);
        sel_payload.extend_from_slice(&struct_bytes(&key));

        let opts = Attr::nested(
            TCA_OPTIONS,
            &[Attr::new(TCA_U32_SEL, &sel_payload), Attr::u32(TCA_U32_CLASSID, flow_id)],
        );
        b.append_attr(&opts);

        self.tx.request(b).map_err(map_err)?;
        Ok(())
    }

    pub fn delete_qdisc(&mut self, index: i32, handle: u32) -> Result<()> {
        let mut b = MessageBuilder::new(libc::RTM_DELQDISC as u16, NLM_F_ACK);
        let mut hdr = TcHeader::default();
        hdr.index = index;
        hdr.handle = handle;
        hdr.parent = TC_H_ROOT;
        b.append_struct(&hdr);

        self.tx.request(b).map_err(map_err)?;
        Ok(())
    }
}

fn map_err(e: NetlinkError) -> NetlinkError {
    match e {
        NetlinkError::NetlinkReply(code) if -code == libc::EEXIST => {
            NetlinkError::AlreadyExists { kind: "qdisc" }
        }
        NetlinkError::NetlinkReply(code) if -code == libc::EBUSY => NetlinkError::Busy { kind: "qdisc" },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_encoding_round_trips() {
        let h = make_handle(1, 10);
        assert_eq!(handle_major(h), 1);
        assert_eq!(handle_minor(h), 10);
    }

    #[test]
    fn root_handle_is_reserved_value() {
        assert_eq!(TC_H_ROOT, 0xFFFF_FFFF);
    }

    #[test]
    fn filter_info_packs_priority_high_and_protocol_big_endian() {
        let info = filter_info(10, libc::ETH_P_IP as u16);
        assert_eq!(info >> 16, 10);
        assert_eq!(info & 0xFFFF, (libc::ETH_P_IP as u16).to_be() as u32);
    }

    #[test]
    fn htb_buffer_has_a_1600_byte_floor() {
        assert_eq!(htb_buffer(1_000), 1600);
        assert_eq!(htb_buffer(1_000_000), 100_000);
    }

    #[test]
    fn tbf_limit_grows_with_rate_and_latency() {
        let low = tbf_limit(1_000_000, 0, 10_000);
        let high = tbf_limit(10_000_000, 0, 10_000);
        assert!(high > low);
    }

    #[test]
    fn ratespec_uses_sentinel_above_32_bits() {
        assert_eq!(ratespec(u32::MAX as u64 + 1).rate, u32::MAX);
        assert_eq!(ratespec(500).rate, 500);
    }

    #[test]
    fn u32_sel_payload_carries_one_trailing_key() {
        let sel = TcU32Sel { nkeys: 1, ..Default::default() };
        let key = TcU32Key::default();
        let mut payload = struct_bytes(&sel);
        payload.extend_from_slice(&struct_bytes(&key));
        assert_eq!(payload.len(), std::mem::size_of::<TcU32Sel>() + std::mem::size_of::<TcU32Key>());
    }
}
