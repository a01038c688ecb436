//! Protocol-level constants for the netlink wire format (NLMSG_* framing,
//! kernel multicast group bits, and the handful of attribute identifiers
//! `libc` doesn't carry).

pub const NLMSG_HDR_LEN: usize = 0x10;
pub const NLMSG_ALIGN_TO: usize = 0x4;
pub const RTA_ALIGN_TO: usize = 0x4;
pub const RTA_HDR_LEN: usize = 0x4;

pub const NLMSG_NOOP: u16 = 1;
pub const NLMSG_ERROR: u16 = 2;
pub const NLMSG_DONE: u16 = 3;
pub const NLMSG_OVERRUN: u16 = 4;

pub const PID_KERNEL: u32 = 0;

pub const RECV_BUF_SIZE: usize = 32 * 1024;

// Multicast group bits (RTMGRP_*), used to build the event monitor's
// subscription mask. These are bit positions, not the newer
// setsockopt(NETLINK_ADD_MEMBERSHIP) group numbers — the teacher binds
// with a groups bitmask on the socket address, which is how this family
// has always supported subscribing without an extra syscall.
pub const RTMGRP_LINK: u32 = 1;
pub const RTMGRP_IPV4_IFADDR: u32 = 0x10;
pub const RTMGRP_IPV4_ROUTE: u32 = 0x40;
pub const RTMGRP_IPV6_IFADDR: u32 = 0x100;
pub const RTMGRP_IPV6_ROUTE: u32 = 0x400;
pub const RTMGRP_NEIGH: u32 = 0x80;

pub const DEFAULT_MONITOR_GROUPS: u32 = RTMGRP_LINK
    | RTMGRP_IPV4_IFADDR
    | RTMGRP_IPV6_IFADDR
    | RTMGRP_IPV4_ROUTE
    | RTMGRP_IPV6_ROUTE
    | RTMGRP_NEIGH;

// Attributes not exposed by the `libc` crate.
pub const RTA_VIA: u16 = 18;
pub const RTA_NEWDST: u16 = 19;
pub const RTA_MULTIPATH: u16 = 8;

pub const IFLA_AF_SPEC: u16 = 26;
pub const IFLA_NET_NS_FD: u16 = 28;
pub const IFLA_NET_NS_PID: u16 = 19;
pub const IFLA_LINK_NETNSID: u16 = 37;
pub const IFLA_STATS64: u16 = 23;
pub const IFLA_STATS: u16 = 7;
pub const IFLA_CARRIER: u16 = 33;

pub const IFLA_INFO_KIND: u16 = 1;
pub const IFLA_INFO_DATA: u16 = 2;

pub const IFLA_VLAN_ID: u16 = 1;
pub const IFLA_VLAN_FLAGS: u16 = 2;

pub const IFLA_BOND_MODE: u16 = 1;

pub const IFLA_BR_VLAN_FILTERING: u16 = 15;

pub const VETH_INFO_PEER: u16 = 1;

pub const IFLA_VXLAN_ID: u16 = 1;
pub const IFLA_VXLAN_GROUP: u16 = 2;
pub const IFLA_VXLAN_LINK: u16 = 3;
pub const IFLA_VXLAN_LOCAL: u16 = 4;
pub const IFLA_VXLAN_TTL: u16 = 5;
pub const IFLA_VXLAN_TOS: u16 = 6;
pub const IFLA_VXLAN_LEARNING: u16 = 7;
pub const IFLA_VXLAN_PORT: u16 = 17;
pub const IFLA_VXLAN_GROUP6: u16 = 20;
pub const IFLA_VXLAN_LOCAL6: u16 = 21;

pub const IFLA_GRE_LOCAL: u16 = 4;
pub const IFLA_GRE_REMOTE: u16 = 5;
pub const IFLA_GRE_TTL: u16 = 8;

pub const AF_BRIDGE: u8 = libc::AF_BRIDGE as u8;
pub const NTF_SELF: u8 = 0x02;
pub const NUD_PERMANENT: u16 = 0x80;
pub const NUD_REACHABLE: u16 = 0x02;
pub const NUD_STALE: u16 = 0x04;

pub const BRIDGE_VLAN_INFO: u16 = 2;

pub const FRA_TABLE: u16 = 15;
pub const FRA_DST: u16 = 1;
pub const FRA_SRC: u16 = 2;
pub const FRA_PRIORITY: u16 = 6;
pub const FR_ACT_TO_TBL: u8 = 1;

// Traffic control
pub const TC_H_ROOT: u32 = 0xFFFF_FFFF;
pub const TC_H_INGRESS: u32 = 0xFFFF_FFF1;
pub const TC_H_CLSACT: u32 = TC_H_INGRESS;
pub const TC_H_UNSPEC: u32 = 0;

pub const TCA_KIND: u16 = 1;
pub const TCA_OPTIONS: u16 = 2;
pub const TCA_RATE64: u16 = 18;
pub const TCA_HTB_PARMS: u16 = 1;
pub const TCA_HTB_INIT: u16 = 2;
pub const TCA_HTB_RATE64: u16 = 6;
pub const TCA_HTB_CEIL64: u16 = 7;
pub const TCA_U32_SEL: u16 = 1;
pub const TCA_U32_CLASSID: u16 = 4;

pub const TCA_TBF_PARMS: u16 = 1;
pub const TCA_TBF_RATE64: u16 = 4;
pub const TCA_TBF_BURST: u16 = 6;
