//! Static description of every protocol field the engine knows about.
//!
//! The catalog is a constant table indexed by [`FieldId`]. Fields of a header are listed in wire
//! order. A field with a nonzero `merge_count` leads a group made of itself and the
//! `merge_count` following fields: the group is packed MSB-first and written at once.

use crate::error::ConfigError;
use std::fmt;
use std::str::FromStr;

/// Identifier of a catalog field. The discriminant is the index in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldId {
    Preamble,
    EthDest,
    EthSrc,
    EtherType,
    LlcDsap,
    LlcSsap,
    LlcControl,
    SnapOui,
    SnapPid,
    VlanTpid,
    VlanPcp,
    VlanCfi,
    VlanVid,
    MplsLabel,
    MplsExp,
    MplsBos,
    MplsTtl,
    Ipv4Version,
    Ipv4Ihl,
    Ipv4Tos,
    Ipv4TotalLen,
    Ipv4Id,
    Ipv4Flags,
    Ipv4FragOffset,
    Ipv4Ttl,
    Ipv4Protocol,
    Ipv4Checksum,
    Ipv4Src,
    Ipv4Dest,
    Ipv4Options,
    Ipv4Padding,
    Ipv6Version,
    Ipv6TrafficClass,
    Ipv6FlowLabel,
    Ipv6PayloadLen,
    Ipv6NextHeader,
    Ipv6HopLimit,
    Ipv6Src,
    Ipv6Dest,
    ArpHwType,
    ArpProtoType,
    ArpHwLen,
    ArpProtoLen,
    ArpOpcode,
    ArpSenderHw,
    ArpSenderProto,
    ArpTargetHw,
    ArpTargetProto,
    TcpSrcPort,
    TcpDestPort,
    TcpSeq,
    TcpAck,
    TcpDataOffset,
    TcpReserved,
    TcpUrg,
    TcpAckFlag,
    TcpPsh,
    TcpRst,
    TcpSyn,
    TcpFin,
    TcpWindow,
    TcpChecksum,
    TcpUrgPtr,
    TcpOptions,
    TcpPadding,
    UdpSrcPort,
    UdpDestPort,
    UdpLen,
    UdpChecksum,
    PauseOpcode,
    PauseQuanta,
    PfcOpcode,
    PfcPriorityEnable,
    PfcQuanta0,
    PfcQuanta1,
    PfcQuanta2,
    PfcQuanta3,
    PfcQuanta4,
    PfcQuanta5,
    PfcQuanta6,
    PfcQuanta7,
}

/// Textual formats of the pattern fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Mac,
    Ipv4,
    Ipv6,
    Preamble,
}

impl PatternKind {
    pub fn bit_len(&self) -> usize {
        match self {
            PatternKind::Mac => 48,
            PatternKind::Ipv4 => 32,
            PatternKind::Ipv6 => 128,
            PatternKind::Preamble => 64,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PatternKind::Mac => "MAC address",
            PatternKind::Ipv4 => "IPv4 address",
            PatternKind::Ipv6 => "IPv6 address",
            PatternKind::Preamble => "preamble",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    Pattern(PatternKind),
}

/// Value written in a field that no generation spec overrides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    Integer(u64),
    Pattern(&'static [u8]),
}

impl FieldDefault {
    /// Numeric form of the default, patterns being read as big-endian integers.
    pub fn as_u128(&self) -> u128 {
        match self {
            FieldDefault::Integer(v) => *v as u128,
            FieldDefault::Pattern(bytes) => bytes.iter().fold(0, |acc, b| (acc << 8) | *b as u128),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub id: FieldId,
    pub name: &'static str,
    pub bit_len: usize,
    /// Number of following fields packed with this one (0 for standalone fields and followers)
    pub merge_count: usize,
    pub kind: ValueKind,
    pub default: FieldDefault,
}

const fn int(id: FieldId, name: &'static str, bit_len: usize, default: u64) -> FieldDescriptor {
    FieldDescriptor {
        id,
        name,
        bit_len,
        merge_count: 0,
        kind: ValueKind::Integer,
        default: FieldDefault::Integer(default),
    }
}

const fn leader(
    id: FieldId,
    name: &'static str,
    bit_len: usize,
    merge_count: usize,
    default: u64,
) -> FieldDescriptor {
    FieldDescriptor {
        id,
        name,
        bit_len,
        merge_count,
        kind: ValueKind::Integer,
        default: FieldDefault::Integer(default),
    }
}

const fn pattern(
    id: FieldId,
    name: &'static str,
    kind: PatternKind,
    default: &'static [u8],
) -> FieldDescriptor {
    FieldDescriptor {
        id,
        name,
        bit_len: default.len() * 8,
        merge_count: 0,
        kind: ValueKind::Pattern(kind),
        default: FieldDefault::Pattern(default),
    }
}

const PREAMBLE: &[u8] = &[0x55, 0x55, 0x55, 0x55, 0x55, 0x55, 0x55, 0x5d];
const MAC_DEST: &[u8] = &[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff];
const MAC_SRC: &[u8] = &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66];
const IPV4_SRC: &[u8] = &[192, 168, 0, 1];
const IPV4_DEST: &[u8] = &[0x11, 0x22, 0x33, 0x44];
const IPV6_ANY: &[u8] = &[0; 16];
const MAC_ZERO: &[u8] = &[0; 6];

use FieldId::*;

static CATALOG: [FieldDescriptor; 81] = [
    pattern(Preamble, "preamble", PatternKind::Preamble, PREAMBLE),
    pattern(EthDest, "eth_dest", PatternKind::Mac, MAC_DEST),
    pattern(EthSrc, "eth_src", PatternKind::Mac, MAC_SRC),
    int(EtherType, "ether_type", 16, 0x0800),
    int(LlcDsap, "llc_dsap", 8, 0xaa),
    int(LlcSsap, "llc_ssap", 8, 0xaa),
    int(LlcControl, "llc_control", 8, 0x03),
    int(SnapOui, "snap_oui", 24, 0),
    int(SnapPid, "snap_pid", 16, 0),
    int(VlanTpid, "vlan_tpid", 16, 0x8100),
    leader(VlanPcp, "vlan_pcp", 3, 2, 0),
    int(VlanCfi, "vlan_cfi", 1, 0),
    int(VlanVid, "vlan_vid", 12, 0),
    leader(MplsLabel, "mpls_label", 20, 2, 0),
    int(MplsExp, "mpls_exp", 3, 0),
    int(MplsBos, "mpls_bos", 1, 0),
    int(MplsTtl, "mpls_ttl", 8, 64),
    leader(Ipv4Version, "ipv4_version", 4, 1, 4),
    int(Ipv4Ihl, "ipv4_ihl", 4, 5),
    int(Ipv4Tos, "ipv4_tos", 8, 0),
    int(Ipv4TotalLen, "ipv4_total_len", 16, 0),
    int(Ipv4Id, "ipv4_id", 16, 0),
    leader(Ipv4Flags, "ipv4_flags", 3, 1, 0),
    int(Ipv4FragOffset, "ipv4_frag_offset", 13, 0),
    int(Ipv4Ttl, "ipv4_ttl", 8, 64),
    int(Ipv4Protocol, "ipv4_protocol", 8, 0),
    int(Ipv4Checksum, "ipv4_checksum", 16, 0),
    pattern(Ipv4Src, "ipv4_src", PatternKind::Ipv4, IPV4_SRC),
    pattern(Ipv4Dest, "ipv4_dest", PatternKind::Ipv4, IPV4_DEST),
    int(Ipv4Options, "ipv4_options", 0, 0),
    int(Ipv4Padding, "ipv4_padding", 0, 0),
    leader(Ipv6Version, "ipv6_version", 4, 2, 6),
    int(Ipv6TrafficClass, "ipv6_traffic_class", 8, 0),
    int(Ipv6FlowLabel, "ipv6_flow_label", 20, 0),
    int(Ipv6PayloadLen, "ipv6_payload_len", 16, 0),
    int(Ipv6NextHeader, "ipv6_next_header", 8, 59),
    int(Ipv6HopLimit, "ipv6_hop_limit", 8, 64),
    pattern(Ipv6Src, "ipv6_src", PatternKind::Ipv6, IPV6_ANY),
    pattern(Ipv6Dest, "ipv6_dest", PatternKind::Ipv6, IPV6_ANY),
    int(ArpHwType, "arp_hw_type", 16, 1),
    int(ArpProtoType, "arp_proto_type", 16, 0x0800),
    int(ArpHwLen, "arp_hw_len", 8, 6),
    int(ArpProtoLen, "arp_proto_len", 8, 4),
    int(ArpOpcode, "arp_opcode", 16, 1),
    pattern(ArpSenderHw, "arp_sender_hw", PatternKind::Mac, MAC_SRC),
    pattern(ArpSenderProto, "arp_sender_proto", PatternKind::Ipv4, IPV4_SRC),
    pattern(ArpTargetHw, "arp_target_hw", PatternKind::Mac, MAC_ZERO),
    pattern(ArpTargetProto, "arp_target_proto", PatternKind::Ipv4, IPV4_DEST),
    int(TcpSrcPort, "tcp_src_port", 16, 0),
    int(TcpDestPort, "tcp_dest_port", 16, 0),
    int(TcpSeq, "tcp_seq", 32, 0),
    int(TcpAck, "tcp_ack", 32, 0),
    leader(TcpDataOffset, "tcp_data_offset", 4, 7, 5),
    int(TcpReserved, "tcp_reserved", 6, 0),
    int(TcpUrg, "tcp_urg", 1, 0),
    int(TcpAckFlag, "tcp_ack_flag", 1, 0),
    int(TcpPsh, "tcp_psh", 1, 0),
    int(TcpRst, "tcp_rst", 1, 0),
    int(TcpSyn, "tcp_syn", 1, 0),
    int(TcpFin, "tcp_fin", 1, 0),
    int(TcpWindow, "tcp_window", 16, 64),
    int(TcpChecksum, "tcp_checksum", 16, 0),
    int(TcpUrgPtr, "tcp_urg_ptr", 16, 0),
    int(TcpOptions, "tcp_options", 0, 0),
    int(TcpPadding, "tcp_padding", 0, 0),
    int(UdpSrcPort, "udp_src_port", 16, 0),
    int(UdpDestPort, "udp_dest_port", 16, 0),
    int(UdpLen, "udp_len", 16, 0),
    int(UdpChecksum, "udp_checksum", 16, 0),
    int(PauseOpcode, "pause_opcode", 16, 0x0001),
    int(PauseQuanta, "pause_quanta", 16, 0),
    int(PfcOpcode, "pfc_opcode", 16, 0x0101),
    int(PfcPriorityEnable, "pfc_priority_enable", 16, 0),
    int(PfcQuanta0, "pfc_quanta_0", 16, 0),
    int(PfcQuanta1, "pfc_quanta_1", 16, 0),
    int(PfcQuanta2, "pfc_quanta_2", 16, 0),
    int(PfcQuanta3, "pfc_quanta_3", 16, 0),
    int(PfcQuanta4, "pfc_quanta_4", 16, 0),
    int(PfcQuanta5, "pfc_quanta_5", 16, 0),
    int(PfcQuanta6, "pfc_quanta_6", 16, 0),
    int(PfcQuanta7, "pfc_quanta_7", 16, 0),
];

/// Catalog entry of a field, in constant time
pub fn lookup(id: FieldId) -> &'static FieldDescriptor {
    &CATALOG[id as usize]
}

/// All catalog entries, in identifier order
pub fn descriptors() -> &'static [FieldDescriptor] {
    &CATALOG
}

impl FieldId {
    pub fn name(&self) -> &'static str {
        lookup(*self).name
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FieldId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CATALOG
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(s))
            .map(|d| d.id)
            .ok_or_else(|| ConfigError::UnknownName {
                kind: "field",
                name: s.to_string(),
            })
    }
}

/// Protocol headers that can be stacked in a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderType {
    Preamble,
    Ethernet,
    Llc,
    Snap,
    Vlan,
    Mpls,
    Ipv4,
    Ipv6,
    Arp,
    Tcp,
    Udp,
    Pause,
    Pfc,
    /// Ad-hoc list of catalog fields
    Custom,
}

const HEADER_NAMES: [(HeaderType, &str); 14] = [
    (HeaderType::Preamble, "preamble"),
    (HeaderType::Ethernet, "ethernet"),
    (HeaderType::Llc, "llc"),
    (HeaderType::Snap, "snap"),
    (HeaderType::Vlan, "vlan"),
    (HeaderType::Mpls, "mpls"),
    (HeaderType::Ipv4, "ipv4"),
    (HeaderType::Ipv6, "ipv6"),
    (HeaderType::Arp, "arp"),
    (HeaderType::Tcp, "tcp"),
    (HeaderType::Udp, "udp"),
    (HeaderType::Pause, "pause"),
    (HeaderType::Pfc, "pfc"),
    (HeaderType::Custom, "custom"),
];

impl HeaderType {
    pub fn name(&self) -> &'static str {
        HEADER_NAMES
            .iter()
            .find(|(h, _)| h == self)
            .map(|(_, n)| *n)
            .unwrap_or("custom")
    }

    /// EtherType announcing this header, when it can follow an Ethernet header
    pub fn ether_type(&self) -> Option<u64> {
        match self {
            HeaderType::Ipv4 => Some(0x0800),
            HeaderType::Ipv6 => Some(0x86dd),
            HeaderType::Arp => Some(0x0806),
            HeaderType::Mpls => Some(0x8847),
            HeaderType::Pause | HeaderType::Pfc => Some(0x8808),
            _ => None,
        }
    }

    /// IP protocol number announcing this header
    pub fn ip_protocol(&self) -> Option<u64> {
        match self {
            HeaderType::Tcp => Some(6),
            HeaderType::Udp => Some(17),
            _ => None,
        }
    }
}

impl fmt::Display for HeaderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HeaderType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HEADER_NAMES
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(s))
            .map(|(h, _)| *h)
            .ok_or_else(|| ConfigError::UnknownName {
                kind: "header",
                name: s.to_string(),
            })
    }
}

/// Fields of a header, in wire order. Custom headers carry their own list.
pub fn fields_of(header: HeaderType) -> &'static [FieldId] {
    match header {
        HeaderType::Preamble => &[Preamble],
        HeaderType::Ethernet => &[EthDest, EthSrc, EtherType],
        HeaderType::Llc => &[LlcDsap, LlcSsap, LlcControl],
        HeaderType::Snap => &[SnapOui, SnapPid],
        HeaderType::Vlan => &[VlanTpid, VlanPcp, VlanCfi, VlanVid],
        HeaderType::Mpls => &[MplsLabel, MplsExp, MplsBos, MplsTtl],
        HeaderType::Ipv4 => &[
            Ipv4Version,
            Ipv4Ihl,
            Ipv4Tos,
            Ipv4TotalLen,
            Ipv4Id,
            Ipv4Flags,
            Ipv4FragOffset,
            Ipv4Ttl,
            Ipv4Protocol,
            Ipv4Checksum,
            Ipv4Src,
            Ipv4Dest,
            Ipv4Options,
            Ipv4Padding,
        ],
        HeaderType::Ipv6 => &[
            Ipv6Version,
            Ipv6TrafficClass,
            Ipv6FlowLabel,
            Ipv6PayloadLen,
            Ipv6NextHeader,
            Ipv6HopLimit,
            Ipv6Src,
            Ipv6Dest,
        ],
        HeaderType::Arp => &[
            ArpHwType,
            ArpProtoType,
            ArpHwLen,
            ArpProtoLen,
            ArpOpcode,
            ArpSenderHw,
            ArpSenderProto,
            ArpTargetHw,
            ArpTargetProto,
        ],
        HeaderType::Tcp => &[
            TcpSrcPort,
            TcpDestPort,
            TcpSeq,
            TcpAck,
            TcpDataOffset,
            TcpReserved,
            TcpUrg,
            TcpAckFlag,
            TcpPsh,
            TcpRst,
            TcpSyn,
            TcpFin,
            TcpWindow,
            TcpChecksum,
            TcpUrgPtr,
            TcpOptions,
            TcpPadding,
        ],
        HeaderType::Udp => &[UdpSrcPort, UdpDestPort, UdpLen, UdpChecksum],
        HeaderType::Pause => &[PauseOpcode, PauseQuanta],
        HeaderType::Pfc => &[
            PfcOpcode,
            PfcPriorityEnable,
            PfcQuanta0,
            PfcQuanta1,
            PfcQuanta2,
            PfcQuanta3,
            PfcQuanta4,
            PfcQuanta5,
            PfcQuanta6,
            PfcQuanta7,
        ],
        HeaderType::Custom => &[],
    }
}

/// Check the layout of a field sequence and return its length in bits.
///
/// Every merge group must start on a byte boundary and span whole bytes, and so must the whole
/// sequence. A group whose followers are missing from the sequence is rejected as well.
pub fn check_layout<'a>(
    fields: impl IntoIterator<Item = &'a FieldDescriptor>,
) -> Result<usize, ConfigError> {
    let fields: Vec<&FieldDescriptor> = fields.into_iter().collect();
    let mut offset = 0;
    let mut i = 0;
    while i < fields.len() {
        let lead = fields[i];
        if lead.merge_count > 0 {
            let group = &fields[i..fields.len().min(i + lead.merge_count + 1)];
            let bits: usize = group.iter().map(|f| f.bit_len).sum();
            let complete = group.len() == lead.merge_count + 1
                && group
                    .iter()
                    .zip(&CATALOG[lead.id as usize..])
                    .all(|(f, d)| f.id == d.id);
            if !complete || offset % 8 != 0 || bits % 8 != 0 {
                return Err(ConfigError::MergeGroupNotAligned {
                    leader: lead.id,
                    offset,
                    bits,
                });
            }
            offset += bits;
            i += group.len();
        } else {
            offset += lead.bit_len;
            i += 1;
        }
    }
    if offset % 8 != 0 {
        return Err(ConfigError::NotByteAligned { bits: offset });
    }
    Ok(offset)
}

/// Verify that every builtin header has a valid layout.
pub fn check_catalog() -> Result<(), ConfigError> {
    for (header, _) in HEADER_NAMES.iter() {
        check_layout(fields_of(*header).iter().map(|id| lookup(*id)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_indexing() {
        for (i, d) in CATALOG.iter().enumerate() {
            assert_eq!(d.id as usize, i, "{} is misplaced", d.name);
        }
        assert_eq!(lookup(FieldId::TcpWindow).bit_len, 16);
        assert_eq!(lookup(FieldId::Ipv6Dest).bit_len, 128);
    }

    #[test]
    fn test_catalog_layout() {
        check_catalog().unwrap();
        let bits = |h| check_layout(fields_of(h).iter().map(|id| lookup(*id))).unwrap();
        assert_eq!(bits(HeaderType::Ethernet), 112);
        assert_eq!(bits(HeaderType::Ipv4), 160);
        assert_eq!(bits(HeaderType::Ipv6), 320);
        assert_eq!(bits(HeaderType::Tcp), 160);
        assert_eq!(bits(HeaderType::Udp), 64);
        assert_eq!(bits(HeaderType::Arp), 224);
        assert_eq!(bits(HeaderType::Vlan), 32);
        assert_eq!(bits(HeaderType::Mpls), 32);
        assert_eq!(bits(HeaderType::Pfc), 160);
    }

    #[test]
    fn test_broken_merge_group() {
        let fields = [lookup(FieldId::TcpSrcPort), lookup(FieldId::TcpReserved)];
        assert_eq!(
            check_layout(fields),
            Err(ConfigError::NotByteAligned { bits: 22 })
        );
        let fields = [lookup(FieldId::VlanPcp), lookup(FieldId::VlanVid)];
        assert!(matches!(
            check_layout(fields),
            Err(ConfigError::MergeGroupNotAligned { leader: FieldId::VlanPcp, .. })
        ));
    }

    #[test]
    fn test_names() {
        assert_eq!("ipv4_ttl".parse::<FieldId>(), Ok(FieldId::Ipv4Ttl));
        assert_eq!("TCP".parse::<HeaderType>(), Ok(HeaderType::Tcp));
        assert!("ipv5".parse::<HeaderType>().is_err());
        assert_eq!(FieldDefault::Pattern(IPV4_SRC).as_u128(), 0xc0a8_0001);
    }
}
