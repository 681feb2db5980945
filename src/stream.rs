//! Streams: ordered headers, stream properties and user-defined fields, and the bootstrap that
//! turns them into a ready-to-mutate principal frame.

use crate::catalog::{self, FieldDescriptor, FieldId, HeaderType, ValueKind};
use crate::error::{CapacityError, ConfigError, Result};
use crate::header::{FieldInstance, Header};
use crate::pattern;
use crate::payload::{self, PayloadSpec, Payloads};
use crate::policy::{self, FieldState, GenSpec};
use crate::splice;

use std::fmt::Write;

/// Hands out stream and port identifiers. Owned by whoever orchestrates the streams.
#[derive(Debug, Default)]
pub struct IdCounter {
    next: u32,
}

impl IdCounter {
    pub fn new() -> Self {
        IdCounter::default()
    }

    pub fn next_id(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Delays carried for the transmit path, in byte times
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub inter_frame_gap: u64,
    pub inter_burst_gap: u64,
    pub inter_stream_gap: u64,
    pub start_delay: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            inter_frame_gap: 12,
            inter_burst_gap: 12,
            inter_stream_gap: 12,
            start_delay: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamProperties {
    /// Frame size in bytes, headers included
    pub frame_len: GenSpec<u64>,
    pub payload: PayloadSpec,
    /// Number of frames of the stream
    pub burst_size: u64,
    pub timing: Timing,
}

impl Default for StreamProperties {
    fn default() -> Self {
        StreamProperties {
            frame_len: GenSpec::Fixed { value: 64 },
            payload: PayloadSpec::default(),
            burst_size: 10,
            timing: Timing::default(),
        }
    }
}

/// A stream property with its value
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    FrameLen(GenSpec<u64>),
    Payload(PayloadSpec),
    BurstSize(u64),
    InterFrameGap(u64),
    InterBurstGap(u64),
    InterStreamGap(u64),
    StartDelay(u64),
}

/// A user-defined field: arbitrary bits of the frame driven by their own spec
#[derive(Debug, Clone, PartialEq)]
pub struct Udf {
    pub name: String,
    pub bit_offset: usize,
    pub bit_len: usize,
    pub spec: GenSpec<u64>,
}

/// A field placed in the frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameField {
    pub descriptor: &'static FieldDescriptor,
    /// Offset in bits from the start of the frame
    pub offset: usize,
    /// Value written in the principal frame
    pub baseline: u128,
    /// Policy name, for mutable fields
    pub policy: Option<&'static str>,
}

/// Field rewritten for every frame
#[derive(Debug, Clone)]
pub(crate) struct ActiveField {
    pub name: String,
    pub offset: usize,
    pub bit_len: usize,
    pub state: FieldState,
    pub last: u128,
    pub exhausted: bool,
}

impl ActiveField {
    fn new(name: &str, offset: usize, bit_len: usize, state: FieldState) -> Self {
        ActiveField {
            name: name.to_string(),
            offset,
            bit_len,
            state,
            last: 0,
            exhausted: false,
        }
    }
}

/// Length field recomputed from the size of each frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AutoLength {
    pub offset: usize,
    pub bit_len: usize,
    /// Bytes of the frame not counted by the field
    pub excluded: usize,
}

/// Everything derived from a stream by its bootstrap
#[derive(Debug, Clone)]
pub(crate) struct Bootstrapped {
    pub fields: Vec<FrameField>,
    pub header_len: usize,
    pub active: Vec<ActiveField>,
    pub udfs: Vec<ActiveField>,
    pub auto_lengths: Vec<AutoLength>,
    pub sizes: Vec<usize>,
    /// Start the size table over once used up, otherwise keep the last size
    pub repeat_sizes: bool,
    pub payloads: Payloads,
    /// Principal frame, as long as the largest frame of the stream
    pub principal: Vec<u8>,
}

/// A field during collation, with the header it comes from
struct Slot {
    field: FieldInstance,
    /// Index of the header the field was declared in
    header: usize,
    /// Index of the header after which the field sits on the wire
    link: usize,
}

#[derive(Debug, Clone)]
pub struct Stream {
    id: u32,
    name: String,
    headers: Vec<Header>,
    properties: StreamProperties,
    udfs: Vec<Udf>,
    bootstrapped: Option<Bootstrapped>,
}

impl Stream {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Stream {
            id,
            name: name.into(),
            headers: vec![],
            properties: StreamProperties::default(),
            udfs: vec![],
            bootstrapped: None,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    pub fn properties(&self) -> &StreamProperties {
        &self.properties
    }

    pub fn udfs(&self) -> &[Udf] {
        &self.udfs
    }

    /// Append a header. Headers are laid out on the wire in attachment order.
    pub fn attach_header(&mut self, header: Header) {
        self.bootstrapped = None;
        self.headers.push(header);
    }

    pub fn set_property(&mut self, property: Property) -> Result<()> {
        self.bootstrapped = None;
        let timing = &mut self.properties.timing;
        match property {
            Property::FrameLen(spec) => {
                policy::validate(&spec.widen(), "frame length", 64)?;
                self.properties.frame_len = spec;
            }
            Property::Payload(spec) => self.properties.payload = spec,
            Property::BurstSize(0) => {
                return Err(ConfigError::InvalidSpec {
                    target: "burst size".to_string(),
                    reason: "a burst holds at least one frame".to_string(),
                }
                .into())
            }
            Property::BurstSize(n) => self.properties.burst_size = n,
            Property::InterFrameGap(v) => timing.inter_frame_gap = v,
            Property::InterBurstGap(v) => timing.inter_burst_gap = v,
            Property::InterStreamGap(v) => timing.inter_stream_gap = v,
            Property::StartDelay(v) => timing.start_delay = v,
        }
        Ok(())
    }

    /// Add a user-defined field, at most 64 bits wide.
    pub fn add_udf(&mut self, udf: Udf) -> Result<()> {
        if udf.bit_len > splice::MAX_INTEGER_BITS {
            return Err(CapacityError::FieldTooWide {
                target: udf.name,
                bits: udf.bit_len,
                max: splice::MAX_INTEGER_BITS,
            }
            .into());
        }
        let spec = udf.spec.widen();
        if udf.bit_len == 0 || matches!(spec, GenSpec::WeightedDistribution { .. }) {
            return Err(ConfigError::InvalidSpec {
                target: udf.name,
                reason: "user-defined fields need a nonzero width and a field policy".to_string(),
            }
            .into());
        }
        policy::validate(&spec, &udf.name, udf.bit_len)?;
        self.bootstrapped = None;
        self.udfs.push(udf);
        Ok(())
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrapped.is_some()
    }

    pub(crate) fn bootstrapped(&self) -> std::result::Result<&Bootstrapped, ConfigError> {
        self.bootstrapped
            .as_ref()
            .ok_or(ConfigError::NotBootstrapped(self.id))
    }

    /// Fields in wire order with their offsets, once bootstrapped
    pub fn layout(&self) -> Option<&[FrameField]> {
        self.bootstrapped.as_ref().map(|b| b.fields.as_slice())
    }

    /// Offset in bits of a field, once bootstrapped
    pub fn field_offset(&self, id: FieldId) -> Option<usize> {
        self.layout()?
            .iter()
            .find(|f| f.descriptor.id == id)
            .map(|f| f.offset)
    }

    /// Length of the headers in bytes, once bootstrapped
    pub fn header_len(&self) -> Option<usize> {
        self.bootstrapped.as_ref().map(|b| b.header_len)
    }

    /// The frame every generated frame starts from, at the size of the first frame
    pub fn principal_frame(&self) -> Option<&[u8]> {
        self.bootstrapped
            .as_ref()
            .map(|b| &b.principal[..b.sizes[0]])
    }

    /// Compute everything needed to generate frames: field offsets, runtime states, frame sizes,
    /// payloads and the principal frame.
    pub fn bootstrap(&mut self) -> Result<()> {
        if self.headers.is_empty() {
            return Err(ConfigError::EmptyStream(self.id).into());
        }

        let slots = self.collate();
        let bits = catalog::check_layout(slots.iter().map(|s| s.field.descriptor))?;
        let header_len = bits / 8;

        // offsets, and start of every header in bytes
        let mut offsets = Vec::with_capacity(slots.len());
        let mut header_starts = vec![None; self.headers.len()];
        let mut offset = 0;
        for slot in slots.iter() {
            offsets.push(offset);
            let start = &mut header_starts[slot.header];
            if start.is_none() {
                *start = Some(offset / 8);
            }
            offset += slot.field.descriptor.bit_len;
        }

        let mut fields = Vec::with_capacity(slots.len());
        let mut active = vec![];
        let mut auto_lengths = vec![];
        for (slot, offset) in slots.iter().zip(offsets) {
            let descriptor = slot.field.descriptor;
            let mut baseline = descriptor.default.as_u128();
            let mut policy = None;
            if let Some(spec) = &slot.field.spec {
                let spec = spec.resolve(descriptor)?;
                if let Some(value) = spec.fixed_value() {
                    baseline = *value;
                }
                policy = Some(spec.policy_name());
                let state = FieldState::new(spec, descriptor.bit_len)?;
                active.push(ActiveField::new(
                    descriptor.name,
                    offset,
                    descriptor.bit_len,
                    state,
                ));
            } else {
                let start = header_starts[slot.header].unwrap_or(0);
                if let Some(value) = self.linked_value(slot) {
                    baseline = value;
                }
                if let Some(excluded) = auto_length(descriptor.id, start) {
                    auto_lengths.push(AutoLength {
                        offset,
                        bit_len: descriptor.bit_len,
                        excluded,
                    });
                }
            }
            fields.push(FrameField {
                descriptor,
                offset,
                baseline,
                policy,
            });
        }

        let sizes = payload::size_table(&self.properties.frame_len, header_len)?;
        let smallest = sizes.iter().copied().min().unwrap_or(header_len);
        let largest = sizes.iter().copied().max().unwrap_or(header_len);

        let mut udfs = Vec::with_capacity(self.udfs.len());
        for udf in self.udfs.iter() {
            let end = udf.bit_offset + udf.bit_len;
            if end > smallest * 8 {
                return Err(ConfigError::UdfOutOfFrame {
                    name: udf.name.clone(),
                    end,
                    frame_bits: smallest * 8,
                }
                .into());
            }
            let state = FieldState::new(udf.spec.widen(), udf.bit_len)?;
            udfs.push(ActiveField::new(&udf.name, udf.bit_offset, udf.bit_len, state));
        }

        let payloads = Payloads::build(&self.properties.payload)?;
        let mut principal = vec![0; largest];
        write_fields(&mut principal, &fields);
        let first = sizes[0];
        principal[header_len..first].copy_from_slice(&payloads.for_frame(0)[..first - header_len]);
        for auto in auto_lengths.iter() {
            auto.write(&mut principal, first);
        }
        for udf in self.udfs.iter() {
            if let Some(value) = udf.spec.fixed_value() {
                splice::splice(&mut principal, udf.bit_offset, udf.bit_len, *value);
            }
        }

        log::debug!(
            "Stream {} bootstrapped: {} fields over {} bytes, {} mutable, {} frame size(s)",
            self.id,
            fields.len(),
            header_len,
            active.len() + udfs.len(),
            sizes.len()
        );
        self.bootstrapped = Some(Bootstrapped {
            fields,
            header_len,
            active,
            udfs,
            auto_lengths,
            sizes,
            repeat_sizes: self.properties.frame_len.repeats(),
            payloads,
            principal,
        });
        Ok(())
    }

    /// Flatten the headers, moving the EtherType of an Ethernet header behind its VLAN tags.
    fn collate(&self) -> Vec<Slot> {
        let mut slots: Vec<Slot> = self
            .headers
            .iter()
            .enumerate()
            .flat_map(|(i, h)| {
                h.fields().iter().map(move |f| Slot {
                    field: f.clone(),
                    header: i,
                    link: i,
                })
            })
            .collect();
        for (i, h) in self.headers.iter().enumerate() {
            if h.header_type() != HeaderType::Ethernet {
                continue;
            }
            let tags = self.headers[i + 1..]
                .iter()
                .take_while(|h| h.header_type() == HeaderType::Vlan)
                .count();
            if tags == 0 {
                continue;
            }
            let last_tag = i + tags;
            let from = slots
                .iter()
                .position(|s| s.header == i && s.field.id() == FieldId::EtherType);
            if let Some(from) = from {
                let mut slot = slots.remove(from);
                slot.link = last_tag;
                let to = slots
                    .iter()
                    .rposition(|s| s.header == last_tag)
                    .map_or(slots.len(), |p| p + 1);
                log::trace!("EtherType of header {i} moved after {tags} VLAN tag(s)");
                slots.insert(to, slot);
            }
        }
        slots
    }

    /// Value of a protocol selector deduced from the header that follows it
    fn linked_value(&self, slot: &Slot) -> Option<u128> {
        let owner = self.headers[slot.header].header_type();
        let next = self.headers.get(slot.link + 1).map(|h| h.header_type());
        let value = match (owner, slot.field.id()) {
            (HeaderType::Ethernet, FieldId::EtherType) => next?.ether_type()?,
            (HeaderType::Ipv4, FieldId::Ipv4Protocol) | (HeaderType::Ipv6, FieldId::Ipv6NextHeader) => {
                next?.ip_protocol()?
            }
            (HeaderType::Mpls, FieldId::MplsBos) => (next != Some(HeaderType::Mpls)) as u64,
            _ => return None,
        };
        Some(value as u128)
    }

    /// Human readable description of the stream and, once bootstrapped, of its layout
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let p = &self.properties;
        let _ = writeln!(
            out,
            "stream {} \"{}\": {} header(s), frame length {}, payload {:?}, burst of {}, {:?}",
            self.id,
            self.name,
            self.headers.len(),
            p.frame_len.policy_name(),
            p.payload,
            p.burst_size,
            p.timing
        );
        match &self.bootstrapped {
            Some(b) => {
                for f in b.fields.iter() {
                    let value = match f.descriptor.kind {
                        ValueKind::Integer => format!("{:#x}", f.baseline),
                        ValueKind::Pattern(kind) => pattern::format(kind, f.baseline),
                    };
                    let _ = writeln!(
                        out,
                        "  {:>5}  {:<20} {:>3} bits  {}{}",
                        f.offset,
                        f.descriptor.name,
                        f.descriptor.bit_len,
                        value,
                        f.policy.map(|p| format!(" ({p})")).unwrap_or_default()
                    );
                }
                let _ = writeln!(out, "  header length: {} bytes", b.header_len);
            }
            None => {
                for h in self.headers.iter() {
                    let names: Vec<&str> = h.fields().iter().map(|f| f.descriptor.name).collect();
                    let _ = writeln!(out, "  {}: {}", h.header_type(), names.join(", "));
                }
            }
        }
        for u in self.udfs.iter() {
            let _ = writeln!(
                out,
                "  udf \"{}\" at bit {} ({} bits, {})",
                u.name,
                u.bit_offset,
                u.bit_len,
                u.spec.policy_name()
            );
        }
        out
    }
}

/// Bytes excluded from an automatic length field, for a header starting at `start`
fn auto_length(id: FieldId, start: usize) -> Option<usize> {
    match id {
        FieldId::Ipv4TotalLen | FieldId::UdpLen => Some(start),
        FieldId::Ipv6PayloadLen => Some(start + 40),
        _ => None,
    }
}

impl AutoLength {
    pub(crate) fn write(&self, frame: &mut [u8], frame_len: usize) {
        let value = frame_len.saturating_sub(self.excluded) as u64;
        splice::splice(frame, self.offset, self.bit_len, value);
    }
}

/// Write the baseline of every field, merge groups being folded and written at once.
fn write_fields(buf: &mut [u8], fields: &[FrameField]) {
    let mut i = 0;
    while i < fields.len() {
        let lead = &fields[i];
        let count = lead.descriptor.merge_count;
        if count > 0 {
            let parts: Vec<(usize, u64)> = fields[i..=i + count]
                .iter()
                .map(|f| (f.descriptor.bit_len, f.baseline as u64))
                .collect();
            splice::splice_group(buf, lead.offset, &parts);
            i += count + 1;
        } else {
            splice::splice_wide(buf, lead.offset, lead.descriptor.bit_len, lead.baseline);
            i += 1;
        }
    }
}
