use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::catalog::{self, FieldId, HeaderType, ValueKind};
use crate::error::{ConfigError, Result};
use crate::header::Header;
use crate::payload::PayloadSpec;
use crate::policy::{FieldSpec, GenSpec};
use crate::stream::{IdCounter, Property, Stream, Udf};

/// Output ports and the streams they carry
#[derive(Debug)]
pub struct Configuration {
    pub metadata: Metadata,
    pub ports: Vec<Port>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
/// Metadata of the configuration file
pub struct Metadata {
    pub title: String,
    pub desc: Option<String>,
    pub author: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug)]
pub struct Port {
    pub id: u32,
    pub name: String,
    pub streams: Vec<Stream>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct ConfigurationToml {
    metadata: Option<Metadata>,
    ports: Vec<PortToml>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct PortToml {
    name: Option<String>,
    streams: Vec<StreamToml>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct StreamToml {
    name: Option<String>,
    headers: Vec<HeaderToml>,
    frame_len: Option<NumberToml>,
    payload: Option<PayloadSpec>,
    burst_size: Option<u64>,
    inter_frame_gap: Option<u64>,
    inter_burst_gap: Option<u64>,
    inter_stream_gap: Option<u64>,
    start_delay: Option<u64>,
    #[serde(default)]
    udfs: Vec<UdfToml>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct HeaderToml {
    #[serde(rename = "type")]
    header_type: String,
    /// Field names, for custom headers only
    layout: Option<Vec<String>>,
    #[serde(default)]
    fields: BTreeMap<String, FieldToml>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct UdfToml {
    name: String,
    bit_offset: usize,
    bit_len: usize,
    value: NumberToml,
}

/// A plain number or a numeric spec
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum NumberToml {
    Fixed(u64),
    Spec(GenSpec<u64>),
}

impl From<NumberToml> for GenSpec<u64> {
    fn from(n: NumberToml) -> Self {
        match n {
            NumberToml::Fixed(value) => GenSpec::Fixed { value },
            NumberToml::Spec(spec) => spec,
        }
    }
}

/// Value of a header field: number, pattern string, or a spec of either kind
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum FieldToml {
    Number(u64),
    Text(String),
    Numeric(GenSpec<u64>),
    Textual(GenSpec<String>),
}

impl FieldToml {
    /// Spec in the representation expected by the field. Policies without values (`random`)
    /// parse as numeric specs and are moved to the pattern side for pattern fields.
    fn into_spec(self, kind: ValueKind) -> FieldSpec {
        match (self, kind) {
            (FieldToml::Number(value), _) => value.into(),
            (FieldToml::Text(text), _) => text.as_str().into(),
            (FieldToml::Numeric(GenSpec::Random { seed }), ValueKind::Pattern(_)) => {
                GenSpec::<String>::Random { seed }.into()
            }
            (FieldToml::Numeric(spec), _) => spec.into(),
            (FieldToml::Textual(spec), _) => spec.into(),
        }
    }
}

fn build_header(h: HeaderToml) -> Result<Header> {
    let header_type: HeaderType = h.header_type.parse()?;
    let mut header = match (header_type, h.layout) {
        (HeaderType::Custom, Some(layout)) => {
            let ids = layout
                .iter()
                .map(|name| name.parse::<FieldId>())
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Header::custom(&ids)
        }
        (HeaderType::Custom, None) => {
            return Err(ConfigError::InvalidSpec {
                target: "custom header".to_string(),
                reason: "a layout is required".to_string(),
            }
            .into())
        }
        (_, Some(_)) => {
            log::warn!("Layout ignored for {header_type} header");
            Header::build(header_type)
        }
        (_, None) => Header::build(header_type),
    };
    for (name, value) in h.fields {
        let id: FieldId = name.parse()?;
        let kind = catalog::lookup(id).kind;
        header.set(id, value.into_spec(kind))?;
    }
    Ok(header)
}

fn build_stream(s: StreamToml, ids: &mut IdCounter) -> Result<Stream> {
    let id = ids.next_id();
    let mut stream = Stream::new(id, s.name.unwrap_or_else(|| format!("stream{id}")));
    for h in s.headers {
        stream.attach_header(build_header(h)?);
    }
    if let Some(frame_len) = s.frame_len {
        stream.set_property(Property::FrameLen(frame_len.into()))?;
    }
    if let Some(payload) = s.payload {
        stream.set_property(Property::Payload(payload))?;
    }
    let numbers = [
        s.burst_size.map(Property::BurstSize),
        s.inter_frame_gap.map(Property::InterFrameGap),
        s.inter_burst_gap.map(Property::InterBurstGap),
        s.inter_stream_gap.map(Property::InterStreamGap),
        s.start_delay.map(Property::StartDelay),
    ];
    for property in numbers.into_iter().flatten() {
        stream.set_property(property)?;
    }
    for u in s.udfs {
        stream.add_udf(Udf {
            name: u.name,
            bit_offset: u.bit_offset,
            bit_len: u.bit_len,
            spec: u.value.into(),
        })?;
    }
    stream.bootstrap()?;
    Ok(stream)
}

impl Configuration {
    fn build(c: ConfigurationToml) -> Result<Self> {
        let mut port_ids = IdCounter::new();
        let mut stream_ids = IdCounter::new();
        let mut ports = Vec::with_capacity(c.ports.len());
        for p in c.ports {
            let id = port_ids.next_id();
            let streams = p
                .streams
                .into_iter()
                .map(|s| build_stream(s, &mut stream_ids))
                .collect::<Result<Vec<_>>>()?;
            ports.push(Port {
                id,
                name: p.name.unwrap_or_else(|| format!("port{id}")),
                streams,
            });
        }
        Ok(Configuration {
            metadata: c.metadata.unwrap_or_default(),
            ports,
        })
    }

    pub fn stream_count(&self) -> usize {
        self.ports.iter().map(|p| p.streams.len()).sum()
    }
}

/// Serialization format of a configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Json,
}

impl Format {
    /// JSON for `.json` files, TOML otherwise
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Toml,
        }
    }
}

/// Import a configuration from a string and bootstrap all of its streams.
pub fn import_config(config_string: &str, format: Format) -> Result<Configuration> {
    let raw: ConfigurationToml = match format {
        Format::Toml => toml::from_str(config_string)?,
        Format::Json => serde_json::from_str(config_string)?,
    };
    let config = Configuration::build(raw)?;
    log::info!(
        "\"{}\" successfully loaded: {} port(s), {} stream(s)",
        config.metadata.title,
        config.ports.len(),
        config.stream_count()
    );
    log::trace!("Configuration: {config:?}");
    Ok(config)
}

/// Read and import a configuration file.
pub fn load_config(path: &Path) -> Result<Configuration> {
    let text = fs::read_to_string(path)?;
    import_config(&text, Format::from_path(path))
}
