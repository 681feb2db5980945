//! Synthetic network frame generation.
//!
//! Frames are described by a [`stream::Stream`]: an ordered list of protocol headers, whose
//! fields can each follow a generation policy, plus stream properties (frame length, payload,
//! burst size). Once bootstrapped, a stream is turned into a [`machine::StreamMachine`] that
//! produces the successive frames of the burst as 64-byte elements.

/// Protocol fields and headers
pub mod catalog;
/// Error types
pub mod error;
/// Bit-level writing into frame buffers
pub mod splice;

/// Text forms of MAC, IPv4, IPv6 and preamble fields
pub mod pattern;
/// Generation policies of the fields
pub mod policy;

pub mod header;
/// Frame sizes and payloads
pub mod payload;
pub mod stream;

/// Frame and burst streaming
pub mod machine;

/// Stream configuration files
pub mod config;
/// Generation statistics
pub mod stats;
pub mod utils;
/// Port workers feeding transmit queues
pub mod worker;

pub use catalog::{FieldId, HeaderType};
pub use error::{CapacityError, ConfigError, Error, Result};
pub use header::Header;
pub use machine::{Element, PullStatus, StreamMachine, ELEMENT_SIZE};
pub use policy::{FieldSpec, GenSpec, WeightedChoice};
pub use stream::{IdCounter, Property, Stream, Udf};
