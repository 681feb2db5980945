use crate::catalog::{self, FieldDescriptor, FieldId, HeaderType};
use crate::error::{ConfigError, Result};
use crate::policy::FieldSpec;

/// A catalog field inside a header, with its generation spec if the user gave one
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInstance {
    pub descriptor: &'static FieldDescriptor,
    pub spec: Option<FieldSpec>,
}

impl FieldInstance {
    fn new(id: FieldId) -> Self {
        FieldInstance {
            descriptor: catalog::lookup(id),
            spec: None,
        }
    }

    pub fn id(&self) -> FieldId {
        self.descriptor.id
    }

    /// A field is mutable as soon as it carries a spec
    pub fn is_mutable(&self) -> bool {
        self.spec.is_some()
    }
}

/// An ordered list of fields forming one protocol header
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    header_type: HeaderType,
    fields: Vec<FieldInstance>,
}

impl Header {
    /// A header of the given type with every field at its catalog default.
    pub fn build(header_type: HeaderType) -> Self {
        Header {
            header_type,
            fields: catalog::fields_of(header_type)
                .iter()
                .map(|id| FieldInstance::new(*id))
                .collect(),
        }
    }

    /// A header made of arbitrary catalog fields. Its layout is only checked at bootstrap.
    pub fn custom(fields: &[FieldId]) -> Self {
        Header {
            header_type: HeaderType::Custom,
            fields: fields.iter().map(|id| FieldInstance::new(*id)).collect(),
        }
    }

    pub fn header_type(&self) -> HeaderType {
        self.header_type
    }

    pub fn fields(&self) -> &[FieldInstance] {
        &self.fields
    }

    pub fn bit_len(&self) -> usize {
        self.fields.iter().map(|f| f.descriptor.bit_len).sum()
    }

    pub fn get(&self, id: FieldId) -> Option<&FieldInstance> {
        self.fields.iter().find(|f| f.id() == id)
    }

    /// Attach a generation spec to a field of this header, which makes it mutable.
    ///
    /// Integer fields accept numbers and numeric specs, pattern fields accept strings and string
    /// specs. The spec is fully validated against the field width here. Specs carrying no value,
    /// such as `Random`, need the value type spelled out: `GenSpec::<u64>::Random { seed: 1 }`.
    pub fn set(&mut self, id: FieldId, spec: impl Into<FieldSpec>) -> Result<()> {
        let header = self.header_type;
        let field = self
            .fields
            .iter_mut()
            .find(|f| f.id() == id)
            .ok_or(ConfigError::UnknownFieldForHeader { field: id, header })?;
        let spec = spec.into();
        let resolved = spec.resolve(field.descriptor)?;
        log::trace!(
            "{header}: {} set with policy {}",
            field.descriptor.name,
            resolved.policy_name()
        );
        field.spec = Some(spec);
        Ok(())
    }

    /// Chained version of [`Header::set`]
    pub fn with(mut self, id: FieldId, spec: impl Into<FieldSpec>) -> Result<Self> {
        self.set(id, spec)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CapacityError, Error};
    use crate::policy::GenSpec;

    #[test]
    fn test_build() {
        let h = Header::build(HeaderType::Udp);
        assert_eq!(h.fields().len(), 4);
        assert_eq!(h.bit_len(), 64);
        assert!(h.fields().iter().all(|f| !f.is_mutable()));
    }

    #[test]
    fn test_set() {
        let mut h = Header::build(HeaderType::Ipv4);
        h.set(FieldId::Ipv4Ttl, 32u64).unwrap();
        h.set(
            FieldId::Ipv4Src,
            GenSpec::Increment {
                start: "10.0.0.1".to_string(),
                step: 1,
                count: 10,
                repeat: true,
            },
        )
        .unwrap();
        assert!(h.get(FieldId::Ipv4Ttl).unwrap().is_mutable());
        assert!(h.get(FieldId::Ipv4Src).unwrap().is_mutable());
        assert!(!h.get(FieldId::Ipv4Dest).unwrap().is_mutable());
    }

    #[test]
    fn test_set_errors() {
        let mut h = Header::build(HeaderType::Ethernet);
        assert!(matches!(
            h.set(FieldId::TcpSyn, 1u64),
            Err(Error::Config(ConfigError::UnknownFieldForHeader {
                field: FieldId::TcpSyn,
                header: HeaderType::Ethernet
            }))
        ));
        assert!(matches!(
            h.set(FieldId::EthDest, "aa:bb:cc"),
            Err(Error::Config(ConfigError::MalformedPattern { .. }))
        ));
        assert!(matches!(
            h.set(FieldId::EtherType, 0x1_0000u64),
            Err(Error::Capacity(CapacityError::ValueTooWide { .. }))
        ));
        // failed calls leave the field untouched
        assert!(!h.get(FieldId::EthDest).unwrap().is_mutable());
    }
}
