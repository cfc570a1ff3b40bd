use crate::error::{StreamError, StreamResult};
use crate::record::{CompactRecord, RecordKind, LEADING_SLOTS};

const SLOT_NAME: usize = 0;
const SLOT_NAMESPACE: usize = 1;

/// Compact description of a CIM class: its name, namespace and the ordered
/// list of property names instances of it carry values for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassRecord {
    record: CompactRecord,
}

impl ClassRecord {
    pub fn new(name: &str, namespace: &str, properties: &[&str]) -> StreamResult<Self> {
        let field_count =
            u32::try_from(properties.len()).map_err(|_| StreamError::CountOverflow(properties.len()))?;
        let mut record = CompactRecord::new(RecordKind::Class, field_count, 0);
        record.set_string(SLOT_NAME, Some(name.as_bytes()))?;
        record.set_string(SLOT_NAMESPACE, Some(namespace.as_bytes()))?;
        for (i, property) in properties.iter().enumerate() {
            record.set_string(LEADING_SLOTS + i, Some(property.as_bytes()))?;
        }
        Ok(Self { record })
    }

    /// Wrap a decoded record, checking that every name is present and UTF-8.
    pub(crate) fn from_record(record: CompactRecord) -> StreamResult<Self> {
        if record.ext_ref_count() != 0 {
            return Err(StreamError::CorruptRecord(
                "class record carries external references".into(),
            ));
        }
        for slot in 0..LEADING_SLOTS + record.field_count() {
            if record.str(slot).is_none() {
                return Err(StreamError::CorruptRecord(format!(
                    "class name slot {slot} is null or not UTF-8"
                )));
            }
        }
        Ok(Self { record })
    }

    pub fn name(&self) -> &str {
        self.record.str(SLOT_NAME).unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.record.str(SLOT_NAMESPACE).unwrap_or_default()
    }

    pub fn property_count(&self) -> usize {
        self.record.field_count()
    }

    pub fn property_name(&self, index: usize) -> Option<&str> {
        if index >= self.property_count() {
            return None;
        }
        self.record.str(LEADING_SLOTS + index)
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> + '_ {
        (0..self.property_count()).filter_map(|i| self.property_name(i))
    }

    /// Position of a property, compared case-insensitively as CIM names are.
    pub fn property_index(&self, name: &str) -> Option<usize> {
        self.property_names()
            .position(|p| p.eq_ignore_ascii_case(name))
    }

    /// Number of instances linked to this class.
    pub fn ref_count(&self) -> u32 {
        self.record.ref_count()
    }

    pub(crate) fn add_ref(&mut self) {
        let count = self.record.ref_count().saturating_add(1);
        self.record.set_ref_count(count);
    }

    pub fn record(&self) -> &CompactRecord {
        &self.record
    }

    /// Structural equality of name, namespace and property list.
    pub fn same_shape(&self, other: &ClassRecord) -> bool {
        self.name() == other.name()
            && self.namespace() == other.namespace()
            && self.property_names().eq(other.property_names())
    }
}
