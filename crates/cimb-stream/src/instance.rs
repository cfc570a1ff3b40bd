use crate::arena::{ClassId, InstanceId};
use crate::class::ClassRecord;
use crate::error::{StreamError, StreamResult};
use crate::record::{CompactRecord, RecordKind, LEADING_SLOTS};

const SLOT_HOST: usize = 0;
const SLOT_NAMESPACE: usize = 1;

/// Compact CIM instance: host and namespace names, one optional value per
/// class property, and a fixed number of external-reference slots.
///
/// Property values are opaque bytes; their CIM typing lives outside this
/// crate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstanceRecord {
    record: CompactRecord,
    class: ClassId,
}

impl InstanceRecord {
    pub(crate) fn new(class: ClassId, class_record: &ClassRecord, ext_ref_count: u32) -> StreamResult<Self> {
        let fields = class_record.property_count();
        let field_count = u32::try_from(fields).map_err(|_| StreamError::CountOverflow(fields))?;
        let mut record = CompactRecord::new(RecordKind::Instance, field_count, ext_ref_count);
        record.set_string(SLOT_NAMESPACE, Some(class_record.namespace().as_bytes()))?;
        Ok(Self { record, class })
    }

    /// Wrap a decoded record and link it to `class`.
    pub(crate) fn from_record(
        record: CompactRecord,
        class: ClassId,
        class_record: &ClassRecord,
    ) -> StreamResult<Self> {
        if record.field_count() != class_record.property_count() {
            return Err(StreamError::CorruptRecord(format!(
                "instance has {} values but class {} has {} properties",
                record.field_count(),
                class_record.name(),
                class_record.property_count()
            )));
        }
        for slot in [SLOT_HOST, SLOT_NAMESPACE] {
            if record.string(slot).is_some() && record.str(slot).is_none() {
                return Err(StreamError::CorruptRecord(format!(
                    "instance name slot {slot} is not UTF-8"
                )));
            }
        }
        Ok(Self { record, class })
    }

    pub fn class(&self) -> ClassId {
        self.class
    }

    pub fn host_name(&self) -> Option<&str> {
        self.record.str(SLOT_HOST)
    }

    pub fn set_host_name(&mut self, host: &str) -> StreamResult<()> {
        self.record.set_string(SLOT_HOST, Some(host.as_bytes()))
    }

    pub fn namespace(&self) -> Option<&str> {
        self.record.str(SLOT_NAMESPACE)
    }

    pub fn set_namespace(&mut self, namespace: &str) -> StreamResult<()> {
        self.record.set_string(SLOT_NAMESPACE, Some(namespace.as_bytes()))
    }

    pub fn value_count(&self) -> usize {
        self.record.field_count()
    }

    /// Value of property `index`; `None` when unset or out of range.
    pub fn value(&self, index: usize) -> Option<&[u8]> {
        if index >= self.value_count() {
            return None;
        }
        self.record.string(LEADING_SLOTS + index)
    }

    pub fn set_value(&mut self, index: usize, value: Option<&[u8]>) -> StreamResult<()> {
        let count = self.value_count();
        if index >= count {
            return Err(StreamError::InvalidSlot { slot: index, count });
        }
        self.record.set_string(LEADING_SLOTS + index, value)
    }

    pub fn ext_ref_count(&self) -> usize {
        self.record.ext_ref_count()
    }

    pub fn ext_ref(&self, slot: usize) -> Option<InstanceId> {
        InstanceId::from_token(self.record.token(slot))
    }

    pub(crate) fn ext_ref_token(&self, slot: usize) -> u64 {
        self.record.token(slot)
    }

    pub(crate) fn set_ext_ref(&mut self, slot: usize, target: Option<InstanceId>) -> StreamResult<()> {
        self.record
            .set_token(slot, target.map_or(0, InstanceId::token))
    }

    pub fn record(&self) -> &CompactRecord {
        &self.record
    }
}
