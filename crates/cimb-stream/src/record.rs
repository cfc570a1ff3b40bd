//! The compact record: one owned buffer holding a class or an instance.
//!
//! ```text
//! 0   total_size     u64   allocated bytes (== buffer length)
//! 8   free_bytes     u64   unused tail; in-use = total_size - free_bytes
//! 16  ref_count      u32
//! 20  kind           u32   1 = class, 2 = instance
//! 24  ext_ref_count  u32   external-reference slots (instances only)
//! 28  field_count    u32   property slots
//! 32  string slots   (2 + field_count) x (offset u32, len u32)
//!     token slots    ext_ref_count x u64
//!     heap           string bytes, append-only
//! ```
//!
//! A string slot with `len == u32::MAX` is null. Updating a string appends a
//! new copy to the heap, consuming the free tail before growing the buffer.

use std::fmt;

use crate::error::{StreamError, StreamResult};

pub const HEADER_LEN: usize = 32;
pub const SLOT_LEN: usize = 8;
const NULL_LEN: u32 = u32::MAX;
const HEAP_GROWTH: usize = 64;

const OFF_TOTAL: usize = 0;
const OFF_FREE: usize = 8;
const OFF_REF_COUNT: usize = 16;
const OFF_KIND: usize = 20;
const OFF_EXT_REFS: usize = 24;
const OFF_FIELDS: usize = 28;

/// Number of leading string slots before the per-field ones.
pub(crate) const LEADING_SLOTS: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordKind {
    Class = 1,
    Instance = 2,
}

impl RecordKind {
    fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Class),
            2 => Some(Self::Instance),
            _ => None,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct CompactRecord {
    buf: Vec<u8>,
}

impl CompactRecord {
    pub(crate) fn new(kind: RecordKind, field_count: u32, ext_ref_count: u32) -> Self {
        let string_slots = LEADING_SLOTS + field_count as usize;
        let fixed = HEADER_LEN + (string_slots + ext_ref_count as usize) * SLOT_LEN;
        let mut record = Self {
            buf: vec![0u8; fixed],
        };
        record.write_u64(OFF_TOTAL, fixed as u64);
        record.write_u64(OFF_FREE, 0);
        record.write_u32(OFF_REF_COUNT, 0);
        record.write_u32(OFF_KIND, kind as u32);
        record.write_u32(OFF_EXT_REFS, ext_ref_count);
        record.write_u32(OFF_FIELDS, field_count);
        for slot in 0..string_slots {
            record.write_slot(slot, 0, NULL_LEN);
        }
        record
    }

    /// Rebuild a record from wire bytes.
    ///
    /// The bytes are copied into a fresh allocation of `bytes.len() + slack`;
    /// the size, free-space and reference-count header fields are then
    /// overwritten from what was actually read, and the layout is checked.
    pub(crate) fn from_wire(bytes: &[u8], slack: usize, kind: RecordKind) -> StreamResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(StreamError::CorruptRecord(format!(
                "record of {} bytes is shorter than its header",
                bytes.len()
            )));
        }
        let total = bytes
            .len()
            .checked_add(slack)
            .ok_or(StreamError::RecordTooLarge(bytes.len()))?;

        let mut buf = Vec::new();
        buf.try_reserve_exact(total)
            .map_err(|_| StreamError::OutOfMemory { requested: total })?;
        buf.extend_from_slice(bytes);
        buf.resize(total, 0);

        let mut record = Self { buf };
        record.write_u64(OFF_TOTAL, total as u64);
        record.write_u64(OFF_FREE, slack as u64);
        record.write_u32(OFF_REF_COUNT, 0);
        record.validate(kind)?;
        Ok(record)
    }

    fn validate(&self, expected: RecordKind) -> StreamResult<()> {
        match RecordKind::from_u32(self.read_u32(OFF_KIND)) {
            Some(kind) if kind == expected => {}
            other => {
                return Err(StreamError::CorruptRecord(format!(
                    "expected {expected:?} record, found {other:?}"
                )))
            }
        }

        let in_use = self.in_use();
        let fixed = (LEADING_SLOTS as u64 + u64::from(self.read_u32(OFF_FIELDS)))
            .checked_add(u64::from(self.read_u32(OFF_EXT_REFS)))
            .and_then(|slots| slots.checked_mul(SLOT_LEN as u64))
            .and_then(|len| len.checked_add(HEADER_LEN as u64))
            .ok_or_else(|| StreamError::CorruptRecord("slot counts overflow".into()))?;
        if fixed > in_use as u64 {
            return Err(StreamError::CorruptRecord(format!(
                "fixed region of {fixed} bytes exceeds record of {in_use} bytes"
            )));
        }

        for slot in 0..self.string_slot_count() {
            let (offset, len) = self.read_slot(slot);
            if len == NULL_LEN {
                continue;
            }
            let end = u64::from(offset) + u64::from(len);
            if u64::from(offset) < fixed || end > in_use as u64 {
                return Err(StreamError::CorruptRecord(format!(
                    "string slot {slot} ({offset}+{len}) outside heap"
                )));
            }
        }
        Ok(())
    }

    pub fn kind(&self) -> Option<RecordKind> {
        RecordKind::from_u32(self.read_u32(OFF_KIND))
    }

    pub fn total_size(&self) -> usize {
        self.buf.len()
    }

    pub fn free_bytes(&self) -> usize {
        self.read_u64(OFF_FREE) as usize
    }

    pub fn in_use(&self) -> usize {
        self.total_size() - self.free_bytes()
    }

    /// The bytes that go on the wire.
    pub fn in_use_bytes(&self) -> &[u8] {
        &self.buf[..self.in_use()]
    }

    pub fn ref_count(&self) -> u32 {
        self.read_u32(OFF_REF_COUNT)
    }

    pub(crate) fn set_ref_count(&mut self, count: u32) {
        self.write_u32(OFF_REF_COUNT, count);
    }

    pub fn field_count(&self) -> usize {
        self.read_u32(OFF_FIELDS) as usize
    }

    pub fn ext_ref_count(&self) -> usize {
        self.read_u32(OFF_EXT_REFS) as usize
    }

    fn string_slot_count(&self) -> usize {
        LEADING_SLOTS + self.field_count()
    }

    /// Bytes of string slot `slot`, or `None` when null or out of range.
    pub fn string(&self, slot: usize) -> Option<&[u8]> {
        if slot >= self.string_slot_count() {
            return None;
        }
        let (offset, len) = self.read_slot(slot);
        if len == NULL_LEN {
            return None;
        }
        let start = offset as usize;
        self.buf.get(start..start + len as usize)
    }

    pub fn str(&self, slot: usize) -> Option<&str> {
        self.string(slot).and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Store `value` in string slot `slot`, appending it to the heap.
    pub(crate) fn set_string(&mut self, slot: usize, value: Option<&[u8]>) -> StreamResult<()> {
        let count = self.string_slot_count();
        if slot >= count {
            return Err(StreamError::InvalidSlot { slot, count });
        }
        let Some(value) = value else {
            self.write_slot(slot, 0, NULL_LEN);
            return Ok(());
        };

        let len = u32::try_from(value.len())
            .ok()
            .filter(|&l| l != NULL_LEN)
            .ok_or(StreamError::RecordTooLarge(value.len()))?;
        let offset = self.append_heap(value)?;
        self.write_slot(slot, offset, len);
        Ok(())
    }

    /// Raw token in external-reference slot `slot` (0 = empty).
    pub(crate) fn token(&self, slot: usize) -> u64 {
        if slot >= self.ext_ref_count() {
            return 0;
        }
        self.read_u64(self.token_offset(slot))
    }

    pub(crate) fn set_token(&mut self, slot: usize, token: u64) -> StreamResult<()> {
        let count = self.ext_ref_count();
        if slot >= count {
            return Err(StreamError::InvalidSlot { slot, count });
        }
        let offset = self.token_offset(slot);
        self.write_u64(offset, token);
        Ok(())
    }

    fn token_offset(&self, slot: usize) -> usize {
        HEADER_LEN + (self.string_slot_count() + slot) * SLOT_LEN
    }

    fn append_heap(&mut self, bytes: &[u8]) -> StreamResult<u32> {
        let free = self.free_bytes();
        if free < bytes.len() {
            let grow = (bytes.len() - free).max(HEAP_GROWTH);
            let new_total = self.buf.len() + grow;
            if new_total > u32::MAX as usize {
                return Err(StreamError::RecordTooLarge(new_total));
            }
            self.buf
                .try_reserve(grow)
                .map_err(|_| StreamError::OutOfMemory { requested: grow })?;
            self.buf.resize(new_total, 0);
            self.write_u64(OFF_TOTAL, new_total as u64);
            self.write_u64(OFF_FREE, (free + grow) as u64);
        }

        let start = self.in_use();
        let offset = u32::try_from(start).map_err(|_| StreamError::RecordTooLarge(start))?;
        self.buf[start..start + bytes.len()].copy_from_slice(bytes);
        let free = self.free_bytes() - bytes.len();
        self.write_u64(OFF_FREE, free as u64);
        Ok(offset)
    }

    fn read_slot(&self, slot: usize) -> (u32, u32) {
        let at = HEADER_LEN + slot * SLOT_LEN;
        (self.read_u32(at), self.read_u32(at + 4))
    }

    fn write_slot(&mut self, slot: usize, offset: u32, len: u32) {
        let at = HEADER_LEN + slot * SLOT_LEN;
        self.write_u32(at, offset);
        self.write_u32(at + 4, len);
    }

    fn read_u32(&self, at: usize) -> u32 {
        let mut b = [0u8; 4];
        b.copy_from_slice(&self.buf[at..at + 4]);
        u32::from_le_bytes(b)
    }

    fn read_u64(&self, at: usize) -> u64 {
        let mut b = [0u8; 8];
        b.copy_from_slice(&self.buf[at..at + 8]);
        u64::from_le_bytes(b)
    }

    fn write_u32(&mut self, at: usize, value: u32) {
        self.buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn write_u64(&mut self, at: usize, value: u64) {
        self.buf[at..at + 8].copy_from_slice(&value.to_le_bytes());
    }
}

impl fmt::Debug for CompactRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompactRecord")
            .field("kind", &self.kind())
            .field("total_size", &self.total_size())
            .field("free_bytes", &self.free_bytes())
            .field("ref_count", &self.ref_count())
            .field("field_count", &self.field_count())
            .field("ext_ref_count", &self.ext_ref_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_has_null_slots() {
        let rec = CompactRecord::new(RecordKind::Instance, 3, 2);
        assert_eq!(rec.kind(), Some(RecordKind::Instance));
        assert_eq!(rec.total_size(), HEADER_LEN + (2 + 3 + 2) * SLOT_LEN);
        assert_eq!(rec.free_bytes(), 0);
        for slot in 0..5 {
            assert!(rec.string(slot).is_none());
        }
        assert_eq!(rec.token(0), 0);
        assert_eq!(rec.token(1), 0);
    }

    #[test]
    fn set_string_grows_then_uses_slack() {
        let mut rec = CompactRecord::new(RecordKind::Class, 0, 0);
        let fixed = rec.total_size();

        rec.set_string(0, Some(b"CIM_Foo")).unwrap();
        assert_eq!(rec.str(0), Some("CIM_Foo"));
        assert_eq!(rec.total_size(), fixed + HEAP_GROWTH);
        assert_eq!(rec.in_use(), fixed + 7);

        rec.set_string(1, Some(b"root/cimv2")).unwrap();
        assert_eq!(rec.total_size(), fixed + HEAP_GROWTH);
        assert_eq!(rec.str(1), Some("root/cimv2"));
    }

    #[test]
    fn set_string_out_of_range() {
        let mut rec = CompactRecord::new(RecordKind::Class, 1, 0);
        let err = rec.set_string(3, Some(b"x")).unwrap_err();
        assert!(matches!(err, StreamError::InvalidSlot { slot: 3, count: 3 }));
    }

    #[test]
    fn from_wire_resets_header() {
        let mut rec = CompactRecord::new(RecordKind::Class, 0, 0);
        rec.set_string(0, Some(b"CIM_Bar")).unwrap();
        rec.set_ref_count(9);

        let wire = rec.in_use_bytes().to_vec();
        let back = CompactRecord::from_wire(&wire, 16, RecordKind::Class).unwrap();
        assert_eq!(back.total_size(), wire.len() + 16);
        assert_eq!(back.free_bytes(), 16);
        assert_eq!(back.ref_count(), 0);
        assert_eq!(back.str(0), Some("CIM_Bar"));
    }

    #[test]
    fn from_wire_rejects_wrong_kind() {
        let rec = CompactRecord::new(RecordKind::Class, 0, 0);
        let err = CompactRecord::from_wire(rec.in_use_bytes(), 0, RecordKind::Instance).unwrap_err();
        assert!(matches!(err, StreamError::CorruptRecord(_)));
    }

    #[test]
    fn from_wire_rejects_out_of_bounds_string() {
        let mut rec = CompactRecord::new(RecordKind::Class, 0, 0);
        rec.set_string(0, Some(b"abc")).unwrap();
        let mut wire = rec.in_use_bytes().to_vec();
        // Stretch the name slot's length past the end of the record.
        wire[HEADER_LEN + 4..HEADER_LEN + 8].copy_from_slice(&1000u32.to_le_bytes());
        let err = CompactRecord::from_wire(&wire, 0, RecordKind::Class).unwrap_err();
        assert!(matches!(err, StreamError::CorruptRecord(_)));
    }

    #[test]
    fn from_wire_rejects_huge_counts() {
        let rec = CompactRecord::new(RecordKind::Instance, 0, 0);
        let mut wire = rec.in_use_bytes().to_vec();
        wire[OFF_FIELDS..OFF_FIELDS + 4].copy_from_slice(&u32::MAX.to_le_bytes());
        let err = CompactRecord::from_wire(&wire, 0, RecordKind::Instance).unwrap_err();
        assert!(matches!(err, StreamError::CorruptRecord(_)));
    }

    #[test]
    fn from_wire_rejects_short_input() {
        let err = CompactRecord::from_wire(&[0u8; 8], 0, RecordKind::Class).unwrap_err();
        assert!(matches!(err, StreamError::CorruptRecord(_)));
    }

    #[test]
    fn tokens_roundtrip() {
        let mut rec = CompactRecord::new(RecordKind::Instance, 1, 2);
        rec.set_token(1, 42).unwrap();
        assert_eq!(rec.token(0), 0);
        assert_eq!(rec.token(1), 42);
        assert!(rec.set_token(2, 1).is_err());
    }
}
