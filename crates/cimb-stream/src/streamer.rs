//! Serialize and deserialize instance graphs.
//!
//! Stream layout:
//!
//! ```text
//! "CIMS" u32 version
//! u32 class count      { u64 len, class bytes }*
//! u32 entry count      { u64 token, u64 class index }*      class resolution
//! u32 entry count      { u64 token, u64 instance index }*   reference resolution
//!                      { u64 len, instance bytes }*         one per class-resolution entry
//! ```
//!
//! Every class is written before any instance that uses it, and every
//! referenced instance before the instance referencing it.

use std::collections::HashMap;

use bytes::Bytes;
use tracing::debug;

use crate::arena::{ClassId, InstanceId, ObjectArena};
use crate::buffer::{WireReader, WireWriter};
use crate::class::ClassRecord;
use crate::error::{StreamError, StreamResult};
use crate::instance::InstanceRecord;
use crate::record::{CompactRecord, RecordKind};
use crate::tables::{ResolutionEntry, ResolutionTables, CONSUMED_TOKEN, ENTRY_LEN};

pub const STREAM_MAGIC: [u8; 4] = *b"CIMS";
pub const STREAM_VERSION: u32 = 1;

/// Spare bytes given to every decoded instance so host and namespace names
/// can be patched in place.
pub const INSTANCE_SLACK: usize = 64;

/// One serialization pass over a set of top-level instances.
///
/// Consumed by [`serialize`](Self::serialize); build a new streamer for each
/// payload.
pub struct ObjectStreamer<'a> {
    arena: &'a ObjectArena,
    instances: &'a [InstanceId],
    tables: ResolutionTables,
}

impl<'a> ObjectStreamer<'a> {
    pub fn new(arena: &'a ObjectArena, instances: &'a [InstanceId]) -> Self {
        Self {
            arena,
            instances,
            tables: ResolutionTables::new(),
        }
    }

    pub fn serialize(mut self) -> StreamResult<Bytes> {
        for &instance in self.instances {
            self.tables.append_to_resolver_tables(self.arena, instance)?;
        }

        let mut out = WireWriter::with_capacity(1024);
        out.put_raw(&STREAM_MAGIC);
        out.put_u32(STREAM_VERSION);

        self.write_classes(&mut out)?;
        self.write_instances(&mut out)?;

        debug!(
            classes = self.tables.class_table().len(),
            instances = self.tables.class_resolution().len(),
            references = self.tables.reference_resolution().len(),
            bytes = out.len(),
            "serialized object stream"
        );
        Ok(out.freeze())
    }

    fn write_classes(&self, out: &mut WireWriter) -> StreamResult<()> {
        let classes = self.tables.class_table();
        out.put_count(classes.len())?;
        for &class in classes {
            let record = self
                .arena
                .class(class)
                .ok_or(StreamError::UnknownClass(class))?;
            out.put_block(record.record().in_use_bytes());
        }
        Ok(())
    }

    fn write_instances(&self, out: &mut WireWriter) -> StreamResult<()> {
        write_table(out, self.tables.class_resolution())?;
        write_table(out, self.tables.reference_resolution())?;
        for &instance in self.tables.instance_order() {
            let record = self
                .arena
                .instance(instance)
                .ok_or(StreamError::UnknownInstance(instance))?;
            out.put_block(record.record().in_use_bytes());
        }
        Ok(())
    }

    /// Decode a stream, appending its records to `arena`.
    ///
    /// Returns the top-level instances: those not claimed by another
    /// instance's reference slot. On error the arena is left unchanged.
    pub fn deserialize(data: &[u8], arena: &mut ObjectArena) -> StreamResult<Vec<InstanceId>> {
        let mut input = WireReader::new(data);

        let magic: [u8; 4] = input.read_array()?;
        if magic != STREAM_MAGIC {
            return Err(StreamError::InvalidMagic {
                expected: STREAM_MAGIC,
                actual: magic,
            });
        }
        let version = input.read_u32()?;
        if version != STREAM_VERSION {
            return Err(StreamError::UnsupportedVersion(version));
        }

        let classes = read_classes(&mut input)?;
        let mut class_resolution = read_table(&mut input)?;
        if class_resolution.iter().any(|entry| entry.token == CONSUMED_TOKEN) {
            return Err(StreamError::CorruptRecord(
                "class-resolution entry carries a zero token".into(),
            ));
        }
        let references = read_table(&mut input)?;

        // First entry wins if a token repeats; all copies name the same index.
        let mut reference_index: HashMap<u64, u64> = HashMap::with_capacity(references.len());
        for entry in &references {
            reference_index.entry(entry.token).or_insert(entry.index);
        }

        let class_base = arena.class_count();
        let instance_base = arena.instance_count();
        let mut instances: Vec<InstanceRecord> = Vec::new();

        for position in 0..class_resolution.len() {
            let bytes = input.read_block()?;
            let record = CompactRecord::from_wire(bytes, INSTANCE_SLACK, RecordKind::Instance)?;

            let class_index = class_resolution[position].index;
            let class_record = usize::try_from(class_index)
                .ok()
                .and_then(|i| classes.get(i))
                .ok_or(StreamError::ClassIndexOutOfRange {
                    index: class_index,
                    count: classes.len(),
                })?;
            let class = ClassId::from_index(class_base + class_index as usize);
            let mut instance = InstanceRecord::from_record(record, class, class_record)?;

            for slot in 0..instance.ext_ref_count() {
                let token = instance.ext_ref_token(slot);
                if token == 0 {
                    continue;
                }
                let target = *reference_index
                    .get(&token)
                    .ok_or(StreamError::UnresolvedReference(token))?;
                let target = usize::try_from(target)
                    .ok()
                    .filter(|&t| t < position)
                    .ok_or(StreamError::ForwardReference {
                        from: position,
                        to: target as usize,
                    })?;
                instance.set_ext_ref(slot, Some(InstanceId::from_index(instance_base + target)))?;
                class_resolution[target].token = CONSUMED_TOKEN;
            }
            instances.push(instance);
        }

        if !input.is_empty() {
            return Err(StreamError::TrailingBytes(input.remaining()));
        }

        let mut classes = classes;
        for instance in &instances {
            classes[instance.class().index() - class_base].add_ref();
        }

        let top_level: Vec<InstanceId> = class_resolution
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.token != CONSUMED_TOKEN)
            .map(|(i, _)| InstanceId::from_index(instance_base + i))
            .collect();

        debug!(
            classes = classes.len(),
            instances = instances.len(),
            references = references.len(),
            top_level = top_level.len(),
            "deserialized object stream"
        );
        arena.commit(classes, instances);
        Ok(top_level)
    }
}

fn write_table(out: &mut WireWriter, table: &[ResolutionEntry]) -> StreamResult<()> {
    out.put_count(table.len())?;
    for entry in table {
        out.put_u64(entry.token);
        out.put_u64(entry.index);
    }
    Ok(())
}

fn read_table(input: &mut WireReader<'_>) -> StreamResult<Vec<ResolutionEntry>> {
    let count = input.read_count()?;
    // Entries are fixed-size, so a lying count is caught before allocating.
    let needed = count.saturating_mul(ENTRY_LEN);
    if needed > input.remaining() {
        return Err(StreamError::Truncated {
            offset: input.position(),
            needed,
            available: input.remaining(),
        });
    }
    let mut table = Vec::with_capacity(count);
    for _ in 0..count {
        table.push(ResolutionEntry {
            token: input.read_u64()?,
            index: input.read_u64()?,
        });
    }
    Ok(table)
}

fn read_classes(input: &mut WireReader<'_>) -> StreamResult<Vec<ClassRecord>> {
    let count = input.read_count()?;
    let mut classes = Vec::new();
    for _ in 0..count {
        let bytes = input.read_block()?;
        let record = CompactRecord::from_wire(bytes, 0, RecordKind::Class)?;
        classes.push(ClassRecord::from_record(record)?);
    }
    Ok(classes)
}
