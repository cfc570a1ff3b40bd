//! Resolution tables built while walking an instance graph.
//!
//! - The **class table** lists each distinct class once, keyed by handle.
//! - The **class-resolution table** has one entry per visited instance:
//!   `(instance token, class-table index)`. Its order is the order instances
//!   are written to the stream.
//! - The **reference-resolution table** has one entry per non-empty external
//!   reference slot: `(referenced token, class-resolution index)`.
//!
//! References are registered before the instance that owns them, so every
//! reference points backwards in the class-resolution table and a decoder can
//! resolve it in a single forward pass.

use std::collections::HashMap;

use tracing::debug;

use crate::arena::{ClassId, InstanceId, ObjectArena, MAX_REFERENCE_DEPTH};
use crate::error::{StreamError, StreamResult};

/// Size of one entry on the wire.
pub const ENTRY_LEN: usize = 16;

/// `(identity token, index)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolutionEntry {
    pub token: u64,
    pub index: u64,
}

/// Token written over a class-resolution entry once its instance has been
/// claimed by a reference slot during decode.
pub const CONSUMED_TOKEN: u64 = 0;

#[derive(Clone, Copy, Debug)]
enum Visit {
    InProgress,
    Done(usize),
}

#[derive(Debug, Default)]
pub struct ResolutionTables {
    class_table: Vec<ClassId>,
    class_resolution: Vec<ResolutionEntry>,
    reference_resolution: Vec<ResolutionEntry>,
    instance_order: Vec<InstanceId>,
    visits: HashMap<InstanceId, Visit>,
}

impl ResolutionTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `instance` and, first, everything it references.
    ///
    /// Returns the instance's position in the class-resolution table. An
    /// instance reachable more than once is registered once; every slot that
    /// points at it resolves to the same position.
    pub fn append_to_resolver_tables(
        &mut self,
        arena: &ObjectArena,
        instance: InstanceId,
    ) -> StreamResult<usize> {
        self.visit(arena, instance, 0)
    }

    fn visit(&mut self, arena: &ObjectArena, instance: InstanceId, depth: usize) -> StreamResult<usize> {
        match self.visits.get(&instance) {
            Some(Visit::Done(index)) => return Ok(*index),
            Some(Visit::InProgress) => return Err(StreamError::CyclicReference(instance)),
            None => {}
        }
        if depth > MAX_REFERENCE_DEPTH {
            return Err(StreamError::ReferenceTooDeep(MAX_REFERENCE_DEPTH));
        }

        let record = arena
            .instance(instance)
            .ok_or(StreamError::UnknownInstance(instance))?;
        self.visits.insert(instance, Visit::InProgress);

        for slot in 0..record.ext_ref_count() {
            let Some(target) = record.ext_ref(slot) else {
                continue;
            };
            let target_index = self.visit(arena, target, depth + 1)?;
            self.reference_resolution.push(ResolutionEntry {
                token: target.token(),
                index: target_index as u64,
            });
        }

        let class_index = self.append_to_class_table(record.class());
        self.class_resolution.push(ResolutionEntry {
            token: instance.token(),
            index: class_index as u64,
        });
        self.instance_order.push(instance);

        let index = self.class_resolution.len() - 1;
        self.visits.insert(instance, Visit::Done(index));
        debug!(%instance, index, class_index, "registered instance");
        Ok(index)
    }

    /// Position of `class` in the class table, appending it on first sight.
    pub fn append_to_class_table(&mut self, class: ClassId) -> usize {
        if let Some(index) = self.class_table.iter().position(|&c| c == class) {
            return index;
        }
        self.class_table.push(class);
        self.class_table.len() - 1
    }

    pub fn class_table(&self) -> &[ClassId] {
        &self.class_table
    }

    pub fn class_resolution(&self) -> &[ResolutionEntry] {
        &self.class_resolution
    }

    pub fn reference_resolution(&self) -> &[ResolutionEntry] {
        &self.reference_resolution
    }

    /// Instances in class-resolution order.
    pub fn instance_order(&self) -> &[InstanceId] {
        &self.instance_order
    }
}
