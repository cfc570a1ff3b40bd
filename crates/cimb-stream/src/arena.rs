//! Index-addressed storage for classes and instances.
//!
//! Handles are plain indices into the arena. Their identity is what the
//! resolution tables key on: two instances sharing a [`ClassId`] share the
//! class, regardless of whether another class has the same content.

use std::fmt;

use crate::class::ClassRecord;
use crate::error::{StreamError, StreamResult};
use crate::instance::InstanceRecord;

/// Upper bound on how deep external references may nest.
pub const MAX_REFERENCE_DEPTH: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(usize);

impl ClassId {
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(usize);

impl InstanceId {
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }

    /// Wire token for this handle. Zero is reserved for empty slots.
    pub fn token(self) -> u64 {
        self.0 as u64 + 1
    }

    pub fn from_token(token: u64) -> Option<Self> {
        token
            .checked_sub(1)
            .and_then(|i| usize::try_from(i).ok())
            .map(Self)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance#{}", self.0)
    }
}

/// Owns every class and instance record of one object graph.
#[derive(Debug, Default)]
pub struct ObjectArena {
    classes: Vec<ClassRecord>,
    instances: Vec<InstanceRecord>,
}

impl ObjectArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn add_class(&mut self, class: ClassRecord) -> ClassId {
        self.classes.push(class);
        ClassId(self.classes.len() - 1)
    }

    pub fn class(&self, id: ClassId) -> Option<&ClassRecord> {
        self.classes.get(id.0)
    }

    /// Create an empty instance of `class` with `ext_ref_count` reference
    /// slots.
    pub fn add_instance(&mut self, class: ClassId, ext_ref_count: u32) -> StreamResult<InstanceId> {
        let class_record = self
            .classes
            .get_mut(class.0)
            .ok_or(StreamError::UnknownClass(class))?;
        let instance = InstanceRecord::new(class, class_record, ext_ref_count)?;
        class_record.add_ref();
        self.instances.push(instance);
        Ok(InstanceId(self.instances.len() - 1))
    }

    pub fn instance(&self, id: InstanceId) -> Option<&InstanceRecord> {
        self.instances.get(id.0)
    }

    pub fn instance_mut(&mut self, id: InstanceId) -> Option<&mut InstanceRecord> {
        self.instances.get_mut(id.0)
    }

    /// The class record an instance is linked to.
    pub fn class_of(&self, id: InstanceId) -> Option<&ClassRecord> {
        self.instance(id).and_then(|i| self.class(i.class()))
    }

    /// Set a property value by name.
    pub fn set_property(
        &mut self,
        id: InstanceId,
        name: &str,
        value: Option<&[u8]>,
    ) -> StreamResult<()> {
        let index = self
            .class_of(id)
            .ok_or(StreamError::UnknownInstance(id))?
            .property_index(name)
            .ok_or_else(|| StreamError::UnknownProperty(name.to_string()))?;
        self.instances[id.0].set_value(index, value)
    }

    pub fn property(&self, id: InstanceId, name: &str) -> Option<&[u8]> {
        let index = self.class_of(id)?.property_index(name)?;
        self.instance(id)?.value(index)
    }

    /// Point reference slot `slot` of `id` at `target` (or clear it).
    pub fn set_reference(
        &mut self,
        id: InstanceId,
        slot: usize,
        target: Option<InstanceId>,
    ) -> StreamResult<()> {
        if let Some(t) = target {
            if t.0 >= self.instances.len() {
                return Err(StreamError::UnknownInstance(t));
            }
            if t == id {
                return Err(StreamError::CyclicReference(id));
            }
        }
        self.instances
            .get_mut(id.0)
            .ok_or(StreamError::UnknownInstance(id))?
            .set_ext_ref(slot, target)
    }

    /// Append decoded records. Instances must already be linked to class
    /// handles that are valid once `classes` is appended.
    pub(crate) fn commit(&mut self, classes: Vec<ClassRecord>, instances: Vec<InstanceRecord>) {
        self.classes.extend(classes);
        self.instances.extend(instances);
    }

    /// Whether `a` in this arena and `b` in `other` have the same class
    /// shape, names, values and reference topology.
    pub fn same_content(&self, a: InstanceId, other: &ObjectArena, b: InstanceId) -> bool {
        self.same_content_at(a, other, b, 0)
    }

    fn same_content_at(&self, a: InstanceId, other: &ObjectArena, b: InstanceId, depth: usize) -> bool {
        if depth > MAX_REFERENCE_DEPTH {
            return false;
        }
        let (Some(ia), Some(ib)) = (self.instance(a), other.instance(b)) else {
            return false;
        };
        let (Some(ca), Some(cb)) = (self.class(ia.class()), other.class(ib.class())) else {
            return false;
        };
        if !ca.same_shape(cb)
            || ia.host_name() != ib.host_name()
            || ia.namespace() != ib.namespace()
            || ia.ext_ref_count() != ib.ext_ref_count()
        {
            return false;
        }
        if (0..ia.value_count()).any(|i| ia.value(i) != ib.value(i)) {
            return false;
        }
        (0..ia.ext_ref_count()).all(|slot| match (ia.ext_ref(slot), ib.ext_ref(slot)) {
            (None, None) => true,
            (Some(ra), Some(rb)) => self.same_content_at(ra, other, rb, depth + 1),
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena_with_class() -> (ObjectArena, ClassId) {
        let mut arena = ObjectArena::new();
        let class = arena.add_class(ClassRecord::new("CIM_Foo", "root/test", &["Key", "Value"]).unwrap());
        (arena, class)
    }

    #[test]
    fn tokens_skip_zero() {
        assert_eq!(InstanceId::from_index(0).token(), 1);
        assert_eq!(InstanceId::from_token(1), Some(InstanceId::from_index(0)));
        assert_eq!(InstanceId::from_token(0), None);
    }

    #[test]
    fn add_instance_counts_class_refs() {
        let (mut arena, class) = arena_with_class();
        arena.add_instance(class, 0).unwrap();
        arena.add_instance(class, 0).unwrap();
        assert_eq!(arena.class(class).unwrap().ref_count(), 2);
        assert_eq!(arena.instance_count(), 2);
    }

    #[test]
    fn add_instance_unknown_class() {
        let mut arena = ObjectArena::new();
        let err = arena.add_instance(ClassId::from_index(3), 0).unwrap_err();
        assert!(matches!(err, StreamError::UnknownClass(_)));
    }

    #[test]
    fn properties_by_name() {
        let (mut arena, class) = arena_with_class();
        let inst = arena.add_instance(class, 0).unwrap();
        arena.set_property(inst, "key", Some(b"k1")).unwrap();
        assert_eq!(arena.property(inst, "Key"), Some(&b"k1"[..]));
        assert_eq!(arena.property(inst, "Value"), None);
        assert!(matches!(
            arena.set_property(inst, "Nope", Some(b"x")),
            Err(StreamError::UnknownProperty(_))
        ));
    }

    #[test]
    fn references_are_validated() {
        let (mut arena, class) = arena_with_class();
        let a = arena.add_instance(class, 1).unwrap();
        let b = arena.add_instance(class, 0).unwrap();
        arena.set_reference(a, 0, Some(b)).unwrap();
        assert_eq!(arena.instance(a).unwrap().ext_ref(0), Some(b));

        assert!(matches!(
            arena.set_reference(a, 0, Some(InstanceId::from_index(9))),
            Err(StreamError::UnknownInstance(_))
        ));
        assert!(matches!(
            arena.set_reference(a, 0, Some(a)),
            Err(StreamError::CyclicReference(_))
        ));
        assert!(matches!(
            arena.set_reference(a, 1, Some(b)),
            Err(StreamError::InvalidSlot { .. })
        ));
    }

    #[test]
    fn same_content_compares_values_and_refs() {
        let (mut arena, class) = arena_with_class();
        let a = arena.add_instance(class, 1).unwrap();
        let b = arena.add_instance(class, 0).unwrap();
        arena.set_property(b, "Key", Some(b"child")).unwrap();
        arena.set_reference(a, 0, Some(b)).unwrap();

        let (mut other, other_class) = arena_with_class();
        let a2 = other.add_instance(other_class, 1).unwrap();
        let b2 = other.add_instance(other_class, 0).unwrap();
        other.set_property(b2, "Key", Some(b"child")).unwrap();
        other.set_reference(a2, 0, Some(b2)).unwrap();

        assert!(arena.same_content(a, &other, a2));
        other.set_property(b2, "Key", Some(b"different")).unwrap();
        assert!(!arena.same_content(a, &other, a2));
    }
}
