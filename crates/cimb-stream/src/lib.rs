//! Compact CIM object records and the binary stream that carries them.
//!
//! Classes and instances live in an [`ObjectArena`] as [`CompactRecord`]s:
//! a single buffer holding a fixed header, string and reference slots, and
//! an append-only heap. [`ObjectStreamer`] flattens a set of instances, and
//! everything they reference, into one self-describing byte stream and
//! rebuilds the graph on the other side.
//!
//! ```
//! use cimb_stream::{ClassRecord, ObjectArena, ObjectStreamer};
//!
//! let mut arena = ObjectArena::new();
//! let class = arena.add_class(ClassRecord::new("CIM_Service", "root/cimv2", &["Name"])?);
//! let svc = arena.add_instance(class, 0)?;
//! arena.set_property(svc, "Name", Some(b"sshd"))?;
//!
//! let bytes = ObjectStreamer::new(&arena, &[svc]).serialize()?;
//!
//! let mut decoded = ObjectArena::new();
//! let top = ObjectStreamer::deserialize(&bytes, &mut decoded)?;
//! assert_eq!(decoded.property(top[0], "name"), Some(&b"sshd"[..]));
//! # Ok::<(), cimb_stream::StreamError>(())
//! ```

pub mod arena;
pub mod buffer;
pub mod class;
pub mod error;
pub mod instance;
pub mod record;
pub mod streamer;
pub mod tables;

pub use arena::{ClassId, InstanceId, ObjectArena, MAX_REFERENCE_DEPTH};
pub use class::ClassRecord;
pub use error::{StreamError, StreamResult};
pub use instance::InstanceRecord;
pub use record::{CompactRecord, RecordKind};
pub use streamer::{ObjectStreamer, INSTANCE_SLACK, STREAM_MAGIC, STREAM_VERSION};
pub use tables::{ResolutionEntry, ResolutionTables};
