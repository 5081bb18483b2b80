//! Garnet VM memory core
//!
//! This crate provides the memory manager at the heart of the Garnet VM:
//! - Tagged reference encoding (immediates and heap references)
//! - Object headers, bodies and the per-type descriptor table
//! - Generational garbage collector (copying nursery, Immix-style mature
//!   generation with selective evacuation, large object space)
//! - Stop-the-world coordination for cooperating execution contexts
//! - Instance-variable side storage and object identity
//!
//! The interpreter, JIT and bootstrap layers consume this crate only through
//! the allocation API, the root set, and per-type trace callbacks.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod gc;
pub mod heap;
pub mod ivars;
pub mod memory;
pub mod object;
pub mod runtime;
pub mod safepoint;
pub mod types;
pub mod value;

pub use gc::{CycleKind, FullCycleStats, GcStats, RootId, RootSet, YoungCycleStats};
pub use heap::{Address, Heap, HeapConfig, Zone};
pub use ivars::{IvarStorage, SymbolId, COMPACT_IVAR_CAPACITY};
pub use memory::MemoryManager;
pub use object::{Body, BodyKind, HeapObject, ObjectHeader};
pub use runtime::Runtime;
pub use safepoint::{ContextId, InterruptFlags, PreemptTicker, SafepointCoordinator};
pub use types::{core_registry, CoreTypes, SizeRule, TraceRule, TypeDescriptor, TypeId, TypeRegistry};
pub use value::Value;

/// Memory manager errors
///
/// Allocation exhaustion is recovered internally by collecting and retrying;
/// [`MemoryError::OutOfMemory`] is only reported once a full collection still
/// cannot satisfy the request. Heap invariant violations (double forwards,
/// dangling references) are not errors: they panic immediately, because the
/// heap cannot be trusted afterwards.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// All generations exhausted after a full collection
    #[error("out of memory: unable to allocate {requested} bytes after full collection")]
    OutOfMemory {
        /// Size of the failed request in bytes
        requested: usize,
    },

    /// Type identifier with no registered descriptor
    #[error("unknown type id {0:?}")]
    UnknownType(types::TypeId),

    /// Field access on an immediate value
    #[error("immediate value has no object fields")]
    NotAReference,

    /// Field index outside the object body
    #[error("field index {index} out of bounds (object has {count} fields)")]
    FieldBounds {
        /// Requested field index
        index: usize,
        /// Number of fields in the object
        count: usize,
    },

    /// Operation applied to an object of the wrong shape
    #[error("type error: {0}")]
    TypeError(String),
}

/// Memory operation result
pub type MemoryResult<T> = Result<T, MemoryError>;
