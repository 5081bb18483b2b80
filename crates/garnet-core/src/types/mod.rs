//! Per-type descriptor table
//!
//! The descriptor table is the collector's only polymorphism mechanism: given
//! a [`TypeId`] it resolves in O(1) to a [`TypeDescriptor`] providing the
//! size rule, trace rule, cleanup rule and display rule for that type. The
//! collector never special-cases a concrete type by name.

mod descriptor;
mod registry;

pub use descriptor::{CleanupFn, DisplayFn, SizeRule, TraceRule, TypeDescriptor};
pub use registry::{core_registry, CoreTypes, TypeRegistry, TypeRegistryBuilder};

/// Index into the type descriptor table
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct TypeId(pub u16);

impl TypeId {
    /// Table index
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}
