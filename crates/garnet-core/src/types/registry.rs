//! Type registry
//!
//! Maps [`TypeId`] to [`TypeDescriptor`] by index. Built once during runtime
//! bootstrap via [`TypeRegistryBuilder`], immutable afterwards; the manager
//! holds it behind an `Arc`.

use super::descriptor::{SizeRule, TypeDescriptor};
use super::TypeId;

/// Registry of type descriptors, resolved by index in O(1)
#[derive(Clone, Debug)]
pub struct TypeRegistry {
    types: Vec<TypeDescriptor>,
}

impl TypeRegistry {
    /// Create a registry builder
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder { types: Vec::new() }
    }

    /// Get a descriptor
    pub fn get(&self, id: TypeId) -> Option<&TypeDescriptor> {
        self.types.get(id.index())
    }

    /// Get a descriptor, aborting on an unregistered id
    ///
    /// Collector-internal lookups use this form: an object header naming an
    /// unregistered type means the heap is corrupt.
    pub fn get_or_panic(&self, id: TypeId) -> &TypeDescriptor {
        self.types
            .get(id.index())
            .unwrap_or_else(|| panic!("corrupt header: type {:?} not registered", id))
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Builder for [`TypeRegistry`]
pub struct TypeRegistryBuilder {
    types: Vec<TypeDescriptor>,
}

impl TypeRegistryBuilder {
    /// Register a descriptor, assigning the next [`TypeId`]
    pub fn register(&mut self, mut descriptor: TypeDescriptor) -> TypeId {
        descriptor.validate();
        let id = TypeId(self.types.len() as u16);
        descriptor.id = id;
        self.types.push(descriptor);
        id
    }

    /// Build the immutable registry
    pub fn build(self) -> TypeRegistry {
        TypeRegistry { types: self.types }
    }
}

/// Type ids of the core bootstrap types
#[derive(Clone, Copy, Debug)]
pub struct CoreTypes {
    /// Plain object: traced fields, dedicated ivar slot
    pub object: TypeId,
    /// Tuple: traced fields, no ivar slot (shares the type-attached table)
    pub tuple: TypeId,
    /// Byte array: opaque bytes, never traced
    pub byte_array: TypeId,
}

/// Build the minimal registry used by bootstrap and tests
///
/// The embedding interpreter registers its full object graph on top of (or
/// instead of) these.
pub fn core_registry() -> (TypeRegistry, CoreTypes) {
    let mut builder = TypeRegistry::builder();
    let object = builder.register(
        TypeDescriptor::references("Object", SizeRule::PerField).with_ivars(),
    );
    let tuple = builder.register(TypeDescriptor::references("Tuple", SizeRule::PerField));
    let byte_array = builder.register(TypeDescriptor::bytes("ByteArray", SizeRule::PerField));
    (
        builder.build(),
        CoreTypes {
            object,
            tuple,
            byte_array,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_assigns_sequential_ids() {
        let mut builder = TypeRegistry::builder();
        let a = builder.register(TypeDescriptor::references("A", SizeRule::PerField));
        let b = builder.register(TypeDescriptor::bytes("B", SizeRule::Fixed(8)));
        let registry = builder.build();

        assert_eq!(a, TypeId(0));
        assert_eq!(b, TypeId(1));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(a).unwrap().name, "A");
        assert_eq!(registry.get(b).unwrap().name, "B");
        assert!(registry.get(TypeId(2)).is_none());
    }

    #[test]
    fn test_core_registry() {
        let (registry, core) = core_registry();
        assert!(!registry.is_empty());
        assert!(registry.get(core.object).unwrap().can_store_ivars);
        assert!(!registry.get(core.tuple).unwrap().can_store_ivars);
        assert_eq!(
            registry.get(core.byte_array).unwrap().body,
            crate::object::BodyKind::Bytes
        );
    }

    #[test]
    #[should_panic(expected = "not registered")]
    fn test_unregistered_lookup_aborts() {
        let registry = TypeRegistry::builder().build();
        registry.get_or_panic(TypeId(7));
    }
}
