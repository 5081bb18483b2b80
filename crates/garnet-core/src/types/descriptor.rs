//! Type descriptors
//!
//! One persistent record per object type, constructed during bootstrap and
//! immutable thereafter.

use super::TypeId;
use crate::object::{BodyKind, HeapObject};

/// Cleanup callback, invoked during reclamation for flagged types
pub type CleanupFn = fn(&mut HeapObject);

/// Display callback for diagnostics
pub type DisplayFn = fn(&HeapObject) -> String;

/// Instance size computation
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SizeRule {
    /// Every instance has exactly this many fields (or bytes)
    Fixed(usize),
    /// The allocation request supplies the field (or byte) count
    PerField,
}

/// Which body slots the collector treats as references
///
/// Trace order is the slot order, which is stable for a type.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TraceRule {
    /// No slot is a reference (byte bodies)
    None,
    /// Every slot is a reference
    AllFields,
    /// Only the first `n` slots are references
    FirstFields(usize),
}

/// Per-type record: size rule, trace rule, cleanup rule, display rule
#[derive(Clone)]
pub struct TypeDescriptor {
    /// Identifier assigned at registration
    pub id: TypeId,
    /// Type name for diagnostics
    pub name: &'static str,
    /// Instance size computation
    pub size: SizeRule,
    /// Body interpretation for instances
    pub body: BodyKind,
    /// Trace rule for instances
    pub trace: TraceRule,
    /// Instances carry a dedicated ivar slot
    pub can_store_ivars: bool,
    /// Instances need [`TypeDescriptor::cleanup`] at reclamation
    pub requires_cleanup: bool,
    /// Native-resource release
    pub cleanup: Option<CleanupFn>,
    /// Show rule
    pub display: Option<DisplayFn>,
}

impl TypeDescriptor {
    /// Descriptor for a reference-bodied type
    pub fn references(name: &'static str, size: SizeRule) -> Self {
        Self {
            id: TypeId(0),
            name,
            size,
            body: BodyKind::References,
            trace: TraceRule::AllFields,
            can_store_ivars: false,
            requires_cleanup: false,
            cleanup: None,
            display: None,
        }
    }

    /// Descriptor for a byte-bodied type (never traced)
    pub fn bytes(name: &'static str, size: SizeRule) -> Self {
        Self {
            id: TypeId(0),
            name,
            size,
            body: BodyKind::Bytes,
            trace: TraceRule::None,
            can_store_ivars: false,
            requires_cleanup: false,
            cleanup: None,
            display: None,
        }
    }

    /// Instances get a dedicated ivar slot
    pub fn with_ivars(mut self) -> Self {
        self.can_store_ivars = true;
        self
    }

    /// Only the first `n` body slots are traced
    pub fn with_trace_prefix(mut self, n: usize) -> Self {
        self.trace = TraceRule::FirstFields(n);
        self
    }

    /// Instances hold native resources released by `cleanup`
    pub fn with_cleanup(mut self, cleanup: CleanupFn) -> Self {
        self.requires_cleanup = true;
        self.cleanup = Some(cleanup);
        self
    }

    /// Custom show rule
    pub fn with_display(mut self, display: DisplayFn) -> Self {
        self.display = Some(display);
        self
    }

    /// Field (or byte) count for an allocation request
    pub fn instance_fields(&self, requested: usize) -> usize {
        match self.size {
            SizeRule::Fixed(n) => n,
            SizeRule::PerField => requested,
        }
    }

    /// Number of leading slots the tracer visits for an instance
    pub fn trace_span(&self, field_count: usize) -> usize {
        match self.trace {
            TraceRule::None => 0,
            TraceRule::AllFields => field_count,
            TraceRule::FirstFields(n) => n.min(field_count),
        }
    }

    /// Render an instance for diagnostics
    pub fn show(&self, object: &HeapObject) -> String {
        match self.display {
            Some(display) => display(object),
            None => format!("#<{}>", self.name),
        }
    }

    /// Check internal coherence; called once at registration
    pub(crate) fn validate(&self) {
        match self.body {
            BodyKind::Bytes => {
                assert!(
                    matches!(self.trace, TraceRule::None),
                    "type {}: byte bodies cannot be traced",
                    self.name
                );
            }
            BodyKind::References => {
                if let (TraceRule::FirstFields(n), SizeRule::Fixed(fields)) = (self.trace, self.size)
                {
                    assert!(
                        n <= fields,
                        "type {}: trace prefix {} exceeds fixed size {}",
                        self.name,
                        n,
                        fields
                    );
                }
            }
        }
        if self.requires_cleanup {
            assert!(
                self.cleanup.is_some(),
                "type {}: requires_cleanup without a cleanup rule",
                self.name
            );
        }
    }
}

impl std::fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("size", &self.size)
            .field("body", &self.body)
            .field("trace", &self.trace)
            .field("can_store_ivars", &self.can_store_ivars)
            .field("requires_cleanup", &self.requires_cleanup)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::Zone;
    use crate::object::{Body, ObjectHeader};

    #[test]
    fn test_size_rules() {
        let fixed = TypeDescriptor::references("Pair", SizeRule::Fixed(2));
        assert_eq!(fixed.instance_fields(10), 2);

        let variable = TypeDescriptor::references("Tuple", SizeRule::PerField);
        assert_eq!(variable.instance_fields(10), 10);
    }

    #[test]
    fn test_trace_span() {
        let all = TypeDescriptor::references("Object", SizeRule::PerField);
        assert_eq!(all.trace_span(4), 4);

        let prefix = TypeDescriptor::references("Scope", SizeRule::PerField).with_trace_prefix(2);
        assert_eq!(prefix.trace_span(4), 2);
        assert_eq!(prefix.trace_span(1), 1);

        let opaque = TypeDescriptor::bytes("ByteArray", SizeRule::PerField);
        assert_eq!(opaque.trace_span(64), 0);
    }

    #[test]
    fn test_default_show() {
        let desc = TypeDescriptor::references("Object", SizeRule::PerField);
        let obj = HeapObject::new(
            ObjectHeader::new(TypeId(0), Zone::Young, crate::object::BodyKind::References),
            Body::refs(0),
        );
        assert_eq!(desc.show(&obj), "#<Object>");
    }

    #[test]
    #[should_panic(expected = "byte bodies cannot be traced")]
    fn test_traced_bytes_rejected() {
        let mut desc = TypeDescriptor::bytes("Bad", SizeRule::PerField);
        desc.trace = TraceRule::AllFields;
        desc.validate();
    }
}
