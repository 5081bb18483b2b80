//! Object headers and bodies
//!
//! Every heap value is a [`HeapObject`]: a fixed-shape [`ObjectHeader`]
//! followed by a variable-length [`Body`] that is either a sequence of traced
//! references or an opaque byte buffer, plus lazily-created ivar storage.
//!
//! The header carries everything the collector needs without consulting the
//! type descriptor: zone, body kind, mark byte, age and pin flag. The record
//! left behind when an object relocates lives in its vacated arena slot, not
//! here (see [`crate::heap::Slot`]).

use crate::heap::Zone;
use crate::ivars::IvarStorage;
use crate::types::TypeId;
use crate::value::Value;

/// Accounted size of an object header in bytes
pub const HEADER_BYTES: usize = 16;

/// Accounted size of one reference slot in bytes
pub const SLOT_BYTES: usize = 8;

/// Body interpretation: traced references or opaque bytes
///
/// The two are mutually exclusive by construction; the collector either walks
/// every slot of a `References` body or never looks inside a `Bytes` body.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BodyKind {
    /// Body is an ordered sequence of references, traced by the collector
    References,
    /// Body is an opaque byte buffer, never traced
    Bytes,
}

/// Variable-length object tail
#[derive(Clone, Debug)]
pub enum Body {
    /// Reference slots
    Refs(Vec<Value>),
    /// Raw bytes
    Bytes(Vec<u8>),
}

impl Body {
    /// Create a reference body with every slot set to nil
    pub fn refs(count: usize) -> Self {
        Body::Refs(vec![Value::nil(); count])
    }

    /// Create a zeroed byte body
    pub fn bytes(len: usize) -> Self {
        Body::Bytes(vec![0; len])
    }

    /// Body kind
    pub fn kind(&self) -> BodyKind {
        match self {
            Body::Refs(_) => BodyKind::References,
            Body::Bytes(_) => BodyKind::Bytes,
        }
    }

    /// Number of reference slots (zero for byte bodies)
    pub fn ref_count(&self) -> usize {
        match self {
            Body::Refs(slots) => slots.len(),
            Body::Bytes(_) => 0,
        }
    }

    /// Accounted body size in bytes, rounded up to slot granularity
    pub fn size_in_bytes(&self) -> usize {
        match self {
            Body::Refs(slots) => slots.len() * SLOT_BYTES,
            Body::Bytes(bytes) => (bytes.len() + SLOT_BYTES - 1) & !(SLOT_BYTES - 1),
        }
    }
}

/// Fixed-shape metadata prefix on every heap object
#[derive(Clone, Debug)]
pub struct ObjectHeader {
    /// Type identifier, resolved through the descriptor table
    pub type_id: TypeId,
    /// Generation the object currently lives in
    pub zone: Zone,
    /// Body interpretation
    pub kind: BodyKind,
    /// The collector must never relocate this object
    pub pinned: bool,
    /// Type provides a dedicated per-object ivar slot
    pub can_store_ivars: bool,
    /// Type requires a cleanup callback at reclamation
    pub requires_cleanup: bool,
    /// Cycle-scoped mark byte; its live meaning flips each cycle
    pub mark: u8,
    /// Number of young copy cycles survived
    pub age: u8,
    /// Lazily assigned identity token (0 = unassigned)
    pub object_id: u64,
}

impl ObjectHeader {
    /// Create a header for a freshly allocated object
    pub fn new(type_id: TypeId, zone: Zone, kind: BodyKind) -> Self {
        Self {
            type_id,
            zone,
            kind,
            pinned: false,
            can_store_ivars: false,
            requires_cleanup: false,
            mark: 0,
            age: 0,
            object_id: 0,
        }
    }

    /// Check the mark byte against the current cycle mark
    #[inline]
    pub fn marked_p(&self, current: u8) -> bool {
        self.mark == current
    }

    /// Stamp the current cycle mark
    #[inline]
    pub fn mark(&mut self, current: u8) {
        self.mark = current;
    }
}

/// A complete heap object: header, body, and ivar storage
#[derive(Clone, Debug)]
pub struct HeapObject {
    /// Metadata prefix
    pub header: ObjectHeader,
    /// Variable-length tail
    pub body: Body,
    /// Per-object ivar tier (lazily created)
    pub ivars: IvarStorage,
}

impl HeapObject {
    /// Create an object with the given header and body
    ///
    /// The header's body kind must agree with the body itself.
    pub fn new(header: ObjectHeader, body: Body) -> Self {
        assert_eq!(header.kind, body.kind(), "header/body kind mismatch");
        Self {
            header,
            body,
            ivars: IvarStorage::default(),
        }
    }

    /// Accounted total size in bytes (header plus body)
    ///
    /// This figure drives nursery occupancy and Immix line accounting.
    pub fn size_in_bytes(&self) -> usize {
        HEADER_BYTES + self.body.size_in_bytes()
    }

    /// Number of reference slots
    pub fn field_count(&self) -> usize {
        self.body.ref_count()
    }

    /// Read a reference slot
    pub fn field(&self, index: usize) -> Option<Value> {
        match &self.body {
            Body::Refs(slots) => slots.get(index).copied(),
            Body::Bytes(_) => None,
        }
    }

    /// Write a reference slot without a barrier (collector-internal)
    ///
    /// Returns `false` when the index is out of bounds or the body stores
    /// bytes. Mutator stores go through the descriptor table and the write
    /// barrier instead.
    pub fn set_field_raw(&mut self, index: usize, value: Value) -> bool {
        match &mut self.body {
            Body::Refs(slots) => {
                if let Some(slot) = slots.get_mut(index) {
                    *slot = value;
                    true
                } else {
                    false
                }
            }
            Body::Bytes(_) => false,
        }
    }

    /// Reset every reference slot to nil
    pub fn clear_fields(&mut self) {
        if let Body::Refs(slots) = &mut self.body {
            for slot in slots.iter_mut() {
                *slot = Value::nil();
            }
        }
    }

    /// Byte body contents
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.body {
            Body::Bytes(bytes) => Some(bytes),
            Body::Refs(_) => None,
        }
    }

    /// Mutable byte body contents
    pub fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        match &mut self.body {
            Body::Bytes(bytes) => Some(bytes),
            Body::Refs(_) => None,
        }
    }
}
