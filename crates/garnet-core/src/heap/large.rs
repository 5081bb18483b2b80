//! Large object space
//!
//! Objects at or above the large-object threshold skip the nursery and the
//! block allocator: copying them is expensive and they would shred block
//! lines. They live here, size-tracked, and never move; reclamation is a
//! plain mark check.

use super::Slot;
use crate::heap::Address;
use crate::object::HeapObject;
use crate::types::TypeRegistry;

/// The large object space
pub struct LargeSpace {
    slots: Vec<Slot>,
    free: Vec<u32>,
    bytes_in_use: usize,
}

impl LargeSpace {
    /// Create an empty large object space
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            bytes_in_use: 0,
        }
    }

    /// Allocate a large object; never fails locally, the heap applies the
    /// footprint cap before calling
    pub fn allocate(&mut self, object: HeapObject) -> Address {
        self.bytes_in_use += object.size_in_bytes();
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot as usize] = Slot::Occupied(object);
                slot
            }
            None => {
                let slot = self.slots.len() as u32;
                self.slots.push(Slot::Occupied(object));
                slot
            }
        };
        Address::large(slot)
    }

    /// Borrow a slot
    pub fn slot(&self, index: u32) -> &Slot {
        self.slots
            .get(index as usize)
            .unwrap_or_else(|| panic!("corrupt large address: slot {} out of range", index))
    }

    /// Borrow a slot mutably
    pub fn slot_mut(&mut self, index: u32) -> &mut Slot {
        self.slots
            .get_mut(index as usize)
            .unwrap_or_else(|| panic!("corrupt large address: slot {} out of range", index))
    }

    /// Drop unmarked objects after a full trace
    pub(crate) fn sweep(&mut self, current_mark: u8, types: &TypeRegistry) {
        let mut bytes_in_use = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            match slot {
                Slot::Occupied(obj) => {
                    if obj.header.marked_p(current_mark) {
                        bytes_in_use += obj.size_in_bytes();
                    } else {
                        if obj.header.requires_cleanup {
                            let desc = types.get_or_panic(obj.header.type_id);
                            if let Some(cleanup) = desc.cleanup {
                                cleanup(obj);
                            }
                        }
                        *slot = Slot::Free;
                        self.free.push(index as u32);
                    }
                }
                Slot::Forwarded(_) => {
                    unreachable!("large objects never relocate")
                }
                Slot::Free => {}
            }
        }
        self.bytes_in_use = bytes_in_use;
    }

    /// Live object bytes
    pub fn bytes_in_use(&self) -> usize {
        self.bytes_in_use
    }

    /// Number of live objects (diagnostics)
    pub fn live_objects(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, Slot::Occupied(_)))
            .count()
    }
}

impl Default for LargeSpace {
    fn default() -> Self {
        Self::new()
    }
}
