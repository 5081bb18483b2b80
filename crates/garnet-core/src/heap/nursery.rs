//! Young generation allocator
//!
//! Byte-accounted bump allocation over a fixed-size nursery: allocation is
//! O(1) and only advances the occupancy counter; there is no per-object
//! free accounting within a cycle. Exhaustion signals the orchestrator, which
//! runs a copying collection and retries.
//!
//! Slot ids (the young half of the address space) are recycled after
//! reclamation so the arena stays bounded; occupancy is tracked purely in
//! bytes, matching the bump contract.

use super::Slot;
use crate::heap::Address;
use crate::object::HeapObject;
use crate::types::TypeRegistry;

/// The nursery
pub struct Nursery {
    slots: Vec<Slot>,
    free: Vec<u32>,
    bytes_used: usize,
    capacity: usize,
}

impl Nursery {
    /// Create a nursery with the given byte capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            bytes_used: 0,
            capacity,
        }
    }

    /// Bump-allocate; gives the object back when the nursery is exhausted
    pub fn allocate(&mut self, object: HeapObject) -> Result<Address, HeapObject> {
        let size = object.size_in_bytes();
        if self.bytes_used + size > self.capacity {
            return Err(object);
        }
        Ok(self.place(object, size))
    }

    /// Place a survivor copy during a collection cycle
    ///
    /// Skips the capacity check: the survivors of a cycle occupied the
    /// nursery before it, so they fit after it.
    pub(crate) fn allocate_survivor(&mut self, object: HeapObject) -> Address {
        let size = object.size_in_bytes();
        self.place(object, size)
    }

    fn place(&mut self, object: HeapObject, size: usize) -> Address {
        self.bytes_used += size;
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
        Address::young(slot)
    }

    /// Borrow a slot
    pub fn slot(&self, index: u32) -> &Slot {
        self.slots
            .get(index as usize)
            .unwrap_or_else(|| panic!("corrupt young address: slot {} out of range", index))
    }

    /// Borrow a slot mutably
    pub fn slot_mut(&mut self, index: u32) -> &mut Slot {
        self.slots
            .get_mut(index as usize)
            .unwrap_or_else(|| panic!("corrupt young address: slot {} out of range", index))
    }

    /// Reclaim everything the cycle left behind
    ///
    /// Objects not stamped with the current cycle mark are dead; vacated
    /// (forwarded-from) slots are retired with them. Cleanup callbacks run
    /// for dead objects of flagged types. Occupancy is recomputed from the
    /// survivors, so a cycle with no survivors leaves the nursery empty.
    pub(crate) fn reclaim(&mut self, current_mark: u8, types: &TypeRegistry) {
        let mut live_bytes = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            match slot {
                Slot::Occupied(obj) => {
                    if obj.header.marked_p(current_mark) {
                        live_bytes += obj.size_in_bytes();
                    } else {
                        let desc = types.get_or_panic(obj.header.type_id);
                        if obj.header.requires_cleanup {
                            if let Some(cleanup) = desc.cleanup {
                                cleanup(obj);
                            }
                        }
                        *slot = Slot::Free;
                        self.free.push(index as u32);
                    }
                }
                Slot::Forwarded(_) => {
                    *slot = Slot::Free;
                    self.free.push(index as u32);
                }
                Slot::Free => {}
            }
        }
        self.bytes_used = live_bytes;
    }

    /// Bytes currently occupied
    pub fn bytes_used(&self) -> usize {
        self.bytes_used
    }

    /// Byte capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Occupancy as a percentage of capacity
    pub fn percentage_used(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        (self.bytes_used as f64 / self.capacity as f64) * 100.0
    }

    /// Number of live objects (diagnostics)
    pub fn live_objects(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, Slot::Occupied(_)))
            .count()
    }
}
