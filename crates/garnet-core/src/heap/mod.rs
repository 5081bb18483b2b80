//! Heap zones and address model
//!
//! The heap is an arena of object slots split across three zones: the
//! copying nursery, the block-structured mature generation, and the large
//! object space. A reference carries a packed [`Address`] (zone plus
//! zone-local coordinates) instead of a raw pointer, so relocation is "copy
//! into a new slot, record old index -> new index" and a stale address can
//! only resolve through its forward record.

mod immix;
mod large;
mod nursery;

pub use immix::{Block, MatureSpace, BLOCK_BYTES, LINES_PER_BLOCK, LINE_BYTES};
pub use large::LargeSpace;
pub use nursery::Nursery;

use crate::object::HeapObject;
use crate::value::Value;
use rustc_hash::FxHashSet;
use std::fmt;

/// Generation an object lives in
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Zone {
    /// Nursery: bump-allocated, reclaimed by pure copying
    Young,
    /// Immix blocks: bump allocation into free lines, selective evacuation
    Mature,
    /// Large object space: size-tracked, never relocated
    Large,
}

/// Packed heap address
///
/// Layout (low to high): 2 zone bits, then zone-local coordinates. Mature
/// addresses pack a 20-bit slot index and the block index above it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(u64);

const ZONE_YOUNG: u64 = 0;
const ZONE_MATURE: u64 = 1;
const ZONE_LARGE: u64 = 2;
const ZONE_MASK: u64 = 0b11;
const MATURE_SLOT_BITS: u64 = 20;
const MATURE_SLOT_MASK: u64 = (1 << MATURE_SLOT_BITS) - 1;

impl Address {
    /// Address of a nursery slot
    #[inline]
    pub fn young(slot: u32) -> Self {
        Address(((slot as u64) << 2) | ZONE_YOUNG)
    }

    /// Address of a mature slot
    #[inline]
    pub fn mature(block: u32, slot: u32) -> Self {
        debug_assert!((slot as u64) <= MATURE_SLOT_MASK);
        Address(((block as u64) << (2 + MATURE_SLOT_BITS)) | ((slot as u64) << 2) | ZONE_MATURE)
    }

    /// Address of a large object slot
    #[inline]
    pub fn large(slot: u32) -> Self {
        Address(((slot as u64) << 2) | ZONE_LARGE)
    }

    /// Rebuild an address from its raw bits (reference decoding)
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Address(raw)
    }

    /// Raw bits (reference encoding)
    #[inline]
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Zone of this address
    #[inline]
    pub fn zone(&self) -> Zone {
        match self.0 & ZONE_MASK {
            ZONE_YOUNG => Zone::Young,
            ZONE_MATURE => Zone::Mature,
            ZONE_LARGE => Zone::Large,
            _ => panic!("corrupt address: {:#x}", self.0),
        }
    }

    /// Nursery slot index
    #[inline]
    pub fn young_slot(&self) -> u32 {
        debug_assert_eq!(self.0 & ZONE_MASK, ZONE_YOUNG);
        (self.0 >> 2) as u32
    }

    /// Mature block index
    #[inline]
    pub fn mature_block(&self) -> u32 {
        debug_assert_eq!(self.0 & ZONE_MASK, ZONE_MATURE);
        (self.0 >> (2 + MATURE_SLOT_BITS)) as u32
    }

    /// Mature slot index within its block
    #[inline]
    pub fn mature_slot(&self) -> u32 {
        debug_assert_eq!(self.0 & ZONE_MASK, ZONE_MATURE);
        ((self.0 >> 2) & MATURE_SLOT_MASK) as u32
    }

    /// Large object slot index
    #[inline]
    pub fn large_slot(&self) -> u32 {
        debug_assert_eq!(self.0 & ZONE_MASK, ZONE_LARGE);
        (self.0 >> 2) as u32
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.zone() {
            Zone::Young => write!(f, "young:{}", self.young_slot()),
            Zone::Mature => write!(f, "mature:{}:{}", self.mature_block(), self.mature_slot()),
            Zone::Large => write!(f, "large:{}", self.large_slot()),
        }
    }
}

/// One arena slot
///
/// A relocated object leaves its slot as `Forwarded(new)`: the overwritten
/// header of the forwarding protocol. Reclamation turns dead and
/// forwarded-from slots into `Free`, after which any reference still naming
/// them is a heap corruption.
#[derive(Debug)]
pub enum Slot {
    /// Live object
    Occupied(HeapObject),
    /// Relocated this cycle; resolves via one indirection
    Forwarded(Value),
    /// Reclaimed
    Free,
}

/// Heap tuning knobs
///
/// The promotion and evacuation thresholds are tunable parameters, not
/// contracts; defaults follow the original runtime's order of magnitude.
#[derive(Clone, Debug)]
pub struct HeapConfig {
    /// Nursery capacity in bytes
    pub nursery_bytes: usize,
    /// Young copy cycles an object survives before promotion
    pub lifetime: u8,
    /// Allocations at or above this many bytes bypass the nursery entirely;
    /// clamped to the mature block size at heap creation
    pub large_object_threshold: usize,
    /// Young survivors at or above this many bytes are promoted immediately
    pub promotion_size_threshold: usize,
    /// Blocks with at least this many holes become evacuation candidates
    pub evacuate_hole_threshold: usize,
    /// Mature + large footprint cap in bytes (0 = unlimited)
    pub max_mature_bytes: usize,
    /// Initial mature occupancy that requests a full collection; raised
    /// adaptively to twice the live size after each full cycle
    pub mature_gc_threshold: usize,
    /// Emit one-line cycle summaries to stderr
    pub gc_show: bool,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            nursery_bytes: 256 * 1024,
            lifetime: 4,
            large_object_threshold: 2048,
            promotion_size_threshold: 1024,
            evacuate_hole_threshold: 2,
            max_mature_bytes: 0,
            mature_gc_threshold: 1024 * 1024,
            gc_show: false,
        }
    }
}

/// The three-zone heap plus the remembered set
pub struct Heap {
    config: HeapConfig,
    pub(crate) nursery: Nursery,
    pub(crate) mature: MatureSpace,
    pub(crate) large: LargeSpace,
    /// Mature/large objects holding references into the nursery
    remembered: FxHashSet<Address>,
    /// Young collection requested
    pub collect_young_now: bool,
    /// Full collection requested
    pub collect_mature_now: bool,
    /// Current full-collection trigger in bytes (adaptive)
    pub(crate) mature_gc_trigger: usize,
    bytes_allocated_since_gc: usize,
}

impl Heap {
    /// Create a heap
    pub fn new(mut config: HeapConfig) -> Self {
        // Anything too big for one mature block must take the large path
        if config.large_object_threshold > BLOCK_BYTES {
            config.large_object_threshold = BLOCK_BYTES;
        }
        let nursery = Nursery::new(config.nursery_bytes);
        let mature = MatureSpace::new(config.max_mature_bytes);
        let mature_gc_trigger = config.mature_gc_threshold;
        Self {
            config,
            nursery,
            mature,
            large: LargeSpace::new(),
            remembered: FxHashSet::default(),
            collect_young_now: false,
            collect_mature_now: false,
            mature_gc_trigger,
            bytes_allocated_since_gc: 0,
        }
    }

    /// Heap configuration
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Borrow a slot
    pub fn slot(&self, addr: Address) -> &Slot {
        match addr.zone() {
            Zone::Young => self.nursery.slot(addr.young_slot()),
            Zone::Mature => self.mature.slot(addr.mature_block(), addr.mature_slot()),
            Zone::Large => self.large.slot(addr.large_slot()),
        }
    }

    /// Borrow a slot mutably
    pub fn slot_mut(&mut self, addr: Address) -> &mut Slot {
        match addr.zone() {
            Zone::Young => self.nursery.slot_mut(addr.young_slot()),
            Zone::Mature => self.mature.slot_mut(addr.mature_block(), addr.mature_slot()),
            Zone::Large => self.large.slot_mut(addr.large_slot()),
        }
    }

    /// Resolve an address to its live object
    ///
    /// A forwarded or freed slot here means a reference escaped a collection
    /// cycle without being rewritten; the heap cannot be trusted, so abort.
    pub fn get(&self, addr: Address) -> &HeapObject {
        match self.slot(addr) {
            Slot::Occupied(obj) => obj,
            Slot::Forwarded(to) => panic!(
                "stale reference: {:?} was relocated to {:?} but never rewritten",
                addr, to
            ),
            Slot::Free => panic!("dangling reference into reclaimed space: {:?}", addr),
        }
    }

    /// Resolve an address to its live object, mutably
    pub fn get_mut(&mut self, addr: Address) -> &mut HeapObject {
        match self.slot_mut(addr) {
            Slot::Occupied(obj) => obj,
            Slot::Forwarded(to) => panic!(
                "stale reference: {:?} was relocated to {:?} but never rewritten",
                addr, to
            ),
            Slot::Free => panic!("dangling reference into reclaimed space: {:?}", addr),
        }
    }

    /// Follow a forward record, if any (one indirection)
    ///
    /// During a collection cycle an in-flight address may name a slot that
    /// has already been vacated; the forward self-heals it.
    pub fn resolve(&self, value: Value) -> Value {
        match value.as_address() {
            Some(addr) => match self.slot(addr) {
                Slot::Forwarded(to) => *to,
                _ => value,
            },
            None => value,
        }
    }

    /// Stamp a vacated slot with its relocation record (collector-internal)
    ///
    /// Forwarding is final for the cycle: re-forwarding to the same target is
    /// a no-op, re-forwarding to a different target means the heap is corrupt
    /// and aborts immediately.
    pub(crate) fn forward_slot(&mut self, addr: Address, to: Value) {
        let slot = self.slot_mut(addr);
        match slot {
            Slot::Forwarded(existing) => {
                if *existing != to {
                    panic!(
                        "double forward: {:?} already forwarded to {:?}, new target {:?}",
                        addr, existing, to
                    );
                }
            }
            _ => *slot = Slot::Forwarded(to),
        }
    }

    /// Allocate into the nursery
    ///
    /// Gives the object back on exhaustion so the orchestrator can collect
    /// and retry.
    pub fn allocate_young(&mut self, object: HeapObject) -> Result<Address, HeapObject> {
        let size = object.size_in_bytes();
        let addr = self.nursery.allocate(object)?;
        self.bytes_allocated_since_gc += size;
        Ok(addr)
    }

    /// Allocate a nursery slot for a survivor copy (collector-internal)
    ///
    /// Bypasses the capacity check: survivors of a cycle always fit because
    /// they fit before it.
    pub(crate) fn allocate_young_survivor(&mut self, object: HeapObject) -> Address {
        self.nursery.allocate_survivor(object)
    }

    /// Allocate into the mature generation
    pub fn allocate_mature(&mut self, object: HeapObject) -> Result<Address, HeapObject> {
        let size = object.size_in_bytes();
        let addr = self.mature.allocate(object)?;
        self.bytes_allocated_since_gc += size;
        if self.mature_footprint() > self.mature_gc_trigger {
            self.collect_mature_now = true;
        }
        Ok(addr)
    }

    /// Allocate into the large object space
    pub fn allocate_large(&mut self, object: HeapObject) -> Result<Address, HeapObject> {
        let size = object.size_in_bytes();
        if self.config.max_mature_bytes > 0
            && self.mature_footprint() + size > self.config.max_mature_bytes
        {
            return Err(object);
        }
        self.bytes_allocated_since_gc += size;
        let addr = self.large.allocate(object);
        if self.mature_footprint() > self.mature_gc_trigger {
            self.collect_mature_now = true;
        }
        Ok(addr)
    }

    /// Record a mature/large object that received a young reference
    ///
    /// Called on every mutator store; young-only cycles use the remembered
    /// set as roots instead of scanning the whole mature heap.
    pub fn write_barrier(&mut self, holder: Address, stored: Value) {
        if holder.zone() == Zone::Young {
            return;
        }
        if let Some(target) = stored.as_address() {
            if target.zone() == Zone::Young {
                self.remembered.insert(holder);
            }
        }
    }

    /// Re-insert a remembered holder (collector-internal)
    pub(crate) fn remember(&mut self, holder: Address) {
        debug_assert_ne!(holder.zone(), Zone::Young);
        self.remembered.insert(holder);
    }

    /// Drain the remembered set for a cycle
    pub(crate) fn take_remembered(&mut self) -> Vec<Address> {
        self.remembered.drain().collect()
    }

    /// Check remembered set membership (diagnostics)
    pub fn is_remembered(&self, holder: Address) -> bool {
        self.remembered.contains(&holder)
    }

    /// Bytes allocated since the last collection cycle
    pub fn bytes_allocated_since_gc(&self) -> usize {
        self.bytes_allocated_since_gc
    }

    /// Reset the per-cycle allocation counter (collector-internal)
    pub(crate) fn reset_allocation_counter(&mut self) {
        self.bytes_allocated_since_gc = 0;
    }

    /// Combined mature and large footprint in bytes
    pub fn mature_footprint(&self) -> usize {
        self.mature.bytes_in_use() + self.large.bytes_in_use()
    }

    /// Nursery accessor
    pub fn nursery(&self) -> &Nursery {
        &self.nursery
    }

    /// Mature space accessor
    pub fn mature(&self) -> &MatureSpace {
        &self.mature
    }

    /// Large object space accessor
    pub fn large(&self) -> &LargeSpace {
        &self.large
    }
}
