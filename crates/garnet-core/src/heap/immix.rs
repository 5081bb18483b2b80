//! Mature generation allocator (Immix-style)
//!
//! The mature heap is divided into 32 KiB blocks of 256-byte lines.
//! Allocation bump-runs through "holes" (maximal runs of free lines),
//! preferring recycled blocks over fresh ones. Reclamation marks live
//! objects, classifies lines by overlap with marked objects, returns fully
//! free blocks to the pool, and selectively evacuates fragmented blocks:
//! only sparse blocks pay a copy cost, dense blocks are reused in place.
//!
//! Pinned objects are never moved and take their host block out of
//! evacuation candidacy.

use super::Slot;
use crate::heap::Address;
use crate::object::HeapObject;
use crate::types::TypeRegistry;

/// Block size in bytes
pub const BLOCK_BYTES: usize = 32 * 1024;

/// Line size in bytes
pub const LINE_BYTES: usize = 256;

/// Lines per block
pub const LINES_PER_BLOCK: usize = BLOCK_BYTES / LINE_BYTES;

struct BlockSlot {
    /// Byte extent within the block (start, end)
    extent: (u32, u32),
    state: Slot,
}

/// One mature block: object slots plus line occupancy
pub struct Block {
    slots: Vec<BlockSlot>,
    free_slots: Vec<u32>,
    line_used: [bool; LINES_PER_BLOCK],
    /// Bump cursor within the current hole (byte offset)
    cursor: u32,
    /// End of the current hole (byte offset)
    limit: u32,
    evacuate: bool,
}

impl Block {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_slots: Vec::new(),
            line_used: [false; LINES_PER_BLOCK],
            cursor: 0,
            limit: 0,
            evacuate: false,
        }
    }

    /// Restart hole scanning from the first line
    fn rewind(&mut self) {
        self.cursor = 0;
        self.limit = 0;
    }

    /// Advance to the next hole (run of free lines) after the current one
    fn next_hole(&mut self) -> bool {
        let mut line = (self.limit as usize) / LINE_BYTES;
        while line < LINES_PER_BLOCK && self.line_used[line] {
            line += 1;
        }
        if line >= LINES_PER_BLOCK {
            return false;
        }
        let start = line;
        while line < LINES_PER_BLOCK && !self.line_used[line] {
            line += 1;
        }
        self.cursor = (start * LINE_BYTES) as u32;
        self.limit = (line * LINE_BYTES) as u32;
        true
    }

    /// Bump-allocate `size` bytes within the block's holes
    fn bump(&mut self, size: u32) -> Option<u32> {
        loop {
            if self.cursor + size <= self.limit {
                let start = self.cursor;
                self.cursor += size;
                self.mark_used(start, self.cursor);
                return Some(start);
            }
            if !self.next_hole() {
                return None;
            }
        }
    }

    fn mark_used(&mut self, start: u32, end: u32) {
        let first = (start as usize) / LINE_BYTES;
        let last = ((end - 1) as usize) / LINE_BYTES;
        for line in first..=last {
            self.line_used[line] = true;
        }
    }

    fn place(&mut self, object: HeapObject, start: u32, size: u32) -> u32 {
        let slot = BlockSlot {
            extent: (start, start + size),
            state: Slot::Occupied(object),
        };
        match self.free_slots.pop() {
            Some(index) => {
                self.slots[index as usize] = slot;
                index
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(slot);
                index
            }
        }
    }

    /// Number of holes (runs of free lines)
    pub fn holes(&self) -> usize {
        let mut holes = 0;
        let mut in_hole = false;
        for &used in self.line_used.iter() {
            if !used && !in_hole {
                holes += 1;
            }
            in_hole = !used;
        }
        holes
    }

    /// Number of free lines
    pub fn free_lines(&self) -> usize {
        self.line_used.iter().filter(|&&used| !used).count()
    }

    /// Evacuation candidacy for the current cycle
    pub fn is_evacuating(&self) -> bool {
        self.evacuate
    }

    fn has_pinned(&self) -> bool {
        self.slots.iter().any(|s| match &s.state {
            Slot::Occupied(obj) => obj.header.pinned,
            _ => false,
        })
    }

    fn has_live(&self) -> bool {
        self.slots.iter().any(|s| matches!(s.state, Slot::Occupied(_)))
    }

    /// Recompute line occupancy from live extents
    fn rebuild_lines(&mut self) {
        self.line_used = [false; LINES_PER_BLOCK];
        let extents: Vec<(u32, u32)> = self
            .slots
            .iter()
            .filter(|s| matches!(s.state, Slot::Occupied(_)))
            .map(|s| s.extent)
            .collect();
        for (start, end) in extents {
            self.mark_used(start, end);
        }
    }

    /// Return the block to its pristine state (free pool)
    fn reset(&mut self) {
        self.slots.clear();
        self.free_slots.clear();
        self.line_used = [false; LINES_PER_BLOCK];
        self.cursor = 0;
        self.limit = 0;
        self.evacuate = false;
    }
}

/// The mature generation: a pool of Immix blocks
pub struct MatureSpace {
    blocks: Vec<Block>,
    /// Fully free blocks available for reuse
    free_blocks: Vec<u32>,
    /// Partially free blocks, preferred for allocation
    recyclable: Vec<u32>,
    /// Block currently being bump-allocated
    current: Option<u32>,
    bytes_in_use: usize,
    max_bytes: usize,
}

impl MatureSpace {
    /// Create a mature space; `max_bytes` of zero means unbounded growth
    pub fn new(max_bytes: usize) -> Self {
        Self {
            blocks: Vec::new(),
            free_blocks: Vec::new(),
            recyclable: Vec::new(),
            current: None,
            bytes_in_use: 0,
            max_bytes,
        }
    }

    /// Allocate an object into a block hole
    ///
    /// Gives the object back when no block has a fitting hole and the pool
    /// cannot grow.
    pub fn allocate(&mut self, object: HeapObject) -> Result<Address, HeapObject> {
        let size = object.size_in_bytes() as u32;
        // No hole can ever fit a request bigger than a block
        if size as usize > BLOCK_BYTES {
            return Err(object);
        }
        loop {
            if let Some(b) = self.current {
                if let Some(start) = self.blocks[b as usize].bump(size) {
                    let slot = self.blocks[b as usize].place(object, start, size);
                    self.bytes_in_use += size as usize;
                    return Ok(Address::mature(b, slot));
                }
                self.current = None;
            }
            match self.next_block() {
                Some(b) => self.current = Some(b),
                None => return Err(object),
            }
        }
    }

    /// Pick the next allocation target: recycled, then free, then fresh
    ///
    /// Evacuation candidates are never allocation targets.
    fn next_block(&mut self) -> Option<u32> {
        while let Some(b) = self.recyclable.pop() {
            if !self.blocks[b as usize].evacuate {
                self.blocks[b as usize].rewind();
                return Some(b);
            }
        }
        while let Some(b) = self.free_blocks.pop() {
            if !self.blocks[b as usize].evacuate {
                self.blocks[b as usize].rewind();
                return Some(b);
            }
        }
        if self.max_bytes == 0 || (self.blocks.len() + 1) * BLOCK_BYTES <= self.max_bytes {
            let b = self.blocks.len() as u32;
            self.blocks.push(Block::new());
            Some(b)
        } else {
            None
        }
    }

    /// Borrow a slot
    pub fn slot(&self, block: u32, slot: u32) -> &Slot {
        &self
            .blocks
            .get(block as usize)
            .and_then(|b| b.slots.get(slot as usize))
            .unwrap_or_else(|| panic!("corrupt mature address: {}:{}", block, slot))
            .state
    }

    /// Borrow a slot mutably
    pub fn slot_mut(&mut self, block: u32, slot: u32) -> &mut Slot {
        &mut self
            .blocks
            .get_mut(block as usize)
            .and_then(|b| b.slots.get_mut(slot as usize))
            .unwrap_or_else(|| panic!("corrupt mature address: {}:{}", block, slot))
            .state
    }

    /// Flag fragmented blocks for evacuation before a full trace
    ///
    /// A block qualifies when it holds live objects, has at least
    /// `hole_threshold` holes, and contains nothing pinned. Returns the
    /// number of candidates.
    pub(crate) fn select_evacuation_candidates(&mut self, hole_threshold: usize) -> usize {
        self.current = None;
        let mut candidates = 0;
        for block in self.blocks.iter_mut() {
            block.evacuate = block.has_live()
                && block.holes() >= hole_threshold
                && !block.has_pinned();
            if block.evacuate {
                candidates += 1;
            }
        }
        candidates
    }

    /// Line/block accounting after a full trace
    ///
    /// Unmarked objects die (with cleanup for flagged types), vacated slots
    /// retire, lines are reclassified from live extents, all-dead blocks
    /// return to the free pool and partially free blocks become recyclable.
    pub(crate) fn sweep(&mut self, current_mark: u8, types: &TypeRegistry) {
        self.current = None;
        self.free_blocks.clear();
        self.recyclable.clear();
        let mut bytes_in_use = 0;

        for (index, block) in self.blocks.iter_mut().enumerate() {
            let mut live_bytes = 0;
            for (slot_index, slot) in block.slots.iter_mut().enumerate() {
                match &mut slot.state {
                    Slot::Occupied(obj) => {
                        if obj.header.marked_p(current_mark) {
                            live_bytes += obj.size_in_bytes();
                        } else {
                            if obj.header.requires_cleanup {
                                let desc = types.get_or_panic(obj.header.type_id);
                                if let Some(cleanup) = desc.cleanup {
                                    cleanup(obj);
                                }
                            }
                            slot.state = Slot::Free;
                            block.free_slots.push(slot_index as u32);
                        }
                    }
                    Slot::Forwarded(_) => {
                        slot.state = Slot::Free;
                        block.free_slots.push(slot_index as u32);
                    }
                    Slot::Free => {}
                }
            }
            block.evacuate = false;
            if live_bytes == 0 {
                block.reset();
                self.free_blocks.push(index as u32);
            } else {
                block.rebuild_lines();
                if block.free_lines() > 0 {
                    self.recyclable.push(index as u32);
                }
                bytes_in_use += live_bytes;
            }
        }
        self.bytes_in_use = bytes_in_use;
    }

    /// Live object bytes
    pub fn bytes_in_use(&self) -> usize {
        self.bytes_in_use
    }

    /// Total blocks in the pool
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Blocks currently in the free pool
    pub fn free_block_count(&self) -> usize {
        self.free_blocks.len()
    }

    /// Borrow a block (diagnostics)
    pub fn block(&self, index: u32) -> &Block {
        &self.blocks[index as usize]
    }

    /// Number of live objects across all blocks (diagnostics)
    pub fn live_objects(&self) -> usize {
        self.blocks
            .iter()
            .map(|b| {
                b.slots
                    .iter()
                    .filter(|s| matches!(s.state, Slot::Occupied(_)))
                    .count()
            })
            .sum()
    }
}
