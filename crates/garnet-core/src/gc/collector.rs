//! Collection cycles
//!
//! Two cycle shapes over one tracing core:
//!
//! - A young cycle copies nursery survivors (promoting the old and the
//!   oversized), rooted at the registered roots plus the remembered set, and
//!   never touches mature objects.
//! - A full cycle traces everything, selectively evacuates fragmented mature
//!   blocks, and sweeps all three zones.
//!
//! Tracing uses an explicit mark stack. Visiting a reference relocates or
//! marks its object and pushes the post-move value; scanning pops values and
//! rewrites their fields and ivars through the same visit. The mark byte
//! flips between cycles, so "unmarked" needs no pre-pass.
//!
//! The caller holds the world stopped for the duration of a cycle (see
//! [`crate::safepoint`]); nothing here synchronizes.

use crate::heap::{Slot, Zone};
use crate::memory::MemoryManager;
use crate::object::HeapObject;
use crate::value::Value;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Which generations a cycle covers
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CycleKind {
    /// Nursery only
    Young,
    /// All zones
    Full,
}

/// Summary of one young cycle
#[derive(Clone, Debug)]
pub struct YoungCycleStats {
    /// Nursery occupancy when the cycle started
    pub percentage_used: f64,
    /// Survivors promoted to the mature generation
    pub promoted: usize,
    /// Survivors that qualified for promotion but stayed young for lack of
    /// mature room
    pub excess: usize,
    /// Promotion age in force
    pub lifetime: u8,
    /// Wall time of the cycle
    pub duration: Duration,
}

/// Summary of one full cycle
#[derive(Clone, Debug)]
pub struct FullCycleStats {
    /// Live bytes before the cycle
    pub bytes_before: usize,
    /// Live bytes after the cycle
    pub bytes_after: usize,
    /// Mature objects moved out of fragmented blocks
    pub evacuated: usize,
    /// Wall time of the cycle
    pub duration: Duration,
}

/// Accumulated collection statistics
#[derive(Clone, Debug, Default)]
pub struct GcStats {
    /// Young cycles run
    pub young_cycles: u64,
    /// Full cycles run
    pub full_cycles: u64,
    /// Objects promoted over all cycles
    pub objects_promoted: u64,
    /// Objects evacuated over all cycles
    pub objects_evacuated: u64,
    /// Most recent young cycle
    pub last_young: Option<YoungCycleStats>,
    /// Most recent full cycle
    pub last_full: Option<FullCycleStats>,
}

impl MemoryManager {
    /// Run whichever collections have been requested
    ///
    /// Returns true when a cycle ran. Called from safepoint checkpoints.
    pub fn collect_maybe(&mut self) -> bool {
        let mut collected = false;
        if self.heap.collect_young_now {
            self.collect_young();
            collected = true;
        }
        if self.heap.collect_mature_now {
            self.collect_full();
            collected = true;
        }
        collected
    }

    /// Run a young collection cycle
    pub fn collect_young(&mut self) {
        let start = Instant::now();
        let percentage_used = self.heap.nursery().percentage_used();
        self.flip_mark();
        self.promoted_this_cycle = 0;
        self.excess_this_cycle = 0;

        // Mature holders of young references stand in for the whole mature
        // heap as roots
        let remembered = self.heap.take_remembered();
        for holder in remembered {
            self.scan_object(Value::reference(holder), CycleKind::Young);
        }
        self.trace_roots(CycleKind::Young);
        self.trace_immediate_ivars(CycleKind::Young);
        self.drain_mark_stack(CycleKind::Young);

        let types = Arc::clone(&self.types);
        self.heap.nursery.reclaim(self.current_mark, &types);

        self.heap.collect_young_now = false;
        self.heap.reset_allocation_counter();

        let cycle = YoungCycleStats {
            percentage_used,
            promoted: self.promoted_this_cycle,
            excess: self.excess_this_cycle,
            lifetime: self.heap.config().lifetime,
            duration: start.elapsed(),
        };
        if self.heap.config().gc_show {
            eprintln!(
                "[GC {:.1}% {}/{} {} {}ms]",
                cycle.percentage_used,
                cycle.promoted,
                cycle.excess,
                cycle.lifetime,
                cycle.duration.as_millis()
            );
        }
        self.stats.young_cycles += 1;
        self.stats.objects_promoted += cycle.promoted as u64;
        self.stats.last_young = Some(cycle);
    }

    /// Run a full collection cycle
    pub fn collect_full(&mut self) {
        let start = Instant::now();
        let bytes_before = self.live_bytes();
        self.flip_mark();
        self.promoted_this_cycle = 0;
        self.excess_this_cycle = 0;
        self.evacuated_this_cycle = 0;
        self.live_ids.clear();

        let hole_threshold = self.heap.config().evacuate_hole_threshold;
        self.heap.mature.select_evacuation_candidates(hole_threshold);
        // The full trace rediscovers every mature-to-young edge
        let _ = self.heap.take_remembered();

        self.trace_roots(CycleKind::Full);
        self.trace_immediate_ivars(CycleKind::Full);
        self.drain_mark_stack(CycleKind::Full);

        let types = Arc::clone(&self.types);
        self.heap.nursery.reclaim(self.current_mark, &types);
        self.heap.mature.sweep(self.current_mark, &types);
        self.heap.large.sweep(self.current_mark, &types);

        // Ivar side tables are weak: entries of dead holders die with them
        let live = std::mem::take(&mut self.live_ids);
        self.side_ivars.retain(|id, _| live.contains(id));

        self.heap.collect_young_now = false;
        self.heap.collect_mature_now = false;
        self.heap.reset_allocation_counter();

        // Next full cycle fires once the mature footprint doubles over what
        // survived this one
        let floor = self.heap.config().mature_gc_threshold;
        self.heap.mature_gc_trigger = floor.max(self.heap.mature_footprint() * 2);

        let cycle = FullCycleStats {
            bytes_before,
            bytes_after: self.live_bytes(),
            evacuated: self.evacuated_this_cycle,
            duration: start.elapsed(),
        };
        if self.heap.config().gc_show {
            eprintln!(
                "[Full GC {}kB => {}kB {}ms]",
                cycle.bytes_before / 1024,
                cycle.bytes_after / 1024,
                cycle.duration.as_millis()
            );
        }
        self.stats.full_cycles += 1;
        self.stats.objects_promoted += self.promoted_this_cycle as u64;
        self.stats.objects_evacuated += cycle.evacuated as u64;
        self.stats.last_full = Some(cycle);
    }

    fn live_bytes(&self) -> usize {
        self.heap.nursery().bytes_used() + self.heap.mature_footprint()
    }

    fn flip_mark(&mut self) {
        self.current_mark = match self.current_mark {
            1 => 2,
            _ => 1,
        };
    }

    fn trace_roots(&mut self, kind: CycleKind) {
        let mut roots = std::mem::take(&mut self.roots);
        for slot in roots.values_mut() {
            *slot = self.trace_value(*slot, kind);
        }
        self.roots = roots;
    }

    /// Ivars hung off immediate receivers are unconditional roots: their
    /// holders have no liveness to speak of
    fn trace_immediate_ivars(&mut self, kind: CycleKind) {
        let mut tables = std::mem::take(&mut self.immediate_ivars);
        for table in tables.values_mut() {
            for value in table.values_mut() {
                *value = self.trace_value(*value, kind);
            }
        }
        self.immediate_ivars = tables;
    }

    /// Visit one reference: relocate or mark its object, once per cycle
    ///
    /// Returns the post-visit value; callers store it back where the old one
    /// came from. Pushes newly visited objects for scanning.
    fn trace_value(&mut self, value: Value, kind: CycleKind) -> Value {
        let addr = match value.as_address() {
            Some(addr) => addr,
            None => return value,
        };
        if kind == CycleKind::Young && addr.zone() != Zone::Young {
            return value;
        }
        match self.heap.slot(addr) {
            Slot::Forwarded(to) => return *to,
            Slot::Occupied(obj) => {
                if obj.header.marked_p(self.current_mark) {
                    return value;
                }
            }
            Slot::Free => panic!("dangling reference into reclaimed space: {:?}", addr),
        }

        let (pinned, object_id) = {
            let obj = self.heap.get(addr);
            (obj.header.pinned, obj.header.object_id)
        };
        if object_id != 0 {
            self.live_ids.insert(object_id);
        }

        match addr.zone() {
            Zone::Young => {
                if pinned {
                    let obj = self.heap.get_mut(addr);
                    obj.header.mark(self.current_mark);
                    obj.header.age = obj.header.age.saturating_add(1);
                    self.mark_stack.push(value);
                    value
                } else {
                    let obj = match std::mem::replace(self.heap.slot_mut(addr), Slot::Free) {
                        Slot::Occupied(obj) => obj,
                        _ => unreachable!(),
                    };
                    let new_value = self.relocate_young(obj);
                    self.heap.forward_slot(addr, new_value);
                    self.mark_stack.push(new_value);
                    new_value
                }
            }
            Zone::Mature => {
                let evacuating = self.heap.mature().block(addr.mature_block()).is_evacuating();
                if evacuating && !pinned {
                    let mut obj = match std::mem::replace(self.heap.slot_mut(addr), Slot::Free) {
                        Slot::Occupied(obj) => obj,
                        _ => unreachable!(),
                    };
                    obj.header.mark(self.current_mark);
                    match self.heap.allocate_mature(obj) {
                        Ok(new_addr) => {
                            self.evacuated_this_cycle += 1;
                            let new_value = Value::reference(new_addr);
                            self.heap.forward_slot(addr, new_value);
                            self.mark_stack.push(new_value);
                            new_value
                        }
                        Err(obj) => {
                            // No room to move it; it stays put this cycle
                            *self.heap.slot_mut(addr) = Slot::Occupied(obj);
                            self.mark_stack.push(value);
                            value
                        }
                    }
                } else {
                    self.heap.get_mut(addr).header.mark(self.current_mark);
                    self.mark_stack.push(value);
                    value
                }
            }
            Zone::Large => {
                self.heap.get_mut(addr).header.mark(self.current_mark);
                self.mark_stack.push(value);
                value
            }
        }
    }

    /// Copy a young survivor: promote it when old or oversized, otherwise
    /// keep it in the nursery
    fn relocate_young(&mut self, mut obj: HeapObject) -> Value {
        obj.header.age = obj.header.age.saturating_add(1);
        obj.header.mark(self.current_mark);
        let (lifetime, size_threshold) = {
            let config = self.heap.config();
            (config.lifetime, config.promotion_size_threshold)
        };
        let promote =
            obj.header.age >= lifetime || obj.size_in_bytes() >= size_threshold;
        if promote {
            obj.header.zone = Zone::Mature;
            match self.heap.allocate_mature(obj) {
                Ok(addr) => {
                    self.promoted_this_cycle += 1;
                    Value::reference(addr)
                }
                Err(mut obj) => {
                    obj.header.zone = Zone::Young;
                    self.excess_this_cycle += 1;
                    Value::reference(self.heap.allocate_young_survivor(obj))
                }
            }
        } else {
            Value::reference(self.heap.allocate_young_survivor(obj))
        }
    }

    fn drain_mark_stack(&mut self, kind: CycleKind) {
        while let Some(value) = self.mark_stack.pop() {
            self.scan_object(value, kind);
        }
    }

    /// Rewrite every outgoing edge of one object through the tracer
    ///
    /// Covers body fields (per the type's trace rule), the dedicated ivar
    /// slot, and the identity-keyed side table. A non-young object still
    /// holding young references afterwards goes back on the remembered set.
    fn scan_object(&mut self, value: Value, kind: CycleKind) {
        let addr = match value.as_address() {
            Some(addr) => addr,
            None => return,
        };
        let (type_id, field_count, object_id) = {
            let obj = self.heap.get(addr);
            (obj.header.type_id, obj.field_count(), obj.header.object_id)
        };
        let span = self.types.get_or_panic(type_id).trace_span(field_count);

        let mut still_young = false;
        let note = |v: Value, still_young: &mut bool| {
            if let Some(target) = v.as_address() {
                if target.zone() == Zone::Young {
                    *still_young = true;
                }
            }
        };

        for index in 0..span {
            let old = match self.heap.get(addr).field(index) {
                Some(v) => v,
                None => break,
            };
            let new = self.trace_value(old, kind);
            if new != old {
                self.heap.get_mut(addr).set_field_raw(index, new);
            }
            note(new, &mut still_young);
        }

        let ivar_entries = self.heap.get(addr).ivars.entries();
        for (key, old) in ivar_entries {
            let new = self.trace_value(old, kind);
            if new != old {
                self.heap.get_mut(addr).ivars.set(key, new);
            }
            note(new, &mut still_young);
        }

        if object_id != 0 {
            let side_entries: Vec<_> = self
                .side_ivars
                .get(&object_id)
                .map(|t| t.iter().map(|(&k, &v)| (k, v)).collect())
                .unwrap_or_default();
            for (key, old) in side_entries {
                let new = self.trace_value(old, kind);
                if new != old {
                    if let Some(table) = self.side_ivars.get_mut(&object_id) {
                        table.insert(key, new);
                    }
                }
                note(new, &mut still_young);
            }
        }

        if addr.zone() != Zone::Young && still_young {
            self.heap.remember(addr);
        }
    }

    /// Re-trace everything reachable from the roots (read-only), aborting on
    /// any stale or dangling reference
    pub fn verify_heap(&self) {
        let mut visited: FxHashSet<u64> = FxHashSet::default();
        let mut pending: Vec<Value> = self.roots.iter().collect();
        for table in self.immediate_ivars.values() {
            pending.extend(table.values().copied());
        }
        while let Some(value) = pending.pop() {
            let addr = match value.as_address() {
                Some(addr) => addr,
                None => continue,
            };
            if !visited.insert(addr.raw()) {
                continue;
            }
            let obj = self.heap.get(addr);
            assert_eq!(
                obj.header.zone,
                addr.zone(),
                "zone mismatch at {:?}",
                addr
            );
            let span = self
                .types
                .get_or_panic(obj.header.type_id)
                .trace_span(obj.field_count());
            for index in 0..span {
                if let Some(field) = obj.field(index) {
                    pending.push(field);
                }
            }
            for (_, ivar) in obj.ivars.entries() {
                pending.push(ivar);
            }
            if obj.header.object_id != 0 {
                if let Some(table) = self.side_ivars.get(&obj.header.object_id) {
                    pending.extend(table.values().copied());
                }
            }
        }
    }
}
