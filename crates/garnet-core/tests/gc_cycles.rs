//! End-to-end collection cycle scenarios

use garnet_core::heap::BLOCK_BYTES;
use garnet_core::{
    core_registry, HeapConfig, HeapObject, MemoryError, MemoryManager, SizeRule, TypeDescriptor,
    TypeRegistry, Value, Zone,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn manager(config: HeapConfig) -> (MemoryManager, garnet_core::CoreTypes) {
    let (types, core) = core_registry();
    (MemoryManager::new(Arc::new(types), config), core)
}

#[test]
fn test_young_cycle_keeps_rooted_survivors() {
    let (mut mm, core) = manager(HeapConfig::default());
    let mut roots = Vec::new();
    for i in 0..1000 {
        let obj = mm.allocate(core.object, 1).unwrap();
        mm.set_field(obj, 0, Value::fixnum(i)).unwrap();
        if i % 10 == 0 {
            roots.push((i, mm.add_root(obj)));
        }
    }
    assert_eq!(mm.heap().nursery().live_objects(), 1000);

    mm.collect_young();
    assert_eq!(mm.heap().nursery().live_objects(), 100);
    for (i, root) in &roots {
        let moved = mm.root(*root).unwrap();
        assert_eq!(mm.get_field(moved, 0).unwrap(), Value::fixnum(*i));
    }
    mm.verify_heap();
}

#[test]
fn test_promotion_preserves_identity_and_contents() {
    let config = HeapConfig {
        lifetime: 2,
        ..Default::default()
    };
    let (mut mm, core) = manager(config);
    let obj = mm.allocate(core.object, 1).unwrap();
    mm.set_field(obj, 0, Value::fixnum(77)).unwrap();
    mm.set_ivar(obj, garnet_core::SymbolId(3), Value::bool(true));
    let id = mm.object_id(obj);
    let root = mm.add_root(obj);

    mm.collect_young();
    mm.collect_young();

    let promoted = mm.root(root).unwrap();
    assert_eq!(promoted.as_address().unwrap().zone(), Zone::Mature);
    assert_eq!(mm.get_field(promoted, 0).unwrap(), Value::fixnum(77));
    assert_eq!(
        mm.get_ivar(promoted, garnet_core::SymbolId(3)),
        Value::bool(true)
    );
    assert_eq!(mm.object_id(promoted), id);
}

#[test]
fn test_two_roots_converge_on_one_copy() {
    let (mut mm, core) = manager(HeapConfig::default());
    let obj = mm.allocate(core.object, 0).unwrap();
    let a = mm.add_root(obj);
    let b = mm.add_root(obj);

    mm.collect_young();
    let va = mm.root(a).unwrap();
    let vb = mm.root(b).unwrap();
    assert_eq!(va, vb);
    assert_ne!(va, obj);
    assert_eq!(mm.heap().nursery().live_objects(), 1);
}

#[test]
fn test_pinned_young_object_never_moves() {
    let (mut mm, core) = manager(HeapConfig::default());
    let obj = mm.allocate(core.object, 1).unwrap();
    mm.set_field(obj, 0, Value::fixnum(5)).unwrap();
    mm.pin(obj);
    let root = mm.add_root(obj);

    mm.collect_young();
    // Same address, same contents
    assert_eq!(mm.root(root).unwrap(), obj);
    assert_eq!(mm.get_field(obj, 0).unwrap(), Value::fixnum(5));

    // Even past the promotion age it stays put
    for _ in 0..6 {
        mm.collect_young();
    }
    assert_eq!(mm.root(root).unwrap(), obj);
}

#[test]
fn test_full_cycle_evacuates_fragmented_blocks() {
    let (mut mm, core) = manager(HeapConfig::default());
    // Sixteen one-line objects in block 0, keeping every fourth
    let mut roots = Vec::new();
    for i in 0..16 {
        let obj = mm.allocate_mature(core.tuple, 30).unwrap();
        mm.set_field(obj, 0, Value::fixnum(i)).unwrap();
        if i % 4 == 0 {
            roots.push((i, mm.add_root(obj)));
        }
    }

    // First full cycle sweeps the garbage, shredding block 0 into holes
    mm.collect_full();
    let before: Vec<Value> = roots.iter().map(|(_, r)| mm.root(*r).unwrap()).collect();
    assert!(before
        .iter()
        .all(|v| v.as_address().unwrap().mature_block() == 0));

    // Second full cycle sees the fragmentation and moves the survivors out
    mm.collect_full();
    assert_eq!(mm.stats().last_full.as_ref().unwrap().evacuated, 4);
    for (i, root) in &roots {
        let moved = mm.root(*root).unwrap();
        assert_ne!(moved.as_address().unwrap().mature_block(), 0);
        assert_eq!(mm.get_field(moved, 0).unwrap(), Value::fixnum(*i));
    }
    mm.verify_heap();
}

#[test]
fn test_pinned_mature_object_blocks_its_block_evacuation() {
    let (mut mm, core) = manager(HeapConfig::default());
    let mut roots = Vec::new();
    for i in 0..16 {
        let obj = mm.allocate_mature(core.tuple, 30).unwrap();
        if i % 4 == 0 {
            roots.push(mm.add_root(obj));
        }
    }
    let anchored = mm.root(roots[0]).unwrap();
    mm.pin(anchored);

    mm.collect_full();
    mm.collect_full();
    // The pinned survivor anchors the whole block in place
    assert_eq!(mm.stats().last_full.as_ref().unwrap().evacuated, 0);
    for root in &roots {
        assert_eq!(mm.root(*root).unwrap().as_address().unwrap().mature_block(), 0);
    }
}

#[test]
fn test_write_barrier_keeps_young_referents_of_mature_holders() {
    let (mut mm, core) = manager(HeapConfig::default());
    let holder = mm.allocate_mature(core.object, 1).unwrap();
    let _holder_root = mm.add_root(holder);

    let young = mm.allocate(core.object, 1).unwrap();
    mm.set_field(young, 0, Value::fixnum(99)).unwrap();
    // The store is the only thing keeping `young` alive
    mm.set_field(holder, 0, young).unwrap();

    mm.collect_young();
    let survivor = mm.get_field(holder, 0).unwrap();
    assert_eq!(survivor.as_address().unwrap().zone(), Zone::Young);
    assert_eq!(mm.get_field(survivor, 0).unwrap(), Value::fixnum(99));
    assert_eq!(mm.heap().nursery().live_objects(), 1);
}

#[test]
fn test_dup_outside_nursery_keeps_young_referents() {
    let (mut mm, core) = manager(HeapConfig::default());
    // 300 reference fields put the holder, and any copy of it, in the
    // large object space
    let holder = mm.allocate_mature(core.object, 300).unwrap();
    mm.add_root(holder);
    let young = mm.allocate(core.object, 1).unwrap();
    mm.set_field(young, 0, Value::fixnum(17)).unwrap();
    mm.set_field(holder, 0, young).unwrap();

    let copy = mm.dup(holder).unwrap();
    assert_eq!(copy.as_address().unwrap().zone(), Zone::Large);
    mm.add_root(copy);

    // The copy never passed through set_field, yet its young referent
    // must survive and be rewritten like any remembered holder's
    mm.collect_young();
    let through_copy = mm.get_field(copy, 0).unwrap();
    assert_eq!(through_copy.as_address().unwrap().zone(), Zone::Young);
    assert_eq!(mm.get_field(through_copy, 0).unwrap(), Value::fixnum(17));
    mm.verify_heap();
}

#[test]
fn test_large_objects_never_move() {
    let (mut mm, core) = manager(HeapConfig::default());
    let threshold = mm.heap().config().large_object_threshold;
    let big = mm.allocate_bytes(core.byte_array, threshold * 2).unwrap();
    let addr = big.as_address().unwrap();
    assert_eq!(addr.zone(), Zone::Large);
    let root = mm.add_root(big);

    mm.collect_young();
    mm.collect_full();
    assert_eq!(mm.root(root).unwrap(), big);
    assert_eq!(mm.heap().large().live_objects(), 1);

    // Unrooted, it is reclaimed by the next full cycle
    mm.remove_root(root);
    mm.collect_full();
    assert_eq!(mm.heap().large().live_objects(), 0);
}

#[test]
fn test_bounded_mature_heap_reports_out_of_memory() {
    let config = HeapConfig {
        max_mature_bytes: BLOCK_BYTES,
        ..Default::default()
    };
    let (mut mm, core) = manager(config);
    let mut failed = None;
    for _ in 0..2000 {
        match mm.allocate_mature(core.tuple, 2) {
            Ok(v) => {
                mm.add_root(v);
            }
            Err(err) => {
                failed = Some(err);
                break;
            }
        }
    }
    assert!(matches!(
        failed,
        Some(MemoryError::OutOfMemory { requested: 32 })
    ));
    // The heap is still usable afterwards
    mm.verify_heap();
    assert!(mm.allocate(core.object, 1).is_ok());
}

#[test]
fn test_cleanup_runs_once_per_dead_object() {
    static CLEANED: AtomicUsize = AtomicUsize::new(0);
    fn count(_: &mut HeapObject) {
        CLEANED.fetch_add(1, Ordering::Relaxed);
    }

    let mut builder = TypeRegistry::builder();
    let handle =
        builder.register(TypeDescriptor::bytes("Handle", SizeRule::Fixed(8)).with_cleanup(count));
    let mut mm = MemoryManager::new(Arc::new(builder.build()), HeapConfig::default());

    let kept = mm.allocate_bytes(handle, 8).unwrap();
    let root = mm.add_root(kept);
    for _ in 0..5 {
        mm.allocate_bytes(handle, 8).unwrap();
    }

    mm.collect_young();
    assert_eq!(CLEANED.load(Ordering::Relaxed), 5);

    // The survivor's cleanup runs when it finally dies
    mm.remove_root(root);
    mm.collect_young();
    assert_eq!(CLEANED.load(Ordering::Relaxed), 6);
}

#[test]
fn test_side_ivar_tables_die_with_their_holders() {
    let (mut mm, core) = manager(HeapConfig::default());
    let tuple = mm.allocate(core.tuple, 1).unwrap();
    mm.set_ivar(tuple, garnet_core::SymbolId(1), Value::fixnum(1));
    assert_eq!(mm.side_ivar_tables(), 1);

    // No roots: the holder dies, and its table goes with it
    mm.collect_full();
    assert_eq!(mm.side_ivar_tables(), 0);
}

#[test]
fn test_repeated_cycles_stay_consistent() {
    let config = HeapConfig {
        nursery_bytes: 4096,
        lifetime: 3,
        ..Default::default()
    };
    let (mut mm, core) = manager(config);
    let list = mm.allocate(core.object, 2).unwrap();
    let head = mm.add_root(list);

    // Grow a linked chain under allocation pressure
    for i in 0..200 {
        let node = match mm.allocate(core.object, 2) {
            Ok(node) => node,
            Err(err) => panic!("allocation failed at {}: {}", i, err),
        };
        mm.set_field(node, 0, Value::fixnum(i)).unwrap();
        // The chain may have moved wholesale; refetch the tail by walking
        let mut tail = mm.root(head).unwrap();
        loop {
            let next = mm.get_field(tail, 1).unwrap();
            if next.is_nil() {
                break;
            }
            tail = next;
        }
        mm.set_field(tail, 1, node).unwrap();
    }

    assert!(mm.stats().young_cycles > 0);
    // Walk the whole chain and check the payloads
    let mut cursor = mm.get_field(mm.root(head).unwrap(), 1).unwrap();
    let mut expected = 0;
    while !cursor.is_nil() {
        assert_eq!(mm.get_field(cursor, 0).unwrap(), Value::fixnum(expected));
        cursor = mm.get_field(cursor, 1).unwrap();
        expected += 1;
    }
    assert_eq!(expected, 200);
    mm.verify_heap();
}
