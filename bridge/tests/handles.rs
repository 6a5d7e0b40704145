//! Handle semantics across the import surface: allocation ordering, heap
//! partitioning, and the destroy protocol.

mod common;

use membrane_bridge::BridgeError;
use membrane_hostapi::{encode_handle, DomEntry, ObjectEntry, RESERVED_SLOTS};

use common::*;

#[test]
fn test_allocation_imports_hand_out_ordered_handles() {
    // Two object handles, one function handle, one DOM handle, stored in
    // call order.
    let main = r#"        (i64.store (i32.const 0) (call $obj_alloc))
        (i64.store (i32.const 8) (call $obj_alloc))
        (i64.store (i32.const 16) (call $fn_alloc))
        (i64.store (i32.const 24) (call $dom_alloc))"#;
    let wat = guest_module(main, &[]);

    let outcome = run_guest(&wat, test_registry()).unwrap();
    assert_eq!(read_u64(&outcome.memory, 0), encode_handle(0, 0));
    assert_eq!(read_u64(&outcome.memory, 8), encode_handle(1, 0));
    // Heaps are independent: the function heap starts at index 0 too.
    assert_eq!(read_u64(&outcome.memory, 16), encode_handle(0, 0));
    // The DOM heap starts above its reserved range.
    assert_eq!(read_u64(&outcome.memory, 24), encode_handle(RESERVED_SLOTS, 0));

    assert_eq!(outcome.state.objects.active_count(), 2);
    assert_eq!(outcome.state.functions.active_count(), 1);
    assert_eq!(outcome.state.dom.active_count(), RESERVED_SLOTS as usize + 1);
}

#[test]
fn test_pre_allocated_slots_hold_null() {
    let main = "        (drop (call $obj_alloc))\n        (drop (call $dom_alloc))";
    let wat = guest_module(main, &[]);

    let outcome = run_guest(&wat, test_registry()).unwrap();
    assert_eq!(
        outcome.state.objects.get(encode_handle(0, 0)),
        Some(&ObjectEntry::Null)
    );
    assert_eq!(
        outcome.state.dom.get(encode_handle(RESERVED_SLOTS, 0)),
        Some(&DomEntry::Null)
    );
}

#[test]
fn test_drop_object_then_reallocate_reuses_slot() {
    // LIFO reuse with a generation bump: the new handle shares the index but
    // never the generation.
    let o0 = encode_handle(0, 0);
    let main = format!(
        "        (drop (call $obj_alloc))\n        (i32.store (i32.const 0) (call $drop_ref (i64.const {})))\n        (i64.store (i32.const 8) (call $obj_alloc))",
        o0 as i64
    );
    let wat = guest_module(&main, &[]);

    let outcome = run_guest(&wat, test_registry()).unwrap();
    assert_eq!(read_u32(&outcome.memory, 0), 1, "drop must report true");
    // Destroy bumps to generation 1, reuse bumps to generation 2.
    assert_eq!(read_u64(&outcome.memory, 8), encode_handle(0, 2));
    assert!(!outcome.state.objects.is_valid(o0));
}

#[test]
fn test_drop_stale_handle_reports_false() {
    let o0 = encode_handle(0, 0);
    let main = format!(
        "        (drop (call $obj_alloc))\n        (drop (call $drop_ref (i64.const {h})))\n        (i32.store (i32.const 0) (call $drop_ref (i64.const {h})))",
        h = o0 as i64
    );
    let wat = guest_module(&main, &[]);

    let outcome = run_guest(&wat, test_registry()).unwrap();
    assert_eq!(read_u32(&outcome.memory, 0), 0);
}

#[test]
fn test_drop_function_handle() {
    let name = b"math.add";
    let main = format!(
        "        (i32.store (i32.const 0)\n            (call $drop_ref\n                (call $register (i32.const {}) (i32.const {}) (i32.const 8))))",
        TEXT_BASE,
        name.len()
    );
    let wat = guest_module(&main, &[(TEXT_BASE, name)]);

    let outcome = run_guest(&wat, test_registry()).unwrap();
    assert_eq!(read_u32(&outcome.memory, 0), 1);
    assert!(!outcome.state.functions.is_valid(encode_handle(0, 0)));
}

#[test]
fn test_object_drop_not_shadowed_by_dom_roots() {
    // Object slot 2 shares (index, generation) with the reserved DOM window
    // root. Dropping it must hit the object heap, not the reserved guard.
    let o2 = encode_handle(2, 0);
    let main = format!(
        "{}        (i32.store (i32.const 0) (call $drop_ref (i64.const {})))",
        alloc_stmt("$obj_alloc", 3),
        o2 as i64
    );
    let wat = guest_module(&main, &[]);

    let outcome = run_guest(&wat, test_registry()).unwrap();
    assert_eq!(read_u32(&outcome.memory, 0), 1);
    assert!(!outcome.state.objects.is_valid(o2));
    assert!(outcome.state.dom.is_valid(o2), "DOM window root must survive");
}

#[test]
fn test_invoke_dropped_function_is_invalid_handle() {
    let name = b"math.add";
    let main = format!(
        "        (i64.store (i32.const 0)\n            (call $register (i32.const {base}) (i32.const {len}) (i32.const 8)))\n        (drop (call $drop_ref (i64.load (i32.const 0))))\n        (drop (call $invoke (i64.load (i32.const 0)) (i32.const 0) (i32.const 0)))",
        base = TEXT_BASE,
        len = name.len()
    );
    let wat = guest_module(&main, &[(TEXT_BASE, name)]);

    let err = run_guest(&wat, test_registry()).unwrap_err();
    assert!(matches!(err, BridgeError::InvalidHandle { .. }));
}

#[test]
fn test_cross_heap_handles_do_not_alias() {
    // Populating object slot 0 leaves function slot 0 untouched even though
    // both handles have the same 64-bit value.
    let body = b"store.put";
    let shared = encode_handle(0, 0);
    let mut ops = ops::make_function(TEXT_BASE, shared, 0, body.len() as u32);
    ops.extend_from_slice(&ops::invoke_no_return(
        shared,
        &frames::frame(&[frames::extern_ref(shared), frames::int64(9)]),
    ));

    let main = format!(
        "{}{}{}",
        alloc_stmt("$fn_alloc", 1),
        alloc_stmt("$obj_alloc", 1),
        apply_stmt(OPS_BASE, ops.len(), body.len())
    );
    let wat = guest_module(&main, &[(OPS_BASE, &ops), (TEXT_BASE, body)]);

    let outcome = run_guest(&wat, test_registry()).unwrap();
    assert_eq!(
        outcome.state.objects.get(shared),
        Some(&ObjectEntry::Value(membrane_hostapi::Value::Int64(9)))
    );
    assert!(outcome.state.resolve_callable(shared).is_ok());
}
