//! Shared test helpers for integration tests.
//!
//! Provides WAT guest builders with computed data segments, byte-level
//! builders for the operations stream and argument frames, and the host
//! vocabulary fixture used across all integration test files.

#![allow(dead_code)]

use std::sync::Arc;

use membrane_bridge::{Bridge, BridgeConfig, BridgeError, RunOutcome};
use membrane_hostapi::{FunctionRegistry, HostFunctionHandler, Value};

/// Offset of the primary operations stream data segment.
pub const OPS_BASE: u32 = 16;
/// Offset of the secondary operations stream data segment.
pub const OPS2_BASE: u32 = 2048;
/// Offset of the text buffer data segment.
pub const TEXT_BASE: u32 = 4096;
/// Base of the guest's bump allocator (page 1).
pub const BUMP_BASE: u32 = 65536;

// ── WAT guest builders ──

/// Escape bytes for a WAT data segment string.
pub fn escape_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("\\{:02x}", b)).collect()
}

/// Build a guest module with the full bridge import surface, an identity
/// bump allocator (`allocation_start_pointer(id) == id`), the given data
/// segments, and `main_body` as the body of `main`.
pub fn guest_module(main_body: &str, data: &[(u32, &[u8])]) -> String {
    let segments: String = data
        .iter()
        .filter(|(_, bytes)| !bytes.is_empty())
        .map(|(offset, bytes)| {
            format!("    (data (i32.const {}) \"{}\")\n", offset, escape_bytes(bytes))
        })
        .collect();

    format!(
        r#"(module
    (import "v2" "apply_instructions" (func $apply (param i32 i32 i32 i32)))
    (import "v2" "dom_allocate_external_pointer" (func $dom_alloc (result i64)))
    (import "v2" "object_allocate_external_pointer" (func $obj_alloc (result i64)))
    (import "v2" "function_allocate_external_pointer" (func $fn_alloc (result i64)))
    (import "v1" "abort" (func $abort))
    (import "v1" "drop_external_reference" (func $drop_ref (param i64) (result i32)))
    (import "v1" "js_register_function" (func $register (param i32 i32 i32) (result i64)))
    (import "v1" "js_invoke_function" (func $invoke (param i64 i32 i32) (result i64)))
    (import "v1" "js_invoke_function_and_return_object"
        (func $invoke_obj (param i64 i32 i32) (result i64)))
    (import "v1" "js_invoke_function_and_return_bool"
        (func $invoke_bool (param i64 i32 i32) (result i32)))
    (import "v1" "js_invoke_function_and_return_bigint"
        (func $invoke_bigint (param i64 i32 i32) (result i64)))
    (import "v1" "js_invoke_function_and_return_string"
        (func $invoke_str (param i64 i32 i32) (result i32)))
    (memory (export "memory") 2)
    (global $bump (mut i32) (i32.const {bump}))
    (func (export "create_allocation") (param $size i32) (result i32)
        (local $ptr i32)
        (local.set $ptr (global.get $bump))
        (global.set $bump (i32.add (global.get $bump) (local.get $size)))
        (local.get $ptr))
    (func (export "allocation_start_pointer") (param $id i32) (result i32)
        (local.get $id))
    (func (export "main")
{body}
    )
{segments})
"#,
        bump = BUMP_BASE,
        body = main_body,
        segments = segments,
    )
}

/// A guest whose `main` applies one batch from the standard segments.
pub fn apply_guest(ops: &[u8], text: &[u8]) -> String {
    let body = format!(
        "        (call $apply (i32.const {}) (i32.const {}) (i32.const {}) (i32.const {}))",
        OPS_BASE,
        ops.len(),
        TEXT_BASE,
        text.len()
    );
    guest_module(&body, &[(OPS_BASE, ops), (TEXT_BASE, text)])
}

/// Statement calling `apply_instructions` for a segment placed with
/// [`guest_module`].
pub fn apply_stmt(ops_base: u32, ops_len: usize, text_len: usize) -> String {
    format!(
        "        (call $apply (i32.const {}) (i32.const {}) (i32.const {}) (i32.const {}))",
        ops_base, ops_len, TEXT_BASE, text_len
    )
}

/// Statement pre-allocating `count` handles from one of the allocation
/// imports (`$fn_alloc`, `$obj_alloc`, `$dom_alloc`).
pub fn alloc_stmt(import: &str, count: usize) -> String {
    format!("        (drop (call {}))\n", import).repeat(count)
}

// ── Run helpers ──

pub fn run_guest(wat: &str, registry: FunctionRegistry) -> Result<RunOutcome, BridgeError> {
    run_guest_with_config(wat, registry, BridgeConfig::default())
}

pub fn run_guest_with_config(
    wat: &str,
    registry: FunctionRegistry,
    config: BridgeConfig,
) -> Result<RunOutcome, BridgeError> {
    let _ = env_logger::builder().is_test(true).try_init();
    let bridge = Bridge::new(wat.as_bytes(), config)?;
    bridge.run(Arc::new(registry))
}

/// Read a little-endian u32 out of a memory snapshot.
pub fn read_u32(memory: &[u8], addr: u32) -> u32 {
    let a = addr as usize;
    u32::from_le_bytes(memory[a..a + 4].try_into().unwrap())
}

/// Read a little-endian u64 out of a memory snapshot.
pub fn read_u64(memory: &[u8], addr: u32) -> u64 {
    let a = addr as usize;
    u64::from_le_bytes(memory[a..a + 8].try_into().unwrap())
}

// ── Operations-stream builders ──

pub mod ops {
    const OP_BEGIN: u8 = 0x00;
    const OP_STOP: u8 = 0xFF;

    pub fn make_function(alloc_addr: u32, target: u64, start: u32, len: u32) -> Vec<u8> {
        let mut bytes = vec![OP_BEGIN, 1];
        bytes.extend_from_slice(&alloc_addr.to_le_bytes());
        bytes.extend_from_slice(&target.to_le_bytes());
        bytes.extend_from_slice(&start.to_le_bytes());
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.push(OP_STOP);
        bytes
    }

    pub fn invoke_no_return(target: u64, args_frame: &[u8]) -> Vec<u8> {
        let mut bytes = vec![OP_BEGIN, 2];
        bytes.extend_from_slice(&target.to_le_bytes());
        bytes.extend_from_slice(args_frame);
        bytes.push(OP_STOP);
        bytes
    }

    pub fn invoke_returning(target: u64, ret: u8, args_frame: &[u8]) -> Vec<u8> {
        let mut bytes = vec![OP_BEGIN, 3];
        bytes.extend_from_slice(&target.to_le_bytes());
        bytes.push(ret);
        bytes.extend_from_slice(args_frame);
        bytes.push(OP_STOP);
        bytes
    }

    pub fn invoke_callback(target: u64, callback: u64) -> Vec<u8> {
        let mut bytes = vec![OP_BEGIN, 4];
        bytes.extend_from_slice(&target.to_le_bytes());
        bytes.push(0x01); // ArgStart
        bytes.push(0x02); // ArgBegin
        bytes.extend_from_slice(&callback.to_le_bytes());
        bytes.push(0x03); // ArgEnd
        bytes.push(0x04); // ArgStop
        bytes.push(OP_STOP);
        bytes
    }
}

// ── Argument-frame builders ──

pub mod frames {
    const ARG_START: u8 = 0x01;
    const ARG_BEGIN: u8 = 0x02;
    const ARG_END: u8 = 0x03;
    const ARG_STOP: u8 = 0x04;

    /// Wrap encoded argument bodies into a frame.
    pub fn frame(args: &[Vec<u8>]) -> Vec<u8> {
        let mut bytes = vec![ARG_START];
        for arg in args {
            bytes.push(ARG_BEGIN);
            bytes.extend_from_slice(arg);
            bytes.push(ARG_END);
        }
        bytes.push(ARG_STOP);
        bytes
    }

    pub fn int8(value: i8) -> Vec<u8> {
        vec![5, 0, value as u8]
    }

    /// Declared Int64 transmitted as a single byte.
    pub fn int64_as_i8(value: i8) -> Vec<u8> {
        vec![8, 1, value as u8]
    }

    pub fn int64(value: i64) -> Vec<u8> {
        let mut bytes = vec![8, 0];
        bytes.extend_from_slice(&value.to_le_bytes());
        bytes
    }

    pub fn uint64(value: u64) -> Vec<u8> {
        let mut bytes = vec![12, 0];
        bytes.extend_from_slice(&value.to_le_bytes());
        bytes
    }

    pub fn boolean(value: bool) -> Vec<u8> {
        vec![2, value as u8]
    }

    pub fn extern_ref(handle: u64) -> Vec<u8> {
        let mut bytes = vec![15, 0];
        bytes.extend_from_slice(&handle.to_le_bytes());
        bytes
    }

    /// Text argument referencing the batch text buffer.
    pub fn text_utf8(start: u32, len: u32) -> Vec<u8> {
        let mut bytes = vec![3];
        bytes.extend_from_slice(&start.to_le_bytes());
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes
    }

    /// Uint8Array argument referencing linear memory.
    pub fn uint8_array(start: u32, len: u32) -> Vec<u8> {
        let mut bytes = vec![20];
        bytes.extend_from_slice(&start.to_le_bytes());
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes
    }
}

// ── Host vocabulary fixture ──

/// The vocabulary every integration guest runs against.
///
/// - `math.add` — sums its integer arguments into an `Int64`
/// - `host.identity` — returns its first argument
/// - `text.greet` — returns the text `"hello"`
/// - `store.put` — `(target_ref, value)`: populates a pre-allocated object
/// - `test.record` — registers its first argument as a fresh object
/// - `cb.deliver` — invokes its callback argument with `Int64(7)`
pub fn test_registry() -> FunctionRegistry {
    let mut registry = FunctionRegistry::new();

    registry.register(
        "math.add",
        HostFunctionHandler::new(|_scope, args| {
            let sum: i64 = args.iter().filter_map(Value::as_i64).sum();
            Ok(Value::Int64(sum))
        }),
    );

    registry.register(
        "host.identity",
        HostFunctionHandler::new(|_scope, args| {
            Ok(args.first().cloned().unwrap_or(Value::Undefined))
        }),
    );

    registry.register(
        "text.greet",
        HostFunctionHandler::new(|_scope, _args| Ok(Value::Text("hello".into()))),
    );

    registry.register(
        "store.put",
        HostFunctionHandler::new(|scope, args| {
            let target = args
                .first()
                .and_then(Value::as_ref_handle)
                .ok_or_else(|| membrane_hostapi::HostError::failed("missing target ref"))?;
            let value = args
                .get(1)
                .cloned()
                .ok_or(membrane_hostapi::HostError::Arity {
                    expected: 2,
                    actual: args.len(),
                })?;
            if scope.update_object(target, value) {
                Ok(Value::Undefined)
            } else {
                Err(membrane_hostapi::HostError::InvalidHandle(target))
            }
        }),
    );

    registry.register(
        "test.record",
        HostFunctionHandler::new(|scope, args| {
            let value = args.first().cloned().unwrap_or(Value::Undefined);
            let handle = scope.register_object(value);
            Ok(Value::ExternRef(handle))
        }),
    );

    registry.register(
        "cb.deliver",
        HostFunctionHandler::new(|scope, args| {
            match args.first() {
                Some(Value::ExternRef(callback)) => scope.invoke(*callback, &[Value::Int64(7)]),
                // Stale callback references arrive as null; nothing to do.
                Some(Value::Null) => Ok(Value::Undefined),
                other => Err(membrane_hostapi::HostError::failed(format!(
                    "expected callback reference, got {:?}",
                    other
                ))),
            }
        }),
    );

    registry
}
