//! Batch execution and invocation/coercion machinery.
//!
//! `apply_batch` is the body of the `apply_instructions` import: it parses
//! the whole batch against one coherent view of linear memory, then executes
//! the operations in stream order. A parse failure rejects the batch before
//! any heap mutation; an execution failure stops the batch with earlier
//! operations still applied (there is no rollback).
//!
//! The V1 invocation imports call into the same machinery through
//! `invoke_with_frame` plus the coercion helpers.

use log::{debug, warn};
use wasmtime::{Caller, Memory};

use membrane_hostapi::{DomEntry, Value};

use crate::args::{self, ArgContext};
use crate::batch::{self, Operation};
use crate::error::BridgeError;
use crate::host_impl::{HostScope, HostState};
use crate::memory::{self, GuestAllocator};
use crate::protocol::ReturnHint;
use crate::text;

/// Parse and execute one batch. Returns the number of operations applied.
pub fn apply_batch(
    caller: &mut Caller<'_, HostState>,
    memory: Memory,
    ops_ptr: u32,
    ops_len: u32,
    text_ptr: u32,
    text_len: u32,
) -> Result<usize, BridgeError> {
    let operations = {
        let data = memory.data(&*caller);
        let ops = memory::slice(data, ops_ptr, ops_len)?;
        let text_buffer = memory::slice(data, text_ptr, text_len)?;
        batch::parse_batch(ops, text_buffer, data)?
    };
    debug!("applying batch of {} operations", operations.len());

    let count = operations.len();
    for (index, operation) in operations.into_iter().enumerate() {
        execute_operation(caller, memory, operation).map_err(|source| {
            BridgeError::Operation {
                index,
                source: Box::new(source),
            }
        })?;
        caller.data_mut().operations_applied += 1;
    }
    caller.data_mut().batches_applied += 1;
    Ok(count)
}

fn execute_operation(
    caller: &mut Caller<'_, HostState>,
    memory: Memory,
    operation: Operation,
) -> Result<(), BridgeError> {
    match operation {
        Operation::MakeFunction { target, body } => {
            caller.data_mut().bind_function(target, &body)
        }
        Operation::InvokeNoReturn { target, args } => {
            call_function(caller.data_mut(), target, args)?;
            Ok(())
        }
        Operation::InvokeReturning { target, ret, args } => {
            let result = call_function(caller.data_mut(), target, args)?;
            coerce_and_marshal(caller, memory, ret, result)?;
            Ok(())
        }
        Operation::InvokeCallback { target, callback } => {
            call_function(caller.data_mut(), target, vec![Value::ExternRef(callback)])?;
            Ok(())
        }
    }
}

/// Resolve the target callable, null out stale reference arguments, and
/// invoke.
pub fn call_function(
    state: &mut HostState,
    target: u64,
    args: Vec<Value>,
) -> Result<Value, BridgeError> {
    let callable = state.resolve_callable(target)?;
    let args = resolve_extern_args(state, args);
    let mut scope = HostScope::new(state);
    callable.call(&mut scope, &args).map_err(BridgeError::Host)
}

/// Replace stale external references with the null sentinel.
///
/// A callable can distinguish null from an unknown handle only by
/// cooperation with the guest protocol; the bridge never errors here.
fn resolve_extern_args(state: &HostState, args: Vec<Value>) -> Vec<Value> {
    args.into_iter()
        .map(|value| match value {
            Value::ExternRef(handle) if !state.any_heap_valid(handle) => {
                debug!("stale external reference {:#018x} decoded as null", handle);
                Value::Null
            }
            other => other,
        })
        .collect()
}

/// Decode a V1 argument range from linear memory and invoke `target`.
///
/// V1 frames carry the same wire format as V2 argument frames; their text
/// payloads resolve against linear memory itself.
pub fn invoke_with_frame(
    caller: &mut Caller<'_, HostState>,
    memory: Memory,
    target: u64,
    args_start: u32,
    args_len: u32,
) -> Result<Value, BridgeError> {
    let args = {
        let data = memory.data(&*caller);
        let frame = memory::slice(data, args_start, args_len)?;
        args::parse_frame_bytes(
            frame,
            &ArgContext {
                text: data,
                memory: data,
            },
        )?
    };
    call_function(caller.data_mut(), target, args)
}

/// Apply the declared return coercion, including its guest-visible side
/// effects. The batched path has no return channel, so the scalar is
/// produced for its effects and returned for the V1 imports to surface.
fn coerce_and_marshal(
    caller: &mut Caller<'_, HostState>,
    memory: Memory,
    ret: ReturnHint,
    result: Value,
) -> Result<u64, BridgeError> {
    match ret {
        ReturnHint::None => Ok(0),
        ReturnHint::Bool => Ok(coerce_bool(&result) as u64),
        ReturnHint::Integer | ReturnHint::BigInt => Ok(coerce_integer(&result)),
        ReturnHint::Text => coerce_text(caller, memory, &result).map(|id| id as u64),
        ReturnHint::Object => Ok(coerce_object(caller.data_mut(), result)),
    }
}

/// Truthiness of a callable result: absent values, `false`, numeric zero,
/// and empty text are 0; everything else is 1.
pub fn coerce_bool(value: &Value) -> u32 {
    let truthy = match value {
        Value::Null | Value::Undefined => false,
        Value::Bool(b) => *b,
        Value::Text(s) => !s.is_empty(),
        Value::Float32(f) => *f != 0.0,
        Value::Float64(f) => *f != 0.0,
        other => match other.as_i64() {
            Some(v) => v != 0,
            None => true,
        },
    };
    truthy as u32
}

/// Widen a callable result to 64 integer bits.
///
/// Integers keep their two's complement bits, floats truncate, 128-bit
/// values yield their low halves, references yield the raw handle, and
/// absent values yield 0. Anything else has no integer rendition and maps
/// to 0.
pub fn coerce_integer(value: &Value) -> u64 {
    if let Some(v) = value.as_u64() {
        return v;
    }
    if let Some(handle) = value.as_ref_handle() {
        return handle;
    }
    match value {
        Value::Null | Value::Undefined => 0,
        Value::Bool(b) => *b as u64,
        Value::Float32(f) => *f as i64 as u64,
        Value::Float64(f) => *f as i64 as u64,
        other => {
            warn!("{} result has no integer rendition, returning 0", other.type_name());
            0
        }
    }
}

/// Marshal a text result into guest memory; returns the allocation id.
/// Absent results yield id 0 without allocating.
pub fn coerce_text(
    caller: &mut Caller<'_, HostState>,
    memory: Memory,
    value: &Value,
) -> Result<u32, BridgeError> {
    match value {
        Value::Text(s) => {
            let allocator = GuestAllocator::from_caller(caller)?;
            text::write_utf8(&allocator, caller, memory, s)
        }
        Value::Null | Value::Undefined => Ok(0),
        other => {
            warn!("{} result has no text rendition, returning 0", other.type_name());
            Ok(0)
        }
    }
}

/// Register an object result in the DOM heap; returns the new handle.
/// Absent results get a fresh null slot, so the guest always receives a
/// usable handle.
pub fn coerce_object(state: &mut HostState, value: Value) -> u64 {
    match value {
        Value::Null | Value::Undefined => state.dom.create(DomEntry::Null),
        other => state.dom.create(DomEntry::Value(other)),
    }
}
