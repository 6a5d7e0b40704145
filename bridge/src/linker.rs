//! Guest import registration via the Wasmtime linker.
//!
//! Two namespaces face the guest:
//!
//! - `v2` — the batched instruction surface: `apply_instructions` plus the
//!   three pre-allocation imports, one per heap.
//! - `v1` — the legacy direct-call surface: `abort`,
//!   `drop_external_reference`, `js_register_function`, and the
//!   `js_invoke_function*` family. It sits on the same heaps, decoders, and
//!   coercions as the batched path.
//!
//! Closures stay thin: extract memory, delegate to `invoke`, convert errors
//! to traps. A batch error with trapping disabled is recorded on the state
//! and control returns to the guest.

use log::{debug, warn};
use wasmtime::{Caller, Linker};

use membrane_hostapi::{DomEntry, FunctionEntry, ObjectEntry};

use crate::error::BridgeError;
use crate::host_impl::HostState;
use crate::invoke;
use crate::memory;
use crate::text::{self, Encoding};

/// Register every `v1` and `v2` import with the linker.
pub fn register_imports(linker: &mut Linker<HostState>) -> Result<(), BridgeError> {
    register_apply_instructions(linker)?;
    register_allocation_imports(linker)?;
    register_abort(linker)?;
    register_drop_external_reference(linker)?;
    register_js_register_function(linker)?;
    register_invoke_family(linker)?;
    Ok(())
}

// ── v2: batched instructions ──

fn register_apply_instructions(linker: &mut Linker<HostState>) -> Result<(), BridgeError> {
    linker.func_wrap(
        "v2",
        "apply_instructions",
        |mut caller: Caller<'_, HostState>,
         ops_ptr: u32,
         ops_len: u32,
         text_ptr: u32,
         text_len: u32|
         -> Result<(), anyhow::Error> {
            let mem = memory::guest_memory(&mut caller)?;
            match invoke::apply_batch(&mut caller, mem, ops_ptr, ops_len, text_ptr, text_len) {
                Ok(count) => {
                    debug!("batch applied: {} operations", count);
                    Ok(())
                }
                Err(err) if caller.data().trap_on_batch_error => Err(err.into()),
                Err(err) => {
                    warn!("batch rejected: {}", err);
                    caller.data_mut().record_batch_error(&err);
                    Ok(())
                }
            }
        },
    )?;
    Ok(())
}

/// The pre-allocation imports hand out active slots holding the null entry,
/// so the guest can reference them in its outbound protocol before the host
/// has computed what they point to.
fn register_allocation_imports(linker: &mut Linker<HostState>) -> Result<(), BridgeError> {
    linker.func_wrap(
        "v2",
        "dom_allocate_external_pointer",
        |mut caller: Caller<'_, HostState>| -> u64 {
            caller.data_mut().dom.create(DomEntry::Null)
        },
    )?;
    linker.func_wrap(
        "v2",
        "object_allocate_external_pointer",
        |mut caller: Caller<'_, HostState>| -> u64 {
            caller.data_mut().objects.create(ObjectEntry::Null)
        },
    )?;
    linker.func_wrap(
        "v2",
        "function_allocate_external_pointer",
        |mut caller: Caller<'_, HostState>| -> u64 {
            caller.data_mut().functions.create(FunctionEntry::Null)
        },
    )?;
    Ok(())
}

// ── v1: legacy direct-call surface ──

fn register_abort(linker: &mut Linker<HostState>) -> Result<(), BridgeError> {
    linker.func_wrap("v1", "abort", || -> Result<(), anyhow::Error> {
        Err(BridgeError::AbortRequested.into())
    })?;
    Ok(())
}

fn register_drop_external_reference(linker: &mut Linker<HostState>) -> Result<(), BridgeError> {
    linker.func_wrap(
        "v1",
        "drop_external_reference",
        |mut caller: Caller<'_, HostState>, handle: u64| -> u32 {
            caller.data_mut().drop_reference(handle) as u32
        },
    )?;
    Ok(())
}

fn register_js_register_function(linker: &mut Linker<HostState>) -> Result<(), BridgeError> {
    linker.func_wrap(
        "v1",
        "js_register_function",
        |mut caller: Caller<'_, HostState>,
         start: u32,
         len: u32,
         utf_indicator: u32|
         -> Result<u64, anyhow::Error> {
            let encoding = Encoding::from_indicator(utf_indicator)?;
            let mem = memory::guest_memory(&mut caller)?;
            let body = {
                let data = mem.data(&caller);
                text::read_text(data, start, len, encoding)?
            };
            let handle = caller.data_mut().register_function(&body)?;
            Ok(handle)
        },
    )?;
    Ok(())
}

fn register_invoke_family(linker: &mut Linker<HostState>) -> Result<(), BridgeError> {
    linker.func_wrap(
        "v1",
        "js_invoke_function",
        |mut caller: Caller<'_, HostState>,
         handle: u64,
         args_start: u32,
         args_len: u32|
         -> Result<u64, anyhow::Error> {
            let mem = memory::guest_memory(&mut caller)?;
            let result = invoke::invoke_with_frame(&mut caller, mem, handle, args_start, args_len)?;
            Ok(invoke::coerce_integer(&result))
        },
    )?;

    linker.func_wrap(
        "v1",
        "js_invoke_function_and_return_object",
        |mut caller: Caller<'_, HostState>,
         handle: u64,
         args_start: u32,
         args_len: u32|
         -> Result<u64, anyhow::Error> {
            let mem = memory::guest_memory(&mut caller)?;
            let result = invoke::invoke_with_frame(&mut caller, mem, handle, args_start, args_len)?;
            Ok(invoke::coerce_object(caller.data_mut(), result))
        },
    )?;

    linker.func_wrap(
        "v1",
        "js_invoke_function_and_return_bool",
        |mut caller: Caller<'_, HostState>,
         handle: u64,
         args_start: u32,
         args_len: u32|
         -> Result<u32, anyhow::Error> {
            let mem = memory::guest_memory(&mut caller)?;
            let result = invoke::invoke_with_frame(&mut caller, mem, handle, args_start, args_len)?;
            Ok(invoke::coerce_bool(&result))
        },
    )?;

    linker.func_wrap(
        "v1",
        "js_invoke_function_and_return_bigint",
        |mut caller: Caller<'_, HostState>,
         handle: u64,
         args_start: u32,
         args_len: u32|
         -> Result<u64, anyhow::Error> {
            let mem = memory::guest_memory(&mut caller)?;
            let result = invoke::invoke_with_frame(&mut caller, mem, handle, args_start, args_len)?;
            Ok(invoke::coerce_integer(&result))
        },
    )?;

    linker.func_wrap(
        "v1",
        "js_invoke_function_and_return_string",
        |mut caller: Caller<'_, HostState>,
         handle: u64,
         args_start: u32,
         args_len: u32|
         -> Result<u32, anyhow::Error> {
            let mem = memory::guest_memory(&mut caller)?;
            let result = invoke::invoke_with_frame(&mut caller, mem, handle, args_start, args_len)?;
            let id = invoke::coerce_text(&mut caller, mem, &result)?;
            Ok(id)
        },
    )?;

    Ok(())
}
