//! Guest linear-memory access with bounds checking.
//!
//! Reads and writes go through explicit `(start, len)` validation against the
//! current memory size. Views returned by [`slice`] borrow from one
//! `Memory::data` call, so the borrow checker keeps them from outliving a
//! re-entrant guest call that might grow memory; after any re-entry the
//! caller must re-derive the view.
//!
//! Outbound allocation is delegated to the guest: [`GuestAllocator`] drives
//! the guest's `create_allocation` / `allocation_start_pointer` exports and
//! hands back the allocation id the guest uses to locate host-written bytes.

use wasmtime::{Caller, Memory, TypedFunc};

use crate::error::BridgeError;

/// Borrow a `(start, len)` view of guest memory.
pub fn slice(mem: &[u8], start: u32, len: u32) -> Result<&[u8], BridgeError> {
    let end = (start as usize)
        .checked_add(len as usize)
        .filter(|&end| end <= mem.len())
        .ok_or(BridgeError::MemoryBounds {
            start,
            len,
            size: mem.len(),
        })?;
    Ok(&mem[start as usize..end])
}

/// Read `len` bytes from guest memory at `start` into an owned copy.
pub fn read_bytes(mem: &[u8], start: u32, len: u32) -> Result<Vec<u8>, BridgeError> {
    Ok(slice(mem, start, len)?.to_vec())
}

/// Write `data` to guest memory at `start`.
pub fn write_bytes_at(mem: &mut [u8], start: u32, data: &[u8]) -> Result<(), BridgeError> {
    let end = (start as usize)
        .checked_add(data.len())
        .filter(|&end| end <= mem.len())
        .ok_or(BridgeError::MemoryBounds {
            start,
            len: data.len() as u32,
            size: mem.len(),
        })?;
    mem[start as usize..end].copy_from_slice(data);
    Ok(())
}

/// Get the guest's exported memory from a `Caller`.
pub fn guest_memory<T>(caller: &mut Caller<'_, T>) -> Result<Memory, BridgeError> {
    caller
        .get_export("memory")
        .and_then(|e| e.into_memory())
        .ok_or_else(|| BridgeError::Validation("guest has no memory export".into()))
}

/// Handle to the guest's allocation exports.
///
/// Both calls re-enter the guest, which may grow its memory; any previously
/// derived view is stale afterwards.
pub struct GuestAllocator {
    create: TypedFunc<u32, u32>,
    start_pointer: TypedFunc<u32, u32>,
}

impl GuestAllocator {
    /// Resolve `create_allocation` and `allocation_start_pointer` from the
    /// calling instance's exports.
    pub fn from_caller<T>(caller: &mut Caller<'_, T>) -> Result<Self, BridgeError> {
        let create = typed_export(caller, "create_allocation")?;
        let start_pointer = typed_export(caller, "allocation_start_pointer")?;
        Ok(Self {
            create,
            start_pointer,
        })
    }

    /// Allocate `size` bytes in the guest and return
    /// `(allocation_id, start_pointer)`.
    pub fn allocate<T>(
        &self,
        caller: &mut Caller<'_, T>,
        size: u32,
    ) -> Result<(u32, u32), BridgeError> {
        let id = self
            .create
            .call(&mut *caller, size)
            .map_err(|e| BridgeError::AllocationFailed(format!("create_allocation: {}", e)))?;
        let start = self
            .start_pointer
            .call(&mut *caller, id)
            .map_err(|e| {
                BridgeError::AllocationFailed(format!("allocation_start_pointer: {}", e))
            })?;
        Ok((id, start))
    }

    /// Allocate space for `data` in the guest, copy it in, and return the
    /// allocation id the guest resolves back to the start pointer.
    pub fn write_bytes<T>(
        &self,
        caller: &mut Caller<'_, T>,
        memory: Memory,
        data: &[u8],
    ) -> Result<u32, BridgeError> {
        let (id, start) = self.allocate(caller, data.len() as u32)?;
        // The allocation calls may have grown memory: re-derive the view.
        let mem = memory.data_mut(&mut *caller);
        write_bytes_at(mem, start, data).map_err(|_| {
            BridgeError::AllocationFailed(format!(
                "allocation {} start pointer {} not writable for {} bytes",
                id,
                start,
                data.len()
            ))
        })?;
        Ok(id)
    }
}

fn typed_export<T>(
    caller: &mut Caller<'_, T>,
    name: &str,
) -> Result<TypedFunc<u32, u32>, BridgeError> {
    caller
        .get_export(name)
        .and_then(|e| e.into_func())
        .ok_or_else(|| BridgeError::AllocationFailed(format!("missing {} export", name)))?
        .typed::<u32, u32>(&*caller)
        .map_err(|e| BridgeError::AllocationFailed(format!("{}: {}", name, e)))
}
