//! Host callable traits — the surface registered functions run behind.
//!
//! `HostFunction` is what the bridge stores in the function heap and what
//! the registry hands out by name. `CallScope` is the only capability a
//! callable receives at invocation time: a handful of narrow operations on
//! the object heap plus synchronous callback dispatch. The arenas, the
//! decoders, and the guest's linear memory never cross this boundary.

use crate::error::HostError;
use crate::value::Value;

/// Capabilities exposed to a host callable during one invocation.
pub trait CallScope {
    /// Read the value behind an object-heap handle. Pre-allocated null slots
    /// and stale handles both read as `None`.
    fn object(&self, handle: u64) -> Option<Value>;

    /// Populate or replace the value behind a valid object-heap handle.
    /// Returns whether the handle resolved. This is the second half of the
    /// guest's pre-allocate-then-populate protocol.
    fn update_object(&mut self, handle: u64, value: Value) -> bool;

    /// Register a fresh object and return its handle.
    fn register_object(&mut self, value: Value) -> u64;

    /// Synchronously invoke another callable by its function-heap handle.
    /// This is how a callable delivers a result through a guest-supplied
    /// callback reference.
    fn invoke(&mut self, function: u64, args: &[Value]) -> Result<Value, HostError>;
}

/// A host-registered callable.
///
/// Implementations must be synchronous; a callable that needs to finish work
/// later captures a callback handle from its arguments and delivers through
/// [`CallScope::invoke`] when the host environment re-enters it.
pub trait HostFunction: Send + Sync {
    /// Invoke the callable with decoded arguments.
    fn call(&self, scope: &mut dyn CallScope, args: &[Value]) -> Result<Value, HostError>;
}
