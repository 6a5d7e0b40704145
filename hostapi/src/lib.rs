//! `membrane-hostapi` — host-side types for the membrane WASM bridge.
//!
//! This crate defines everything the bridge hosts on behalf of the guest,
//! independent of any particular WASM engine:
//!
//! - `Value` — the cross-boundary value model with declared-width numerics
//! - `Arena` — generational slot allocator issuing 64-bit handles
//! - `DomArena` — arena with reserved well-known root slots
//! - `HostFunction` / `CallScope` — the callable surface and its capabilities
//! - `FunctionRegistry` — the named vocabulary registration resolves against
//! - `HostError` — callable-side error type

pub mod error;
pub mod value;
pub mod arena;
pub mod dom;
pub mod traits;
pub mod registry;

// Re-export commonly used types at the crate root.
pub use error::HostError;
pub use value::{FunctionEntry, ObjectEntry, Value};
pub use arena::{decode_handle, encode_handle, Arena, GENERATION_CEILING};
pub use dom::{DomArena, DomEntry, WellKnownRoot, RESERVED_SLOTS};
pub use traits::{CallScope, HostFunction};
pub use registry::{FunctionRegistry, HostFunctionHandler};
