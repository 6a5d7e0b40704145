//! `membrane-bridge` — Wasmtime-based host bridge for the membrane protocol.
//!
//! This crate connects a WebAssembly guest to host-resident values. The
//! guest emits batched, binary-encoded instruction streams into its own
//! linear memory; the bridge decodes them, dispatches them against the three
//! host heaps (DOM references, plain objects, host callables), and hands the
//! guest opaque generational handles it can hold across calls.
//!
//! The guest-facing surface is two import namespaces:
//!
//! - **`v2`** — `apply_instructions` plus one pre-allocation import per heap
//! - **`v1`** — the legacy direct-call family (`js_register_function`,
//!   `js_invoke_function*`, `drop_external_reference`, `abort`)
//!
//! The primary entry point is [`Bridge::run`].

pub mod error;
pub mod config;
pub mod protocol;
pub mod memory;
pub mod text;
pub mod args;
pub mod batch;
pub mod host_impl;
pub mod invoke;
pub mod linker;
pub mod validation;
pub mod runtime;

pub use error::BridgeError;
pub use config::BridgeConfig;
pub use host_impl::HostState;
pub use runtime::{Bridge, RunOutcome};
