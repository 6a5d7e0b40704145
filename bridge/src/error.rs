//! Bridge error types.

use membrane_hostapi::HostError;

/// Top-level error type for the bridge crate.
///
/// Protocol-level variants carry enough position information to identify
/// where in a batch the failure occurred.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Wasmtime engine, compilation, or instantiation error.
    #[error("wasmtime error: {0}")]
    Wasmtime(#[from] anyhow::Error),

    /// Module validation failed (missing exports, bad imports, etc.).
    #[error("validation error: {0}")]
    Validation(String),

    /// Malformed operation or argument framing, or an unrecognized
    /// op/type/quantization code.
    #[error("protocol framing error at byte {offset}: {detail}")]
    Framing { offset: usize, detail: String },

    /// A decoded `(start, len)` range exceeds current linear memory.
    #[error("guest memory range out of bounds: start={start} len={len} memory={size}")]
    MemoryBounds { start: u32, len: u32, size: usize },

    /// A handle did not resolve in its heap.
    #[error("invalid handle {handle:#018x} ({context})")]
    InvalidHandle { handle: u64, context: &'static str },

    /// An operation failed during batch execution. Carries the zero-based
    /// position within the batch for diagnosability.
    #[error("batch operation {index} failed: {source}")]
    Operation {
        index: usize,
        #[source]
        source: Box<BridgeError>,
    },

    /// A `utf_indicator` other than 8 or 16.
    #[error("unsupported text encoding indicator {indicator} (expected 8 or 16)")]
    UnsupportedEncoding { indicator: u32 },

    /// A registered function body did not resolve in the host vocabulary.
    #[error("function body {name:?} did not resolve in the host vocabulary")]
    CompileFailed { name: String },

    /// The guest's allocation exports are missing, trapped, or returned an
    /// unusable pointer.
    #[error("guest allocation failed: {0}")]
    AllocationFailed(String),

    /// The guest invoked the `abort` import.
    #[error("guest requested abort")]
    AbortRequested,

    /// Host callable error during execution.
    #[error("host function error: {0}")]
    Host(#[from] HostError),

    /// Fuel exhausted during execution.
    #[error("fuel exhausted (instruction limit)")]
    FuelExhausted,

    /// WASM guest trapped.
    #[error("guest trapped: {0}")]
    GuestTrapped(String),
}

impl BridgeError {
    /// Shorthand for a framing error at a byte offset.
    pub fn framing(offset: usize, detail: impl Into<String>) -> Self {
        Self::Framing {
            offset,
            detail: detail.into(),
        }
    }
}
