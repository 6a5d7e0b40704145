//! Bridge configuration.

/// Configuration for the bridge runtime.
///
/// Controls guest resource limits and how batch errors propagate.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Maximum linear memory pages the guest may grow to
    /// (1 page = 64 KiB). Default: 256 pages = 16 MiB.
    pub max_memory_pages: u64,

    /// Wasmtime fuel limit (instruction metering).
    /// Prevents infinite loops in pure guest compute.
    pub fuel_limit: u64,

    /// When true (default), a batch error traps the guest call. When false,
    /// the error is recorded on the bridge state and control returns to the
    /// guest after the failing batch stops.
    pub trap_on_batch_error: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_memory_pages: 256, // 16 MiB
            fuel_limit: 100_000_000,
            trap_on_batch_error: true,
        }
    }
}
