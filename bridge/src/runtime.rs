//! Bridge runtime — Wasmtime engine, module loading, and guest execution.
//!
//! The `Bridge` struct is the loader shim: it compiles and validates a guest
//! module once, then `run` wires a fresh instance to the import surface and
//! invokes the guest's `main`. Each run gets its own store, heaps, and
//! linear memory; nothing survives between runs except the compiled module.

use std::path::Path;
use std::sync::Arc;

use log::debug;
use wasmtime::{Config, Engine, Linker, Module, Store, Trap};

use membrane_hostapi::FunctionRegistry;

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::host_impl::HostState;
use crate::linker::register_imports;
use crate::validation::validate_module;

/// Result of one completed guest run.
pub struct RunOutcome {
    /// Final bridge state: the three heaps plus batch statistics.
    pub state: HostState,
    /// Snapshot of guest linear memory at the moment `main` returned, so the
    /// embedder can read guest-visible results (e.g. host-written string
    /// allocations) after the instance is gone.
    pub memory: Vec<u8>,
}

impl std::fmt::Debug for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOutcome")
            .field("batches_applied", &self.state.batches_applied)
            .field("operations_applied", &self.state.operations_applied)
            .field("last_batch_error", &self.state.last_batch_error)
            .field("memory_len", &self.memory.len())
            .finish()
    }
}

/// The guest/host runtime bridge.
///
/// Compiles and validates a guest module, then executes it with the bridge
/// import surface. A fresh Wasmtime instance is created per `run` call.
pub struct Bridge {
    engine: Engine,
    module: Module,
    config: BridgeConfig,
}

impl Bridge {
    /// Create a bridge from WASM bytes (or WAT text).
    ///
    /// Validates the module's exports and imports before accepting.
    pub fn new(wasm_bytes: &[u8], config: BridgeConfig) -> Result<Self, BridgeError> {
        let engine = create_engine()?;
        let module = Module::new(&engine, wasm_bytes)?;
        validate_module(&module)?;
        Ok(Self {
            engine,
            module,
            config,
        })
    }

    /// Load from a `.wasm` file path.
    pub fn from_file(path: &Path, config: BridgeConfig) -> Result<Self, BridgeError> {
        let engine = create_engine()?;
        let module = Module::from_file(&engine, path)?;
        validate_module(&module)?;
        Ok(Self {
            engine,
            module,
            config,
        })
    }

    /// Instantiate the guest against `registry` and invoke its `main`.
    ///
    /// Returns the final bridge state and a linear-memory snapshot. The
    /// instance is discarded either way; on error every hosted value is
    /// dropped with it.
    pub fn run(&self, registry: Arc<FunctionRegistry>) -> Result<RunOutcome, BridgeError> {
        let host_state = HostState::new(registry, &self.config);

        let mut store = Store::new(&self.engine, host_state);
        store.set_fuel(self.config.fuel_limit)?;
        store.limiter(|state| &mut state.limits);

        let mut linker = Linker::new(&self.engine);
        register_imports(&mut linker)?;

        let instance = linker.instantiate(&mut store, &self.module)?;
        debug!("guest instantiated, invoking main");

        let main = instance.get_typed_func::<(), ()>(&mut store, "main")?;
        handle_trap(main.call(&mut store, ()))?;

        let memory = instance
            .get_memory(&mut store, "memory")
            .ok_or_else(|| BridgeError::Validation("guest has no memory export".into()))?
            .data(&store)
            .to_vec();

        Ok(RunOutcome {
            state: store.into_data(),
            memory,
        })
    }
}

/// Create a Wasmtime engine with fuel metering enabled.
fn create_engine() -> Result<Engine, BridgeError> {
    let mut wasm_config = Config::new();
    wasm_config.consume_fuel(true);
    Ok(Engine::new(&wasm_config)?)
}

/// Convert a guest call result, mapping traps back to `BridgeError`.
///
/// Host-raised bridge errors travel through the trap unchanged; fuel
/// exhaustion maps to `FuelExhausted`; anything else is `GuestTrapped`.
fn handle_trap<R>(result: Result<R, anyhow::Error>) -> Result<R, BridgeError> {
    match result {
        Ok(val) => Ok(val),
        Err(e) => {
            if matches!(e.downcast_ref::<Trap>(), Some(Trap::OutOfFuel)) {
                return Err(BridgeError::FuelExhausted);
            }
            match e.downcast::<BridgeError>() {
                Ok(bridge_err) => Err(bridge_err),
                Err(other) => Err(BridgeError::GuestTrapped(format!("{}", other))),
            }
        }
    }
}
