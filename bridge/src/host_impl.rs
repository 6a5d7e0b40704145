//! Per-run bridge state held in the Wasmtime Store.
//!
//! `HostState` owns the three heaps (DOM references, plain objects, host
//! callables), the registered-function vocabulary, and the guest resource
//! limits. It lives inside `Store<HostState>` for the duration of one guest
//! run and is returned to the embedder when `main` completes.

use std::sync::Arc;

use wasmtime::{StoreLimits, StoreLimitsBuilder};

use membrane_hostapi::{
    Arena, CallScope, DomArena, FunctionEntry, FunctionRegistry, HostError, HostFunction,
    ObjectEntry, Value,
};

use crate::config::BridgeConfig;
use crate::error::BridgeError;

/// Per-run bridge state held in the Wasmtime `Store`.
///
/// Created fresh for each `run` call; dropped (with every hosted value) when
/// the guest instance goes away.
pub struct HostState {
    /// DOM-reference heap, reserved roots seeded.
    pub dom: DomArena,
    /// Plain host-object heap.
    pub objects: Arena<ObjectEntry>,
    /// Host-callable heap.
    pub functions: Arena<FunctionEntry>,
    /// Vocabulary that function registration resolves against.
    pub registry: Arc<FunctionRegistry>,
    /// Linear-memory growth limits enforced by the store.
    pub limits: StoreLimits,
    /// Whether batch errors trap the guest call (default) or are recorded.
    pub trap_on_batch_error: bool,
    /// Number of batches fully applied.
    pub batches_applied: u64,
    /// Number of operations applied across all batches.
    pub operations_applied: u64,
    /// Most recent recorded batch error, when trapping is disabled.
    pub last_batch_error: Option<String>,
}

impl HostState {
    /// Create fresh state for one guest run.
    pub fn new(registry: Arc<FunctionRegistry>, config: &BridgeConfig) -> Self {
        let limits = StoreLimitsBuilder::new()
            .memory_size((config.max_memory_pages as usize) * 65536)
            .build();
        Self {
            dom: DomArena::new(),
            objects: Arena::new(),
            functions: Arena::new(),
            registry,
            limits,
            trap_on_batch_error: config.trap_on_batch_error,
            batches_applied: 0,
            operations_applied: 0,
            last_batch_error: None,
        }
    }

    /// Whether `handle` currently resolves in any of the three heaps.
    pub fn any_heap_valid(&self, handle: u64) -> bool {
        self.objects.is_valid(handle)
            || self.functions.is_valid(handle)
            || self.dom.is_valid(handle)
    }

    /// Resolve a function-heap handle to its callable.
    ///
    /// Stale handles and pre-allocated slots that were never populated are
    /// both invalid invocation targets.
    pub fn resolve_callable(&self, handle: u64) -> Result<Arc<dyn HostFunction>, BridgeError> {
        match self.functions.get(handle) {
            Some(FunctionEntry::Callable(f)) => Ok(f.clone()),
            Some(FunctionEntry::Null) => Err(BridgeError::InvalidHandle {
                handle,
                context: "function slot not populated",
            }),
            None => Err(BridgeError::InvalidHandle {
                handle,
                context: "function heap target",
            }),
        }
    }

    /// Resolve a body name in the vocabulary and store the callable in a
    /// fresh function-heap slot. The registration path for `js_register_function`.
    pub fn register_function(&mut self, body: &str) -> Result<u64, BridgeError> {
        let callable = self.lookup_body(body)?;
        Ok(self.functions.create(FunctionEntry::Callable(callable)))
    }

    /// Resolve a body name and bind the callable to a pre-allocated handle.
    /// The MakeFunction path.
    pub fn bind_function(&mut self, target: u64, body: &str) -> Result<(), BridgeError> {
        let callable = self.lookup_body(body)?;
        if self.functions.update(target, FunctionEntry::Callable(callable)) {
            Ok(())
        } else {
            Err(BridgeError::InvalidHandle {
                handle: target,
                context: "pre-allocated function registration target",
            })
        }
    }

    fn lookup_body(&self, body: &str) -> Result<Arc<dyn HostFunction>, BridgeError> {
        self.registry.resolve(body).map_err(|err| match err {
            HostError::UnknownFunction(name) => BridgeError::CompileFailed { name },
            other => BridgeError::Host(other),
        })
    }

    /// Drop a guest-held reference, whichever heap it lives in.
    ///
    /// Heaps are tried in the order objects, functions, DOM, so a guest
    /// object handle is never shadowed by the always-active DOM roots. The
    /// DOM reserved-slot guard applies last and rejects without touching
    /// anything.
    pub fn drop_reference(&mut self, handle: u64) -> bool {
        if self.objects.is_valid(handle) {
            return self.objects.destroy(handle);
        }
        if self.functions.is_valid(handle) {
            return self.functions.destroy(handle);
        }
        self.dom.destroy(handle)
    }

    /// Record a non-trapping batch failure.
    pub fn record_batch_error(&mut self, error: &BridgeError) {
        self.last_batch_error = Some(error.to_string());
    }
}

/// The capability surface handed to host callables.
///
/// Borrows the state for the duration of one call; nothing behind it (the
/// arenas themselves, the decoders, linear memory) is reachable from a
/// callable.
pub struct HostScope<'a> {
    state: &'a mut HostState,
}

impl<'a> HostScope<'a> {
    pub fn new(state: &'a mut HostState) -> Self {
        Self { state }
    }
}

impl CallScope for HostScope<'_> {
    fn object(&self, handle: u64) -> Option<Value> {
        self.state.objects.get(handle)?.value().cloned()
    }

    fn update_object(&mut self, handle: u64, value: Value) -> bool {
        self.state.objects.update(handle, ObjectEntry::Value(value))
    }

    fn register_object(&mut self, value: Value) -> u64 {
        self.state.objects.create(ObjectEntry::Value(value))
    }

    fn invoke(&mut self, function: u64, args: &[Value]) -> Result<Value, HostError> {
        let callable = self
            .state
            .resolve_callable(function)
            .map_err(|_| HostError::InvalidHandle(function))?;
        let mut scope = HostScope::new(self.state);
        callable.call(&mut scope, args)
    }
}
