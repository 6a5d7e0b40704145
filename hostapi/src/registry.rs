//! Named vocabulary of host callables.
//!
//! The guest registers functions by name: the text body it submits through
//! the registration path is looked up here, and the resolved callable is what
//! lands in the function heap. The embedder decides the vocabulary before
//! the guest runs; nothing can be added from the guest side.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::HostError;
use crate::traits::{CallScope, HostFunction};
use crate::value::Value;

/// Closure adapter implementing [`HostFunction`].
pub struct HostFunctionHandler<F> {
    func: F,
}

impl<F> HostFunctionHandler<F>
where
    F: Fn(&mut dyn CallScope, &[Value]) -> Result<Value, HostError> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> HostFunction for HostFunctionHandler<F>
where
    F: Fn(&mut dyn CallScope, &[Value]) -> Result<Value, HostError> + Send + Sync,
{
    fn call(&self, scope: &mut dyn CallScope, args: &[Value]) -> Result<Value, HostError> {
        (self.func)(scope, args)
    }
}

/// Registry mapping vocabulary names to callables.
#[derive(Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn HostFunction>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Register a callable under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, function: impl HostFunction + 'static) {
        self.functions.insert(name.into(), Arc::new(function));
    }

    /// Register an already-shared callable under `name`.
    pub fn register_arc(&mut self, name: impl Into<String>, function: Arc<dyn HostFunction>) {
        self.functions.insert(name.into(), function);
    }

    /// Resolve a vocabulary name. The registered body text must match a name
    /// exactly after surrounding whitespace is trimmed.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn HostFunction>, HostError> {
        self.functions
            .get(name.trim())
            .cloned()
            .ok_or_else(|| HostError::UnknownFunction(name.trim().to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name.trim())
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("FunctionRegistry").field("names", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoScope;

    impl CallScope for NoScope {
        fn object(&self, _handle: u64) -> Option<Value> {
            None
        }
        fn update_object(&mut self, _handle: u64, _value: Value) -> bool {
            false
        }
        fn register_object(&mut self, _value: Value) -> u64 {
            0
        }
        fn invoke(&mut self, function: u64, _args: &[Value]) -> Result<Value, HostError> {
            Err(HostError::InvalidHandle(function))
        }
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = FunctionRegistry::new();
        registry.register(
            "math.add",
            HostFunctionHandler::new(|_scope, args| {
                let sum: i64 = args.iter().filter_map(Value::as_i64).sum();
                Ok(Value::Int64(sum))
            }),
        );

        let f = registry.resolve("math.add").unwrap();
        let result = f
            .call(&mut NoScope, &[Value::Int8(7), Value::Int8(35)])
            .unwrap();
        assert_eq!(result, Value::Int64(42));
    }

    #[test]
    fn test_resolve_trims_whitespace() {
        let mut registry = FunctionRegistry::new();
        registry.register(
            "noop",
            HostFunctionHandler::new(|_scope, _args| Ok(Value::Undefined)),
        );
        assert!(registry.resolve("  noop\n").is_ok());
    }

    #[test]
    fn test_unknown_name_errors() {
        let registry = FunctionRegistry::new();
        let err = registry.resolve("missing").err().unwrap();
        assert!(matches!(err, HostError::UnknownFunction(name) if name == "missing"));
    }

    #[test]
    fn test_reregister_replaces() {
        let mut registry = FunctionRegistry::new();
        registry.register(
            "f",
            HostFunctionHandler::new(|_scope, _args| Ok(Value::Int64(1))),
        );
        registry.register(
            "f",
            HostFunctionHandler::new(|_scope, _args| Ok(Value::Int64(2))),
        );
        assert_eq!(registry.len(), 1);
        let f = registry.resolve("f").unwrap();
        assert_eq!(f.call(&mut NoScope, &[]).unwrap(), Value::Int64(2));
    }
}
