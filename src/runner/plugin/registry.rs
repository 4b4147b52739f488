//! Built-in registry for managing built-in objects.

use indexmap::IndexMap;

use super::types::{BuiltInObject, NativeFn};
use crate::runner::std_lib::register_core_builtins;

/// Registry for built-in objects.
/// Collects object definitions before an [`EvalContext`](super::types::EvalContext)
/// turns them into global bindings.
pub struct BuiltInRegistry {
    /// All registered built-in objects, in registration order.
    objects: IndexMap<String, BuiltInObject>,

    /// Global functions such as `parseInt`.
    functions: IndexMap<String, NativeFn>,
}

impl BuiltInRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        BuiltInRegistry {
            objects: IndexMap::new(),
            functions: IndexMap::new(),
        }
    }

    /// Create a registry with the core built-ins.
    pub fn with_core() -> Self {
        let mut registry = Self::new();
        register_core_builtins(&mut registry);
        registry
    }

    /// Register a built-in object. A later registration of the same name
    /// replaces the earlier one.
    pub fn register_object(&mut self, obj: BuiltInObject) {
        self.objects.insert(obj.name.clone(), obj);
    }

    pub fn register_function(&mut self, name: impl Into<String>, func: NativeFn) {
        self.functions.insert(name.into(), func);
    }

    /// Get a registered object by name.
    pub fn get_object(&self, name: &str) -> Option<&BuiltInObject> {
        self.objects.get(name)
    }

    /// Get a mutable reference to a registered object.
    pub fn get_object_mut(&mut self, name: &str) -> Option<&mut BuiltInObject> {
        self.objects.get_mut(name)
    }

    /// Check if an object exists in the registry.
    pub fn has_object(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    /// Get list of all registered object names.
    pub fn object_names(&self) -> Vec<String> {
        self.objects.keys().cloned().collect()
    }

    pub fn functions(&self) -> impl Iterator<Item = (&String, &NativeFn)> {
        self.functions.iter()
    }
}

impl Default for BuiltInRegistry {
    fn default() -> Self {
        Self::with_core()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_registry_provides_shell_globals() {
        let registry = BuiltInRegistry::with_core();
        for name in ["console", "Math", "Object", "Array", "Promise", "Map", "JSON"] {
            assert!(registry.has_object(name), "missing {}", name);
        }
        assert!(registry.functions().any(|(n, _)| n == "parseInt"));
    }
}
