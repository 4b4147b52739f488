//! Core built-ins registration.
//!
//! This module provides the function to register all core built-in objects
//! with the BuiltInRegistry.

use crate::runner::plugin::registry::BuiltInRegistry;

use super::{
    array, boolean, console, error, function, json, map, math, number, object, promise, string,
    timers,
};

/// Register all core built-in objects with the registry.
pub fn register_core_builtins(registry: &mut BuiltInRegistry) {
    // Object first so later prototypes chain to it.
    object::register(registry);
    function::register(registry);
    array::register(registry);
    string::register(registry);
    number::register(registry);
    boolean::register(registry);
    math::register(registry);
    json::register(registry);
    error::register(registry);
    promise::register(registry);
    map::register(registry);
    console::register(registry);

    registry.register_function("parseInt", number::parse_int);
    registry.register_function("parseFloat", number::parse_float);
    registry.register_function("isNaN", number::global_is_nan);
    registry.register_function("isFinite", number::global_is_finite);
    timers::register(registry);
}
