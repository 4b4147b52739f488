//! Standard library built-in objects.
//!
//! This module contains implementations of JavaScript built-in objects
//! like console, Object, Array, String, Number, Math, JSON, Promise, Map,
//! timers and Error types.

pub mod array;
pub mod boolean;
pub mod console;
pub mod core;
pub mod error;
pub mod function;
pub mod json;
pub mod map;
pub mod math;
pub mod number;
pub mod object;
pub mod promise;
pub mod string;
pub mod timers;

pub use self::core::register_core_builtins;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::value::{JsObjectType, JsValue};

/// Argument `i`, or `undefined` when absent.
pub(crate) fn arg(args: &[JsValue], i: usize) -> JsValue {
    args.get(i).cloned().unwrap_or(JsValue::Undefined)
}

/// The receiver as an object, or a TypeError naming the method.
pub(crate) fn this_object(this: &JsValue, method: &str) -> Result<JsObjectType, JErrorType> {
    match this {
        JsValue::Object(o) => Ok(o.clone()),
        other => Err(JErrorType::type_error(format!(
            "{} called on non-object {}",
            method, other
        ))),
    }
}
