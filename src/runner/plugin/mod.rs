//! Built-in object plumbing.
//!
//! Built-ins are described declaratively as [`BuiltInObject`] values and
//! collected in a [`BuiltInRegistry`]. Installing a registry into an
//! [`EvalContext`](types::EvalContext) materialises each definition:
//!
//! ```text
//! BuiltInObject "Map"
//!   constructor        -> global binding `Map` (a constructable function)
//!   prototype_methods  -> Map.prototype.get / set / has ...
//!   getters            -> Map.prototype.size
//!   methods            -> static methods on `Map`
//! ```
//!
//! Objects without a constructor (`Math`, `JSON`, `console`) become plain
//! namespace objects. Intrinsic prototypes are shared through
//! [`EvalContext::prototype_for`](types::EvalContext::prototype_for), so a
//! context without built-ins still hands out consistent (empty) prototypes.
//!
//! ## Example
//!
//! ```
//! use jsh::runner::plugin::{BuiltInObject, BuiltInRegistry};
//! use jsh::runner::plugin::types::EvalContext;
//! use jsh::runner::ds::value::JsValue;
//! use jsh::runner::ds::error::JErrorType;
//!
//! fn triple(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
//!     let n = match args.first() {
//!         Some(JsValue::Number(n)) => n.as_f64(),
//!         _ => 0.0,
//!     };
//!     Ok(JsValue::number(n * 3.0))
//! }
//!
//! let mut registry = BuiltInRegistry::with_core();
//! registry.register_object(BuiltInObject::new("Utils").add_method("triple", triple));
//!
//! let mut ctx = EvalContext::new();
//! ctx.install_core_builtins(registry);
//! assert!(ctx.global_names().contains(&"Utils".to_string()));
//! ```

pub mod registry;
pub mod types;

pub use registry::BuiltInRegistry;
pub use types::{BuiltInFn, BuiltInObject, NativeFn};
