//! The evaluation context every shell command runs against.
//!
//! - **[`ds`]** - values, objects, scopes and errors
//! - **[`eval`]** - the tree-walking evaluator, promises and timers
//! - **[`plugin`]** - built-in definitions and [`EvalContext`](plugin::types::EvalContext)
//! - **[`std_lib`]** - the built-in objects themselves
//! - **[`inspect`]** - value rendering for echo and `console.log`

mod api;
pub mod ds;
pub mod eval;
pub mod inspect;
pub mod plugin;
pub mod std_lib;

pub use api::LAST_RESULT_NAME;
