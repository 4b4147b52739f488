mod api;
pub mod ast;
pub mod lexer;
pub mod static_semantics;
#[cfg(test)]
mod unit_tests;
mod util;
pub mod visit;

pub use api::{JsParser, ParseOptions, ScriptParser, SyntaxError, MAX_NESTING_DEPTH};
pub use util::is_reserved_word;
