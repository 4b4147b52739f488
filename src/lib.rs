//! # jsh - an interactive JavaScript shell engine
//!
//! The engine behind a line-oriented JavaScript shell:
//! - a tokenizer and recursive-descent parser with a strict mode and an
//!   error-tolerant mode
//! - scope resolution that records the names each block, function and class
//!   declares
//! - detection of unfinished multi-line input
//! - context-aware completion of names and property paths
//! - a FIFO scheduler that runs commands one at a time against a shared
//!   tree-walking evaluation context, including commands that `await` at
//!   top level
//!
//! ## Quick Start
//!
//! ### Running commands in a session
//!
//! ```
//! use jsh::repl::{ReplOptions, Session};
//!
//! let mut session = Session::new(ReplOptions::default().with_quiet(true));
//! assert!(session.process_line("function f(x) {").is_empty());
//! assert!(session.process_line("  return x + 1").is_empty());
//! session.process_line("}");
//!
//! let output = session.process_line("f(2)");
//! assert_eq!(output, vec!["Out[2]: 3".to_string()]);
//! ```
//!
//! ### Deciding whether input is complete
//!
//! ```
//! use jsh::parser::JsParser;
//! use jsh::repl::{classify, Classification};
//!
//! let parser = JsParser::new();
//! let lines = vec!["let s = `one".to_string()];
//! assert!(matches!(classify(&lines, &parser), Classification::Incomplete));
//!
//! let lines = vec!["let s = `one".to_string(), "two`".to_string()];
//! assert!(matches!(classify(&lines, &parser), Classification::Complete(_)));
//! ```
//!
//! ### Completing names
//!
//! ```
//! use jsh::repl::{ReplOptions, Session};
//!
//! let mut session = Session::new(ReplOptions::default());
//! let found = session.complete("Math.fl", 7);
//! assert_eq!(found.candidates, vec!["floor".to_string()]);
//! assert_eq!(found.filter, "fl");
//! ```
//!
//! ### Evaluating without a session
//!
//! ```
//! use jsh::runner::plugin::types::EvalContext;
//! use jsh::runner::plugin::registry::BuiltInRegistry;
//! use jsh::runner::ds::value::JsValue;
//!
//! let mut ctx = EvalContext::new();
//! ctx.install_core_builtins(BuiltInRegistry::with_core());
//! ctx.evaluate_source("var x = Math.abs(-42);").unwrap();
//! assert_eq!(ctx.get_binding("x").unwrap(), JsValue::number(42.0));
//! ```
//!
//! ## Architecture
//!
//! - **[`parser`]** - tokenizer, AST types, strict and tolerant parsing
//! - **[`runner`]** - the shared evaluation context
//!   - **[`runner::plugin`]** - built-in object registry and context types
//!   - **[`runner::ds`]** - values, objects, environments
//!   - **[`runner::eval`]** - tree-walking evaluator, promises and timers
//! - **[`repl`]** - multiline detection, completion, scheduling, sessions

#[macro_use]
extern crate lazy_static;

pub mod parser;
pub mod repl;
pub mod runner;
