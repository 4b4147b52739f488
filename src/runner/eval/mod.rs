//! Tree-walking evaluation of parsed programs.
//!
//! Statements produce [`Completion`] records, expressions produce values.
//! [`jobs`] holds the microtask and timer queues that promises, `await` and
//! `setTimeout` feed.

pub mod expression;
pub mod function;
pub mod jobs;
pub mod statement;
pub mod types;

pub use types::{Completion, CompletionType};
