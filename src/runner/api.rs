//! Program-level entry points on [`EvalContext`].

use std::time::{Duration, Instant};

use tracing::trace;

use crate::parser::ast::{ProgramData, StatementType};
use crate::parser::{JsParser, ScriptParser};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::expression::evaluate_expression;
use crate::runner::eval::statement::{
    execute_statements, hoist_lexical_declarations, hoist_var_declarations,
};
use crate::runner::eval::types::ValueResult;
use crate::runner::plugin::types::EvalContext;
use crate::runner::std_lib::object::readable_property_names;

/// Global binding that holds the value of the last successful command.
pub const LAST_RESULT_NAME: &str = "ans";

impl EvalContext {
    /// Drops whatever an aborted run left on the scope chain and call stack.
    fn return_to_global(&mut self) {
        self.scope = self.global_scope.clone();
        self.frames.truncate(1);
        self.call_depth = 0;
    }

    /// Declares the program's `var`, `let`, `const`, `class` and function
    /// names in the shared namespace without running anything else.
    ///
    /// Top-level lexical names replace earlier bindings of the same name, so
    /// a command may re-declare what a previous one declared.
    pub fn declare_program(&mut self, program: &ProgramData) -> Result<(), JErrorType> {
        self.return_to_global();
        hoist_var_declarations(&program.body, self)?;
        hoist_lexical_declarations(&program.body, self)
    }

    /// Runs the statements of an already declared program at global scope.
    /// The result is the value of the last statement that produced one.
    pub fn run_statements(&mut self, body: &[StatementType]) -> ValueResult {
        self.return_to_global();
        let result = execute_statements(body, self).map(|c| c.get_value());
        self.return_to_global();
        result
    }

    /// Declares and runs a whole program.
    pub fn execute_program(&mut self, program: &ProgramData) -> ValueResult {
        self.declare_program(program)?;
        self.run_statements(&program.body)
    }

    /// Parses `source` strictly and runs it.
    pub fn evaluate_source(&mut self, source: &str) -> ValueResult {
        let program = JsParser::new()
            .parse_strict(source)
            .map_err(|e| JErrorType::SyntaxError(e.to_string()))?;
        self.execute_program(&program)
    }

    /// Evaluates a single expression with every side effect refused: calls
    /// (getters included), assignments, updates, `new`, `await` and `delete`
    /// fail with a TypeError. The run is bounded by `timeout`.
    pub fn evaluate_read_only(&mut self, source: &str, timeout: Duration) -> ValueResult {
        let program = JsParser::new()
            .parse_strict(source)
            .map_err(|e| JErrorType::SyntaxError(e.to_string()))?;
        let expression = match program.body.as_slice() {
            [StatementType::ExpressionStatement { expression, .. }] => expression,
            _ => {
                return Err(JErrorType::SyntaxError(format!(
                    "Expected a single expression: {}",
                    source
                )))
            }
        };
        trace!(source, "read-only evaluation");
        let saved_scope = self.scope.clone();
        let saved_deadline = self.deadline;
        let saved_depth = self.call_depth;
        self.scope = self.global_scope.clone();
        self.read_only = true;
        self.deadline = Some(Instant::now() + timeout);
        let result = evaluate_expression(expression, self);
        self.read_only = false;
        self.deadline = saved_deadline;
        self.scope = saved_scope;
        self.call_depth = saved_depth;
        result
    }

    /// Initialised value of a global binding, without raising.
    pub fn lookup_global(&self, name: &str) -> Option<JsValue> {
        self.global_scope.borrow().get_own(name).cloned().flatten()
    }

    /// Own and inherited property names readable on `value`. Primitives
    /// report the names of their wrapper prototype.
    pub fn property_names(&mut self, value: &JsValue) -> Vec<String> {
        readable_property_names(value, self)
    }

    pub fn set_last_result(&mut self, value: JsValue) {
        self.set_binding(LAST_RESULT_NAME, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::plugin::registry::BuiltInRegistry;

    fn context() -> EvalContext {
        let mut ctx = EvalContext::new();
        ctx.install_core_builtins(BuiltInRegistry::with_core());
        ctx
    }

    #[test]
    fn test_bindings_survive_between_programs() {
        let mut ctx = context();
        ctx.evaluate_source("let x = 40; function inc(n) { return n + 1 }")
            .unwrap();
        let v = ctx.evaluate_source("inc(x) + 1").unwrap();
        assert_eq!(v, JsValue::number(42.0));
    }

    #[test]
    fn test_lexical_redeclaration_across_programs() {
        let mut ctx = context();
        ctx.evaluate_source("const a = 1").unwrap();
        ctx.evaluate_source("const a = 2").unwrap();
        assert_eq!(ctx.lookup_global("a"), Some(JsValue::number(2.0)));
    }

    #[test]
    fn test_read_only_rejects_calls_and_assignment() {
        let mut ctx = context();
        ctx.evaluate_source("var o = { inner: { n: 1 }, f() { return 1 } }")
            .unwrap();
        let timeout = Duration::from_millis(100);
        assert!(ctx.evaluate_read_only("o.inner", timeout).is_ok());
        assert!(ctx.evaluate_read_only("o.f()", timeout).is_err());
        assert!(ctx.evaluate_read_only("o.inner = 2", timeout).is_err());
        assert!(!ctx.read_only);
        assert_eq!(ctx.evaluate_source("o.f()").unwrap(), JsValue::number(1.0));
    }

    #[test]
    fn test_read_only_rejects_getters() {
        let mut ctx = context();
        ctx.evaluate_source("var g = { get boom() { return 1 } }").unwrap();
        let result = ctx.evaluate_read_only("g.boom", Duration::from_millis(100));
        assert!(matches!(result, Err(JErrorType::TypeError(_))));
    }

    #[test]
    fn test_error_leaves_context_at_global_scope() {
        let mut ctx = context();
        assert!(ctx
            .evaluate_source("function f() { { let y = 1; throw new Error('x') } } f()")
            .is_err());
        ctx.evaluate_source("var z = 3").unwrap();
        assert_eq!(ctx.lookup_global("z"), Some(JsValue::number(3.0)));
    }
}
