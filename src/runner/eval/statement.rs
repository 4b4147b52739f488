//! Statement execution.
//!
//! This module provides statement execution logic for the JavaScript interpreter.

use indexmap::IndexSet;

use crate::parser::ast::{
    BlockStatementData, CatchClauseData, DeclarationType, ExpressionType, ForIteratorData,
    PatternType, StatementType, SwitchCaseData, VariableDeclarationData, VariableDeclarationKind,
    VariableDeclarationOrExpression, VariableDeclarationOrPattern,
};
use crate::parser::static_semantics::{
    bound_names_of_variable_declaration, lexically_declared_names, var_declared_names, ScopeError,
};
use crate::runner::ds::env_record::{var_scope, EnvironmentKind, EnvironmentRecord, ScopeRef};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::operations::test_and_comparison::strict_equality_comparison;
use crate::runner::ds::operations::type_conversion::to_boolean;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::types::EvalContext;

use super::expression::{
    bind_pattern, evaluate_expression, is_anonymous_function_definition, iterate_to_vec,
    BindingMode,
};
use super::function::{create_function_object, evaluate_class, name_anonymous_function};
use super::types::{Completion, CompletionType, EvalResult, ValueResult};

fn scope_error(e: ScopeError) -> JErrorType {
    JErrorType::SyntaxError(e.to_string())
}

/// Execute a statement and return its completion.
pub fn execute_statement(stmt: &StatementType, ctx: &mut EvalContext) -> EvalResult {
    match stmt {
        StatementType::EmptyStatement { .. } | StatementType::DebuggerStatement { .. } => {
            Ok(Completion::normal())
        }

        StatementType::ExpressionStatement { expression, .. } => {
            let value = evaluate_expression(expression, ctx)?;
            Ok(Completion::normal_with_value(value))
        }

        StatementType::BlockStatement(block) => execute_block_statement(block, ctx),

        StatementType::Declaration(decl) => execute_declaration(decl, ctx),

        StatementType::IfStatement {
            test,
            consequent,
            alternate,
            ..
        } => {
            let test_value = evaluate_expression(test, ctx)?;
            let completion = if to_boolean(&test_value) {
                execute_statement(consequent, ctx)?
            } else if let Some(alt) = alternate {
                execute_statement(alt, ctx)?
            } else {
                Completion::normal_with_value(JsValue::Undefined)
            };
            Ok(completion.update_empty(Some(JsValue::Undefined)))
        }

        StatementType::WhileStatement { test, body, .. } => {
            execute_while_statement(test, body, ctx)
        }

        StatementType::DoWhileStatement { body, test, .. } => {
            execute_do_while_statement(body, test, ctx)
        }

        StatementType::ForStatement {
            init,
            test,
            update,
            body,
            ..
        } => execute_for_statement(init.as_ref(), test.as_deref(), update.as_deref(), body, ctx),

        StatementType::ForInStatement(data) => execute_for_in_statement(data, ctx),

        StatementType::ForOfStatement(data) => execute_for_of_statement(data, ctx),

        StatementType::SwitchStatement {
            discriminant,
            cases,
            ..
        } => execute_switch_statement(discriminant, cases, ctx),

        StatementType::BreakStatement { .. } => Ok(Completion::break_completion()),

        StatementType::ContinueStatement { .. } => Ok(Completion::continue_completion()),

        StatementType::ReturnStatement { argument, .. } => {
            let value = match argument {
                Some(arg) => evaluate_expression(arg, ctx)?,
                None => JsValue::Undefined,
            };
            Ok(Completion::return_value(value))
        }

        StatementType::ThrowStatement { argument, .. } => {
            let value = evaluate_expression(argument, ctx)?;
            Err(JErrorType::Thrown(value))
        }

        StatementType::TryStatement {
            block,
            handler,
            finalizer,
            ..
        } => execute_try_statement(block, handler.as_ref(), finalizer.as_ref(), ctx),
    }
}

/// Runs a statement list, carrying the value of the last statement that
/// produced one.
pub fn execute_statements(body: &[StatementType], ctx: &mut EvalContext) -> EvalResult {
    let mut last_value = None;
    for stmt in body {
        let completion = execute_statement(stmt, ctx)?;
        if completion.is_abrupt() {
            return Ok(completion.update_empty(last_value));
        }
        if completion.value.is_some() {
            last_value = completion.value;
        }
    }
    Ok(Completion {
        completion_type: CompletionType::Normal,
        value: last_value,
    })
}

/// Runs a function body whose parameters and declarations are already bound.
pub fn execute_function_body(body: &[StatementType], ctx: &mut EvalContext) -> ValueResult {
    let completion = execute_statements(body, ctx)?;
    match completion.completion_type {
        CompletionType::Return => Ok(completion.get_value()),
        _ => Ok(JsValue::Undefined),
    }
}

/// Creates `var` bindings for the whole body in the nearest function or
/// global scope. Existing bindings keep their values.
pub fn hoist_var_declarations(body: &[StatementType], ctx: &mut EvalContext) -> Result<(), JErrorType> {
    let names = var_declared_names(body).map_err(scope_error)?;
    if names.is_empty() {
        return Ok(());
    }
    let target = var_scope(&ctx.scope);
    let mut target = target.borrow_mut();
    for name in names {
        target.create_var_binding(name);
    }
    Ok(())
}

/// Declares the `let`, `const` and `class` names of a statement list in the
/// current scope, uninitialised, and instantiates its function declarations.
pub fn hoist_lexical_declarations(body: &[StatementType], ctx: &mut EvalContext) -> Result<(), JErrorType> {
    // Validates every binding target up front.
    lexically_declared_names(body).map_err(scope_error)?;
    for stmt in body {
        let decl = match stmt {
            StatementType::Declaration(d) => d,
            _ => continue,
        };
        match decl {
            DeclarationType::VariableDeclaration(v) if v.kind != VariableDeclarationKind::Var => {
                let mutable = v.kind == VariableDeclarationKind::Let;
                let names = bound_names_of_variable_declaration(v).map_err(scope_error)?;
                let mut scope = ctx.scope.borrow_mut();
                for name in names {
                    scope.create_binding(name, mutable, None);
                }
            }
            DeclarationType::FunctionDeclaration(f) => {
                if let Some(id) = f.id.as_ref().filter(|id| !id.is_placeholder()) {
                    let func = create_function_object(f, ctx);
                    ctx.scope
                        .borrow_mut()
                        .create_binding(id.name.as_str(), true, Some(func));
                }
            }
            DeclarationType::ClassDeclaration(c) => {
                if let Some(id) = c.id.as_ref().filter(|id| !id.is_placeholder()) {
                    ctx.scope
                        .borrow_mut()
                        .create_binding(id.name.as_str(), true, None);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Runs `f` with `scope` as the current scope, restoring the previous one
/// on every exit path.
fn with_scope<T>(
    scope: ScopeRef,
    ctx: &mut EvalContext,
    f: impl FnOnce(&mut EvalContext) -> Result<T, JErrorType>,
) -> Result<T, JErrorType> {
    let saved = std::mem::replace(&mut ctx.scope, scope);
    let result = f(ctx);
    ctx.scope = saved;
    result
}

fn new_block_scope(ctx: &EvalContext) -> ScopeRef {
    EnvironmentRecord::new_child(&ctx.scope, EnvironmentKind::Block)
}

fn execute_block_statement(block: &BlockStatementData, ctx: &mut EvalContext) -> EvalResult {
    let scope = new_block_scope(ctx);
    with_scope(scope, ctx, |ctx| {
        hoist_lexical_declarations(&block.body, ctx)?;
        execute_statements(&block.body, ctx)
    })
}

fn execute_declaration(decl: &DeclarationType, ctx: &mut EvalContext) -> EvalResult {
    match decl {
        DeclarationType::VariableDeclaration(v) => {
            execute_variable_declaration(v, ctx)?;
        }
        // Instantiated while hoisting.
        DeclarationType::FunctionDeclaration(_) => {}
        DeclarationType::ClassDeclaration(c) => {
            let class = evaluate_class(c, ctx)?;
            if let Some(id) = &c.id {
                ctx.scope
                    .borrow_mut()
                    .create_binding(id.name.as_str(), true, Some(class));
            }
        }
        DeclarationType::ImportDeclaration(_) => {
            return Err(JErrorType::SyntaxError(
                "Cannot use import statement outside a module".to_string(),
            ))
        }
    }
    Ok(Completion::normal())
}

fn binding_mode(kind: VariableDeclarationKind) -> BindingMode {
    match kind {
        VariableDeclarationKind::Var => BindingMode::Var,
        VariableDeclarationKind::Let => BindingMode::Let,
        VariableDeclarationKind::Const => BindingMode::Const,
    }
}

fn execute_variable_declaration(
    var_decl: &VariableDeclarationData,
    ctx: &mut EvalContext,
) -> Result<(), JErrorType> {
    let mode = binding_mode(var_decl.kind);
    for declarator in &var_decl.declarations {
        let value = match &declarator.init {
            Some(init) => {
                let v = evaluate_expression(init, ctx)?;
                if let (PatternType::PatternWhichCanBeExpression(_), true) =
                    (declarator.id.as_ref(), is_anonymous_function_definition(init))
                {
                    if let Some(name) = simple_binding_name(&declarator.id) {
                        name_anonymous_function(&v, name);
                    }
                }
                v
            }
            // `var x;` leaves an existing value alone.
            None if mode == BindingMode::Var => continue,
            None => JsValue::Undefined,
        };
        bind_pattern(&declarator.id, value, mode, ctx)?;
    }
    Ok(())
}

fn simple_binding_name(pattern: &PatternType) -> Option<&str> {
    use crate::parser::ast::ExpressionPatternType;
    match pattern {
        PatternType::PatternWhichCanBeExpression(ExpressionPatternType::Identifier(id)) => {
            Some(id.name.as_str())
        }
        _ => None,
    }
}

/// Outcome of one loop body run.
enum LoopControl {
    Continue,
    Exit(Completion),
}

fn loop_step(completion: Completion, last_value: &mut Option<JsValue>) -> LoopControl {
    if completion.value.is_some() {
        *last_value = completion.value.clone();
    }
    match completion.completion_type {
        CompletionType::Break => LoopControl::Exit(Completion {
            completion_type: CompletionType::Normal,
            value: last_value.clone(),
        }),
        CompletionType::Return => LoopControl::Exit(completion.update_empty(last_value.clone())),
        CompletionType::Continue | CompletionType::Normal => LoopControl::Continue,
    }
}

fn loop_done(last_value: Option<JsValue>) -> EvalResult {
    Ok(Completion {
        completion_type: CompletionType::Normal,
        value: Some(last_value.unwrap_or(JsValue::Undefined)),
    })
}

fn execute_while_statement(
    test: &ExpressionType,
    body: &StatementType,
    ctx: &mut EvalContext,
) -> EvalResult {
    let mut last_value = None;
    loop {
        ctx.check_deadline()?;
        let test_value = evaluate_expression(test, ctx)?;
        if !to_boolean(&test_value) {
            break;
        }
        let completion = execute_statement(body, ctx)?;
        if let LoopControl::Exit(c) = loop_step(completion, &mut last_value) {
            return Ok(c);
        }
    }
    loop_done(last_value)
}

fn execute_do_while_statement(
    body: &StatementType,
    test: &ExpressionType,
    ctx: &mut EvalContext,
) -> EvalResult {
    let mut last_value = None;
    loop {
        ctx.check_deadline()?;
        let completion = execute_statement(body, ctx)?;
        if let LoopControl::Exit(c) = loop_step(completion, &mut last_value) {
            return Ok(c);
        }
        let test_value = evaluate_expression(test, ctx)?;
        if !to_boolean(&test_value) {
            break;
        }
    }
    loop_done(last_value)
}

/// Fresh scope for the next iteration of a `for (let ...)` loop, holding
/// copies of the loop variables so closures capture one value per pass.
fn copy_iteration_scope(previous: &ScopeRef, names: &[String], outer: &ScopeRef) -> ScopeRef {
    let next = EnvironmentRecord::new_child(outer, EnvironmentKind::Block);
    {
        let prev = previous.borrow();
        let mut next = next.borrow_mut();
        for name in names {
            let value = prev.get_own(name).cloned().flatten();
            next.create_binding(name.as_str(), prev.is_mutable(name), value);
        }
    }
    next
}

fn execute_for_statement(
    init: Option<&VariableDeclarationOrExpression>,
    test: Option<&ExpressionType>,
    update: Option<&ExpressionType>,
    body: &StatementType,
    ctx: &mut EvalContext,
) -> EvalResult {
    let outer = ctx.scope.clone();
    let mut per_iteration = vec![];
    let scope = new_block_scope(ctx);
    with_scope(scope, ctx, |ctx| {
        match init {
            Some(VariableDeclarationOrExpression::VariableDeclaration(decl)) => {
                if decl.kind != VariableDeclarationKind::Var {
                    per_iteration = bound_names_of_variable_declaration(decl).map_err(scope_error)?;
                    let mut scope = ctx.scope.borrow_mut();
                    for name in &per_iteration {
                        scope.create_binding(name.as_str(), true, None);
                    }
                }
                execute_variable_declaration(decl, ctx)?;
            }
            Some(VariableDeclarationOrExpression::Expression(expr)) => {
                evaluate_expression(expr, ctx)?;
            }
            None => {}
        }

        let mut last_value = None;
        if !per_iteration.is_empty() {
            ctx.scope = copy_iteration_scope(&ctx.scope, &per_iteration, &outer);
        }
        loop {
            ctx.check_deadline()?;
            if let Some(test) = test {
                let test_value = evaluate_expression(test, ctx)?;
                if !to_boolean(&test_value) {
                    break;
                }
            }
            let completion = execute_statement(body, ctx)?;
            if let LoopControl::Exit(c) = loop_step(completion, &mut last_value) {
                return Ok(c);
            }
            if !per_iteration.is_empty() {
                ctx.scope = copy_iteration_scope(&ctx.scope, &per_iteration, &outer);
            }
            if let Some(update) = update {
                evaluate_expression(update, ctx)?;
            }
        }
        loop_done(last_value)
    })
}

/// Enumerable string keys of `value` and its prototypes, as `for-in` visits them.
fn for_in_keys(value: &JsValue) -> Vec<String> {
    match value {
        JsValue::Object(o) => {
            let mut keys: IndexSet<String> = IndexSet::new();
            let mut current = Some(o.clone());
            while let Some(obj) = current {
                let b = obj.borrow();
                keys.extend(b.own_keys(false));
                current = b.prototype.clone();
            }
            keys.into_iter().collect()
        }
        JsValue::String(s) => (0..s.chars().count()).map(|i| i.to_string()).collect(),
        _ => vec![],
    }
}

/// Binds the loop variable of a `for-in`/`for-of` head for one iteration and
/// runs the body.
fn run_iteration(
    data: &ForIteratorData,
    value: JsValue,
    ctx: &mut EvalContext,
) -> EvalResult {
    match &data.left {
        VariableDeclarationOrPattern::VariableDeclaration(decl) => {
            let target = match decl.declarations.first() {
                Some(d) => &d.id,
                None => return Ok(Completion::normal()),
            };
            let mode = binding_mode(decl.kind);
            if mode == BindingMode::Var {
                bind_pattern(target, value, mode, ctx)?;
                return execute_statement(&data.body, ctx);
            }
            let scope = new_block_scope(ctx);
            with_scope(scope, ctx, |ctx| {
                bind_pattern(target, value, mode, ctx)?;
                execute_statement(&data.body, ctx)
            })
        }
        VariableDeclarationOrPattern::Pattern(p) => {
            bind_pattern(p, value, BindingMode::Assign, ctx)?;
            execute_statement(&data.body, ctx)
        }
    }
}

fn execute_for_in_statement(data: &ForIteratorData, ctx: &mut EvalContext) -> EvalResult {
    let object = evaluate_expression(&data.right, ctx)?;
    let mut last_value = None;
    for key in for_in_keys(&object) {
        ctx.check_deadline()?;
        let completion = run_iteration(data, JsValue::String(key), ctx)?;
        if let LoopControl::Exit(c) = loop_step(completion, &mut last_value) {
            return Ok(c);
        }
    }
    loop_done(last_value)
}

fn execute_for_of_statement(data: &ForIteratorData, ctx: &mut EvalContext) -> EvalResult {
    let iterable = evaluate_expression(&data.right, ctx)?;
    let mut last_value = None;
    for item in iterate_to_vec(&iterable, ctx)? {
        ctx.check_deadline()?;
        let completion = run_iteration(data, item, ctx)?;
        if let LoopControl::Exit(c) = loop_step(completion, &mut last_value) {
            return Ok(c);
        }
    }
    loop_done(last_value)
}

fn execute_switch_statement(
    discriminant: &ExpressionType,
    cases: &[SwitchCaseData],
    ctx: &mut EvalContext,
) -> EvalResult {
    let switch_value = evaluate_expression(discriminant, ctx)?;
    let scope = new_block_scope(ctx);
    with_scope(scope, ctx, |ctx| {
        for case in cases {
            hoist_lexical_declarations(&case.consequent, ctx)?;
        }

        let mut start = None;
        for (i, case) in cases.iter().enumerate() {
            if let Some(test) = &case.test {
                let case_value = evaluate_expression(test, ctx)?;
                if strict_equality_comparison(&switch_value, &case_value) {
                    start = Some(i);
                    break;
                }
            }
        }
        let start = match start.or_else(|| cases.iter().position(|c| c.test.is_none())) {
            Some(i) => i,
            None => return Ok(Completion::normal_with_value(JsValue::Undefined)),
        };

        let mut last_value = None;
        for case in &cases[start..] {
            let completion = execute_statements(&case.consequent, ctx)?;
            if completion.value.is_some() {
                last_value = completion.value.clone();
            }
            match completion.completion_type {
                CompletionType::Normal => {}
                CompletionType::Break => break,
                _ => return Ok(completion.update_empty(last_value)),
            }
        }
        loop_done(last_value)
    })
}

fn execute_catch_clause(
    handler: &CatchClauseData,
    thrown: JsValue,
    ctx: &mut EvalContext,
) -> EvalResult {
    let scope = new_block_scope(ctx);
    with_scope(scope, ctx, |ctx| {
        if let Some(param) = &handler.param {
            bind_pattern(param, thrown, BindingMode::Let, ctx)?;
        }
        execute_block_statement(&handler.body, ctx)
    })
}

fn execute_try_statement(
    block: &BlockStatementData,
    handler: Option<&CatchClauseData>,
    finalizer: Option<&BlockStatementData>,
    ctx: &mut EvalContext,
) -> EvalResult {
    let mut result = execute_block_statement(block, ctx);
    if let (Err(e), Some(h)) = (&result, handler) {
        if e.is_catchable() {
            let thrown = ctx.error_to_value(e.clone());
            result = execute_catch_clause(h, thrown, ctx);
        }
    }
    match finalizer {
        None => result.map(|c| c.update_empty(Some(JsValue::Undefined))),
        Some(f) => {
            // Uncatchable errors skip `finally` as well.
            if let Err(e) = &result {
                if !e.is_catchable() {
                    return result;
                }
            }
            let finally_completion = execute_block_statement(f, ctx)?;
            if finally_completion.is_abrupt() {
                return Ok(finally_completion);
            }
            result.map(|c| c.update_empty(Some(JsValue::Undefined)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::JsParser;

    fn run(source: &str) -> EvalResult {
        let program = JsParser::parse_to_ast_from_str(source).expect("parses");
        let mut ctx = EvalContext::new();
        hoist_var_declarations(&program.body, &mut ctx)?;
        hoist_lexical_declarations(&program.body, &mut ctx)?;
        execute_statements(&program.body, &mut ctx)
    }

    fn run_value(source: &str) -> JsValue {
        run(source).expect("runs").get_value()
    }

    #[test]
    fn test_completion_value_of_last_statement() {
        assert_eq!(run_value("1; 2; var x = 3;"), JsValue::number(2.0));
        assert_eq!(run_value("if (true) { 'yes' } else { 'no' }"), JsValue::string("yes"));
    }

    #[test]
    fn test_loop_let_bindings_are_per_iteration() {
        let source =
            "var fs = []; for (let i = 0; i < 3; i++) { fs[i] = () => i; } fs[0]() + fs[2]()";
        assert_eq!(run_value(source), JsValue::number(2.0));
    }

    #[test]
    fn test_switch_falls_through_until_break() {
        let source = "var out = ''; switch (2) { case 1: out += 'a'; case 2: out += 'b'; case 3: out += 'c'; break; default: out += 'd'; } out";
        assert_eq!(run_value(source), JsValue::string("bc"));
    }

    #[test]
    fn test_finally_overrides_return_value() {
        let source = "function f() { try { return 1; } finally { return 2; } } f()";
        assert_eq!(run_value(source), JsValue::number(2.0));
    }

    #[test]
    fn test_catch_receives_engine_errors() {
        let source = "var m; try { null.x } catch (e) { m = e.message } m";
        assert_eq!(
            run_value(source),
            JsValue::string("Cannot read properties of null (reading 'x')")
        );
    }

    #[test]
    fn test_tdz_read_is_reference_error() {
        let err = run("x; let x = 1;").err().expect("fails");
        assert_eq!(
            err.to_string(),
            "ReferenceError: Cannot access 'x' before initialization"
        );
    }

    #[test]
    fn test_const_assignment_is_type_error() {
        let err = run("const c = 1; c = 2;").err().expect("fails");
        assert_eq!(err.to_string(), "TypeError: Assignment to constant variable.");
    }
}
