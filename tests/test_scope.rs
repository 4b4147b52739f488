//! Tests for scope annotation of parsed programs.

extern crate jsh;

use indoc::indoc;
use pretty_assertions::assert_eq;

use jsh::parser::ast::{
    DeclarationType, ExpressionType, FunctionBodyOrExpression, ProgramData, StatementType,
};
use jsh::parser::visit::NodeRef;
use jsh::parser::{JsParser, ScriptParser};
use jsh::repl::scope::{local_scope_of, resolve_scopes};

/// Parses strictly and resolves scopes.
fn resolved(source: &str) -> ProgramData {
    let mut program = JsParser::new().parse_strict(source).unwrap();
    resolve_scopes(&mut program).unwrap();
    program
}

fn names(locals: &std::collections::BTreeSet<String>) -> Vec<&str> {
    locals.iter().map(String::as_str).collect()
}

/// The first function declaration at the top level of `program`.
fn first_function(program: &ProgramData) -> &jsh::parser::ast::FunctionData {
    program
        .body
        .iter()
        .find_map(|s| match s {
            StatementType::Declaration(DeclarationType::FunctionDeclaration(f)) => Some(&**f),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no function declaration in {:?}", program.body))
}

#[test]
fn test_binding_strengths() {
    let program = resolved(indoc! {"
        var a = 1;
        let b = 2;
        const { c, d: [e, ...f] } = obj;
        class G {}
        {
            let inner = 1;
            var hoisted = 2;
        }
    "});
    assert_eq!(
        names(&program.locals),
        vec!["G", "a", "b", "c", "e", "f", "hoisted"]
    );
    match &program.body[4] {
        StatementType::BlockStatement(b) => assert_eq!(names(&b.locals), vec!["inner"]),
        other => panic!("expected a block, got {:?}", other),
    }
}

#[test]
fn test_function_scope() {
    let program = resolved(indoc! {"
        function outer(x, { y = 1 }, ...rest) {
            var v;
            let l;
            function nested() {}
        }
    "});
    assert_eq!(names(&program.locals), vec!["outer"]);
    let f = first_function(&program);
    assert_eq!(names(&f.locals), vec!["l", "nested", "rest", "v", "x", "y"]);
}

#[test]
fn test_named_function_expression_binds_its_own_name() {
    let program = resolved("const fact = function inner(n) { return n }");
    assert_eq!(names(&program.locals), vec!["fact"]);
}

#[test]
fn test_import_bindings() {
    let program = resolved("import def, { a as b, c } from 'mod'");
    assert_eq!(names(&program.locals), vec!["b", "c", "def"]);
}

#[test]
fn test_resolving_twice_changes_nothing() {
    let mut program = resolved(indoc! {"
        let a = 1;
        function f(p) { var q; try { } catch (e) { let r } }
    "});
    let before = format!("{:?}", program);
    resolve_scopes(&mut program).unwrap();
    assert_eq!(format!("{:?}", program), before);
}

#[test]
fn test_local_scope_of_unions_enclosing_scopes() {
    let program = resolved(indoc! {"
        let top = 1;
        function f(param) {
            let local = 2;
            return param + local;
        }
    "});
    let f = first_function(&program);
    let body = match &f.body {
        FunctionBodyOrExpression::FunctionBody(b) => &b.body,
        FunctionBodyOrExpression::Expression(_) => panic!("expected a body"),
    };
    let argument = match &body[1] {
        StatementType::ReturnStatement {
            argument: Some(a), ..
        } => a,
        other => panic!("expected a return, got {:?}", other),
    };
    assert!(matches!(**argument, ExpressionType::BinaryExpression { .. }));
    let scope = local_scope_of(&program, &NodeRef::Expression(argument));
    assert_eq!(names(&scope), vec!["f", "local", "param", "top"]);

    // The function's own locals are left out when asking about the function.
    let scope = local_scope_of(&program, &NodeRef::Function(f));
    assert_eq!(names(&scope), vec!["f", "top"]);
}
