//! Lexical scope annotation of parsed programs.
//!
//! [`resolve_scopes`] fills the `locals` set of every scope-introducing node:
//!
//! - `var` declarations and parameters attach to the nearest function or
//!   program.
//! - `let`, `const`, `class`, function declarations and imports attach to the
//!   nearest block, function or program.
//! - Catch parameters attach to the catch body.
//! - The name of a function or class expression attaches to that expression.
//!
//! Locals are sets, so resolving an already resolved tree changes nothing.

use std::rc::Rc;

use crate::parser::ast::*;
use crate::parser::static_semantics::{bound_names_of_pattern, ScopeError};
use crate::parser::visit::{path_to, NodeRef};

pub fn resolve_scopes(program: &mut ProgramData) -> Result<(), ScopeError> {
    let mut vars = vec![];
    let mut lexicals = vec![];
    resolve_statements(&mut program.body, &mut vars, &mut lexicals)?;
    program.locals.extend(vars);
    program.locals.extend(lexicals);
    Ok(())
}

/// Union of the locals of every scope enclosing `node`. The node's own
/// locals are not included.
pub fn local_scope_of(program: &ProgramData, node: &NodeRef<'_>) -> Locals {
    let mut scope = Locals::new();
    if let Some(path) = path_to(NodeRef::Program(program), node) {
        for ancestor in &path[..path.len() - 1] {
            if let Some(locals) = ancestor.locals() {
                scope.extend(locals.iter().cloned());
            }
        }
    }
    scope
}

fn declared_name(id: &Option<IdentifierData>) -> Option<String> {
    id.as_ref()
        .filter(|id| !id.is_placeholder())
        .map(|id| id.name.to_string())
}

fn resolve_statements(
    body: &mut [StatementType],
    vars: &mut Vec<String>,
    lexicals: &mut Vec<String>,
) -> Result<(), ScopeError> {
    for stmt in body.iter_mut() {
        resolve_statement(stmt, vars, lexicals)?;
    }
    Ok(())
}

fn resolve_block(block: &mut BlockStatementData, vars: &mut Vec<String>) -> Result<(), ScopeError> {
    let mut lexicals = vec![];
    resolve_statements(&mut block.body, vars, &mut lexicals)?;
    block.locals.extend(lexicals);
    Ok(())
}

fn resolve_variable_declaration(
    v: &mut VariableDeclarationData,
    vars: &mut Vec<String>,
    lexicals: &mut Vec<String>,
) -> Result<(), ScopeError> {
    for d in v.declarations.iter_mut() {
        let names = bound_names_of_pattern(&d.id)?;
        if v.kind == VariableDeclarationKind::Var {
            vars.extend(names);
        } else {
            lexicals.extend(names);
        }
        resolve_pattern(&mut d.id)?;
        if let Some(init) = d.init.as_mut() {
            resolve_expression(init)?;
        }
    }
    Ok(())
}

fn resolve_statement(
    stmt: &mut StatementType,
    vars: &mut Vec<String>,
    lexicals: &mut Vec<String>,
) -> Result<(), ScopeError> {
    match stmt {
        StatementType::ExpressionStatement { expression, .. } => resolve_expression(expression)?,
        StatementType::BlockStatement(b) => resolve_block(b, vars)?,
        StatementType::EmptyStatement { .. }
        | StatementType::DebuggerStatement { .. }
        | StatementType::BreakStatement { .. }
        | StatementType::ContinueStatement { .. } => {}
        StatementType::ReturnStatement { argument, .. } => {
            if let Some(a) = argument {
                resolve_expression(a)?;
            }
        }
        StatementType::ThrowStatement { argument, .. } => resolve_expression(argument)?,
        StatementType::IfStatement {
            test,
            consequent,
            alternate,
            ..
        } => {
            resolve_expression(test)?;
            resolve_statement(consequent, vars, lexicals)?;
            if let Some(a) = alternate {
                resolve_statement(a, vars, lexicals)?;
            }
        }
        StatementType::SwitchStatement {
            discriminant,
            cases,
            ..
        } => {
            resolve_expression(discriminant)?;
            for case in cases.iter_mut() {
                if let Some(t) = case.test.as_mut() {
                    resolve_expression(t)?;
                }
                resolve_statements(&mut case.consequent, vars, lexicals)?;
            }
        }
        StatementType::TryStatement {
            block,
            handler,
            finalizer,
            ..
        } => {
            resolve_block(block, vars)?;
            if let Some(h) = handler {
                if let Some(param) = h.param.as_mut() {
                    let names = bound_names_of_pattern(param)?;
                    h.body.locals.extend(names);
                    resolve_pattern(param)?;
                }
                resolve_block(&mut h.body, vars)?;
            }
            if let Some(f) = finalizer {
                resolve_block(f, vars)?;
            }
        }
        StatementType::WhileStatement { test, body, .. }
        | StatementType::DoWhileStatement { test, body, .. } => {
            resolve_expression(test)?;
            resolve_statement(body, vars, lexicals)?;
        }
        StatementType::ForStatement {
            init,
            test,
            update,
            body,
            ..
        } => {
            match init {
                Some(VariableDeclarationOrExpression::VariableDeclaration(v)) => {
                    resolve_variable_declaration(v, vars, lexicals)?
                }
                Some(VariableDeclarationOrExpression::Expression(e)) => resolve_expression(e)?,
                None => {}
            }
            if let Some(t) = test {
                resolve_expression(t)?;
            }
            if let Some(u) = update {
                resolve_expression(u)?;
            }
            resolve_statement(body, vars, lexicals)?;
        }
        StatementType::ForInStatement(f) | StatementType::ForOfStatement(f) => {
            match &mut f.left {
                VariableDeclarationOrPattern::VariableDeclaration(v) => {
                    resolve_variable_declaration(v, vars, lexicals)?
                }
                VariableDeclarationOrPattern::Pattern(p) => resolve_pattern(p)?,
            }
            resolve_expression(&mut f.right)?;
            resolve_statement(&mut f.body, vars, lexicals)?;
        }
        StatementType::Declaration(d) => match d {
            DeclarationType::VariableDeclaration(v) => {
                resolve_variable_declaration(v, vars, lexicals)?
            }
            DeclarationType::FunctionDeclaration(f) => {
                lexicals.extend(declared_name(&f.id));
                resolve_function(Rc::make_mut(f), false)?;
            }
            DeclarationType::ClassDeclaration(c) => {
                lexicals.extend(declared_name(&c.id));
                resolve_class(Rc::make_mut(c), false)?;
            }
            DeclarationType::ImportDeclaration(i) => {
                for s in i.specifiers.iter().filter(|s| !s.local.is_placeholder()) {
                    lexicals.push(s.local.name.to_string());
                }
            }
        },
    }
    Ok(())
}

fn resolve_function(f: &mut FunctionData, is_expression: bool) -> Result<(), ScopeError> {
    let mut vars = vec![];
    let mut lexicals = vec![];
    if is_expression {
        vars.extend(declared_name(&f.id));
    }
    for p in f.params.iter_mut() {
        vars.extend(bound_names_of_pattern(p)?);
        resolve_pattern(p)?;
    }
    match &mut f.body {
        FunctionBodyOrExpression::FunctionBody(b) => {
            resolve_statements(&mut b.body, &mut vars, &mut lexicals)?
        }
        FunctionBodyOrExpression::Expression(e) => resolve_expression(e)?,
    }
    f.locals.extend(vars);
    f.locals.extend(lexicals);
    Ok(())
}

fn resolve_class(c: &mut ClassData, is_expression: bool) -> Result<(), ScopeError> {
    if is_expression {
        c.locals.extend(declared_name(&c.id));
    }
    if let Some(s) = c.super_class.as_mut() {
        resolve_expression(s)?;
    }
    for member in c.body.iter_mut() {
        match member {
            ClassMember::Method(m) => {
                resolve_key(&mut m.key)?;
                resolve_function(Rc::make_mut(&mut m.value), false)?;
            }
            ClassMember::Field(f) => {
                resolve_key(&mut f.key)?;
                if let Some(v) = f.value.as_mut() {
                    resolve_expression(v)?;
                }
            }
        }
    }
    Ok(())
}

fn resolve_key(key: &mut PropertyKey) -> Result<(), ScopeError> {
    if let PropertyKey::Computed(e) = key {
        resolve_expression(e)?;
    }
    Ok(())
}

fn resolve_member(m: &mut MemberExpressionType) -> Result<(), ScopeError> {
    match m {
        MemberExpressionType::SimpleMemberExpression { object, .. } => resolve_callee(object),
        MemberExpressionType::ComputedMemberExpression {
            object, property, ..
        } => {
            resolve_callee(object)?;
            resolve_expression(property)
        }
    }
}

fn resolve_callee(callee: &mut ExpressionOrSuper) -> Result<(), ScopeError> {
    match callee {
        ExpressionOrSuper::Expression(e) => resolve_expression(e),
        ExpressionOrSuper::Super(_) => Ok(()),
    }
}

fn resolve_argument(argument: &mut ExpressionOrSpreadElement) -> Result<(), ScopeError> {
    match argument {
        ExpressionOrSpreadElement::Expression(e) | ExpressionOrSpreadElement::SpreadElement(e) => {
            resolve_expression(e)
        }
    }
}

/// Patterns bind nothing by themselves here; this reaches the functions
/// nested in default values and computed keys.
fn resolve_pattern(p: &mut PatternType) -> Result<(), ScopeError> {
    match p {
        PatternType::PatternWhichCanBeExpression(ExpressionPatternType::Identifier(_)) => {}
        PatternType::PatternWhichCanBeExpression(ExpressionPatternType::MemberExpression(m)) => {
            resolve_member(m)?
        }
        PatternType::ObjectPattern { properties, .. } => {
            for property in properties.iter_mut() {
                match property {
                    ObjectPatternProperty::Property { key, value, .. } => {
                        resolve_key(key)?;
                        resolve_pattern(value)?;
                    }
                    ObjectPatternProperty::Rest(r) => resolve_pattern(r)?,
                }
            }
        }
        PatternType::ArrayPattern { elements, .. } => {
            for e in elements.iter_mut().flatten() {
                resolve_pattern(e)?;
            }
        }
        PatternType::RestElement { argument, .. } => resolve_pattern(argument)?,
        PatternType::AssignmentPattern { left, right, .. } => {
            resolve_pattern(left)?;
            resolve_expression(right)?;
        }
    }
    Ok(())
}

fn resolve_expression(e: &mut ExpressionType) -> Result<(), ScopeError> {
    match e {
        ExpressionType::Identifier(_)
        | ExpressionType::Literal(_)
        | ExpressionType::ThisExpression { .. } => {}
        ExpressionType::TemplateLiteral(t) => {
            for e in t.expressions.iter_mut() {
                resolve_expression(e)?;
            }
        }
        ExpressionType::ArrayExpression { elements, .. } => {
            for element in elements.iter_mut().flatten() {
                resolve_argument(element)?;
            }
        }
        ExpressionType::ObjectExpression { properties, .. } => {
            for p in properties.iter_mut() {
                match p {
                    ObjectProperty::Property(d) => {
                        resolve_key(&mut d.key)?;
                        resolve_expression(&mut d.value)?;
                    }
                    ObjectProperty::Spread(e) => resolve_expression(e)?,
                }
            }
        }
        ExpressionType::FunctionExpression(f) => resolve_function(Rc::make_mut(f), true)?,
        ExpressionType::ArrowFunctionExpression(f) => resolve_function(Rc::make_mut(f), false)?,
        ExpressionType::ClassExpression(c) => resolve_class(Rc::make_mut(c), true)?,
        ExpressionType::UnaryExpression { argument, .. }
        | ExpressionType::UpdateExpression { argument, .. }
        | ExpressionType::AwaitExpression { argument, .. } => resolve_expression(argument)?,
        ExpressionType::BinaryExpression { left, right, .. }
        | ExpressionType::LogicalExpression { left, right, .. } => {
            resolve_expression(left)?;
            resolve_expression(right)?;
        }
        ExpressionType::AssignmentExpression { left, right, .. } => {
            resolve_pattern(left)?;
            resolve_expression(right)?;
        }
        ExpressionType::ConditionalExpression {
            test,
            consequent,
            alternate,
            ..
        } => {
            resolve_expression(test)?;
            resolve_expression(consequent)?;
            resolve_expression(alternate)?;
        }
        ExpressionType::SequenceExpression { expressions, .. } => {
            for e in expressions.iter_mut() {
                resolve_expression(e)?;
            }
        }
        ExpressionType::CallExpression {
            callee, arguments, ..
        } => {
            resolve_callee(callee)?;
            for a in arguments.iter_mut() {
                resolve_argument(a)?;
            }
        }
        ExpressionType::NewExpression {
            callee, arguments, ..
        } => {
            resolve_expression(callee)?;
            for a in arguments.iter_mut() {
                resolve_argument(a)?;
            }
        }
        ExpressionType::MemberExpression(m) => resolve_member(m)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{JsParser, ScriptParser};

    fn resolved(source: &str) -> ProgramData {
        let mut program = JsParser::new().parse_strict(source).unwrap();
        resolve_scopes(&mut program).unwrap();
        program
    }

    fn names(locals: &Locals) -> Vec<&str> {
        locals.iter().map(|s| s.as_str()).collect()
    }

    #[test]
    fn test_var_hoists_out_of_blocks() {
        let program = resolved("{ var a = 1; let b = 2; }");
        assert_eq!(names(&program.locals), vec!["a"]);
        match &program.body[0] {
            StatementType::BlockStatement(b) => assert_eq!(names(&b.locals), vec!["b"]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_catch_parameter_binds_in_catch_body() {
        let program = resolved("try {} catch ({ message }) { let x }");
        assert!(program.locals.is_empty());
        match &program.body[0] {
            StatementType::TryStatement {
                handler: Some(h), ..
            } => assert_eq!(names(&h.body.locals), vec!["message", "x"]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_member_target_in_declaration_is_rejected() {
        let target = MemberExpressionType::SimpleMemberExpression {
            meta: Meta::new(4, 7),
            object: ExpressionOrSuper::Expression(Box::new(ExpressionType::Identifier(
                IdentifierData {
                    name: "a".to_string(),
                    meta: Meta::new(4, 5),
                },
            ))),
            property: IdentifierData {
                name: "b".to_string(),
                meta: Meta::new(6, 7),
            },
            optional: false,
        };
        let declaration = VariableDeclarationData {
            meta: Meta::new(0, 7),
            declarations: vec![VariableDeclaratorData {
                meta: Meta::new(4, 7),
                id: Box::new(PatternType::PatternWhichCanBeExpression(
                    ExpressionPatternType::MemberExpression(target),
                )),
                init: None,
            }],
            kind: VariableDeclarationKind::Let,
        };
        let mut program = ProgramData {
            meta: Meta::new(0, 7),
            body: vec![StatementType::Declaration(
                DeclarationType::VariableDeclaration(declaration),
            )],
            locals: Locals::new(),
        };
        assert_eq!(
            resolve_scopes(&mut program),
            Err(ScopeError::InvalidBindingTarget(4))
        );
    }
}
