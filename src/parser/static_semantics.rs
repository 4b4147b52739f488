use thiserror::Error;

use crate::parser::ast::{
    DeclarationType, ExpressionPatternType, HasMeta, ObjectPatternProperty, PatternType,
    StatementType, VariableDeclarationData, VariableDeclarationKind,
    VariableDeclarationOrExpression, VariableDeclarationOrPattern,
};

/// Raised when a declaration binds something that is not a name.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScopeError {
    #[error("Invalid binding target at offset {0}")]
    InvalidBindingTarget(usize),
}

/// Names bound by a declaration pattern. Placeholder identifiers from a
/// tolerant parse bind nothing.
pub fn bound_names_of_pattern(pattern: &PatternType) -> Result<Vec<String>, ScopeError> {
    let mut bound_names = vec![];
    collect_bound_names(pattern, &mut bound_names)?;
    Ok(bound_names)
}

fn collect_bound_names(pattern: &PatternType, out: &mut Vec<String>) -> Result<(), ScopeError> {
    match pattern {
        PatternType::PatternWhichCanBeExpression(e) => match e {
            ExpressionPatternType::Identifier(i) => {
                if !i.is_placeholder() {
                    out.push(i.name.to_string());
                }
            }
            ExpressionPatternType::MemberExpression(m) => {
                return Err(ScopeError::InvalidBindingTarget(m.get_meta().start_index));
            }
        },
        PatternType::ObjectPattern { properties, .. } => {
            for p in properties {
                match p {
                    ObjectPatternProperty::Property { value, .. } => {
                        collect_bound_names(value, out)?
                    }
                    ObjectPatternProperty::Rest(argument) => collect_bound_names(argument, out)?,
                }
            }
        }
        PatternType::ArrayPattern { elements, .. } => {
            for p in elements.iter().flatten() {
                collect_bound_names(p, out)?;
            }
        }
        PatternType::RestElement { argument, .. } => collect_bound_names(argument, out)?,
        PatternType::AssignmentPattern { left, .. } => collect_bound_names(left, out)?,
    }
    Ok(())
}

pub fn bound_names_of_variable_declaration(
    v: &VariableDeclarationData,
) -> Result<Vec<String>, ScopeError> {
    let mut bound_names = vec![];
    for d in &v.declarations {
        collect_bound_names(&d.id, &mut bound_names)?;
    }
    Ok(bound_names)
}

/// `var` names declared anywhere in `body` without crossing a function
/// boundary. These are hoisted to the enclosing function or program.
pub fn var_declared_names(body: &[StatementType]) -> Result<Vec<String>, ScopeError> {
    let mut names = vec![];
    for stmt in body {
        collect_var_names(stmt, &mut names)?;
    }
    Ok(names)
}

fn collect_var_declaration(
    v: &VariableDeclarationData,
    out: &mut Vec<String>,
) -> Result<(), ScopeError> {
    if v.kind == VariableDeclarationKind::Var {
        out.append(&mut bound_names_of_variable_declaration(v)?);
    }
    Ok(())
}

fn collect_var_names(stmt: &StatementType, out: &mut Vec<String>) -> Result<(), ScopeError> {
    match stmt {
        StatementType::Declaration(DeclarationType::VariableDeclaration(v)) => {
            collect_var_declaration(v, out)?
        }
        StatementType::BlockStatement(b) => {
            for s in &b.body {
                collect_var_names(s, out)?;
            }
        }
        StatementType::IfStatement {
            consequent,
            alternate,
            ..
        } => {
            collect_var_names(consequent, out)?;
            if let Some(a) = alternate {
                collect_var_names(a, out)?;
            }
        }
        StatementType::WhileStatement { body, .. } | StatementType::DoWhileStatement { body, .. } => {
            collect_var_names(body, out)?
        }
        StatementType::ForStatement { init, body, .. } => {
            if let Some(VariableDeclarationOrExpression::VariableDeclaration(v)) = init {
                collect_var_declaration(v, out)?;
            }
            collect_var_names(body, out)?;
        }
        StatementType::ForInStatement(f) | StatementType::ForOfStatement(f) => {
            if let VariableDeclarationOrPattern::VariableDeclaration(v) = &f.left {
                collect_var_declaration(v, out)?;
            }
            collect_var_names(&f.body, out)?;
        }
        StatementType::TryStatement {
            block,
            handler,
            finalizer,
            ..
        } => {
            for s in &block.body {
                collect_var_names(s, out)?;
            }
            if let Some(h) = handler {
                for s in &h.body.body {
                    collect_var_names(s, out)?;
                }
            }
            if let Some(f) = finalizer {
                for s in &f.body {
                    collect_var_names(s, out)?;
                }
            }
        }
        StatementType::SwitchStatement { cases, .. } => {
            for c in cases {
                for s in &c.consequent {
                    collect_var_names(s, out)?;
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// Names declared directly in a statement list by `let`, `const`, `class`,
/// function declarations and imports.
pub fn lexically_declared_names(body: &[StatementType]) -> Result<Vec<String>, ScopeError> {
    let mut names = vec![];
    for stmt in body {
        if let StatementType::Declaration(d) = stmt {
            match d {
                DeclarationType::VariableDeclaration(v) => {
                    if v.kind != VariableDeclarationKind::Var {
                        names.append(&mut bound_names_of_variable_declaration(v)?);
                    }
                }
                DeclarationType::FunctionDeclaration(f) => {
                    if let Some(id) = f.id.as_ref().filter(|id| !id.is_placeholder()) {
                        names.push(id.name.to_string());
                    }
                }
                DeclarationType::ClassDeclaration(c) => {
                    if let Some(id) = c.id.as_ref().filter(|id| !id.is_placeholder()) {
                        names.push(id.name.to_string());
                    }
                }
                DeclarationType::ImportDeclaration(i) => {
                    for s in i.specifiers.iter().filter(|s| !s.local.is_placeholder()) {
                        names.push(s.local.name.to_string());
                    }
                }
            }
        }
    }
    Ok(names)
}
