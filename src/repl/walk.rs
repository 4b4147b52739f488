//! Finds where in a half-typed command completion applies.
//!
//! The walk starts at the last top-level statement of a tolerant parse and
//! follows the clause that is still open, one node at a time:
//!
//! ```text
//! let total = items.length + Ma
//! VariableDeclaration -> Declarator -> BinaryExpression (right) -> Identifier "Ma"
//! ```
//!
//! It lands on an identifier, on a member expression, or on a bare position
//! tagged with a [`CompletionContext`].

use tracing::trace;

use crate::parser::ast::*;
use crate::parser::visit::NodeRef;
use crate::repl::keywords::EMPTY_BLOCK_KEYWORDS;

/// Which candidates a position admits besides prefix filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionContext {
    /// Any name or keyword.
    Any,
    /// A position where completion makes no sense, such as a new binding name.
    None,
    /// Right after `new`: names only.
    NewExpressionCallee,
    /// Inside a `switch` body where a `case` or `default` label may start.
    SwitchCaseLabel,
}

#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// `expression` is the `Identifier` node holding `id`.
    Identifier {
        expression: &'a ExpressionType,
        id: &'a IdentifierData,
    },
    Member(&'a MemberExpressionType),
    /// No identifier is being typed at this node.
    Position(NodeRef<'a>),
}

#[derive(Debug, Clone)]
pub struct Landing<'a> {
    pub target: Target<'a>,
    pub context: CompletionContext,
    /// Keywords allowed here. `None` leaves the choice to the context.
    pub keywords: Option<Vec<&'static str>>,
}

enum Step<'a> {
    Into(NodeRef<'a>),
    IntoWith(NodeRef<'a>, CompletionContext, Option<Vec<&'static str>>),
    Land(Target<'a>),
    Halt(CompletionContext, Option<Vec<&'static str>>),
}

/// Walks from `statement` towards the end of `source`.
pub fn walk<'a>(statement: &'a StatementType, source: &str) -> Landing<'a> {
    let mut node = NodeRef::Statement(statement);
    let mut context = CompletionContext::Any;
    let mut keywords = None;
    loop {
        trace!(?context, meta = ?node.meta(), "completion walk");
        match step(node, source) {
            Step::Into(next) => node = next,
            Step::IntoWith(next, c, k) => {
                node = next;
                context = c;
                keywords = k;
            }
            Step::Land(target) => {
                return Landing {
                    target,
                    context,
                    keywords,
                }
            }
            Step::Halt(c, k) => {
                return Landing {
                    target: Target::Position(node),
                    context: c,
                    keywords: k,
                }
            }
        }
    }
}

fn any<'a>() -> Step<'a> {
    Step::Halt(CompletionContext::Any, None)
}

fn nothing<'a>() -> Step<'a> {
    Step::Halt(CompletionContext::None, None)
}

fn empty_block<'a>() -> Step<'a> {
    Step::Halt(CompletionContext::Any, Some(EMPTY_BLOCK_KEYWORDS.clone()))
}

fn is_empty_statement(s: &StatementType) -> bool {
    matches!(s, StatementType::EmptyStatement { .. })
}

/// A bracketed node whose closer was typed ends past its last child.
fn is_closed(meta: Meta, last_child: &dyn HasMeta) -> bool {
    meta.end_index > last_child.get_meta().end_index
}

fn step<'a>(node: NodeRef<'a>, source: &str) -> Step<'a> {
    match node {
        NodeRef::Statement(s) => statement_step(s),
        NodeRef::Expression(e) => expression_step(e),
        NodeRef::Block(b) => block_step(&b.body),
        NodeRef::Function(f) => match &f.body {
            FunctionBodyOrExpression::FunctionBody(b) if b.meta.end_index <= b.meta.start_index => {
                nothing()
            }
            FunctionBodyOrExpression::FunctionBody(b) => block_step(&b.body),
            FunctionBodyOrExpression::Expression(e) => Step::Into(NodeRef::Expression(e)),
        },
        NodeRef::Class(c) => match c.body.last() {
            Some(ClassMember::Method(m)) => Step::Into(NodeRef::Function(&m.value)),
            Some(ClassMember::Field(FieldDefinitionData { value: Some(v), .. })) => {
                Step::Into(NodeRef::Expression(v))
            }
            Some(ClassMember::Field(_)) => nothing(),
            None => match &c.super_class {
                Some(s) if s.get_meta().end_index == c.meta.end_index => {
                    Step::Into(NodeRef::Expression(s))
                }
                _ => nothing(),
            },
        },
        NodeRef::SwitchCase(case) => switch_case_step(case, source),
        NodeRef::CatchClause(h) => Step::Into(NodeRef::Block(&h.body)),
        NodeRef::VariableDeclaration(v) => match v.declarations.last() {
            Some(d) => Step::Into(NodeRef::Declarator(d)),
            None => nothing(),
        },
        NodeRef::Declarator(d) => match &d.init {
            Some(init) if d.id.get_meta().end_index < d.meta.end_index => {
                Step::Into(NodeRef::Expression(init))
            }
            _ => nothing(),
        },
        NodeRef::Pattern(_) | NodeRef::Program(_) => nothing(),
    }
}

fn block_step(body: &[StatementType]) -> Step<'_> {
    match body.last() {
        Some(s) => Step::Into(NodeRef::Statement(s)),
        None => empty_block(),
    }
}

fn statement_step<'a>(s: &'a StatementType) -> Step<'a> {
    match s {
        StatementType::ExpressionStatement { expression, .. } => {
            Step::Into(NodeRef::Expression(expression))
        }
        StatementType::BlockStatement(b) => block_step(&b.body),
        StatementType::EmptyStatement { .. } => any(),
        StatementType::DebuggerStatement { .. }
        | StatementType::BreakStatement { .. }
        | StatementType::ContinueStatement { .. } => nothing(),
        StatementType::ReturnStatement { argument, .. } => match argument {
            Some(a) => Step::Into(NodeRef::Expression(a)),
            None => any(),
        },
        StatementType::ThrowStatement { argument, .. } => Step::Into(NodeRef::Expression(argument)),
        StatementType::IfStatement {
            test,
            consequent,
            alternate,
            ..
        } => match alternate {
            Some(a) => Step::Into(NodeRef::Statement(a)),
            None if !is_empty_statement(consequent) => Step::Into(NodeRef::Statement(consequent)),
            None => Step::Into(NodeRef::Expression(test)),
        },
        StatementType::SwitchStatement {
            meta,
            discriminant,
            cases,
        } => match cases.last() {
            Some(case) => Step::Into(NodeRef::SwitchCase(case)),
            None if discriminant.get_meta().end_index == meta.end_index => {
                Step::Into(NodeRef::Expression(discriminant))
            }
            None => Step::Halt(
                CompletionContext::SwitchCaseLabel,
                Some(vec!["case", "default"]),
            ),
        },
        StatementType::TryStatement {
            block,
            handler,
            finalizer,
            ..
        } => match (handler, finalizer) {
            (_, Some(f)) => Step::Into(NodeRef::Block(f)),
            (Some(h), None) => Step::Into(NodeRef::CatchClause(h)),
            (None, None) => Step::Into(NodeRef::Block(block)),
        },
        StatementType::WhileStatement { test, body, .. } => {
            if is_empty_statement(body) {
                Step::Into(NodeRef::Expression(test))
            } else {
                Step::Into(NodeRef::Statement(body))
            }
        }
        StatementType::DoWhileStatement { meta, body, test } => {
            if body.get_meta().end_index == meta.end_index {
                Step::Into(NodeRef::Statement(body))
            } else {
                Step::Into(NodeRef::Expression(test))
            }
        }
        StatementType::ForStatement {
            init,
            test,
            update,
            body,
            ..
        } => {
            if !is_empty_statement(body) {
                return Step::Into(NodeRef::Statement(body));
            }
            if let Some(u) = update {
                return Step::Into(NodeRef::Expression(u));
            }
            if let Some(t) = test {
                return Step::Into(NodeRef::Expression(t));
            }
            let loop_keywords = Some(vec!["let", "var"]);
            match init {
                Some(VariableDeclarationOrExpression::VariableDeclaration(v)) => {
                    Step::Into(NodeRef::VariableDeclaration(v))
                }
                Some(VariableDeclarationOrExpression::Expression(e)) => {
                    Step::IntoWith(NodeRef::Expression(e), CompletionContext::Any, loop_keywords)
                }
                None => Step::Halt(CompletionContext::Any, loop_keywords),
            }
        }
        StatementType::ForInStatement(f) | StatementType::ForOfStatement(f) => {
            if is_empty_statement(&f.body) {
                Step::Into(NodeRef::Expression(&f.right))
            } else {
                Step::Into(NodeRef::Statement(&f.body))
            }
        }
        StatementType::Declaration(d) => match d {
            DeclarationType::VariableDeclaration(v) => Step::Into(NodeRef::VariableDeclaration(v)),
            DeclarationType::FunctionDeclaration(f) => Step::Into(NodeRef::Function(f)),
            DeclarationType::ClassDeclaration(c) => Step::Into(NodeRef::Class(c)),
            DeclarationType::ImportDeclaration(_) => nothing(),
        },
    }
}

fn switch_case_step<'a>(case: &'a SwitchCaseData, source: &str) -> Step<'a> {
    // A tolerant parse keeps a half-typed label as a case with no `case` or
    // `default` keyword in front.
    let labelled = case.test.is_some()
        || source
            .get(case.meta.start_index..)
            .map_or(false, |rest| rest.starts_with("default"));
    match (case.consequent.as_slice(), &case.test) {
        ([only], _) if !labelled => Step::IntoWith(
            NodeRef::Statement(only),
            CompletionContext::SwitchCaseLabel,
            None,
        ),
        ([.., last], _) => Step::Into(NodeRef::Statement(last)),
        ([], Some(test)) if test.get_meta().end_index == case.meta.end_index => {
            Step::Into(NodeRef::Expression(test))
        }
        ([], _) => any(),
    }
}

fn expression_step(e: &ExpressionType) -> Step<'_> {
    match e {
        ExpressionType::Identifier(id) => Step::Land(Target::Identifier { expression: e, id }),
        ExpressionType::MemberExpression(m) => match m {
            MemberExpressionType::ComputedMemberExpression { meta, property, .. }
                if !matches!(**property, ExpressionType::Literal(_)) =>
            {
                if is_closed(*meta, &**property) {
                    nothing()
                } else {
                    Step::Into(NodeRef::Expression(property))
                }
            }
            _ => Step::Land(Target::Member(m)),
        },
        ExpressionType::Literal(_) | ExpressionType::ThisExpression { .. } => nothing(),
        ExpressionType::TemplateLiteral(t) => match t.expressions.last() {
            Some(last) if !is_closed(t.meta, last) => Step::Into(NodeRef::Expression(last)),
            _ => nothing(),
        },
        ExpressionType::ArrayExpression { meta, elements } => match elements.last() {
            None => any(),
            Some(Some(last)) if !is_closed(*meta, last.expression()) => {
                Step::Into(NodeRef::Expression(last.expression()))
            }
            Some(Some(_)) => nothing(),
            Some(None) => any(),
        },
        ExpressionType::ObjectExpression { meta, properties } => match properties.last() {
            Some(ObjectProperty::Property(p)) if !is_closed(*meta, &*p.value) => {
                if p.method {
                    match &*p.value {
                        ExpressionType::FunctionExpression(f) => Step::Into(NodeRef::Function(f)),
                        other => Step::Into(NodeRef::Expression(other)),
                    }
                } else {
                    Step::Into(NodeRef::Expression(&p.value))
                }
            }
            Some(ObjectProperty::Spread(s)) if !is_closed(*meta, &**s) => {
                Step::Into(NodeRef::Expression(s))
            }
            _ => nothing(),
        },
        ExpressionType::FunctionExpression(f) | ExpressionType::ArrowFunctionExpression(f) => {
            Step::Into(NodeRef::Function(f))
        }
        ExpressionType::ClassExpression(c) => Step::Into(NodeRef::Class(c)),
        ExpressionType::UnaryExpression { argument, .. }
        | ExpressionType::UpdateExpression { argument, .. }
        | ExpressionType::AwaitExpression { argument, .. } => {
            Step::Into(NodeRef::Expression(argument))
        }
        ExpressionType::BinaryExpression { right, .. }
        | ExpressionType::LogicalExpression { right, .. }
        | ExpressionType::AssignmentExpression { right, .. } => {
            Step::Into(NodeRef::Expression(right))
        }
        ExpressionType::ConditionalExpression {
            meta,
            consequent,
            alternate,
            ..
        } => {
            if consequent.get_meta().end_index == meta.end_index {
                Step::Into(NodeRef::Expression(consequent))
            } else {
                Step::Into(NodeRef::Expression(alternate))
            }
        }
        ExpressionType::SequenceExpression { expressions, .. } => match expressions.last() {
            Some(last) => Step::Into(NodeRef::Expression(last)),
            None => any(),
        },
        ExpressionType::CallExpression {
            meta, arguments, ..
        } => match arguments.last() {
            Some(last) if !is_closed(*meta, last.expression()) => {
                Step::Into(NodeRef::Expression(last.expression()))
            }
            Some(_) => nothing(),
            // `f(` has no argument yet; `f()` is finished.
            None if source_closed_call(e) => nothing(),
            None => any(),
        },
        ExpressionType::NewExpression {
            meta,
            callee,
            arguments,
        } => {
            if callee.get_meta().end_index == meta.end_index {
                return Step::IntoWith(
                    NodeRef::Expression(callee),
                    CompletionContext::NewExpressionCallee,
                    None,
                );
            }
            match arguments.last() {
                Some(last) if !is_closed(*meta, last.expression()) => {
                    Step::Into(NodeRef::Expression(last.expression()))
                }
                _ => any(),
            }
        }
    }
}

/// `f()` ends two characters after its callee, `f(` only one.
fn source_closed_call(e: &ExpressionType) -> bool {
    match e {
        ExpressionType::CallExpression { meta, callee, .. } => {
            meta.end_index >= callee.get_meta().end_index + 2
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{JsParser, ScriptParser};

    fn landing_of(source: &str, f: impl FnOnce(&Landing<'_>)) {
        let program = JsParser::new().parse_tolerant(source);
        let last = program.body.last().unwrap();
        f(&walk(last, source));
    }

    fn identifier_name(landing: &Landing<'_>) -> Option<String> {
        match landing.target {
            Target::Identifier { id, .. } => Some(id.name.to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_descends_into_open_clause() {
        landing_of("let total = count + Ma", |l| {
            assert_eq!(identifier_name(l).as_deref(), Some("Ma"));
            assert_eq!(l.context, CompletionContext::Any);
        });
        landing_of("if (ready) { log(x, pre", |l| {
            assert_eq!(identifier_name(l).as_deref(), Some("pre"));
        });
    }

    #[test]
    fn test_new_callee_context() {
        landing_of("new Ma", |l| {
            assert_eq!(identifier_name(l).as_deref(), Some("Ma"));
            assert_eq!(l.context, CompletionContext::NewExpressionCallee);
        });
    }

    #[test]
    fn test_binding_name_is_not_completed() {
        landing_of("let tot", |l| {
            assert_eq!(l.context, CompletionContext::None);
        });
    }

    #[test]
    fn test_member_target() {
        landing_of("Math.fl", |l| {
            assert!(matches!(l.target, Target::Member(_)));
        });
    }
}
