//! Completion candidates for a partially typed command.

use std::collections::BTreeSet;
use std::time::Duration;

use tracing::{debug, trace};

use crate::parser::ast::*;
use crate::parser::visit::NodeRef;
use crate::parser::ScriptParser;
use crate::repl::keywords::{switch_label_keyword, RESERVED_KEYWORDS};
use crate::repl::scope::{local_scope_of, resolve_scopes};
use crate::repl::walk::{walk, CompletionContext, Landing, Target};
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::types::EvalContext;

/// Sorted, deduplicated candidates and the typed text they would replace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completions {
    pub candidates: Vec<String>,
    pub filter: String,
}

impl Completions {
    fn filtered(names: BTreeSet<String>, filter: &str) -> Self {
        Completions {
            candidates: names
                .into_iter()
                .filter(|n| n.starts_with(filter))
                .collect(),
            filter: filter.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Completes `text` at byte offset `cursor`.
///
/// Evaluating the object of a member path is the only access to `ctx` that
/// goes beyond reading bindings. It runs read-only and is bounded by `timeout`;
/// any error it raises means no candidates.
pub fn complete(
    text: &str,
    cursor: usize,
    ctx: &mut EvalContext,
    parser: &dyn ScriptParser,
    timeout: Duration,
) -> Completions {
    let mut cursor = cursor.min(text.len());
    while !text.is_char_boundary(cursor) {
        cursor -= 1;
    }
    let text = &text[..cursor];
    let mut program = parser.parse_tolerant(text);
    if let Err(e) = resolve_scopes(&mut program) {
        debug!(error = %e, "scope resolution failed during completion");
        return Completions::default();
    }
    if text.trim().is_empty() {
        return everything(&program.locals, ctx);
    }
    let last = match program.body.last() {
        Some(last) => last,
        None => return everything(&program.locals, ctx),
    };
    let end = last.get_meta().end_index.min(text.len());
    if end < text.len()
        && text[end..]
            .chars()
            .all(|c| c.is_whitespace() || c == ';')
    {
        return everything(&program.locals, ctx);
    }
    let landing = walk(last, text);
    trace!(target = ?landing.target, context = ?landing.context, "completion landing");
    match landing.target {
        Target::Identifier { expression, id } => {
            let locals = local_scope_of(&program, &NodeRef::Expression(expression));
            let filter = if id.is_placeholder() { "" } else { id.name.as_str() };
            names_in_scope(&landing, locals, filter, ctx)
        }
        Target::Position(node) => {
            let mut locals = local_scope_of(&program, &node);
            if let Some(own) = node.locals() {
                locals.extend(own.iter().cloned());
            }
            names_in_scope(&landing, locals, "", ctx)
        }
        Target::Member(member) => complete_member(member, text, ctx, timeout),
    }
}

fn global_names(ctx: &EvalContext) -> BTreeSet<String> {
    ctx.global_names().into_iter().collect()
}

/// Every global, keyword and top-level local, unfiltered.
fn everything(locals: &Locals, ctx: &EvalContext) -> Completions {
    let mut names = global_names(ctx);
    names.extend(RESERVED_KEYWORDS.iter().map(|k| k.to_string()));
    names.extend(locals.iter().cloned());
    Completions::filtered(names, "")
}

fn names_in_scope(
    landing: &Landing<'_>,
    locals: Locals,
    filter: &str,
    ctx: &EvalContext,
) -> Completions {
    let keywords: Vec<&'static str> = match (landing.context, &landing.keywords) {
        (CompletionContext::None, _) => return Completions::default(),
        (_, Some(keywords)) => keywords.clone(),
        (CompletionContext::Any, None) => RESERVED_KEYWORDS.iter().copied().collect(),
        (CompletionContext::NewExpressionCallee, None) => vec![],
        (CompletionContext::SwitchCaseLabel, None) => {
            switch_label_keyword(filter).into_iter().collect()
        }
    };
    let mut names = global_names(ctx);
    names.extend(locals);
    names.extend(keywords.into_iter().map(str::to_string));
    Completions::filtered(names, filter)
}

/// The typed part of the property: a name, or a string or number literal in
/// brackets.
fn property_filter(member: &MemberExpressionType) -> Option<String> {
    match member {
        MemberExpressionType::SimpleMemberExpression { property, .. } => {
            if property.is_placeholder() {
                Some(String::new())
            } else {
                Some(property.name.to_string())
            }
        }
        MemberExpressionType::ComputedMemberExpression { property, .. } => match &**property {
            ExpressionType::Literal(LiteralData {
                value: LiteralType::StringLiteral(s),
                ..
            }) => Some(s.to_string()),
            ExpressionType::Literal(LiteralData {
                value: LiteralType::NumberLiteral(n),
                ..
            }) => Some(match n {
                NumberLiteralType::IntegerLiteral(i) => i.to_string(),
                NumberLiteralType::FloatLiteral(f) => f.to_string(),
            }),
            _ => None,
        },
    }
}

fn complete_member(
    member: &MemberExpressionType,
    text: &str,
    ctx: &mut EvalContext,
    timeout: Duration,
) -> Completions {
    let filter = match property_filter(member) {
        Some(f) => f,
        None => return Completions::default(),
    };
    let object = match member.object() {
        ExpressionOrSuper::Expression(o) => o,
        ExpressionOrSuper::Super(_) => return Completions::default(),
    };
    let value = match &**object {
        // The binding depends on how the function is called.
        ExpressionType::ThisExpression { .. } => return Completions::default(),
        ExpressionType::Identifier(id) => match ctx.lookup_global(&id.name) {
            Some(v) => v,
            None => return Completions::default(),
        },
        other => {
            let meta = other.get_meta();
            let source = match text.get(meta.start_index..meta.end_index) {
                Some(s) => s,
                None => return Completions::default(),
            };
            // A leading `{` would otherwise open a block.
            let source = format!("({})", source);
            match ctx.evaluate_read_only(&source, timeout) {
                Ok(v) => v,
                Err(e) => {
                    debug!(%source, error = %e, "member path not completed");
                    return Completions::default();
                }
            }
        }
    };
    if matches!(value, JsValue::Undefined | JsValue::Null) {
        return Completions::default();
    }
    let names: BTreeSet<String> = ctx.property_names(&value).into_iter().collect();
    Completions::filtered(names, &filter)
}
