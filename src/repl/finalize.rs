//! Transforms applied to a command once it parses.

use tracing::debug;

use crate::parser::ast::*;
use crate::parser::lexer::tokenize;
use crate::parser::static_semantics::bound_names_of_variable_declaration;
use crate::parser::visit::NodeRef;
use crate::repl::error::ShellError;

/// A command that parsed and is ready to compile.
#[derive(Debug)]
pub struct Finalized {
    pub source: String,
    pub program: ProgramData,
    /// The command ends with a `;`, so its value is not echoed.
    pub is_silent: bool,
    /// The command awaits at top level and completes through a handle.
    pub is_async: bool,
}

impl Finalized {
    /// A command with nothing to run: whitespace or comments only.
    pub fn empty(source: String) -> Self {
        let end = source.len();
        Finalized {
            source,
            program: ProgramData {
                meta: Meta::new(0, end),
                body: vec![],
                locals: Locals::new(),
            },
            is_silent: true,
            is_async: false,
        }
    }
}

pub fn finalize(source: String, mut program: ProgramData) -> Result<Finalized, ShellError> {
    let is_silent = ends_with_semicolon(&source);
    let root = NodeRef::Program(&program);
    let returns = contains_outside_functions(root, &|n| {
        matches!(n, NodeRef::Statement(StatementType::ReturnStatement { .. }))
    });
    if returns {
        return Err(ShellError::Compile("Illegal return statement".to_string()));
    }
    let is_async = contains_outside_functions(root, &|n| {
        matches!(n, NodeRef::Expression(ExpressionType::AwaitExpression { .. }))
    });
    if is_async {
        debug!("command awaits at top level");
    } else if let Some(name) = trailing_declared_name(&program) {
        debug!(%name, "echoing trailing declaration");
        let end = program.meta.end_index;
        program.body.push(StatementType::ExpressionStatement {
            meta: Meta::new(end, end),
            expression: Box::new(ExpressionType::Identifier(IdentifierData {
                name,
                meta: Meta::new(end, end),
            })),
        });
    }
    Ok(Finalized {
        source,
        program,
        is_silent,
        is_async,
    })
}

/// The last token, comments aside, is a `;`.
fn ends_with_semicolon(source: &str) -> bool {
    tokenize(source)
        .iter()
        .rev()
        .find(|t| !t.is_eof())
        .map_or(false, |t| t.is_punctuator(";"))
}

fn contains_outside_functions(node: NodeRef<'_>, found: &dyn Fn(&NodeRef<'_>) -> bool) -> bool {
    if found(&node) {
        return true;
    }
    node.children()
        .into_iter()
        .filter(|c| !matches!(c, NodeRef::Function(_)))
        .any(|c| contains_outside_functions(c, found))
}

/// Last name bound by a trailing `var`/`let`/`const` or function declaration.
fn trailing_declared_name(program: &ProgramData) -> Option<String> {
    match program.body.last()? {
        StatementType::Declaration(DeclarationType::VariableDeclaration(v)) => {
            bound_names_of_variable_declaration(v).ok()?.pop()
        }
        StatementType::Declaration(DeclarationType::FunctionDeclaration(f)) => f
            .id
            .as_ref()
            .filter(|id| !id.is_placeholder())
            .map(|id| id.name.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{JsParser, ScriptParser};

    fn finalized(source: &str) -> Result<Finalized, ShellError> {
        let program = JsParser::new().parse_strict(source).unwrap();
        finalize(source.to_string(), program)
    }

    fn last_identifier(f: &Finalized) -> Option<&str> {
        match f.program.body.last() {
            Some(StatementType::ExpressionStatement { expression, .. }) => match &**expression {
                ExpressionType::Identifier(id) => Some(id.name.as_str()),
                _ => None,
            },
            _ => None,
        }
    }

    #[test]
    fn test_trailing_declaration_is_referenced() {
        let f = finalized("let a = 1, b = 2").unwrap();
        assert!(!f.is_silent);
        assert_eq!(last_identifier(&f), Some("b"));
        let f = finalized("function g() {};").unwrap();
        // The trailing `;` is an empty statement, not a declaration.
        assert_eq!(f.program.body.len(), 2);
        assert!(f.is_silent);
        let f = finalized("var x = 3;").unwrap();
        assert!(f.is_silent);
        assert_eq!(last_identifier(&f), Some("x"));
    }

    #[test]
    fn test_await_in_nested_function_is_not_top_level() {
        let f = finalized("async function f() { await 1 }").unwrap();
        assert!(!f.is_async);
        let f = finalized("const v = await Promise.resolve(1)").unwrap();
        assert!(f.is_async);
        assert_eq!(last_identifier(&f), None);
    }

    #[test]
    fn test_top_level_return_fails() {
        for source in ["return 1", "await 1; return 2", "if (true) { return }"] {
            match finalized(source) {
                Err(ShellError::Compile(message)) => assert_eq!(message, "Illegal return statement"),
                other => panic!("{:?} gave {:?}", source, other),
            }
        }
        assert!(finalized("function f() { return 2 } await f()").is_ok());
        assert!(finalized("const g = () => { return 1 }").is_ok());
        assert!(finalized("class K { m() { return 1 } }").is_ok());
    }

    #[test]
    fn test_trailing_comment_keeps_a_command_silent() {
        assert!(finalized("1; // note").unwrap().is_silent);
        assert!(finalized("1; /* a\n b */").unwrap().is_silent);
        assert!(!finalized("1 // ends with ;").unwrap().is_silent);
        assert!(!finalized("'a;'").unwrap().is_silent);
    }
}
