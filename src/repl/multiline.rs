//! Decides whether the lines typed so far form a complete command.

use tracing::debug;

use crate::parser::ast::{ProgramData, StatementType};
use crate::parser::lexer::tokenize;
use crate::parser::{ScriptParser, SyntaxError};
use crate::repl::error::ShellError;
use crate::repl::finalize::{finalize, Finalized};

#[derive(Debug)]
pub enum Classification {
    /// Ready to compile and run.
    Complete(Finalized),
    /// More lines are needed.
    Incomplete,
    /// Cannot be fixed by typing more.
    SyntaxError(SyntaxError),
    /// Parses, but cannot become a runnable command.
    CompileError(String),
}

pub fn classify(lines: &[String], parser: &dyn ScriptParser) -> Classification {
    let source = lines.join("\n");
    if is_blank(&source) {
        return Classification::Complete(Finalized::empty(source));
    }
    let error = match parser.parse_strict(&source) {
        Ok(program) => return complete(source, program),
        Err(e) => e,
    };
    if let Some(outcome) = retry_as_object_literal(&source, parser) {
        return outcome;
    }
    if error.recoverable {
        debug!(%error, "incomplete input");
        Classification::Incomplete
    } else {
        debug!(%error, "syntax error");
        Classification::SyntaxError(error)
    }
}

/// Whitespace and comments only.
fn is_blank(source: &str) -> bool {
    tokenize(source).iter().all(|t| t.is_eof())
}

fn complete(source: String, program: ProgramData) -> Classification {
    match finalize(source, program) {
        Ok(finalized) => Classification::Complete(finalized),
        Err(ShellError::Compile(message)) => Classification::CompileError(message),
        Err(other) => Classification::CompileError(other.to_string()),
    }
}

/// A statement starting with `{` parses as a block. When the input ends in
/// such a block, read it again as a parenthesized object literal.
fn retry_as_object_literal(source: &str, parser: &dyn ScriptParser) -> Option<Classification> {
    let program = parser.parse_tolerant(source);
    let last = program
        .body
        .iter()
        .rev()
        .find(|s| !matches!(s, StatementType::EmptyStatement { .. }))?;
    let block = match last {
        StatementType::BlockStatement(b) => b.meta,
        _ => return None,
    };
    if block.end_index < source.trim_end().len() {
        return None;
    }
    let (before, literal) = source.split_at(block.start_index);
    let wrapped = format!("{}({})", before, literal.trim_end());
    match parser.parse_strict(&wrapped) {
        Ok(program) => {
            debug!("trailing block read as an object literal");
            Some(complete(wrapped, program))
        }
        Err(_) => {
            // `{ a: 1,` is an object literal still being typed.
            let open = format!("{}({}", before, literal);
            match parser.parse_strict(&open) {
                Err(e) if e.recoverable => Some(Classification::Incomplete),
                _ => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::JsParser;

    fn run(lines: &[&str]) -> Classification {
        let lines: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        classify(&lines, &JsParser::new())
    }

    #[test]
    fn test_comment_only_input_is_complete() {
        for source in ["", "   ", "// note", "/* a\n b */"] {
            assert!(matches!(run(&[source]), Classification::Complete(_)), "{:?}", source);
        }
    }

    #[test]
    fn test_object_literal_beats_block() {
        match run(&["{'a': 1}"]) {
            Classification::Complete(f) => assert_eq!(f.source, "({'a': 1})"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_partial_object_literal_waits() {
        assert!(matches!(run(&["{'a': 1,"]), Classification::Incomplete));
    }

    #[test]
    fn test_reports_strict_error() {
        match run(&["let 1 = x"]) {
            Classification::SyntaxError(e) => assert!(!e.recoverable),
            other => panic!("unexpected {:?}", other),
        }
    }
}
