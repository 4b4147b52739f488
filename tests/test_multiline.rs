//! Tests for deciding whether buffered lines form a complete command.

extern crate jsh;

use pretty_assertions::assert_eq;

use jsh::parser::ast::{ExpressionType, StatementType};
use jsh::parser::JsParser;
use jsh::repl::{classify, Classification};

/// Classifies lines as if typed one after the other into the same buffer.
fn classify_lines(lines: &[&str]) -> Classification {
    let lines: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    classify(&lines, &JsParser::new())
}

fn is_complete(lines: &[&str]) -> bool {
    matches!(classify_lines(lines), Classification::Complete(_))
}

fn is_incomplete(lines: &[&str]) -> bool {
    matches!(classify_lines(lines), Classification::Incomplete)
}

#[test]
fn test_valid_single_lines_are_complete() {
    let lines = [
        "1 + 2",
        "let x = 5",
        "const f = (a, b) => a * b;",
        "function g() { return 1 }",
        "class A extends Object { constructor() { super() } }",
        "if (x) { y() } else { z() }",
        "for (let i = 0; i < 3; i++) {}",
        "[1, 2, 3].map(n => n * 2)",
        "`sum: ${1 + 2}`",
        "a?.b ?? c",
        "await Promise.resolve(1)",
        "try { f() } catch { }",
    ];
    for line in lines {
        assert!(is_complete(&[line]), "{:?} should be complete", line);
    }
}

#[test]
fn test_blank_and_comment_only_input_is_complete() {
    for source in ["", "   \t", "// just a note", "/* block */", "/* a\n b */"] {
        match classify_lines(&[source]) {
            Classification::Complete(f) => assert!(f.program.body.is_empty()),
            other => panic!("{:?} gave {:?}", source, other),
        }
    }
}

#[test]
fn test_function_typed_over_three_lines() {
    assert!(is_incomplete(&["function f(x) {"]));
    assert!(is_incomplete(&["function f(x) {", "  return x+1"]));
    assert!(is_complete(&["function f(x) {", "  return x+1", "}"]));
}

#[test]
fn test_unterminated_constructs_wait_for_more() {
    let cases: [(&str, &str); 4] = [
        ("/* still", " open */"),
        ("`template", "end`"),
        ("'line \\", "continued'"),
        ("call(1,", "2)"),
    ];
    for (start, rest) in cases {
        assert!(is_incomplete(&[start]), "{:?} should be incomplete", start);
        assert!(
            is_complete(&[start, rest]),
            "{:?} + {:?} should be complete",
            start,
            rest
        );
    }
}

#[test]
fn test_string_left_open_before_a_newline_is_an_error() {
    // Open at the end of input it may still be closed.
    assert!(is_incomplete(&["'abc"]));
    match classify_lines(&["'abc", "+ 1"]) {
        Classification::SyntaxError(e) => {
            assert!(!e.recoverable);
            assert_eq!(e.message, "Unterminated string constant");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_object_literal_at_statement_start() {
    match classify_lines(&["{'a': 1}"]) {
        Classification::Complete(f) => {
            assert_eq!(f.source, "({'a': 1})");
            match f.program.body.as_slice() {
                [StatementType::ExpressionStatement { expression, .. }] => {
                    assert!(matches!(**expression, ExpressionType::ObjectExpression { .. }))
                }
                other => panic!("unexpected body {:?}", other),
            }
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_block_stays_a_block() {
    match classify_lines(&["{ let a = 1; a }"]) {
        Classification::Complete(f) => {
            assert!(matches!(
                f.program.body.as_slice(),
                [StatementType::BlockStatement(_)]
            ));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_errors_report_the_strict_parse() {
    match classify_lines(&["let x = = 2"]) {
        Classification::SyntaxError(e) => {
            assert_eq!(e.to_string(), "Unexpected token (1:8)");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_top_level_return_is_a_compile_error() {
    for source in ["await null; return 1", "return 1"] {
        match classify_lines(&[source]) {
            Classification::CompileError(message) => assert_eq!(message, "Illegal return statement"),
            other => panic!("unexpected {:?}", other),
        }
    }
}

#[test]
fn test_silent_and_async_flags() {
    match classify_lines(&["let v = await 1;"]) {
        Classification::Complete(f) => {
            assert!(f.is_silent);
            assert!(f.is_async);
        }
        other => panic!("unexpected {:?}", other),
    }
    match classify_lines(&["1 + 1"]) {
        Classification::Complete(f) => {
            assert!(!f.is_silent);
            assert!(!f.is_async);
        }
        other => panic!("unexpected {:?}", other),
    }
}
