use super::api::{JsParser, ScriptParser, MAX_NESTING_DEPTH};
use super::ast::*;
use super::lexer::{cook_escapes, tokenize, InvalidTokenKind, TemplatePartKind, TokenKind};

fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source).into_iter().map(|t| t.kind).collect()
}

fn strict(source: &str) -> ProgramData {
    match JsParser::new().parse_strict(source) {
        Ok(p) => p,
        Err(e) => panic!("failed to parse {:?}: {}", source, e),
    }
}

fn only_expression(program: &ProgramData) -> &ExpressionType {
    match program.body.as_slice() {
        [StatementType::ExpressionStatement { expression, .. }] => expression,
        other => panic!("expected one expression statement, got {:?}", other),
    }
}

#[test]
fn test_tokens_carry_offsets() {
    let tokens = tokenize("let x = 10;");
    let spans: Vec<(usize, usize)> = tokens.iter().map(|t| (t.start, t.end)).collect();
    assert_eq!(spans, vec![(0, 3), (4, 5), (6, 7), (8, 10), (10, 11), (11, 11)]);
    assert!(tokens.last().unwrap().is_eof());
}

#[test]
fn test_numbers_in_every_radix() {
    assert_eq!(
        kinds("0x1F 0o17 0b101 1.5e2 .5"),
        vec![
            TokenKind::Number(31.0),
            TokenKind::Number(15.0),
            TokenKind::Number(5.0),
            TokenKind::Number(150.0),
            TokenKind::Number(0.5),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_newline_before_follows_line_breaks_and_comments() {
    let tokens = tokenize("a\nb /* one\ntwo */ c // tail\nd");
    let flags: Vec<bool> = tokens.iter().map(|t| t.newline_before).collect();
    assert_eq!(flags, vec![false, true, true, true, false]);
}

#[test]
fn test_string_escapes_are_cooked() {
    assert_eq!(
        kinds(r#""a\tbA\x42""#),
        vec![TokenKind::String("a\tbAB".to_string()), TokenKind::Eof]
    );
    assert_eq!(cook_escapes("line\\\ncontinued"), "linecontinued");
}

#[test]
fn test_template_is_flattened() {
    assert_eq!(
        kinds("`x${y}z`"),
        vec![
            TokenKind::Template {
                kind: TemplatePartKind::Head,
                cooked: "x".to_string()
            },
            TokenKind::Identifier("y".to_string()),
            TokenKind::Template {
                kind: TemplatePartKind::Tail,
                cooked: "z".to_string()
            },
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_unterminated_tokens() {
    let unterminated = |source: &str| match &tokenize(source)[0].kind {
        TokenKind::Invalid { kind, .. } => Some(*kind),
        _ => None,
    };
    assert_eq!(unterminated("'abc"), Some(InvalidTokenKind::UnterminatedString));
    assert_eq!(unterminated("/* abc"), Some(InvalidTokenKind::UnterminatedComment));
    assert_eq!(unterminated("`abc"), Some(InvalidTokenKind::UnterminatedTemplate));
    assert_eq!(unterminated("abc"), None);
}

#[test]
fn test_unterminated_string_stops_at_line_end() {
    let tokens = tokenize("'abc\nx");
    assert_eq!(tokens[0].end, 4);
    assert_eq!(tokens[1].kind, TokenKind::Identifier("x".to_string()));
    assert!(tokens[1].newline_before);
}

#[test]
fn test_operator_precedence() {
    let program = strict("1 + 2 * 3");
    match only_expression(&program) {
        ExpressionType::BinaryExpression {
            operator, right, ..
        } => {
            assert_eq!(*operator, BinaryOperator::Add);
            assert!(matches!(
                **right,
                ExpressionType::BinaryExpression {
                    operator: BinaryOperator::Multiply,
                    ..
                }
            ));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_exponent_is_right_associative() {
    let program = strict("2 ** 3 ** 2");
    match only_expression(&program) {
        ExpressionType::BinaryExpression { left, right, .. } => {
            assert!(matches!(**left, ExpressionType::Literal(_)));
            assert!(matches!(**right, ExpressionType::BinaryExpression { .. }));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_automatic_semicolon_insertion() {
    let program = strict("let a = 1\nlet b = 2\na + b");
    assert_eq!(program.body.len(), 3);
    let program = strict("return\n42");
    assert!(matches!(
        program.body[0],
        StatementType::ReturnStatement { argument: None, .. }
    ));
}

#[test]
fn test_arrow_functions() {
    let program = strict("const add = (a, b = 1, ...rest) => a + b");
    let declarator = match &program.body[0] {
        StatementType::Declaration(DeclarationType::VariableDeclaration(v)) => &v.declarations[0],
        other => panic!("unexpected {:?}", other),
    };
    match declarator.init.as_deref() {
        Some(ExpressionType::ArrowFunctionExpression(f)) => {
            assert_eq!(f.params.len(), 3);
            assert!(f.is_arrow);
            assert!(matches!(f.body, FunctionBodyOrExpression::Expression(_)));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_destructuring_declaration() {
    let program = strict("let { a, b: [c, , d = 2], ...e } = obj");
    match &program.body[0] {
        StatementType::Declaration(DeclarationType::VariableDeclaration(v)) => {
            assert_eq!(v.kind, VariableDeclarationKind::Let);
            assert!(matches!(
                *v.declarations[0].id,
                PatternType::ObjectPattern { .. }
            ));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_class_with_members() {
    let program = strict(
        "class B extends A { static count = 0; constructor() { super() } get v() { return 1 } }",
    );
    match &program.body[0] {
        StatementType::Declaration(DeclarationType::ClassDeclaration(c)) => {
            assert_eq!(c.id.as_ref().map(|i| i.name.as_str()), Some("B"));
            assert!(c.super_class.is_some());
            assert_eq!(c.body.len(), 3);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_top_level_await_and_return_are_accepted() {
    strict("await Promise.resolve(1)");
    strict("return 1");
}

#[test]
fn test_object_literal_in_parentheses() {
    let program = strict("({ 'a': 1, b, [c]: 2, m() {} })");
    assert!(matches!(
        only_expression(&program),
        ExpressionType::ObjectExpression { properties, .. } if properties.len() == 4
    ));
}

#[test]
fn test_leading_brace_is_a_block() {
    let program = strict("{ a; b }");
    assert!(matches!(program.body[0], StatementType::BlockStatement(_)));
    assert!(JsParser::new().parse_strict("{ 'a': 1 }").is_err());
}

#[test]
fn test_optional_chaining_and_nullish() {
    let program = strict("a?.b ?? c");
    assert!(matches!(
        only_expression(&program),
        ExpressionType::LogicalExpression {
            operator: LogicalOperator::NullishCoalescing,
            ..
        }
    ));
}

#[test]
fn test_error_message_has_position() {
    let e = JsParser::new().parse_strict("a b").unwrap_err();
    assert_eq!(e.message, "Unexpected token");
    assert_eq!((e.line, e.column), (1, 2));
    assert_eq!(e.to_string(), "Unexpected token (1:2)");
    assert!(!e.recoverable);
}

#[test]
fn test_errors_at_end_of_input_are_recoverable() {
    for source in ["function f(x) {", "foo(1,", "[1, 2", "if (a) {", "let x ="] {
        let e = JsParser::new().parse_strict(source).unwrap_err();
        assert!(e.recoverable, "{:?} should be recoverable", source);
    }
}

#[test]
fn test_unterminated_constructs_are_recoverable() {
    for source in ["`abc", "/* comment", "'abc\\", "x = `a${b"] {
        let e = JsParser::new().parse_strict(source).unwrap_err();
        assert!(e.recoverable, "{:?} should be recoverable", source);
    }
    let e = JsParser::new().parse_strict("'abc\n+ 1").unwrap_err();
    assert!(!e.recoverable);
}

#[test]
fn test_tolerant_parse_inserts_placeholder_property() {
    let program = JsParser::new().parse_tolerant("Math.");
    match only_expression(&program) {
        ExpressionType::MemberExpression(MemberExpressionType::SimpleMemberExpression {
            meta,
            property,
            ..
        }) => {
            assert!(property.is_placeholder());
            assert_eq!(property.meta, Meta::new(5, 5));
            assert_eq!(meta.end_index, 5);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_tolerant_parse_keeps_open_constructs() {
    let program = JsParser::new().parse_tolerant("function f(x) { return x.");
    assert!(matches!(
        program.body.last(),
        Some(StatementType::Declaration(DeclarationType::FunctionDeclaration(_)))
    ));
    let program = JsParser::new().parse_tolerant("foo(1, ");
    assert_eq!(program.body.len(), 1);
}

#[test]
fn test_tolerant_parse_never_fails() {
    for source in [")", "}}}", "let = ;", "a +* b", "class {", "@@"] {
        let _ = JsParser::new().parse_tolerant(source);
    }
}

/// Runs `f` on a thread with the stack the shell itself gets.
fn on_shell_stack<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    std::thread::Builder::new()
        .stack_size(crate::repl::SHELL_STACK_SIZE)
        .spawn(f)
        .unwrap()
        .join()
        .unwrap()
}

fn nested_arrays(depth: usize) -> String {
    format!("{}1{}", "[".repeat(depth), "]".repeat(depth))
}

#[test]
fn test_nesting_limit_is_a_final_error() {
    on_shell_stack(|| {
        let e = JsParser::new()
            .parse_strict(&nested_arrays(MAX_NESTING_DEPTH + 10))
            .unwrap_err();
        assert_eq!(e.message, "Maximum nesting depth exceeded");
        assert!(!e.recoverable);

        // Unclosed brackets would otherwise ask for more input.
        let e = JsParser::new()
            .parse_strict(&"[".repeat(MAX_NESTING_DEPTH * 4))
            .unwrap_err();
        assert!(!e.recoverable);

        let e = JsParser::new()
            .parse_strict(&"{".repeat(MAX_NESTING_DEPTH + 1))
            .unwrap_err();
        assert_eq!(e.message, "Maximum nesting depth exceeded");
    });
}

#[test]
fn test_long_chains_count_as_nesting() {
    on_shell_stack(|| {
        let members = format!("a{}", ".b".repeat(MAX_NESTING_DEPTH * 2));
        let e = JsParser::new().parse_strict(&members).unwrap_err();
        assert_eq!(e.message, "Maximum nesting depth exceeded");

        let sum = vec!["1"; MAX_NESTING_DEPTH * 2].join(" + ");
        assert!(JsParser::new().parse_strict(&sum).is_err());
    });
}

#[test]
fn test_nesting_below_the_limit_parses() {
    on_shell_stack(|| {
        let program = strict(&nested_arrays(MAX_NESTING_DEPTH / 2));
        assert!(matches!(
            only_expression(&program),
            ExpressionType::ArrayExpression { .. }
        ));
    });
}

#[test]
fn test_tolerant_parse_stops_descending() {
    on_shell_stack(|| {
        let source = format!("let before = 1;\n{}", "[".repeat(MAX_NESTING_DEPTH * 4));
        let program = JsParser::new().parse_tolerant(&source);
        assert!(matches!(
            program.body.first(),
            Some(StatementType::Declaration(DeclarationType::VariableDeclaration(_)))
        ));
        let _ = JsParser::new().parse_tolerant(&"{".repeat(MAX_NESTING_DEPTH * 4));
    });
}
