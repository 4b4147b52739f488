use std::rc::Rc;

use thiserror::Error;

use crate::parser::ast::*;
use crate::parser::lexer::{tokenize, InvalidTokenKind, TemplatePartKind, Token, TokenKind};
use crate::parser::util::{is_reserved_word, line_column, number_to_key};

/// A parse failure, positioned at the offending token.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} ({line}:{column})")]
pub struct SyntaxError {
    pub message: String,
    pub position: usize,
    pub line: usize,
    pub column: usize,
    /// Raised at end of input, inside an unterminated template or comment, or
    /// on a string ending in a line continuation. More input could fix it.
    pub recoverable: bool,
}

/// The two parsing modes the shell relies on.
pub trait ScriptParser {
    fn parse_strict(&self, source: &str) -> Result<ProgramData, SyntaxError>;

    /// Never fails. Missing operands become [`PLACEHOLDER_NAME`] identifiers.
    fn parse_tolerant(&self, source: &str) -> ProgramData;
}

#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    pub allow_return_outside_function: bool,
    pub allow_await_outside_function: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            allow_return_outside_function: true,
            allow_await_outside_function: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct JsParser {
    options: ParseOptions,
}

impl JsParser {
    pub fn new() -> Self {
        JsParser::default()
    }

    pub fn with_options(options: ParseOptions) -> Self {
        JsParser { options }
    }

    pub fn parse_to_ast_from_str(code: &str) -> Result<ProgramData, SyntaxError> {
        JsParser::new().parse_strict(code)
    }
}

impl ScriptParser for JsParser {
    fn parse_strict(&self, source: &str) -> Result<ProgramData, SyntaxError> {
        Parser::new(source, false, self.options).parse_program()
    }

    fn parse_tolerant(&self, source: &str) -> ProgramData {
        Parser::new(source, true, self.options)
            .parse_program()
            .unwrap_or_else(|_| ProgramData {
                meta: Meta::new(0, source.len()),
                body: vec![],
                locals: Locals::new(),
            })
    }
}

type PResult<T> = Result<T, SyntaxError>;

/// How deep statements, expressions and patterns may nest before parsing
/// gives up. Unoptimized builds have much larger stack frames.
#[cfg(not(debug_assertions))]
pub const MAX_NESTING_DEPTH: usize = 512;
#[cfg(debug_assertions)]
pub const MAX_NESTING_DEPTH: usize = 40;

#[derive(Clone, Copy)]
struct FunctionContext {
    is_async: bool,
}

enum BinaryOrLogical {
    Binary(BinaryOperator),
    Logical(LogicalOperator),
}

struct Parser<'s> {
    source: &'s str,
    tokens: Vec<Token>,
    pos: usize,
    last_end: usize,
    tolerant: bool,
    options: ParseOptions,
    functions: Vec<FunctionContext>,
    no_in: bool,
    depth: usize,
}

impl<'s> Parser<'s> {
    fn new(source: &'s str, tolerant: bool, options: ParseOptions) -> Self {
        let mut tokens = tokenize(source);
        if tolerant {
            tokens.retain(|t| {
                !matches!(
                    t.kind,
                    TokenKind::Invalid {
                        kind: InvalidTokenKind::UnterminatedComment
                            | InvalidTokenKind::UnexpectedCharacter,
                        ..
                    }
                )
            });
        }
        Parser {
            source,
            tokens,
            pos: 0,
            last_end: 0,
            tolerant,
            options,
            functions: vec![],
            no_in: false,
            depth: 0,
        }
    }

    // ==== Token helpers ====

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_at(&self, n: usize) -> &Token {
        let i = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[i]
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if !token.is_eof() {
            self.pos += 1;
            self.last_end = token.end;
        }
        token
    }

    fn at_eof(&self) -> bool {
        self.peek().is_eof()
    }

    fn is_punct(&self, p: &str) -> bool {
        self.peek().is_punctuator(p)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.is_punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn is_keyword(&self, k: &str) -> bool {
        self.peek().is_identifier_name(k)
    }

    fn eat_keyword(&mut self, k: &str) -> bool {
        if self.is_keyword(k) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> PResult<()> {
        if self.eat_punct(p) || self.tolerant {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn expect_keyword(&mut self, k: &str) -> PResult<()> {
        if self.eat_keyword(k) || self.tolerant {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    /// Separator check for comma-delimited lists. `Ok(false)` ends the list.
    fn list_separator(&mut self, close: &str) -> PResult<bool> {
        if self.is_punct(close) {
            return Ok(true);
        }
        if self.eat_punct(",") {
            return Ok(true);
        }
        if self.tolerant {
            Ok(false)
        } else {
            Err(self.unexpected())
        }
    }

    fn start(&self) -> usize {
        self.peek().start
    }

    fn meta_from(&self, start: usize) -> Meta {
        if self.last_end < start {
            Meta::new(self.last_end, self.last_end)
        } else {
            Meta::new(start, self.last_end)
        }
    }

    fn placeholder(&self) -> IdentifierData {
        IdentifierData {
            name: PLACEHOLDER_NAME.to_string(),
            meta: Meta::new(self.last_end, self.last_end),
        }
    }

    fn in_async_context(&self) -> bool {
        self.functions
            .last()
            .map(|f| f.is_async)
            .unwrap_or(self.options.allow_await_outside_function)
    }

    fn with_in<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        let saved = self.no_in;
        self.no_in = false;
        let result = f(self);
        self.no_in = saved;
        result
    }

    /// Runs `f` one nesting level deeper.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.too_deep());
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Each link of a left-nested chain (`a.b.c`, `a + b + c`) deepens the
    /// tree without recursing here, so it counts against the same limit.
    fn chain_link(&self, links: &mut usize) -> PResult<()> {
        *links += 1;
        if self.depth + *links > MAX_NESTING_DEPTH {
            Err(self.too_deep())
        } else {
            Ok(())
        }
    }

    fn consume_semicolon(&mut self) -> PResult<()> {
        if self.eat_punct(";") {
            return Ok(());
        }
        if self.is_punct("}") || self.at_eof() || self.peek().newline_before || self.tolerant {
            return Ok(());
        }
        Err(self.unexpected())
    }

    // ==== Errors ====

    fn error_at(&self, position: usize, message: impl Into<String>) -> SyntaxError {
        let (line, column) = line_column(self.source, position);
        let token = self.peek();
        let recoverable = match &token.kind {
            TokenKind::Eof => true,
            TokenKind::Invalid { kind, .. } => match kind {
                InvalidTokenKind::UnterminatedTemplate | InvalidTokenKind::UnterminatedComment => {
                    true
                }
                InvalidTokenKind::UnterminatedString => {
                    token.end == self.source.len() || token.text(self.source).ends_with('\\')
                }
                InvalidTokenKind::UnexpectedCharacter => false,
            },
            _ => false,
        };
        SyntaxError {
            message: message.into(),
            position,
            line,
            column,
            recoverable,
        }
    }

    /// No amount of further input fixes this one.
    fn too_deep(&self) -> SyntaxError {
        SyntaxError {
            recoverable: false,
            ..self.error_at(self.peek().start, "Maximum nesting depth exceeded")
        }
    }

    fn unexpected(&self) -> SyntaxError {
        let token = self.peek();
        let message = match &token.kind {
            TokenKind::Invalid { kind, .. } => match kind {
                InvalidTokenKind::UnterminatedString => "Unterminated string constant".to_string(),
                InvalidTokenKind::UnterminatedTemplate => "Unterminated template".to_string(),
                InvalidTokenKind::UnterminatedComment => "Unterminated comment".to_string(),
                InvalidTokenKind::UnexpectedCharacter => {
                    format!("Unexpected character '{}'", token.text(self.source))
                }
            },
            _ => "Unexpected token".to_string(),
        };
        self.error_at(token.start, message)
    }

    // ==== Statements ====

    fn parse_program(&mut self) -> PResult<ProgramData> {
        let mut body = vec![];
        while !self.at_eof() {
            let before = self.pos;
            match self.parse_statement() {
                Ok(stmt) => body.push(stmt),
                Err(e) if !self.tolerant => return Err(e),
                Err(_) => {}
            }
            self.ensure_progress(before)?;
        }
        Ok(ProgramData {
            meta: Meta::new(0, self.source.len()),
            body,
            locals: Locals::new(),
        })
    }

    fn ensure_progress(&mut self, before: usize) -> PResult<()> {
        if self.pos == before && !self.at_eof() {
            if self.tolerant {
                self.advance();
            } else {
                return Err(self.unexpected());
            }
        }
        Ok(())
    }

    fn parse_statement_list(&mut self) -> PResult<Vec<StatementType>> {
        let mut body = vec![];
        while !self.is_punct("}") && !self.at_eof() {
            let before = self.pos;
            match self.parse_statement() {
                Ok(stmt) => body.push(stmt),
                Err(e) if !self.tolerant => return Err(e),
                Err(_) => {}
            }
            self.ensure_progress(before)?;
        }
        Ok(body)
    }

    fn parse_statement(&mut self) -> PResult<StatementType> {
        self.nested(|p| p.parse_statement_inner())
    }

    fn parse_statement_inner(&mut self) -> PResult<StatementType> {
        let start = self.start();
        if self.at_eof() {
            if self.tolerant {
                return Ok(StatementType::EmptyStatement {
                    meta: Meta::new(self.last_end, self.last_end),
                });
            }
            return Err(self.unexpected());
        }
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::Punctuator(p) if p == "{" => {
                Ok(StatementType::BlockStatement(self.parse_block()?))
            }
            TokenKind::Punctuator(p) if p == ";" => {
                self.advance();
                Ok(StatementType::EmptyStatement {
                    meta: Meta::new(token.start, token.end),
                })
            }
            TokenKind::Identifier(name) => match name.as_str() {
                "var" | "const" => self.parse_variable_statement(),
                "let" if self.let_starts_declaration() => self.parse_variable_statement(),
                "function" => {
                    let f = self.parse_function(start, false, true)?;
                    Ok(StatementType::Declaration(
                        DeclarationType::FunctionDeclaration(Rc::new(f)),
                    ))
                }
                "async"
                    if self.peek_at(1).is_identifier_name("function")
                        && !self.peek_at(1).newline_before =>
                {
                    self.advance();
                    let f = self.parse_function(start, true, true)?;
                    Ok(StatementType::Declaration(
                        DeclarationType::FunctionDeclaration(Rc::new(f)),
                    ))
                }
                "class" => {
                    let c = self.parse_class(start, true)?;
                    Ok(StatementType::Declaration(DeclarationType::ClassDeclaration(
                        Rc::new(c),
                    )))
                }
                "if" => self.parse_if_statement(),
                "for" => self.parse_for_statement(),
                "while" => {
                    self.advance();
                    self.expect_punct("(")?;
                    let test = self.with_in(|p| p.parse_expression())?;
                    self.expect_punct(")")?;
                    let body = self.parse_statement()?;
                    Ok(StatementType::WhileStatement {
                        meta: self.meta_from(start),
                        test: Box::new(test),
                        body: Box::new(body),
                    })
                }
                "do" => {
                    self.advance();
                    let body = self.parse_statement()?;
                    self.expect_keyword("while")?;
                    self.expect_punct("(")?;
                    let test = self.with_in(|p| p.parse_expression())?;
                    self.expect_punct(")")?;
                    self.eat_punct(";");
                    Ok(StatementType::DoWhileStatement {
                        meta: self.meta_from(start),
                        body: Box::new(body),
                        test: Box::new(test),
                    })
                }
                "return" => self.parse_return_statement(),
                "break" | "continue" => {
                    self.advance();
                    self.consume_semicolon()?;
                    let meta = self.meta_from(start);
                    Ok(if name == "break" {
                        StatementType::BreakStatement { meta }
                    } else {
                        StatementType::ContinueStatement { meta }
                    })
                }
                "throw" => {
                    self.advance();
                    if self.peek().newline_before {
                        return Err(self.error_at(self.last_end, "Illegal newline after throw"));
                    }
                    let argument = self.parse_expression()?;
                    self.consume_semicolon()?;
                    Ok(StatementType::ThrowStatement {
                        meta: self.meta_from(start),
                        argument: Box::new(argument),
                    })
                }
                "try" => self.parse_try_statement(),
                "switch" => self.parse_switch_statement(),
                "debugger" => {
                    self.advance();
                    self.consume_semicolon()?;
                    Ok(StatementType::DebuggerStatement {
                        meta: self.meta_from(start),
                    })
                }
                "import"
                    if !self.peek_at(1).is_punctuator("(") && !self.peek_at(1).is_punctuator(".") =>
                {
                    self.parse_import_declaration()
                }
                _ => self.parse_expression_statement(),
            },
            _ => self.parse_expression_statement(),
        }
    }

    fn let_starts_declaration(&self) -> bool {
        let next = self.peek_at(1);
        match &next.kind {
            TokenKind::Identifier(name) => name != "in" && name != "instanceof",
            TokenKind::Punctuator(p) => p == "[" || p == "{",
            TokenKind::Eof => self.tolerant,
            _ => false,
        }
    }

    fn parse_expression_statement(&mut self) -> PResult<StatementType> {
        let start = self.start();
        let expression = self.parse_expression()?;
        self.consume_semicolon()?;
        Ok(StatementType::ExpressionStatement {
            meta: self.meta_from(start),
            expression: Box::new(expression),
        })
    }

    fn parse_block(&mut self) -> PResult<BlockStatementData> {
        let start = self.start();
        self.expect_punct("{")?;
        let body = self.with_in(|p| p.parse_statement_list())?;
        self.expect_punct("}")?;
        Ok(BlockStatementData {
            meta: self.meta_from(start),
            body,
            locals: Locals::new(),
        })
    }

    fn parse_variable_statement(&mut self) -> PResult<StatementType> {
        let start = self.start();
        let mut declaration = self.parse_variable_declaration(false)?;
        self.consume_semicolon()?;
        declaration.meta = self.meta_from(start);
        Ok(StatementType::Declaration(
            DeclarationType::VariableDeclaration(declaration),
        ))
    }

    fn parse_variable_declaration(&mut self, in_for: bool) -> PResult<VariableDeclarationData> {
        let start = self.start();
        let kind = match self.advance().kind {
            TokenKind::Identifier(ref k) if k == "let" => VariableDeclarationKind::Let,
            TokenKind::Identifier(ref k) if k == "const" => VariableDeclarationKind::Const,
            _ => VariableDeclarationKind::Var,
        };
        let mut declarations = vec![];
        loop {
            let declarator_start = self.start();
            let id = self.parse_binding_target()?;
            let init = if self.eat_punct("=") {
                Some(Box::new(self.parse_assignment()?))
            } else {
                let in_for_head = in_for && (self.is_keyword("of") || self.is_keyword("in"));
                let needs_init = kind == VariableDeclarationKind::Const
                    || !matches!(id, PatternType::PatternWhichCanBeExpression(_));
                if needs_init && !in_for_head && !self.tolerant {
                    return Err(self.unexpected());
                }
                None
            };
            declarations.push(VariableDeclaratorData {
                meta: self.meta_from(declarator_start),
                id: Box::new(id),
                init,
            });
            if !self.eat_punct(",") {
                break;
            }
        }
        Ok(VariableDeclarationData {
            meta: self.meta_from(start),
            declarations,
            kind,
        })
    }

    fn parse_if_statement(&mut self) -> PResult<StatementType> {
        let start = self.start();
        self.advance();
        self.expect_punct("(")?;
        let test = self.with_in(|p| p.parse_expression())?;
        self.expect_punct(")")?;
        let consequent = self.parse_statement()?;
        let alternate = if self.eat_keyword("else") {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(StatementType::IfStatement {
            meta: self.meta_from(start),
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate,
        })
    }

    fn parse_for_statement(&mut self) -> PResult<StatementType> {
        let start = self.start();
        self.advance();
        self.expect_punct("(")?;
        let init = if self.is_punct(";") || (self.tolerant && self.at_eof()) {
            None
        } else if self.is_keyword("var")
            || self.is_keyword("const")
            || (self.is_keyword("let") && self.let_starts_declaration())
        {
            let saved = self.no_in;
            self.no_in = true;
            let declaration = self.parse_variable_declaration(true);
            self.no_in = saved;
            let declaration = declaration?;
            if declaration.declarations.len() == 1
                && declaration.declarations[0].init.is_none()
                && (self.is_keyword("of") || self.is_keyword("in"))
            {
                let left = VariableDeclarationOrPattern::VariableDeclaration(declaration);
                return self.parse_for_iterator_rest(start, left);
            }
            Some(VariableDeclarationOrExpression::VariableDeclaration(
                declaration,
            ))
        } else {
            let saved = self.no_in;
            self.no_in = true;
            let expression = self.parse_expression();
            self.no_in = saved;
            let expression = expression?;
            if self.is_keyword("of") || self.is_keyword("in") {
                let target = self.to_assignment_target(expression)?;
                let left = VariableDeclarationOrPattern::Pattern(Box::new(target));
                return self.parse_for_iterator_rest(start, left);
            }
            Some(VariableDeclarationOrExpression::Expression(Box::new(
                expression,
            )))
        };
        self.expect_punct(";")?;
        let test = if self.is_punct(";") || (self.tolerant && self.at_eof()) {
            None
        } else {
            Some(Box::new(self.with_in(|p| p.parse_expression())?))
        };
        self.expect_punct(";")?;
        let update = if self.is_punct(")") || (self.tolerant && self.at_eof()) {
            None
        } else {
            Some(Box::new(self.with_in(|p| p.parse_expression())?))
        };
        self.expect_punct(")")?;
        let body = self.parse_statement()?;
        Ok(StatementType::ForStatement {
            meta: self.meta_from(start),
            init,
            test,
            update,
            body: Box::new(body),
        })
    }

    fn parse_for_iterator_rest(
        &mut self,
        start: usize,
        left: VariableDeclarationOrPattern,
    ) -> PResult<StatementType> {
        let is_of = self.is_keyword("of");
        self.advance();
        let right = if is_of {
            self.with_in(|p| p.parse_assignment())?
        } else {
            self.with_in(|p| p.parse_expression())?
        };
        self.expect_punct(")")?;
        let body = self.parse_statement()?;
        let data = ForIteratorData {
            meta: self.meta_from(start),
            left,
            right: Box::new(right),
            body: Box::new(body),
        };
        Ok(if is_of {
            StatementType::ForOfStatement(data)
        } else {
            StatementType::ForInStatement(data)
        })
    }

    fn parse_return_statement(&mut self) -> PResult<StatementType> {
        let start = self.start();
        self.advance();
        if self.functions.is_empty() && !self.options.allow_return_outside_function {
            return Err(self.error_at(start, "'return' outside of function"));
        }
        let argument = if self.is_punct(";")
            || self.is_punct("}")
            || self.at_eof()
            || self.peek().newline_before
        {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        self.consume_semicolon()?;
        Ok(StatementType::ReturnStatement {
            meta: self.meta_from(start),
            argument,
        })
    }

    fn parse_try_statement(&mut self) -> PResult<StatementType> {
        let start = self.start();
        self.advance();
        let block = self.parse_block()?;
        let handler = if self.is_keyword("catch") {
            let catch_start = self.start();
            self.advance();
            let param = if self.eat_punct("(") {
                let param = self.parse_binding_target()?;
                self.expect_punct(")")?;
                Some(Box::new(param))
            } else {
                None
            };
            let body = self.parse_block()?;
            Some(CatchClauseData {
                meta: self.meta_from(catch_start),
                param,
                body,
            })
        } else {
            None
        };
        let finalizer = if self.eat_keyword("finally") {
            Some(self.parse_block()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() && !self.tolerant {
            return Err(self.error_at(self.start(), "Missing catch or finally after try"));
        }
        Ok(StatementType::TryStatement {
            meta: self.meta_from(start),
            block,
            handler,
            finalizer,
        })
    }

    fn parse_switch_statement(&mut self) -> PResult<StatementType> {
        let start = self.start();
        self.advance();
        self.expect_punct("(")?;
        let discriminant = self.with_in(|p| p.parse_expression())?;
        self.expect_punct(")")?;
        self.expect_punct("{")?;
        let mut cases = vec![];
        while !self.is_punct("}") && !self.at_eof() {
            let case_start = self.start();
            // A tolerant parse keeps stray statements (a half-typed `ca`) as a
            // label-less case so they stay inside the switch.
            let mut stray = false;
            let test = if self.eat_keyword("case") {
                Some(Box::new(self.with_in(|p| p.parse_expression())?))
            } else if self.eat_keyword("default") {
                None
            } else if self.tolerant {
                stray = true;
                None
            } else {
                return Err(self.unexpected());
            };
            if !stray {
                self.expect_punct(":")?;
            }
            let mut consequent = vec![];
            while !self.is_punct("}")
                && !self.is_keyword("case")
                && !self.is_keyword("default")
                && !self.at_eof()
            {
                let before = self.pos;
                match self.parse_statement() {
                    Ok(stmt) => consequent.push(stmt),
                    Err(e) if !self.tolerant => return Err(e),
                    Err(_) => {}
                }
                self.ensure_progress(before)?;
            }
            cases.push(SwitchCaseData {
                meta: self.meta_from(case_start),
                test,
                consequent,
            });
        }
        self.expect_punct("}")?;
        Ok(StatementType::SwitchStatement {
            meta: self.meta_from(start),
            discriminant: Box::new(discriminant),
            cases,
        })
    }

    fn parse_import_declaration(&mut self) -> PResult<StatementType> {
        let start = self.start();
        self.advance();
        let mut specifiers = vec![];
        if let TokenKind::String(source) = self.peek().kind.clone() {
            self.advance();
            self.consume_semicolon()?;
            return Ok(StatementType::Declaration(
                DeclarationType::ImportDeclaration(ImportDeclarationData {
                    meta: self.meta_from(start),
                    specifiers,
                    source,
                }),
            ));
        }
        if matches!(self.peek().kind, TokenKind::Identifier(_)) && !self.is_keyword("from") {
            let spec_start = self.start();
            let local = self.parse_binding_identifier()?;
            specifiers.push(ImportSpecifierData {
                meta: self.meta_from(spec_start),
                local,
                kind: ImportSpecifierKind::Default,
            });
            self.eat_punct(",");
        }
        if self.is_punct("*") {
            let spec_start = self.start();
            self.advance();
            self.expect_keyword("as")?;
            let local = self.parse_binding_identifier()?;
            specifiers.push(ImportSpecifierData {
                meta: self.meta_from(spec_start),
                local,
                kind: ImportSpecifierKind::Namespace,
            });
        } else if self.eat_punct("{") {
            while !self.is_punct("}") && !self.at_eof() {
                let spec_start = self.start();
                let imported = match self.peek().kind.clone() {
                    TokenKind::Identifier(name) | TokenKind::String(name) => {
                        self.advance();
                        name
                    }
                    _ if self.tolerant => PLACEHOLDER_NAME.to_string(),
                    _ => return Err(self.unexpected()),
                };
                let local = if self.eat_keyword("as") {
                    self.parse_binding_identifier()?
                } else if is_reserved_word(&imported) && !self.tolerant {
                    return Err(self.error_at(spec_start, "Unexpected keyword"));
                } else {
                    IdentifierData {
                        name: imported.clone(),
                        meta: self.meta_from(spec_start),
                    }
                };
                specifiers.push(ImportSpecifierData {
                    meta: self.meta_from(spec_start),
                    local,
                    kind: ImportSpecifierKind::Named { imported },
                });
                if !self.list_separator("}")? {
                    break;
                }
            }
            self.expect_punct("}")?;
        }
        self.expect_keyword("from")?;
        let source = match self.peek().kind.clone() {
            TokenKind::String(s) => {
                self.advance();
                s
            }
            _ if self.tolerant => String::new(),
            _ => return Err(self.unexpected()),
        };
        self.consume_semicolon()?;
        Ok(StatementType::Declaration(
            DeclarationType::ImportDeclaration(ImportDeclarationData {
                meta: self.meta_from(start),
                specifiers,
                source,
            }),
        ))
    }

    // ==== Functions and classes ====

    /// Parses from the `function` keyword; a leading `async` is already consumed.
    fn parse_function(
        &mut self,
        start: usize,
        is_async: bool,
        require_id: bool,
    ) -> PResult<FunctionData> {
        self.expect_keyword("function")?;
        if self.is_punct("*") {
            if !self.tolerant {
                return Err(self.error_at(self.start(), "Generator functions are not supported"));
            }
            self.advance();
        }
        let id = if matches!(self.peek().kind, TokenKind::Identifier(_)) {
            Some(self.parse_binding_identifier()?)
        } else if require_id {
            if self.tolerant {
                Some(self.placeholder())
            } else {
                return Err(self.unexpected());
            }
        } else {
            None
        };
        self.functions.push(FunctionContext { is_async });
        let result = self.parse_function_rest(start, id, is_async);
        self.functions.pop();
        result
    }

    fn parse_function_rest(
        &mut self,
        start: usize,
        id: Option<IdentifierData>,
        is_async: bool,
    ) -> PResult<FunctionData> {
        let params = self.parse_formal_parameters()?;
        let body = self.parse_function_body()?;
        Ok(FunctionData {
            meta: self.meta_from(start),
            id,
            params,
            body: FunctionBodyOrExpression::FunctionBody(body),
            is_async,
            is_arrow: false,
            locals: Locals::new(),
        })
    }

    fn parse_method_function(&mut self, start: usize, is_async: bool) -> PResult<FunctionData> {
        self.functions.push(FunctionContext { is_async });
        let result = self.parse_function_rest(start, None, is_async);
        self.functions.pop();
        result
    }

    fn parse_formal_parameters(&mut self) -> PResult<Vec<PatternType>> {
        self.expect_punct("(")?;
        let saved = self.no_in;
        self.no_in = false;
        let params = self.parse_parameter_list();
        self.no_in = saved;
        let params = params?;
        self.expect_punct(")")?;
        Ok(params)
    }

    fn parse_parameter_list(&mut self) -> PResult<Vec<PatternType>> {
        let mut params = vec![];
        while !self.is_punct(")") && !self.at_eof() {
            if self.is_punct("...") {
                let rest_start = self.start();
                self.advance();
                let argument = self.parse_binding_target()?;
                params.push(PatternType::RestElement {
                    meta: self.meta_from(rest_start),
                    argument: Box::new(argument),
                });
            } else {
                params.push(self.parse_binding_element()?);
            }
            if !self.list_separator(")")? {
                break;
            }
        }
        Ok(params)
    }

    fn parse_function_body(&mut self) -> PResult<FunctionBodyData> {
        if !self.is_punct("{") {
            if self.tolerant {
                return Ok(FunctionBodyData {
                    meta: Meta::new(self.last_end, self.last_end),
                    body: vec![],
                });
            }
            return Err(self.unexpected());
        }
        let start = self.start();
        self.advance();
        let body = self.with_in(|p| p.parse_statement_list())?;
        self.expect_punct("}")?;
        Ok(FunctionBodyData {
            meta: self.meta_from(start),
            body,
        })
    }

    fn parse_class(&mut self, start: usize, require_id: bool) -> PResult<ClassData> {
        self.expect_keyword("class")?;
        let id = if matches!(self.peek().kind, TokenKind::Identifier(_)) && !self.is_keyword("extends")
        {
            Some(self.parse_binding_identifier()?)
        } else if require_id {
            if self.tolerant {
                Some(self.placeholder())
            } else {
                return Err(self.unexpected());
            }
        } else {
            None
        };
        let super_class = if self.eat_keyword("extends") {
            Some(Box::new(self.parse_lhs_expression()?))
        } else {
            None
        };
        self.expect_punct("{")?;
        let mut body = vec![];
        while !self.is_punct("}") && !self.at_eof() {
            if self.eat_punct(";") {
                continue;
            }
            let before = self.pos;
            match self.parse_class_member() {
                Ok(member) => body.push(member),
                Err(e) if !self.tolerant => return Err(e),
                Err(_) => {}
            }
            self.ensure_progress(before)?;
        }
        self.expect_punct("}")?;
        Ok(ClassData {
            meta: self.meta_from(start),
            id,
            super_class,
            body,
            locals: Locals::new(),
        })
    }

    fn next_starts_property_key(&self) -> bool {
        let next = self.peek_at(1);
        matches!(
            next.kind,
            TokenKind::Identifier(_) | TokenKind::String(_) | TokenKind::Number(_)
        ) || next.is_punctuator("[")
    }

    fn parse_class_member(&mut self) -> PResult<ClassMember> {
        let start = self.start();
        let is_static = self.is_keyword("static")
            && !self.peek_at(1).is_punctuator("(")
            && !self.peek_at(1).is_punctuator("=");
        if is_static {
            self.advance();
        }
        let mut kind = MethodDefinitionKind::Method;
        let mut is_async = false;
        if (self.is_keyword("get") || self.is_keyword("set")) && self.next_starts_property_key() {
            kind = if self.is_keyword("get") {
                MethodDefinitionKind::Get
            } else {
                MethodDefinitionKind::Set
            };
            self.advance();
        } else if self.is_keyword("async")
            && self.next_starts_property_key()
            && !self.peek_at(1).newline_before
        {
            is_async = true;
            self.advance();
        }
        let (key, _) = self.parse_property_key()?;
        if self.is_punct("(") {
            let is_constructor =
                matches!(&key, PropertyKey::Named { name, .. } if name == "constructor");
            if !is_static && kind == MethodDefinitionKind::Method && is_constructor {
                kind = MethodDefinitionKind::Constructor;
            }
            let value_start = self.start();
            let value = self.parse_method_function(value_start, is_async)?;
            return Ok(ClassMember::Method(MethodDefinitionData {
                meta: self.meta_from(start),
                key,
                kind,
                is_static,
                value: Rc::new(value),
            }));
        }
        let value = if self.eat_punct("=") {
            // Field initializers run with the instance as `this`, like a method body.
            self.functions.push(FunctionContext { is_async: false });
            let value = self.with_in(|p| p.parse_assignment());
            self.functions.pop();
            Some(Box::new(value?))
        } else {
            None
        };
        self.consume_semicolon()?;
        Ok(ClassMember::Field(FieldDefinitionData {
            meta: self.meta_from(start),
            key,
            is_static,
            value,
        }))
    }

    // ==== Patterns ====

    fn parse_binding_identifier(&mut self) -> PResult<IdentifierData> {
        match self.peek().kind.clone() {
            TokenKind::Identifier(name) if !is_reserved_word(&name) => {
                let token = self.advance();
                Ok(IdentifierData {
                    name,
                    meta: Meta::new(token.start, token.end),
                })
            }
            _ if self.tolerant => Ok(self.placeholder()),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_binding_target(&mut self) -> PResult<PatternType> {
        if self.is_punct("[") {
            self.nested(|p| p.parse_array_pattern())
        } else if self.is_punct("{") {
            self.nested(|p| p.parse_object_pattern())
        } else {
            Ok(PatternType::identifier(self.parse_binding_identifier()?))
        }
    }

    fn parse_binding_element(&mut self) -> PResult<PatternType> {
        let start = self.start();
        let target = self.parse_binding_target()?;
        if self.eat_punct("=") {
            let right = self.with_in(|p| p.parse_assignment())?;
            Ok(PatternType::AssignmentPattern {
                meta: self.meta_from(start),
                left: Box::new(target),
                right: Box::new(right),
            })
        } else {
            Ok(target)
        }
    }

    fn parse_array_pattern(&mut self) -> PResult<PatternType> {
        let start = self.start();
        self.advance();
        let mut elements = vec![];
        while !self.is_punct("]") && !self.at_eof() {
            if self.eat_punct(",") {
                elements.push(None);
                continue;
            }
            if self.is_punct("...") {
                let rest_start = self.start();
                self.advance();
                let argument = self.parse_binding_target()?;
                elements.push(Some(Box::new(PatternType::RestElement {
                    meta: self.meta_from(rest_start),
                    argument: Box::new(argument),
                })));
            } else {
                elements.push(Some(Box::new(self.parse_binding_element()?)));
            }
            if !self.list_separator("]")? {
                break;
            }
        }
        self.expect_punct("]")?;
        Ok(PatternType::ArrayPattern {
            meta: self.meta_from(start),
            elements,
        })
    }

    fn parse_object_pattern(&mut self) -> PResult<PatternType> {
        let start = self.start();
        self.advance();
        let mut properties = vec![];
        while !self.is_punct("}") && !self.at_eof() {
            if self.eat_punct("...") {
                let argument = self.parse_binding_target()?;
                properties.push(ObjectPatternProperty::Rest(Box::new(argument)));
            } else {
                let property_start = self.start();
                let (key, shorthand_id) = self.parse_property_key()?;
                if self.eat_punct(":") {
                    let value = self.parse_binding_element()?;
                    properties.push(ObjectPatternProperty::Property {
                        meta: self.meta_from(property_start),
                        key,
                        value: Box::new(value),
                        shorthand: false,
                    });
                } else {
                    let id = match shorthand_id {
                        Some(id) if !is_reserved_word(&id.name) => id,
                        _ if self.tolerant => self.placeholder(),
                        _ => return Err(self.unexpected()),
                    };
                    let mut value = PatternType::identifier(id);
                    if self.eat_punct("=") {
                        let right = self.with_in(|p| p.parse_assignment())?;
                        value = PatternType::AssignmentPattern {
                            meta: self.meta_from(property_start),
                            left: Box::new(value),
                            right: Box::new(right),
                        };
                    }
                    properties.push(ObjectPatternProperty::Property {
                        meta: self.meta_from(property_start),
                        key,
                        value: Box::new(value),
                        shorthand: true,
                    });
                }
            }
            if !self.list_separator("}")? {
                break;
            }
        }
        self.expect_punct("}")?;
        Ok(PatternType::ObjectPattern {
            meta: self.meta_from(start),
            properties,
        })
    }

    /// Reinterprets an already parsed expression as an assignment target
    /// (`[a, b] = pair`, `for (x.y of list)`).
    fn to_assignment_target(&self, expression: ExpressionType) -> PResult<PatternType> {
        match expression {
            ExpressionType::Identifier(id) => Ok(PatternType::identifier(id)),
            ExpressionType::MemberExpression(m) => Ok(PatternType::PatternWhichCanBeExpression(
                ExpressionPatternType::MemberExpression(m),
            )),
            ExpressionType::ArrayExpression { meta, elements } => {
                let mut targets = vec![];
                for element in elements {
                    targets.push(match element {
                        None => None,
                        Some(ExpressionOrSpreadElement::Expression(e)) => {
                            Some(Box::new(self.to_assignment_target(*e)?))
                        }
                        Some(ExpressionOrSpreadElement::SpreadElement(e)) => {
                            let rest_meta = *e.get_meta();
                            Some(Box::new(PatternType::RestElement {
                                meta: rest_meta,
                                argument: Box::new(self.to_assignment_target(*e)?),
                            }))
                        }
                    });
                }
                Ok(PatternType::ArrayPattern {
                    meta,
                    elements: targets,
                })
            }
            ExpressionType::ObjectExpression { meta, properties } => {
                let mut targets = vec![];
                for property in properties {
                    match property {
                        ObjectProperty::Property(p) if p.kind == PropertyKind::Init && !p.method => {
                            targets.push(ObjectPatternProperty::Property {
                                meta: p.meta,
                                key: p.key,
                                value: Box::new(self.to_assignment_target(*p.value)?),
                                shorthand: p.shorthand,
                            })
                        }
                        ObjectProperty::Spread(e) => targets.push(ObjectPatternProperty::Rest(
                            Box::new(self.to_assignment_target(*e)?),
                        )),
                        ObjectProperty::Property(p) => {
                            return self.invalid_target(p.meta);
                        }
                    }
                }
                Ok(PatternType::ObjectPattern {
                    meta,
                    properties: targets,
                })
            }
            ExpressionType::AssignmentExpression {
                meta,
                operator: AssignmentOperator::Equals,
                left,
                right,
            } => Ok(PatternType::AssignmentPattern { meta, left, right }),
            other => self.invalid_target(*other.get_meta()),
        }
    }

    fn simple_assignment_target(&self, expression: ExpressionType) -> PResult<PatternType> {
        match expression {
            ExpressionType::Identifier(_) | ExpressionType::MemberExpression(_) => {
                self.to_assignment_target(expression)
            }
            other => self.invalid_target(*other.get_meta()),
        }
    }

    fn invalid_target(&self, meta: Meta) -> PResult<PatternType> {
        if self.tolerant {
            Ok(PatternType::identifier(IdentifierData {
                name: PLACEHOLDER_NAME.to_string(),
                meta,
            }))
        } else {
            Err(self.error_at(meta.start_index, "Assigning to rvalue"))
        }
    }

    // ==== Expressions ====

    fn parse_expression(&mut self) -> PResult<ExpressionType> {
        let start = self.start();
        let first = self.parse_assignment()?;
        if !self.is_punct(",") {
            return Ok(first);
        }
        let mut expressions = vec![first];
        while self.eat_punct(",") {
            expressions.push(self.parse_assignment()?);
        }
        Ok(ExpressionType::SequenceExpression {
            meta: self.meta_from(start),
            expressions,
        })
    }

    fn parse_assignment(&mut self) -> PResult<ExpressionType> {
        if self.tolerant && self.depth >= MAX_NESTING_DEPTH {
            return Ok(ExpressionType::Identifier(self.placeholder()));
        }
        self.nested(|p| p.parse_assignment_inner())
    }

    fn parse_assignment_inner(&mut self) -> PResult<ExpressionType> {
        if let Some(arrow) = self.try_parse_arrow()? {
            return Ok(arrow);
        }
        let start = self.start();
        let left = self.parse_conditional()?;
        let operator = match &self.peek().kind {
            TokenKind::Punctuator(p) => assignment_operator(p),
            _ => None,
        };
        let operator = match operator {
            Some(op) => op,
            None => return Ok(left),
        };
        self.advance();
        let target = if operator == AssignmentOperator::Equals {
            self.to_assignment_target(left)?
        } else {
            self.simple_assignment_target(left)?
        };
        let right = self.parse_assignment()?;
        Ok(ExpressionType::AssignmentExpression {
            meta: self.meta_from(start),
            operator,
            left: Box::new(target),
            right: Box::new(right),
        })
    }

    fn arrow_follows_paren(&self, open: usize) -> bool {
        let mut depth = 0usize;
        for i in open..self.tokens.len() {
            match &self.tokens[i].kind {
                TokenKind::Punctuator(p) if p == "(" || p == "[" || p == "{" => depth += 1,
                TokenKind::Punctuator(p) if p == ")" || p == "]" || p == "}" => {
                    if depth == 0 {
                        return false;
                    }
                    depth -= 1;
                    if depth == 0 {
                        return p == ")"
                            && self
                                .tokens
                                .get(i + 1)
                                .map_or(false, |n| n.is_punctuator("=>") && !n.newline_before);
                    }
                }
                TokenKind::Eof => return false,
                _ => {}
            }
        }
        false
    }

    fn arrow_starts_at(&self, offset: usize) -> bool {
        let token = self.peek_at(offset);
        match &token.kind {
            TokenKind::Identifier(name) => {
                let arrow = self.peek_at(offset + 1);
                !is_reserved_word(name) && arrow.is_punctuator("=>") && !arrow.newline_before
            }
            TokenKind::Punctuator(p) if p == "(" => self.arrow_follows_paren(self.pos + offset),
            _ => false,
        }
    }

    fn try_parse_arrow(&mut self) -> PResult<Option<ExpressionType>> {
        let start = self.start();
        let is_async = self.is_keyword("async")
            && !self.peek_at(1).newline_before
            && self.arrow_starts_at(1);
        if !is_async && !self.arrow_starts_at(0) {
            return Ok(None);
        }
        if is_async {
            self.advance();
        }
        let params = if self.is_punct("(") {
            self.parse_formal_parameters()?
        } else {
            vec![PatternType::identifier(self.parse_binding_identifier()?)]
        };
        self.expect_punct("=>")?;
        self.functions.push(FunctionContext { is_async });
        let body = if self.is_punct("{") {
            self.parse_function_body()
                .map(FunctionBodyOrExpression::FunctionBody)
        } else {
            self.parse_assignment()
                .map(|e| FunctionBodyOrExpression::Expression(Box::new(e)))
        };
        self.functions.pop();
        let body = body?;
        Ok(Some(ExpressionType::ArrowFunctionExpression(Rc::new(
            FunctionData {
                meta: self.meta_from(start),
                id: None,
                params,
                body,
                is_async,
                is_arrow: true,
                locals: Locals::new(),
            },
        ))))
    }

    fn parse_conditional(&mut self) -> PResult<ExpressionType> {
        let start = self.start();
        let test = self.parse_binary(1)?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let consequent = self.with_in(|p| p.parse_assignment())?;
        self.expect_punct(":")?;
        let alternate = self.parse_assignment()?;
        Ok(ExpressionType::ConditionalExpression {
            meta: self.meta_from(start),
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn current_binary_operator(&self) -> Option<(BinaryOrLogical, u8)> {
        use BinaryOperator::*;
        let token = self.peek();
        let (op, precedence) = match &token.kind {
            TokenKind::Identifier(name) if name == "instanceof" => {
                (BinaryOrLogical::Binary(InstanceOf), 7)
            }
            TokenKind::Identifier(name) if name == "in" && !self.no_in => {
                (BinaryOrLogical::Binary(In), 7)
            }
            TokenKind::Punctuator(p) => match p.as_str() {
                "||" => (BinaryOrLogical::Logical(LogicalOperator::Or), 1),
                "??" => (BinaryOrLogical::Logical(LogicalOperator::NullishCoalescing), 1),
                "&&" => (BinaryOrLogical::Logical(LogicalOperator::And), 2),
                "|" => (BinaryOrLogical::Binary(BitwiseOr), 3),
                "^" => (BinaryOrLogical::Binary(BitwiseXor), 4),
                "&" => (BinaryOrLogical::Binary(BitwiseAnd), 5),
                "==" => (BinaryOrLogical::Binary(LooselyEqual), 6),
                "!=" => (BinaryOrLogical::Binary(LooselyUnequal), 6),
                "===" => (BinaryOrLogical::Binary(StrictlyEqual), 6),
                "!==" => (BinaryOrLogical::Binary(StrictlyUnequal), 6),
                "<" => (BinaryOrLogical::Binary(LessThan), 7),
                ">" => (BinaryOrLogical::Binary(GreaterThan), 7),
                "<=" => (BinaryOrLogical::Binary(LessThanEqual), 7),
                ">=" => (BinaryOrLogical::Binary(GreaterThanEqual), 7),
                "<<" => (BinaryOrLogical::Binary(BitwiseLeftShift), 8),
                ">>" => (BinaryOrLogical::Binary(BitwiseRightShift), 8),
                ">>>" => (BinaryOrLogical::Binary(BitwiseUnsignedRightShift), 8),
                "+" => (BinaryOrLogical::Binary(Add), 9),
                "-" => (BinaryOrLogical::Binary(Subtract), 9),
                "*" => (BinaryOrLogical::Binary(Multiply), 10),
                "/" => (BinaryOrLogical::Binary(Divide), 10),
                "%" => (BinaryOrLogical::Binary(Modulo), 10),
                "**" => (BinaryOrLogical::Binary(Exponent), 11),
                _ => return None,
            },
            _ => return None,
        };
        Some((op, precedence))
    }

    fn parse_binary(&mut self, min_precedence: u8) -> PResult<ExpressionType> {
        let start = self.start();
        let mut left = self.parse_unary()?;
        let mut links = 0;
        while let Some((op, precedence)) = self.current_binary_operator() {
            if precedence < min_precedence {
                break;
            }
            self.chain_link(&mut links)?;
            self.advance();
            let right_assoc = matches!(op, BinaryOrLogical::Binary(BinaryOperator::Exponent));
            let right = if right_assoc {
                self.nested(|p| p.parse_binary(precedence))?
            } else {
                self.parse_binary(precedence + 1)?
            };
            let meta = self.meta_from(start);
            left = match op {
                BinaryOrLogical::Binary(operator) => ExpressionType::BinaryExpression {
                    meta,
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                BinaryOrLogical::Logical(operator) => ExpressionType::LogicalExpression {
                    meta,
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<ExpressionType> {
        let start = self.start();
        let token = self.peek().clone();
        let operator = match &token.kind {
            TokenKind::Punctuator(p) => match p.as_str() {
                "!" => Some(UnaryOperator::LogicalNot),
                "~" => Some(UnaryOperator::BitwiseNot),
                "+" => Some(UnaryOperator::Plus),
                "-" => Some(UnaryOperator::Minus),
                _ => None,
            },
            TokenKind::Identifier(name) => match name.as_str() {
                "typeof" => Some(UnaryOperator::TypeOf),
                "void" => Some(UnaryOperator::Void),
                "delete" => Some(UnaryOperator::Delete),
                _ => None,
            },
            _ => None,
        };
        if let Some(operator) = operator {
            self.advance();
            let argument = self.nested(|p| p.parse_unary())?;
            return Ok(ExpressionType::UnaryExpression {
                meta: self.meta_from(start),
                operator,
                argument: Box::new(argument),
            });
        }
        if token.is_punctuator("++") || token.is_punctuator("--") {
            self.advance();
            let argument = self.nested(|p| p.parse_unary())?;
            self.check_update_target(&argument)?;
            return Ok(ExpressionType::UpdateExpression {
                meta: self.meta_from(start),
                operator: update_operator(&token),
                argument: Box::new(argument),
                prefix: true,
            });
        }
        if token.is_identifier_name("await") && self.in_async_context() {
            self.advance();
            let argument = self.nested(|p| p.parse_unary())?;
            return Ok(ExpressionType::AwaitExpression {
                meta: self.meta_from(start),
                argument: Box::new(argument),
            });
        }
        let expression = self.parse_lhs_expression()?;
        let next = self.peek().clone();
        if (next.is_punctuator("++") || next.is_punctuator("--")) && !next.newline_before {
            self.check_update_target(&expression)?;
            self.advance();
            return Ok(ExpressionType::UpdateExpression {
                meta: self.meta_from(start),
                operator: update_operator(&next),
                argument: Box::new(expression),
                prefix: false,
            });
        }
        Ok(expression)
    }

    fn check_update_target(&self, expression: &ExpressionType) -> PResult<()> {
        match expression {
            ExpressionType::Identifier(_) | ExpressionType::MemberExpression(_) => Ok(()),
            _ if self.tolerant => Ok(()),
            other => Err(self.error_at(other.get_meta().start_index, "Assigning to rvalue")),
        }
    }

    fn parse_property_name(&mut self) -> PResult<IdentifierData> {
        match self.peek().kind.clone() {
            TokenKind::Identifier(name) => {
                let token = self.advance();
                Ok(IdentifierData {
                    name,
                    meta: Meta::new(token.start, token.end),
                })
            }
            _ if self.tolerant => Ok(self.placeholder()),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_member_suffix(
        &mut self,
        start: usize,
        object: ExpressionOrSuper,
        optional: bool,
    ) -> PResult<ExpressionType> {
        if self.eat_punct("[") {
            let property = self.with_in(|p| p.parse_expression())?;
            self.expect_punct("]")?;
            Ok(ExpressionType::MemberExpression(
                MemberExpressionType::ComputedMemberExpression {
                    meta: self.meta_from(start),
                    object,
                    property: Box::new(property),
                    optional,
                },
            ))
        } else {
            let property = self.parse_property_name()?;
            Ok(ExpressionType::MemberExpression(
                MemberExpressionType::SimpleMemberExpression {
                    meta: self.meta_from(start),
                    object,
                    property,
                    optional,
                },
            ))
        }
    }

    fn parse_lhs_expression(&mut self) -> PResult<ExpressionType> {
        let start = self.start();
        let mut expression = if self.is_keyword("new") {
            ExpressionOrSuper::Expression(Box::new(self.parse_new_expression()?))
        } else if self.is_keyword("super") {
            let token = self.advance();
            ExpressionOrSuper::Super(Meta::new(token.start, token.end))
        } else {
            ExpressionOrSuper::Expression(Box::new(self.parse_primary()?))
        };
        let mut links = 0;
        loop {
            if self.is_punct(".") || self.is_punct("[") || self.is_punct("?.") || self.is_punct("(") {
                self.chain_link(&mut links)?;
            }
            if self.eat_punct(".") {
                expression =
                    ExpressionOrSuper::Expression(Box::new(self.parse_member_suffix(
                        start, expression, false,
                    )?));
            } else if self.is_punct("[") {
                expression =
                    ExpressionOrSuper::Expression(Box::new(self.parse_member_suffix(
                        start, expression, false,
                    )?));
            } else if self.eat_punct("?.") {
                let next = if self.is_punct("(") {
                    let arguments = self.parse_arguments()?;
                    ExpressionType::CallExpression {
                        meta: self.meta_from(start),
                        callee: expression,
                        arguments,
                        optional: true,
                    }
                } else {
                    self.parse_member_suffix(start, expression, true)?
                };
                expression = ExpressionOrSuper::Expression(Box::new(next));
            } else if self.is_punct("(") {
                let arguments = self.parse_arguments()?;
                expression = ExpressionOrSuper::Expression(Box::new(
                    ExpressionType::CallExpression {
                        meta: self.meta_from(start),
                        callee: expression,
                        arguments,
                        optional: false,
                    },
                ));
            } else {
                break;
            }
        }
        match expression {
            ExpressionOrSuper::Expression(e) => Ok(*e),
            ExpressionOrSuper::Super(meta) if self.tolerant => {
                Ok(ExpressionType::Identifier(IdentifierData {
                    name: PLACEHOLDER_NAME.to_string(),
                    meta,
                }))
            }
            ExpressionOrSuper::Super(meta) => {
                Err(self.error_at(meta.start_index, "'super' keyword unexpected here"))
            }
        }
    }

    fn parse_new_expression(&mut self) -> PResult<ExpressionType> {
        let start = self.start();
        self.advance();
        let mut callee = if self.is_keyword("new") {
            self.nested(|p| p.parse_new_expression())?
        } else {
            self.parse_primary()?
        };
        let callee_start = callee.get_meta().start_index;
        loop {
            if self.eat_punct(".") || self.is_punct("[") {
                let object = ExpressionOrSuper::Expression(Box::new(callee));
                callee = self.parse_member_suffix(callee_start, object, false)?;
            } else {
                break;
            }
        }
        let arguments = if self.is_punct("(") {
            self.parse_arguments()?
        } else {
            vec![]
        };
        Ok(ExpressionType::NewExpression {
            meta: self.meta_from(start),
            callee: Box::new(callee),
            arguments,
        })
    }

    fn parse_arguments(&mut self) -> PResult<Vec<ExpressionOrSpreadElement>> {
        self.expect_punct("(")?;
        let arguments = self.with_in(|p| {
            let mut arguments = vec![];
            while !p.is_punct(")") && !p.at_eof() {
                let spread = p.eat_punct("...");
                let argument = Box::new(p.parse_assignment()?);
                arguments.push(if spread {
                    ExpressionOrSpreadElement::SpreadElement(argument)
                } else {
                    ExpressionOrSpreadElement::Expression(argument)
                });
                if !p.list_separator(")")? {
                    break;
                }
                if p.tolerant && p.at_eof() && p.tokens[p.pos - 1].is_punctuator(",") {
                    // `f(a, ` completes the next argument rather than `a`.
                    arguments.push(ExpressionOrSpreadElement::Expression(Box::new(
                        ExpressionType::Identifier(p.placeholder()),
                    )));
                }
            }
            Ok(arguments)
        })?;
        self.expect_punct(")")?;
        Ok(arguments)
    }

    fn parse_primary(&mut self) -> PResult<ExpressionType> {
        let token = self.peek().clone();
        let start = token.start;
        let meta = Meta::new(token.start, token.end);
        match token.kind {
            TokenKind::Identifier(name) => match name.as_str() {
                "this" => {
                    self.advance();
                    Ok(ExpressionType::ThisExpression { meta })
                }
                "null" => {
                    self.advance();
                    Ok(literal(meta, LiteralType::NullLiteral))
                }
                "true" | "false" => {
                    self.advance();
                    Ok(literal(meta, LiteralType::BooleanLiteral(name == "true")))
                }
                "function" => {
                    let f = self.parse_function(start, false, false)?;
                    Ok(ExpressionType::FunctionExpression(Rc::new(f)))
                }
                "async"
                    if self.peek_at(1).is_identifier_name("function")
                        && !self.peek_at(1).newline_before =>
                {
                    self.advance();
                    let f = self.parse_function(start, true, false)?;
                    Ok(ExpressionType::FunctionExpression(Rc::new(f)))
                }
                "class" => {
                    let c = self.parse_class(start, false)?;
                    Ok(ExpressionType::ClassExpression(Rc::new(c)))
                }
                _ if is_reserved_word(&name) => {
                    if self.tolerant {
                        Ok(ExpressionType::Identifier(self.placeholder()))
                    } else {
                        Err(self.unexpected())
                    }
                }
                _ => {
                    self.advance();
                    Ok(ExpressionType::Identifier(IdentifierData { name, meta }))
                }
            },
            TokenKind::Number(n) => {
                self.advance();
                Ok(literal(
                    meta,
                    LiteralType::NumberLiteral(NumberLiteralType::from_f64(n)),
                ))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(literal(meta, LiteralType::StringLiteral(s)))
            }
            TokenKind::Template { .. } => self.parse_template_literal(),
            TokenKind::Punctuator(ref p) if p == "(" => {
                self.advance();
                let expression = self.with_in(|p| p.parse_expression())?;
                self.expect_punct(")")?;
                Ok(expression)
            }
            TokenKind::Punctuator(ref p) if p == "[" => self.parse_array_literal(),
            TokenKind::Punctuator(ref p) if p == "{" => self.parse_object_literal(),
            TokenKind::Invalid {
                kind: InvalidTokenKind::UnterminatedString,
                cooked,
            } if self.tolerant => {
                self.advance();
                Ok(literal(meta, LiteralType::StringLiteral(cooked)))
            }
            TokenKind::Invalid {
                kind: InvalidTokenKind::UnterminatedTemplate,
                cooked,
            } if self.tolerant => {
                self.advance();
                Ok(ExpressionType::TemplateLiteral(TemplateLiteralData {
                    meta,
                    quasis: vec![TemplateElementData { meta, cooked }],
                    expressions: vec![],
                }))
            }
            _ if self.tolerant => Ok(ExpressionType::Identifier(self.placeholder())),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_template_literal(&mut self) -> PResult<ExpressionType> {
        let start = self.start();
        let first = self.advance();
        let mut quasis = vec![];
        let mut expressions = vec![];
        let head_kind = match first.kind {
            TokenKind::Template { kind, cooked } => {
                quasis.push(TemplateElementData {
                    meta: Meta::new(first.start, first.end),
                    cooked,
                });
                kind
            }
            _ => return Err(self.error_at(first.start, "Unexpected token")),
        };
        if head_kind == TemplatePartKind::Head {
            loop {
                expressions.push(self.with_in(|p| p.parse_expression())?);
                let next = self.peek().clone();
                let element_meta = Meta::new(next.start, next.end);
                match next.kind {
                    TokenKind::Template {
                        kind: TemplatePartKind::Middle,
                        cooked,
                    } => {
                        self.advance();
                        quasis.push(TemplateElementData {
                            meta: element_meta,
                            cooked,
                        });
                    }
                    TokenKind::Template {
                        kind: TemplatePartKind::Tail,
                        cooked,
                    } => {
                        self.advance();
                        quasis.push(TemplateElementData {
                            meta: element_meta,
                            cooked,
                        });
                        break;
                    }
                    TokenKind::Invalid {
                        kind: InvalidTokenKind::UnterminatedTemplate,
                        cooked,
                    } if self.tolerant => {
                        self.advance();
                        quasis.push(TemplateElementData {
                            meta: element_meta,
                            cooked,
                        });
                        break;
                    }
                    _ if self.tolerant => break,
                    _ => return Err(self.unexpected()),
                }
            }
        }
        Ok(ExpressionType::TemplateLiteral(TemplateLiteralData {
            meta: self.meta_from(start),
            quasis,
            expressions,
        }))
    }

    fn parse_array_literal(&mut self) -> PResult<ExpressionType> {
        let start = self.start();
        self.advance();
        let elements = self.with_in(|p| {
            let mut elements = vec![];
            while !p.is_punct("]") && !p.at_eof() {
                if p.eat_punct(",") {
                    elements.push(None);
                    continue;
                }
                let spread = p.eat_punct("...");
                let element = Box::new(p.parse_assignment()?);
                elements.push(Some(if spread {
                    ExpressionOrSpreadElement::SpreadElement(element)
                } else {
                    ExpressionOrSpreadElement::Expression(element)
                }));
                if !p.list_separator("]")? {
                    break;
                }
            }
            Ok(elements)
        })?;
        self.expect_punct("]")?;
        Ok(ExpressionType::ArrayExpression {
            meta: self.meta_from(start),
            elements,
        })
    }

    fn parse_object_literal(&mut self) -> PResult<ExpressionType> {
        let start = self.start();
        self.advance();
        let properties = self.with_in(|p| {
            let mut properties = vec![];
            while !p.is_punct("}") && !p.at_eof() {
                if p.eat_punct("...") {
                    properties.push(ObjectProperty::Spread(Box::new(p.parse_assignment()?)));
                } else {
                    properties.push(ObjectProperty::Property(p.parse_object_property()?));
                }
                if !p.list_separator("}")? {
                    break;
                }
            }
            Ok(properties)
        })?;
        self.expect_punct("}")?;
        Ok(ExpressionType::ObjectExpression {
            meta: self.meta_from(start),
            properties,
        })
    }

    fn parse_object_property(&mut self) -> PResult<PropertyData> {
        let start = self.start();
        let mut kind = PropertyKind::Init;
        let mut is_async = false;
        if (self.is_keyword("get") || self.is_keyword("set")) && self.next_starts_property_key() {
            kind = if self.is_keyword("get") {
                PropertyKind::Get
            } else {
                PropertyKind::Set
            };
            self.advance();
        } else if self.is_keyword("async")
            && self.next_starts_property_key()
            && !self.peek_at(1).newline_before
        {
            is_async = true;
            self.advance();
        }
        let (key, shorthand_id) = self.parse_property_key()?;
        if kind != PropertyKind::Init || is_async || self.is_punct("(") {
            let value_start = self.start();
            let f = self.parse_method_function(value_start, is_async)?;
            return Ok(PropertyData {
                meta: self.meta_from(start),
                key,
                value: Box::new(ExpressionType::FunctionExpression(Rc::new(f))),
                kind,
                shorthand: false,
                method: kind == PropertyKind::Init,
            });
        }
        if self.eat_punct(":") {
            let value = self.parse_assignment()?;
            return Ok(PropertyData {
                meta: self.meta_from(start),
                key,
                value: Box::new(value),
                kind,
                shorthand: false,
                method: false,
            });
        }
        let id = match shorthand_id {
            Some(id) if !is_reserved_word(&id.name) => id,
            _ if self.tolerant => self.placeholder(),
            _ => return Err(self.unexpected()),
        };
        Ok(PropertyData {
            meta: self.meta_from(start),
            key,
            value: Box::new(ExpressionType::Identifier(id)),
            kind,
            shorthand: true,
            method: false,
        })
    }

    /// Returns the key, plus the identifier when the key was a bare name
    /// (usable as a shorthand property).
    fn parse_property_key(&mut self) -> PResult<(PropertyKey, Option<IdentifierData>)> {
        let token = self.peek().clone();
        let meta = Meta::new(token.start, token.end);
        match token.kind {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok((
                    PropertyKey::Named {
                        name: name.clone(),
                        meta,
                    },
                    Some(IdentifierData { name, meta }),
                ))
            }
            TokenKind::String(name) => {
                self.advance();
                Ok((PropertyKey::Named { name, meta }, None))
            }
            TokenKind::Number(n) => {
                self.advance();
                Ok((
                    PropertyKey::Named {
                        name: number_to_key(n),
                        meta,
                    },
                    None,
                ))
            }
            TokenKind::Punctuator(ref p) if p == "[" => {
                self.advance();
                let expression = self.with_in(|p| p.parse_assignment())?;
                self.expect_punct("]")?;
                Ok((PropertyKey::Computed(Box::new(expression)), None))
            }
            _ if self.tolerant => {
                let id = self.placeholder();
                Ok((
                    PropertyKey::Named {
                        name: id.name.clone(),
                        meta: id.meta,
                    },
                    Some(id),
                ))
            }
            _ => Err(self.unexpected()),
        }
    }
}

fn literal(meta: Meta, value: LiteralType) -> ExpressionType {
    ExpressionType::Literal(LiteralData { meta, value })
}

fn update_operator(token: &Token) -> UpdateOperator {
    if token.is_punctuator("++") {
        UpdateOperator::PlusPlus
    } else {
        UpdateOperator::MinusMinus
    }
}

fn assignment_operator(p: &str) -> Option<AssignmentOperator> {
    use AssignmentOperator::*;
    Some(match p {
        "=" => Equals,
        "+=" => AddEquals,
        "-=" => SubtractEquals,
        "*=" => MultiplyEquals,
        "/=" => DivideEquals,
        "%=" => ModuloEquals,
        "**=" => ExponentEquals,
        "<<=" => BitwiseLeftShiftEquals,
        ">>=" => BitwiseRightShiftEquals,
        ">>>=" => BitwiseUnsignedRightShiftEquals,
        "|=" => BitwiseOrEquals,
        "&=" => BitwiseAndEquals,
        "^=" => BitwiseXorEquals,
        "&&=" => LogicalAndEquals,
        "||=" => LogicalOrEquals,
        "??=" => NullishEquals,
        _ => return None,
    })
}
