//! Tokenizer for the shell's expression language.
//!
//! The pest grammar only recognises token shapes; this module turns the pest
//! pairs into a flat [`Token`] stream with byte offsets, cooks string escapes,
//! flattens template literals and records line breaks for semicolon insertion.

use pest::iterators::Pair;
use pest::Parser;

#[derive(pest_derive::Parser)]
#[grammar = "parser/js_grammar.pest"]
pub struct JsLexer;

#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePartKind {
    NoSubstitution,
    Head,
    Middle,
    Tail,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvalidTokenKind {
    UnterminatedString,
    UnterminatedTemplate,
    UnterminatedComment,
    UnexpectedCharacter,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifier names, keywords included. The parser decides what is reserved.
    Identifier(String),
    Punctuator(String),
    Number(f64),
    String(String),
    Template {
        kind: TemplatePartKind,
        cooked: String,
    },
    Invalid {
        kind: InvalidTokenKind,
        /// Best-effort cooked content, used by the tolerant parser.
        cooked: String,
    },
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    pub newline_before: bool,
}

impl Token {
    pub fn is_punctuator(&self, p: &str) -> bool {
        matches!(&self.kind, TokenKind::Punctuator(s) if s == p)
    }

    pub fn is_identifier_name(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::Identifier(s) if s == name)
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    /// Text of the token as written in `source`.
    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        &source[self.start..self.end]
    }
}

struct TokenSink<'s> {
    source: &'s str,
    tokens: Vec<Token>,
    pending_newline: bool,
}

impl<'s> TokenSink<'s> {
    fn push(&mut self, kind: TokenKind, start: usize, end: usize) {
        self.tokens.push(Token {
            kind,
            start,
            end,
            newline_before: self.pending_newline,
        });
        self.pending_newline = false;
    }

    fn visit(&mut self, pair: Pair<'s, Rule>) {
        let span = pair.as_span();
        let (start, end) = (span.start(), span.end());
        let text = pair.as_str();
        match pair.as_rule() {
            Rule::line_terminator => self.pending_newline = true,
            Rule::whitespace | Rule::line_comment | Rule::EOI => {}
            Rule::block_comment => {
                if text.contains(|c: char| matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')) {
                    self.pending_newline = true;
                }
            }
            Rule::unterminated_comment => self.push(
                TokenKind::Invalid {
                    kind: InvalidTokenKind::UnterminatedComment,
                    cooked: String::new(),
                },
                start,
                end,
            ),
            Rule::string => {
                let cooked = cook_escapes(&text[1..text.len() - 1]);
                self.push(TokenKind::String(cooked), start, end)
            }
            Rule::unterminated_string => {
                let cooked = cook_escapes(text[1..].trim_end_matches('\\'));
                self.push(
                    TokenKind::Invalid {
                        kind: InvalidTokenKind::UnterminatedString,
                        cooked,
                    },
                    start,
                    end,
                )
            }
            Rule::template => self.visit_template(pair),
            Rule::unterminated_template => self.visit_unterminated_template(pair),
            Rule::number => self.push(TokenKind::Number(parse_number(text)), start, end),
            Rule::identifier_name => {
                self.push(TokenKind::Identifier(text.to_string()), start, end)
            }
            Rule::punctuator | Rule::open_brace | Rule::close_brace => {
                self.push(TokenKind::Punctuator(text.to_string()), start, end)
            }
            Rule::brace_group => {
                for inner in pair.into_inner() {
                    self.visit(inner);
                }
            }
            Rule::unknown => self.push(
                TokenKind::Invalid {
                    kind: InvalidTokenKind::UnexpectedCharacter,
                    cooked: text.to_string(),
                },
                start,
                end,
            ),
            _ => {
                for inner in pair.into_inner() {
                    self.visit(inner);
                }
            }
        }
    }

    fn visit_template(&mut self, pair: Pair<'s, Rule>) {
        let span = pair.as_span();
        let mut part_start = span.start();
        let mut cooked = String::new();
        let mut substitutions = 0;
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::template_chunk => cooked.push_str(&cook_escapes(inner.as_str())),
                Rule::template_substitution => {
                    let sub = inner.as_span();
                    let kind = if substitutions == 0 {
                        TemplatePartKind::Head
                    } else {
                        TemplatePartKind::Middle
                    };
                    self.push(
                        TokenKind::Template {
                            kind,
                            cooked: std::mem::take(&mut cooked),
                        },
                        part_start,
                        sub.start() + 2,
                    );
                    for token in inner.into_inner() {
                        self.visit(token);
                    }
                    // The closing `}` belongs to the next template part.
                    part_start = sub.end() - 1;
                    substitutions += 1;
                }
                _ => {}
            }
        }
        let kind = if substitutions == 0 {
            TemplatePartKind::NoSubstitution
        } else {
            TemplatePartKind::Tail
        };
        self.push(TokenKind::Template { kind, cooked }, part_start, span.end());
    }
}

impl<'s> TokenSink<'s> {
    /// Emits the parts that could be recognised. A still-open substitution
    /// leaves its tokens last in the stream; otherwise the unterminated rest
    /// of the template becomes an invalid token.
    fn visit_unterminated_template(&mut self, pair: Pair<'s, Rule>) {
        let span = pair.as_span();
        let mut part_start = span.start();
        let mut cooked = String::new();
        let mut substitutions = 0;
        let mut open = false;
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::template_chunk => cooked.push_str(&cook_escapes(inner.as_str())),
                Rule::template_substitution | Rule::open_substitution => {
                    let sub = inner.as_span();
                    let closed = inner.as_rule() == Rule::template_substitution;
                    let kind = if substitutions == 0 {
                        TemplatePartKind::Head
                    } else {
                        TemplatePartKind::Middle
                    };
                    self.push(
                        TokenKind::Template {
                            kind,
                            cooked: std::mem::take(&mut cooked),
                        },
                        part_start,
                        sub.start() + 2,
                    );
                    for token in inner.into_inner() {
                        self.visit(token);
                    }
                    part_start = if closed { sub.end() - 1 } else { sub.end() };
                    substitutions += 1;
                    open = !closed;
                }
                Rule::template_rest => cooked.push_str(&cook_escapes(inner.as_str())),
                _ => {}
            }
        }
        if !open || part_start < span.end() {
            self.push(
                TokenKind::Invalid {
                    kind: InvalidTokenKind::UnterminatedTemplate,
                    cooked,
                },
                part_start,
                span.end(),
            );
        }
    }
}

/// Tokenize `source`. The result always ends with an [`TokenKind::Eof`] token.
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut sink = TokenSink {
        source,
        tokens: Vec::new(),
        pending_newline: false,
    };
    match JsLexer::parse(Rule::tokens, source) {
        Ok(pairs) => {
            for pair in pairs {
                sink.visit(pair);
            }
        }
        Err(_) => {
            // `unknown` matches any character so this is unreachable in
            // practice; keep the stream well-formed anyway.
            sink.tokens.clear();
            sink.push(
                TokenKind::Invalid {
                    kind: InvalidTokenKind::UnexpectedCharacter,
                    cooked: source.to_string(),
                },
                0,
                source.len(),
            );
        }
    }
    let end = sink.source.len();
    sink.push(TokenKind::Eof, end, end);
    sink.tokens
}

fn parse_number(text: &str) -> f64 {
    let radix = |digits: &str, radix: u32| {
        u64::from_str_radix(digits, radix)
            .map(|n| n as f64)
            .unwrap_or(f64::INFINITY)
    };
    let lower = text.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        radix(hex, 16)
    } else if let Some(oct) = lower.strip_prefix("0o") {
        radix(oct, 8)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        radix(bin, 2)
    } else {
        text.parse::<f64>().unwrap_or(f64::NAN)
    }
}

/// Cook the escape sequences of a string or template body.
pub fn cook_escapes(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            None => {}
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{08}'),
            Some('f') => out.push('\u{0C}'),
            Some('v') => out.push('\u{0B}'),
            Some('0') => out.push('\0'),
            Some('\r') => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            Some('\n') | Some('\u{2028}') | Some('\u{2029}') => {}
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => {
                        out.push('x');
                        out.push_str(&hex);
                    }
                }
            }
            Some('u') => {
                let hex: String = if chars.peek() == Some(&'{') {
                    chars.next();
                    let digits: String = chars.by_ref().take_while(|c| *c != '}').collect();
                    digits
                } else {
                    chars.by_ref().take(4).collect()
                };
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => out.push('\u{FFFD}'),
                }
            }
            Some(other) => out.push(other),
        }
    }
    out
}
