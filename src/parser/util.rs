use std::collections::HashSet;

lazy_static! {
    /// Words that can never be used as binding or reference identifiers.
    static ref RESERVED_WORDS: HashSet<&'static str> = [
        "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete",
        "do", "else", "enum", "export", "extends", "false", "finally", "for", "function", "if",
        "import", "in", "instanceof", "new", "null", "return", "super", "switch", "this",
        "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield",
    ]
    .iter()
    .copied()
    .collect();
}

pub fn is_reserved_word(name: &str) -> bool {
    RESERVED_WORDS.contains(name)
}

/// One-based line and zero-based column of a byte offset.
pub fn line_column(source: &str, position: usize) -> (usize, usize) {
    let mut position = position.min(source.len());
    while !source.is_char_boundary(position) {
        position -= 1;
    }
    let before = &source[..position];
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(i) => before[i + 1..].chars().count(),
        None => before.chars().count(),
    };
    (line, column)
}

/// Property key form of a numeric literal, e.g. `{1: x}` or `{1.5: x}`.
pub fn number_to_key(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
