//! Keyword tables used by completion.

use std::collections::BTreeSet;

lazy_static! {
    /// Every keyword offered where any identifier may appear.
    pub static ref RESERVED_KEYWORDS: BTreeSet<&'static str> = [
        "async", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
        "default", "delete", "do", "else", "extends", "false", "finally", "for", "function",
        "if", "import", "in", "instanceof", "let", "new", "null", "of", "return", "static",
        "super", "switch", "this", "throw", "true", "try", "typeof", "undefined", "var", "void",
        "while",
    ]
    .iter()
    .copied()
    .collect();

    /// Keywords that can open a statement inside an empty block.
    pub static ref EMPTY_BLOCK_KEYWORDS: Vec<&'static str> = vec![
        "async", "await", "break", "class", "const", "continue", "debugger", "delete", "do",
        "for", "function", "if", "let", "new", "return", "switch", "this", "throw", "try",
        "typeof", "var", "void", "while",
    ];
}

/// Prefixes of `case` and `default` complete to the keyword inside a switch body.
pub fn switch_label_keyword(prefix: &str) -> Option<&'static str> {
    if prefix.is_empty() {
        return None;
    }
    ["case", "default"]
        .iter()
        .copied()
        .find(|k| k.starts_with(prefix))
}
