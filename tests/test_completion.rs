//! Tests for completion of names and property paths.

extern crate jsh;

use std::collections::BTreeSet;
use std::time::Duration;

use quickcheck::{QuickCheck, TestResult};

use jsh::parser::{is_reserved_word, JsParser};
use jsh::repl::completion::{complete, Completions};
use jsh::repl::keywords::RESERVED_KEYWORDS;
use jsh::runner::ds::value::JsValue;
use jsh::runner::plugin::registry::BuiltInRegistry;
use jsh::runner::plugin::types::EvalContext;

const TIMEOUT: Duration = Duration::from_millis(200);

/// A context with the standard globals and whatever `setup` declares.
fn context(setup: &str) -> EvalContext {
    let mut ctx = EvalContext::new();
    ctx.install_core_builtins(BuiltInRegistry::with_core());
    if !setup.is_empty() {
        ctx.evaluate_source(setup).unwrap();
    }
    ctx
}

/// Completes `text` with the cursor at its end.
fn complete_at_end(ctx: &mut EvalContext, text: &str) -> Completions {
    complete(text, text.len(), ctx, &JsParser::new(), TIMEOUT)
}

fn candidates(ctx: &mut EvalContext, text: &str) -> Vec<String> {
    complete_at_end(ctx, text).candidates
}

// ============================================================================
// Identifiers
// ============================================================================

mod identifier_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_global_prefix() {
        let mut ctx = context("var foo = 1");
        let found = complete_at_end(&mut ctx, "Ma");
        assert_eq!(found.candidates, vec!["Map", "Math"]);
        assert_eq!(found.filter, "Ma");

        let found = complete_at_end(&mut ctx, "Mat");
        assert_eq!(found.candidates, vec!["Math"]);
        assert_eq!(found.filter, "Mat");
    }

    #[test]
    fn test_keywords_mix_with_bindings() {
        let mut ctx = context("var foo = 1");
        assert_eq!(candidates(&mut ctx, "fo"), vec!["foo", "for"]);
    }

    #[test]
    fn test_locals_of_enclosing_function() {
        let mut ctx = context("");
        assert_eq!(
            candidates(&mut ctx, "function f(param) { return par"),
            vec!["param", "parseFloat", "parseInt"]
        );
    }

    #[test]
    fn test_placeholder_is_an_empty_prefix() {
        let mut ctx = context("");
        let found = complete_at_end(&mut ctx, "let total = 1 + ");
        assert_eq!(found.filter, "");
        assert!(found.candidates.contains(&"Math".to_string()));
        assert!(found.candidates.contains(&"total".to_string()));
    }

    #[test]
    fn test_new_offers_no_keywords() {
        let mut ctx = context("");
        assert!(!candidates(&mut ctx, "t").is_empty());
        assert_eq!(candidates(&mut ctx, "new t"), Vec::<String>::new());
        assert_eq!(candidates(&mut ctx, "new Ma"), vec!["Map", "Math"]);
    }

    #[test]
    fn test_new_binding_name_is_not_completed() {
        let mut ctx = context("var total = 1");
        assert_eq!(candidates(&mut ctx, "let tot"), Vec::<String>::new());
    }

    #[test]
    fn test_switch_case_label() {
        let mut ctx = context("");
        assert_eq!(candidates(&mut ctx, "switch (x) { ca"), vec!["case"]);
    }
}

// ============================================================================
// Member paths
// ============================================================================

mod member_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_members_of_a_global() {
        let mut ctx = context("");
        let found = complete_at_end(&mut ctx, "Math.fl");
        assert_eq!(found.candidates, vec!["floor"]);
        assert_eq!(found.filter, "fl");
    }

    #[test]
    fn test_nested_path_is_evaluated() {
        let mut ctx = context("var o = { inner: { alpha: 1, beta: 2 }, f() { return {} } }");
        assert_eq!(candidates(&mut ctx, "o.inner.a"), vec!["alpha"]);
        let all = candidates(&mut ctx, "o.inner.");
        assert!(all.contains(&"alpha".to_string()));
        assert!(all.contains(&"beta".to_string()));
    }

    #[test]
    fn test_paths_with_calls_are_not_evaluated() {
        let mut ctx = context("var calls = 0; var o = { f() { calls++; return { x: 1 } } }");
        assert_eq!(candidates(&mut ctx, "o.f().x"), Vec::<String>::new());
        assert_eq!(ctx.evaluate_source("calls").unwrap(), JsValue::number(0.0));
    }

    #[test]
    fn test_this_is_not_completed() {
        let mut ctx = context("");
        assert_eq!(candidates(&mut ctx, "this.x"), Vec::<String>::new());
    }

    #[test]
    fn test_unknown_object_gives_nothing() {
        let mut ctx = context("");
        assert_eq!(candidates(&mut ctx, "nothing.here"), Vec::<String>::new());
    }

    #[test]
    fn test_computed_string_key_filters_like_a_name() {
        let mut ctx = context("var o = { apple: 1, apricot: 2, berry: 3 }");
        assert_eq!(candidates(&mut ctx, "o['ap']"), vec!["apple", "apricot"]);
        assert_eq!(candidates(&mut ctx, "o['apple']"), vec!["apple"]);
    }

    #[test]
    fn test_object_literal_receiver() {
        let mut ctx = context("");
        assert_eq!(candidates(&mut ctx, "x = {alpha: 1, beta: 2}.al"), vec!["alpha"]);
        let all = candidates(&mut ctx, "x = {alpha: 1, beta: 2}.");
        assert!(all.contains(&"alpha".to_string()));
        assert!(all.contains(&"beta".to_string()));
    }

    #[test]
    fn test_string_members_come_from_the_prototype() {
        let mut ctx = context("var s = 'abc'");
        let found = candidates(&mut ctx, "s.toUpp");
        assert_eq!(found, vec!["toUpperCase"]);
    }
}

// ============================================================================
// Whole-namespace listings
// ============================================================================

mod listing_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_input_lists_everything() {
        let mut ctx = context("var foo = 1");
        let found = complete_at_end(&mut ctx, "");
        assert_eq!(found.filter, "");
        for name in ["foo", "Math", "let", "while"] {
            assert!(found.candidates.contains(&name.to_string()), "{}", name);
        }
    }

    #[test]
    fn test_after_a_finished_statement() {
        let mut ctx = context("");
        let found = complete_at_end(&mut ctx, "let zed = 1; ");
        assert_eq!(found.filter, "");
        assert!(found.candidates.contains(&"zed".to_string()));
        assert!(found.candidates.contains(&"console".to_string()));
    }

    #[test]
    fn test_candidates_are_sorted_and_unique() {
        let mut ctx = context("var Map2 = 1");
        let found = candidates(&mut ctx, "");
        let mut sorted = found.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(found, sorted);
    }

    #[test]
    fn test_cursor_inside_text() {
        let mut ctx = context("");
        let found = complete("Math.fl + 1", 7, &mut ctx, &JsParser::new(), TIMEOUT);
        assert_eq!(found.candidates, vec!["floor"]);
    }
}

#[test]
fn test_identifier_prefix_property() {
    fn prop(letters: Vec<u8>) -> TestResult {
        let prefix: String = letters
            .iter()
            .take(4)
            .map(|b| {
                let alphabet = b"abcdefghijklmnopqrstuvwxyzMPSO";
                alphabet[*b as usize % alphabet.len()] as char
            })
            .collect();
        if prefix.is_empty() || is_reserved_word(&prefix) || RESERVED_KEYWORDS.contains(prefix.as_str()) {
            return TestResult::discard();
        }
        let mut ctx = context("");
        let allowed: BTreeSet<String> = ctx
            .global_names()
            .into_iter()
            .chain(RESERVED_KEYWORDS.iter().map(|k| k.to_string()))
            .collect();
        let found = complete_at_end(&mut ctx, &prefix);
        TestResult::from_bool(
            found.filter == prefix
                && found
                    .candidates
                    .iter()
                    .all(|c| c.starts_with(&prefix) && allowed.contains(c)),
        )
    }
    QuickCheck::new()
        .tests(100)
        .quickcheck(prop as fn(Vec<u8>) -> TestResult);
}
