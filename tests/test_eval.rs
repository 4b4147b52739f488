//! Tests for the evaluation context the shell runs commands against.
//!
//! Each test evaluates whole programs through `evaluate_source`, the way
//! consecutive shell commands share one context.

extern crate jsh;

use jsh::runner::ds::error::JErrorType;
use jsh::runner::ds::value::JsValue;
use jsh::runner::eval::jobs::run_ready_jobs;
use jsh::runner::inspect::inspect;
use jsh::runner::plugin::registry::BuiltInRegistry;
use jsh::runner::plugin::types::EvalContext;

fn context() -> EvalContext {
    let mut ctx = EvalContext::new();
    ctx.install_core_builtins(BuiltInRegistry::with_core());
    ctx
}

/// Evaluates `source` in a fresh context.
fn eval(source: &str) -> JsValue {
    context()
        .evaluate_source(source)
        .unwrap_or_else(|e| panic!("{:?} failed: {}", source, e))
}

fn eval_err(source: &str) -> JErrorType {
    match context().evaluate_source(source) {
        Ok(v) => panic!("{:?} gave {:?}", source, v),
        Err(e) => e,
    }
}

// ============================================================================
// Language features
// ============================================================================

mod language_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_closures_keep_their_state() {
        let source = "function counter() { let n = 0; return () => ++n } var c = counter(); c(); c(); c()";
        assert_eq!(eval(source), JsValue::number(3.0));
    }

    #[test]
    fn test_classes_and_inheritance() {
        let source = "
            class Animal { constructor(name) { this.name = name } speak() { return this.name + ' makes a sound' } }
            class Dog extends Animal { speak() { return super.speak() + ' (woof)' } }
            new Dog('Rex').speak()
        ";
        assert_eq!(eval(source), JsValue::string("Rex makes a sound (woof)"));
        assert_eq!(
            eval("class A {} class B extends A {} new B() instanceof A"),
            JsValue::Boolean(true)
        );
    }

    #[test]
    fn test_destructuring_with_defaults_and_rest() {
        let source = "const { a, b: [first, ...others], c = 'dflt' } = { a: 1, b: [2, 3, 4] }; a + first + others.length + c";
        assert_eq!(eval(source), JsValue::string("5dflt"));
    }

    #[test]
    fn test_spread_and_template_literals() {
        let source = "const xs = [1, 2]; const ys = [...xs, 3]; `${ys.length}:${Math.max(...ys)}`";
        assert_eq!(eval(source), JsValue::string("3:3"));
    }

    #[test]
    fn test_optional_chaining_and_nullish() {
        assert_eq!(eval("var o = null; o?.deep.value ?? 'none'"), JsValue::string("none"));
        assert_eq!(eval("var o = { f: null }; o.f?.()"), JsValue::Undefined);
    }

    #[test]
    fn test_typeof_undeclared_is_undefined() {
        assert_eq!(eval("typeof nowhere"), JsValue::string("undefined"));
    }

    #[test]
    fn test_engine_errors_surface_by_kind() {
        assert!(matches!(eval_err("nowhere + 1"), JErrorType::ReferenceError(_)));
        assert!(matches!(eval_err("null.x"), JErrorType::TypeError(_)));
        assert!(matches!(eval_err("throw 5"), JErrorType::Thrown(_)));
    }
}

// ============================================================================
// Built-in objects
// ============================================================================

mod builtin_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_array_methods() {
        assert_eq!(
            eval("[3, 1, 2].map(n => n * 2).filter(n => n > 2).join('-')"),
            JsValue::string("6-4")
        );
        assert_eq!(eval("[1, 2, 3].reduce((a, b) => a + b, 0)"), JsValue::number(6.0));
    }

    #[test]
    fn test_json_round_trip_keeps_key_order() {
        assert_eq!(
            eval("JSON.stringify(JSON.parse('{\"b\":1,\"a\":[true,null]}'))"),
            JsValue::string("{\"b\":1,\"a\":[true,null]}")
        );
    }

    #[test]
    fn test_map_keeps_insertion_order() {
        assert_eq!(
            eval("const m = new Map(); m.set('z', 1); m.set('a', 2); [...m.keys()].join(',') + m.get('a')"),
            JsValue::string("z,a2")
        );
    }

    #[test]
    fn test_oversized_strings_throw_range_errors() {
        for source in [
            "'ab'.repeat(1e12)",
            "'a'.padStart(1e12)",
            "'a'.padEnd(1e12, 'xyz')",
        ] {
            match eval_err(source) {
                JErrorType::RangeError(m) => assert_eq!(m, "Invalid string length", "{}", source),
                other => panic!("{:?} gave {:?}", source, other),
            }
        }
        assert_eq!(
            eval("var n; try { 'ab'.repeat(1e12) } catch (e) { n = e.name } n"),
            JsValue::string("RangeError")
        );
    }

    #[test]
    fn test_oversized_arrays_throw_range_errors() {
        for source in ["new Array(4294967295)", "Array.from({ length: 1e12 })"] {
            match eval_err(source) {
                JErrorType::RangeError(m) => assert_eq!(m, "Invalid array length", "{}", source),
                other => panic!("{:?} gave {:?}", source, other),
            }
        }
        assert_eq!(eval("new Array(3).length"), JsValue::number(3.0));
    }

    #[test]
    fn test_inspect_formats_values() {
        let mut ctx = context();
        let value = ctx
            .evaluate_source("({ list: [1, 'two'], f: function named() {} })")
            .unwrap();
        let text = inspect(&value);
        assert!(text.contains("list: [ 1, 'two' ]"), "{}", text);
        assert!(text.contains("[Function: named]"), "{}", text);
    }
}

// ============================================================================
// Promises and timers
// ============================================================================

mod async_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_then_callbacks_run_as_microtasks() {
        let mut ctx = context();
        ctx.evaluate_source("var seen = []; Promise.resolve(1).then(v => seen.push(v)); seen.push(0)")
            .unwrap();
        assert_eq!(ctx.evaluate_source("seen.join()").unwrap(), JsValue::string("0"));
        run_ready_jobs(&mut ctx).unwrap();
        assert_eq!(ctx.evaluate_source("seen.join()").unwrap(), JsValue::string("0,1"));
    }

    #[test]
    fn test_async_function_result_is_awaited() {
        let source = "async function twice(x) { return x * 2 } await twice(21)";
        assert_eq!(eval(source), JsValue::number(42.0));
    }

    #[test]
    fn test_await_waits_for_timers() {
        let source = "await new Promise(resolve => setTimeout(() => resolve('done'), 5))";
        assert_eq!(eval(source), JsValue::string("done"));
    }

    #[test]
    fn test_cleared_timer_never_fires() {
        let mut ctx = context();
        ctx.evaluate_source("var fired = false; var t = setTimeout(() => { fired = true }, 0); clearTimeout(t)")
            .unwrap();
        run_ready_jobs(&mut ctx).unwrap();
        assert_eq!(ctx.lookup_global("fired"), Some(JsValue::Boolean(false)));
        assert!(ctx.jobs.is_idle());
    }
}

// ============================================================================
// Limits
// ============================================================================

mod limit_tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::Ordering;
    use std::time::{Duration, Instant};

    #[test]
    fn test_deadline_stops_an_endless_loop() {
        let mut ctx = context();
        ctx.deadline = Some(Instant::now() + Duration::from_millis(20));
        assert!(matches!(
            ctx.evaluate_source("while (true) {}"),
            Err(JErrorType::Timeout)
        ));
    }

    #[test]
    fn test_interrupt_flag_cancels_and_cannot_be_caught() {
        let mut ctx = context();
        ctx.interrupt_handle().store(true, Ordering::SeqCst);
        assert!(matches!(
            ctx.evaluate_source("try { while (true) {} } catch (e) { 'caught' }"),
            Err(JErrorType::Cancelled)
        ));
        ctx.clear_interrupt();
        assert_eq!(ctx.evaluate_source("1").unwrap(), JsValue::number(1.0));
    }
}
