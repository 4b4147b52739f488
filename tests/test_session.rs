//! End-to-end tests of a shell session: input lines in, output lines out.

extern crate jsh;

use std::fs;
use std::rc::Rc;

use indoc::indoc;
use jsh::parser::MAX_NESTING_DEPTH;
use jsh::repl::{ReplOptions, Session, ShellError, SHELL_STACK_SIZE};
use jsh::runner::ds::value::JsValue;
use jsh::runner::std_lib::console::BufferedConsole;

/// A session whose console output is captured.
fn session() -> (Session, Rc<BufferedConsole>) {
    let console = Rc::new(BufferedConsole::new());
    let session = Session::with_console(ReplOptions::default(), console.clone());
    (session, console)
}

/// Feeds each line and waits for the command it completes.
fn feed(session: &mut Session, lines: &[&str]) -> Vec<String> {
    let mut output = vec![];
    for line in lines {
        output.extend(session.process_line(line));
        output.extend(session.wait_for_command());
    }
    output
}

/// Runs `f` on a thread with the stack the shell binary gives a session.
fn on_shell_stack<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    std::thread::Builder::new()
        .stack_size(SHELL_STACK_SIZE)
        .spawn(f)
        .unwrap()
        .join()
        .unwrap()
}

fn strings(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|l| l.to_string()).collect()
}

// ============================================================================
// Running commands
// ============================================================================

mod command_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_multiline_function_then_call() {
        let (mut session, _) = session();
        assert!(session.process_line("function f(x) {").is_empty());
        assert!(session.is_continuing());
        assert!(session.process_line("  return x+1").is_empty());
        assert_eq!(session.process_line("}"), strings(&["Out[1]: [Function: f]"]));
        assert!(!session.is_continuing());
        assert_eq!(feed(&mut session, &["f(2)"]), strings(&["Out[2]: 3"]));
    }

    #[test]
    fn test_sequence_ids_count_every_command() {
        let (mut session, _) = session();
        let output = feed(&mut session, &["1 + 1", "let x = 'hi'", "x"]);
        // A trailing declaration echoes the value it bound.
        assert_eq!(
            output,
            strings(&["Out[1]: 2", "Out[2]: 'hi'", "Out[3]: 'hi'"])
        );
        let ids: Vec<usize> = session.history().iter().map(|e| e.sequence_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(session.prompt(), "In [4]: ");
    }

    #[test]
    fn test_blank_lines_are_not_commands() {
        let (mut session, _) = session();
        assert!(feed(&mut session, &["", "   ", "// note"]).is_empty());
        assert!(session.history().is_empty());
        assert_eq!(session.prompt(), "In [1]: ");
    }

    #[test]
    fn test_object_literal_is_echoed() {
        let (mut session, _) = session();
        let output = feed(&mut session, &["{'a': 1}"]);
        assert_eq!(output.len(), 1);
        assert!(output[0].starts_with("Out[1]: {"), "{}", output[0]);
        assert!(output[0].contains("a: 1"), "{}", output[0]);
    }

    #[test]
    fn test_last_result_is_ans() {
        let (mut session, _) = session();
        let output = feed(&mut session, &["20 + 1", "ans * 2"]);
        assert_eq!(output, strings(&["Out[1]: 21", "Out[2]: 42"]));
    }

    #[test]
    fn test_console_output_goes_to_the_console() {
        let (mut session, console) = session();
        let output = feed(&mut session, &["console.log('hello', 1 + 1)"]);
        assert!(output.is_empty());
        assert_eq!(console.text(), strings(&["hello 2"]));
    }

    #[test]
    fn test_syntax_error_is_reported_and_recorded() {
        let (mut session, _) = session();
        let output = feed(&mut session, &["let x = = 2"]);
        assert_eq!(output, strings(&["Error: Unexpected token (1:8)"]));
        assert!(session.last_failed());
        let entry = &session.history()[0];
        assert_eq!(entry.raw_text, "let x = = 2");
        assert!(!entry.succeeded);
        assert!(!session.is_continuing());
    }

    #[test]
    fn test_top_level_return_is_refused() {
        let (mut session, _) = session();
        let output = feed(&mut session, &["return 1"]);
        assert_eq!(output, strings(&["Error: Illegal return statement"]));
        assert!(session.last_failed());
        assert!(!session.history()[0].succeeded);
        assert_eq!(feed(&mut session, &["(() => { return 1 })()"]), strings(&["Out[2]: 1"]));
    }

    #[test]
    fn test_trailing_comment_after_semicolon_is_silent() {
        let (mut session, _) = session();
        assert!(feed(&mut session, &["1 + 1; // quiet"]).is_empty());
        assert_eq!(feed(&mut session, &["ans"]), strings(&["Out[2]: 2"]));
    }

    #[test]
    fn test_runtime_error_is_reported() {
        let (mut session, _) = session();
        let output = feed(&mut session, &["missing + 1"]);
        assert_eq!(
            output,
            strings(&["Uncaught ReferenceError: missing is not defined"])
        );
        assert!(session.last_failed());
        // The session keeps working.
        assert_eq!(feed(&mut session, &["2"]), strings(&["Out[2]: 2"]));
        assert!(!session.last_failed());
    }

    #[test]
    fn test_async_command_echoes_when_settled() {
        let (mut session, _) = session();
        let output = feed(
            &mut session,
            &["await new Promise(r => setTimeout(() => r(5), 5))"],
        );
        assert_eq!(output, strings(&["Out[1]: 5"]));
        assert!(!session.is_busy());
    }

    #[test]
    fn test_timers_fire_while_idle() {
        let (mut session, console) = session();
        feed(&mut session, &["setTimeout(() => console.log('tick'), 5); 0"]);
        session.run_until_idle();
        assert_eq!(console.text(), strings(&["tick"]));
    }
}

// ============================================================================
// Interrupts and reset
// ============================================================================

mod control_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_interrupt_discards_unfinished_input() {
        let (mut session, _) = session();
        session.process_line("function f() {");
        assert!(session.is_continuing());
        assert!(session.interrupt().is_empty());
        assert!(!session.is_continuing());
        assert_eq!(feed(&mut session, &["1"]), strings(&["Out[1]: 1"]));
    }

    #[test]
    fn test_interrupt_cancels_an_async_command() {
        let (mut session, _) = session();
        session.process_line("await new Promise(r => setTimeout(r, 20))");
        assert!(session.is_busy());
        let mut output = session.interrupt();
        output.extend(session.wait_for_command());
        assert_eq!(output, strings(&["Command execution terminated."]));
        assert!(!session.is_busy());
        assert!(session.last_failed());
    }

    #[test]
    fn test_reset_is_refused_while_busy() {
        let (mut session, _) = session();
        session.process_line("await new Promise(r => setTimeout(r, 5))");
        assert!(matches!(session.reset(), Err(ShellError::Busy(_))));
        session.wait_for_command();
        assert!(session.reset().is_ok());
    }

    #[test]
    fn test_reset_forgets_everything() {
        let (mut session, _) = session();
        feed(&mut session, &["var kept = 1"]);
        session.reset().unwrap();
        assert_eq!(session.context().lookup_global("kept"), None);
        assert!(session.history().is_empty());
        assert_eq!(session.prompt(), "In [1]: ");
        // The old binding cannot clash with a new declaration.
        assert_eq!(feed(&mut session, &["let kept = 2"]), strings(&["Out[1]: 2"]));
        assert!(!session.last_failed());
    }
}

// ============================================================================
// Files
// ============================================================================

mod file_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_load_stops_at_the_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.js");
        fs::write(
            &path,
            indoc! {"
                var a = 1
                function g() {
                  return a + 1
                }
                g()
                throw new Error('stop')
                var after = 1
            "},
        )
        .unwrap();

        let (mut session, _) = session();
        let output = session.load(&path).unwrap();
        assert_eq!(
            output,
            strings(&[
                "Out[1]: 1",
                "Out[2]: [Function: g]",
                "Out[3]: 2",
                "Uncaught Error: stop",
            ])
        );
        assert!(session.last_failed());
        assert_eq!(session.context().lookup_global("after"), None);
    }

    #[test]
    fn test_load_reports_unfinished_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("open.js");
        fs::write(&path, "function open() {\n").unwrap();
        let (mut session, _) = session();
        let output = session.load(&path).unwrap();
        assert_eq!(output.len(), 1);
        assert!(output[0].starts_with("Error: "), "{}", output[0]);
        assert!(session.last_failed());
        assert!(!session.is_continuing());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, _) = session();
        let result = session.load(&dir.path().join("absent.js"));
        assert!(matches!(result, Err(ShellError::Io { .. })));
    }

    #[test]
    fn test_save_keeps_successful_commands() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.js");
        let (mut session, _) = session();
        feed(&mut session, &["var a = 1", "bad = = 1", "function h() {", "}", "a + 1"]);
        session.save(&path).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "var a = 1\nfunction h() {\n}\na + 1\n"
        );

        let (mut fresh, _) = super::session();
        let output = fresh.load(&path).unwrap();
        assert_eq!(
            output,
            strings(&["Out[1]: 1", "Out[2]: [Function: h]", "Out[3]: 2"])
        );
        assert_eq!(fresh.context().lookup_global("a"), Some(JsValue::number(1.0)));
    }
}

// ============================================================================
// Completion through the session
// ============================================================================

mod completion_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_buffered_lines_are_in_scope() {
        let (mut session, _) = session();
        session.process_line("function h(alpha) {");
        let found = session.complete("return alp", 10);
        assert_eq!(found.candidates, strings(&["alpha"]));
        assert_eq!(found.filter, "alp");
    }

    #[test]
    fn test_constructor_falls_back_to_its_prototype() {
        let (mut session, _) = session();
        let found = session.complete("Map.ge", 6);
        assert_eq!(found.candidates, strings(&["get"]));
        assert_eq!(found.filter, "ge");
    }

    #[test]
    fn test_preview_shows_the_common_continuation() {
        let (mut session, _) = session();
        assert_eq!(session.preview("Math.fl", 7).as_deref(), Some("oor"));
        assert_eq!(session.preview("pars", 4).as_deref(), Some("e"));
        assert_eq!(session.preview("parse", 5), None);
    }

    #[test]
    fn test_completion_sees_earlier_commands() {
        let (mut session, _) = session();
        feed(&mut session, &["var config = { verbose: true, version: 2 }"]);
        let found = session.complete("config.ver", 10);
        assert_eq!(found.candidates, strings(&["verbose", "version"]));
    }
}

// ============================================================================
// Deeply nested input
// ============================================================================

mod nesting_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_deep_nesting_is_a_syntax_error() {
        let (output, continuing) = on_shell_stack(|| {
            let (mut session, _) = session();
            let depth = MAX_NESTING_DEPTH * 4;
            let line = format!("{}1{}", "[".repeat(depth), "]".repeat(depth));
            let mut output = feed(&mut session, &[line.as_str()]);
            output.extend(feed(&mut session, &["1 + 1"]));
            (output, session.is_continuing())
        });
        assert_eq!(output.len(), 2);
        assert!(
            output[0].starts_with("Error: Maximum nesting depth exceeded"),
            "{}",
            output[0]
        );
        assert_eq!(output[1], "Out[2]: 2");
        assert!(!continuing);
    }

    #[test]
    fn test_completion_survives_deep_nesting() {
        let candidates = on_shell_stack(|| {
            let (mut session, _) = session();
            let line = format!("{}Ma", "[".repeat(MAX_NESTING_DEPTH * 4));
            let _ = session.complete(&line, line.len());
            let line = "{".repeat(MAX_NESTING_DEPTH * 4);
            let _ = session.complete(&line, line.len());
            session.complete("Mat", 3).candidates
        });
        assert_eq!(candidates, strings(&["Math"]));
    }
}
