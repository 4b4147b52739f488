//! Tests for the command scheduler: ordering, failure handling and async
//! commands.

extern crate jsh;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use jsh::parser::JsParser;
use jsh::repl::{
    classify, compile, Classification, CommandUnit, RunOptions, Runnable, Scheduler,
    SchedulerEvent, ShellError,
};
use jsh::runner::ds::error::JErrorType;
use jsh::runner::ds::value::JsValue;
use jsh::runner::eval::types::ValueResult;
use jsh::runner::plugin::registry::BuiltInRegistry;
use jsh::runner::plugin::types::EvalContext;
use jsh::runner::std_lib::console::BufferedConsole;

const TIMEOUT: Duration = Duration::from_secs(5);

fn context() -> EvalContext {
    let mut ctx = EvalContext::new();
    ctx.install_core_builtins(BuiltInRegistry::with_core());
    ctx
}

/// Compiles one line of source into a command.
fn unit(source: &str) -> CommandUnit {
    match classify(&[source.to_string()], &JsParser::new()) {
        Classification::Complete(f) => compile(f),
        other => panic!("{:?} is not a complete command: {:?}", source, other),
    }
}

/// Records its name when run and returns a fixed outcome.
struct Probe {
    name: &'static str,
    fail: bool,
    log: Rc<RefCell<Vec<&'static str>>>,
}

impl Runnable for Probe {
    fn run(&self, _ctx: &mut EvalContext, _options: RunOptions) -> ValueResult {
        self.log.borrow_mut().push(self.name);
        if self.fail {
            Err(JErrorType::type_error(self.name))
        } else {
            Ok(JsValue::string(self.name))
        }
    }
}

fn probe(name: &'static str, fail: bool, log: &Rc<RefCell<Vec<&'static str>>>) -> CommandUnit {
    CommandUnit {
        raw_text: name.to_string(),
        compiled: Box::new(Probe {
            name,
            fail,
            log: log.clone(),
        }),
        is_silent: false,
        is_async: false,
    }
}

/// Outcomes of finished commands, in order.
fn commands(events: &[SchedulerEvent]) -> Vec<(String, bool)> {
    events
        .iter()
        .filter_map(|e| match e {
            SchedulerEvent::Command { raw_text, success } => Some((raw_text.clone(), *success)),
            _ => None,
        })
        .collect()
}

fn echoes(events: &[SchedulerEvent]) -> Vec<JsValue> {
    events
        .iter()
        .filter_map(|e| match e {
            SchedulerEvent::Echo(v) => Some(v.clone()),
            _ => None,
        })
        .collect()
}

/// Ticks until the scheduler is no longer busy, collecting events.
fn settle(scheduler: &mut Scheduler, ctx: &mut EvalContext) -> Vec<SchedulerEvent> {
    let mut events = scheduler.take_events();
    for _ in 0..500 {
        if !scheduler.is_busy() {
            break;
        }
        std::thread::sleep(Duration::from_millis(2));
        scheduler.tick(ctx);
        events.extend(scheduler.take_events());
    }
    assert!(!scheduler.is_busy(), "scheduler never settled");
    events
}

// ============================================================================
// Synchronous commands
// ============================================================================

mod sync_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_commands_run_in_order() {
        let log = Rc::new(RefCell::new(vec![]));
        let mut ctx = context();
        let mut scheduler = Scheduler::new(TIMEOUT);
        for name in ["first", "second", "third"] {
            scheduler.enqueue(probe(name, false, &log));
        }
        assert_eq!(scheduler.pending(), 3);
        scheduler.drain(&mut ctx);

        assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
        let events = scheduler.take_events();
        assert_eq!(
            commands(&events),
            vec![
                ("first".to_string(), true),
                ("second".to_string(), true),
                ("third".to_string(), true),
            ]
        );
        assert!(matches!(events.last(), Some(SchedulerEvent::Drained)));
        assert!(!scheduler.is_busy());
    }

    #[test]
    fn test_failure_discards_the_rest_of_the_queue() {
        let log = Rc::new(RefCell::new(vec![]));
        let mut ctx = context();
        let mut scheduler = Scheduler::new(TIMEOUT);
        scheduler.enqueue(probe("ok", false, &log));
        scheduler.enqueue(probe("broken", true, &log));
        scheduler.enqueue(probe("never", false, &log));
        scheduler.drain(&mut ctx);

        assert_eq!(*log.borrow(), vec!["ok", "broken"]);
        assert_eq!(scheduler.pending(), 0);
        let events = scheduler.take_events();
        assert_eq!(
            commands(&events),
            vec![("ok".to_string(), true), ("broken".to_string(), false)]
        );
        assert!(events
            .iter()
            .any(|e| matches!(e, SchedulerEvent::Error(ShellError::Runtime(_)))));
        assert!(!events.iter().any(|e| matches!(e, SchedulerEvent::Drained)));

        // The scheduler takes new work after a failure.
        scheduler.enqueue(probe("later", false, &log));
        scheduler.drain(&mut ctx);
        assert_eq!(
            commands(&scheduler.take_events()),
            vec![("later".to_string(), true)]
        );
    }

    #[test]
    fn test_values_are_echoed_unless_silent_or_undefined() {
        let mut ctx = context();
        let mut scheduler = Scheduler::new(TIMEOUT);
        scheduler.enqueue(unit("var a = 1"));
        scheduler.enqueue(unit("a + 1"));
        scheduler.enqueue(unit("undefined"));
        scheduler.enqueue(unit("var b = 3;"));
        scheduler.drain(&mut ctx);
        let events = scheduler.take_events();
        assert_eq!(
            echoes(&events),
            vec![JsValue::number(1.0), JsValue::number(2.0)]
        );
        assert_eq!(commands(&events).len(), 4);
        assert_eq!(ctx.lookup_global("ans"), Some(JsValue::number(3.0)));
    }

    #[test]
    fn test_result_is_bound_to_ans() {
        let mut ctx = context();
        let mut scheduler = Scheduler::new(TIMEOUT);
        scheduler.enqueue(unit("6 * 7"));
        scheduler.enqueue(unit("ans + 1"));
        scheduler.drain(&mut ctx);
        assert_eq!(
            echoes(&scheduler.take_events()),
            vec![JsValue::number(42.0), JsValue::number(43.0)]
        );
    }

    #[test]
    fn test_thrown_error_keeps_later_commands_from_running() {
        let mut ctx = context();
        let mut scheduler = Scheduler::new(TIMEOUT);
        scheduler.enqueue(unit("throw new Error('boom')"));
        scheduler.enqueue(unit("var z = 3"));
        scheduler.drain(&mut ctx);
        let events = scheduler.take_events();
        let reports: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                SchedulerEvent::Error(e) => Some(e.report()),
                _ => None,
            })
            .collect();
        assert_eq!(reports, vec!["Uncaught Error: boom".to_string()]);
        assert_eq!(ctx.lookup_global("z"), None);
    }
}

// ============================================================================
// Commands that await at top level
// ============================================================================

mod async_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_async_command_stays_in_flight_until_settled() {
        let mut ctx = context();
        let mut scheduler = Scheduler::new(TIMEOUT);
        scheduler.enqueue(unit("await new Promise(r => setTimeout(() => r(7), 10))"));
        scheduler.enqueue(unit("ans * 2"));
        scheduler.drain(&mut ctx);

        assert!(scheduler.is_busy());
        assert!(scheduler.has_in_flight());
        assert_eq!(scheduler.pending(), 1);
        assert!(commands(&scheduler.take_events()).is_empty());

        let events = settle(&mut scheduler, &mut ctx);
        assert_eq!(
            echoes(&events),
            vec![JsValue::number(7.0), JsValue::number(14.0)]
        );
        assert!(commands(&events).iter().all(|(_, success)| *success));
        assert!(!scheduler.has_in_flight());
    }

    #[test]
    fn test_declarations_of_async_commands_are_visible_at_once() {
        let mut ctx = context();
        let mut scheduler = Scheduler::new(TIMEOUT);
        scheduler.enqueue(unit("var later = await Promise.resolve('x')"));
        scheduler.drain(&mut ctx);
        assert_eq!(ctx.lookup_global("later"), Some(JsValue::Undefined));

        let events = settle(&mut scheduler, &mut ctx);
        assert!(echoes(&events).is_empty());
        assert_eq!(ctx.lookup_global("later"), Some(JsValue::string("x")));
    }

    #[test]
    fn test_rejection_fails_the_command() {
        let mut ctx = context();
        let mut scheduler = Scheduler::new(TIMEOUT);
        scheduler.enqueue(unit("await Promise.reject(new Error('nope'))"));
        scheduler.enqueue(unit("1"));
        scheduler.drain(&mut ctx);
        let events = settle(&mut scheduler, &mut ctx);
        assert_eq!(commands(&events).len(), 1);
        assert!(!commands(&events)[0].1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_interrupt_cancels_the_command_in_flight() {
        let mut ctx = context();
        let mut scheduler = Scheduler::new(TIMEOUT);
        scheduler.enqueue(unit("await new Promise(r => setTimeout(r, 10))"));
        scheduler.drain(&mut ctx);
        assert!(scheduler.interrupt(&mut ctx));

        let events = settle(&mut scheduler, &mut ctx);
        assert!(events
            .iter()
            .any(|e| matches!(e, SchedulerEvent::Error(ShellError::Cancelled))));
        assert_eq!(commands(&events).len(), 1);
        assert!(ctx.jobs.is_idle());
    }

    #[test]
    fn test_interrupt_with_nothing_running() {
        let mut ctx = context();
        let mut scheduler = Scheduler::new(TIMEOUT);
        assert!(!scheduler.interrupt(&mut ctx));
    }
}

// ============================================================================
// Background jobs
// ============================================================================

mod background_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_errors_in_timers_go_to_the_console() {
        let console = Rc::new(BufferedConsole::new());
        let mut ctx = EvalContext::new().with_console(console.clone());
        ctx.install_core_builtins(BuiltInRegistry::with_core());
        let mut scheduler = Scheduler::new(TIMEOUT);
        scheduler.enqueue(unit("setTimeout(() => { throw new Error('late') }, 0); 1"));
        scheduler.drain(&mut ctx);
        scheduler.tick(&mut ctx);
        assert_eq!(console.text(), vec!["Uncaught Error: late".to_string()]);
    }

    #[test]
    fn test_unhandled_rejections_are_reported() {
        let console = Rc::new(BufferedConsole::new());
        let mut ctx = EvalContext::new().with_console(console.clone());
        ctx.install_core_builtins(BuiltInRegistry::with_core());
        let mut scheduler = Scheduler::new(TIMEOUT);
        scheduler.enqueue(unit("Promise.reject(3); 1"));
        scheduler.drain(&mut ctx);
        scheduler.tick(&mut ctx);
        assert_eq!(console.text(), vec!["Uncaught (in promise) 3".to_string()]);
    }
}
