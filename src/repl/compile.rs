//! Turns a finalized command into something the scheduler can run.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tracing::warn;

use crate::parser::ast::ProgramData;
use crate::repl::finalize::Finalized;
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::jobs::TimerCallback;
use crate::runner::eval::types::ValueResult;
use crate::runner::plugin::types::EvalContext;

/// Where a command that awaits at top level reports its outcome.
///
/// Only the first outcome counts; later ones are logged and dropped.
#[derive(Clone, Default)]
pub struct CompletionHandle {
    state: Rc<RefCell<HandleState>>,
}

#[derive(Default)]
struct HandleState {
    completed: bool,
    outcome: Option<ValueResult>,
}

impl CompletionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome. Returns false when one was already recorded.
    pub fn complete(&self, outcome: ValueResult) -> bool {
        let mut state = self.state.borrow_mut();
        if state.completed {
            warn!("command completed more than once; ignoring");
            return false;
        }
        state.completed = true;
        state.outcome = Some(outcome);
        true
    }

    pub fn is_completed(&self) -> bool {
        self.state.borrow().completed
    }

    /// The recorded outcome, once.
    pub fn take(&self) -> Option<ValueResult> {
        self.state.borrow_mut().outcome.take()
    }
}

impl fmt::Debug for CompletionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionHandle")
            .field("completed", &self.is_completed())
            .finish()
    }
}

pub struct RunOptions {
    pub timeout: Duration,
    pub done: CompletionHandle,
}

pub trait Runnable {
    /// Runs the command. A synchronous command returns its value; an async
    /// one returns `undefined` at once and later reports through
    /// `options.done`.
    fn run(&self, ctx: &mut EvalContext, options: RunOptions) -> ValueResult;
}

struct SyncProgram(ProgramData);

impl Runnable for SyncProgram {
    fn run(&self, ctx: &mut EvalContext, _options: RunOptions) -> ValueResult {
        ctx.execute_program(&self.0)
    }
}

struct AsyncProgram(Rc<ProgramData>);

impl Runnable for AsyncProgram {
    fn run(&self, ctx: &mut EvalContext, options: RunOptions) -> ValueResult {
        ctx.declare_program(&self.0)?;
        let program = self.0.clone();
        let done = options.done;
        ctx.jobs.add_timer(
            Duration::ZERO,
            TimerCallback::Native(Box::new(move |ctx: &mut EvalContext| {
                done.complete(ctx.run_statements(&program.body));
                Ok::<(), JErrorType>(())
            })),
        );
        Ok(JsValue::Undefined)
    }
}

/// A command ready for the scheduler.
pub struct CommandUnit {
    pub raw_text: String,
    pub compiled: Box<dyn Runnable>,
    pub is_silent: bool,
    pub is_async: bool,
}

impl fmt::Debug for CommandUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandUnit")
            .field("raw_text", &self.raw_text)
            .field("is_silent", &self.is_silent)
            .field("is_async", &self.is_async)
            .finish()
    }
}

pub fn compile(finalized: Finalized) -> CommandUnit {
    let compiled: Box<dyn Runnable> = if finalized.is_async {
        Box::new(AsyncProgram(Rc::new(finalized.program)))
    } else {
        Box::new(SyncProgram(finalized.program))
    };
    CommandUnit {
        raw_text: finalized.source,
        compiled,
        is_silent: finalized.is_silent,
        is_async: finalized.is_async,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_completion_is_ignored() {
        let handle = CompletionHandle::new();
        assert!(handle.complete(Ok(JsValue::number(1.0))));
        assert!(!handle.complete(Ok(JsValue::number(2.0))));
        assert!(handle.is_completed());
        assert_eq!(handle.take().unwrap().unwrap(), JsValue::number(1.0));
        assert!(handle.take().is_none());
    }
}
