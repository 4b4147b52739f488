//! Runs queued commands one at a time, in order.
//!
//! A command is `Queued`, then `Running`, then succeeded or failed. While one
//! runs the scheduler is busy and [`Scheduler::drain`] does nothing. An async
//! command stays in flight until its completion handle reports, which is
//! picked up on a later [`Scheduler::tick`] even when the handle was
//! completed before `run` returned.
//!
//! A failure discards everything still queued: later commands were typed
//! assuming the failed one had its effects.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::repl::compile::{CommandUnit, CompletionHandle, RunOptions};
use crate::repl::error::ShellError;
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::jobs::{run_ready_jobs, take_unhandled_rejections, uncaught_message};
use crate::runner::eval::types::ValueResult;
use crate::runner::inspect::inspect;
use crate::runner::plugin::types::EvalContext;
use crate::runner::std_lib::console::ConsoleLevel;

#[derive(Debug)]
pub enum SchedulerEvent {
    /// A value to show the user.
    Echo(JsValue),
    /// A command finished.
    Command { raw_text: String, success: bool },
    Error(ShellError),
    /// The queue ran empty.
    Drained,
}

struct InFlight {
    unit: CommandUnit,
    done: CompletionHandle,
}

pub struct Scheduler {
    queue: VecDeque<CommandUnit>,
    busy: bool,
    in_flight: Option<InFlight>,
    timeout: Duration,
    events: Vec<SchedulerEvent>,
}

impl Scheduler {
    pub fn new(timeout: Duration) -> Self {
        Scheduler {
            queue: VecDeque::new(),
            busy: false,
            in_flight: None,
            timeout,
            events: vec![],
        }
    }

    pub fn enqueue(&mut self, unit: CommandUnit) {
        debug!(raw_text = %unit.raw_text, "queued command");
        self.queue.push_back(unit);
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drops queued commands. The running one, if any, is left alone.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn take_events(&mut self) -> Vec<SchedulerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Runs queued commands until the queue is empty, a command fails, or an
    /// async command is left in flight.
    pub fn drain(&mut self, ctx: &mut EvalContext) {
        loop {
            if self.busy {
                return;
            }
            let unit = match self.queue.pop_front() {
                Some(unit) => unit,
                None => {
                    self.events.push(SchedulerEvent::Drained);
                    return;
                }
            };
            self.busy = true;
            ctx.clear_interrupt();
            ctx.deadline = Some(Instant::now() + self.timeout);
            let done = CompletionHandle::new();
            let options = RunOptions {
                timeout: self.timeout,
                done: done.clone(),
            };
            debug!(raw_text = %unit.raw_text, is_async = unit.is_async, "running command");
            let result = unit.compiled.run(ctx, options);
            match result {
                Ok(_) if unit.is_async => {
                    self.in_flight = Some(InFlight { unit, done });
                    return;
                }
                outcome => {
                    if !self.finish(&unit, outcome, ctx) {
                        return;
                    }
                }
            }
        }
    }

    /// Reports a finished command. Returns whether draining may go on.
    fn finish(&mut self, unit: &CommandUnit, outcome: ValueResult, ctx: &mut EvalContext) -> bool {
        ctx.deadline = None;
        self.busy = false;
        match outcome {
            Ok(value) => {
                ctx.set_last_result(value.clone());
                if !(unit.is_silent || value.is_undefined()) {
                    self.events.push(SchedulerEvent::Echo(value));
                }
                self.events.push(SchedulerEvent::Command {
                    raw_text: unit.raw_text.clone(),
                    success: true,
                });
                true
            }
            Err(e) => {
                debug!(error = %e, discarded = self.queue.len(), "command failed");
                if matches!(e, JErrorType::Cancelled | JErrorType::Timeout) {
                    ctx.jobs.clear();
                }
                self.queue.clear();
                self.events.push(SchedulerEvent::Error(ShellError::from(e)));
                self.events.push(SchedulerEvent::Command {
                    raw_text: unit.raw_text.clone(),
                    success: false,
                });
                false
            }
        }
    }

    /// One turn of the event loop: runs ready jobs, settles the in-flight
    /// command if it reported, then keeps draining.
    pub fn tick(&mut self, ctx: &mut EvalContext) {
        if self.in_flight.is_none() {
            ctx.deadline = Some(Instant::now() + self.timeout);
        }
        let pumped = run_ready_jobs(ctx).and_then(|_| match &self.in_flight {
            Some(f) if !f.done.is_completed() => ctx.check_deadline(),
            _ => Ok(()),
        });
        if let Err(e) = pumped {
            match &self.in_flight {
                Some(f) => {
                    f.done.complete(Err(e));
                }
                None => {
                    warn!(error = %e, "background job stopped");
                    ctx.jobs.clear();
                    ctx.console.write(ConsoleLevel::Error, &uncaught_message(&e));
                }
            }
        }
        if self.in_flight.is_none() {
            ctx.deadline = None;
        }
        for reason in take_unhandled_rejections(ctx) {
            let message = format!("Uncaught (in promise) {}", inspect(&reason));
            warn!(%message, "unhandled rejection");
            ctx.console.write(ConsoleLevel::Error, &message);
        }
        let settled = match &self.in_flight {
            Some(f) => f.done.take(),
            None => None,
        };
        if let Some(outcome) = settled {
            if let Some(f) = self.in_flight.take() {
                if self.finish(&f.unit, outcome, ctx) {
                    self.drain(ctx);
                }
            }
        }
    }

    /// Cancels the running command. Returns false when nothing was running.
    pub fn interrupt(&mut self, ctx: &mut EvalContext) -> bool {
        if !self.busy {
            return false;
        }
        match &self.in_flight {
            Some(f) => {
                f.done.complete(Err(JErrorType::Cancelled));
            }
            None => {
                // A synchronous run only returns once it has finished; this
                // covers a flag raised from another thread.
                ctx.interrupt_handle()
                    .store(true, std::sync::atomic::Ordering::SeqCst);
            }
        }
        true
    }

    /// Whether a command is waiting for timers or promises.
    pub fn has_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }
}
