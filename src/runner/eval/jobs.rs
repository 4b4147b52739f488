//! Promise machinery, microtasks and timers.
//!
//! Everything runs on the thread that owns the [`EvalContext`]. Microtasks
//! (promise reactions, `queueMicrotask`) drain completely before the next
//! timer fires. `await` pumps both queues until its promise settles.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{get_data_in_chain, ObjectClass};
use crate::runner::ds::promise_object::{PromiseData, PromiseReaction, PromiseState};
use crate::runner::ds::value::{JsObjectType, JsValue};
use crate::runner::plugin::types::{BuiltInFn, EvalContext};
use crate::runner::std_lib::console::ConsoleLevel;

use super::expression::get_property;
use super::function::{call_function, is_callable};
use super::types::ValueResult;

/// Longest sleep while waiting for a timer, so interrupts stay responsive.
const POLL_SLICE: Duration = Duration::from_millis(10);

pub type NativeJob = Box<dyn FnOnce(&mut EvalContext) -> Result<(), JErrorType>>;

pub enum Job {
    Call {
        callback: JsValue,
        this: JsValue,
        args: Vec<JsValue>,
    },
    Reaction {
        reaction: PromiseReaction,
        outcome: Result<JsValue, JsValue>,
    },
    Native(NativeJob),
}

pub enum TimerCallback {
    Script { callback: JsValue, args: Vec<JsValue> },
    Native(NativeJob),
}

pub struct Timer {
    pub id: u64,
    pub due: Instant,
    pub callback: TimerCallback,
}

pub struct JobQueue {
    microtasks: VecDeque<Job>,
    timers: Vec<Timer>,
    next_timer_id: u64,
    rejected: Vec<JsObjectType>,
}

impl JobQueue {
    pub fn new() -> Self {
        JobQueue {
            microtasks: VecDeque::new(),
            timers: vec![],
            next_timer_id: 1,
            rejected: vec![],
        }
    }

    pub fn enqueue_microtask(&mut self, job: Job) {
        self.microtasks.push_back(job);
    }

    pub fn add_timer(&mut self, delay: Duration, callback: TimerCallback) -> u64 {
        let id = self.next_timer_id;
        self.next_timer_id += 1;
        self.timers.push(Timer {
            id,
            due: Instant::now() + delay,
            callback,
        });
        id
    }

    pub fn clear_timer(&mut self, id: u64) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.id != id);
        before != self.timers.len()
    }

    pub fn has_pending_microtasks(&self) -> bool {
        !self.microtasks.is_empty()
    }

    pub fn has_timers(&self) -> bool {
        !self.timers.is_empty()
    }

    pub fn is_idle(&self) -> bool {
        self.microtasks.is_empty() && self.timers.is_empty()
    }

    pub fn next_timer_due(&self) -> Option<Instant> {
        self.timers.iter().map(|t| t.due).min()
    }

    /// Earliest timer that is due, ties broken by creation order.
    fn take_due_timer(&mut self, now: Instant) -> Option<Timer> {
        let index = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= now)
            .min_by_key(|(_, t)| (t.due, t.id))
            .map(|(i, _)| i)?;
        Some(self.timers.remove(index))
    }

    pub fn clear(&mut self) {
        self.microtasks.clear();
        self.timers.clear();
        self.rejected.clear();
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

pub fn is_promise(value: &JsValue) -> bool {
    matches!(value, JsValue::Object(o) if matches!(o.borrow().class, ObjectClass::Promise(_)))
}

pub fn new_promise(ctx: &mut EvalContext) -> JsObjectType {
    ctx.new_object_of(ObjectClass::Promise(PromiseData::new()), "Promise")
}

fn promise_state(promise: &JsObjectType) -> Option<PromiseState> {
    match &promise.borrow().class {
        ObjectClass::Promise(p) => Some(p.state.clone()),
        _ => None,
    }
}

fn mark_handled(promise: &JsObjectType, ctx: &mut EvalContext) {
    if let ObjectClass::Promise(p) = &mut promise.borrow_mut().class {
        p.handled = true;
    }
    ctx.jobs.rejected.retain(|r| !Rc::ptr_eq(r, promise));
}

/// Resolves `promise` with `value`, adopting the state of promises and
/// thenables.
pub fn resolve_promise(promise: &JsObjectType, value: JsValue, ctx: &mut EvalContext) {
    if let JsValue::Object(o) = &value {
        if Rc::ptr_eq(o, promise) {
            let reason = ctx.new_error("TypeError", "Chaining cycle detected for promise #<Promise>");
            reject_promise(promise, reason, ctx);
            return;
        }
        if let Some(state) = promise_state(o) {
            mark_handled(o, ctx);
            match state {
                PromiseState::Fulfilled(v) => fulfill_promise(promise, v, ctx),
                PromiseState::Rejected(r) => reject_promise(promise, r, ctx),
                PromiseState::Pending => {
                    if let ObjectClass::Promise(p) = &mut o.borrow_mut().class {
                        p.reactions.push(PromiseReaction {
                            on_fulfilled: None,
                            on_rejected: None,
                            derived: Some(promise.clone()),
                        });
                    }
                }
            }
            return;
        }
        let then = get_data_in_chain(o, "then");
        if let Some(then) = then.filter(is_callable) {
            let (resolve, reject) = create_resolving_functions(promise, ctx);
            ctx.jobs.enqueue_microtask(Job::Call {
                callback: then,
                this: value.clone(),
                args: vec![resolve, reject],
            });
            return;
        }
    }
    fulfill_promise(promise, value, ctx);
}

fn settle(promise: &JsObjectType, state: PromiseState, ctx: &mut EvalContext) {
    let (reactions, unhandled) = {
        let mut o = promise.borrow_mut();
        let p = match &mut o.class {
            ObjectClass::Promise(p) => p,
            _ => return,
        };
        if !p.state.is_pending() {
            return;
        }
        p.state = state.clone();
        let reactions = std::mem::take(&mut p.reactions);
        let unhandled = matches!(state, PromiseState::Rejected(_)) && !p.handled && reactions.is_empty();
        (reactions, unhandled)
    };
    if unhandled {
        ctx.jobs.rejected.push(promise.clone());
    }
    let outcome = match state {
        PromiseState::Fulfilled(v) => Ok(v),
        PromiseState::Rejected(r) => Err(r),
        PromiseState::Pending => return,
    };
    for reaction in reactions {
        ctx.jobs.enqueue_microtask(Job::Reaction {
            reaction,
            outcome: outcome.clone(),
        });
    }
}

pub fn fulfill_promise(promise: &JsObjectType, value: JsValue, ctx: &mut EvalContext) {
    settle(promise, PromiseState::Fulfilled(value), ctx);
}

pub fn reject_promise(promise: &JsObjectType, reason: JsValue, ctx: &mut EvalContext) {
    settle(promise, PromiseState::Rejected(reason), ctx);
}

/// `resolve` / `reject` function pair that settles `promise` at most once.
pub fn create_resolving_functions(promise: &JsObjectType, ctx: &mut EvalContext) -> (JsValue, JsValue) {
    let already_resolved = Rc::new(Cell::new(false));
    let (p, done) = (promise.clone(), already_resolved.clone());
    let resolve = ctx.new_native_function(
        "",
        BuiltInFn::closure(move |ctx, _this, args| {
            if !done.replace(true) {
                let v = args.into_iter().next().unwrap_or(JsValue::Undefined);
                resolve_promise(&p, v, ctx);
            }
            Ok(JsValue::Undefined)
        }),
        1,
    );
    let (p, done) = (promise.clone(), already_resolved);
    let reject = ctx.new_native_function(
        "",
        BuiltInFn::closure(move |ctx, _this, args| {
            if !done.replace(true) {
                let v = args.into_iter().next().unwrap_or(JsValue::Undefined);
                reject_promise(&p, v, ctx);
            }
            Ok(JsValue::Undefined)
        }),
        1,
    );
    (resolve, reject)
}

/// `promise.then(on_fulfilled, on_rejected)`; returns the derived promise.
pub fn promise_then(
    promise: &JsObjectType,
    on_fulfilled: Option<JsValue>,
    on_rejected: Option<JsValue>,
    ctx: &mut EvalContext,
) -> JsObjectType {
    let derived = new_promise(ctx);
    let reaction = PromiseReaction {
        on_fulfilled: on_fulfilled.filter(is_callable),
        on_rejected: on_rejected.filter(is_callable),
        derived: Some(derived.clone()),
    };
    mark_handled(promise, ctx);
    let state = promise_state(promise).unwrap_or(PromiseState::Pending);
    match state {
        PromiseState::Pending => {
            if let ObjectClass::Promise(p) = &mut promise.borrow_mut().class {
                p.reactions.push(reaction);
            }
        }
        PromiseState::Fulfilled(v) => ctx.jobs.enqueue_microtask(Job::Reaction {
            reaction,
            outcome: Ok(v),
        }),
        PromiseState::Rejected(r) => ctx.jobs.enqueue_microtask(Job::Reaction {
            reaction,
            outcome: Err(r),
        }),
    }
    derived
}

fn run_reaction(
    reaction: PromiseReaction,
    outcome: Result<JsValue, JsValue>,
    ctx: &mut EvalContext,
) -> Result<(), JErrorType> {
    let (handler, argument, rejected) = match outcome {
        Ok(v) => (reaction.on_fulfilled, v, false),
        Err(r) => (reaction.on_rejected, r, true),
    };
    let result = match handler {
        Some(h) => call_function(&h, JsValue::Undefined, vec![argument], ctx),
        None if rejected => Err(JErrorType::Thrown(argument)),
        None => Ok(argument),
    };
    let derived = match reaction.derived {
        Some(d) => d,
        None => return result.map(|_| ()),
    };
    match result {
        Ok(v) => resolve_promise(&derived, v, ctx),
        Err(e) if e.is_catchable() => {
            let reason = ctx.error_to_value(e);
            reject_promise(&derived, reason, ctx);
        }
        Err(e) => return Err(e),
    }
    Ok(())
}

/// Writes an error nobody caught to the console.
pub fn report_uncaught(err: &JErrorType, ctx: &mut EvalContext) {
    let message = uncaught_message(err);
    warn!(%message, "uncaught error in job");
    ctx.console.write(ConsoleLevel::Error, &message);
}

pub fn uncaught_message(err: &JErrorType) -> String {
    match err {
        JErrorType::Thrown(_) | JErrorType::Timeout | JErrorType::Cancelled => err.to_string(),
        other => format!("Uncaught {}", other),
    }
}

fn run_job(job: Job, ctx: &mut EvalContext) -> Result<(), JErrorType> {
    let result = match job {
        Job::Call {
            callback,
            this,
            args,
        } => call_function(&callback, this, args, ctx).map(|_| ()),
        Job::Reaction { reaction, outcome } => run_reaction(reaction, outcome, ctx),
        Job::Native(f) => f(ctx),
    };
    match result {
        Err(e) if e.is_catchable() => {
            report_uncaught(&e, ctx);
            Ok(())
        }
        other => other,
    }
}

/// Runs one queued microtask. Returns whether there was one.
pub fn run_one_microtask(ctx: &mut EvalContext) -> Result<bool, JErrorType> {
    match ctx.jobs.microtasks.pop_front() {
        Some(job) => {
            ctx.check_deadline()?;
            run_job(job, ctx)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

pub fn run_microtasks(ctx: &mut EvalContext) -> Result<(), JErrorType> {
    while run_one_microtask(ctx)? {}
    Ok(())
}

/// Fires the earliest due timer followed by the microtasks it queued.
pub fn run_one_timer(ctx: &mut EvalContext) -> Result<bool, JErrorType> {
    let timer = match ctx.jobs.take_due_timer(Instant::now()) {
        Some(t) => t,
        None => return Ok(false),
    };
    debug!(timer = timer.id, "firing timer");
    let job = match timer.callback {
        TimerCallback::Script { callback, args } => Job::Call {
            callback,
            this: JsValue::Undefined,
            args,
        },
        TimerCallback::Native(f) => Job::Native(f),
    };
    run_job(job, ctx)?;
    run_microtasks(ctx)?;
    Ok(true)
}

/// Runs microtasks and every timer that is already due.
pub fn run_ready_jobs(ctx: &mut EvalContext) -> Result<(), JErrorType> {
    run_microtasks(ctx)?;
    while run_one_timer(ctx)? {}
    Ok(())
}

/// Reasons of rejected promises that never got a handler.
pub fn take_unhandled_rejections(ctx: &mut EvalContext) -> Vec<JsValue> {
    let rejected = std::mem::take(&mut ctx.jobs.rejected);
    rejected
        .into_iter()
        .filter_map(|p| {
            let o = p.borrow();
            let reason = match &o.class {
                ObjectClass::Promise(d) if !d.handled => match &d.state {
                    PromiseState::Rejected(r) => Some(r.clone()),
                    _ => None,
                },
                _ => None,
            };
            reason
        })
        .collect()
}

/// `await value`: pumps the job queues until the promise settles.
pub fn await_value(value: JsValue, ctx: &mut EvalContext) -> ValueResult {
    if ctx.read_only {
        return Err(JErrorType::type_error(
            "await is not allowed in side-effect-free evaluation",
        ));
    }
    let promise = match &value {
        JsValue::Object(o) if is_promise(&value) => o.clone(),
        JsValue::Object(_) if is_callable(&get_property(&value, "then", ctx)?) => {
            let p = new_promise(ctx);
            resolve_promise(&p, value.clone(), ctx);
            p
        }
        _ => {
            run_microtasks(ctx)?;
            return Ok(value);
        }
    };
    mark_handled(&promise, ctx);
    loop {
        match promise_state(&promise).unwrap_or(PromiseState::Pending) {
            PromiseState::Fulfilled(v) => return Ok(v),
            PromiseState::Rejected(r) => return Err(JErrorType::Thrown(r)),
            PromiseState::Pending => {}
        }
        ctx.check_deadline()?;
        if run_one_microtask(ctx)? {
            continue;
        }
        match ctx.jobs.next_timer_due() {
            Some(due) => {
                let now = Instant::now();
                if due > now {
                    std::thread::sleep((due - now).min(POLL_SLICE));
                } else {
                    run_one_timer(ctx)?;
                }
            }
            None => {
                return Err(JErrorType::type_error(
                    "Awaited promise can never settle: no pending jobs or timers",
                ))
            }
        }
    }
}
