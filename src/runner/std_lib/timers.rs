//! Timer globals: `setTimeout`, `clearTimeout` and `queueMicrotask`.
//!
//! Callbacks are queued on the context's [`JobQueue`](crate::runner::eval::jobs::JobQueue);
//! nothing fires until the shell pumps the event loop.

use std::time::Duration;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::operations::type_conversion::to_number;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::is_callable;
use crate::runner::eval::jobs::{Job, TimerCallback};
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::EvalContext;

use super::arg;

pub fn register(registry: &mut BuiltInRegistry) {
    registry.register_function("setTimeout", set_timeout);
    registry.register_function("clearTimeout", clear_timeout);
    registry.register_function("queueMicrotask", queue_microtask);
}

fn require_callable(value: &JsValue, what: &str) -> Result<(), JErrorType> {
    if is_callable(value) {
        Ok(())
    } else {
        Err(JErrorType::type_error(format!(
            "The \"{}\" argument must be of type function. Received {}",
            what, value
        )))
    }
}

/// setTimeout(callback, delay, ...args)
fn set_timeout(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    if ctx.read_only {
        return Err(JErrorType::type_error("setTimeout is not allowed here"));
    }
    let callback = arg(&args, 0);
    require_callable(&callback, "callback")?;
    let delay = match arg(&args, 1) {
        JsValue::Undefined => 0.0,
        other => to_number(&other, ctx)?,
    };
    let delay = if delay.is_finite() && delay > 0.0 { delay } else { 0.0 };
    let extra = args.into_iter().skip(2).collect();
    let id = ctx.jobs.add_timer(
        Duration::from_millis(delay as u64),
        TimerCallback::Script {
            callback,
            args: extra,
        },
    );
    Ok(JsValue::number(id as f64))
}

/// clearTimeout(id); unknown ids are ignored.
fn clear_timeout(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    if let JsValue::Number(n) = arg(&args, 0) {
        let id = n.as_f64();
        if id.is_finite() && id >= 1.0 {
            ctx.jobs.clear_timer(id as u64);
        }
    }
    Ok(JsValue::Undefined)
}

/// queueMicrotask(callback)
fn queue_microtask(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let callback = arg(&args, 0);
    require_callable(&callback, "callback")?;
    ctx.jobs.enqueue_microtask(Job::Call {
        callback,
        this: JsValue::Undefined,
        args: vec![],
    });
    Ok(JsValue::Undefined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::eval::jobs::run_ready_jobs;

    fn counter(ctx: &mut EvalContext) -> JsValue {
        use crate::runner::plugin::types::BuiltInFn;
        ctx.set_binding("hits", JsValue::number(0.0));
        ctx.new_native_function(
            "tick",
            BuiltInFn::closure(|ctx, _this, _args| {
                let hits = to_number(&ctx.get_binding("hits")?, ctx)?;
                ctx.set_binding("hits", JsValue::number(hits + 1.0));
                Ok(JsValue::Undefined)
            }),
            0,
        )
    }

    #[test]
    fn test_cleared_timer_never_fires() {
        let mut ctx = EvalContext::new();
        let tick = counter(&mut ctx);
        let first = set_timeout(&mut ctx, JsValue::Undefined, vec![tick.clone()]).unwrap();
        set_timeout(&mut ctx, JsValue::Undefined, vec![tick]).unwrap();
        clear_timeout(&mut ctx, JsValue::Undefined, vec![first]).unwrap();
        run_ready_jobs(&mut ctx).unwrap();
        assert_eq!(ctx.get_binding("hits").unwrap(), JsValue::number(1.0));
        assert!(ctx.jobs.is_idle());
    }

    #[test]
    fn test_microtask_runs_on_pump() {
        let mut ctx = EvalContext::new();
        let tick = counter(&mut ctx);
        queue_microtask(&mut ctx, JsValue::Undefined, vec![tick]).unwrap();
        assert_eq!(ctx.get_binding("hits").unwrap(), JsValue::number(0.0));
        run_ready_jobs(&mut ctx).unwrap();
        assert_eq!(ctx.get_binding("hits").unwrap(), JsValue::number(1.0));
    }

    #[test]
    fn test_non_function_callback_is_type_error() {
        let mut ctx = EvalContext::new();
        let result = set_timeout(&mut ctx, JsValue::Undefined, vec![JsValue::number(1.0)]);
        assert!(matches!(result, Err(JErrorType::TypeError(_))));
    }
}
