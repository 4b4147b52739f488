//! Promise built-in.
//!
//! The constructor and combinators sit on the promise machinery in
//! [`eval::jobs`](crate::runner::eval::jobs); reactions run as microtasks.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{JsObject, ObjectClass, PropertyDescriptor};
use crate::runner::ds::promise_object::PromiseData;
use crate::runner::ds::value::{JsObjectType, JsValue};
use crate::runner::eval::expression::iterate_to_vec;
use crate::runner::eval::function::{call_function, is_callable};
use crate::runner::eval::jobs::{
    create_resolving_functions, is_promise, new_promise, promise_then, reject_promise,
    resolve_promise,
};
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInFn, BuiltInObject, EvalContext};

use super::arg;

/// Register the Promise built-in with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let promise = BuiltInObject::new("Promise")
        .with_constructor(promise_constructor)
        .add_prototype_method("then", promise_then_method)
        .add_prototype_method("catch", promise_catch)
        .add_prototype_method("finally", promise_finally)
        .add_method("resolve", promise_resolve_static)
        .add_method("reject", promise_reject_static)
        .add_method("all", promise_all)
        .add_method("allSettled", promise_all_settled)
        .add_method("race", promise_race);

    registry.register_object(promise);
}

fn this_promise(this: &JsValue, method: &str) -> Result<JsObjectType, JErrorType> {
    match this {
        JsValue::Object(o) if is_promise(this) => Ok(o.clone()),
        _ => Err(JErrorType::type_error(format!(
            "Method Promise.prototype.{} called on incompatible receiver",
            method
        ))),
    }
}

/// `Promise.resolve(value)` semantics: promises pass through unchanged.
fn to_promise(value: JsValue, ctx: &mut EvalContext) -> JsObjectType {
    if let JsValue::Object(o) = &value {
        if is_promise(&value) {
            return o.clone();
        }
    }
    let p = new_promise(ctx);
    resolve_promise(&p, value, ctx);
    p
}

fn native(ctx: &mut EvalContext, f: impl Fn(&mut EvalContext, Vec<JsValue>) -> Result<JsValue, JErrorType> + 'static) -> JsValue {
    ctx.new_native_function("", BuiltInFn::closure(move |ctx, _this, args| f(ctx, args)), 1)
}

/// Promise constructor.
fn promise_constructor(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let proto = match &this {
        JsValue::Object(o) => o.borrow().prototype.clone(),
        _ => {
            return Err(JErrorType::type_error(
                "Promise constructor cannot be invoked without 'new'",
            ))
        }
    };
    let executor = arg(&args, 0);
    if !is_callable(&executor) {
        return Err(JErrorType::type_error(format!(
            "Promise resolver {} is not a function",
            executor
        )));
    }
    let promise = JsObject::new(ObjectClass::Promise(PromiseData::new()), proto).into_ref();
    let (resolve, reject) = create_resolving_functions(&promise, ctx);
    match call_function(&executor, JsValue::Undefined, vec![resolve, reject.clone()], ctx) {
        Ok(_) => {}
        Err(e) if e.is_catchable() => {
            let reason = ctx.error_to_value(e);
            call_function(&reject, JsValue::Undefined, vec![reason], ctx)?;
        }
        Err(e) => return Err(e),
    }
    Ok(JsValue::Object(promise))
}

/// Promise.prototype.then
fn promise_then_method(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let promise = this_promise(&this, "then")?;
    let derived = promise_then(&promise, Some(arg(&args, 0)), Some(arg(&args, 1)), ctx);
    Ok(JsValue::Object(derived))
}

/// Promise.prototype.catch
fn promise_catch(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let promise = this_promise(&this, "catch")?;
    let derived = promise_then(&promise, None, Some(arg(&args, 0)), ctx);
    Ok(JsValue::Object(derived))
}

/// Promise.prototype.finally
///
/// The callback runs with no arguments; the original outcome passes through
/// unless the callback throws or returns a rejected promise.
fn promise_finally(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let promise = this_promise(&this, "finally")?;
    let on_finally = arg(&args, 0);
    if !is_callable(&on_finally) {
        let derived = promise_then(&promise, Some(on_finally.clone()), Some(on_finally), ctx);
        return Ok(JsValue::Object(derived));
    }
    let make_handler = |ctx: &mut EvalContext, rejected: bool| {
        let on_finally = on_finally.clone();
        native(ctx, move |ctx, args| {
            let outcome = args.into_iter().next().unwrap_or(JsValue::Undefined);
            let result = call_function(&on_finally, JsValue::Undefined, vec![], ctx)?;
            let settle_outcome = native(ctx, move |_ctx, _args| {
                if rejected {
                    Err(JErrorType::Thrown(outcome.clone()))
                } else {
                    Ok(outcome.clone())
                }
            });
            let waited = to_promise(result, ctx);
            Ok(JsValue::Object(promise_then(&waited, Some(settle_outcome), None, ctx)))
        })
    };
    let on_fulfilled = make_handler(ctx, false);
    let on_rejected = make_handler(ctx, true);
    let derived = promise_then(&promise, Some(on_fulfilled), Some(on_rejected), ctx);
    Ok(JsValue::Object(derived))
}

/// Promise.resolve
fn promise_resolve_static(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::Object(to_promise(arg(&args, 0), ctx)))
}

/// Promise.reject
fn promise_reject_static(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let p = new_promise(ctx);
    reject_promise(&p, arg(&args, 0), ctx);
    Ok(JsValue::Object(p))
}

/// Collects per-item results into an array once every item has reported.
struct Collector {
    result: JsObjectType,
    values: RefCell<Vec<JsValue>>,
    remaining: Cell<usize>,
}

impl Collector {
    fn store(&self, index: usize, value: JsValue, ctx: &mut EvalContext) {
        self.values.borrow_mut()[index] = value;
        self.remaining.set(self.remaining.get() - 1);
        if self.remaining.get() == 0 {
            let values = self.values.borrow().clone();
            let array = ctx.new_array(values);
            resolve_promise(&self.result, array, ctx);
        }
    }
}

fn combine(
    args: &[JsValue],
    ctx: &mut EvalContext,
    settled: bool,
) -> Result<JsValue, JErrorType> {
    let items = iterate_to_vec(&arg(args, 0), ctx)?;
    let result = new_promise(ctx);
    if items.is_empty() {
        let empty = ctx.new_array(vec![]);
        resolve_promise(&result, empty, ctx);
        return Ok(JsValue::Object(result));
    }
    let collector = Rc::new(Collector {
        result: result.clone(),
        values: RefCell::new(vec![JsValue::Undefined; items.len()]),
        remaining: Cell::new(items.len()),
    });
    for (index, item) in items.into_iter().enumerate() {
        let item = to_promise(item, ctx);
        let c = collector.clone();
        let on_fulfilled = native(ctx, move |ctx, args| {
            let value = args.into_iter().next().unwrap_or(JsValue::Undefined);
            let value = if settled {
                settled_record(ctx, "fulfilled", "value", value)
            } else {
                value
            };
            c.store(index, value, ctx);
            Ok(JsValue::Undefined)
        });
        let c = collector.clone();
        let on_rejected = native(ctx, move |ctx, args| {
            let reason = args.into_iter().next().unwrap_or(JsValue::Undefined);
            if settled {
                let record = settled_record(ctx, "rejected", "reason", reason);
                c.store(index, record, ctx);
            } else {
                reject_promise(&c.result, reason, ctx);
            }
            Ok(JsValue::Undefined)
        });
        promise_then(&item, Some(on_fulfilled), Some(on_rejected), ctx);
    }
    Ok(JsValue::Object(result))
}

fn settled_record(ctx: &mut EvalContext, status: &str, key: &str, value: JsValue) -> JsValue {
    let record = ctx.new_object();
    record
        .borrow_mut()
        .define("status", PropertyDescriptor::data(JsValue::string(status)));
    record.borrow_mut().define(key, PropertyDescriptor::data(value));
    JsValue::Object(record)
}

/// Promise.all
fn promise_all(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    combine(&args, ctx, false)
}

/// Promise.allSettled
fn promise_all_settled(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    combine(&args, ctx, true)
}

/// Promise.race
fn promise_race(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let items = iterate_to_vec(&arg(&args, 0), ctx)?;
    let result = new_promise(ctx);
    let (resolve, reject) = create_resolving_functions(&result, ctx);
    for item in items {
        let item = to_promise(item, ctx);
        promise_then(&item, Some(resolve.clone()), Some(reject.clone()), ctx);
    }
    Ok(JsValue::Object(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ds::promise_object::PromiseState;
    use crate::runner::eval::jobs::run_microtasks;

    fn state(p: &JsValue) -> PromiseState {
        match p {
            JsValue::Object(o) => match &o.borrow().class {
                ObjectClass::Promise(d) => d.state.clone(),
                _ => panic!("not a promise"),
            },
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_all_preserves_order() {
        let mut ctx = EvalContext::new();
        let later = new_promise(&mut ctx);
        let items = ctx.new_array(vec![
            JsValue::Object(later.clone()),
            JsValue::number(2.0),
        ]);
        let all = promise_all(&mut ctx, JsValue::Undefined, vec![items]).unwrap();
        run_microtasks(&mut ctx).unwrap();
        assert!(state(&all).is_pending());
        resolve_promise(&later, JsValue::number(1.0), &mut ctx);
        run_microtasks(&mut ctx).unwrap();
        match state(&all) {
            PromiseState::Fulfilled(JsValue::Object(a)) => match &a.borrow().class {
                ObjectClass::Array(e) => assert_eq!(e, &vec![JsValue::number(1.0), JsValue::number(2.0)]),
                _ => panic!("expected array"),
            },
            _ => panic!("expected fulfilled"),
        }
    }

    #[test]
    fn test_all_rejects_on_first_failure() {
        let mut ctx = EvalContext::new();
        let failed = promise_reject_static(&mut ctx, JsValue::Undefined, vec![JsValue::string("no")]).unwrap();
        let items = ctx.new_array(vec![failed]);
        let all = promise_all(&mut ctx, JsValue::Undefined, vec![items]).unwrap();
        run_microtasks(&mut ctx).unwrap();
        assert!(matches!(state(&all), PromiseState::Rejected(JsValue::String(s)) if s == "no"));
    }
}
