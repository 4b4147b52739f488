//! Array built-in.
//!
//! Provides Array constructor and prototype methods. Elements live densely in
//! [`ObjectClass::Array`]; callbacks are always invoked with no borrow of the
//! array held, so they may mutate it.

use std::cmp::Ordering;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{ObjectClass, MAX_DENSE_LENGTH};
use crate::runner::ds::operations::test_and_comparison::{
    same_value_zero, strict_equality_comparison,
};
use crate::runner::ds::operations::type_conversion::{to_boolean, to_number, to_string};
use crate::runner::ds::value::{check_string_length, JsObjectType, JsValue};
use crate::runner::eval::expression::{get_property, iterate_to_vec};
use crate::runner::eval::function::{call_function, is_callable};
use crate::runner::inspect::inspect;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};

use super::arg;

/// Register the Array built-in with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let array = BuiltInObject::new("Array")
        .with_constructor(array_constructor)
        .add_prototype_method("push", array_push)
        .add_prototype_method("pop", array_pop)
        .add_prototype_method("shift", array_shift)
        .add_prototype_method("unshift", array_unshift)
        .add_prototype_method("slice", array_slice)
        .add_prototype_method("splice", array_splice)
        .add_prototype_method("indexOf", array_index_of)
        .add_prototype_method("includes", array_includes)
        .add_prototype_method("forEach", array_for_each)
        .add_prototype_method("map", array_map)
        .add_prototype_method("filter", array_filter)
        .add_prototype_method("reduce", array_reduce)
        .add_prototype_method("find", array_find)
        .add_prototype_method("findIndex", array_find_index)
        .add_prototype_method("every", array_every)
        .add_prototype_method("some", array_some)
        .add_prototype_method("join", array_join)
        .add_prototype_method("concat", array_concat)
        .add_prototype_method("reverse", array_reverse)
        .add_prototype_method("sort", array_sort)
        .add_prototype_method("toString", array_to_string)
        .add_method("isArray", is_array)
        .add_method("from", array_from)
        .add_method("of", array_of);

    registry.register_object(array);
}

fn array_object(this: &JsValue, method: &str) -> Result<JsObjectType, JErrorType> {
    match this {
        JsValue::Object(o) if matches!(o.borrow().class, ObjectClass::Array(_)) => Ok(o.clone()),
        _ => Err(JErrorType::type_error(format!(
            "Array.prototype.{} called on non-array",
            method
        ))),
    }
}

/// Snapshot of the elements.
fn elements(array: &JsObjectType) -> Vec<JsValue> {
    match &array.borrow().class {
        ObjectClass::Array(e) => e.clone(),
        _ => vec![],
    }
}

fn with_elements<R>(array: &JsObjectType, f: impl FnOnce(&mut Vec<JsValue>) -> R) -> Option<R> {
    match &mut array.borrow_mut().class {
        ObjectClass::Array(e) => Some(f(e)),
        _ => None,
    }
}

/// Relative index argument clamped into `0..=len`, as `slice` reads it.
fn relative_index(value: &JsValue, len: usize, default: usize, ctx: &mut EvalContext) -> Result<usize, JErrorType> {
    if value.is_undefined() {
        return Ok(default);
    }
    let n = to_number(value, ctx)?;
    let n = if n.is_nan() { 0.0 } else { n.trunc() };
    let len_f = len as f64;
    Ok(if n < 0.0 {
        (len_f + n).max(0.0) as usize
    } else {
        n.min(len_f) as usize
    })
}

fn callback_arg(args: &[JsValue]) -> Result<JsValue, JErrorType> {
    let callback = arg(args, 0);
    if !is_callable(&callback) {
        return Err(JErrorType::type_error(format!(
            "{} is not a function",
            inspect(&callback)
        )));
    }
    Ok(callback)
}

/// Calls `callback(element, index, array)` for each element until `visit`
/// returns true. Returns the index it stopped at.
fn iterate(
    this: &JsValue,
    args: &[JsValue],
    method: &str,
    ctx: &mut EvalContext,
    mut visit: impl FnMut(usize, &JsValue, JsValue) -> bool,
) -> Result<Option<usize>, JErrorType> {
    let array = array_object(this, method)?;
    let callback = callback_arg(args)?;
    let this_arg = arg(args, 1);
    let len = elements(&array).len();
    for i in 0..len {
        let element = match elements(&array).get(i) {
            Some(e) => e.clone(),
            None => break,
        };
        let result = call_function(
            &callback,
            this_arg.clone(),
            vec![element.clone(), JsValue::number(i as f64), this.clone()],
            ctx,
        )?;
        if visit(i, &element, result) {
            return Ok(Some(i));
        }
    }
    Ok(None)
}

fn invalid_array_length() -> JErrorType {
    JErrorType::RangeError("Invalid array length".to_string())
}

/// Array constructor.
fn array_constructor(
    ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    if let [JsValue::Number(n)] = args.as_slice() {
        let len = n.as_f64();
        if len < 0.0 || len.fract() != 0.0 || len > MAX_DENSE_LENGTH as f64 {
            return Err(invalid_array_length());
        }
        return Ok(ctx.new_array(vec![JsValue::Undefined; len as usize]));
    }
    Ok(ctx.new_array(args))
}

/// Array.isArray
fn is_array(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let value = arg(&args, 0);
    let result = matches!(
        &value,
        JsValue::Object(o) if matches!(o.borrow().class, ObjectClass::Array(_))
    );
    Ok(JsValue::Boolean(result))
}

/// Array.from
fn array_from(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let source = arg(&args, 0);
    let items = match &source {
        JsValue::Object(o) if !matches!(o.borrow().class, ObjectClass::Array(_) | ObjectClass::Map(_)) => {
            // Array-likes: `{ length: n }`.
            let len = get_property(&source, "length", ctx)?;
            let len = to_number(&len, ctx)?;
            let len = if len.is_finite() && len > 0.0 { len } else { 0.0 };
            if len > MAX_DENSE_LENGTH as f64 {
                return Err(invalid_array_length());
            }
            let len = len as usize;
            let mut items = Vec::with_capacity(len);
            for i in 0..len {
                items.push(get_property(&source, &i.to_string(), ctx)?);
            }
            items
        }
        _ => iterate_to_vec(&source, ctx)?,
    };
    let map_fn = arg(&args, 1);
    if map_fn.is_undefined() {
        return Ok(ctx.new_array(items));
    }
    let mut mapped = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        mapped.push(call_function(&map_fn, JsValue::Undefined, vec![item, JsValue::number(i as f64)], ctx)?);
    }
    Ok(ctx.new_array(mapped))
}

/// Array.of
fn array_of(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(ctx.new_array(args))
}

/// Array.prototype.push
fn array_push(_ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let array = array_object(&this, "push")?;
    let len = with_elements(&array, |e| {
        e.extend(args);
        e.len()
    });
    Ok(JsValue::number(len.unwrap_or(0) as f64))
}

/// Array.prototype.pop
fn array_pop(_ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let array = array_object(&this, "pop")?;
    Ok(with_elements(&array, |e| e.pop()).flatten().unwrap_or(JsValue::Undefined))
}

/// Array.prototype.shift
fn array_shift(_ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let array = array_object(&this, "shift")?;
    let first = with_elements(&array, |e| if e.is_empty() { None } else { Some(e.remove(0)) });
    Ok(first.flatten().unwrap_or(JsValue::Undefined))
}

/// Array.prototype.unshift
fn array_unshift(_ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let array = array_object(&this, "unshift")?;
    let len = with_elements(&array, |e| {
        e.splice(0..0, args);
        e.len()
    });
    Ok(JsValue::number(len.unwrap_or(0) as f64))
}

/// Array.prototype.slice
fn array_slice(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let array = array_object(&this, "slice")?;
    let items = elements(&array);
    let start = relative_index(&arg(&args, 0), items.len(), 0, ctx)?;
    let end = relative_index(&arg(&args, 1), items.len(), items.len(), ctx)?;
    let slice = if start < end { items[start..end].to_vec() } else { vec![] };
    Ok(ctx.new_array(slice))
}

/// Array.prototype.splice
fn array_splice(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let array = array_object(&this, "splice")?;
    let len = elements(&array).len();
    let start = relative_index(&arg(&args, 0), len, 0, ctx)?;
    let delete_count = match args.len() {
        0 => 0,
        1 => len - start,
        _ => {
            let n = to_number(&args[1], ctx)?;
            let n = if n.is_nan() { 0.0 } else { n.trunc() };
            (n.max(0.0) as usize).min(len - start)
        }
    };
    let inserted: Vec<JsValue> = args.into_iter().skip(2).collect();
    let removed = with_elements(&array, |e| {
        e.splice(start..start + delete_count, inserted).collect::<Vec<_>>()
    })
    .unwrap_or_default();
    Ok(ctx.new_array(removed))
}

/// Array.prototype.indexOf
fn array_index_of(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let array = array_object(&this, "indexOf")?;
    let items = elements(&array);
    let from = relative_index(&arg(&args, 1), items.len(), 0, ctx)?;
    let needle = arg(&args, 0);
    let found = items
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, v)| strict_equality_comparison(v, &needle))
        .map(|(i, _)| i as f64)
        .unwrap_or(-1.0);
    Ok(JsValue::number(found))
}

/// Array.prototype.includes
fn array_includes(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let array = array_object(&this, "includes")?;
    let items = elements(&array);
    let from = relative_index(&arg(&args, 1), items.len(), 0, ctx)?;
    let needle = arg(&args, 0);
    Ok(JsValue::Boolean(
        items.iter().skip(from).any(|v| same_value_zero(v, &needle)),
    ))
}

/// Array.prototype.forEach
fn array_for_each(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    iterate(&this, &args, "forEach", ctx, |_, _, _| false)?;
    Ok(JsValue::Undefined)
}

/// Array.prototype.map
fn array_map(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let mut mapped = vec![];
    iterate(&this, &args, "map", ctx, |_, _, result| {
        mapped.push(result);
        false
    })?;
    Ok(ctx.new_array(mapped))
}

/// Array.prototype.filter
fn array_filter(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let mut kept = vec![];
    iterate(&this, &args, "filter", ctx, |_, element, result| {
        if to_boolean(&result) {
            kept.push(element.clone());
        }
        false
    })?;
    Ok(ctx.new_array(kept))
}

/// Array.prototype.find
fn array_find(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let mut found = JsValue::Undefined;
    iterate(&this, &args, "find", ctx, |_, element, result| {
        let hit = to_boolean(&result);
        if hit {
            found = element.clone();
        }
        hit
    })?;
    Ok(found)
}

/// Array.prototype.findIndex
fn array_find_index(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let index = iterate(&this, &args, "findIndex", ctx, |_, _, result| to_boolean(&result))?;
    Ok(JsValue::number(index.map(|i| i as f64).unwrap_or(-1.0)))
}

/// Array.prototype.every
fn array_every(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let failed = iterate(&this, &args, "every", ctx, |_, _, result| !to_boolean(&result))?;
    Ok(JsValue::Boolean(failed.is_none()))
}

/// Array.prototype.some
fn array_some(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let hit = iterate(&this, &args, "some", ctx, |_, _, result| to_boolean(&result))?;
    Ok(JsValue::Boolean(hit.is_some()))
}

/// Array.prototype.reduce
fn array_reduce(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let array = array_object(&this, "reduce")?;
    let callback = callback_arg(&args)?;
    let items = elements(&array);
    let mut indices = 0..items.len();
    let mut accumulator = if args.len() >= 2 {
        args[1].clone()
    } else {
        match indices.next() {
            Some(i) => items[i].clone(),
            None => {
                return Err(JErrorType::type_error(
                    "Reduce of empty array with no initial value",
                ))
            }
        }
    };
    for i in indices {
        let element = match elements(&array).get(i) {
            Some(e) => e.clone(),
            None => break,
        };
        accumulator = call_function(
            &callback,
            JsValue::Undefined,
            vec![accumulator, element, JsValue::number(i as f64), this.clone()],
            ctx,
        )?;
    }
    Ok(accumulator)
}

fn join_elements(items: &[JsValue], separator: &str, ctx: &mut EvalContext) -> Result<String, JErrorType> {
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        parts.push(match item {
            JsValue::Undefined | JsValue::Null => String::new(),
            other => to_string(other, ctx)?,
        });
    }
    let total: usize = parts.iter().map(String::len).sum::<usize>()
        + separator.len() * parts.len().saturating_sub(1);
    check_string_length(total as f64)?;
    Ok(parts.join(separator))
}

/// Array.prototype.join
fn array_join(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let array = array_object(&this, "join")?;
    let separator = match arg(&args, 0) {
        JsValue::Undefined => ",".to_string(),
        other => to_string(&other, ctx)?,
    };
    Ok(JsValue::String(join_elements(&elements(&array), &separator, ctx)?))
}

/// Array.prototype.toString
fn array_to_string(ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let array = array_object(&this, "toString")?;
    Ok(JsValue::String(join_elements(&elements(&array), ",", ctx)?))
}

/// Array.prototype.concat
fn array_concat(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let array = array_object(&this, "concat")?;
    let mut result = elements(&array);
    for value in args {
        match &value {
            JsValue::Object(o) if matches!(o.borrow().class, ObjectClass::Array(_)) => {
                result.extend(elements(o));
            }
            _ => result.push(value),
        }
    }
    Ok(ctx.new_array(result))
}

/// Array.prototype.reverse
fn array_reverse(_ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let array = array_object(&this, "reverse")?;
    with_elements(&array, |e| e.reverse());
    Ok(this)
}

fn compare_elements(
    a: &JsValue,
    b: &JsValue,
    comparator: &JsValue,
    ctx: &mut EvalContext,
) -> Result<Ordering, JErrorType> {
    // Undefined sorts last whatever the comparator says.
    match (a.is_undefined(), b.is_undefined()) {
        (true, true) => return Ok(Ordering::Equal),
        (true, false) => return Ok(Ordering::Greater),
        (false, true) => return Ok(Ordering::Less),
        _ => {}
    }
    if comparator.is_undefined() {
        let (x, y) = (to_string(a, ctx)?, to_string(b, ctx)?);
        return Ok(x.encode_utf16().cmp(y.encode_utf16()));
    }
    let v = call_function(comparator, JsValue::Undefined, vec![a.clone(), b.clone()], ctx)?;
    let n = to_number(&v, ctx)?;
    Ok(if n < 0.0 {
        Ordering::Less
    } else if n > 0.0 {
        Ordering::Greater
    } else {
        Ordering::Equal
    })
}

/// Stable merge sort whose comparator may fail.
fn merge_sort(
    items: Vec<JsValue>,
    comparator: &JsValue,
    ctx: &mut EvalContext,
) -> Result<Vec<JsValue>, JErrorType> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let mut left = items;
    let right = left.split_off(left.len() / 2);
    let left = merge_sort(left, comparator, ctx)?;
    let right = merge_sort(right, comparator, ctx)?;
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let (mut l, mut r) = (left.into_iter().peekable(), right.into_iter().peekable());
    loop {
        let (a, b) = match (l.peek(), r.peek()) {
            (Some(a), Some(b)) => (a.clone(), b.clone()),
            _ => break,
        };
        if compare_elements(&b, &a, comparator, ctx)? == Ordering::Less {
            merged.extend(r.next());
        } else {
            merged.extend(l.next());
        }
    }
    merged.extend(l);
    merged.extend(r);
    Ok(merged)
}

/// Array.prototype.sort
fn array_sort(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let array = array_object(&this, "sort")?;
    let comparator = arg(&args, 0);
    if !comparator.is_undefined() && !is_callable(&comparator) {
        return Err(JErrorType::type_error(
            "The comparison function must be either a function or undefined",
        ));
    }
    let sorted = merge_sort(elements(&array), &comparator, ctx)?;
    with_elements(&array, |e| *e = sorted);
    Ok(this)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::plugin::registry::BuiltInRegistry;

    fn context() -> EvalContext {
        let mut ctx = EvalContext::new();
        ctx.install_core_builtins(BuiltInRegistry::with_core());
        ctx
    }

    fn numbers(ctx: &mut EvalContext, values: &[f64]) -> JsValue {
        ctx.new_array(values.iter().map(|n| JsValue::number(*n)).collect())
    }

    fn as_numbers(value: &JsValue) -> Vec<f64> {
        match value {
            JsValue::Object(o) => elements(o)
                .iter()
                .map(|v| match v {
                    JsValue::Number(n) => n.as_f64(),
                    _ => f64::NAN,
                })
                .collect(),
            _ => vec![],
        }
    }

    #[test]
    fn test_default_sort_compares_as_strings() {
        let mut ctx = context();
        let a = numbers(&mut ctx, &[10.0, 9.0, 1.0]);
        array_sort(&mut ctx, a.clone(), vec![]).unwrap();
        assert_eq!(as_numbers(&a), vec![1.0, 10.0, 9.0]);
    }

    #[test]
    fn test_splice_removes_and_inserts() {
        let mut ctx = context();
        let a = numbers(&mut ctx, &[1.0, 2.0, 3.0, 4.0]);
        let removed = array_splice(
            &mut ctx,
            a.clone(),
            vec![JsValue::number(1.0), JsValue::number(2.0), JsValue::number(9.0)],
        )
        .unwrap();
        assert_eq!(as_numbers(&removed), vec![2.0, 3.0]);
        assert_eq!(as_numbers(&a), vec![1.0, 9.0, 4.0]);
    }

    #[test]
    fn test_slice_with_negative_start() {
        let mut ctx = context();
        let a = numbers(&mut ctx, &[1.0, 2.0, 3.0]);
        let s = array_slice(&mut ctx, a, vec![JsValue::number(-2.0)]).unwrap();
        assert_eq!(as_numbers(&s), vec![2.0, 3.0]);
    }

    #[test]
    fn test_reduce_of_empty_array_fails() {
        let mut ctx = context();
        let a = numbers(&mut ctx, &[]);
        let f = ctx.get_binding("parseInt").unwrap();
        assert!(matches!(
            array_reduce(&mut ctx, a, vec![f]),
            Err(JErrorType::TypeError(_))
        ));
    }
}
