//! Map built-in.
//!
//! Entries are kept in insertion order and keys compare with SameValueZero.
//! `keys`, `values` and `entries` return arrays snapshotting the map, which
//! `for...of` and spread iterate like any other array.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{JsObject, ObjectClass};
use crate::runner::ds::operations::test_and_comparison::same_value_zero;
use crate::runner::ds::value::{JsNumberType, JsObjectType, JsValue};
use crate::runner::eval::expression::{get_property, iterate_to_vec};
use crate::runner::eval::function::{call_function, is_callable};
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};

use super::arg;

/// Register the Map built-in with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let map = BuiltInObject::new("Map")
        .with_constructor(map_constructor)
        .add_prototype_method("get", map_get)
        .add_prototype_method("set", map_set)
        .add_prototype_method("has", map_has)
        .add_prototype_method("delete", map_delete)
        .add_prototype_method("clear", map_clear)
        .add_prototype_method("forEach", map_for_each)
        .add_prototype_method("keys", map_keys)
        .add_prototype_method("values", map_values)
        .add_prototype_method("entries", map_entries)
        .add_getter("size", map_size);

    registry.register_object(map);
}

fn map_object(this: &JsValue, method: &str) -> Result<JsObjectType, JErrorType> {
    match this {
        JsValue::Object(o) if matches!(o.borrow().class, ObjectClass::Map(_)) => Ok(o.clone()),
        _ => Err(JErrorType::type_error(format!(
            "Method Map.prototype.{} called on incompatible receiver",
            method
        ))),
    }
}

fn entries_of(map: &JsObjectType) -> Vec<(JsValue, JsValue)> {
    match &map.borrow().class {
        ObjectClass::Map(entries) => entries.clone(),
        _ => vec![],
    }
}

/// `-0` keys are stored as `+0`.
fn normalize_key(key: JsValue) -> JsValue {
    match key {
        JsValue::Number(JsNumberType::Float(f)) if f == 0.0 => JsValue::Number(JsNumberType::Integer(0)),
        other => other,
    }
}

fn insert(map: &JsObjectType, key: JsValue, value: JsValue) {
    if let ObjectClass::Map(entries) = &mut map.borrow_mut().class {
        let key = normalize_key(key);
        match entries.iter_mut().find(|(k, _)| same_value_zero(k, &key)) {
            Some(entry) => entry.1 = value,
            None => entries.push((key, value)),
        }
    }
}

/// Map constructor.
fn map_constructor(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let proto = match &this {
        JsValue::Object(o) => o.borrow().prototype.clone(),
        _ => return Err(JErrorType::type_error("Constructor Map requires 'new'")),
    };
    let map = JsObject::new(ObjectClass::Map(vec![]), proto).into_ref();
    let init = arg(&args, 0);
    if !init.is_nullish() {
        for entry in iterate_to_vec(&init, ctx)? {
            if !matches!(entry, JsValue::Object(_)) {
                return Err(JErrorType::type_error(format!(
                    "Iterator value {} is not an entry object",
                    entry
                )));
            }
            let key = get_property(&entry, "0", ctx)?;
            let value = get_property(&entry, "1", ctx)?;
            insert(&map, key, value);
        }
    }
    Ok(JsValue::Object(map))
}

/// Map.prototype.get
fn map_get(_ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let map = map_object(&this, "get")?;
    let key = arg(&args, 0);
    Ok(entries_of(&map)
        .into_iter()
        .find(|(k, _)| same_value_zero(k, &key))
        .map(|(_, v)| v)
        .unwrap_or(JsValue::Undefined))
}

/// Map.prototype.set
fn map_set(_ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let map = map_object(&this, "set")?;
    insert(&map, arg(&args, 0), arg(&args, 1));
    Ok(this)
}

/// Map.prototype.has
fn map_has(_ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let map = map_object(&this, "has")?;
    let key = arg(&args, 0);
    Ok(JsValue::Boolean(
        entries_of(&map).iter().any(|(k, _)| same_value_zero(k, &key)),
    ))
}

/// Map.prototype.delete
fn map_delete(_ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let map = map_object(&this, "delete")?;
    let key = arg(&args, 0);
    let mut removed = false;
    if let ObjectClass::Map(entries) = &mut map.borrow_mut().class {
        let before = entries.len();
        entries.retain(|(k, _)| !same_value_zero(k, &key));
        removed = entries.len() != before;
    }
    Ok(JsValue::Boolean(removed))
}

/// Map.prototype.clear
fn map_clear(_ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let map = map_object(&this, "clear")?;
    if let ObjectClass::Map(entries) = &mut map.borrow_mut().class {
        entries.clear();
    }
    Ok(JsValue::Undefined)
}

/// Map.prototype.forEach
fn map_for_each(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let map = map_object(&this, "forEach")?;
    let callback = arg(&args, 0);
    if !is_callable(&callback) {
        return Err(JErrorType::type_error(format!("{} is not a function", callback)));
    }
    let this_arg = arg(&args, 1);
    for (k, v) in entries_of(&map) {
        call_function(&callback, this_arg.clone(), vec![v, k, this.clone()], ctx)?;
    }
    Ok(JsValue::Undefined)
}

/// Map.prototype.keys
fn map_keys(ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let map = map_object(&this, "keys")?;
    let keys = entries_of(&map).into_iter().map(|(k, _)| k).collect();
    Ok(ctx.new_array(keys))
}

/// Map.prototype.values
fn map_values(ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let map = map_object(&this, "values")?;
    let values = entries_of(&map).into_iter().map(|(_, v)| v).collect();
    Ok(ctx.new_array(values))
}

/// Map.prototype.entries
fn map_entries(ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let map = map_object(&this, "entries")?;
    let mut pairs = vec![];
    for (k, v) in entries_of(&map) {
        pairs.push(ctx.new_array(vec![k, v]));
    }
    Ok(ctx.new_array(pairs))
}

/// get Map.prototype.size
fn map_size(_ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let map = map_object(&this, "size")?;
    Ok(JsValue::number(entries_of(&map).len() as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_map(ctx: &mut EvalContext) -> JsValue {
        let receiver = JsValue::Object(ctx.new_object_of(ObjectClass::Ordinary, "Map"));
        map_constructor(ctx, receiver, vec![]).unwrap()
    }

    #[test]
    fn test_nan_and_negative_zero_keys() {
        let mut ctx = EvalContext::new();
        let m = new_map(&mut ctx);
        map_set(&mut ctx, m.clone(), vec![JsValue::number(f64::NAN), JsValue::string("nan")]).unwrap();
        map_set(&mut ctx, m.clone(), vec![JsValue::number(-0.0), JsValue::string("zero")]).unwrap();
        assert_eq!(
            map_get(&mut ctx, m.clone(), vec![JsValue::number(f64::NAN)]).unwrap(),
            JsValue::string("nan")
        );
        assert_eq!(
            map_get(&mut ctx, m.clone(), vec![JsValue::number(0.0)]).unwrap(),
            JsValue::string("zero")
        );
        assert_eq!(map_size(&mut ctx, m, vec![]).unwrap(), JsValue::number(2.0));
    }

    #[test]
    fn test_set_overwrites_in_place() {
        let mut ctx = EvalContext::new();
        let m = new_map(&mut ctx);
        for (k, v) in [("a", 1.0), ("b", 2.0), ("a", 3.0)] {
            map_set(&mut ctx, m.clone(), vec![JsValue::string(k), JsValue::number(v)]).unwrap();
        }
        let keys = map_keys(&mut ctx, m.clone(), vec![]).unwrap();
        assert_eq!(get_property(&keys, "0", &mut ctx).unwrap(), JsValue::string("a"));
        assert_eq!(
            map_get(&mut ctx, m.clone(), vec![JsValue::string("a")]).unwrap(),
            JsValue::number(3.0)
        );
        assert_eq!(
            map_delete(&mut ctx, m.clone(), vec![JsValue::string("a")]).unwrap(),
            JsValue::Boolean(true)
        );
        assert_eq!(map_size(&mut ctx, m, vec![]).unwrap(), JsValue::number(1.0));
    }

    #[test]
    fn test_plain_call_requires_new() {
        let mut ctx = EvalContext::new();
        assert!(map_constructor(&mut ctx, JsValue::Undefined, vec![]).is_err());
    }
}
