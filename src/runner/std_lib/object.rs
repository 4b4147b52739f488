//! Object built-in.
//!
//! Provides Object constructor, its static helpers and `Object.prototype`.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{array_index, property_names_in_chain, PropertyDescriptor, PropertyValue};
use crate::runner::ds::operations::test_and_comparison::same_value;
use crate::runner::ds::operations::type_conversion::{to_boolean, to_property_key};
use crate::runner::ds::value::JsValue;
use crate::runner::eval::expression::{get_property, iterate_to_vec, set_property};
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};

use super::{arg, this_object};

/// Register the Object built-in with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let object = BuiltInObject::new("Object")
        .with_constructor(object_constructor)
        .add_prototype_method("toString", object_to_string)
        .add_prototype_method("valueOf", object_value_of)
        .add_prototype_method("hasOwnProperty", object_has_own_property)
        .add_method("keys", object_keys)
        .add_method("values", object_values)
        .add_method("entries", object_entries)
        .add_method("fromEntries", object_from_entries)
        .add_method("assign", object_assign)
        .add_method("create", object_create)
        .add_method("getPrototypeOf", object_get_prototype_of)
        .add_method("getOwnPropertyNames", object_get_own_property_names)
        .add_method("defineProperty", object_define_property)
        .add_method("is", object_is);

    registry.register_object(object);
}

/// Object constructor.
fn object_constructor(
    ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    match args.into_iter().next() {
        Some(v @ JsValue::Object(_)) => Ok(v),
        _ => Ok(JsValue::Object(ctx.new_object())),
    }
}

/// Object.prototype.toString
fn object_to_string(
    _ctx: &mut EvalContext,
    this: JsValue,
    _args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let tag = match &this {
        JsValue::Undefined => "Undefined",
        JsValue::Null => "Null",
        JsValue::Boolean(_) => "Boolean",
        JsValue::Number(_) => "Number",
        JsValue::String(_) => "String",
        JsValue::Object(o) => o.borrow().class_name(),
    };
    Ok(JsValue::String(format!("[object {}]", tag)))
}

/// Object.prototype.valueOf
fn object_value_of(
    _ctx: &mut EvalContext,
    this: JsValue,
    _args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    Ok(this)
}

/// Object.prototype.hasOwnProperty
fn object_has_own_property(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let key = to_property_key(&arg(&args, 0), ctx)?;
    Ok(JsValue::Boolean(match &this {
        JsValue::Object(o) => o.borrow().has_own_property(&key),
        JsValue::String(s) => {
            key == "length" || array_index(&key).map(|i| i < s.chars().count()).unwrap_or(false)
        }
        _ => false,
    }))
}

fn own_enumerable_keys(value: &JsValue) -> Result<Vec<String>, JErrorType> {
    match value {
        JsValue::Object(o) => Ok(o.borrow().own_keys(false)),
        JsValue::String(s) => Ok((0..s.chars().count()).map(|i| i.to_string()).collect()),
        JsValue::Undefined | JsValue::Null => Err(JErrorType::type_error(format!(
            "Cannot convert {} to object",
            value
        ))),
        _ => Ok(vec![]),
    }
}

/// Object.keys
fn object_keys(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let keys = own_enumerable_keys(&arg(&args, 0))?
        .into_iter()
        .map(JsValue::String)
        .collect();
    Ok(ctx.new_array(keys))
}

/// Object.values
fn object_values(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let target = arg(&args, 0);
    let mut values = vec![];
    for key in own_enumerable_keys(&target)? {
        values.push(get_property(&target, &key, ctx)?);
    }
    Ok(ctx.new_array(values))
}

/// Object.entries
fn object_entries(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let target = arg(&args, 0);
    let mut entries = vec![];
    for key in own_enumerable_keys(&target)? {
        let value = get_property(&target, &key, ctx)?;
        entries.push(ctx.new_array(vec![JsValue::String(key), value]));
    }
    Ok(ctx.new_array(entries))
}

/// Object.fromEntries
fn object_from_entries(
    ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let result = ctx.new_object();
    for entry in iterate_to_vec(&arg(&args, 0), ctx)? {
        let key = get_property(&entry, "0", ctx)?;
        let key = to_property_key(&key, ctx)?;
        let value = get_property(&entry, "1", ctx)?;
        result.borrow_mut().define(key, PropertyDescriptor::data(value));
    }
    Ok(JsValue::Object(result))
}

/// Object.assign
fn object_assign(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let target = arg(&args, 0);
    this_object(&target, "Object.assign")?;
    for source in args.iter().skip(1) {
        for key in own_enumerable_keys(source).unwrap_or_default() {
            let value = get_property(source, &key, ctx)?;
            set_property(&target, &key, value, ctx)?;
        }
    }
    Ok(target)
}

/// Object.create
fn object_create(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let proto = match arg(&args, 0) {
        JsValue::Object(p) => Some(p),
        JsValue::Null => None,
        other => {
            return Err(JErrorType::type_error(format!(
                "Object prototype may only be an Object or null: {}",
                other
            )))
        }
    };
    let obj = ctx.new_object();
    obj.borrow_mut().prototype = proto;
    Ok(JsValue::Object(obj))
}

/// Object.getPrototypeOf
fn object_get_prototype_of(
    ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let proto = match arg(&args, 0) {
        JsValue::Object(o) => o.borrow().prototype.clone(),
        JsValue::String(_) => Some(ctx.prototype_for("String")),
        JsValue::Number(_) => Some(ctx.prototype_for("Number")),
        JsValue::Boolean(_) => Some(ctx.prototype_for("Boolean")),
        other => {
            return Err(JErrorType::type_error(format!(
                "Cannot convert {} to object",
                other
            )))
        }
    };
    Ok(proto.map(JsValue::Object).unwrap_or(JsValue::Null))
}

/// Object.getOwnPropertyNames
fn object_get_own_property_names(
    ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let target = this_object(&arg(&args, 0), "Object.getOwnPropertyNames")?;
    let names = target
        .borrow()
        .own_keys(true)
        .into_iter()
        .map(JsValue::String)
        .collect();
    Ok(ctx.new_array(names))
}

/// Object.defineProperty
fn object_define_property(
    ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let target_value = arg(&args, 0);
    let target = this_object(&target_value, "Object.defineProperty")?;
    let key = to_property_key(&arg(&args, 1), ctx)?;
    let attributes = arg(&args, 2);
    if !matches!(attributes, JsValue::Object(_)) {
        return Err(JErrorType::type_error("Property description must be an object"));
    }
    let flag = |name: &str, ctx: &mut EvalContext| -> Result<bool, JErrorType> {
        Ok(to_boolean(&get_property(&attributes, name, ctx)?))
    };
    let enumerable = flag("enumerable", ctx)?;
    let get = get_property(&attributes, "get", ctx)?;
    let set = get_property(&attributes, "set", ctx)?;
    let descriptor = if !get.is_undefined() || !set.is_undefined() {
        PropertyDescriptor {
            value: PropertyValue::Accessor {
                get: Some(get).filter(|g| !g.is_undefined()),
                set: Some(set).filter(|s| !s.is_undefined()),
            },
            enumerable,
            writable: true,
        }
    } else {
        PropertyDescriptor {
            value: PropertyValue::Data(get_property(&attributes, "value", ctx)?),
            enumerable,
            writable: flag("writable", ctx)?,
        }
    };
    target.borrow_mut().define(key, descriptor);
    Ok(target_value)
}

/// Object.is
fn object_is(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::Boolean(same_value(&arg(&args, 0), &arg(&args, 1))))
}

/// Every readable property name of `value`, own first, then inherited.
/// Used by completion; never runs script code.
pub fn readable_property_names(value: &JsValue, ctx: &mut EvalContext) -> Vec<String> {
    let holder = match value {
        JsValue::Object(o) => o.clone(),
        JsValue::String(s) => {
            let mut names: Vec<String> = (0..s.chars().count()).map(|i| i.to_string()).collect();
            names.push("length".to_string());
            let proto = ctx.prototype_for("String");
            names.extend(property_names_in_chain(&proto));
            return names;
        }
        JsValue::Number(_) => ctx.prototype_for("Number"),
        JsValue::Boolean(_) => ctx.prototype_for("Boolean"),
        JsValue::Undefined | JsValue::Null => return vec![],
    };
    property_names_in_chain(&holder)
}
