//! JSON built-in object.
//!
//! Provides JSON.parse and JSON.stringify, converting through
//! [`serde_json::Value`]. `preserve_order` keeps object keys in source order.

use std::rc::Rc;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Number, Serializer, Value};

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{ObjectClass, PropertyDescriptor};
use crate::runner::ds::operations::type_conversion::to_string;
use crate::runner::ds::value::{JsNumberType, JsObjectType, JsValue};
use crate::runner::eval::expression::get_property;
use crate::runner::eval::function::{call_function, is_callable};
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};

use super::arg;

/// Register the JSON object with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let json = BuiltInObject::new("JSON")
        .with_no_prototype()
        .add_method("parse", json_parse)
        .add_method("stringify", json_stringify);

    registry.register_object(json);
}

/// JSON.parse - Parse JSON string to JavaScript value.
fn json_parse(
    ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let text = to_string(&arg(&args, 0), ctx)?;
    let value: Value = serde_json::from_str(&text).map_err(|e| {
        if e.is_eof() {
            JErrorType::SyntaxError("Unexpected end of JSON input".to_string())
        } else {
            JErrorType::SyntaxError(format!("{} in JSON", e))
        }
    })?;
    Ok(from_json(value, ctx))
}

fn from_json(value: Value, ctx: &mut EvalContext) -> JsValue {
    match value {
        Value::Null => JsValue::Null,
        Value::Bool(b) => JsValue::Boolean(b),
        Value::Number(n) => JsValue::number(n.as_f64().unwrap_or(f64::NAN)),
        Value::String(s) => JsValue::String(s),
        Value::Array(items) => {
            let items = items.into_iter().map(|v| from_json(v, ctx)).collect();
            ctx.new_array(items)
        }
        Value::Object(entries) => {
            let obj = ctx.new_object();
            for (k, v) in entries {
                let v = from_json(v, ctx);
                obj.borrow_mut().define(k, PropertyDescriptor::data(v));
            }
            JsValue::Object(obj)
        }
    }
}

/// JSON.stringify - Convert JavaScript value to JSON string.
fn json_stringify(
    ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let mut stack = vec![];
    let value = match to_json(&arg(&args, 0), &mut stack, ctx)? {
        Some(v) => v,
        None => return Ok(JsValue::Undefined),
    };
    let indent = match arg(&args, 2) {
        JsValue::Number(n) => " ".repeat(n.as_f64().clamp(0.0, 10.0) as usize),
        JsValue::String(s) => s.chars().take(10).collect(),
        _ => String::new(),
    };
    let text = if indent.is_empty() {
        serde_json::to_string(&value)
    } else {
        let mut out = vec![];
        let formatter = PrettyFormatter::with_indent(indent.as_bytes());
        let mut serializer = Serializer::with_formatter(&mut out, formatter);
        value
            .serialize(&mut serializer)
            .map(|_| String::from_utf8_lossy(&out).into_owned())
    };
    text.map(JsValue::String)
        .map_err(|e| JErrorType::type_error(e.to_string()))
}

fn json_number(n: &JsNumberType) -> Value {
    match n {
        JsNumberType::Integer(i) => Value::Number(Number::from(*i)),
        JsNumberType::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// `None` for values JSON omits: undefined and functions.
fn to_json(
    value: &JsValue,
    stack: &mut Vec<JsObjectType>,
    ctx: &mut EvalContext,
) -> Result<Option<Value>, JErrorType> {
    let obj = match value {
        JsValue::Undefined => return Ok(None),
        JsValue::Null => return Ok(Some(Value::Null)),
        JsValue::Boolean(b) => return Ok(Some(Value::Bool(*b))),
        JsValue::Number(n) => return Ok(Some(json_number(n))),
        JsValue::String(s) => return Ok(Some(Value::String(s.to_string()))),
        JsValue::Object(o) => o.clone(),
    };
    if obj.borrow().is_callable() {
        return Ok(None);
    }
    let to_json_method = get_property(value, "toJSON", ctx)?;
    if is_callable(&to_json_method) {
        let replaced = call_function(&to_json_method, value.clone(), vec![], ctx)?;
        if !matches!(&replaced, JsValue::Object(r) if Rc::ptr_eq(r, &obj)) {
            return to_json(&replaced, stack, ctx);
        }
    }
    if stack.iter().any(|s| Rc::ptr_eq(s, &obj)) {
        return Err(JErrorType::type_error("Converting circular structure to JSON"));
    }
    stack.push(obj.clone());
    let result = object_to_json(value, &obj, stack, ctx);
    stack.pop();
    result.map(Some)
}

fn object_to_json(
    value: &JsValue,
    obj: &JsObjectType,
    stack: &mut Vec<JsObjectType>,
    ctx: &mut EvalContext,
) -> Result<Value, JErrorType> {
    enum Kind {
        Array(usize),
        Map,
        Plain(Vec<String>),
    }
    let kind = match &obj.borrow().class {
        ObjectClass::Array(elements) => Kind::Array(elements.len()),
        ObjectClass::Map(_) => Kind::Map,
        _ => Kind::Plain(obj.borrow().own_keys(false)),
    };
    match kind {
        Kind::Array(len) => {
            let mut items = Vec::with_capacity(len);
            for i in 0..len {
                let element = get_property(value, &i.to_string(), ctx)?;
                items.push(to_json(&element, stack, ctx)?.unwrap_or(Value::Null));
            }
            Ok(Value::Array(items))
        }
        Kind::Map => Ok(Value::Object(Map::new())),
        Kind::Plain(keys) => {
            let mut entries = Map::new();
            for key in keys {
                let v = get_property(value, &key, ctx)?;
                if let Some(v) = to_json(&v, stack, ctx)? {
                    entries.insert(key, v);
                }
            }
            Ok(Value::Object(entries))
        }
    }
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

    #[test]
    fn test_parse_then_stringify_keeps_key_order() {
        let mut ctx = context();
        let parsed = json_parse(
            &mut ctx,
            JsValue::Undefined,
            vec![JsValue::string(r#"{"b":1,"a":[true,null,"x"]}"#)],
        )
        .unwrap();
        let text = json_stringify(&mut ctx, JsValue::Undefined, vec![parsed]).unwrap();
        assert_eq!(text, JsValue::string(r#"{"b":1,"a":[true,null,"x"]}"#));
    }

    #[test]
    fn test_stringify_with_indent() {
        let mut ctx = context();
        let arr = ctx.new_array(vec![JsValue::number(1.0), JsValue::number(2.5)]);
        let text = json_stringify(
            &mut ctx,
            JsValue::Undefined,
            vec![arr, JsValue::Undefined, JsValue::number(2.0)],
        )
        .unwrap();
        assert_eq!(text, JsValue::string("[\n  1,\n  2.5\n]"));
    }

    #[test]
    fn test_stringify_rejects_cycles() {
        let mut ctx = context();
        let obj = ctx.new_object();
        obj.borrow_mut()
            .define("me", PropertyDescriptor::data(JsValue::Object(obj.clone())));
        let result = json_stringify(&mut ctx, JsValue::Undefined, vec![JsValue::Object(obj)]);
        assert!(matches!(result, Err(JErrorType::TypeError(_))));
    }

    #[test]
    fn test_parse_error_is_syntax_error() {
        let mut ctx = context();
        let result = json_parse(&mut ctx, JsValue::Undefined, vec![JsValue::string("{")]);
        assert!(matches!(result, Err(JErrorType::SyntaxError(_))));
    }
}
