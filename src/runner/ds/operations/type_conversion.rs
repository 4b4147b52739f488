use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::ObjectClass;
use crate::runner::ds::value::{format_number, JsValue};
use crate::runner::eval::expression::get_property;
use crate::runner::eval::function::call_function;
use crate::runner::plugin::types::EvalContext;

pub const TYPE_STR_UNDEFINED: &str = "undefined";
pub const TYPE_STR_NULL: &str = "null";
pub const TYPE_STR_BOOLEAN: &str = "boolean";
pub const TYPE_STR_STRING: &str = "string";
pub const TYPE_STR_NUMBER: &str = "number";
pub const TYPE_STR_OBJECT: &str = "object";
pub const TYPE_STR_FUNCTION: &str = "function";

/// Type tag with `null` kept distinct from objects.
pub fn get_type(a: &JsValue) -> &'static str {
    match a {
        JsValue::Undefined => TYPE_STR_UNDEFINED,
        JsValue::Null => TYPE_STR_NULL,
        JsValue::Boolean(_) => TYPE_STR_BOOLEAN,
        JsValue::String(_) => TYPE_STR_STRING,
        JsValue::Number(_) => TYPE_STR_NUMBER,
        JsValue::Object(o) => {
            if o.borrow().is_callable() {
                TYPE_STR_FUNCTION
            } else {
                TYPE_STR_OBJECT
            }
        }
    }
}

/// Result of the `typeof` operator.
pub fn type_of(a: &JsValue) -> &'static str {
    match get_type(a) {
        TYPE_STR_NULL => TYPE_STR_OBJECT,
        t => t,
    }
}

pub fn to_boolean(v: &JsValue) -> bool {
    match v {
        JsValue::Undefined | JsValue::Null => false,
        JsValue::Boolean(b) => *b,
        JsValue::String(s) => !s.is_empty(),
        JsValue::Number(n) => {
            let n = n.as_f64();
            !(n == 0.0 || n.is_nan())
        }
        JsValue::Object(_) => true,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PreferredType {
    Default,
    String,
    Number,
}

pub fn to_primitive(
    v: &JsValue,
    preferred_type: PreferredType,
    ctx: &mut EvalContext,
) -> Result<JsValue, JErrorType> {
    let obj = match v {
        JsValue::Object(o) => o.clone(),
        _ => return Ok(v.clone()),
    };
    let order = match preferred_type {
        PreferredType::String => ["toString", "valueOf"],
        _ => ["valueOf", "toString"],
    };
    let mut found_method = false;
    for name in order {
        let method = get_property(v, name, ctx)?;
        let callable = method
            .as_object()
            .map(|m| m.borrow().is_callable())
            .unwrap_or(false);
        if callable {
            found_method = true;
            let result = call_function(&method, v.clone(), vec![], ctx)?;
            if !matches!(result, JsValue::Object(_)) {
                return Ok(result);
            }
        }
    }
    if found_method {
        return Err(JErrorType::type_error(
            "Cannot convert object to primitive value",
        ));
    }
    let fallback = match &obj.borrow().class {
        ObjectClass::Function(f) => format!("function {}() {{ [native code] }}", f.name),
        _ => "[object Object]".to_string(),
    };
    Ok(JsValue::String(fallback))
}

/// Numeric value of a string the way `Number(s)` reads it.
pub fn string_to_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    let radix = |prefix: [&str; 2], radix: u32| -> Option<f64> {
        let rest = t.strip_prefix(prefix[0]).or_else(|| t.strip_prefix(prefix[1]))?;
        Some(
            u64::from_str_radix(rest, radix)
                .map(|v| v as f64)
                .unwrap_or(f64::NAN),
        )
    };
    if let Some(n) = radix(["0x", "0X"], 16)
        .or_else(|| radix(["0o", "0O"], 8))
        .or_else(|| radix(["0b", "0B"], 2))
    {
        return n;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    let valid = t
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !valid {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

pub fn to_number(v: &JsValue, ctx: &mut EvalContext) -> Result<f64, JErrorType> {
    Ok(match v {
        JsValue::Undefined => f64::NAN,
        JsValue::Null => 0.0,
        JsValue::Boolean(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        JsValue::String(s) => string_to_number(s),
        JsValue::Number(n) => n.as_f64(),
        JsValue::Object(_) => {
            let pv = to_primitive(v, PreferredType::Number, ctx)?;
            to_number(&pv, ctx)?
        }
    })
}

pub fn to_string(v: &JsValue, ctx: &mut EvalContext) -> Result<String, JErrorType> {
    match v {
        JsValue::Number(n) => Ok(format_number(n.as_f64())),
        JsValue::Object(_) => {
            let pv = to_primitive(v, PreferredType::String, ctx)?;
            to_string(&pv, ctx)
        }
        other => Ok(other.to_string()),
    }
}

pub fn to_property_key(v: &JsValue, ctx: &mut EvalContext) -> Result<String, JErrorType> {
    to_string(v, ctx)
}

pub fn to_int32(n: f64) -> i32 {
    to_uint32(n) as i32
}

pub fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() {
        return 0;
    }
    let m = n.trunc().rem_euclid(4_294_967_296.0);
    m as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_to_number() {
        assert_eq!(string_to_number("  42 "), 42.0);
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("0x1F"), 31.0);
        assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
        assert!(string_to_number("inf").is_nan());
        assert!(string_to_number("12px").is_nan());
    }

    #[test]
    fn test_int32_wraps() {
        assert_eq!(to_int32(4_294_967_295.0), -1);
        assert_eq!(to_uint32(-1.0), 4_294_967_295);
        assert_eq!(to_int32(f64::NAN), 0);
        assert_eq!(to_int32(2.9), 2);
    }

    #[test]
    fn test_truthiness() {
        assert!(!to_boolean(&JsValue::string("")));
        assert!(to_boolean(&JsValue::string("0")));
        assert!(!to_boolean(&JsValue::number(f64::NAN)));
        assert!(!to_boolean(&JsValue::Null));
    }
}
