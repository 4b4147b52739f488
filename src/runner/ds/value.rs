use std::cell::RefCell;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::JsObject;
use crate::runner::ds::operations::type_conversion::{TYPE_STR_NULL, TYPE_STR_UNDEFINED};

pub type JsObjectType = Rc<RefCell<JsObject>>;

/// Longest string a script can build, in bytes.
pub const MAX_STRING_LENGTH: usize = (1 << 29) - 24;

/// Refuses to build a string of `len` bytes past [`MAX_STRING_LENGTH`].
pub fn check_string_length(len: f64) -> Result<(), JErrorType> {
    if len > MAX_STRING_LENGTH as f64 {
        Err(JErrorType::RangeError("Invalid string length".to_string()))
    } else {
        Ok(())
    }
}

#[derive(Clone)]
pub enum JsValue {
    Undefined,
    Null,
    Boolean(bool),
    String(String),
    Number(JsNumberType),
    Object(JsObjectType),
}

impl JsValue {
    pub fn number(n: f64) -> Self {
        JsValue::Number(JsNumberType::from_f64(n))
    }

    pub fn string(s: impl Into<String>) -> Self {
        JsValue::String(s.into())
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, JsValue::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, JsValue::Undefined | JsValue::Null)
    }

    pub fn as_object(&self) -> Option<&JsObjectType> {
        match self {
            JsValue::Object(o) => Some(o),
            _ => None,
        }
    }
}

/// Primitive rendering; objects print as `[object]`. Use the shell's
/// inspector for a structural view.
impl Display for JsValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            JsValue::Undefined => write!(f, "{}", TYPE_STR_UNDEFINED),
            JsValue::Null => write!(f, "{}", TYPE_STR_NULL),
            JsValue::Boolean(b) => write!(f, "{}", b),
            JsValue::String(s) => write!(f, "{}", s),
            JsValue::Number(n) => write!(f, "{}", n),
            JsValue::Object(_) => write!(f, "[object]"),
        }
    }
}

impl fmt::Debug for JsValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            JsValue::Undefined => write!(f, "JsValue::Undefined"),
            JsValue::Null => write!(f, "JsValue::Null"),
            JsValue::Boolean(b) => write!(f, "JsValue::Boolean({})", b),
            JsValue::String(s) => write!(f, "JsValue::String({:?})", s),
            JsValue::Number(n) => write!(f, "JsValue::Number({:?})", n),
            JsValue::Object(_) => write!(f, "JsValue::Object(...)"),
        }
    }
}

/// Strict equality, except that objects compare by identity and numbers by
/// numeric value (`Integer(1) == Float(1.0)`).
impl PartialEq for JsValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (JsValue::Undefined, JsValue::Undefined) => true,
            (JsValue::Null, JsValue::Null) => true,
            (JsValue::Boolean(a), JsValue::Boolean(b)) => a == b,
            (JsValue::String(a), JsValue::String(b)) => a == b,
            (JsValue::Number(a), JsValue::Number(b)) => a.as_f64() == b.as_f64(),
            (JsValue::Object(a), JsValue::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JsNumberType {
    Integer(i64),
    Float(f64),
    NaN,
    PositiveInfinity,
    NegativeInfinity,
}

impl JsNumberType {
    /// Normalises: whole numbers within the safe integer range become
    /// `Integer`, non-finite values get their own variants.
    pub fn from_f64(n: f64) -> Self {
        if n.is_nan() {
            JsNumberType::NaN
        } else if n == f64::INFINITY {
            JsNumberType::PositiveInfinity
        } else if n == f64::NEG_INFINITY {
            JsNumberType::NegativeInfinity
        } else if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 && !(n == 0.0 && n.is_sign_negative()) {
            JsNumberType::Integer(n as i64)
        } else {
            JsNumberType::Float(n)
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            JsNumberType::Integer(i) => *i as f64,
            JsNumberType::Float(f) => *f,
            JsNumberType::NaN => f64::NAN,
            JsNumberType::PositiveInfinity => f64::INFINITY,
            JsNumberType::NegativeInfinity => f64::NEG_INFINITY,
        }
    }
}

impl Display for JsNumberType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            JsNumberType::Integer(i) => write!(f, "{}", i),
            JsNumberType::Float(nf) => write!(f, "{}", format_number(*nf)),
            JsNumberType::NaN => write!(f, "NaN"),
            JsNumberType::PositiveInfinity => write!(f, "Infinity"),
            JsNumberType::NegativeInfinity => write!(f, "-Infinity"),
        }
    }
}

/// Number-to-string the way scripts see it: shortest round-trip digits,
/// exponent form outside `[1e-7, 1e21)`.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let abs = n.abs();
    if abs >= 1e21 || abs < 1e-6 {
        let s = format!("{:e}", n);
        match s.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
            Some((mantissa, exp)) => format!("{}e{}", mantissa, exp),
            None => s,
        }
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_normalisation() {
        assert_eq!(JsNumberType::from_f64(3.0), JsNumberType::Integer(3));
        assert_eq!(JsNumberType::from_f64(0.5), JsNumberType::Float(0.5));
        assert_eq!(JsNumberType::from_f64(f64::NAN), JsNumberType::NaN);
        assert_eq!(JsNumberType::from_f64(-f64::INFINITY), JsNumberType::NegativeInfinity);
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(1.5e-7), "1.5e-7");
        assert_eq!(format_number(-2.5), "-2.5");
    }
}
