//! Number built-in.
//!
//! Provides Number constructor, its static predicates and the formatting
//! methods on `Number.prototype`. The global `parseInt`, `parseFloat`,
//! `isNaN` and `isFinite` share their implementations with this module.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::operations::type_conversion::{to_number, to_string};
use crate::runner::ds::value::{format_number, JsNumberType, JsValue};
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};

use super::arg;

/// Register the Number built-in with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let number = BuiltInObject::new("Number")
        .with_constructor(number_constructor)
        .add_property("MAX_VALUE", JsValue::Number(JsNumberType::Float(f64::MAX)))
        .add_property("MIN_VALUE", JsValue::Number(JsNumberType::Float(5e-324)))
        .add_property("POSITIVE_INFINITY", JsValue::Number(JsNumberType::PositiveInfinity))
        .add_property("NEGATIVE_INFINITY", JsValue::Number(JsNumberType::NegativeInfinity))
        .add_property("NaN", JsValue::Number(JsNumberType::NaN))
        .add_property("MAX_SAFE_INTEGER", JsValue::Number(JsNumberType::Integer(9007199254740991)))
        .add_property("MIN_SAFE_INTEGER", JsValue::Number(JsNumberType::Integer(-9007199254740991)))
        .add_property("EPSILON", JsValue::Number(JsNumberType::Float(f64::EPSILON)))
        .add_method("isNaN", number_is_nan)
        .add_method("isFinite", number_is_finite)
        .add_method("isInteger", number_is_integer)
        .add_method("isSafeInteger", number_is_safe_integer)
        .add_method("parseFloat", parse_float)
        .add_method("parseInt", parse_int)
        .add_prototype_method("toString", number_to_string)
        .add_prototype_method("toFixed", number_to_fixed)
        .add_prototype_method("toPrecision", number_to_precision)
        .add_prototype_method("valueOf", number_value_of);

    registry.register_object(number);
}

fn this_number(this: &JsValue) -> Result<f64, JErrorType> {
    match this {
        JsValue::Number(n) => Ok(n.as_f64()),
        _ => Err(JErrorType::type_error(
            "Number.prototype method requires that 'this' be a Number",
        )),
    }
}

/// Number constructor.
fn number_constructor(
    ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    if args.is_empty() {
        return Ok(JsValue::Number(JsNumberType::Integer(0)));
    }
    Ok(JsValue::number(to_number(&args[0], ctx)?))
}

/// Number.prototype.valueOf
fn number_value_of(_ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::number(this_number(&this)?))
}

/// Number.isNaN - no coercion.
fn number_is_nan(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    Ok(JsValue::Boolean(matches!(
        args.first(),
        Some(JsValue::Number(JsNumberType::NaN))
    )))
}

/// Number.isFinite - no coercion.
fn number_is_finite(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    Ok(JsValue::Boolean(matches!(
        args.first(),
        Some(JsValue::Number(JsNumberType::Integer(_) | JsNumberType::Float(_)))
    )))
}

/// Number.isInteger
fn number_is_integer(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let result = match args.first() {
        Some(JsValue::Number(n)) => {
            let f = n.as_f64();
            f.is_finite() && f.fract() == 0.0
        }
        _ => false,
    };
    Ok(JsValue::Boolean(result))
}

/// Number.isSafeInteger
fn number_is_safe_integer(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let result = match args.first() {
        Some(JsValue::Number(n)) => {
            let f = n.as_f64();
            f.is_finite() && f.fract() == 0.0 && f.abs() <= 9007199254740991.0
        }
        _ => false,
    };
    Ok(JsValue::Boolean(result))
}

/// Global `isNaN`, which coerces its argument.
pub(crate) fn global_is_nan(
    ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    Ok(JsValue::Boolean(to_number(&arg(&args, 0), ctx)?.is_nan()))
}

/// Global `isFinite`, which coerces its argument.
pub(crate) fn global_is_finite(
    ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    Ok(JsValue::Boolean(to_number(&arg(&args, 0), ctx)?.is_finite()))
}

/// parseFloat: longest numeric prefix of the trimmed string.
pub(crate) fn parse_float(
    ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let s = to_string(&arg(&args, 0), ctx)?;
    let s = s.trim_start();
    for (prefix, value) in [("Infinity", f64::INFINITY), ("+Infinity", f64::INFINITY), ("-Infinity", f64::NEG_INFINITY)] {
        if s.starts_with(prefix) {
            return Ok(JsValue::number(value));
        }
    }
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut seen_exp = false;
    let bytes = s.as_bytes();
    while end < bytes.len() {
        let b = bytes[end];
        match b {
            b'0'..=b'9' => seen_digit = true,
            b'+' | b'-' if end == 0 || matches!(bytes[end - 1], b'e' | b'E') => {}
            b'.' if !seen_dot && !seen_exp => seen_dot = true,
            b'e' | b'E' if seen_digit && !seen_exp => seen_exp = true,
            _ => break,
        }
        end += 1;
    }
    // Back off a dangling exponent or sign: "1e", "1e+".
    let mut candidate = &s[..end];
    while !candidate.is_empty() && candidate.parse::<f64>().is_err() {
        candidate = &candidate[..candidate.len() - 1];
    }
    Ok(JsValue::number(candidate.parse::<f64>().unwrap_or(f64::NAN)))
}

/// parseInt with an optional radix; `0x` selects hexadecimal.
pub(crate) fn parse_int(
    ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let s = to_string(&arg(&args, 0), ctx)?;
    let mut s = s.trim();
    let negative = s.starts_with('-');
    if negative || s.starts_with('+') {
        s = &s[1..];
    }
    let mut radix = match arg(&args, 1) {
        JsValue::Undefined => 0,
        other => to_number(&other, ctx)? as i64,
    };
    if radix == 0 || radix == 16 {
        if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            s = rest;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return Ok(JsValue::Number(JsNumberType::NaN));
    }
    let digits: String = s
        .chars()
        .take_while(|c| c.is_digit(radix as u32))
        .collect();
    if digits.is_empty() {
        return Ok(JsValue::Number(JsNumberType::NaN));
    }
    let value = digits
        .chars()
        .filter_map(|c| c.to_digit(radix as u32))
        .fold(0f64, |acc, d| acc * radix as f64 + d as f64);
    Ok(JsValue::number(if negative { -value } else { value }))
}

/// Number.prototype.toString
fn number_to_string(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let n = this_number(&this)?;
    let radix = match arg(&args, 0) {
        JsValue::Undefined => 10,
        other => to_number(&other, ctx)? as i64,
    };
    if !(2..=36).contains(&radix) {
        return Err(JErrorType::RangeError(
            "toString() radix must be between 2 and 36".to_string(),
        ));
    }
    if radix == 10 || !n.is_finite() {
        return Ok(JsValue::String(format_number(n)));
    }
    Ok(JsValue::String(format_radix(n.trunc() as i128, radix as u32)))
}

/// Number.prototype.toFixed
fn number_to_fixed(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let n = this_number(&this)?;
    let digits = match arg(&args, 0) {
        JsValue::Undefined => 0.0,
        other => to_number(&other, ctx)?.trunc(),
    };
    if !(0.0..=100.0).contains(&digits) {
        return Err(JErrorType::RangeError(
            "toFixed() digits argument must be between 0 and 100".to_string(),
        ));
    }
    if !n.is_finite() || n.abs() >= 1e21 {
        return Ok(JsValue::String(format_number(n)));
    }
    Ok(JsValue::String(format!("{:.1$}", n, digits as usize)))
}

/// Number.prototype.toPrecision
fn number_to_precision(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let n = this_number(&this)?;
    let precision = match arg(&args, 0) {
        JsValue::Undefined => return Ok(JsValue::String(format_number(n))),
        other => to_number(&other, ctx)?.trunc(),
    };
    if !(1.0..=100.0).contains(&precision) {
        return Err(JErrorType::RangeError(
            "toPrecision() argument must be between 1 and 100".to_string(),
        ));
    }
    if !n.is_finite() {
        return Ok(JsValue::String(format_number(n)));
    }
    let precision = precision as i32;
    let exponent = if n == 0.0 { 0 } else { n.abs().log10().floor() as i32 };
    if exponent < -6 || exponent >= precision {
        let formatted = format!("{:.1$e}", n, (precision - 1) as usize);
        // Rust prints `1.2e3`; JavaScript prints `1.2e+3`.
        return Ok(JsValue::String(match formatted.split_once('e') {
            Some((m, e)) if !e.starts_with('-') => format!("{}e+{}", m, e),
            _ => formatted,
        }));
    }
    let decimals = (precision - 1 - exponent).max(0) as usize;
    Ok(JsValue::String(format!("{:.1$}", n, decimals)))
}

/// Format a number in a given radix.
fn format_radix(mut n: i128, radix: u32) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if n == 0 {
        return "0".to_string();
    }

    let negative = n < 0;
    if negative {
        n = -n;
    }

    let mut result = Vec::new();
    while n > 0 {
        result.push(DIGITS[(n % radix as i128) as usize] as char);
        n /= radix as i128;
    }

    if negative {
        result.push('-');
    }

    result.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(
        f: fn(&mut EvalContext, JsValue, Vec<JsValue>) -> Result<JsValue, JErrorType>,
        this: JsValue,
        args: Vec<JsValue>,
    ) -> JsValue {
        let mut ctx = EvalContext::new();
        f(&mut ctx, this, args).unwrap()
    }

    #[test]
    fn test_parse_int() {
        let parse = |s: &str| call(parse_int, JsValue::Undefined, vec![JsValue::string(s)]);
        assert_eq!(parse("42px"), JsValue::number(42.0));
        assert_eq!(parse("  -17"), JsValue::number(-17.0));
        assert_eq!(parse("0x1F"), JsValue::number(31.0));
        assert!(matches!(parse("px"), JsValue::Number(JsNumberType::NaN)));
        assert_eq!(
            call(parse_int, JsValue::Undefined, vec![JsValue::string("101"), JsValue::number(2.0)]),
            JsValue::number(5.0)
        );
    }

    #[test]
    fn test_parse_float() {
        let parse = |s: &str| call(parse_float, JsValue::Undefined, vec![JsValue::string(s)]);
        assert_eq!(parse("3.14abc"), JsValue::number(3.14));
        assert_eq!(parse("1e3"), JsValue::number(1000.0));
        assert_eq!(parse("2e"), JsValue::number(2.0));
        assert!(matches!(parse("abc"), JsValue::Number(JsNumberType::NaN)));
    }

    #[test]
    fn test_formatting() {
        assert_eq!(
            call(number_to_fixed, JsValue::number(3.14159), vec![JsValue::number(2.0)]),
            JsValue::string("3.14")
        );
        assert_eq!(
            call(number_to_string, JsValue::number(255.0), vec![JsValue::number(16.0)]),
            JsValue::string("ff")
        );
        assert_eq!(
            call(number_to_precision, JsValue::number(123.456), vec![JsValue::number(4.0)]),
            JsValue::string("123.5")
        );
    }
}
