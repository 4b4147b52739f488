//! Math built-in object.
//!
//! Provides mathematical constants and functions.

use uuid::Uuid;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::operations::type_conversion::{to_number, to_uint32};
use crate::runner::ds::value::{JsNumberType, JsValue};
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};

use super::arg;

/// Defines `Math.<name>` for a unary `f64 -> f64` function.
macro_rules! unary_math_fn {
    ($($fn_name:ident => $op:expr;)*) => {
        $(
            fn $fn_name(
                ctx: &mut EvalContext,
                _this: JsValue,
                args: Vec<JsValue>,
            ) -> Result<JsValue, JErrorType> {
                let x = to_number(&arg(&args, 0), ctx)?;
                let op: fn(f64) -> f64 = $op;
                Ok(JsValue::number(op(x)))
            }
        )*
    };
}

/// Register the Math object with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let math = BuiltInObject::new("Math")
        .with_no_prototype()
        // Constants
        .add_property("E", JsValue::Number(JsNumberType::Float(std::f64::consts::E)))
        .add_property("LN10", JsValue::Number(JsNumberType::Float(std::f64::consts::LN_10)))
        .add_property("LN2", JsValue::Number(JsNumberType::Float(std::f64::consts::LN_2)))
        .add_property("LOG10E", JsValue::Number(JsNumberType::Float(std::f64::consts::LOG10_E)))
        .add_property("LOG2E", JsValue::Number(JsNumberType::Float(std::f64::consts::LOG2_E)))
        .add_property("PI", JsValue::Number(JsNumberType::Float(std::f64::consts::PI)))
        .add_property("SQRT1_2", JsValue::Number(JsNumberType::Float(std::f64::consts::FRAC_1_SQRT_2)))
        .add_property("SQRT2", JsValue::Number(JsNumberType::Float(std::f64::consts::SQRT_2)))
        // Methods
        .add_method("abs", math_abs)
        .add_method("floor", math_floor)
        .add_method("ceil", math_ceil)
        .add_method("round", math_round)
        .add_method("trunc", math_trunc)
        .add_method("sign", math_sign)
        .add_method("min", math_min)
        .add_method("max", math_max)
        .add_method("sqrt", math_sqrt)
        .add_method("cbrt", math_cbrt)
        .add_method("pow", math_pow)
        .add_method("exp", math_exp)
        .add_method("log", math_log)
        .add_method("log10", math_log10)
        .add_method("log2", math_log2)
        .add_method("sin", math_sin)
        .add_method("cos", math_cos)
        .add_method("tan", math_tan)
        .add_method("atan", math_atan)
        .add_method("atan2", math_atan2)
        .add_method("hypot", math_hypot)
        .add_method("random", math_random)
        .add_method("clz32", math_clz32);

    registry.register_object(math);
}

unary_math_fn! {
    math_abs => f64::abs;
    math_floor => f64::floor;
    math_ceil => f64::ceil;
    math_trunc => f64::trunc;
    math_sqrt => f64::sqrt;
    math_cbrt => f64::cbrt;
    math_exp => f64::exp;
    math_log => f64::ln;
    math_log10 => f64::log10;
    math_log2 => f64::log2;
    math_sin => f64::sin;
    math_cos => f64::cos;
    math_tan => f64::tan;
    math_atan => f64::atan;
    // Halves round towards +Infinity: Math.round(-2.5) is -2.
    math_round => |x| if x.is_finite() { (x + 0.5).floor() } else { x };
    math_sign => |x| if x.is_nan() || x == 0.0 { x } else { x.signum() };
}

fn numbers(args: &[JsValue], ctx: &mut EvalContext) -> Result<Vec<f64>, JErrorType> {
    args.iter().map(|a| to_number(a, ctx)).collect()
}

/// Math.min
fn math_min(
    ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let values = numbers(&args, ctx)?;
    if values.iter().any(|v| v.is_nan()) {
        return Ok(JsValue::Number(JsNumberType::NaN));
    }
    Ok(JsValue::number(values.into_iter().fold(f64::INFINITY, f64::min)))
}

/// Math.max
fn math_max(
    ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let values = numbers(&args, ctx)?;
    if values.iter().any(|v| v.is_nan()) {
        return Ok(JsValue::Number(JsNumberType::NaN));
    }
    Ok(JsValue::number(values.into_iter().fold(f64::NEG_INFINITY, f64::max)))
}

/// Math.pow
fn math_pow(
    ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let base = to_number(&arg(&args, 0), ctx)?;
    let exponent = to_number(&arg(&args, 1), ctx)?;
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        return Ok(JsValue::Number(JsNumberType::NaN));
    }
    Ok(JsValue::number(base.powf(exponent)))
}

/// Math.atan2
fn math_atan2(
    ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let y = to_number(&arg(&args, 0), ctx)?;
    let x = to_number(&arg(&args, 1), ctx)?;
    Ok(JsValue::number(y.atan2(x)))
}

/// Math.hypot
fn math_hypot(
    ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let values = numbers(&args, ctx)?;
    if values.iter().any(|v| v.is_infinite()) {
        return Ok(JsValue::Number(JsNumberType::PositiveInfinity));
    }
    Ok(JsValue::number(values.iter().map(|x| x * x).sum::<f64>().sqrt()))
}

/// Math.random - 53 random bits from a v4 UUID, scaled into `[0, 1)`.
fn math_random(
    _ctx: &mut EvalContext,
    _this: JsValue,
    _args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    const MANTISSA_BITS: u32 = 53;
    let bits = (Uuid::new_v4().as_u128() as u64) & ((1u64 << MANTISSA_BITS) - 1);
    Ok(JsValue::number(bits as f64 / (1u64 << MANTISSA_BITS) as f64))
}

/// Math.clz32 - Count leading zeros in 32-bit integer.
fn math_clz32(
    ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let x = to_uint32(to_number(&arg(&args, 0), ctx)?);
    Ok(JsValue::Number(JsNumberType::Integer(x.leading_zeros() as i64)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(
        f: fn(&mut EvalContext, JsValue, Vec<JsValue>) -> Result<JsValue, JErrorType>,
        args: &[f64],
    ) -> JsValue {
        let mut ctx = EvalContext::new();
        let args = args.iter().map(|n| JsValue::number(*n)).collect();
        f(&mut ctx, JsValue::Undefined, args).unwrap()
    }

    #[test]
    fn test_round_halves_towards_positive_infinity() {
        assert_eq!(call(math_round, &[2.5]), JsValue::number(3.0));
        assert_eq!(call(math_round, &[-2.5]), JsValue::number(-2.0));
    }

    #[test]
    fn test_min_max() {
        assert_eq!(call(math_max, &[1.0, 7.0, 3.0]), JsValue::number(7.0));
        assert_eq!(call(math_min, &[]), JsValue::number(f64::INFINITY));
        assert!(matches!(
            call(math_max, &[1.0, f64::NAN]),
            JsValue::Number(JsNumberType::NaN)
        ));
    }

    #[test]
    fn test_random_is_in_unit_interval() {
        for _ in 0..100 {
            match call(math_random, &[]) {
                JsValue::Number(n) => assert!((0.0..1.0).contains(&n.as_f64())),
                other => panic!("unexpected {:?}", other),
            }
        }
    }
}
