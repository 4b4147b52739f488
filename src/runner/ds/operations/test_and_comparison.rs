use std::rc::Rc;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::operations::type_conversion::{
    get_type, to_number, to_primitive, PreferredType, TYPE_STR_BOOLEAN, TYPE_STR_NULL,
    TYPE_STR_NUMBER, TYPE_STR_STRING, TYPE_STR_UNDEFINED,
};
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::types::EvalContext;

fn is_same_value(a: &JsValue, b: &JsValue, nan_equal: bool, zero_sign_matters: bool) -> bool {
    match (a, b) {
        (JsValue::Number(na), JsValue::Number(nb)) => {
            let (x, y) = (na.as_f64(), nb.as_f64());
            if x.is_nan() || y.is_nan() {
                return nan_equal && x.is_nan() && y.is_nan();
            }
            if zero_sign_matters && x == 0.0 && y == 0.0 {
                return x.is_sign_negative() == y.is_sign_negative();
            }
            x == y
        }
        (JsValue::Object(x), JsValue::Object(y)) => Rc::ptr_eq(x, y),
        _ => a == b,
    }
}

/// `Object.is`.
pub fn same_value(a: &JsValue, b: &JsValue) -> bool {
    is_same_value(a, b, true, true)
}

/// Key equality of `Map`: NaN equals NaN, `+0` equals `-0`.
pub fn same_value_zero(a: &JsValue, b: &JsValue) -> bool {
    is_same_value(a, b, true, false)
}

/// `===`.
pub fn strict_equality_comparison(a: &JsValue, b: &JsValue) -> bool {
    is_same_value(a, b, false, false)
}

/// `==`.
pub fn abstract_equality_comparison(
    a: &JsValue,
    b: &JsValue,
    ctx: &mut EvalContext,
) -> Result<bool, JErrorType> {
    let (ta, tb) = (get_type(a), get_type(b));
    if ta == tb || (matches!(a, JsValue::Object(_)) && matches!(b, JsValue::Object(_))) {
        return Ok(strict_equality_comparison(a, b));
    }
    let nullish = |t: &str| t == TYPE_STR_NULL || t == TYPE_STR_UNDEFINED;
    if nullish(ta) || nullish(tb) {
        return Ok(nullish(ta) && nullish(tb));
    }
    if (ta == TYPE_STR_NUMBER && tb == TYPE_STR_STRING)
        || (ta == TYPE_STR_STRING && tb == TYPE_STR_NUMBER)
        || ta == TYPE_STR_BOOLEAN
        || tb == TYPE_STR_BOOLEAN
    {
        let x = to_number(a, ctx)?;
        let y = to_number(b, ctx)?;
        return Ok(x == y);
    }
    if let JsValue::Object(_) = a {
        let pa = to_primitive(a, PreferredType::Default, ctx)?;
        return abstract_equality_comparison(&pa, b, ctx);
    }
    if let JsValue::Object(_) = b {
        let pb = to_primitive(b, PreferredType::Default, ctx)?;
        return abstract_equality_comparison(a, &pb, ctx);
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_flavours() {
        let nan = JsValue::number(f64::NAN);
        let zero = JsValue::number(0.0);
        let neg_zero = JsValue::number(-0.0);
        assert!(!strict_equality_comparison(&nan, &nan));
        assert!(same_value(&nan, &nan));
        assert!(same_value_zero(&zero, &neg_zero));
        assert!(!same_value(&zero, &neg_zero));
        assert!(strict_equality_comparison(&zero, &neg_zero));
    }

    #[test]
    fn test_loose_equality_coerces() {
        let mut ctx = EvalContext::new();
        assert!(abstract_equality_comparison(&JsValue::number(1.0), &JsValue::string("1"), &mut ctx).unwrap());
        assert!(abstract_equality_comparison(&JsValue::Null, &JsValue::Undefined, &mut ctx).unwrap());
        assert!(!abstract_equality_comparison(&JsValue::Null, &JsValue::number(0.0), &mut ctx).unwrap());
        assert!(abstract_equality_comparison(&JsValue::Boolean(true), &JsValue::number(1.0), &mut ctx).unwrap());
    }
}
