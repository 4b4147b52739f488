//! Boolean built-in.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::operations::type_conversion::to_boolean;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};

use super::arg;

pub fn register(registry: &mut BuiltInRegistry) {
    let boolean = BuiltInObject::new("Boolean")
        .with_constructor(boolean_constructor)
        .add_prototype_method("toString", boolean_to_string)
        .add_prototype_method("valueOf", boolean_value_of);

    registry.register_object(boolean);
}

fn boolean_constructor(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::Boolean(to_boolean(&arg(&args, 0))))
}

fn this_boolean(this: &JsValue) -> Result<bool, JErrorType> {
    match this {
        JsValue::Boolean(b) => Ok(*b),
        _ => Err(JErrorType::type_error(
            "Boolean.prototype method requires that 'this' be a Boolean",
        )),
    }
}

fn boolean_to_string(_ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::String(this_boolean(&this)?.to_string()))
}

fn boolean_value_of(_ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::Boolean(this_boolean(&this)?))
}
