//! Error built-in objects.
//!
//! Provides Error, TypeError, ReferenceError, SyntaxError, RangeError constructors.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{JsObject, ObjectClass, PropertyDescriptor};
use crate::runner::ds::operations::type_conversion::to_string;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::expression::get_property;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext, NativeFn};

use super::arg;

/// Register all error types with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    // Base Error
    let error = BuiltInObject::new("Error")
        .with_constructor(error_constructor)
        .add_prototype_property("name", JsValue::string("Error"))
        .add_prototype_property("message", JsValue::string(""))
        .add_prototype_method("toString", error_to_string);
    registry.register_object(error);

    let subtypes: [(&str, NativeFn); 4] = [
        ("TypeError", type_error_constructor),
        ("ReferenceError", reference_error_constructor),
        ("SyntaxError", syntax_error_constructor),
        ("RangeError", range_error_constructor),
    ];
    for (name, constructor) in subtypes {
        let subtype = BuiltInObject::new(name)
            .with_prototype("Error")
            .with_constructor(constructor)
            .add_prototype_property("name", JsValue::string(name))
            .add_prototype_property("message", JsValue::string(""));
        registry.register_object(subtype);
    }
}

/// Shared constructor body. Under `new` the prototype comes from the
/// allocated receiver, so subclasses keep theirs.
fn construct_error(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
    name: &str,
) -> Result<JsValue, JErrorType> {
    let proto = match &this {
        JsValue::Object(o) => o.borrow().prototype.clone(),
        _ => None,
    }
    .unwrap_or_else(|| ctx.prototype_for(name));
    let error = JsObject::new(ObjectClass::Error, Some(proto)).into_ref();
    let message = match arg(&args, 0) {
        JsValue::Undefined => None,
        other => Some(to_string(&other, ctx)?),
    };
    if let Some(message) = &message {
        error
            .borrow_mut()
            .define("message", PropertyDescriptor::hidden(JsValue::string(message)));
    }
    let options = arg(&args, 1);
    if let JsValue::Object(o) = &options {
        if o.borrow().has_own_property("cause") {
            let cause = get_property(&options, "cause", ctx)?;
            error
                .borrow_mut()
                .define("cause", PropertyDescriptor::hidden(cause));
        }
    }
    let header = match message.as_deref() {
        None | Some("") => name.to_string(),
        Some(m) => format!("{}: {}", name, m),
    };
    error.borrow_mut().define(
        "stack",
        PropertyDescriptor::hidden(JsValue::String(format!("{}\n    at <repl>", header))),
    );
    Ok(JsValue::Object(error))
}

/// Error constructor.
fn error_constructor(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    construct_error(ctx, this, args, "Error")
}

fn type_error_constructor(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    construct_error(ctx, this, args, "TypeError")
}

fn reference_error_constructor(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    construct_error(ctx, this, args, "ReferenceError")
}

fn syntax_error_constructor(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    construct_error(ctx, this, args, "SyntaxError")
}

fn range_error_constructor(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    construct_error(ctx, this, args, "RangeError")
}

/// Error.prototype.toString
fn error_to_string(
    ctx: &mut EvalContext,
    this: JsValue,
    _args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    if !matches!(this, JsValue::Object(_)) {
        return Err(JErrorType::type_error(
            "Error.prototype.toString requires that 'this' be an Object",
        ));
    }
    let name = match get_property(&this, "name", ctx)? {
        JsValue::Undefined => "Error".to_string(),
        other => to_string(&other, ctx)?,
    };
    let message = match get_property(&this, "message", ctx)? {
        JsValue::Undefined => String::new(),
        other => to_string(&other, ctx)?,
    };
    Ok(JsValue::String(match (name.is_empty(), message.is_empty()) {
        (_, true) => name,
        (true, false) => message,
        (false, false) => format!("{}: {}", name, message),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> EvalContext {
        let mut ctx = EvalContext::new();
        ctx.install_core_builtins(BuiltInRegistry::with_core());
        ctx
    }

    #[test]
    fn test_plain_call_uses_own_prototype() {
        let mut ctx = context();
        let e = type_error_constructor(&mut ctx, JsValue::Undefined, vec![JsValue::string("bad")]).unwrap();
        let text = error_to_string(&mut ctx, e, vec![]).unwrap();
        assert_eq!(text, JsValue::string("TypeError: bad"));
    }

    #[test]
    fn test_message_defaults_to_empty() {
        let mut ctx = context();
        let e = error_constructor(&mut ctx, JsValue::Undefined, vec![]).unwrap();
        assert_eq!(get_property(&e, "message", &mut ctx).unwrap(), JsValue::string(""));
        assert_eq!(
            error_to_string(&mut ctx, e, vec![]).unwrap(),
            JsValue::string("Error")
        );
    }
}
