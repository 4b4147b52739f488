//! Function built-in: `Function.prototype.call`, `apply`, `bind`, `toString`.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::function_object::FunctionKind;
use crate::runner::ds::object::ObjectClass;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::expression::iterate_to_vec;
use crate::runner::eval::function::{call_function, is_callable};
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInFn, BuiltInObject, EvalContext};

use super::arg;

pub fn register(registry: &mut BuiltInRegistry) {
    let function = BuiltInObject::new("Function")
        .with_constructor(function_constructor)
        .add_prototype_method("call", function_call)
        .add_prototype_method("apply", function_apply)
        .add_prototype_method("bind", function_bind)
        .add_prototype_method("toString", function_to_string);

    registry.register_object(function);
}

fn function_constructor(
    _ctx: &mut EvalContext,
    _this: JsValue,
    _args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    Err(JErrorType::type_error(
        "Code generation from strings is disallowed in this shell",
    ))
}

fn require_callable(this: &JsValue, method: &str) -> Result<(), JErrorType> {
    if is_callable(this) {
        Ok(())
    } else {
        Err(JErrorType::type_error(format!(
            "Function.prototype.{} called on a value that is not a function",
            method
        )))
    }
}

/// Function.prototype.call
fn function_call(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    require_callable(&this, "call")?;
    let mut args = args.into_iter();
    let this_arg = args.next().unwrap_or(JsValue::Undefined);
    call_function(&this, this_arg, args.collect(), ctx)
}

/// Function.prototype.apply
fn function_apply(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    require_callable(&this, "apply")?;
    let arguments = match arg(&args, 1) {
        JsValue::Undefined | JsValue::Null => vec![],
        list @ JsValue::Object(_) => iterate_to_vec(&list, ctx)?,
        _ => {
            return Err(JErrorType::type_error(
                "CreateListFromArrayLike called on non-object",
            ))
        }
    };
    call_function(&this, arg(&args, 0), arguments, ctx)
}

/// Function.prototype.bind
fn function_bind(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    require_callable(&this, "bind")?;
    let name = match &this {
        JsValue::Object(o) => o
            .borrow()
            .as_function()
            .map(|f| f.name.to_string())
            .unwrap_or_default(),
        _ => String::new(),
    };
    let mut args = args.into_iter();
    let bound_this = args.next().unwrap_or(JsValue::Undefined);
    let bound_args: Vec<JsValue> = args.collect();
    let target = this.clone();
    let bound = BuiltInFn::closure(move |ctx, _this, call_args| {
        let mut all = bound_args.clone();
        all.extend(call_args);
        call_function(&target, bound_this.clone(), all, ctx)
    });
    Ok(ctx.new_native_function(&format!("bound {}", name), bound, 0))
}

/// Function.prototype.toString
fn function_to_string(
    _ctx: &mut EvalContext,
    this: JsValue,
    _args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let obj = match &this {
        JsValue::Object(o) => o.clone(),
        _ => {
            return Err(JErrorType::type_error(
                "Function.prototype.toString requires that 'this' be a Function",
            ))
        }
    };
    let o = obj.borrow();
    let text = match &o.class {
        ObjectClass::Function(f) => match &f.kind {
            FunctionKind::BuiltIn(_) => format!("function {}() {{ [native code] }}", f.name),
            FunctionKind::Class(_) => format!("class {} {{ }}", f.name),
            FunctionKind::Script(s) if s.data.is_arrow => "() => { }".to_string(),
            FunctionKind::Script(_) => format!("function {}() {{ }}", f.name),
        },
        _ => {
            return Err(JErrorType::type_error(
                "Function.prototype.toString requires that 'this' be a Function",
            ))
        }
    };
    Ok(JsValue::String(text))
}
