//! Function calls, construction and class definitions.

use std::rc::Rc;

use crate::parser::ast::{
    ClassData, ClassMember, FunctionBodyOrExpression, FunctionData, MethodDefinitionKind,
    PatternType,
};
use crate::runner::ds::env_record::{EnvironmentKind, EnvironmentRecord};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::function_object::{
    ClassConstructor, FunctionKind, FunctionObject, ScriptFunction,
};
use crate::runner::ds::object::{
    get_data_in_chain, JsObject, ObjectClass, PropertyDescriptor, PropertyValue,
};
use crate::runner::ds::value::{JsObjectType, JsValue};
use crate::runner::eval::jobs::{new_promise, reject_promise, resolve_promise};
use crate::runner::plugin::types::{BuiltInFn, EvalContext, Frame, MAX_CALL_DEPTH};

use super::expression::{
    bind_pattern, evaluate_expression, evaluate_property_key, BindingMode,
};
use super::statement::{execute_function_body, hoist_lexical_declarations, hoist_var_declarations};
use super::types::ValueResult;

/// Check if a value is callable.
pub fn is_callable(value: &JsValue) -> bool {
    match value {
        JsValue::Object(o) => o.borrow().is_callable(),
        _ => false,
    }
}

/// Check if a value is a constructor.
pub fn is_constructor(value: &JsValue) -> bool {
    match value {
        JsValue::Object(o) => o
            .borrow()
            .as_function()
            .map(|f| f.constructable)
            .unwrap_or(false),
        _ => false,
    }
}

/// Number of parameters before the first default or rest parameter.
fn expected_argument_count(params: &[PatternType]) -> usize {
    params
        .iter()
        .take_while(|p| {
            !matches!(
                p,
                PatternType::RestElement { .. } | PatternType::AssignmentPattern { .. }
            )
        })
        .count()
}

/// Creates a closure over the current scope.
pub fn create_function_object(data: &Rc<FunctionData>, ctx: &mut EvalContext) -> JsValue {
    let frame = ctx.current_frame();
    let (this_value, home_object) = if data.is_arrow {
        (
            Some(frame.this_value.clone().unwrap_or(JsValue::Undefined)),
            frame.home_object.clone(),
        )
    } else {
        (None, None)
    };
    let constructable = !data.is_arrow && !data.is_async;
    let name = data
        .id
        .as_ref()
        .map(|id| id.name.to_string())
        .unwrap_or_default();
    let f = FunctionObject {
        name,
        kind: FunctionKind::Script(ScriptFunction {
            data: data.clone(),
            scope: ctx.scope.clone(),
            this_value,
            home_object,
        }),
        constructable,
    };
    let obj = ctx.new_function_object(f, expected_argument_count(&data.params));
    if constructable {
        let proto = ctx.new_object();
        proto.borrow_mut().define(
            "constructor",
            PropertyDescriptor::hidden(JsValue::Object(obj.clone())),
        );
        obj.borrow_mut()
            .define("prototype", PropertyDescriptor::hidden(JsValue::Object(proto)));
    }
    JsValue::Object(obj)
}

/// Object literal and class methods: not constructable, `super` bound to
/// `home_object`.
pub fn create_method(
    data: &Rc<FunctionData>,
    name: &str,
    home_object: &JsObjectType,
    ctx: &mut EvalContext,
) -> JsValue {
    let f = FunctionObject {
        name: name.to_string(),
        kind: FunctionKind::Script(ScriptFunction {
            data: data.clone(),
            scope: ctx.scope.clone(),
            this_value: None,
            home_object: Some(home_object.clone()),
        }),
        constructable: false,
    };
    JsValue::Object(ctx.new_function_object(f, expected_argument_count(&data.params)))
}

/// Gives an anonymous function the name of the binding it is assigned to.
pub fn name_anonymous_function(value: &JsValue, name: &str) {
    if let JsValue::Object(o) = value {
        let mut o = o.borrow_mut();
        let unnamed = match &mut o.class {
            ObjectClass::Function(f) if f.name.is_empty() => {
                f.name = name.to_string();
                true
            }
            _ => false,
        };
        if unnamed {
            o.define("name", PropertyDescriptor::read_only(JsValue::string(name)));
        }
    }
}

fn describe_callee(value: &JsValue) -> String {
    match value {
        JsValue::Object(o) => match o.borrow().as_function() {
            Some(f) if !f.name.is_empty() => f.name.to_string(),
            _ => "object".to_string(),
        },
        JsValue::String(s) => format!("\"{}\"", s),
        other => other.to_string(),
    }
}

fn enter_call(ctx: &mut EvalContext) -> Result<(), JErrorType> {
    if ctx.read_only {
        return Err(JErrorType::type_error(
            "Function calls are not allowed in side-effect-free evaluation",
        ));
    }
    ctx.check_deadline()?;
    if ctx.call_depth >= MAX_CALL_DEPTH {
        return Err(JErrorType::RangeError(
            "Maximum call stack size exceeded".to_string(),
        ));
    }
    ctx.call_depth += 1;
    Ok(())
}

enum CallTarget {
    BuiltIn(BuiltInFn),
    Script(ScriptFunction),
}

/// Call a function with the given arguments.
pub fn call_function(
    callee: &JsValue,
    this_value: JsValue,
    args: Vec<JsValue>,
    ctx: &mut EvalContext,
) -> ValueResult {
    let obj = match callee {
        JsValue::Object(o) if o.borrow().is_callable() => o.clone(),
        other => {
            return Err(JErrorType::type_error(format!(
                "{} is not a function",
                describe_callee(other)
            )))
        }
    };
    let target = {
        let o = obj.borrow();
        match o.as_function().map(|f| (&f.kind, &f.name)) {
            Some((FunctionKind::BuiltIn(f), _)) => CallTarget::BuiltIn(f.clone()),
            Some((FunctionKind::Script(s), _)) => CallTarget::Script(s.clone()),
            Some((FunctionKind::Class(_), name)) => {
                return Err(JErrorType::type_error(format!(
                    "Class constructor {} cannot be invoked without 'new'",
                    name
                )))
            }
            None => return Err(JErrorType::type_error("object is not a function")),
        }
    };
    enter_call(ctx)?;
    let result = match target {
        CallTarget::BuiltIn(f) => f.call(ctx, this_value, args),
        CallTarget::Script(s) => call_script_function(&s, this_value, args, None, ctx),
    };
    ctx.call_depth -= 1;
    result
}

fn call_script_function(
    f: &ScriptFunction,
    this_value: JsValue,
    args: Vec<JsValue>,
    new_target: Option<JsObjectType>,
    ctx: &mut EvalContext,
) -> ValueResult {
    let frame = Frame {
        this_value: Some(f.this_value.clone().unwrap_or(this_value)),
        function: None,
        home_object: f.home_object.clone(),
        new_target,
    };
    let scope = EnvironmentRecord::new_child(&f.scope, EnvironmentKind::Function);
    ctx.frames.push(frame);
    let saved = std::mem::replace(&mut ctx.scope, scope);
    let result = run_function_body(&f.data, args, ctx);
    ctx.scope = saved;
    ctx.frames.pop();
    if f.data.is_async {
        settle_async_result(result, ctx)
    } else {
        result
    }
}

/// Async functions run to completion and hand back a settled promise.
/// Timeouts and cancellation still unwind.
fn settle_async_result(result: ValueResult, ctx: &mut EvalContext) -> ValueResult {
    let promise = new_promise(ctx);
    match result {
        Ok(v) => resolve_promise(&promise, v, ctx),
        Err(e) if e.is_catchable() => {
            let reason = ctx.error_to_value(e);
            reject_promise(&promise, reason, ctx);
        }
        Err(e) => return Err(e),
    }
    Ok(JsValue::Object(promise))
}

/// Binds parameters in the current (fresh) scope and runs the body.
fn run_function_body(data: &FunctionData, args: Vec<JsValue>, ctx: &mut EvalContext) -> ValueResult {
    if !data.is_arrow {
        let arguments = ctx.new_array(args.clone());
        ctx.scope
            .borrow_mut()
            .create_binding("arguments", true, Some(arguments));
    }
    let mut args = args.into_iter();
    for param in &data.params {
        match param {
            PatternType::RestElement { argument, .. } => {
                let rest = ctx.new_array(args.by_ref().collect());
                bind_pattern(argument, rest, BindingMode::Let, ctx)?;
            }
            p => {
                let v = args.next().unwrap_or(JsValue::Undefined);
                bind_pattern(p, v, BindingMode::Let, ctx)?;
            }
        }
    }
    match &data.body {
        FunctionBodyOrExpression::FunctionBody(b) => {
            hoist_var_declarations(&b.body, ctx)?;
            hoist_lexical_declarations(&b.body, ctx)?;
            execute_function_body(&b.body, ctx)
        }
        FunctionBodyOrExpression::Expression(e) => evaluate_expression(e, ctx),
    }
}

/// Object a constructor allocates: an ordinary object whose prototype is
/// `new_target.prototype`.
fn allocate_this(new_target: &JsObjectType, ctx: &mut EvalContext) -> JsObjectType {
    let proto = match get_data_in_chain(new_target, "prototype") {
        Some(JsValue::Object(p)) => p,
        _ => ctx.prototype_for("Object"),
    };
    JsObject::new(ObjectClass::Ordinary, Some(proto)).into_ref()
}

enum ConstructTarget {
    BuiltIn(BuiltInFn),
    Script(ScriptFunction),
    Class(ClassConstructor),
}

/// `new callee(...args)`.
pub fn construct(
    callee: &JsValue,
    args: Vec<JsValue>,
    new_target: Option<JsObjectType>,
    ctx: &mut EvalContext,
) -> ValueResult {
    if !is_constructor(callee) {
        return Err(JErrorType::type_error(format!(
            "{} is not a constructor",
            describe_callee(callee)
        )));
    }
    let obj = match callee {
        JsValue::Object(o) => o.clone(),
        _ => return Err(JErrorType::type_error("not a constructor")),
    };
    let new_target = new_target.unwrap_or_else(|| obj.clone());
    let target = match obj.borrow().as_function().map(|f| &f.kind) {
        Some(FunctionKind::BuiltIn(f)) => ConstructTarget::BuiltIn(f.clone()),
        Some(FunctionKind::Script(s)) => ConstructTarget::Script(s.clone()),
        Some(FunctionKind::Class(c)) => ConstructTarget::Class(c.clone()),
        None => return Err(JErrorType::type_error("not a constructor")),
    };
    enter_call(ctx)?;
    let result = match target {
        ConstructTarget::BuiltIn(f) => {
            let this = allocate_this(&new_target, ctx);
            f.call(ctx, JsValue::Object(this.clone()), args)
                .map(|r| match r {
                    JsValue::Object(_) => r,
                    _ => JsValue::Object(this),
                })
        }
        ConstructTarget::Script(s) => {
            let this = allocate_this(&new_target, ctx);
            call_script_function(&s, JsValue::Object(this.clone()), args, Some(new_target), ctx)
                .map(|r| match r {
                    JsValue::Object(_) => r,
                    _ => JsValue::Object(this),
                })
        }
        ConstructTarget::Class(c) => construct_class(&obj, &c, args, new_target, ctx),
    };
    ctx.call_depth -= 1;
    result
}

fn construct_class(
    class_obj: &JsObjectType,
    c: &ClassConstructor,
    args: Vec<JsValue>,
    new_target: JsObjectType,
    ctx: &mut EvalContext,
) -> ValueResult {
    let this_value = if c.parent.is_none() {
        let this = allocate_this(&new_target, ctx);
        initialize_fields(c, &this, ctx)?;
        Some(JsValue::Object(this))
    } else {
        None
    };
    ctx.frames.push(Frame {
        this_value,
        function: Some(class_obj.clone()),
        home_object: Some(c.prototype.clone()),
        new_target: Some(new_target),
    });
    let scope = EnvironmentRecord::new_child(&c.scope, EnvironmentKind::Function);
    let saved = std::mem::replace(&mut ctx.scope, scope);
    let result = match (&c.constructor, &c.parent) {
        (Some(data), _) => run_function_body(data, args, ctx),
        (None, Some(_)) => super_call(args, ctx),
        (None, None) => Ok(JsValue::Undefined),
    };
    ctx.scope = saved;
    let frame = ctx.frames.pop().unwrap_or_default();
    let returned = result?;
    if let JsValue::Object(_) = returned {
        return Ok(returned);
    }
    frame.this_value.ok_or_else(|| {
        JErrorType::reference_error(
            "Must call super constructor in derived class before accessing 'this' or returning from derived constructor",
        )
    })
}

/// `super(...args)` inside a derived constructor.
pub fn super_call(args: Vec<JsValue>, ctx: &mut EvalContext) -> ValueResult {
    let frame = ctx.current_frame().clone();
    let (class_obj, new_target) = match (frame.function, frame.new_target) {
        (Some(f), Some(t)) => (f, t),
        _ => {
            return Err(JErrorType::SyntaxError(
                "'super' keyword unexpected here".to_string(),
            ))
        }
    };
    if frame.this_value.is_some() {
        return Err(JErrorType::reference_error(
            "Super constructor may only be called once",
        ));
    }
    let class = match class_obj.borrow().as_function().map(|f| &f.kind) {
        Some(FunctionKind::Class(c)) => c.clone(),
        _ => {
            return Err(JErrorType::SyntaxError(
                "'super' keyword unexpected here".to_string(),
            ))
        }
    };
    let parent = class.parent.clone().ok_or_else(|| {
        JErrorType::SyntaxError("'super' keyword unexpected here".to_string())
    })?;
    let this = construct(&JsValue::Object(parent), args, Some(new_target), ctx)?;
    ctx.current_frame_mut().this_value = Some(this.clone());
    if let JsValue::Object(o) = &this {
        initialize_fields(&class, o, ctx)?;
    }
    Ok(this)
}

/// Evaluates instance field initialisers against a new instance.
fn initialize_fields(
    c: &ClassConstructor,
    this: &JsObjectType,
    ctx: &mut EvalContext,
) -> Result<(), JErrorType> {
    let has_fields = c
        .data
        .body
        .iter()
        .any(|m| matches!(m, ClassMember::Field(f) if !f.is_static));
    if !has_fields {
        return Ok(());
    }
    ctx.frames.push(Frame {
        this_value: Some(JsValue::Object(this.clone())),
        function: None,
        home_object: Some(c.prototype.clone()),
        new_target: None,
    });
    let scope = EnvironmentRecord::new_child(&c.scope, EnvironmentKind::Function);
    let saved = std::mem::replace(&mut ctx.scope, scope);
    let result = define_fields(&c.data, false, this, ctx);
    ctx.scope = saved;
    ctx.frames.pop();
    result
}

fn define_fields(
    data: &ClassData,
    is_static: bool,
    target: &JsObjectType,
    ctx: &mut EvalContext,
) -> Result<(), JErrorType> {
    for member in &data.body {
        if let ClassMember::Field(f) = member {
            if f.is_static != is_static {
                continue;
            }
            let key = evaluate_property_key(&f.key, ctx)?;
            let value = match &f.value {
                Some(e) => evaluate_expression(e, ctx)?,
                None => JsValue::Undefined,
            };
            name_anonymous_function(&value, &key);
            target
                .borrow_mut()
                .define(key, PropertyDescriptor::data(value));
        }
    }
    Ok(())
}

/// Evaluates a class declaration or expression into its constructor.
pub fn evaluate_class(data: &Rc<ClassData>, ctx: &mut EvalContext) -> ValueResult {
    let parent = match &data.super_class {
        Some(e) => {
            let v = evaluate_expression(e, ctx)?;
            if !is_constructor(&v) {
                return Err(JErrorType::type_error(format!(
                    "Class extends value {} is not a constructor or null",
                    describe_callee(&v)
                )));
            }
            v.as_object().cloned()
        }
        None => None,
    };
    let proto_parent = match &parent {
        Some(p) => match get_data_in_chain(p, "prototype") {
            Some(JsValue::Object(pp)) => pp,
            _ => ctx.prototype_for("Object"),
        },
        None => ctx.prototype_for("Object"),
    };
    let prototype = JsObject::new(ObjectClass::Ordinary, Some(proto_parent)).into_ref();
    let class_scope = EnvironmentRecord::new_child(&ctx.scope, EnvironmentKind::Block);
    let constructor = data.body.iter().find_map(|m| match m {
        ClassMember::Method(md) if md.kind == MethodDefinitionKind::Constructor => {
            Some(md.value.clone())
        }
        _ => None,
    });
    let name = data
        .id
        .as_ref()
        .map(|id| id.name.to_string())
        .unwrap_or_default();
    let length = constructor
        .as_ref()
        .map(|c| expected_argument_count(&c.params))
        .unwrap_or(0);
    let f = FunctionObject {
        name: name.clone(),
        kind: FunctionKind::Class(ClassConstructor {
            data: data.clone(),
            constructor,
            scope: class_scope.clone(),
            parent: parent.clone(),
            prototype: prototype.clone(),
        }),
        constructable: true,
    };
    let class_obj = ctx.new_function_object(f, length);
    if let Some(p) = &parent {
        class_obj.borrow_mut().prototype = Some(p.clone());
    }
    class_obj.borrow_mut().define(
        "prototype",
        PropertyDescriptor::read_only(JsValue::Object(prototype.clone())),
    );
    prototype.borrow_mut().define(
        "constructor",
        PropertyDescriptor::hidden(JsValue::Object(class_obj.clone())),
    );
    if !name.is_empty() {
        class_scope.borrow_mut().create_binding(
            name.as_str(),
            false,
            Some(JsValue::Object(class_obj.clone())),
        );
    }

    let saved = std::mem::replace(&mut ctx.scope, class_scope);
    let result = define_methods_and_statics(data, &class_obj, &prototype, ctx);
    ctx.scope = saved;
    result?;
    Ok(JsValue::Object(class_obj))
}

fn define_methods_and_statics(
    data: &ClassData,
    class_obj: &JsObjectType,
    prototype: &JsObjectType,
    ctx: &mut EvalContext,
) -> Result<(), JErrorType> {
    for member in &data.body {
        let m = match member {
            ClassMember::Method(m) if m.kind != MethodDefinitionKind::Constructor => m,
            _ => continue,
        };
        let key = evaluate_property_key(&m.key, ctx)?;
        let target = if m.is_static { class_obj } else { prototype };
        let func = create_method(&m.value, &key, target, ctx);
        let mut t = target.borrow_mut();
        match m.kind {
            MethodDefinitionKind::Get | MethodDefinitionKind::Set => {
                let is_get = m.kind == MethodDefinitionKind::Get;
                define_accessor_part(&mut t, key, func, is_get, false);
            }
            _ => t.define(key, PropertyDescriptor::hidden(func)),
        }
    }
    ctx.frames.push(Frame {
        this_value: Some(JsValue::Object(class_obj.clone())),
        function: None,
        home_object: Some(class_obj.clone()),
        new_target: None,
    });
    let result = define_fields(data, true, class_obj, ctx);
    ctx.frames.pop();
    result
}

/// Adds a getter or setter, keeping the other half of an existing accessor.
pub fn define_accessor_part(
    target: &mut JsObject,
    key: String,
    func: JsValue,
    is_get: bool,
    enumerable: bool,
) {
    let (mut get, mut set) = match target.properties.get(&key).map(|d| &d.value) {
        Some(PropertyValue::Accessor { get, set }) => (get.clone(), set.clone()),
        _ => (None, None),
    };
    if is_get {
        get = Some(func);
    } else {
        set = Some(func);
    }
    target.define(key, PropertyDescriptor::accessor(get, set, enumerable));
}
