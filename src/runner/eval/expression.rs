//! Expression evaluation.
//!
//! This module provides the core expression evaluation logic for the JavaScript interpreter.
//! It handles all expression types defined in the AST.

use crate::parser::ast::{
    AssignmentOperator, BinaryOperator, ExpressionOrSpreadElement, ExpressionOrSuper,
    ExpressionPatternType, ExpressionType, LiteralData, LiteralType, LogicalOperator,
    MemberExpressionType, NumberLiteralType, ObjectPatternProperty, ObjectProperty, PatternType,
    PropertyKey, PropertyKind, TemplateLiteralData, UnaryOperator, UpdateOperator,
};
use crate::runner::ds::env_record::{
    get_binding_value, resolve_binding, set_binding_value, EnvironmentKind, EnvironmentRecord,
};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{
    array_index, find_property, ObjectClass, PropertyDescriptor, PropertyValue,
};
use crate::runner::ds::operations::test_and_comparison::{
    abstract_equality_comparison, strict_equality_comparison,
};
use crate::runner::ds::operations::type_conversion::{
    to_boolean, to_int32, to_number, to_primitive, to_property_key, to_string, to_uint32,
    type_of, PreferredType,
};
use crate::runner::ds::value::{check_string_length, JsObjectType, JsValue};
use crate::runner::plugin::types::EvalContext;

use super::function::{
    call_function, construct, create_function_object, create_method, define_accessor_part,
    evaluate_class, is_callable, name_anonymous_function, super_call,
};
use super::jobs::await_value;
use super::types::{Reference, ReferenceBase, ReferenceResult, ValueResult};

/// Evaluate an expression and return its value.
pub fn evaluate_expression(expr: &ExpressionType, ctx: &mut EvalContext) -> ValueResult {
    match expr {
        ExpressionType::Literal(lit) => Ok(evaluate_literal(lit)),

        ExpressionType::Identifier(id) => evaluate_identifier(&id.name, ctx),

        ExpressionType::ThisExpression { .. } => resolve_this(ctx),

        ExpressionType::TemplateLiteral(t) => evaluate_template_literal(t, ctx),

        ExpressionType::ArrayExpression { elements, .. } => {
            let mut values = vec![];
            for element in elements {
                match element {
                    None => values.push(JsValue::Undefined),
                    Some(ExpressionOrSpreadElement::Expression(e)) => {
                        values.push(evaluate_expression(e, ctx)?)
                    }
                    Some(ExpressionOrSpreadElement::SpreadElement(e)) => {
                        let v = evaluate_expression(e, ctx)?;
                        values.extend(iterate_to_vec(&v, ctx)?);
                    }
                }
            }
            Ok(ctx.new_array(values))
        }

        ExpressionType::ObjectExpression { properties, .. } => {
            evaluate_object_expression(properties, ctx)
        }

        ExpressionType::FunctionExpression(f) => {
            let name = f.id.as_ref().map(|id| id.name.to_string());
            match name {
                Some(name) => {
                    let scope = EnvironmentRecord::new_child(&ctx.scope, EnvironmentKind::Block);
                    let saved = std::mem::replace(&mut ctx.scope, scope.clone());
                    let func = create_function_object(f, ctx);
                    ctx.scope = saved;
                    scope
                        .borrow_mut()
                        .create_binding(name, false, Some(func.clone()));
                    Ok(func)
                }
                None => Ok(create_function_object(f, ctx)),
            }
        }

        ExpressionType::ArrowFunctionExpression(f) => Ok(create_function_object(f, ctx)),

        ExpressionType::ClassExpression(c) => evaluate_class(c, ctx),

        ExpressionType::UnaryExpression {
            operator, argument, ..
        } => evaluate_unary_expression(*operator, argument, ctx),

        ExpressionType::UpdateExpression {
            operator,
            argument,
            prefix,
            ..
        } => evaluate_update_expression(*operator, argument, *prefix, ctx),

        ExpressionType::BinaryExpression {
            operator,
            left,
            right,
            ..
        } => {
            let l = evaluate_expression(left, ctx)?;
            let r = evaluate_expression(right, ctx)?;
            apply_binary_operator(*operator, &l, &r, ctx)
        }

        ExpressionType::LogicalExpression {
            operator,
            left,
            right,
            ..
        } => {
            let l = evaluate_expression(left, ctx)?;
            let short_circuit = match operator {
                LogicalOperator::And => !to_boolean(&l),
                LogicalOperator::Or => to_boolean(&l),
                LogicalOperator::NullishCoalescing => !l.is_nullish(),
            };
            if short_circuit {
                Ok(l)
            } else {
                evaluate_expression(right, ctx)
            }
        }

        ExpressionType::AssignmentExpression {
            operator,
            left,
            right,
            ..
        } => evaluate_assignment_expression(*operator, left, right, ctx),

        ExpressionType::ConditionalExpression {
            test,
            consequent,
            alternate,
            ..
        } => {
            let t = evaluate_expression(test, ctx)?;
            if to_boolean(&t) {
                evaluate_expression(consequent, ctx)
            } else {
                evaluate_expression(alternate, ctx)
            }
        }

        ExpressionType::SequenceExpression { expressions, .. } => {
            let mut value = JsValue::Undefined;
            for e in expressions {
                value = evaluate_expression(e, ctx)?;
            }
            Ok(value)
        }

        ExpressionType::CallExpression { .. } | ExpressionType::MemberExpression(_) => {
            Ok(evaluate_chain(expr, ctx)?
                .map(|(v, _)| v)
                .unwrap_or(JsValue::Undefined))
        }

        ExpressionType::NewExpression {
            callee, arguments, ..
        } => {
            let f = evaluate_expression(callee, ctx)?;
            let args = evaluate_arguments(arguments, ctx)?;
            if ctx.read_only {
                return Err(JErrorType::type_error(
                    "'new' is not allowed in side-effect-free evaluation",
                ));
            }
            construct(&f, args, None, ctx)
        }

        ExpressionType::AwaitExpression { argument, .. } => {
            let v = evaluate_expression(argument, ctx)?;
            await_value(v, ctx)
        }
    }
}

pub fn evaluate_literal(lit: &LiteralData) -> JsValue {
    match &lit.value {
        LiteralType::NullLiteral => JsValue::Null,
        LiteralType::BooleanLiteral(b) => JsValue::Boolean(*b),
        LiteralType::StringLiteral(s) => JsValue::String(s.to_string()),
        LiteralType::NumberLiteral(NumberLiteralType::IntegerLiteral(i)) => {
            JsValue::number(*i as f64)
        }
        LiteralType::NumberLiteral(NumberLiteralType::FloatLiteral(f)) => JsValue::number(*f),
    }
}

fn evaluate_identifier(name: &str, ctx: &mut EvalContext) -> ValueResult {
    match get_binding_value(&ctx.scope, name) {
        Ok(v) => Ok(v),
        Err(e) => match name {
            "undefined" => Ok(JsValue::Undefined),
            "NaN" => Ok(JsValue::number(f64::NAN)),
            "Infinity" => Ok(JsValue::number(f64::INFINITY)),
            _ => Err(e),
        },
    }
}

fn resolve_this(ctx: &EvalContext) -> ValueResult {
    ctx.current_frame().this_value.clone().ok_or_else(|| {
        JErrorType::reference_error(
            "Must call super constructor in derived class before accessing 'this' or returning from derived constructor",
        )
    })
}

fn evaluate_template_literal(t: &TemplateLiteralData, ctx: &mut EvalContext) -> ValueResult {
    let mut out = String::new();
    for (i, quasi) in t.quasis.iter().enumerate() {
        out.push_str(&quasi.cooked);
        if let Some(e) = t.expressions.get(i) {
            let v = evaluate_expression(e, ctx)?;
            out.push_str(&to_string(&v, ctx)?);
        }
    }
    Ok(JsValue::String(out))
}

pub fn evaluate_property_key(key: &PropertyKey, ctx: &mut EvalContext) -> Result<String, JErrorType> {
    match key {
        PropertyKey::Named { name, .. } => Ok(name.to_string()),
        PropertyKey::Computed(e) => {
            let v = evaluate_expression(e, ctx)?;
            to_property_key(&v, ctx)
        }
    }
}

fn evaluate_object_expression(properties: &[ObjectProperty], ctx: &mut EvalContext) -> ValueResult {
    let obj = ctx.new_object();
    for property in properties {
        match property {
            ObjectProperty::Property(p) => {
                let key = evaluate_property_key(&p.key, ctx)?;
                let method = match p.value.as_ref() {
                    ExpressionType::FunctionExpression(f) if p.method || p.kind != PropertyKind::Init => {
                        Some(create_method(f, &key, &obj, ctx))
                    }
                    _ => None,
                };
                match p.kind {
                    PropertyKind::Init => {
                        let value = match method {
                            Some(m) => m,
                            None => {
                                let v = evaluate_expression(&p.value, ctx)?;
                                if is_anonymous_function_definition(&p.value) {
                                    name_anonymous_function(&v, &key);
                                }
                                v
                            }
                        };
                        obj.borrow_mut().define(key, PropertyDescriptor::data(value));
                    }
                    PropertyKind::Get | PropertyKind::Set => {
                        let func = match method {
                            Some(m) => m,
                            None => evaluate_expression(&p.value, ctx)?,
                        };
                        let is_get = p.kind == PropertyKind::Get;
                        define_accessor_part(&mut obj.borrow_mut(), key, func, is_get, true);
                    }
                }
            }
            ObjectProperty::Spread(e) => {
                let source = evaluate_expression(e, ctx)?;
                copy_data_properties(&source, &obj, &[], ctx)?;
            }
        }
    }
    Ok(JsValue::Object(obj))
}

pub fn is_anonymous_function_definition(e: &ExpressionType) -> bool {
    match e {
        ExpressionType::FunctionExpression(f) => f.id.is_none(),
        ExpressionType::ArrowFunctionExpression(_) => true,
        ExpressionType::ClassExpression(c) => c.id.is_none(),
        _ => false,
    }
}

/// Copies own enumerable properties of `source` onto `target`, skipping
/// `excluded` keys. Strings and arrays contribute their indices.
fn copy_data_properties(
    source: &JsValue,
    target: &JsObjectType,
    excluded: &[String],
    ctx: &mut EvalContext,
) -> Result<(), JErrorType> {
    match source {
        JsValue::Object(o) => {
            let keys = o.borrow().own_keys(false);
            for key in keys.into_iter().filter(|k| !excluded.contains(k)) {
                let v = get_property(source, &key, ctx)?;
                target.borrow_mut().define(key, PropertyDescriptor::data(v));
            }
        }
        JsValue::String(s) => {
            for (i, c) in s.chars().enumerate() {
                let key = i.to_string();
                if !excluded.contains(&key) {
                    target
                        .borrow_mut()
                        .define(key, PropertyDescriptor::data(JsValue::String(c.to_string())));
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// Materialises an iterable for spread, `for-of` and array destructuring.
pub fn iterate_to_vec(value: &JsValue, ctx: &mut EvalContext) -> Result<Vec<JsValue>, JErrorType> {
    match value {
        JsValue::String(s) => Ok(s.chars().map(|c| JsValue::String(c.to_string())).collect()),
        JsValue::Object(o) => {
            let entries = match &o.borrow().class {
                ObjectClass::Array(elements) => return Ok(elements.clone()),
                ObjectClass::Map(entries) => entries.clone(),
                _ => {
                    return Err(JErrorType::type_error(format!(
                        "{} is not iterable",
                        describe_value(value)
                    )))
                }
            };
            Ok(entries
                .into_iter()
                .map(|(k, v)| ctx.new_array(vec![k, v]))
                .collect())
        }
        other => Err(JErrorType::type_error(format!(
            "{} is not iterable",
            describe_value(other)
        ))),
    }
}

fn describe_value(value: &JsValue) -> String {
    match value {
        JsValue::String(s) => format!("\"{}\"", s),
        JsValue::Object(o) => {
            if o.borrow().is_callable() {
                "function".to_string()
            } else {
                "object".to_string()
            }
        }
        other => other.to_string(),
    }
}

/// Source-like rendering of a callee for "is not a function" messages.
fn describe_callee_expression(e: &ExpressionType) -> String {
    match e {
        ExpressionType::Identifier(id) => id.name.to_string(),
        ExpressionType::ThisExpression { .. } => "this".to_string(),
        ExpressionType::MemberExpression(MemberExpressionType::SimpleMemberExpression {
            object,
            property,
            ..
        }) => {
            let base = match object {
                ExpressionOrSuper::Expression(o) => describe_callee_expression(o),
                ExpressionOrSuper::Super(_) => "super".to_string(),
            };
            format!("{}.{}", base, property.name)
        }
        ExpressionType::MemberExpression(MemberExpressionType::ComputedMemberExpression {
            object,
            ..
        }) => {
            let base = match object {
                ExpressionOrSuper::Expression(o) => describe_callee_expression(o),
                ExpressionOrSuper::Super(_) => "super".to_string(),
            };
            format!("{}[...]", base)
        }
        ExpressionType::CallExpression { .. } => "(intermediate value)".to_string(),
        _ => "expression".to_string(),
    }
}

pub fn evaluate_arguments(
    arguments: &[ExpressionOrSpreadElement],
    ctx: &mut EvalContext,
) -> Result<Vec<JsValue>, JErrorType> {
    let mut args = vec![];
    for a in arguments {
        match a {
            ExpressionOrSpreadElement::Expression(e) => args.push(evaluate_expression(e, ctx)?),
            ExpressionOrSpreadElement::SpreadElement(e) => {
                let v = evaluate_expression(e, ctx)?;
                args.extend(iterate_to_vec(&v, ctx)?);
            }
        }
    }
    Ok(args)
}

/// Object `super.x` reads from: the prototype of the home object.
fn super_base(ctx: &EvalContext) -> Result<(JsValue, JsValue), JErrorType> {
    let frame = ctx.current_frame();
    let home = frame.home_object.clone().ok_or_else(|| {
        JErrorType::SyntaxError("'super' keyword unexpected here".to_string())
    })?;
    let proto = home.borrow().prototype.clone();
    let this = resolve_this(ctx)?;
    Ok((proto.map(JsValue::Object).unwrap_or(JsValue::Null), this))
}

fn member_key(m: &MemberExpressionType, ctx: &mut EvalContext) -> Result<String, JErrorType> {
    match m {
        MemberExpressionType::SimpleMemberExpression { property, .. } => {
            Ok(property.name.to_string())
        }
        MemberExpressionType::ComputedMemberExpression { property, .. } => {
            let v = evaluate_expression(property, ctx)?;
            to_property_key(&v, ctx)
        }
    }
}

fn is_optional(m: &MemberExpressionType) -> bool {
    match m {
        MemberExpressionType::SimpleMemberExpression { optional, .. }
        | MemberExpressionType::ComputedMemberExpression { optional, .. } => *optional,
    }
}

/// Evaluates member and call chains. `None` means an optional link
/// short-circuited the whole chain. The second value is the receiver a call
/// of the result would use.
fn evaluate_chain(
    expr: &ExpressionType,
    ctx: &mut EvalContext,
) -> Result<Option<(JsValue, JsValue)>, JErrorType> {
    match expr {
        ExpressionType::MemberExpression(m) => {
            let (object, receiver) = match m.object() {
                ExpressionOrSuper::Super(_) => super_base(ctx)?,
                ExpressionOrSuper::Expression(o) => match evaluate_chain(o, ctx)? {
                    Some((v, _)) => (v.clone(), v),
                    None => return Ok(None),
                },
            };
            if is_optional(m) && object.is_nullish() {
                return Ok(None);
            }
            let key = member_key(m, ctx)?;
            let value = get_property_with_receiver(&object, &key, &receiver, ctx)?;
            Ok(Some((value, receiver)))
        }
        ExpressionType::CallExpression {
            callee,
            arguments,
            optional,
            ..
        } => {
            let callee = match callee {
                ExpressionOrSuper::Super(_) => {
                    let args = evaluate_arguments(arguments, ctx)?;
                    return Ok(Some((super_call(args, ctx)?, JsValue::Undefined)));
                }
                ExpressionOrSuper::Expression(c) => c,
            };
            let (f, this) = match evaluate_chain(callee, ctx)? {
                Some(pair) => pair,
                None => return Ok(None),
            };
            if *optional && f.is_nullish() {
                return Ok(None);
            }
            let args = evaluate_arguments(arguments, ctx)?;
            if !is_callable(&f) {
                return Err(JErrorType::type_error(format!(
                    "{} is not a function",
                    describe_callee_expression(callee)
                )));
            }
            Ok(Some((call_function(&f, this, args, ctx)?, JsValue::Undefined)))
        }
        other => Ok(Some((evaluate_expression(other, ctx)?, JsValue::Undefined))),
    }
}

/// `value[key]`, including primitives and accessors.
pub fn get_property(value: &JsValue, key: &str, ctx: &mut EvalContext) -> ValueResult {
    get_property_with_receiver(value, key, value, ctx)
}

fn get_property_with_receiver(
    value: &JsValue,
    key: &str,
    receiver: &JsValue,
    ctx: &mut EvalContext,
) -> ValueResult {
    let holder = match value {
        JsValue::Undefined | JsValue::Null => {
            return Err(JErrorType::type_error(format!(
                "Cannot read properties of {} (reading '{}')",
                value, key
            )))
        }
        JsValue::Object(o) => o.clone(),
        JsValue::String(s) => {
            if key == "length" {
                return Ok(JsValue::number(s.encode_utf16().count() as f64));
            }
            if let Some(i) = array_index(key) {
                return Ok(s
                    .chars()
                    .nth(i)
                    .map(|c| JsValue::String(c.to_string()))
                    .unwrap_or(JsValue::Undefined));
            }
            ctx.prototype_for("String")
        }
        JsValue::Number(_) => ctx.prototype_for("Number"),
        JsValue::Boolean(_) => ctx.prototype_for("Boolean"),
    };
    match find_property(&holder, key).map(|d| d.value) {
        None => Ok(JsValue::Undefined),
        Some(PropertyValue::Data(v)) => Ok(v),
        Some(PropertyValue::Accessor { get: Some(g), .. }) => {
            call_function(&g, receiver.clone(), vec![], ctx)
        }
        Some(PropertyValue::Accessor { get: None, .. }) => Ok(JsValue::Undefined),
    }
}

/// `target[key] = value`. Writes to read-only properties are ignored.
pub fn set_property(
    target: &JsValue,
    key: &str,
    value: JsValue,
    ctx: &mut EvalContext,
) -> Result<(), JErrorType> {
    if ctx.read_only {
        return Err(JErrorType::type_error(
            "Assignment is not allowed in side-effect-free evaluation",
        ));
    }
    let obj = match target {
        JsValue::Undefined | JsValue::Null => {
            return Err(JErrorType::type_error(format!(
                "Cannot set properties of {} (setting '{}')",
                target, key
            )))
        }
        JsValue::Object(o) => o.clone(),
        _ => return Ok(()),
    };
    match find_property(&obj, key) {
        Some(PropertyDescriptor {
            value: PropertyValue::Accessor { set, .. },
            ..
        }) => {
            if let Some(s) = set {
                call_function(&s, target.clone(), vec![value], ctx)?;
            }
            Ok(())
        }
        Some(PropertyDescriptor { writable: false, .. }) => Ok(()),
        _ => {
            obj.borrow_mut().set_own_data(key, value);
            Ok(())
        }
    }
}

/// Resolves an assignment target.
pub fn evaluate_reference(expr: &ExpressionPatternType, ctx: &mut EvalContext) -> ReferenceResult {
    match expr {
        ExpressionPatternType::Identifier(id) => Ok(Reference::environment(id.name.to_string())),
        ExpressionPatternType::MemberExpression(m) => member_reference(m, ctx),
    }
}

fn member_reference(m: &MemberExpressionType, ctx: &mut EvalContext) -> ReferenceResult {
    let (base, this_value) = match m.object() {
        ExpressionOrSuper::Super(_) => {
            let (base, this) = super_base(ctx)?;
            (base, Some(this))
        }
        ExpressionOrSuper::Expression(o) => (evaluate_expression(o, ctx)?, None),
    };
    let key = member_key(m, ctx)?;
    Ok(Reference {
        base: ReferenceBase::Object(base),
        referenced_name: key,
        this_value,
    })
}

pub fn get_value(reference: &Reference, ctx: &mut EvalContext) -> ValueResult {
    match &reference.base {
        ReferenceBase::Environment => evaluate_identifier(&reference.referenced_name, ctx),
        ReferenceBase::Object(base) => {
            let receiver = reference.get_this_value();
            get_property_with_receiver(base, &reference.referenced_name, &receiver, ctx)
        }
    }
}

pub fn put_value(reference: &Reference, value: JsValue, ctx: &mut EvalContext) -> Result<(), JErrorType> {
    if ctx.read_only {
        return Err(JErrorType::type_error(
            "Assignment is not allowed in side-effect-free evaluation",
        ));
    }
    match &reference.base {
        ReferenceBase::Environment => set_binding_value(&ctx.scope, &reference.referenced_name, value),
        ReferenceBase::Object(base) => {
            let target = match &reference.this_value {
                Some(this) => this,
                None => base,
            };
            set_property(target, &reference.referenced_name, value, ctx)
        }
    }
}

fn expression_as_reference(expr: &ExpressionType, ctx: &mut EvalContext) -> ReferenceResult {
    match expr {
        ExpressionType::Identifier(id) => Ok(Reference::environment(id.name.to_string())),
        ExpressionType::MemberExpression(m) => member_reference(m, ctx),
        _ => Err(JErrorType::SyntaxError(
            "Invalid left-hand side expression in postfix operation".to_string(),
        )),
    }
}

fn evaluate_unary_expression(
    operator: UnaryOperator,
    argument: &ExpressionType,
    ctx: &mut EvalContext,
) -> ValueResult {
    match operator {
        UnaryOperator::Delete => {
            if ctx.read_only {
                return Err(JErrorType::type_error(
                    "'delete' is not allowed in side-effect-free evaluation",
                ));
            }
            match argument {
                ExpressionType::MemberExpression(m) => {
                    let r = member_reference(m, ctx)?;
                    match r.base {
                        ReferenceBase::Object(JsValue::Object(o)) => {
                            Ok(JsValue::Boolean(o.borrow_mut().delete(&r.referenced_name)))
                        }
                        ReferenceBase::Object(v) if v.is_nullish() => Err(JErrorType::type_error(
                            format!("Cannot convert {} to object", v),
                        )),
                        _ => Ok(JsValue::Boolean(true)),
                    }
                }
                ExpressionType::Identifier(_) => Ok(JsValue::Boolean(false)),
                other => {
                    evaluate_expression(other, ctx)?;
                    Ok(JsValue::Boolean(true))
                }
            }
        }
        UnaryOperator::TypeOf => {
            if let ExpressionType::Identifier(id) = argument {
                if resolve_binding(&ctx.scope, &id.name).is_none() {
                    return Ok(JsValue::string(match id.name.as_str() {
                        "NaN" | "Infinity" => "number",
                        _ => "undefined",
                    }));
                }
            }
            let v = evaluate_expression(argument, ctx)?;
            Ok(JsValue::string(type_of(&v)))
        }
        UnaryOperator::Void => {
            evaluate_expression(argument, ctx)?;
            Ok(JsValue::Undefined)
        }
        UnaryOperator::LogicalNot => {
            let v = evaluate_expression(argument, ctx)?;
            Ok(JsValue::Boolean(!to_boolean(&v)))
        }
        UnaryOperator::Minus => {
            let v = evaluate_expression(argument, ctx)?;
            Ok(JsValue::number(-to_number(&v, ctx)?))
        }
        UnaryOperator::Plus => {
            let v = evaluate_expression(argument, ctx)?;
            Ok(JsValue::number(to_number(&v, ctx)?))
        }
        UnaryOperator::BitwiseNot => {
            let v = evaluate_expression(argument, ctx)?;
            Ok(JsValue::number(!to_int32(to_number(&v, ctx)?) as f64))
        }
    }
}

fn evaluate_update_expression(
    operator: UpdateOperator,
    argument: &ExpressionType,
    prefix: bool,
    ctx: &mut EvalContext,
) -> ValueResult {
    if ctx.read_only {
        return Err(JErrorType::type_error(
            "Update is not allowed in side-effect-free evaluation",
        ));
    }
    let reference = expression_as_reference(argument, ctx)?;
    let old = get_value(&reference, ctx)?;
    let old = to_number(&old, ctx)?;
    let new = match operator {
        UpdateOperator::PlusPlus => old + 1.0,
        UpdateOperator::MinusMinus => old - 1.0,
    };
    put_value(&reference, JsValue::number(new), ctx)?;
    Ok(JsValue::number(if prefix { new } else { old }))
}

fn compound_operator(op: AssignmentOperator) -> Option<BinaryOperator> {
    Some(match op {
        AssignmentOperator::AddEquals => BinaryOperator::Add,
        AssignmentOperator::SubtractEquals => BinaryOperator::Subtract,
        AssignmentOperator::MultiplyEquals => BinaryOperator::Multiply,
        AssignmentOperator::DivideEquals => BinaryOperator::Divide,
        AssignmentOperator::ModuloEquals => BinaryOperator::Modulo,
        AssignmentOperator::ExponentEquals => BinaryOperator::Exponent,
        AssignmentOperator::BitwiseLeftShiftEquals => BinaryOperator::BitwiseLeftShift,
        AssignmentOperator::BitwiseRightShiftEquals => BinaryOperator::BitwiseRightShift,
        AssignmentOperator::BitwiseUnsignedRightShiftEquals => {
            BinaryOperator::BitwiseUnsignedRightShift
        }
        AssignmentOperator::BitwiseOrEquals => BinaryOperator::BitwiseOr,
        AssignmentOperator::BitwiseAndEquals => BinaryOperator::BitwiseAnd,
        AssignmentOperator::BitwiseXorEquals => BinaryOperator::BitwiseXor,
        _ => return None,
    })
}

fn evaluate_assignment_expression(
    operator: AssignmentOperator,
    left: &PatternType,
    right: &ExpressionType,
    ctx: &mut EvalContext,
) -> ValueResult {
    let target = match left {
        PatternType::PatternWhichCanBeExpression(e) => e,
        pattern => {
            let value = evaluate_expression(right, ctx)?;
            bind_pattern(pattern, value.clone(), BindingMode::Assign, ctx)?;
            return Ok(value);
        }
    };
    let reference = evaluate_reference(target, ctx)?;
    let value = match operator {
        AssignmentOperator::Equals => {
            let v = evaluate_expression(right, ctx)?;
            if let (ExpressionPatternType::Identifier(id), true) =
                (target, is_anonymous_function_definition(right))
            {
                name_anonymous_function(&v, &id.name);
            }
            v
        }
        AssignmentOperator::LogicalAndEquals
        | AssignmentOperator::LogicalOrEquals
        | AssignmentOperator::NullishEquals => {
            let old = get_value(&reference, ctx)?;
            let keep = match operator {
                AssignmentOperator::LogicalAndEquals => !to_boolean(&old),
                AssignmentOperator::LogicalOrEquals => to_boolean(&old),
                _ => !old.is_nullish(),
            };
            if keep {
                return Ok(old);
            }
            evaluate_expression(right, ctx)?
        }
        op => {
            let old = get_value(&reference, ctx)?;
            let r = evaluate_expression(right, ctx)?;
            match compound_operator(op) {
                Some(binary) => apply_binary_operator(binary, &old, &r, ctx)?,
                None => r,
            }
        }
    };
    put_value(&reference, value.clone(), ctx)?;
    Ok(value)
}

fn compare_values(
    l: &JsValue,
    r: &JsValue,
    ctx: &mut EvalContext,
) -> Result<Option<std::cmp::Ordering>, JErrorType> {
    let pl = to_primitive(l, PreferredType::Number, ctx)?;
    let pr = to_primitive(r, PreferredType::Number, ctx)?;
    if let (JsValue::String(a), JsValue::String(b)) = (&pl, &pr) {
        return Ok(Some(a.encode_utf16().cmp(b.encode_utf16())));
    }
    let a = to_number(&pl, ctx)?;
    let b = to_number(&pr, ctx)?;
    Ok(a.partial_cmp(&b))
}

fn exponent(base: f64, exp: f64) -> f64 {
    if exp.is_nan() || (base.abs() == 1.0 && exp.is_infinite()) {
        f64::NAN
    } else {
        base.powf(exp)
    }
}

pub fn apply_binary_operator(
    operator: BinaryOperator,
    l: &JsValue,
    r: &JsValue,
    ctx: &mut EvalContext,
) -> ValueResult {
    use std::cmp::Ordering;
    Ok(match operator {
        BinaryOperator::Add => {
            let pl = to_primitive(l, PreferredType::Default, ctx)?;
            let pr = to_primitive(r, PreferredType::Default, ctx)?;
            if matches!(pl, JsValue::String(_)) || matches!(pr, JsValue::String(_)) {
                let mut s = to_string(&pl, ctx)?;
                let right = to_string(&pr, ctx)?;
                check_string_length((s.len() + right.len()) as f64)?;
                s.push_str(&right);
                JsValue::String(s)
            } else {
                JsValue::number(to_number(&pl, ctx)? + to_number(&pr, ctx)?)
            }
        }
        BinaryOperator::Subtract => JsValue::number(to_number(l, ctx)? - to_number(r, ctx)?),
        BinaryOperator::Multiply => JsValue::number(to_number(l, ctx)? * to_number(r, ctx)?),
        BinaryOperator::Divide => JsValue::number(to_number(l, ctx)? / to_number(r, ctx)?),
        BinaryOperator::Modulo => JsValue::number(to_number(l, ctx)? % to_number(r, ctx)?),
        BinaryOperator::Exponent => JsValue::number(exponent(to_number(l, ctx)?, to_number(r, ctx)?)),
        BinaryOperator::BitwiseOr => {
            JsValue::number((to_int32(to_number(l, ctx)?) | to_int32(to_number(r, ctx)?)) as f64)
        }
        BinaryOperator::BitwiseAnd => {
            JsValue::number((to_int32(to_number(l, ctx)?) & to_int32(to_number(r, ctx)?)) as f64)
        }
        BinaryOperator::BitwiseXor => {
            JsValue::number((to_int32(to_number(l, ctx)?) ^ to_int32(to_number(r, ctx)?)) as f64)
        }
        BinaryOperator::BitwiseLeftShift => {
            let shift = to_uint32(to_number(r, ctx)?) & 31;
            JsValue::number(to_int32(to_number(l, ctx)?).wrapping_shl(shift) as f64)
        }
        BinaryOperator::BitwiseRightShift => {
            let shift = to_uint32(to_number(r, ctx)?) & 31;
            JsValue::number((to_int32(to_number(l, ctx)?) >> shift) as f64)
        }
        BinaryOperator::BitwiseUnsignedRightShift => {
            let shift = to_uint32(to_number(r, ctx)?) & 31;
            JsValue::number((to_uint32(to_number(l, ctx)?) >> shift) as f64)
        }
        BinaryOperator::StrictlyEqual => JsValue::Boolean(strict_equality_comparison(l, r)),
        BinaryOperator::StrictlyUnequal => JsValue::Boolean(!strict_equality_comparison(l, r)),
        BinaryOperator::LooselyEqual => JsValue::Boolean(abstract_equality_comparison(l, r, ctx)?),
        BinaryOperator::LooselyUnequal => {
            JsValue::Boolean(!abstract_equality_comparison(l, r, ctx)?)
        }
        BinaryOperator::LessThan => {
            JsValue::Boolean(compare_values(l, r, ctx)? == Some(Ordering::Less))
        }
        BinaryOperator::GreaterThan => {
            JsValue::Boolean(compare_values(l, r, ctx)? == Some(Ordering::Greater))
        }
        BinaryOperator::LessThanEqual => JsValue::Boolean(matches!(
            compare_values(l, r, ctx)?,
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOperator::GreaterThanEqual => JsValue::Boolean(matches!(
            compare_values(l, r, ctx)?,
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOperator::In => {
            let obj = match r {
                JsValue::Object(o) => o.clone(),
                other => {
                    return Err(JErrorType::type_error(format!(
                        "Cannot use 'in' operator to search for '{}' in {}",
                        l, other
                    )))
                }
            };
            let key = to_property_key(l, ctx)?;
            JsValue::Boolean(find_property(&obj, &key).is_some())
        }
        BinaryOperator::InstanceOf => {
            if !is_callable(r) {
                return Err(JErrorType::type_error(
                    "Right-hand side of 'instanceof' is not callable",
                ));
            }
            let proto = get_property(r, "prototype", ctx)?;
            JsValue::Boolean(match (l, proto) {
                (JsValue::Object(o), JsValue::Object(p)) => has_in_prototype_chain(o, &p),
                _ => false,
            })
        }
    })
}

pub fn has_in_prototype_chain(obj: &JsObjectType, proto: &JsObjectType) -> bool {
    let mut current = obj.borrow().prototype.clone();
    while let Some(c) = current {
        if std::rc::Rc::ptr_eq(&c, proto) {
            return true;
        }
        current = c.borrow().prototype.clone();
    }
    false
}

/// How a destructuring target receives its value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BindingMode {
    /// Plain assignment through references.
    Assign,
    /// `var`: writes the hoisted binding.
    Var,
    /// `let`, parameters and catch bindings: fresh mutable binding.
    Let,
    Const,
}

pub fn bind_pattern(
    pattern: &PatternType,
    value: JsValue,
    mode: BindingMode,
    ctx: &mut EvalContext,
) -> Result<(), JErrorType> {
    match pattern {
        PatternType::PatternWhichCanBeExpression(ExpressionPatternType::Identifier(id)) => {
            bind_name(&id.name, value, mode, ctx)
        }
        PatternType::PatternWhichCanBeExpression(target @ ExpressionPatternType::MemberExpression(_)) => {
            if mode != BindingMode::Assign {
                return Err(JErrorType::SyntaxError("Illegal property in declaration context".to_string()));
            }
            let r = evaluate_reference(target, ctx)?;
            put_value(&r, value, ctx)
        }
        PatternType::AssignmentPattern { left, right, .. } => {
            let value = if value.is_undefined() {
                let v = evaluate_expression(right, ctx)?;
                if let PatternType::PatternWhichCanBeExpression(ExpressionPatternType::Identifier(id)) =
                    left.as_ref()
                {
                    if is_anonymous_function_definition(right) {
                        name_anonymous_function(&v, &id.name);
                    }
                }
                v
            } else {
                value
            };
            bind_pattern(left, value, mode, ctx)
        }
        PatternType::RestElement { argument, .. } => bind_pattern(argument, value, mode, ctx),
        PatternType::ObjectPattern { properties, .. } => {
            if value.is_nullish() {
                return Err(JErrorType::type_error(format!(
                    "Cannot destructure '{}' as it is {}.",
                    value, value
                )));
            }
            let mut used = vec![];
            for p in properties {
                match p {
                    ObjectPatternProperty::Property { key, value: target, .. } => {
                        let key = evaluate_property_key(key, ctx)?;
                        let v = get_property(&value, &key, ctx)?;
                        used.push(key);
                        bind_pattern(target, v, mode, ctx)?;
                    }
                    ObjectPatternProperty::Rest(target) => {
                        let rest = ctx.new_object();
                        copy_data_properties(&value, &rest, &used, ctx)?;
                        bind_pattern(target, JsValue::Object(rest), mode, ctx)?;
                    }
                }
            }
            Ok(())
        }
        PatternType::ArrayPattern { elements, .. } => {
            let items = iterate_to_vec(&value, ctx)?;
            let mut items = items.into_iter();
            for element in elements {
                match element.as_deref() {
                    None => {
                        items.next();
                    }
                    Some(PatternType::RestElement { argument, .. }) => {
                        let rest = ctx.new_array(items.by_ref().collect());
                        bind_pattern(argument, rest, mode, ctx)?;
                    }
                    Some(p) => {
                        let v = items.next().unwrap_or(JsValue::Undefined);
                        bind_pattern(p, v, mode, ctx)?;
                    }
                }
            }
            Ok(())
        }
    }
}

fn bind_name(name: &str, value: JsValue, mode: BindingMode, ctx: &mut EvalContext) -> Result<(), JErrorType> {
    match mode {
        BindingMode::Assign => {
            if ctx.read_only {
                return Err(JErrorType::type_error(
                    "Assignment is not allowed in side-effect-free evaluation",
                ));
            }
            set_binding_value(&ctx.scope, name, value)
        }
        BindingMode::Var => set_binding_value(&ctx.scope, name, value),
        BindingMode::Let => {
            ctx.scope.borrow_mut().create_binding(name, true, Some(value));
            Ok(())
        }
        BindingMode::Const => {
            ctx.scope.borrow_mut().create_binding(name, false, Some(value));
            Ok(())
        }
    }
}
