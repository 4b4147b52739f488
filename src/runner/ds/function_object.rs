use std::rc::Rc;

use crate::parser::ast::{ClassData, FunctionData};
use crate::runner::ds::env_record::ScopeRef;
use crate::runner::ds::value::{JsObjectType, JsValue};
use crate::runner::plugin::types::BuiltInFn;

/// Callable payload of a function object.
pub struct FunctionObject {
    pub name: String,
    pub kind: FunctionKind,
    /// Whether `new` may be applied. Arrows, methods and most natives are not.
    pub constructable: bool,
}

pub enum FunctionKind {
    BuiltIn(BuiltInFn),
    Script(ScriptFunction),
    Class(ClassConstructor),
}

/// A function defined in script: declaration, expression, arrow or method.
#[derive(Clone)]
pub struct ScriptFunction {
    pub data: Rc<FunctionData>,
    /// Scope the function closes over.
    pub scope: ScopeRef,
    /// Lexical `this` captured by arrow functions.
    pub this_value: Option<JsValue>,
    /// Object whose prototype `super.x` looks into.
    pub home_object: Option<JsObjectType>,
}

#[derive(Clone)]
pub struct ClassConstructor {
    pub data: Rc<ClassData>,
    /// Explicit `constructor(...)` member, if any.
    pub constructor: Option<Rc<FunctionData>>,
    pub scope: ScopeRef,
    /// Constructor of the `extends` clause. `None` for base classes.
    pub parent: Option<JsObjectType>,
    /// The `prototype` object instances are created with.
    pub prototype: JsObjectType,
}

impl FunctionObject {
    pub fn built_in(name: impl Into<String>, f: BuiltInFn) -> Self {
        FunctionObject {
            name: name.into(),
            kind: FunctionKind::BuiltIn(f),
            constructable: false,
        }
    }

    pub fn is_class(&self) -> bool {
        matches!(self.kind, FunctionKind::Class(_))
    }

    pub fn is_derived_class(&self) -> bool {
        matches!(&self.kind, FunctionKind::Class(c) if c.parent.is_some())
    }
}
