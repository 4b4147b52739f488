//! Core types shared by the evaluator and the built-in objects.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;

use crate::runner::ds::env_record::{EnvironmentRecord, ScopeRef};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::function_object::FunctionObject;
use crate::runner::ds::object::{JsObject, ObjectClass, PropertyDescriptor};
use crate::runner::ds::value::{JsObjectType, JsValue};
use crate::runner::eval::jobs::JobQueue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::std_lib::console::{ConsoleSink, StdoutConsole};

/// Nested calls deeper than this raise a RangeError.
pub const MAX_CALL_DEPTH: usize = 256;

/// Per-call state that is not part of the scope chain.
#[derive(Clone, Default)]
pub struct Frame {
    /// `None` inside a derived constructor until `super()` returns.
    pub this_value: Option<JsValue>,
    /// Class whose constructor is running, used by `super(...)`.
    pub function: Option<JsObjectType>,
    pub home_object: Option<JsObjectType>,
    pub new_target: Option<JsObjectType>,
}

/// Execution context passed to the evaluator and to native functions.
pub struct EvalContext {
    pub global_scope: ScopeRef,
    /// Innermost scope of the code currently running.
    pub scope: ScopeRef,
    pub frames: Vec<Frame>,
    prototypes: HashMap<String, JsObjectType>,
    pub jobs: JobQueue,
    pub console: Rc<dyn ConsoleSink>,
    pub deadline: Option<Instant>,
    interrupt: Arc<AtomicBool>,
    /// Set while completion evaluates member paths: anything that could run
    /// script code or write state fails instead.
    pub read_only: bool,
    pub call_depth: usize,
}

impl EvalContext {
    pub fn new() -> Self {
        let global_scope = EnvironmentRecord::new_global();
        EvalContext {
            scope: global_scope.clone(),
            global_scope,
            frames: vec![Frame {
                this_value: Some(JsValue::Undefined),
                ..Frame::default()
            }],
            prototypes: HashMap::new(),
            jobs: JobQueue::new(),
            console: Rc::new(StdoutConsole),
            deadline: None,
            interrupt: Arc::new(AtomicBool::new(false)),
            read_only: false,
            call_depth: 0,
        }
    }

    pub fn with_console(mut self, console: Rc<dyn ConsoleSink>) -> Self {
        self.console = console;
        self
    }

    /// Shares an existing interrupt flag, so it outlives this context.
    pub fn with_interrupt(mut self, interrupt: Arc<AtomicBool>) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Flag another thread may raise to cancel the running command.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }

    pub fn clear_interrupt(&self) {
        self.interrupt.store(false, Ordering::SeqCst);
    }

    /// Checked at loop back-edges and calls.
    pub fn check_deadline(&self) -> Result<(), JErrorType> {
        if self.interrupt.load(Ordering::SeqCst) {
            return Err(JErrorType::Cancelled);
        }
        match self.deadline {
            Some(d) if Instant::now() >= d => Err(JErrorType::Timeout),
            _ => Ok(()),
        }
    }

    /// Installs the registry's objects as global bindings.
    pub fn install_core_builtins(&mut self, registry: BuiltInRegistry) {
        for (name, f) in registry.functions() {
            let value = self.new_native_function(name, BuiltInFn::Native(*f), 1);
            self.set_binding(name, value);
        }
        for name in registry.object_names() {
            if let Some(obj) = registry.get_object(&name) {
                let value = self.materialize(obj);
                self.set_binding(&name, value);
            }
        }
    }

    fn materialize(&mut self, def: &BuiltInObject) -> JsValue {
        let target = match &def.constructor {
            Some(ctor) => {
                let proto = self.prototype_for(&def.name);
                if let Some(parent) = def.prototype.as_ref().filter(|p| **p != def.name) {
                    let parent_proto = self.prototype_for(parent);
                    proto.borrow_mut().prototype = Some(parent_proto);
                }
                for (key, f) in &def.prototype_methods {
                    let m = self.new_native_function(key, f.clone(), 0);
                    proto.borrow_mut().define(key.to_string(), PropertyDescriptor::hidden(m));
                }
                for (key, v) in &def.prototype_properties {
                    proto
                        .borrow_mut()
                        .define(key.to_string(), PropertyDescriptor::hidden(v.clone()));
                }
                for (key, f) in &def.getters {
                    let getter = self.new_native_function(key, f.clone(), 0);
                    proto
                        .borrow_mut()
                        .define(key.to_string(), PropertyDescriptor::accessor(Some(getter), None, false));
                }
                let mut fo = FunctionObject::built_in(def.name.clone(), ctor.clone());
                fo.constructable = true;
                let ctor_obj = self.new_function_object(fo, 1);
                ctor_obj
                    .borrow_mut()
                    .define("prototype", PropertyDescriptor::read_only(JsValue::Object(proto.clone())));
                proto
                    .borrow_mut()
                    .define("constructor", PropertyDescriptor::hidden(JsValue::Object(ctor_obj.clone())));
                ctor_obj
            }
            None => self.new_object(),
        };
        for (key, f) in &def.methods {
            let m = self.new_native_function(key, f.clone(), 0);
            target.borrow_mut().define(key.to_string(), PropertyDescriptor::hidden(m));
        }
        for (key, v) in &def.properties {
            target
                .borrow_mut()
                .define(key.to_string(), PropertyDescriptor::read_only(v.clone()));
        }
        JsValue::Object(target)
    }

    /// Intrinsic prototype by constructor name, created empty on first use.
    pub fn prototype_for(&mut self, name: &str) -> JsObjectType {
        if let Some(p) = self.prototypes.get(name) {
            return p.clone();
        }
        let parent = match name {
            "Object" => None,
            n if n.ends_with("Error") && n != "Error" => Some(self.prototype_for("Error")),
            _ => Some(self.prototype_for("Object")),
        };
        let class = match name {
            "Array" => ObjectClass::Array(vec![]),
            _ => ObjectClass::Ordinary,
        };
        let proto = JsObject::new(class, parent).into_ref();
        self.prototypes.insert(name.to_string(), proto.clone());
        proto
    }

    pub fn new_object(&mut self) -> JsObjectType {
        let proto = self.prototype_for("Object");
        JsObject::new(ObjectClass::Ordinary, Some(proto)).into_ref()
    }

    pub fn new_object_of(&mut self, class: ObjectClass, prototype: &str) -> JsObjectType {
        let proto = self.prototype_for(prototype);
        JsObject::new(class, Some(proto)).into_ref()
    }

    pub fn new_array(&mut self, elements: Vec<JsValue>) -> JsValue {
        JsValue::Object(self.new_object_of(ObjectClass::Array(elements), "Array"))
    }

    /// Error object of the given constructor name, as `new TypeError(msg)` makes.
    pub fn new_error(&mut self, name: &str, message: &str) -> JsValue {
        let e = self.new_object_of(ObjectClass::Error, name);
        e.borrow_mut()
            .define("message", PropertyDescriptor::hidden(JsValue::string(message)));
        e.borrow_mut().define(
            "stack",
            PropertyDescriptor::hidden(JsValue::string(format!("{}: {}\n    at <repl>", name, message))),
        );
        JsValue::Object(e)
    }

    /// Script-visible value of a catchable error.
    pub fn error_to_value(&mut self, err: JErrorType) -> JsValue {
        match err {
            JErrorType::Thrown(v) => v,
            other => {
                let name = other.error_name().unwrap_or("Error");
                let message = other.message();
                self.new_error(name, &message)
            }
        }
    }

    pub fn new_function_object(&mut self, f: FunctionObject, length: usize) -> JsObjectType {
        let name = f.name.clone();
        let proto = self.prototype_for("Function");
        let mut obj = JsObject::new(ObjectClass::Function(f), Some(proto));
        obj.define("length", PropertyDescriptor::read_only(JsValue::number(length as f64)));
        obj.define("name", PropertyDescriptor::read_only(JsValue::String(name)));
        obj.into_ref()
    }

    pub fn new_native_function(&mut self, name: &str, f: BuiltInFn, length: usize) -> JsValue {
        JsValue::Object(self.new_function_object(FunctionObject::built_in(name, f), length))
    }

    /// Binding lookup from the current scope outwards.
    pub fn get_binding(&self, name: &str) -> Result<JsValue, JErrorType> {
        crate::runner::ds::env_record::get_binding_value(&self.scope, name)
    }

    /// Creates or overwrites a mutable global binding.
    pub fn set_binding(&mut self, name: &str, value: JsValue) {
        self.global_scope
            .borrow_mut()
            .create_binding(name, true, Some(value));
    }

    /// Keys of the shared namespace.
    pub fn global_names(&self) -> Vec<String> {
        self.global_scope.borrow().names()
    }

    pub fn current_frame(&self) -> &Frame {
        // The root frame is never popped.
        &self.frames[self.frames.len() - 1]
    }

    pub fn current_frame_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Function signature for built-in methods.
/// Native functions receive the evaluation context, `this` value, and arguments.
/// Constructors receive the freshly allocated object as `this` under `new`
/// and `undefined` when called plainly.
pub type NativeFn =
    fn(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType>;

pub type NativeClosure = Rc<dyn Fn(&mut EvalContext, JsValue, Vec<JsValue>) -> Result<JsValue, JErrorType>>;

/// Built-in function - either a plain function pointer or a closure over
/// captured state (promise resolvers, `finally` wrappers).
#[derive(Clone)]
pub enum BuiltInFn {
    Native(NativeFn),
    Closure(NativeClosure),
}

impl BuiltInFn {
    pub fn closure(
        f: impl Fn(&mut EvalContext, JsValue, Vec<JsValue>) -> Result<JsValue, JErrorType> + 'static,
    ) -> Self {
        BuiltInFn::Closure(Rc::new(f))
    }

    pub fn call(
        &self,
        ctx: &mut EvalContext,
        this: JsValue,
        args: Vec<JsValue>,
    ) -> Result<JsValue, JErrorType> {
        match self {
            BuiltInFn::Native(f) => f(ctx, this, args),
            BuiltInFn::Closure(f) => f(ctx, this, args),
        }
    }
}

/// Built-in object definition.
/// Represents a JavaScript built-in object like Array, Object, String, etc.
pub struct BuiltInObject {
    /// Name of the object (e.g., "Array", "Object", "Math").
    pub name: String,

    /// Parent prototype name, if any (e.g., "Error" for "TypeError").
    pub prototype: Option<String>,

    /// Static methods.
    pub methods: IndexMap<String, BuiltInFn>,

    /// Methods installed on `<name>.prototype`.
    pub prototype_methods: IndexMap<String, BuiltInFn>,

    /// Accessors installed on `<name>.prototype`.
    pub getters: IndexMap<String, BuiltInFn>,

    /// Data properties installed on `<name>.prototype`.
    pub prototype_properties: IndexMap<String, JsValue>,

    /// Static properties.
    pub properties: IndexMap<String, JsValue>,

    /// Constructor function, if this object is constructable.
    pub constructor: Option<BuiltInFn>,
}

impl BuiltInObject {
    /// Create a new built-in object with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        BuiltInObject {
            name: name.into(),
            prototype: Some("Object".to_string()),
            methods: IndexMap::new(),
            prototype_methods: IndexMap::new(),
            getters: IndexMap::new(),
            prototype_properties: IndexMap::new(),
            properties: IndexMap::new(),
            constructor: None,
        }
    }

    /// Set the prototype chain parent.
    pub fn with_prototype(mut self, prototype: impl Into<String>) -> Self {
        self.prototype = Some(prototype.into());
        self
    }

    /// Set no prototype (for namespace objects like Math).
    pub fn with_no_prototype(mut self) -> Self {
        self.prototype = None;
        self
    }

    /// Add a native static method.
    pub fn add_method(mut self, name: impl Into<String>, func: NativeFn) -> Self {
        self.methods.insert(name.into(), BuiltInFn::Native(func));
        self
    }

    /// Add a native method to the prototype.
    pub fn add_prototype_method(mut self, name: impl Into<String>, func: NativeFn) -> Self {
        self.prototype_methods
            .insert(name.into(), BuiltInFn::Native(func));
        self
    }

    pub fn add_getter(mut self, name: impl Into<String>, func: NativeFn) -> Self {
        self.getters.insert(name.into(), BuiltInFn::Native(func));
        self
    }

    pub fn add_prototype_property(mut self, name: impl Into<String>, value: JsValue) -> Self {
        self.prototype_properties.insert(name.into(), value);
        self
    }

    /// Add a property.
    pub fn add_property(mut self, name: impl Into<String>, value: JsValue) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// Set the constructor function.
    pub fn with_constructor(mut self, constructor: NativeFn) -> Self {
        self.constructor = Some(BuiltInFn::Native(constructor));
        self
    }
}
