use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::value::JsValue;

pub type ScopeRef = Rc<RefCell<EnvironmentRecord>>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnvironmentKind {
    Global,
    Function,
    Block,
}

#[derive(PartialEq)]
pub enum BindingFlag {
    IsImmutable,
}

/// Declarative bindings of one scope. A binding whose value is `None` has
/// been created but not initialised yet (temporal dead zone).
pub struct EnvironmentRecord {
    bindings: IndexMap<String, Option<JsValue>>,
    binding_flags: HashMap<String, Vec<BindingFlag>>,
    pub kind: EnvironmentKind,
    pub outer: Option<ScopeRef>,
}

impl EnvironmentRecord {
    pub fn new_global() -> ScopeRef {
        Rc::new(RefCell::new(EnvironmentRecord {
            bindings: IndexMap::new(),
            binding_flags: HashMap::new(),
            kind: EnvironmentKind::Global,
            outer: None,
        }))
    }

    pub fn new_child(outer: &ScopeRef, kind: EnvironmentKind) -> ScopeRef {
        Rc::new(RefCell::new(EnvironmentRecord {
            bindings: IndexMap::new(),
            binding_flags: HashMap::new(),
            kind,
            outer: Some(outer.clone()),
        }))
    }

    pub fn has_binding(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Creates a binding, replacing any previous one of the same name.
    pub fn create_binding(&mut self, name: impl Into<String>, mutable: bool, value: Option<JsValue>) {
        let name = name.into();
        if mutable {
            self.binding_flags.remove(&name);
        } else {
            self.binding_flags
                .insert(name.clone(), vec![BindingFlag::IsImmutable]);
        }
        self.bindings.insert(name, value);
    }

    /// `var` semantics: an existing binding keeps its value.
    pub fn create_var_binding(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.bindings.contains_key(&name) {
            self.bindings.insert(name, Some(JsValue::Undefined));
        }
    }

    pub fn initialize_binding(&mut self, name: &str, value: JsValue) {
        if let Some(slot) = self.bindings.get_mut(name) {
            *slot = Some(value);
        }
    }

    pub fn is_mutable(&self, name: &str) -> bool {
        !self
            .binding_flags
            .get(name)
            .map(|f| f.contains(&BindingFlag::IsImmutable))
            .unwrap_or(false)
    }

    pub fn delete_binding(&mut self, name: &str) -> bool {
        self.binding_flags.remove(name);
        self.bindings.shift_remove(name).is_some()
    }

    /// Binding names in creation order.
    pub fn names(&self) -> Vec<String> {
        self.bindings.keys().cloned().collect()
    }

    pub fn get_own(&self, name: &str) -> Option<&Option<JsValue>> {
        self.bindings.get(name)
    }
}

/// Nearest scope on the chain that holds `name`.
pub fn resolve_binding(scope: &ScopeRef, name: &str) -> Option<ScopeRef> {
    let mut current = Some(scope.clone());
    while let Some(s) = current {
        if s.borrow().has_binding(name) {
            return Some(s);
        }
        current = s.borrow().outer.clone();
    }
    None
}

/// Nearest function or global scope, where `var` declarations land.
pub fn var_scope(scope: &ScopeRef) -> ScopeRef {
    let mut current = scope.clone();
    loop {
        let outer = {
            let s = current.borrow();
            if s.kind != EnvironmentKind::Block {
                None
            } else {
                s.outer.clone()
            }
        };
        match outer {
            Some(o) => current = o,
            None => return current,
        }
    }
}

pub fn get_binding_value(scope: &ScopeRef, name: &str) -> Result<JsValue, JErrorType> {
    let s = match resolve_binding(scope, name) {
        Some(s) => s,
        None => {
            return Err(JErrorType::reference_error(format!(
                "{} is not defined",
                name
            )))
        }
    };
    let value = s.borrow().get_own(name).cloned().flatten();
    value.ok_or_else(|| {
        JErrorType::reference_error(format!("Cannot access '{}' before initialization", name))
    })
}

/// Assignment to an existing binding. Unresolvable names become globals.
pub fn set_binding_value(scope: &ScopeRef, name: &str, value: JsValue) -> Result<(), JErrorType> {
    match resolve_binding(scope, name) {
        Some(s) => {
            let mut s = s.borrow_mut();
            if let Some(None) = s.get_own(name) {
                return Err(JErrorType::reference_error(format!(
                    "Cannot access '{}' before initialization",
                    name
                )));
            }
            if !s.is_mutable(name) {
                return Err(JErrorType::type_error("Assignment to constant variable."));
            }
            s.initialize_binding(name, value);
            Ok(())
        }
        None => {
            let mut global = scope.clone();
            loop {
                let outer = global.borrow().outer.clone();
                match outer {
                    Some(o) => global = o,
                    None => break,
                }
            }
            global.borrow_mut().create_binding(name, true, Some(value));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_walks_outer_scopes() {
        let global = EnvironmentRecord::new_global();
        global
            .borrow_mut()
            .create_binding("x", true, Some(JsValue::number(1.0)));
        let block = EnvironmentRecord::new_child(&global, EnvironmentKind::Block);
        assert_eq!(get_binding_value(&block, "x").unwrap(), JsValue::number(1.0));
        assert!(Rc::ptr_eq(&var_scope(&block), &global));
    }

    #[test]
    fn test_uninitialised_and_constant_bindings() {
        let global = EnvironmentRecord::new_global();
        global.borrow_mut().create_binding("a", true, None);
        global
            .borrow_mut()
            .create_binding("c", false, Some(JsValue::Null));
        assert!(matches!(
            get_binding_value(&global, "a"),
            Err(JErrorType::ReferenceError(_))
        ));
        assert!(matches!(
            set_binding_value(&global, "c", JsValue::Null),
            Err(JErrorType::TypeError(_))
        ));
        assert!(matches!(
            get_binding_value(&global, "missing"),
            Err(JErrorType::ReferenceError(m)) if m == "missing is not defined"
        ));
    }

    #[test]
    fn test_unresolved_assignment_creates_global() {
        let global = EnvironmentRecord::new_global();
        let block = EnvironmentRecord::new_child(&global, EnvironmentKind::Function);
        set_binding_value(&block, "g", JsValue::Boolean(true)).unwrap();
        assert!(global.borrow().has_binding("g"));
    }
}
