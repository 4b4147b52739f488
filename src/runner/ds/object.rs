use std::cell::RefCell;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use crate::runner::ds::function_object::FunctionObject;
use crate::runner::ds::promise_object::PromiseData;
use crate::runner::ds::value::{JsObjectType, JsValue};

#[derive(Clone)]
pub enum PropertyValue {
    Data(JsValue),
    Accessor {
        get: Option<JsValue>,
        set: Option<JsValue>,
    },
}

#[derive(Clone)]
pub struct PropertyDescriptor {
    pub value: PropertyValue,
    pub enumerable: bool,
    pub writable: bool,
}

impl PropertyDescriptor {
    /// An ordinary assignable, enumerable property.
    pub fn data(value: JsValue) -> Self {
        PropertyDescriptor {
            value: PropertyValue::Data(value),
            enumerable: true,
            writable: true,
        }
    }

    /// Writable but skipped by enumeration: built-in methods, `constructor`.
    pub fn hidden(value: JsValue) -> Self {
        PropertyDescriptor {
            value: PropertyValue::Data(value),
            enumerable: false,
            writable: true,
        }
    }

    pub fn read_only(value: JsValue) -> Self {
        PropertyDescriptor {
            value: PropertyValue::Data(value),
            enumerable: false,
            writable: false,
        }
    }

    pub fn accessor(get: Option<JsValue>, set: Option<JsValue>, enumerable: bool) -> Self {
        PropertyDescriptor {
            value: PropertyValue::Accessor { get, set },
            enumerable,
            writable: true,
        }
    }
}

pub enum ObjectClass {
    Ordinary,
    Array(Vec<JsValue>),
    Function(FunctionObject),
    Error,
    Promise(PromiseData),
    /// Entries in insertion order, compared with SameValueZero.
    Map(Vec<(JsValue, JsValue)>),
}

pub struct JsObject {
    pub class: ObjectClass,
    pub properties: IndexMap<String, PropertyDescriptor>,
    pub prototype: Option<JsObjectType>,
}

impl JsObject {
    pub fn new(class: ObjectClass, prototype: Option<JsObjectType>) -> Self {
        JsObject {
            class,
            properties: IndexMap::new(),
            prototype,
        }
    }

    pub fn into_ref(self) -> JsObjectType {
        Rc::new(RefCell::new(self))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.class, ObjectClass::Function(_))
    }

    pub fn as_function(&self) -> Option<&FunctionObject> {
        match &self.class {
            ObjectClass::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn get_own_property(&self, key: &str) -> Option<PropertyDescriptor> {
        if let ObjectClass::Array(elements) = &self.class {
            if key == "length" {
                return Some(PropertyDescriptor {
                    value: PropertyValue::Data(JsValue::number(elements.len() as f64)),
                    enumerable: false,
                    writable: true,
                });
            }
            if let Some(i) = array_index(key) {
                return elements.get(i).map(|v| PropertyDescriptor::data(v.clone()));
            }
        }
        self.properties.get(key).cloned()
    }

    pub fn get_own_data(&self, key: &str) -> Option<JsValue> {
        match self.get_own_property(key)?.value {
            PropertyValue::Data(v) => Some(v),
            PropertyValue::Accessor { .. } => None,
        }
    }

    pub fn has_own_property(&self, key: &str) -> bool {
        self.get_own_property(key).is_some()
    }

    /// Own keys in property order: array indices first, then named keys.
    pub fn own_keys(&self, include_hidden: bool) -> Vec<String> {
        let mut keys = vec![];
        if let ObjectClass::Array(elements) = &self.class {
            keys.extend((0..elements.len()).map(|i| i.to_string()));
            if include_hidden {
                keys.push("length".to_string());
            }
        }
        keys.extend(
            self.properties
                .iter()
                .filter(|(_, d)| include_hidden || d.enumerable)
                .map(|(k, _)| k.to_string()),
        );
        keys
    }

    pub fn define(&mut self, key: impl Into<String>, descriptor: PropertyDescriptor) {
        let key = key.into();
        if let (ObjectClass::Array(_), PropertyValue::Data(v)) = (&self.class, &descriptor.value) {
            if array_index(&key).is_some() || key == "length" {
                let v = v.clone();
                self.set_own_data(&key, v);
                return;
            }
        }
        self.properties.insert(key, descriptor);
    }

    /// Writes a data property, keeping the attributes of an existing one.
    pub fn set_own_data(&mut self, key: &str, value: JsValue) {
        if let ObjectClass::Array(elements) = &mut self.class {
            if key == "length" {
                if let JsValue::Number(n) = &value {
                    let len = n.as_f64();
                    if len >= 0.0 && len.fract() == 0.0 && len <= MAX_DENSE_LENGTH as f64 {
                        elements.resize(len as usize, JsValue::Undefined);
                    }
                }
                return;
            }
            if let Some(i) = array_index(key).filter(|i| *i < MAX_DENSE_LENGTH) {
                if i >= elements.len() {
                    elements.resize(i + 1, JsValue::Undefined);
                }
                elements[i] = value;
                return;
            }
        }
        match self.properties.get_mut(key) {
            Some(existing) => existing.value = PropertyValue::Data(value),
            None => {
                self.properties
                    .insert(key.to_string(), PropertyDescriptor::data(value));
            }
        }
    }

    pub fn delete(&mut self, key: &str) -> bool {
        if let ObjectClass::Array(elements) = &mut self.class {
            if let Some(i) = array_index(key) {
                if i < elements.len() {
                    elements[i] = JsValue::Undefined;
                }
                return true;
            }
        }
        self.properties.shift_remove(key);
        true
    }

    pub fn class_name(&self) -> &'static str {
        match self.class {
            ObjectClass::Ordinary => "Object",
            ObjectClass::Array(_) => "Array",
            ObjectClass::Function(_) => "Function",
            ObjectClass::Error => "Error",
            ObjectClass::Promise(_) => "Promise",
            ObjectClass::Map(_) => "Map",
        }
    }
}

/// Arrays grow densely up to this length; larger indices become plain keys.
pub const MAX_DENSE_LENGTH: usize = 1 << 24;

/// Canonical array index form: `"0"`, `"17"`, never `"01"`.
pub fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

/// Looks a property up along the prototype chain.
pub fn find_property(obj: &JsObjectType, key: &str) -> Option<PropertyDescriptor> {
    let mut current = Some(obj.clone());
    let mut depth = 0;
    while let Some(o) = current {
        let o = o.borrow();
        if let Some(p) = o.get_own_property(key) {
            return Some(p);
        }
        depth += 1;
        if depth > 10_000 {
            return None;
        }
        current = o.prototype.clone();
    }
    None
}

/// Data-only chain lookup, usable where no evaluation context is at hand.
pub fn get_data_in_chain(obj: &JsObjectType, key: &str) -> Option<JsValue> {
    match find_property(obj, key)?.value {
        PropertyValue::Data(v) => Some(v),
        PropertyValue::Accessor { .. } => None,
    }
}

/// Own and inherited property names, nearest first, without duplicates.
pub fn property_names_in_chain(obj: &JsObjectType) -> Vec<String> {
    let mut names: IndexSet<String> = IndexSet::new();
    let mut current = Some(obj.clone());
    let mut depth = 0;
    while let Some(o) = current {
        let o = o.borrow();
        for k in o.own_keys(true) {
            names.insert(k);
        }
        depth += 1;
        if depth > 10_000 {
            break;
        }
        current = o.prototype.clone();
    }
    names.into_iter().collect()
}

pub fn same_object(a: &JsObjectType, b: &JsObjectType) -> bool {
    Rc::ptr_eq(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_index_is_canonical() {
        assert_eq!(array_index("0"), Some(0));
        assert_eq!(array_index("42"), Some(42));
        assert_eq!(array_index("042"), None);
        assert_eq!(array_index("-1"), None);
        assert_eq!(array_index("length"), None);
    }

    #[test]
    fn test_array_length_truncates() {
        let mut a = JsObject::new(
            ObjectClass::Array(vec![JsValue::number(1.0), JsValue::number(2.0)]),
            None,
        );
        a.set_own_data("length", JsValue::number(1.0));
        assert_eq!(a.own_keys(false), vec!["0".to_string()]);
        a.set_own_data("3", JsValue::Null);
        assert_eq!(a.get_own_data("length"), Some(JsValue::number(4.0)));
    }

    #[test]
    fn test_chain_lookup_prefers_own_properties() {
        let proto = JsObject::new(ObjectClass::Ordinary, None).into_ref();
        proto
            .borrow_mut()
            .define("greet", PropertyDescriptor::hidden(JsValue::string("proto")));
        let obj = JsObject::new(ObjectClass::Ordinary, Some(proto)).into_ref();
        obj.borrow_mut().set_own_data("own", JsValue::Null);
        assert_eq!(
            get_data_in_chain(&obj, "greet"),
            Some(JsValue::string("proto"))
        );
        assert_eq!(
            property_names_in_chain(&obj),
            vec!["own".to_string(), "greet".to_string()]
        );
    }
}
