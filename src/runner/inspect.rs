//! Node `util.inspect`-style rendering of values for echo and `console.log`.
//!
//! Rendering never runs script code: accessors print as `[Getter]`/`[Setter]`
//! and nothing is converted through `toString`.

use std::rc::Rc;

use crate::runner::ds::object::{get_data_in_chain, ObjectClass, PropertyValue};
use crate::runner::ds::promise_object::PromiseState;
use crate::runner::ds::value::{format_number, JsNumberType, JsObjectType, JsValue};

/// Nesting below this depth prints as `[Object]` / `[Array]`.
const MAX_DEPTH: usize = 2;
/// Single-line renderings longer than this break one entry per line.
const BREAK_LENGTH: usize = 72;

pub fn inspect(value: &JsValue) -> String {
    let mut seen = vec![];
    render(value, 0, &mut seen)
}

/// `console.log` formatting: top-level strings print raw.
pub fn format_log_args(args: &[JsValue]) -> String {
    args.iter()
        .map(|a| match a {
            JsValue::String(s) => s.to_string(),
            other => inspect(other),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn quote_string(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

fn render_number(n: &JsNumberType) -> String {
    match n {
        JsNumberType::Float(f) if *f == 0.0 && f.is_sign_negative() => "-0".to_string(),
        JsNumberType::Float(f) => format_number(*f),
        other => other.to_string(),
    }
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

fn render_key(key: &str) -> String {
    if is_identifier(key) {
        key.to_string()
    } else {
        quote_string(key)
    }
}

fn render(value: &JsValue, depth: usize, seen: &mut Vec<JsObjectType>) -> String {
    match value {
        JsValue::Undefined => "undefined".to_string(),
        JsValue::Null => "null".to_string(),
        JsValue::Boolean(b) => b.to_string(),
        JsValue::Number(n) => render_number(n),
        JsValue::String(s) => quote_string(s),
        JsValue::Object(o) => {
            if seen.iter().any(|s| Rc::ptr_eq(s, o)) {
                return "[Circular]".to_string();
            }
            seen.push(o.clone());
            let out = render_object(o, depth, seen);
            seen.pop();
            out
        }
    }
}

fn function_label(o: &JsObjectType) -> String {
    let b = o.borrow();
    let f = match b.as_function() {
        Some(f) => f,
        None => return "[Function]".to_string(),
    };
    if f.is_class() {
        let parent = match &f.kind {
            crate::runner::ds::function_object::FunctionKind::Class(c) => c
                .parent
                .as_ref()
                .and_then(|p| p.borrow().as_function().map(|pf| pf.name.to_string())),
            _ => None,
        };
        let name = match f.name.as_str() {
            "" => "(anonymous)",
            n => n,
        };
        return match parent {
            Some(p) if !p.is_empty() => format!("[class {} extends {}]", name, p),
            _ => format!("[class {}]", name),
        };
    }
    if f.name.is_empty() {
        "[Function (anonymous)]".to_string()
    } else {
        format!("[Function: {}]", f.name)
    }
}

/// Name of the constructor an ordinary object was made by, when it is not
/// plain `Object`.
fn constructor_prefix(o: &JsObjectType) -> Option<String> {
    let proto = o.borrow().prototype.clone()?;
    let ctor = get_data_in_chain(&proto, "constructor")?;
    let name = ctor.as_object()?.borrow().as_function()?.name.to_string();
    if name.is_empty() || name == "Object" {
        None
    } else {
        Some(name)
    }
}

fn own_entries(o: &JsObjectType, depth: usize, seen: &mut Vec<JsObjectType>) -> Vec<String> {
    let props: Vec<(String, PropertyValue)> = o
        .borrow()
        .properties
        .iter()
        .filter(|(_, d)| d.enumerable)
        .map(|(k, d)| (k.to_string(), d.value.clone()))
        .collect();
    props
        .into_iter()
        .map(|(k, v)| {
            let rendered = match v {
                PropertyValue::Data(v) => render(&v, depth + 1, seen),
                PropertyValue::Accessor { get, set } => match (get.is_some(), set.is_some()) {
                    (true, true) => "[Getter/Setter]".to_string(),
                    (true, false) => "[Getter]".to_string(),
                    _ => "[Setter]".to_string(),
                },
            };
            format!("{}: {}", render_key(&k), rendered)
        })
        .collect()
}

fn wrap(prefix: &str, open: &str, close: &str, entries: Vec<String>, depth: usize) -> String {
    if entries.is_empty() {
        return format!("{}{}{}", prefix, open, close);
    }
    let single = format!("{}{} {} {}", prefix, open, entries.join(", "), close);
    if single.len() <= BREAK_LENGTH && !single.contains('\n') {
        return single;
    }
    let indent = "  ".repeat(depth + 1);
    let closing_indent = "  ".repeat(depth);
    format!(
        "{}{}\n{}{}\n{}{}",
        prefix,
        open,
        indent,
        entries.join(&format!(",\n{}", indent)),
        closing_indent,
        close
    )
}

fn render_object(o: &JsObjectType, depth: usize, seen: &mut Vec<JsObjectType>) -> String {
    enum Shape {
        Function,
        Array(Vec<JsValue>),
        Error,
        Promise(PromiseState),
        Map(Vec<(JsValue, JsValue)>),
        Ordinary,
    }
    let shape = match &o.borrow().class {
        ObjectClass::Function(_) => Shape::Function,
        ObjectClass::Array(elements) => Shape::Array(elements.clone()),
        ObjectClass::Error => Shape::Error,
        ObjectClass::Promise(p) => Shape::Promise(p.state.clone()),
        ObjectClass::Map(entries) => Shape::Map(entries.clone()),
        ObjectClass::Ordinary => Shape::Ordinary,
    };
    match shape {
        Shape::Function => function_label(o),
        Shape::Error => {
            let name = get_data_in_chain(o, "name")
                .map(|v| v.to_string())
                .unwrap_or_else(|| "Error".to_string());
            let message = get_data_in_chain(o, "message")
                .map(|v| v.to_string())
                .unwrap_or_default();
            if message.is_empty() {
                name
            } else {
                format!("{}: {}", name, message)
            }
        }
        Shape::Array(elements) => {
            if depth > MAX_DEPTH {
                return "[Array]".to_string();
            }
            let mut entries: Vec<String> = elements
                .iter()
                .map(|e| render(e, depth + 1, seen))
                .collect();
            entries.extend(own_entries(o, depth, seen));
            wrap("", "[", "]", entries, depth)
        }
        Shape::Map(pairs) => {
            let prefix = format!("Map({}) ", pairs.len());
            if depth > MAX_DEPTH {
                return "[Map]".to_string();
            }
            let entries = pairs
                .iter()
                .map(|(k, v)| {
                    format!("{} => {}", render(k, depth + 1, seen), render(v, depth + 1, seen))
                })
                .collect();
            wrap(&prefix, "{", "}", entries, depth)
        }
        Shape::Promise(state) => {
            let inner = match state {
                PromiseState::Pending => "<pending>".to_string(),
                PromiseState::Fulfilled(v) => render(&v, depth + 1, seen),
                PromiseState::Rejected(v) => format!("<rejected> {}", render(&v, depth + 1, seen)),
            };
            format!("Promise {{ {} }}", inner)
        }
        Shape::Ordinary => {
            let name = constructor_prefix(o);
            if depth > MAX_DEPTH {
                return format!("[{}]", name.as_deref().unwrap_or("Object"));
            }
            let prefix = name.map(|n| format!("{} ", n)).unwrap_or_default();
            let entries = own_entries(o, depth, seen);
            wrap(&prefix, "{", "}", entries, depth)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ds::object::{JsObject, PropertyDescriptor};

    fn object(pairs: Vec<(&str, JsValue)>) -> JsValue {
        let mut o = JsObject::new(ObjectClass::Ordinary, None);
        for (k, v) in pairs {
            o.define(k, PropertyDescriptor::data(v));
        }
        JsValue::Object(o.into_ref())
    }

    fn array(values: Vec<JsValue>) -> JsValue {
        JsValue::Object(JsObject::new(ObjectClass::Array(values), None).into_ref())
    }

    #[test]
    fn test_primitives() {
        assert_eq!(inspect(&JsValue::string("hi")), "'hi'");
        assert_eq!(inspect(&JsValue::string("it's")), "\"it's\"");
        assert_eq!(inspect(&JsValue::number(-0.0)), "-0");
        assert_eq!(inspect(&JsValue::number(1.5)), "1.5");
        assert_eq!(inspect(&JsValue::Undefined), "undefined");
    }

    #[test]
    fn test_collections() {
        assert_eq!(
            inspect(&array(vec![JsValue::number(1.0), JsValue::number(2.0)])),
            "[ 1, 2 ]"
        );
        assert_eq!(inspect(&array(vec![])), "[]");
        assert_eq!(
            inspect(&object(vec![("a", JsValue::number(1.0)), ("b-c", JsValue::Null)])),
            "{ a: 1, 'b-c': null }"
        );
    }

    #[test]
    fn test_depth_limit_and_circular() {
        let deep = object(vec![(
            "a",
            object(vec![("b", object(vec![("c", object(vec![("d", JsValue::Null)]))]))]),
        )]);
        assert_eq!(inspect(&deep), "{ a: { b: { c: [Object] } } }");

        let o = object(vec![]);
        if let JsValue::Object(inner) = &o {
            inner
                .borrow_mut()
                .define("self", PropertyDescriptor::data(o.clone()));
        }
        assert_eq!(inspect(&o), "{ self: [Circular] }");
    }

    #[test]
    fn test_long_entries_break_lines() {
        let values = (0..30).map(|i| JsValue::number(i as f64 * 1000.0)).collect();
        let rendered = inspect(&array(values));
        assert!(rendered.starts_with("[\n  0,\n  1000,"));
        assert!(rendered.ends_with("\n]"));
    }
}
