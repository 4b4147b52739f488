use thiserror::Error;

use crate::runner::ds::value::JsValue;

/// Runtime failures. The first four are raised by the engine itself and
/// become script-visible error objects when caught; `Thrown` carries any
/// value a script threw. `Timeout` and `Cancelled` cannot be caught.
#[derive(Debug, Clone, Error)]
pub enum JErrorType {
    #[error("ReferenceError: {0}")]
    ReferenceError(String),
    #[error("TypeError: {0}")]
    TypeError(String),
    #[error("RangeError: {0}")]
    RangeError(String),
    #[error("SyntaxError: {0}")]
    SyntaxError(String),
    #[error("Uncaught {}", describe_thrown(.0))]
    Thrown(JsValue),
    #[error("Script execution timed out")]
    Timeout,
    #[error("Command execution terminated.")]
    Cancelled,
}

impl JErrorType {
    pub fn type_error(message: impl Into<String>) -> Self {
        JErrorType::TypeError(message.into())
    }

    pub fn reference_error(message: impl Into<String>) -> Self {
        JErrorType::ReferenceError(message.into())
    }

    /// Errors that unwind through `catch` blocks and promise handlers.
    pub fn is_catchable(&self) -> bool {
        !matches!(self, JErrorType::Timeout | JErrorType::Cancelled)
    }

    /// Constructor name for engine-raised errors.
    pub fn error_name(&self) -> Option<&'static str> {
        match self {
            JErrorType::ReferenceError(_) => Some("ReferenceError"),
            JErrorType::TypeError(_) => Some("TypeError"),
            JErrorType::RangeError(_) => Some("RangeError"),
            JErrorType::SyntaxError(_) => Some("SyntaxError"),
            _ => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            JErrorType::ReferenceError(m)
            | JErrorType::TypeError(m)
            | JErrorType::RangeError(m)
            | JErrorType::SyntaxError(m) => m.to_string(),
            other => other.to_string(),
        }
    }
}

fn describe_thrown(value: &JsValue) -> String {
    use crate::runner::ds::object::{get_data_in_chain, ObjectClass};
    if let JsValue::Object(o) = value {
        if let ObjectClass::Error = o.borrow().class {
            let name = get_data_in_chain(o, "name")
                .map(|v| v.to_string())
                .unwrap_or_else(|| "Error".to_string());
            let message = get_data_in_chain(o, "message")
                .map(|v| v.to_string())
                .unwrap_or_default();
            return if message.is_empty() {
                name
            } else {
                format!("{}: {}", name, message)
            };
        }
    }
    match value {
        JsValue::String(s) => format!("{:?}", s),
        other => other.to_string(),
    }
}
