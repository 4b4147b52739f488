//! Completion records and result aliases shared by the evaluator.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::value::JsValue;

/// How a statement finished. Exceptions travel as `Err(JErrorType)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompletionType {
    Normal,
    Return,
    Break,
    Continue,
}

/// Outcome of one statement: how it finished and the value it produced.
///
/// The value of a command is the value of its last statement that produced
/// one, so `1; var x = 2;` evaluates to `1`.
#[derive(Debug, Clone)]
pub struct Completion {
    pub completion_type: CompletionType,
    pub value: Option<JsValue>,
}

impl Completion {
    pub fn normal() -> Self {
        Completion {
            completion_type: CompletionType::Normal,
            value: None,
        }
    }

    pub fn normal_with_value(value: JsValue) -> Self {
        Completion {
            completion_type: CompletionType::Normal,
            value: Some(value),
        }
    }

    pub fn return_value(value: JsValue) -> Self {
        Completion {
            completion_type: CompletionType::Return,
            value: Some(value),
        }
    }

    pub fn break_completion() -> Self {
        Completion {
            completion_type: CompletionType::Break,
            value: None,
        }
    }

    pub fn continue_completion() -> Self {
        Completion {
            completion_type: CompletionType::Continue,
            value: None,
        }
    }

    pub fn is_abrupt(&self) -> bool {
        self.completion_type != CompletionType::Normal
    }

    pub fn get_value(&self) -> JsValue {
        self.value.clone().unwrap_or(JsValue::Undefined)
    }

    /// Fills in `value` when this completion has none of its own.
    pub fn update_empty(self, value: Option<JsValue>) -> Self {
        if self.value.is_none() {
            Completion { value, ..self }
        } else {
            self
        }
    }
}

/// Where an assignment target lives.
#[derive(Debug, Clone)]
pub enum ReferenceBase {
    /// A property of an object (or of a primitive, for reads).
    Object(JsValue),
    /// A binding resolved through the current scope chain.
    Environment,
}

/// A resolved assignment target.
#[derive(Debug, Clone)]
pub struct Reference {
    pub base: ReferenceBase,
    pub referenced_name: String,
    /// Set for `super.x` references, where reads and writes go to `this`.
    pub this_value: Option<JsValue>,
}

impl Reference {
    pub fn environment(name: impl Into<String>) -> Self {
        Reference {
            base: ReferenceBase::Environment,
            referenced_name: name.into(),
            this_value: None,
        }
    }

    /// The receiver for getters and method calls.
    pub fn get_this_value(&self) -> JsValue {
        if let Some(this) = &self.this_value {
            this.clone()
        } else if let ReferenceBase::Object(base) = &self.base {
            base.clone()
        } else {
            JsValue::Undefined
        }
    }
}

pub type EvalResult = Result<Completion, JErrorType>;

pub type ValueResult = Result<JsValue, JErrorType>;

pub type ReferenceResult = Result<Reference, JErrorType>;
