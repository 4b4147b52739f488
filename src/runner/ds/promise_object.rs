use crate::runner::ds::value::{JsObjectType, JsValue};

#[derive(Clone)]
pub enum PromiseState {
    Pending,
    Fulfilled(JsValue),
    Rejected(JsValue),
}

impl PromiseState {
    pub fn is_pending(&self) -> bool {
        matches!(self, PromiseState::Pending)
    }
}

/// A `then` registration waiting for the promise to settle.
#[derive(Clone)]
pub struct PromiseReaction {
    pub on_fulfilled: Option<JsValue>,
    pub on_rejected: Option<JsValue>,
    /// Promise returned by `then`, settled with the handler's outcome.
    pub derived: Option<JsObjectType>,
}

pub struct PromiseData {
    pub state: PromiseState,
    pub reactions: Vec<PromiseReaction>,
    /// Set once a rejection handler is attached, so unhandled rejections
    /// can be reported.
    pub handled: bool,
}

impl PromiseData {
    pub fn new() -> Self {
        PromiseData {
            state: PromiseState::Pending,
            reactions: vec![],
            handled: false,
        }
    }
}

impl Default for PromiseData {
    fn default() -> Self {
        Self::new()
    }
}
