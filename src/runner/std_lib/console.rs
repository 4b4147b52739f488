//! Console built-in object.
//!
//! Provides console.log, console.error, console.warn, and console.info methods.
//! Output goes through the context's [`ConsoleSink`] so the shell and tests
//! can capture it.

use std::cell::RefCell;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::value::JsValue;
use crate::runner::inspect::format_log_args;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
}

/// Destination of console output.
pub trait ConsoleSink {
    fn write(&self, level: ConsoleLevel, text: &str);
}

/// Log and info go to stdout, warnings and errors to stderr.
pub struct StdoutConsole;

impl ConsoleSink for StdoutConsole {
    fn write(&self, level: ConsoleLevel, text: &str) {
        match level {
            ConsoleLevel::Log | ConsoleLevel::Info => println!("{}", text),
            ConsoleLevel::Warn | ConsoleLevel::Error => eprintln!("{}", text),
        }
    }
}

/// Keeps every line in memory.
#[derive(Default)]
pub struct BufferedConsole {
    lines: RefCell<Vec<(ConsoleLevel, String)>>,
}

impl BufferedConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(ConsoleLevel, String)> {
        self.lines.borrow().clone()
    }

    /// Text of all lines, in order, regardless of level.
    pub fn text(&self) -> Vec<String> {
        self.lines.borrow().iter().map(|(_, t)| t.to_string()).collect()
    }

    pub fn clear(&self) {
        self.lines.borrow_mut().clear();
    }
}

impl ConsoleSink for BufferedConsole {
    fn write(&self, level: ConsoleLevel, text: &str) {
        self.lines.borrow_mut().push((level, text.to_string()));
    }
}

/// Register the console object with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let console = BuiltInObject::new("console")
        .add_method("log", console_log)
        .add_method("error", console_error)
        .add_method("warn", console_warn)
        .add_method("info", console_info);

    registry.register_object(console);
}

fn write(ctx: &mut EvalContext, level: ConsoleLevel, args: &[JsValue]) -> Result<JsValue, JErrorType> {
    let text = format_log_args(args);
    ctx.console.write(level, &text);
    Ok(JsValue::Undefined)
}

fn console_log(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    write(ctx, ConsoleLevel::Log, &args)
}

fn console_error(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    write(ctx, ConsoleLevel::Error, &args)
}

fn console_warn(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    write(ctx, ConsoleLevel::Warn, &args)
}

fn console_info(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    write(ctx, ConsoleLevel::Info, &args)
}
