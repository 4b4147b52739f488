//! An interactive shell session.
//!
//! The session owns the evaluation context, the lines typed so far and the
//! command queue. Lines go in through [`Session::process_line`]; whatever the
//! user should see comes back as output lines. Console output of scripts goes
//! to the context's console sink instead.
//!
//! Timers and promise callbacks only run while the session is ticked, which
//! happens after every accepted command and in [`Session::run_until_idle`].

use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info_span, Span};
use uuid::Uuid;

use crate::parser::{JsParser, ScriptParser};
use crate::repl::compile::compile;
use crate::repl::completion::{self, Completions};
use crate::repl::config::ReplOptions;
use crate::repl::error::ShellError;
use crate::repl::multiline::{classify, Classification};
use crate::repl::scheduler::{Scheduler, SchedulerEvent};
use crate::runner::inspect::inspect;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::EvalContext;
use crate::runner::std_lib::console::{ConsoleSink, StdoutConsole};

/// Longest sleep while waiting for timers.
const POLL_SLICE: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub sequence_id: usize,
    pub raw_text: String,
    pub succeeded: bool,
}

pub struct Session {
    id: Uuid,
    span: Span,
    options: ReplOptions,
    parser: JsParser,
    console: Rc<dyn ConsoleSink>,
    interrupt: Arc<AtomicBool>,
    ctx: EvalContext,
    buffer: Vec<String>,
    scheduler: Scheduler,
    /// Sequence ids of queued and running commands, oldest first.
    running: VecDeque<usize>,
    history: Vec<HistoryEntry>,
    next_sequence_id: usize,
    last_failed: bool,
}

fn new_context(
    options: &ReplOptions,
    console: Rc<dyn ConsoleSink>,
    interrupt: Arc<AtomicBool>,
) -> EvalContext {
    let mut ctx = EvalContext::new()
        .with_console(console)
        .with_interrupt(interrupt);
    if options.builtins {
        ctx.install_core_builtins(BuiltInRegistry::with_core());
    }
    ctx
}

impl Session {
    pub fn new(options: ReplOptions) -> Self {
        Self::with_console(options, Rc::new(StdoutConsole))
    }

    pub fn with_console(options: ReplOptions, console: Rc<dyn ConsoleSink>) -> Self {
        let id = Uuid::new_v4();
        let span = info_span!("session", %id);
        let interrupt = Arc::new(AtomicBool::new(false));
        let ctx = new_context(&options, console.clone(), interrupt.clone());
        debug!(parent: &span, "session started");
        Session {
            id,
            span,
            scheduler: Scheduler::new(options.timeout),
            options,
            parser: JsParser::new(),
            console,
            interrupt,
            ctx,
            buffer: vec![],
            running: VecDeque::new(),
            history: vec![],
            next_sequence_id: 1,
            last_failed: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn options(&self) -> &ReplOptions {
        &self.options
    }

    pub fn context(&mut self) -> &mut EvalContext {
        &mut self.ctx
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Flag that cancels the running command when raised from any thread.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.scheduler.is_busy()
    }

    /// Whether the last command, or the last rejected input, failed.
    pub fn last_failed(&self) -> bool {
        self.last_failed
    }

    /// Whether lines of an unfinished command are buffered.
    pub fn is_continuing(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn prompt(&self) -> String {
        if self.buffer.is_empty() {
            self.options.input_prompt_for(self.next_sequence_id)
        } else {
            self.options.continuation_prompt_for(self.next_sequence_id)
        }
    }

    /// Adds one line of input. Once the buffered lines form a command it is
    /// queued and run.
    pub fn process_line(&mut self, line: &str) -> Vec<String> {
        let span = self.span.clone();
        let _entered = span.enter();
        self.buffer.push(line.to_string());
        let failure = match classify(&self.buffer, &self.parser) {
            Classification::Incomplete => {
                debug!(lines = self.buffer.len(), "waiting for more input");
                return vec![];
            }
            Classification::Complete(finalized) => {
                self.buffer.clear();
                if finalized.program.body.is_empty() {
                    return vec![];
                }
                let sequence_id = self.take_sequence_id();
                let unit = compile(finalized);
                self.running.push_back(sequence_id);
                self.scheduler.enqueue(unit);
                self.scheduler.drain(&mut self.ctx);
                return self.collect_output();
            }
            Classification::SyntaxError(e) => ShellError::Syntax(e),
            Classification::CompileError(message) => ShellError::Compile(message),
        };
        let raw_text = self.buffer.join("\n");
        self.buffer.clear();
        let sequence_id = self.take_sequence_id();
        self.history.push(HistoryEntry {
            sequence_id,
            raw_text,
            succeeded: false,
        });
        self.last_failed = true;
        vec![failure.report()]
    }

    fn take_sequence_id(&mut self) -> usize {
        let id = self.next_sequence_id;
        self.next_sequence_id += 1;
        id
    }

    fn collect_output(&mut self) -> Vec<String> {
        let mut output = vec![];
        for event in self.scheduler.take_events() {
            match event {
                SchedulerEvent::Echo(value) => {
                    let id = self.running.front().copied().unwrap_or(0);
                    output.push(format!(
                        "{}{}",
                        self.options.output_prompt_for(id),
                        inspect(&value)
                    ));
                }
                SchedulerEvent::Command { raw_text, success } => {
                    let sequence_id = self.running.pop_front().unwrap_or(0);
                    self.history.push(HistoryEntry {
                        sequence_id,
                        raw_text,
                        succeeded: success,
                    });
                    self.last_failed = !success;
                    if !success {
                        self.running.clear();
                    }
                }
                SchedulerEvent::Error(e) => output.push(e.report()),
                SchedulerEvent::Drained => debug!("queue drained"),
            }
        }
        output
    }

    /// One turn of the event loop.
    pub fn tick(&mut self) -> Vec<String> {
        let span = self.span.clone();
        let _entered = span.enter();
        self.scheduler.tick(&mut self.ctx);
        self.collect_output()
    }

    /// Ticks until no command runs and no timer or microtask is left.
    pub fn run_until_idle(&mut self) -> Vec<String> {
        let mut output = vec![];
        loop {
            output.extend(self.tick());
            if !self.scheduler.is_busy() && self.ctx.jobs.is_idle() {
                return output;
            }
            self.pause();
        }
    }

    /// Ticks until the running command, if any, has finished.
    pub fn wait_for_command(&mut self) -> Vec<String> {
        let mut output = self.tick();
        while self.scheduler.is_busy() {
            self.pause();
            output.extend(self.tick());
        }
        output
    }

    fn pause(&self) {
        let wait = match self.ctx.jobs.next_timer_due() {
            _ if self.ctx.jobs.has_pending_microtasks() => Duration::ZERO,
            Some(due) => due.saturating_duration_since(Instant::now()).min(POLL_SLICE),
            None => POLL_SLICE,
        };
        if !wait.is_zero() {
            thread::sleep(wait);
        }
    }

    /// Ctrl-C: cancels the running command, or else throws away the
    /// unfinished command and anything queued.
    pub fn interrupt(&mut self) -> Vec<String> {
        let span = self.span.clone();
        let _entered = span.enter();
        if self.scheduler.interrupt(&mut self.ctx) {
            debug!("cancelling running command");
            return self.tick();
        }
        self.buffer.clear();
        self.scheduler.clear();
        self.running.clear();
        vec![]
    }

    /// Feeds a file through the session line by line, waiting for each
    /// command to finish. Stops at the first failing command.
    pub fn load(&mut self, path: &Path) -> Result<Vec<String>, ShellError> {
        let source = fs::read_to_string(path).map_err(|source| ShellError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(parent: &self.span, path = %path.display(), "loading file");
        let mut output = vec![];
        self.last_failed = false;
        for line in source.lines() {
            output.extend(self.process_line(line));
            output.extend(self.wait_for_command());
            if self.last_failed {
                return Ok(output);
            }
        }
        if !self.buffer.is_empty() {
            let text = self.buffer.join("\n");
            self.buffer.clear();
            if let Err(e) = self.parser.parse_strict(&text) {
                self.last_failed = true;
                output.push(ShellError::Syntax(e).report());
            }
        }
        Ok(output)
    }

    /// Writes the text of every successful command to `path`.
    pub fn save(&self, path: &Path) -> Result<(), ShellError> {
        let mut text = String::new();
        for entry in self.history.iter().filter(|e| e.succeeded) {
            text.push_str(&entry.raw_text);
            text.push('\n');
        }
        fs::write(path, text).map_err(|source| ShellError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Starts over with a fresh context. Refused while a command runs.
    pub fn reset(&mut self) -> Result<(), ShellError> {
        if self.scheduler.is_busy() {
            return Err(ShellError::Busy("reset"));
        }
        debug!(parent: &self.span, "resetting session");
        self.ctx = new_context(&self.options, self.console.clone(), self.interrupt.clone());
        self.scheduler = Scheduler::new(self.options.timeout);
        self.buffer.clear();
        self.running.clear();
        self.history.clear();
        self.next_sequence_id = 1;
        self.last_failed = false;
        Ok(())
    }

    /// Completes `line` at byte offset `cursor`, taking buffered lines of an
    /// unfinished command into account.
    pub fn complete(&mut self, line: &str, cursor: usize) -> Completions {
        let span = self.span.clone();
        let _entered = span.enter();
        let mut text = String::new();
        for buffered in &self.buffer {
            text.push_str(buffered);
            text.push('\n');
        }
        let offset = text.len();
        text.push_str(line);
        let cursor = offset + cursor.min(line.len());
        let found = self.complete_text(&text, cursor);
        if found.is_empty() {
            if let Some(fallback) = self.complete_on_prototype(&text[..cursor]) {
                return fallback;
            }
        }
        found
    }

    fn complete_text(&mut self, text: &str, cursor: usize) -> Completions {
        completion::complete(
            text,
            cursor,
            &mut self.ctx,
            &self.parser,
            self.options.completion_timeout,
        )
    }

    /// `Map.ge` finds nothing on the constructor itself; try its prototype.
    fn complete_on_prototype(&mut self, text: &str) -> Option<Completions> {
        let dot = text.rfind('.')?;
        let (object, prefix) = (&text[..dot], &text[dot + 1..]);
        let is_name = |s: &str| s.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$');
        if object.is_empty() || object.ends_with('.') || !is_name(prefix) {
            return None;
        }
        let retry = format!("{}.prototype.{}", object, prefix);
        let found = self.complete_text(&retry, retry.len());
        if found.is_empty() {
            None
        } else {
            Some(found)
        }
    }

    /// Text that every candidate continues with beyond what was typed.
    pub fn preview(&mut self, line: &str, cursor: usize) -> Option<String> {
        let found = self.complete(line, cursor);
        let common = longest_common_prefix(&found.candidates)?;
        let rest = common.strip_prefix(found.filter.as_str())?;
        if rest.is_empty() {
            None
        } else {
            Some(rest.to_string())
        }
    }
}

fn longest_common_prefix(candidates: &[String]) -> Option<String> {
    let (first, rest) = candidates.split_first()?;
    let mut end = first.len();
    for other in rest {
        end = first
            .char_indices()
            .zip(other.chars())
            .take_while(|((_, a), b)| a == b)
            .last()
            .map_or(0, |((i, a), _)| i + a.len_utf8())
            .min(end);
    }
    Some(first[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_common_prefix() {
        let names = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(
            longest_common_prefix(&names(&["parseInt", "parseFloat"])).as_deref(),
            Some("parse")
        );
        assert_eq!(longest_common_prefix(&names(&["Math"])).as_deref(), Some("Math"));
        assert_eq!(longest_common_prefix(&names(&["a", "b"])).as_deref(), Some(""));
        assert_eq!(longest_common_prefix(&[]), None);
    }
}
