//! The interactive layer: deciding when typed lines form a command,
//! completing names, and running commands in order against one shared
//! context.
//!
//! ```text
//! lines ──► multiline::classify ──► finalize ──► compile ──► Scheduler ──► EvalContext
//!                                                                ▲
//! keystrokes ──► completion::complete ──► walk + scope ──────────┘ (read-only)
//! ```

pub mod compile;
pub mod completion;
pub mod config;
pub mod error;
pub mod finalize;
pub mod keywords;
pub mod multiline;
pub mod scheduler;
pub mod scope;
pub mod session;
pub mod walk;

pub use compile::{compile, CommandUnit, CompletionHandle, RunOptions, Runnable};
pub use completion::Completions;
pub use config::{ReplOptions, SHELL_STACK_SIZE};
pub use error::ShellError;
pub use multiline::{classify, Classification};
pub use scheduler::{Scheduler, SchedulerEvent};
pub use session::{HistoryEntry, Session};
