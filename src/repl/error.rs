use std::path::PathBuf;

use thiserror::Error;

use crate::parser::static_semantics::ScopeError;
use crate::parser::SyntaxError;
use crate::runner::ds::error::JErrorType;
use crate::runner::eval::jobs::uncaught_message;

/// Everything the shell reports to the user.
#[derive(Debug, Error)]
pub enum ShellError {
    /// Input that does not parse and cannot be completed by more lines.
    #[error("{0}")]
    Syntax(#[from] SyntaxError),
    /// Input that parses but cannot become a runnable command.
    #[error("{0}")]
    Compile(String),
    #[error("{0}")]
    Runtime(JErrorType),
    #[error("Command execution terminated.")]
    Cancelled,
    #[error("Cannot {0} while a command is running")]
    Busy(&'static str),
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<JErrorType> for ShellError {
    fn from(err: JErrorType) -> Self {
        match err {
            JErrorType::Cancelled => ShellError::Cancelled,
            other => ShellError::Runtime(other),
        }
    }
}

impl From<ScopeError> for ShellError {
    fn from(err: ScopeError) -> Self {
        ShellError::Compile(err.to_string())
    }
}

impl ShellError {
    /// The line written to the output for this error.
    pub fn report(&self) -> String {
        match self {
            ShellError::Runtime(e) => uncaught_message(e),
            ShellError::Cancelled => self.to_string(),
            other => format!("Error: {}", other),
        }
    }
}
