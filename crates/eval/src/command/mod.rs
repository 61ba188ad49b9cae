//! Inline command dispatcher.
//!
//! An inline command is a call expression `name(arg, arg, ...)` embedded in
//! document text, for example `regex(".*\.kt")`. The name selects one of the
//! built-in [`FileFunc`]s; the result replaces the command in the text.
//!
//! [`CommandDispatcher::execute`] never fails: every error comes back as a
//! diagnostic string (see [`crate::diagnostic`]).

pub mod file_func;

pub use file_func::FileFunc;

use regex::Regex;
use std::sync::{Arc, LazyLock};

use crate::cancel::CancellationToken;
use crate::diagnostic::diagnostic;
use crate::source::{ItemSource, SourceError};

/// Example shown when a command does not parse.
pub const CALL_EXAMPLE: &str = r#"regex(".*\.kt")"#;

static CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)\(([^)]*)\)").expect("static call regex"));

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Malformed command: '{text}', expected a call like {}", CALL_EXAMPLE)]
    MalformedCommand { text: String },

    #[error("Unknown function: {name}")]
    UnknownFunction { name: String },

    #[error("Missing argument {position} for {function}")]
    MissingArgument { function: String, position: usize },

    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Command cancelled")]
    Cancelled,
}

// ──────────────────────────────────────────────
// Call syntax
// ──────────────────────────────────────────────

/// A parsed call expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub name: String,
    /// Arguments as written, each trimmed of surrounding whitespace.
    pub args: Vec<String>,
}

/// Find the first call expression in `text`.
///
/// Arguments are split on every `,`; a comma inside a quoted argument is
/// not distinguished from a separator.
pub fn parse_call(text: &str) -> Result<Call, CommandError> {
    let caps = CALL_RE
        .captures(text)
        .ok_or_else(|| CommandError::MalformedCommand {
            text: text.to_string(),
        })?;
    let raw_args = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    let args = if raw_args.trim().is_empty() {
        Vec::new()
    } else {
        raw_args.split(',').map(|a| a.trim().to_string()).collect()
    };
    Ok(Call {
        name: caps[1].to_string(),
        args,
    })
}

// ──────────────────────────────────────────────
// Dispatcher
// ──────────────────────────────────────────────

/// Resolves inline commands against the built-in functions.
///
/// Each execution enumerates the item source afresh and keeps its own
/// working list.
#[derive(Clone)]
pub struct CommandDispatcher {
    source: Arc<dyn ItemSource>,
    cancel: CancellationToken,
}

impl CommandDispatcher {
    pub fn new(source: Arc<dyn ItemSource>) -> Self {
        Self {
            source,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Execute `text`, returning the result or a diagnostic string.
    pub async fn execute(&self, text: &str) -> String {
        match self.try_execute(text).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(command = %text, error = %e, "inline command failed");
                diagnostic(e)
            }
        }
    }

    /// Execute `text`, keeping failures structured.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn try_execute(&self, text: &str) -> Result<String, CommandError> {
        let call = parse_call(text)?;
        let func = FileFunc::from_name(&call.name).ok_or_else(|| CommandError::UnknownFunction {
            name: call.name.clone(),
        })?;
        func.execute(&call.args, self.source.as_ref(), &self.cancel)
            .await
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
