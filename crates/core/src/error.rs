use serde::{Deserialize, Serialize};

use crate::symbols::SymbolError;

/// A front-matter or pattern-language error, positioned on a document line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct FrontMatterError {
    /// 1-based document line, 0 when the position is unknown.
    pub line: u32,
    pub message: String,
}

impl FrontMatterError {
    pub fn new(line: u32, message: impl Into<String>) -> Self {
        FrontMatterError {
            line,
            message: message.into(),
        }
    }

    /// Attach a line if none was known yet.
    pub fn at_line(mut self, line: u32) -> Self {
        if self.line == 0 {
            self.line = line;
        }
        self
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "line": self.line,
            "message": self.message,
        })
    }
}

/// Any failure that stops compilation of one document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    FrontMatter(#[from] FrontMatterError),

    #[error("line {line}: {source}")]
    Symbol {
        line: u32,
        #[source]
        source: SymbolError,
    },
}

impl CompileError {
    pub fn line(&self) -> u32 {
        match self {
            CompileError::FrontMatter(e) => e.line,
            CompileError::Symbol { line, .. } => *line,
        }
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "line": self.line(),
            "message": self.to_string(),
        })
    }
}
