//! Built-in file functions callable as inline commands.

use regex::Regex;

use super::CommandError;
use crate::cancel::CancellationToken;
use crate::source::ItemSource;

/// Separator between matched paths in a function's result.
pub const RESULT_SEPARATOR: &str = ", ";

/// The closed set of inline-command functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFunc {
    /// `regex("<pattern>")`: every eligible item whose full path matches.
    Regex,
}

impl FileFunc {
    pub const ALL: [FileFunc; 1] = [FileFunc::Regex];

    pub fn name(&self) -> &'static str {
        match self {
            FileFunc::Regex => "regex",
        }
    }

    pub fn from_name(name: &str) -> Option<FileFunc> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    pub(crate) async fn execute(
        &self,
        args: &[String],
        source: &dyn ItemSource,
        cancel: &CancellationToken,
    ) -> Result<String, CommandError> {
        match self {
            FileFunc::Regex => {
                let raw = args.first().ok_or_else(|| CommandError::MissingArgument {
                    function: self.name().to_string(),
                    position: 0,
                })?;
                regex_search(unquote(raw), source, cancel).await
            }
        }
    }
}

/// Strip one pair of matching surrounding quotes.
fn unquote(arg: &str) -> &str {
    for q in ['"', '\''] {
        if let Some(inner) = arg.strip_prefix(q).and_then(|a| a.strip_suffix(q)) {
            return inner;
        }
    }
    arg
}

async fn regex_search(
    pattern: &str,
    source: &dyn ItemSource,
    cancel: &CancellationToken,
) -> Result<String, CommandError> {
    // Paths must match as a whole, not just contain a match.
    let re = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
        CommandError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        }
    })?;
    let items = cancel
        .run_until_cancelled(source.enumerate())
        .await
        .ok_or(CommandError::Cancelled)??;
    let matched: Vec<String> = items.into_iter().filter(|i| re.is_match(i)).collect();
    tracing::debug!(pattern, matched = matched.len(), "regex file search");
    Ok(matched.join(RESULT_SEPARATOR))
}
