//! Pattern pipeline engine.
//!
//! Runs a [`PatternAction`]'s verbs in order over a candidate set. Each verb
//! transforms the running `(candidates, text)` state:
//!
//! - `grep` keeps candidates matching any pattern; text = the survivors
//! - `sort` reorders candidates stably by key; text = the new order
//! - `xargs` hands every candidate to an [`XargsInvoker`]; text = results
//! - `prompt` sets text to its message and leaves candidates alone
//!
//! The text after the last verb is the pipeline's output.

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use shire_core::{PatternAction, PatternFun};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;

use crate::cancel::CancellationToken;

/// Separator between candidates in the text of `grep` and `sort`.
pub const CANDIDATE_SEPARATOR: &str = ", ";

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Failures that abort a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("invalid argument '{argument}' for {verb}: {message}")]
    InvalidArgument {
        verb: String,
        argument: String,
        message: String,
    },

    #[error("pipeline cancelled")]
    Cancelled,
}

/// Failure of one xargs sub-invocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvokeError {
    #[error("cannot resolve '{0}'")]
    Unresolved(String),

    #[error("{0}")]
    Failed(String),
}

/// One xargs item that failed; the batch carried on without it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub item: String,
    pub message: String,
}

/// Result of a completed pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineOutput {
    pub text: String,
    /// Candidate set after the last verb.
    pub candidates: Vec<String>,
    pub failures: Vec<ItemFailure>,
}

impl PipelineOutput {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

// ──────────────────────────────────────────────
// XargsInvoker
// ──────────────────────────────────────────────

/// Nested evaluation triggered once per candidate by `xargs`.
#[async_trait]
pub trait XargsInvoker: Send + Sync {
    /// Evaluate `item` with `bindings` mapping each xargs variable to its
    /// facet of the item.
    async fn invoke(
        &self,
        item: &str,
        bindings: &BTreeMap<String, String>,
    ) -> Result<String, InvokeError>;
}

pub(crate) fn render_bindings(bindings: &BTreeMap<String, String>) -> String {
    bindings
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Facets bound by `xargs`, by variable position: full path, file name,
/// stem, extension, parent directory.
pub fn item_facets(item: &str) -> [String; 5] {
    let path = Path::new(item);
    let lossy = |s: Option<&std::ffi::OsStr>| {
        s.map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    };
    [
        item.to_string(),
        lossy(path.file_name()),
        lossy(path.file_stem()),
        lossy(path.extension()),
        path.parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default(),
    ]
}

// ──────────────────────────────────────────────
// Engine
// ──────────────────────────────────────────────

/// Executes pattern pipelines. Holds no state between runs.
pub struct PipelineEngine<'a> {
    invoker: &'a dyn XargsInvoker,
    cancel: CancellationToken,
}

impl<'a> PipelineEngine<'a> {
    pub fn new(invoker: &'a dyn XargsInvoker) -> Self {
        Self {
            invoker,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run `action`'s verbs over `candidates`.
    #[tracing::instrument(level = "debug", skip_all, fields(pattern = action.pattern(), candidates = candidates.len()))]
    pub async fn run(
        &self,
        action: &PatternAction,
        candidates: Vec<String>,
    ) -> Result<PipelineOutput, PipelineError> {
        let mut out = PipelineOutput {
            text: String::new(),
            candidates,
            failures: Vec::new(),
        };
        for verb in action.processors() {
            if self.cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            match verb {
                PatternFun::Grep { patterns } => {
                    out.candidates = grep(patterns, std::mem::take(&mut out.candidates))?;
                    out.text = out.candidates.join(CANDIDATE_SEPARATOR);
                }
                PatternFun::Sort { arguments } => {
                    sort(arguments, &mut out.candidates)?;
                    out.text = out.candidates.join(CANDIDATE_SEPARATOR);
                }
                PatternFun::Xargs { variables } => {
                    let (text, failures) = self.xargs(variables, &out.candidates).await?;
                    out.text = text;
                    out.failures.extend(failures);
                }
                PatternFun::Prompt { message } => {
                    out.text = message.clone();
                }
            }
            tracing::debug!(verb = verb.verb(), remaining = out.candidates.len(), "verb done");
        }
        Ok(out)
    }

    async fn xargs(
        &self,
        variables: &[String],
        candidates: &[String],
    ) -> Result<(String, Vec<ItemFailure>), PipelineError> {
        let mut results = Vec::new();
        let mut failures = Vec::new();
        for item in candidates {
            if self.cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            let facets = item_facets(item);
            let bindings: BTreeMap<String, String> = variables
                .iter()
                .cloned()
                .zip(facets)
                .collect();
            let invoked = self
                .cancel
                .run_until_cancelled(self.invoker.invoke(item, &bindings))
                .await
                .ok_or(PipelineError::Cancelled)?;
            match invoked {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::warn!(item = %item, error = %e, "xargs item failed");
                    failures.push(ItemFailure {
                        item: item.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }
        Ok((results.join("\n"), failures))
    }
}

/// Candidates whose path contains a match of the action's trigger pattern.
pub fn select_candidates(
    pattern: &str,
    items: &[String],
) -> Result<Vec<String>, PipelineError> {
    let re = compile(pattern)?;
    Ok(items.iter().filter(|i| re.is_match(i)).cloned().collect())
}

fn compile(pattern: &str) -> Result<Regex, PipelineError> {
    Regex::new(pattern).map_err(|e| PipelineError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

// ──────────────────────────────────────────────
// grep
// ──────────────────────────────────────────────

fn grep(patterns: &[String], candidates: Vec<String>) -> Result<Vec<String>, PipelineError> {
    let matchers = patterns
        .iter()
        .map(|p| compile(p))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(candidates
        .into_iter()
        .filter(|c| matchers.iter().any(|m| m.is_match(c)))
        .collect())
}

// ──────────────────────────────────────────────
// sort
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortKey {
    Name,
    Path,
    Extension,
}

impl SortKey {
    fn extract<'s>(&self, item: &'s str) -> &'s str {
        let path = Path::new(item);
        let part = match self {
            SortKey::Path => return item,
            SortKey::Name => path.file_name(),
            SortKey::Extension => path.extension(),
        };
        part.and_then(|s| s.to_str()).unwrap_or("")
    }
}

fn parse_sort_key(argument: &str) -> Result<(SortKey, bool), PipelineError> {
    let (name, descending) = match argument.strip_prefix('-') {
        Some(rest) => (rest, true),
        None => (argument, false),
    };
    let key = match name {
        "name" => SortKey::Name,
        "path" => SortKey::Path,
        "extension" => SortKey::Extension,
        _ => {
            return Err(PipelineError::InvalidArgument {
                verb: "sort".to_string(),
                argument: argument.to_string(),
                message: "expected name, path or extension, optionally prefixed with '-'"
                    .to_string(),
            })
        }
    };
    Ok((key, descending))
}

fn sort(arguments: &[String], candidates: &mut [String]) -> Result<(), PipelineError> {
    let keys = if arguments.is_empty() {
        vec![(SortKey::Path, false)]
    } else {
        arguments
            .iter()
            .map(|a| parse_sort_key(a))
            .collect::<Result<Vec<_>, _>>()?
    };
    candidates.sort_by(|a, b| {
        keys.iter()
            .map(|(key, descending)| {
                let ord = key.extract(a).cmp(key.extract(b));
                if *descending {
                    ord.reverse()
                } else {
                    ord
                }
            })
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
    Ok(())
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
