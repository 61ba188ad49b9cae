//! Front-matter value model shared by the compiler and the evaluator.
//!
//! Values are built once while the document header is parsed and are
//! read-only afterwards. Every transformation (for example prompt
//! interpolation before a run) produces a new value.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::FrontMatterError;

// ──────────────────────────────────────────────
// FrontMatterValue
// ──────────────────────────────────────────────

/// A typed front-matter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FrontMatterValue {
    String(String),
    Number(i64),
    /// Calendar date kept in its `YYYY-MM-DD` source form.
    Date(String),
    Boolean(bool),
    Array(Vec<FrontMatterValue>),
    Object(BTreeMap<String, FrontMatterValue>),
    Pattern(PatternAction),
    CaseMatch(CaseMatch),
}

impl FrontMatterValue {
    /// Returns a human-readable kind name for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FrontMatterValue::String(_) => "string",
            FrontMatterValue::Number(_) => "number",
            FrontMatterValue::Date(_) => "date",
            FrontMatterValue::Boolean(_) => "boolean",
            FrontMatterValue::Array(_) => "array",
            FrontMatterValue::Object(_) => "object",
            FrontMatterValue::Pattern(_) => "pattern",
            FrontMatterValue::CaseMatch(_) => "case match",
        }
    }
}

// ──────────────────────────────────────────────
// Pattern actions
// ──────────────────────────────────────────────

/// A trigger pattern paired with the verb pipeline it runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternAction {
    pattern: String,
    processors: Vec<PatternFun>,
}

impl PatternAction {
    /// Build an action. An empty pipeline is rejected.
    pub fn new(
        pattern: impl Into<String>,
        processors: Vec<PatternFun>,
    ) -> Result<Self, FrontMatterError> {
        let pattern = pattern.into();
        if processors.is_empty() {
            return Err(FrontMatterError::new(
                0,
                format!("pattern action '/{}/' has an empty pipeline", pattern),
            ));
        }
        Ok(PatternAction {
            pattern,
            processors,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn processors(&self) -> &[PatternFun] {
        &self.processors
    }

    /// Return a copy with every processor passed through `f`.
    pub fn map_processors(&self, f: impl Fn(&PatternFun) -> PatternFun) -> PatternAction {
        PatternAction {
            pattern: self.pattern.clone(),
            processors: self.processors.iter().map(f).collect(),
        }
    }
}

/// One pipeline verb with its own argument payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verb", rename_all = "lowercase")]
pub enum PatternFun {
    Prompt { message: String },
    Grep { patterns: Vec<String> },
    Sort { arguments: Vec<String> },
    Xargs { variables: Vec<String> },
}

impl PatternFun {
    /// The verb keyword for this variant. Fixed per variant.
    pub fn verb(&self) -> &'static str {
        match self {
            PatternFun::Prompt { .. } => "prompt",
            PatternFun::Grep { .. } => "grep",
            PatternFun::Sort { .. } => "sort",
            PatternFun::Xargs { .. } => "xargs",
        }
    }

    /// Derive a pipeline from a front-matter value.
    ///
    /// A string becomes a single `prompt`, a pattern yields its processors,
    /// anything else cannot be run.
    pub fn from_value(value: &FrontMatterValue) -> Result<Vec<PatternFun>, FrontMatterError> {
        match value {
            FrontMatterValue::String(s) => Ok(vec![PatternFun::Prompt { message: s.clone() }]),
            FrontMatterValue::Pattern(action) => Ok(action.processors().to_vec()),
            other => Err(FrontMatterError::new(
                0,
                format!("unknown pattern processor type: {}", other.kind_name()),
            )),
        }
    }
}

impl fmt::Display for PatternFun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args = match self {
            PatternFun::Prompt { message } => std::slice::from_ref(message),
            PatternFun::Grep { patterns } => patterns.as_slice(),
            PatternFun::Sort { arguments } => arguments.as_slice(),
            PatternFun::Xargs { variables } => variables.as_slice(),
        };
        if args.is_empty() {
            return write!(f, "{}", self.verb());
        }
        let quoted: Vec<String> = args.iter().map(|a| format!("{:?}", a)).collect();
        write!(f, "{}({})", self.verb(), quoted.join(", "))
    }
}

// ──────────────────────────────────────────────
// Case match
// ──────────────────────────────────────────────

/// A dispatch table keyed by a runtime-observed string.
///
/// `subject` is the expression whose runtime value selects the case
/// (for example `$language`). At most one key matches since keys are unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseMatch {
    pub subject: String,
    pub cases: BTreeMap<String, PatternAction>,
}

impl CaseMatch {
    /// Select the action for an observed value. `None` when no key matches.
    pub fn select(&self, observed: &str) -> Option<&PatternAction> {
        self.cases.get(observed)
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
