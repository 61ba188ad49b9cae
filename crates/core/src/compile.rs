//! Document compiler: front matter → symbol table → reference checks.
//!
//! One [`SymbolTable`] lives for exactly one call to [`compile`]; the
//! compiled document only keeps its snapshot.

use std::collections::{BTreeMap, BTreeSet};

use crate::ast::{FrontMatterValue, PatternAction, PatternFun};
use crate::error::CompileError;
use crate::frontmatter::{parse_front_matter, split_document, FrontMatter};
use crate::refs::references;
use crate::symbols::{canonical_name, SymbolTable, VariableInfo, VariableScope, VariableType};

/// Variables provided by the host for every document.
pub const BUILTIN_VARIABLES: [&str; 6] = [
    "input",
    "selection",
    "language",
    "fileName",
    "filePath",
    "frameworkContext",
];

/// A document that passed compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledDocument {
    pub front_matter: FrontMatter,
    pub body: String,
    /// 1-based document line where the body starts.
    pub body_line: u32,
    /// Snapshot of the symbol table at the end of compilation.
    pub symbols: BTreeMap<String, VariableInfo>,
}

/// Compile one document.
///
/// Symbol-table violations stop compilation and are returned with the line
/// of the offending declaration or reference.
#[tracing::instrument(level = "debug", skip_all, fields(len = text.len()))]
pub fn compile(text: &str) -> Result<CompiledDocument, CompileError> {
    let doc = split_document(text)?;
    let front_matter = match doc.header {
        Some(header) => parse_front_matter(header, doc.header_line)?,
        None => FrontMatter::default(),
    };

    let mut table = SymbolTable::new();
    for name in BUILTIN_VARIABLES {
        table
            .add_builtin(name, VariableType::String, 0)
            .map_err(|source| CompileError::Symbol { line: 0, source })?;
    }

    let known = known_names(&front_matter);

    // A declaration may only reference variables declared above it, which
    // is also the order the runner renders them in.
    for decl in &front_matter.variables {
        for text in header_texts(&decl.value) {
            check_references(&table, &known, text, decl.line, false)?;
        }
        table
            .add_variable(
                &decl.name,
                variable_type(&decl.value),
                decl.line,
                VariableScope::UserDefined,
            )
            .map_err(|source| CompileError::Symbol {
                line: decl.line,
                source,
            })?;
    }
    check_references(&table, &known, doc.body, doc.body_line, true)?;

    tracing::debug!(
        variables = front_matter.variables.len(),
        symbols = table.len(),
        "document compiled"
    );
    Ok(CompiledDocument {
        front_matter,
        body: doc.body.to_string(),
        body_line: doc.body_line,
        symbols: table.get_all_variables(),
    })
}

fn variable_type(value: &FrontMatterValue) -> VariableType {
    match value {
        FrontMatterValue::Number(_) => VariableType::Number,
        FrontMatterValue::Boolean(_) => VariableType::Boolean,
        _ => VariableType::String,
    }
}

/// Texts inside a header value that may carry references: plain strings
/// (run as a single prompt), prompt messages and case subjects.
fn header_texts(value: &FrontMatterValue) -> Vec<&str> {
    fn prompts(action: &PatternAction) -> impl Iterator<Item = &str> {
        action.processors().iter().filter_map(|p| match p {
            PatternFun::Prompt { message } => Some(message.as_str()),
            _ => None,
        })
    }

    match value {
        FrontMatterValue::String(s) => vec![s.as_str()],
        FrontMatterValue::Pattern(action) => prompts(action).collect(),
        FrontMatterValue::CaseMatch(cm) => std::iter::once(cm.subject.as_str())
            .chain(cm.cases.values().flat_map(prompts))
            .collect(),
        _ => Vec::new(),
    }
}

/// Canonical names of the builtins plus every variable the header declares.
fn known_names(front_matter: &FrontMatter) -> BTreeSet<String> {
    BUILTIN_VARIABLES
        .iter()
        .map(|name| name.to_string())
        .chain(
            front_matter
                .variables
                .iter()
                .map(|decl| canonical_name(&decl.name).to_string()),
        )
        .collect()
}

/// Every reference in `text` must be in `table`. With `per_line`, reported
/// lines follow the reference inside `text`; otherwise all use `line`.
///
/// A bare braced word (`{it}`) that names nothing in `known` is plain text,
/// not a reference.
fn check_references(
    table: &SymbolTable,
    known: &BTreeSet<String>,
    text: &str,
    line: u32,
    per_line: bool,
) -> Result<(), CompileError> {
    for reference in references(text) {
        if reference.is_bare_braced() && !known.contains(reference.name()) {
            continue;
        }
        if let Err(source) = table.get_variable(&reference.raw) {
            let at = if per_line {
                line + reference.line_offset
            } else {
                line
            };
            return Err(CompileError::Symbol { line: at, source });
        }
    }
    Ok(())
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
