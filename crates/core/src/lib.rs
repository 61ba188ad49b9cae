#![allow(clippy::result_large_err)]
//! shire-core: front-matter model and compiler for Shire scripts.
//!
//! A Shire script is a YAML front-matter header followed by a free-text
//! body. This crate turns that text into a [`CompiledDocument`]:
//!
//! - [`split_document()`] -- cut a script into header and body
//! - [`parse_front_matter()`] -- typed [`FrontMatterValue`]s per key
//! - [`parse_expression()`] -- the `/regex/ { verb | ... }` pattern language
//! - [`SymbolTable`] -- per-document variable declarations
//! - [`compile()`] -- all of the above, plus reference checking
//!
//! Evaluation of pattern pipelines lives in `shire-eval`.

pub mod ast;
pub mod compile;
pub mod error;
pub mod frontmatter;
pub mod lexer;
pub mod parser;
pub mod refs;
pub mod symbols;

// ── Convenience re-exports: key types ────────────────────────────────

pub use ast::{CaseMatch, FrontMatterValue, PatternAction, PatternFun};
pub use error::{CompileError, FrontMatterError};
pub use frontmatter::{ActionLocation, FrontMatter, VariableDecl};
pub use symbols::{
    SymbolError, SymbolTable, VariableInfo, VariableScope, VariableType, VariableUpdate,
};

// ── Convenience re-exports: entry points ─────────────────────────────

pub use compile::{compile, CompiledDocument, BUILTIN_VARIABLES};
pub use frontmatter::{parse_front_matter, split_document};
pub use parser::{parse_expression, MAX_XARGS_VARIABLES};
pub use refs::{interpolate, references};
