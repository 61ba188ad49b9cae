//! Error-tagged strings surfaced in place of command or pipeline output.
//!
//! A failed inline command or pipeline does not abort the document; its
//! slot receives `<SHIRE_ERROR>: <detail>` instead. The marker prefix is
//! the only signal that a returned string is a failure.

use std::fmt;

/// Fixed marker opening every diagnostic string.
pub const SHIRE_ERROR: &str = "<SHIRE_ERROR>";

/// Render `detail` as a diagnostic string.
pub fn diagnostic(detail: impl fmt::Display) -> String {
    format!("{}: {}", SHIRE_ERROR, detail)
}

/// True when `text` is a diagnostic produced by [`diagnostic`].
pub fn is_diagnostic(text: &str) -> bool {
    text.starts_with(SHIRE_ERROR)
}
