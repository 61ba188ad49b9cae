//! Per-document symbol table for variable declarations.
//!
//! Built-in and user-declared variables share one namespace and are told
//! apart by [`VariableScope`]. Names are canonicalized before every
//! operation: one pair of enclosing braces is stripped, then a leading
//! `context.` qualifier (`{context.x}` → `x`).

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VariableType {
    String,
    Boolean,
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VariableScope {
    BuiltIn,
    UserDefined,
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for VariableScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VariableInfo {
    #[serde(rename = "type")]
    pub var_type: VariableType,
    pub scope: VariableScope,
    pub line_declared: u32,
}

/// Partial update for [`SymbolTable::update_variable`]. Unset fields keep
/// their stored value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VariableUpdate {
    pub var_type: Option<VariableType>,
    pub scope: Option<VariableScope>,
    pub line_declared: Option<u32>,
}

impl VariableUpdate {
    pub fn var_type(mut self, var_type: VariableType) -> Self {
        self.var_type = Some(var_type);
        self
    }

    pub fn scope(mut self, scope: VariableScope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn line_declared(mut self, line: u32) -> Self {
        self.line_declared = Some(line);
        self
    }

    /// Merge onto an existing entry, producing a new one.
    fn apply(&self, info: &VariableInfo) -> VariableInfo {
        VariableInfo {
            var_type: self.var_type.unwrap_or(info.var_type),
            scope: self.scope.unwrap_or(info.scope),
            line_declared: self.line_declared.unwrap_or(info.line_declared),
        }
    }
}

/// Symbol-table invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbolError {
    #[error("variable '{name}' already declared ({scope}, line {first_line})")]
    DuplicateDeclaration {
        name: String,
        scope: VariableScope,
        first_line: u32,
    },

    #[error("variable '{name}' not found")]
    UndeclaredVariable { name: String },
}

/// Strip one pair of enclosing braces, then a leading `context.`.
pub fn canonical_name(name: &str) -> &str {
    let name = name
        .strip_prefix('{')
        .and_then(|n| n.strip_suffix('}'))
        .unwrap_or(name);
    name.strip_prefix("context.").unwrap_or(name)
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    table: BTreeMap<String, VariableInfo>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a variable. Fails if the canonical name is already present;
    /// the table is left unchanged in that case.
    pub fn add_variable(
        &mut self,
        name: &str,
        var_type: VariableType,
        line_declared: u32,
        scope: VariableScope,
    ) -> Result<(), SymbolError> {
        let key = canonical_name(name);
        if let Some(first) = self.table.get(key) {
            return Err(SymbolError::DuplicateDeclaration {
                name: key.to_string(),
                scope: first.scope,
                first_line: first.line_declared,
            });
        }
        tracing::trace!(name = key, %var_type, %scope, line_declared, "declare variable");
        self.table.insert(
            key.to_string(),
            VariableInfo {
                var_type,
                scope,
                line_declared,
            },
        );
        Ok(())
    }

    /// Declare a framework-provided variable.
    pub fn add_builtin(
        &mut self,
        name: &str,
        var_type: VariableType,
        line_declared: u32,
    ) -> Result<(), SymbolError> {
        self.add_variable(name, var_type, line_declared, VariableScope::BuiltIn)
    }

    pub fn get_variable(&self, name: &str) -> Result<VariableInfo, SymbolError> {
        let key = canonical_name(name);
        self.table
            .get(key)
            .copied()
            .ok_or_else(|| SymbolError::UndeclaredVariable {
                name: key.to_string(),
            })
    }

    pub fn update_variable(
        &mut self,
        name: &str,
        update: VariableUpdate,
    ) -> Result<(), SymbolError> {
        let key = canonical_name(name);
        let entry = self
            .table
            .get_mut(key)
            .ok_or_else(|| SymbolError::UndeclaredVariable {
                name: key.to_string(),
            })?;
        *entry = update.apply(entry);
        Ok(())
    }

    pub fn remove_variable(&mut self, name: &str) -> Result<(), SymbolError> {
        let key = canonical_name(name);
        self.table
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| SymbolError::UndeclaredVariable {
                name: key.to_string(),
            })
    }

    /// Independent snapshot of every declaration.
    pub fn get_all_variables(&self) -> BTreeMap<String, VariableInfo> {
        self.table.clone()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(canonical_name(name))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
