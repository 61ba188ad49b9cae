//! Per-session registry of compiled scripts exposed as actions.
//!
//! Each script declares where it shows up (`actionLocation`) and whether it
//! is `enabled`. The registry is owned by whoever loads the scripts; there
//! is no process-wide instance.

use serde::Serialize;
use shire_core::{ActionLocation, CompiledDocument};
use std::collections::BTreeMap;

/// One loaded script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShireAction {
    /// Display name: the header `name`, else the script's file stem.
    pub name: String,
    pub script_path: String,
    pub document: CompiledDocument,
}

impl ShireAction {
    pub fn new(script_path: impl Into<String>, document: CompiledDocument) -> Self {
        let script_path = script_path.into();
        let name = document
            .front_matter
            .name
            .clone()
            .unwrap_or_else(|| file_stem(&script_path).to_string());
        ShireAction {
            name,
            script_path,
            document,
        }
    }

    pub fn location(&self) -> ActionLocation {
        self.document.front_matter.action_location
    }

    pub fn enabled(&self) -> bool {
        self.document.front_matter.enabled
    }

    pub fn summary(&self) -> ActionSummary {
        ActionSummary {
            name: self.name.clone(),
            script_path: self.script_path.clone(),
            location: self.location(),
            enabled: self.enabled(),
            description: self.document.front_matter.description.clone(),
        }
    }
}

/// Serializable listing entry for an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionSummary {
    pub name: String,
    pub script_path: String,
    pub location: ActionLocation,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn file_stem(path: &str) -> &str {
    let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match file.rfind('.') {
        Some(i) if i > 0 => &file[..i],
        _ => file,
    }
}

/// Actions keyed by an arbitrary string, usually the script path.
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    actions: BTreeMap<String, ShireAction>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the action stored under `key`.
    pub fn put_action(&mut self, key: impl Into<String>, action: ShireAction) {
        let key = key.into();
        tracing::debug!(key = %key, name = %action.name, location = %action.location(), "register action");
        self.actions.insert(key, action);
    }

    pub fn get(&self, key: &str) -> Option<&ShireAction> {
        self.actions.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<ShireAction> {
        self.actions.remove(key)
    }

    /// Every action, enabled or not, ordered by key.
    pub fn all_actions(&self) -> Vec<&ShireAction> {
        self.actions.values().collect()
    }

    /// Enabled actions shown at `location`, ordered by key.
    pub fn actions_at(&self, location: ActionLocation) -> Vec<&ShireAction> {
        self.actions
            .values()
            .filter(|a| a.enabled() && a.location() == location)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use shire_core::compile;

    fn action(path: &str, header: &str) -> ShireAction {
        let doc = compile(&format!("---\n{}---\nbody\n", header)).unwrap();
        ShireAction::new(path, doc)
    }

    #[test]
    fn name_falls_back_to_file_stem() {
        assert_eq!(action("dir/explain.shire", "enabled: true\n").name, "explain");
        assert_eq!(action("a.shire", "name: Summarize\n").name, "Summarize");
        assert_eq!(file_stem(".hidden"), ".hidden");
    }

    #[test]
    fn actions_at_filters_location_and_enabled() {
        let mut registry = ActionRegistry::new();
        registry.put_action("a", action("a.shire", "actionLocation: ContextMenu\n"));
        registry.put_action(
            "b",
            action("b.shire", "actionLocation: ContextMenu\nenabled: false\n"),
        );
        registry.put_action("c", action("c.shire", "name: c\n"));

        assert_eq!(registry.all_actions().len(), 3);
        let menu: Vec<&str> = registry
            .actions_at(ActionLocation::ContextMenu)
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(menu, vec!["a"]);
        assert_eq!(registry.actions_at(ActionLocation::RunPanel).len(), 1);
        assert!(registry.actions_at(ActionLocation::CommitMenu).is_empty());
    }

    #[test]
    fn put_action_replaces_same_key() {
        let mut registry = ActionRegistry::new();
        registry.put_action("k", action("a.shire", "name: first\n"));
        registry.put_action("k", action("a.shire", "name: second\n"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("k").unwrap().name, "second");
        assert!(registry.remove("k").is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn summary_serializes_location() {
        let json = serde_json::to_value(action("x.shire", "description: d\n").summary()).unwrap();
        assert_eq!(json["location"], "RunPanel");
        assert_eq!(json["description"], "d");
        assert_eq!(json["enabled"], true);
    }
}
