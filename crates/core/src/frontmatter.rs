//! Front-matter header: splitting a document and converting its YAML header
//! into typed [`FrontMatterValue`]s.
//!
//! ```text
//! ---
//! name: "Summarize errors"
//! actionLocation: ContextMenu
//! variables:
//!   "logs": /.*\.log/ { grep("error") | sort("name") | prompt("Check the logs") }
//! ---
//! Body with $logs and @file-func:regex(".*\.kt")
//! ```
//!
//! YAML supplies the structure. String scalars starting with `/` or `case `
//! are handed to the pattern-language parser.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use time::macros::format_description;

use crate::ast::FrontMatterValue;
use crate::error::FrontMatterError;
use crate::parser;

pub const FRONT_MATTER_DELIMITER: &str = "---";

// ──────────────────────────────────────────────
// Document splitting
// ──────────────────────────────────────────────

/// A document cut into its header and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitDocument<'a> {
    pub header: Option<&'a str>,
    /// 1-based line of the first header line.
    pub header_line: u32,
    pub body: &'a str,
    /// 1-based line of the first body line.
    pub body_line: u32,
}

/// Split `text` into front matter and body. A document that does not open
/// with `---` has no header.
pub fn split_document(text: &str) -> Result<SplitDocument<'_>, FrontMatterError> {
    let mut lines = text.split_inclusive('\n');
    let first = match lines.next() {
        Some(l) if l.trim_end() == FRONT_MATTER_DELIMITER => l,
        _ => {
            return Ok(SplitDocument {
                header: None,
                header_line: 0,
                body: text,
                body_line: 1,
            })
        }
    };

    let header_start = first.len();
    let mut offset = header_start;
    let mut line_no: u32 = 2;
    for line in lines {
        if line.trim_end() == FRONT_MATTER_DELIMITER {
            return Ok(SplitDocument {
                header: Some(&text[header_start..offset]),
                header_line: 2,
                body: &text[offset + line.len()..],
                body_line: line_no + 1,
            });
        }
        offset += line.len();
        line_no += 1;
    }
    Err(FrontMatterError::new(1, "unterminated front matter"))
}

// ──────────────────────────────────────────────
// ActionLocation
// ──────────────────────────────────────────────

/// Where a compiled document is offered as an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Default)]
pub enum ActionLocation {
    ContextMenu,
    IntentionMenu,
    TerminalMenu,
    CommitMenu,
    InputBox,
    #[default]
    RunPanel,
}

impl ActionLocation {
    pub const ALL: [ActionLocation; 6] = [
        ActionLocation::ContextMenu,
        ActionLocation::IntentionMenu,
        ActionLocation::TerminalMenu,
        ActionLocation::CommitMenu,
        ActionLocation::InputBox,
        ActionLocation::RunPanel,
    ];
}

impl fmt::Display for ActionLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FromStr for ActionLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionLocation::ALL
            .into_iter()
            .find(|l| l.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown action location '{}'", s))
    }
}

// ──────────────────────────────────────────────
// FrontMatter
// ──────────────────────────────────────────────

/// A variable declared in the `variables` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableDecl {
    pub name: String,
    pub value: FrontMatterValue,
    pub line: u32,
}

/// The parsed header of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrontMatter {
    pub name: Option<String>,
    pub description: Option<String>,
    pub action_location: ActionLocation,
    pub enabled: bool,
    pub agent: Option<String>,
    /// Declaration order is kept.
    pub variables: Vec<VariableDecl>,
    /// Keys with no dedicated field.
    pub entries: BTreeMap<String, FrontMatterValue>,
}

impl Default for FrontMatter {
    fn default() -> Self {
        FrontMatter {
            name: None,
            description: None,
            action_location: ActionLocation::default(),
            enabled: true,
            agent: None,
            variables: Vec::new(),
            entries: BTreeMap::new(),
        }
    }
}

/// Parse a YAML header whose first line is document line `header_line`.
pub fn parse_front_matter(header: &str, header_line: u32) -> Result<FrontMatter, FrontMatterError> {
    let mut fm = FrontMatter::default();
    if header.trim().is_empty() {
        return Ok(fm);
    }

    let root: serde_yaml::Value = serde_yaml::from_str(header).map_err(|e| {
        let line = e
            .location()
            .map(|l| (header_line + l.line() as u32).saturating_sub(1))
            .unwrap_or(header_line);
        FrontMatterError::new(line, format!("invalid front matter: {}", e))
    })?;
    let mapping = match root {
        serde_yaml::Value::Mapping(m) => m,
        serde_yaml::Value::Null => return Ok(fm),
        _ => {
            return Err(FrontMatterError::new(
                header_line,
                "front matter must be a mapping",
            ))
        }
    };

    let lines: Vec<&str> = header.lines().collect();
    for (key, value) in &mapping {
        let key = yaml_key(key, header_line)?;
        let key_idx = find_key_line(&lines, &key, 0);
        let line = key_idx.map(|i| header_line + i as u32).unwrap_or(header_line);
        match key.as_str() {
            "name" => fm.name = Some(expect_str(value, &key, line)?),
            "description" => fm.description = Some(expect_str(value, &key, line)?),
            "agent" => fm.agent = Some(expect_str(value, &key, line)?),
            "actionLocation" => {
                let raw = expect_str(value, &key, line)?;
                fm.action_location =
                    raw.parse().map_err(|msg| FrontMatterError::new(line, msg))?;
            }
            "enabled" => {
                fm.enabled = value.as_bool().ok_or_else(|| {
                    FrontMatterError::new(line, "'enabled' must be a boolean")
                })?;
            }
            "variables" => {
                let vars = match value {
                    serde_yaml::Value::Mapping(m) => m,
                    serde_yaml::Value::Null => continue,
                    _ => {
                        return Err(FrontMatterError::new(
                            line,
                            "'variables' must be a mapping",
                        ))
                    }
                };
                let start = key_idx.map(|i| i + 1).unwrap_or(0);
                for (var_key, var_value) in vars {
                    let name = yaml_key(var_key, line)?;
                    let var_line = find_key_line(&lines, &name, start)
                        .map(|i| header_line + i as u32)
                        .unwrap_or(line);
                    let value = convert(var_value, var_line)?;
                    fm.variables.push(VariableDecl {
                        name,
                        value,
                        line: var_line,
                    });
                }
            }
            _ => {
                let converted = convert(value, line)?;
                fm.entries.insert(key, converted);
            }
        }
    }
    Ok(fm)
}

/// Convert one YAML value. `line` positions any error.
fn convert(value: &serde_yaml::Value, line: u32) -> Result<FrontMatterValue, FrontMatterError> {
    match value {
        serde_yaml::Value::Bool(b) => Ok(FrontMatterValue::Boolean(*b)),
        serde_yaml::Value::Number(n) => n.as_i64().map(FrontMatterValue::Number).ok_or_else(|| {
            FrontMatterError::new(line, format!("only integer numbers are supported, got {}", n))
        }),
        serde_yaml::Value::String(s) => classify_string(s, line),
        serde_yaml::Value::Sequence(items) => items
            .iter()
            .map(|item| convert(item, line))
            .collect::<Result<Vec<_>, _>>()
            .map(FrontMatterValue::Array),
        serde_yaml::Value::Mapping(m) => {
            let mut object = BTreeMap::new();
            for (k, v) in m {
                object.insert(yaml_key(k, line)?, convert(v, line)?);
            }
            Ok(FrontMatterValue::Object(object))
        }
        serde_yaml::Value::Null => Err(FrontMatterError::new(line, "null values are not supported")),
        serde_yaml::Value::Tagged(t) => Err(FrontMatterError::new(
            line,
            format!("tagged values are not supported: {}", t.tag),
        )),
    }
}

fn classify_string(s: &str, line: u32) -> Result<FrontMatterValue, FrontMatterError> {
    let trimmed = s.trim();
    if trimmed.starts_with('/') || trimmed.starts_with("case ") {
        return parser::parse_expression(trimmed, line);
    }
    if is_date(trimmed) {
        return Ok(FrontMatterValue::Date(trimmed.to_string()));
    }
    Ok(FrontMatterValue::String(s.to_string()))
}

fn is_date(s: &str) -> bool {
    let format = format_description!("[year]-[month]-[day]");
    s.len() == 10 && time::Date::parse(s, &format).is_ok()
}

fn yaml_key(key: &serde_yaml::Value, line: u32) -> Result<String, FrontMatterError> {
    match key {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        other => Err(FrontMatterError::new(
            line,
            format!("keys must be strings, got {:?}", other),
        )),
    }
}

fn expect_str(value: &serde_yaml::Value, key: &str, line: u32) -> Result<String, FrontMatterError> {
    value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| FrontMatterError::new(line, format!("'{}' must be a string", key)))
}

/// Index of the first header line at or after `start` that declares `key`.
fn find_key_line(lines: &[&str], key: &str, start: usize) -> Option<usize> {
    let forms = [
        format!("{}:", key),
        format!("\"{}\":", key),
        format!("'{}':", key),
    ];
    lines
        .iter()
        .enumerate()
        .skip(start)
        .find(|(_, l)| {
            let t = l.trim_start();
            forms.iter().any(|f| t.starts_with(f.as_str()))
        })
        .map(|(i, _)| i)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::PatternFun;

    #[test]
    fn split_without_header_keeps_whole_body() {
        let doc = split_document("just text\n").unwrap();
        assert_eq!(doc.header, None);
        assert_eq!(doc.body, "just text\n");
        assert_eq!(doc.body_line, 1);
    }

    #[test]
    fn split_with_header() {
        let doc = split_document("---\nname: x\n---\nbody\n").unwrap();
        assert_eq!(doc.header, Some("name: x\n"));
        assert_eq!(doc.header_line, 2);
        assert_eq!(doc.body, "body\n");
        assert_eq!(doc.body_line, 4);
    }

    #[test]
    fn split_unterminated_header_is_an_error() {
        let err = split_document("---\nname: x\n").unwrap_err();
        assert_eq!(err.message, "unterminated front matter");
    }

    #[test]
    fn parses_well_known_keys() {
        let fm = parse_front_matter(
            "name: \"Review\"\ndescription: checks\nactionLocation: ContextMenu\nenabled: false\nagent: reviewer\n",
            2,
        )
        .unwrap();
        assert_eq!(fm.name.as_deref(), Some("Review"));
        assert_eq!(fm.description.as_deref(), Some("checks"));
        assert_eq!(fm.action_location, ActionLocation::ContextMenu);
        assert!(!fm.enabled);
        assert_eq!(fm.agent.as_deref(), Some("reviewer"));
    }

    #[test]
    fn converts_scalar_kinds() {
        let fm = parse_front_matter(
            "count: 3\nflag: true\nsince: 2024-01-15\nnotdate: 2024-13-40\ntags: [a, b]\nmeta:\n  k: v\n",
            2,
        )
        .unwrap();
        assert_eq!(fm.entries["count"], FrontMatterValue::Number(3));
        assert_eq!(fm.entries["flag"], FrontMatterValue::Boolean(true));
        assert_eq!(fm.entries["since"], FrontMatterValue::Date("2024-01-15".into()));
        assert_eq!(
            fm.entries["notdate"],
            FrontMatterValue::String("2024-13-40".into())
        );
        assert_eq!(
            fm.entries["tags"],
            FrontMatterValue::Array(vec![
                FrontMatterValue::String("a".into()),
                FrontMatterValue::String("b".into())
            ])
        );
        assert!(matches!(fm.entries["meta"], FrontMatterValue::Object(_)));
    }

    #[test]
    fn variables_keep_order_and_lines() {
        let header = "name: demo\nvariables:\n  \"logs\": /.*\\.log/ { grep(\"error\") | prompt(\"check\") }\n  greeting: hello\n";
        let fm = parse_front_matter(header, 2).unwrap();
        assert_eq!(fm.variables.len(), 2);
        assert_eq!(fm.variables[0].name, "logs");
        assert_eq!(fm.variables[0].line, 4);
        assert_eq!(fm.variables[1].name, "greeting");
        assert_eq!(fm.variables[1].line, 5);
        match &fm.variables[0].value {
            FrontMatterValue::Pattern(a) => {
                assert_eq!(a.pattern(), r".*\.log");
                assert_eq!(
                    a.processors()[1],
                    PatternFun::Prompt {
                        message: "check".into()
                    }
                );
            }
            other => panic!("expected pattern, got {:?}", other),
        }
    }

    #[test]
    fn pattern_errors_carry_variable_line() {
        let header = "variables:\n  bad: /x/ { explode }\n";
        let err = parse_front_matter(header, 2).unwrap_err();
        assert_eq!(err.line, 3);
        assert_eq!(err.message, "unknown pattern processor 'explode'");
    }

    #[test]
    fn floats_and_nulls_are_rejected() {
        assert!(parse_front_matter("x: 1.5\n", 2)
            .unwrap_err()
            .message
            .contains("only integer numbers"));
        assert!(parse_front_matter("x: ~\n", 2)
            .unwrap_err()
            .message
            .contains("null values"));
    }

    #[test]
    fn unknown_action_location_is_rejected() {
        let err = parse_front_matter("actionLocation: Toolbar\n", 2).unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.message, "unknown action location 'Toolbar'");
    }

    #[test]
    fn action_location_parse_is_case_insensitive() {
        assert_eq!(
            "commitmenu".parse::<ActionLocation>().unwrap(),
            ActionLocation::CommitMenu
        );
    }
}
