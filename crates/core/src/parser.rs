//! Parser for the pattern language embedded in front-matter values.
//!
//! ```text
//! /<regex>/ { verb | verb("arg", ...) | ... }
//! case "<subject>" { "<key>" /<regex>/ { ... } ... }
//! ```
//!
//! Verb names, arities and regex syntax (trigger and `grep` patterns) are
//! checked here, so a malformed pipeline never reaches the evaluator. Sort
//! keys are checked when the pipeline runs.

use crate::ast::{CaseMatch, FrontMatterValue, PatternAction, PatternFun};
use crate::error::FrontMatterError;
use crate::lexer::{lex, Spanned, Token};
use regex::Regex;
use std::collections::BTreeMap;

/// Maximum number of variables an `xargs` step may bind.
pub const MAX_XARGS_VARIABLES: usize = 5;

/// Parse a pattern-language expression starting on document line `line`.
///
/// Returns either a `Pattern` or a `CaseMatch` value.
pub fn parse_expression(src: &str, line: u32) -> Result<FrontMatterValue, FrontMatterError> {
    let tokens = lex(src, line)?;
    let mut parser = Parser::new(&tokens);
    let value = if parser.is_word("case") {
        FrontMatterValue::CaseMatch(parser.parse_case_match()?)
    } else {
        FrontMatterValue::Pattern(parser.parse_pattern_action()?)
    };
    if parser.peek() != &Token::Eof {
        return Err(parser.err(format!(
            "unexpected {:?} after expression",
            parser.peek()
        )));
    }
    Ok(value)
}

// ──────────────────────────────────────────────
// Parser
// ──────────────────────────────────────────────

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Spanned]) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn cur(&self) -> &Spanned {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.cur().token
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn err(&self, msg: impl Into<String>) -> FrontMatterError {
        FrontMatterError::new(self.cur().line, msg)
    }

    fn is_word(&self, w: &str) -> bool {
        matches!(self.peek(), Token::Word(x) if x == w)
    }

    fn expect(&mut self, expected: Token, shown: &str) -> Result<(), FrontMatterError> {
        if self.peek() == &expected {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!("expected '{}', got {:?}", shown, self.peek())))
        }
    }

    fn take_word(&mut self) -> Result<String, FrontMatterError> {
        if let Token::Word(w) = self.peek().clone() {
            self.advance();
            Ok(w)
        } else {
            Err(self.err(format!("expected verb name, got {:?}", self.peek())))
        }
    }

    fn take_str(&mut self) -> Result<String, FrontMatterError> {
        if let Token::Str(s) = self.peek().clone() {
            self.advance();
            Ok(s)
        } else {
            Err(self.err(format!("expected string literal, got {:?}", self.peek())))
        }
    }

    fn take_regex(&mut self) -> Result<String, FrontMatterError> {
        if let Token::Regex(r) = self.peek().clone() {
            self.advance();
            Ok(r)
        } else {
            Err(self.err(format!("expected /pattern/, got {:?}", self.peek())))
        }
    }

    // -- Pattern actions ----------------------------------------

    fn parse_pattern_action(&mut self) -> Result<PatternAction, FrontMatterError> {
        let line = self.cur().line;
        let pattern = self.take_regex()?;
        check_regex(&pattern).map_err(|msg| FrontMatterError::new(line, msg))?;
        self.expect(Token::LBrace, "{")?;
        let mut processors = Vec::new();
        if self.peek() != &Token::RBrace {
            processors.push(self.parse_call()?);
            while self.peek() == &Token::Pipe {
                self.advance();
                processors.push(self.parse_call()?);
            }
        }
        self.expect(Token::RBrace, "}")?;
        PatternAction::new(pattern, processors).map_err(|e| e.at_line(line))
    }

    fn parse_call(&mut self) -> Result<PatternFun, FrontMatterError> {
        let line = self.cur().line;
        let name = self.take_word()?;
        let mut args = Vec::new();
        if self.peek() == &Token::LParen {
            self.advance();
            if self.peek() != &Token::RParen {
                args.push(self.take_str()?);
                while self.peek() == &Token::Comma {
                    self.advance();
                    args.push(self.take_str()?);
                }
            }
            self.expect(Token::RParen, ")")?;
        }
        build_verb(&name, args).map_err(|msg| FrontMatterError::new(line, msg))
    }

    // -- Case match ---------------------------------------------

    fn parse_case_match(&mut self) -> Result<CaseMatch, FrontMatterError> {
        self.advance(); // `case`
        let subject = self.take_str()?;
        self.expect(Token::LBrace, "{")?;
        let mut cases = BTreeMap::new();
        while self.peek() != &Token::RBrace {
            let line = self.cur().line;
            let key = self.take_str()?;
            let action = self.parse_pattern_action()?;
            if cases.insert(key.clone(), action).is_some() {
                return Err(FrontMatterError::new(
                    line,
                    format!("duplicate case '{}'", key),
                ));
            }
        }
        self.expect(Token::RBrace, "}")?;
        Ok(CaseMatch { subject, cases })
    }
}

/// Map a verb name and its arguments to a pipeline step, checking arity.
fn build_verb(name: &str, args: Vec<String>) -> Result<PatternFun, String> {
    match name {
        "prompt" => {
            if args.len() != 1 {
                return Err(format!(
                    "prompt takes exactly 1 argument, got {}",
                    args.len()
                ));
            }
            let message = args.into_iter().next().unwrap_or_default();
            Ok(PatternFun::Prompt { message })
        }
        "grep" => {
            if args.is_empty() {
                return Err("grep needs at least 1 pattern".to_string());
            }
            for pattern in &args {
                check_regex(pattern)?;
            }
            Ok(PatternFun::Grep { patterns: args })
        }
        "sort" => Ok(PatternFun::Sort { arguments: args }),
        "xargs" => {
            if args.is_empty() || args.len() > MAX_XARGS_VARIABLES {
                return Err(format!(
                    "xargs binds 1 to {} variables, got {}",
                    MAX_XARGS_VARIABLES,
                    args.len()
                ));
            }
            Ok(PatternFun::Xargs { variables: args })
        }
        other => Err(format!("unknown pattern processor '{}'", other)),
    }
}

fn check_regex(pattern: &str) -> Result<(), String> {
    Regex::new(pattern)
        .map(|_| ())
        .map_err(|e| format!("invalid regex '{}': {}", pattern, e))
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn action(value: FrontMatterValue) -> PatternAction {
        match value {
            FrontMatterValue::Pattern(a) => a,
            other => panic!("expected pattern, got {:?}", other),
        }
    }

    #[test]
    fn parses_full_pipeline_in_order() {
        let a = action(
            parse_expression(
                r#"/.*\.md/ { grep("\.md$") | sort("name") | xargs("file") | prompt("done") }"#,
                4,
            )
            .unwrap(),
        );
        assert_eq!(a.pattern(), r".*\.md");
        let verbs: Vec<&str> = a.processors().iter().map(|p| p.verb()).collect();
        assert_eq!(verbs, vec!["grep", "sort", "xargs", "prompt"]);
        assert_eq!(
            a.processors()[0],
            PatternFun::Grep {
                patterns: vec![r"\.md$".into()]
            }
        );
    }

    #[test]
    fn bare_sort_has_no_arguments() {
        let a = action(parse_expression("/x/ { sort }", 1).unwrap());
        assert_eq!(a.processors(), &[PatternFun::Sort { arguments: vec![] }]);
    }

    #[test]
    fn unknown_verb_is_rejected_at_compile_time() {
        let err = parse_expression(r#"/x/ { grep("a") | frob("b") }"#, 9).unwrap_err();
        assert_eq!(err.line, 9);
        assert_eq!(err.message, "unknown pattern processor 'frob'");
    }

    #[test]
    fn prompt_arity_is_checked() {
        let err = parse_expression(r#"/x/ { prompt("a", "b") }"#, 1).unwrap_err();
        assert!(err.message.contains("exactly 1 argument"));
    }

    #[test]
    fn xargs_arity_is_checked() {
        let err = parse_expression("/x/ { xargs }", 1).unwrap_err();
        assert!(err.message.contains("xargs binds 1 to 5"));
    }

    #[test]
    fn invalid_regex_is_rejected_at_compile_time() {
        let err = parse_expression(r#"/x/ { grep("(") }"#, 3).unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.message.starts_with("invalid regex '('"));
        assert!(parse_expression("/[/ { sort }", 1).is_err());
    }

    #[test]
    fn empty_pipeline_is_rejected() {
        let err = parse_expression("/x/ { }", 2).unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("empty pipeline"));
    }

    #[test]
    fn parses_case_match() {
        let v = parse_expression(
            r#"case "$language" { "kotlin" /.*\.kt/ { prompt("k") } "python" /.*\.py/ { sort | prompt("p") } }"#,
            1,
        )
        .unwrap();
        let cm = match v {
            FrontMatterValue::CaseMatch(cm) => cm,
            other => panic!("expected case match, got {:?}", other),
        };
        assert_eq!(cm.subject, "$language");
        assert_eq!(cm.cases.len(), 2);
        assert_eq!(cm.cases["python"].processors().len(), 2);
    }

    #[test]
    fn duplicate_case_is_rejected() {
        let err = parse_expression(
            r#"case "$x" { "a" /a/ { prompt("1") } "a" /b/ { prompt("2") } }"#,
            1,
        )
        .unwrap_err();
        assert_eq!(err.message, "duplicate case 'a'");
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        let err = parse_expression(r#"/x/ { sort } sort"#, 1).unwrap_err();
        assert!(err.message.starts_with("unexpected"));
    }
}
