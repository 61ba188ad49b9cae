use crate::error::FrontMatterError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Verb names and keywords (`case`), distinguished in the parser
    Word(String),
    /// Quoted string literal (content without quotes, escapes resolved)
    Str(String),
    /// `/.../` regex literal, delimiters stripped and `\/` unescaped
    Regex(String),
    LBrace,
    RBrace,
    LParen,
    RParen,
    Comma,
    Pipe,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub line: u32,
}

/// Tokenize a pattern-language expression. `first_line` is the document
/// line the expression starts on.
pub fn lex(src: &str, first_line: u32) -> Result<Vec<Spanned>, FrontMatterError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut pos = 0usize;
    let mut line = first_line;

    while pos < chars.len() {
        let c = chars[pos];

        if c.is_whitespace() {
            if c == '\n' {
                line += 1;
            }
            pos += 1;
            continue;
        }

        let tok_line = line;

        // Regex literal
        if c == '/' {
            pos += 1;
            let mut s = String::new();
            loop {
                if pos >= chars.len() || chars[pos] == '\n' {
                    return Err(FrontMatterError::new(
                        tok_line,
                        "unterminated regex literal",
                    ));
                }
                let rc = chars[pos];
                if rc == '/' {
                    pos += 1;
                    break;
                }
                if rc == '\\' && pos + 1 < chars.len() && chars[pos + 1] == '/' {
                    s.push('/');
                    pos += 2;
                    continue;
                }
                s.push(rc);
                pos += 1;
            }
            tokens.push(Spanned {
                token: Token::Regex(s),
                line: tok_line,
            });
            continue;
        }

        // String literal
        if c == '"' {
            pos += 1;
            let mut s = String::new();
            loop {
                if pos >= chars.len() {
                    return Err(FrontMatterError::new(
                        tok_line,
                        "unterminated string literal",
                    ));
                }
                let sc = chars[pos];
                if sc == '"' {
                    pos += 1;
                    break;
                }
                if sc == '\\' {
                    pos += 1;
                    if pos >= chars.len() {
                        return Err(FrontMatterError::new(
                            tok_line,
                            "unterminated escape in string",
                        ));
                    }
                    match chars[pos] {
                        '"' => s.push('"'),
                        '\\' => s.push('\\'),
                        'n' => s.push('\n'),
                        't' => s.push('\t'),
                        // Regex escapes such as `\.` pass through untouched.
                        other => {
                            s.push('\\');
                            s.push(other);
                        }
                    }
                    pos += 1;
                    continue;
                }
                if sc == '\n' {
                    return Err(FrontMatterError::new(
                        tok_line,
                        "unterminated string literal",
                    ));
                }
                s.push(sc);
                pos += 1;
            }
            tokens.push(Spanned {
                token: Token::Str(s),
                line: tok_line,
            });
            continue;
        }

        let punct = match c {
            '{' => Some(Token::LBrace),
            '}' => Some(Token::RBrace),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            ',' => Some(Token::Comma),
            '|' => Some(Token::Pipe),
            _ => None,
        };
        if let Some(token) = punct {
            tokens.push(Spanned {
                token,
                line: tok_line,
            });
            pos += 1;
            continue;
        }

        // Identifier / keyword
        if c.is_alphabetic() || c == '_' {
            let start = pos;
            while pos < chars.len()
                && (chars[pos].is_alphanumeric() || chars[pos] == '_' || chars[pos] == '-')
            {
                pos += 1;
            }
            let word: String = chars[start..pos].iter().collect();
            tokens.push(Spanned {
                token: Token::Word(word),
                line: tok_line,
            });
            continue;
        }

        return Err(FrontMatterError::new(
            tok_line,
            format!("unexpected character '{}'", c),
        ));
    }

    tokens.push(Spanned {
        token: Token::Eof,
        line,
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        lex(src, 1).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn lexes_pattern_action() {
        assert_eq!(
            kinds(r#"/.*\.kt/ { grep("a") | sort }"#),
            vec![
                Token::Regex(r".*\.kt".into()),
                Token::LBrace,
                Token::Word("grep".into()),
                Token::LParen,
                Token::Str("a".into()),
                Token::RParen,
                Token::Pipe,
                Token::Word("sort".into()),
                Token::RBrace,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn regex_unescapes_slash_only() {
        assert_eq!(
            kinds(r"/src\/main\/.*\.rs/"),
            vec![Token::Regex(r"src/main/.*\.rs".into()), Token::Eof]
        );
    }

    #[test]
    fn string_keeps_unknown_escapes() {
        assert_eq!(
            kinds(r#""\.md$" "say \"hi\"""#),
            vec![
                Token::Str(r"\.md$".into()),
                Token::Str("say \"hi\"".into()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn tracks_lines_from_offset() {
        let toks = lex("case\n\"a\"", 7).unwrap();
        assert_eq!(toks[0].line, 7);
        assert_eq!(toks[1].line, 8);
    }

    #[test]
    fn unterminated_regex_is_an_error() {
        let err = lex("/abc", 3).unwrap_err();
        assert_eq!(err.line, 3);
        assert_eq!(err.message, "unterminated regex literal");
    }

    #[test]
    fn unexpected_character_is_an_error() {
        let err = lex("{ grep; }", 1).unwrap_err();
        assert_eq!(err.message, "unexpected character ';'");
    }
}
