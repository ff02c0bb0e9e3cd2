//! JavaScript lexer.
//!
//! Produces just enough token structure for shape scanning: identifiers,
//! string literals (with their decoded content), template literals (kept
//! opaque; they are not string literals), numbers, and single-character
//! punctuation. Comments and regex literals are consumed and dropped.

use crate::ScanError;

/// Token types emitted by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum JsToken {
    /// Identifier or keyword.
    Ident(String),
    /// String literal content, quotes removed and escapes decoded.
    Str(String),
    /// Template literal; contents are opaque (never a literal argument).
    Template,
    /// Numeric literal; the value is irrelevant for scanning.
    Number,
    /// A single punctuation character.
    Punct(char),
}

/// JavaScript lexer.
pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    tokens: Vec<JsToken>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn consume(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    pub fn lex(mut self) -> Result<Vec<JsToken>, ScanError> {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
                continue;
            }

            if c == '/' && self.peek_at(1) == Some('/') {
                self.skip_line_comment();
                continue;
            }

            if c == '/' && self.peek_at(1) == Some('*') {
                self.skip_block_comment()?;
                continue;
            }

            if c == '/' && self.regex_can_start() {
                self.skip_regex()?;
                continue;
            }

            if c == '"' || c == '\'' {
                let content = self.read_string(c)?;
                self.tokens.push(JsToken::Str(content));
                continue;
            }

            if c == '`' {
                self.skip_template()?;
                self.tokens.push(JsToken::Template);
                continue;
            }

            if is_ident_start(c) {
                let ident = self.read_ident();
                self.tokens.push(JsToken::Ident(ident));
                continue;
            }

            if c.is_ascii_digit() {
                self.skip_number();
                self.tokens.push(JsToken::Number);
                continue;
            }

            self.pos += 1;
            self.tokens.push(JsToken::Punct(c));
        }

        Ok(self.tokens)
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.consume() {
            if c == '\n' {
                break;
            }
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), ScanError> {
        self.pos += 2;
        loop {
            match self.peek() {
                Some('*') if self.peek_at(1) == Some('/') => {
                    self.pos += 2;
                    return Ok(());
                }
                Some(_) => self.pos += 1,
                None => return Err(ScanError::LexError("unterminated block comment".into())),
            }
        }
    }

    fn read_string(&mut self, quote: char) -> Result<String, ScanError> {
        self.pos += 1;
        let mut content = String::new();
        loop {
            match self.consume() {
                Some('\\') => {
                    match self.consume() {
                        Some('n') => content.push('\n'),
                        Some('t') => content.push('\t'),
                        Some('r') => content.push('\r'),
                        Some('\n') => {} // line continuation
                        Some(other) => content.push(other),
                        None => {
                            return Err(ScanError::LexError("unterminated string".into()))
                        }
                    }
                }
                Some(c) if c == quote => return Ok(content),
                Some('\n') | None => {
                    return Err(ScanError::LexError("unterminated string".into()))
                }
                Some(c) => content.push(c),
            }
        }
    }

    fn skip_template(&mut self) -> Result<(), ScanError> {
        self.pos += 1;
        loop {
            match self.consume() {
                Some('\\') => {
                    self.pos += 1;
                }
                Some('`') => return Ok(()),
                Some(_) => {}
                None => return Err(ScanError::LexError("unterminated template".into())),
            }
        }
    }

    fn read_ident(&mut self) -> String {
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                ident.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        ident
    }

    fn skip_number(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    /// Division/regex disambiguation: a `/` starts a regex literal unless
    /// the previous token can end an expression.
    fn regex_can_start(&self) -> bool {
        match self.tokens.last() {
            None => true,
            Some(JsToken::Punct(')')) | Some(JsToken::Punct(']')) => false,
            Some(JsToken::Punct(_)) => true,
            Some(JsToken::Ident(name)) => matches!(
                name.as_str(),
                "return" | "typeof" | "case" | "in" | "of" | "instanceof" | "new" | "delete"
                    | "void" | "do" | "else" | "yield" | "await"
            ),
            _ => false,
        }
    }

    fn skip_regex(&mut self) -> Result<(), ScanError> {
        self.pos += 1;
        let mut in_class = false;
        loop {
            match self.consume() {
                Some('\\') => {
                    self.pos += 1;
                }
                Some('[') => in_class = true,
                Some(']') => in_class = false,
                Some('/') if !in_class => break,
                Some('\n') | None => {
                    return Err(ScanError::LexError("unterminated regex".into()))
                }
                Some(_) => {}
            }
        }
        // Flags.
        while let Some(c) = self.peek() {
            if c.is_ascii_alphabetic() {
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(())
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Lex a script into tokens.
pub fn lex(source: &str) -> Result<Vec<JsToken>, ScanError> {
    Lexer::new(source).lex()
}
