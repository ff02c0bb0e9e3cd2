//! HTML tokenizer.
//!
//! A simplified but tolerant HTML5 tokenizer covering the constructs that
//! matter for resource collection: tags with attributes in all three
//! quoting styles, comments, doctype/CDATA skipping, and RAWTEXT capture
//! for `<script>`/`<style>` bodies. Malformed markup never fails; the
//! tokenizer emits what it can and treats stray `<` as text.

/// Token types emitted by the tokenizer.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Start tag (e.g., `<div>` or `<img />`). Names and attribute names
    /// are lowercased; attribute values are raw.
    StartTag {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    /// End tag (e.g., `</div>`)
    EndTag { name: String },
    /// Text content, including the raw body of script/style elements.
    Text(String),
}

/// Tokenization state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Data,
    TagOpen,
    TagName,
    EndTagOpen,
    EndTagName,
    AfterEndTagName,
    BeforeAttributeName,
    AttributeName,
    AfterAttributeName,
    BeforeAttributeValue,
    AttributeValueDoubleQuoted,
    AttributeValueSingleQuoted,
    AttributeValueUnquoted,
    SelfClosingStartTag,
    MarkupDeclarationOpen,
    BogusComment,
    RawText,
}

/// HTML tokenizer.
pub struct Tokenizer {
    input: Vec<char>,
    pos: usize,
    state: State,
    current_tag_name: String,
    current_attrs: Vec<(String, String)>,
    current_attr_name: String,
    current_attr_value: String,
    self_closing: bool,
    current_text: String,
    /// Element whose RAWTEXT body is being captured (script/style).
    rawtext_element: String,
    tokens: Vec<Token>,
}

impl Tokenizer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            state: State::Data,
            current_tag_name: String::new(),
            current_attrs: Vec::new(),
            current_attr_name: String::new(),
            current_attr_value: String::new(),
            self_closing: false,
            current_text: String::new(),
            rawtext_element: String::new(),
            tokens: Vec::new(),
        }
    }

    fn consume(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn starts_with_at(&self, pos: usize, needle: &str) -> bool {
        needle
            .chars()
            .enumerate()
            .all(|(i, c)| self.input.get(pos + i).copied() == Some(c))
    }

    fn flush_text(&mut self) {
        if !self.current_text.is_empty() {
            let text = std::mem::take(&mut self.current_text);
            self.tokens.push(Token::Text(text));
        }
    }

    fn flush_attr(&mut self) {
        if !self.current_attr_name.is_empty() {
            let name = std::mem::take(&mut self.current_attr_name);
            let value = std::mem::take(&mut self.current_attr_value);
            self.current_attrs.push((name, value));
        } else {
            self.current_attr_value.clear();
        }
    }

    fn emit_start_tag(&mut self) {
        self.flush_attr();
        let name = std::mem::take(&mut self.current_tag_name);
        let attrs = std::mem::take(&mut self.current_attrs);
        let self_closing = self.self_closing;
        self.self_closing = false;

        let enters_rawtext = !self_closing && (name == "script" || name == "style");
        if enters_rawtext {
            self.rawtext_element = name.clone();
            self.state = State::RawText;
        } else {
            self.state = State::Data;
        }
        self.tokens.push(Token::StartTag {
            name,
            attrs,
            self_closing,
        });
    }

    fn emit_end_tag(&mut self) {
        let name = std::mem::take(&mut self.current_tag_name);
        if !name.is_empty() {
            self.tokens.push(Token::EndTag { name });
        }
        self.state = State::Data;
    }

    pub fn tokenize(mut self) -> Vec<Token> {
        while let Some(c) = self.consume() {
            match self.state {
                State::Data => match c {
                    '<' => {
                        self.flush_text();
                        self.state = State::TagOpen;
                    }
                    _ => self.current_text.push(c),
                },

                State::TagOpen => match c {
                    '/' => self.state = State::EndTagOpen,
                    '!' => self.state = State::MarkupDeclarationOpen,
                    '?' => self.state = State::BogusComment,
                    c if c.is_ascii_alphabetic() => {
                        self.current_tag_name.push(c.to_ascii_lowercase());
                        self.state = State::TagName;
                    }
                    _ => {
                        // Stray '<' is text.
                        self.current_text.push('<');
                        self.current_text.push(c);
                        self.state = State::Data;
                    }
                },

                State::TagName => match c {
                    c if c.is_ascii_whitespace() => self.state = State::BeforeAttributeName,
                    '/' => self.state = State::SelfClosingStartTag,
                    '>' => self.emit_start_tag(),
                    _ => self.current_tag_name.push(c.to_ascii_lowercase()),
                },

                State::EndTagOpen => match c {
                    c if c.is_ascii_alphabetic() => {
                        self.current_tag_name.push(c.to_ascii_lowercase());
                        self.state = State::EndTagName;
                    }
                    '>' => self.state = State::Data,
                    _ => self.state = State::BogusComment,
                },

                State::EndTagName => match c {
                    '>' => self.emit_end_tag(),
                    c if c.is_ascii_whitespace() => self.state = State::AfterEndTagName,
                    _ => self.current_tag_name.push(c.to_ascii_lowercase()),
                },

                State::AfterEndTagName => {
                    if c == '>' {
                        self.emit_end_tag();
                    }
                }

                State::BeforeAttributeName => match c {
                    c if c.is_ascii_whitespace() => {}
                    '/' => self.state = State::SelfClosingStartTag,
                    '>' => self.emit_start_tag(),
                    '=' => {}
                    _ => {
                        self.current_attr_name.push(c.to_ascii_lowercase());
                        self.state = State::AttributeName;
                    }
                },

                State::AttributeName => match c {
                    c if c.is_ascii_whitespace() => self.state = State::AfterAttributeName,
                    '=' => self.state = State::BeforeAttributeValue,
                    '/' => {
                        self.flush_attr();
                        self.state = State::SelfClosingStartTag;
                    }
                    '>' => {
                        self.flush_attr();
                        self.emit_start_tag();
                    }
                    _ => self.current_attr_name.push(c.to_ascii_lowercase()),
                },

                State::AfterAttributeName => match c {
                    c if c.is_ascii_whitespace() => {}
                    '=' => self.state = State::BeforeAttributeValue,
                    '/' => {
                        self.flush_attr();
                        self.state = State::SelfClosingStartTag;
                    }
                    '>' => {
                        self.flush_attr();
                        self.emit_start_tag();
                    }
                    _ => {
                        // A bare attribute followed by another attribute.
                        self.flush_attr();
                        self.current_attr_name.push(c.to_ascii_lowercase());
                        self.state = State::AttributeName;
                    }
                },

                State::BeforeAttributeValue => match c {
                    c if c.is_ascii_whitespace() => {}
                    '"' => self.state = State::AttributeValueDoubleQuoted,
                    '\'' => self.state = State::AttributeValueSingleQuoted,
                    '>' => {
                        self.flush_attr();
                        self.emit_start_tag();
                    }
                    _ => {
                        self.current_attr_value.push(c);
                        self.state = State::AttributeValueUnquoted;
                    }
                },

                State::AttributeValueDoubleQuoted => match c {
                    '"' => {
                        self.flush_attr();
                        self.state = State::BeforeAttributeName;
                    }
                    _ => self.current_attr_value.push(c),
                },

                State::AttributeValueSingleQuoted => match c {
                    '\'' => {
                        self.flush_attr();
                        self.state = State::BeforeAttributeName;
                    }
                    _ => self.current_attr_value.push(c),
                },

                State::AttributeValueUnquoted => match c {
                    c if c.is_ascii_whitespace() => {
                        self.flush_attr();
                        self.state = State::BeforeAttributeName;
                    }
                    '>' => {
                        self.flush_attr();
                        self.emit_start_tag();
                    }
                    _ => self.current_attr_value.push(c),
                },

                State::SelfClosingStartTag => match c {
                    '>' => {
                        self.self_closing = true;
                        self.emit_start_tag();
                    }
                    c if c.is_ascii_whitespace() => self.state = State::BeforeAttributeName,
                    _ => {
                        self.current_attr_name.push(c.to_ascii_lowercase());
                        self.state = State::AttributeName;
                    }
                },

                State::MarkupDeclarationOpen => {
                    if c == '-' && self.starts_with_at(self.pos, "-") {
                        self.consume();
                        self.skip_comment();
                        self.state = State::Data;
                    } else {
                        // Doctype, CDATA, or bogus markup: skip to '>'.
                        self.state = State::BogusComment;
                    }
                }

                State::BogusComment => {
                    if c == '>' {
                        self.state = State::Data;
                    }
                }

                State::RawText => {
                    if c == '<' && self.at_rawtext_end(self.pos) {
                        self.flush_text();
                        self.consume_rawtext_end_tag();
                        self.state = State::Data;
                    } else {
                        self.current_text.push(c);
                    }
                }
            }
        }

        self.flush_text();
        self.tokens
    }

    /// Skip a comment body; `<!--` has already been consumed.
    fn skip_comment(&mut self) {
        while self.pos < self.input.len() {
            if self.starts_with_at(self.pos, "-->") {
                self.pos += 3;
                return;
            }
            self.pos += 1;
        }
    }

    /// Whether `pos` (just past a `<`) starts the matching RAWTEXT end tag.
    fn at_rawtext_end(&self, pos: usize) -> bool {
        if self.input.get(pos).copied() != Some('/') {
            return false;
        }
        let name = &self.rawtext_element;
        let matches_name = name
            .chars()
            .enumerate()
            .all(|(i, c)| {
                self.input
                    .get(pos + 1 + i)
                    .is_some_and(|&ic| ic.to_ascii_lowercase() == c)
            });
        if !matches_name {
            return false;
        }
        match self.input.get(pos + 1 + name.len()) {
            None => true,
            Some(&c) => c == '>' || c == '/' || c.is_ascii_whitespace(),
        }
    }

    /// Consume `/name ... >` of a RAWTEXT end tag and emit it.
    fn consume_rawtext_end_tag(&mut self) {
        self.pos += 1 + self.rawtext_element.len();
        while let Some(c) = self.consume() {
            if c == '>' {
                break;
            }
        }
        let name = std::mem::take(&mut self.rawtext_element);
        self.tokens.push(Token::EndTag { name });
    }
}

/// Tokenize an HTML document.
pub fn tokenize(html: &str) -> Vec<Token> {
    Tokenizer::new(html).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start_tags(tokens: &[Token]) -> Vec<&str> {
        tokens
            .iter()
            .filter_map(|t| match t {
                Token::StartTag { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn tokenizes_simple_document() {
        let tokens = tokenize("<html><body><p>Hello</p></body></html>");
        assert_eq!(start_tags(&tokens), vec!["html", "body", "p"]);
        assert!(tokens.contains(&Token::Text("Hello".to_string())));
    }

    #[test]
    fn tokenizes_attributes_in_all_quoting_styles() {
        let tokens = tokenize(r#"<img src="a.png" alt='x' width=10 hidden>"#);
        match &tokens[0] {
            Token::StartTag { name, attrs, .. } => {
                assert_eq!(name, "img");
                assert_eq!(
                    attrs,
                    &vec![
                        ("src".to_string(), "a.png".to_string()),
                        ("alt".to_string(), "x".to_string()),
                        ("width".to_string(), "10".to_string()),
                        ("hidden".to_string(), String::new()),
                    ]
                );
            }
            other => panic!("expected start tag, got {other:?}"),
        }
    }

    #[test]
    fn captures_script_rawtext() {
        let tokens = tokenize("<script>if (a < b) { alert(1); }</script>");
        assert_eq!(
            tokens,
            vec![
                Token::StartTag {
                    name: "script".to_string(),
                    attrs: vec![],
                    self_closing: false,
                },
                Token::Text("if (a < b) { alert(1); }".to_string()),
                Token::EndTag {
                    name: "script".to_string()
                },
            ]
        );
    }

    #[test]
    fn rawtext_end_tag_is_case_insensitive() {
        let tokens = tokenize("<script>x()</SCRIPT >");
        assert!(tokens.contains(&Token::Text("x()".to_string())));
    }

    #[test]
    fn skips_comments_and_doctype() {
        let tokens = tokenize("<!DOCTYPE html><!-- <img src=x> --><p>hi</p>");
        assert_eq!(start_tags(&tokens), vec!["p"]);
    }

    #[test]
    fn self_closing_tag() {
        let tokens = tokenize("<br/><img src=x />");
        match &tokens[0] {
            Token::StartTag { self_closing, .. } => assert!(self_closing),
            other => panic!("expected start tag, got {other:?}"),
        }
    }

    #[test]
    fn tolerates_unclosed_script() {
        let tokens = tokenize("<script>alert(1)");
        assert!(tokens.contains(&Token::Text("alert(1)".to_string())));
    }

    #[test]
    fn stray_angle_bracket_is_text() {
        let tokens = tokenize("<p>1 < 2</p>");
        assert!(tokens
            .iter()
            .any(|t| matches!(t, Token::Text(s) if s.contains("< 2"))));
    }

    #[test]
    fn on_attribute_value_preserved_raw() {
        let tokens = tokenize(r#"<button onclick=" doX() ">go</button>"#);
        match &tokens[0] {
            Token::StartTag { attrs, .. } => {
                assert_eq!(attrs[0], ("onclick".to_string(), " doX() ".to_string()));
            }
            other => panic!("expected start tag, got {other:?}"),
        }
    }
}
