//! Flat document model over the token stream.

use tracing::trace;

use crate::tokenizer::{tokenize, Token};

/// An element occurrence: lowercased name, attributes in source order,
/// and the raw body for script/style elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    /// Raw text content, captured for `script` and `style` only.
    pub text: Option<String>,
}

impl Element {
    /// First value of the named attribute, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Whether the named attribute is present (with any value).
    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|(n, _)| n == name)
    }

    /// Attributes whose name starts with `on` (case already folded).
    pub fn event_handler_attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs
            .iter()
            .filter(|(n, _)| n.starts_with("on"))
            .map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// A scanned document: every element in source order. Collection does not
/// need ancestry, so no tree is built.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub elements: Vec<Element>,
}

impl Document {
    /// Scan a document. Tolerant: malformed markup yields whatever
    /// elements could be recognized.
    pub fn parse(html: &str) -> Document {
        let mut elements: Vec<Element> = Vec::new();
        let mut pending_rawtext: Option<usize> = None;

        for token in tokenize(html) {
            match token {
                Token::StartTag {
                    name,
                    attrs,
                    self_closing,
                } => {
                    let captures_text =
                        !self_closing && (name == "script" || name == "style");
                    elements.push(Element {
                        name,
                        attrs,
                        text: captures_text.then(String::new),
                    });
                    pending_rawtext = captures_text.then(|| elements.len() - 1);
                }
                Token::Text(text) => {
                    if let Some(index) = pending_rawtext.take() {
                        elements[index].text = Some(text);
                    }
                }
                Token::EndTag { .. } => {
                    pending_rawtext = None;
                }
            }
        }

        trace!(elements = elements.len(), "document scanned");
        Document { elements }
    }

    /// All elements with the given (lowercase) name.
    pub fn elements_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements.iter().filter(move |e| e.name == name)
    }

    /// Inline scripts: `<script>` elements without a `src` attribute.
    pub fn inline_scripts(&self) -> impl Iterator<Item = &Element> {
        self.elements_named("script").filter(|e| !e.has_attr("src"))
    }

    /// Inline stylesheets: `<style>` element bodies.
    pub fn inline_styles(&self) -> impl Iterator<Item = &str> {
        self.elements_named("style")
            .filter_map(|e| e.text.as_deref())
    }

    /// `<link rel="stylesheet" href=...>` href values.
    pub fn stylesheet_links(&self) -> impl Iterator<Item = &str> {
        self.elements_named("link").filter_map(|e| {
            let rel = e.attr("rel")?;
            if rel.eq_ignore_ascii_case("stylesheet") {
                e.attr("href")
            } else {
                None
            }
        })
    }

    /// `<script src=...>` src values.
    pub fn script_sources(&self) -> impl Iterator<Item = &str> {
        self.elements_named("script").filter_map(|e| e.attr("src"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_elements_and_attrs() {
        let doc = Document::parse(
            r#"<html><body><img src="/x.png"><form action="/post"></form></body></html>"#,
        );
        let img = doc.elements_named("img").next().unwrap();
        assert_eq!(img.attr("src"), Some("/x.png"));
        let form = doc.elements_named("form").next().unwrap();
        assert_eq!(form.attr("action"), Some("/post"));
    }

    #[test]
    fn inline_scripts_have_text() {
        let doc = Document::parse(
            r#"<script src="/app.js"></script><script>alert(1)</script>"#,
        );
        let inline: Vec<_> = doc.inline_scripts().collect();
        assert_eq!(inline.len(), 1);
        assert_eq!(inline[0].text.as_deref(), Some("alert(1)"));

        let srcs: Vec<_> = doc.script_sources().collect();
        assert_eq!(srcs, vec!["/app.js"]);
    }

    #[test]
    fn empty_inline_script_has_empty_text() {
        let doc = Document::parse("<script></script>");
        let inline: Vec<_> = doc.inline_scripts().collect();
        assert_eq!(inline[0].text.as_deref(), Some(""));
    }

    #[test]
    fn stylesheet_links_filter_on_rel() {
        let doc = Document::parse(
            r#"<link rel="stylesheet" href="/a.css"><link rel="icon" href="/b.ico">"#,
        );
        let hrefs: Vec<_> = doc.stylesheet_links().collect();
        assert_eq!(hrefs, vec!["/a.css"]);
    }

    #[test]
    fn event_handler_attrs_found() {
        let doc = Document::parse(r#"<button onclick="doX()" onmouseover="doY()">x</button>"#);
        let button = doc.elements_named("button").next().unwrap();
        let handlers: Vec<_> = button.event_handler_attrs().collect();
        assert_eq!(
            handlers,
            vec![("onclick", "doX()"), ("onmouseover", "doY()")]
        );
    }

    #[test]
    fn style_text_captured() {
        let doc = Document::parse("<style>body { background: url(bg.png); }</style>");
        let styles: Vec<_> = doc.inline_styles().collect();
        assert_eq!(styles, vec!["body { background: url(bg.png); }"]);
    }
}
