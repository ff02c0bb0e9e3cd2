//! # GateKit CSS
//!
//! CSS reference scanner for CSPGate.
//!
//! Policy collection only needs the resources a stylesheet points at, so
//! this is not a full CSS parser: a comment- and string-aware scan that
//! yields every `url(...)` token, in rule bodies and at-rule preludes
//! alike. It attempts to be robust for common author CSS.

use thiserror::Error;

/// Errors that can occur while scanning CSS.
#[derive(Error, Debug, Clone)]
pub enum ScanError {
    #[error("Unexpected end of input")]
    UnexpectedEof,
}

/// A reference found in a stylesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CssRef {
    /// A `url(...)` token, quotes and surrounding whitespace stripped.
    Url(String),
}

/// Scan a stylesheet for references.
///
/// Unterminated comments and strings are scan errors; everything else is
/// tolerated.
pub fn scan_stylesheet(css: &str) -> Result<Vec<CssRef>, ScanError> {
    let mut refs = Vec::new();
    let chars: Vec<char> = css.chars().collect();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];

        // Comment: /* ... */
        if c == '/' && chars.get(pos + 1) == Some(&'*') {
            pos += 2;
            loop {
                match chars.get(pos) {
                    Some('*') if chars.get(pos + 1) == Some(&'/') => {
                        pos += 2;
                        break;
                    }
                    Some(_) => pos += 1,
                    None => return Err(ScanError::UnexpectedEof),
                }
            }
            continue;
        }

        // String: skip so url( inside quoted content is not a token.
        if c == '"' || c == '\'' {
            pos = skip_string(&chars, pos)?;
            continue;
        }

        if is_url_token_at(&chars, pos) {
            pos += 4; // url(
            let (value, next) = read_url_value(&chars, pos)?;
            if !value.is_empty() {
                refs.push(CssRef::Url(value));
            }
            pos = next;
            continue;
        }

        pos += 1;
    }

    Ok(refs)
}

/// Whether `url(` starts at `pos`, not as the tail of a longer identifier.
fn is_url_token_at(chars: &[char], pos: usize) -> bool {
    let matches_kw = chars[pos..]
        .iter()
        .take(3)
        .collect::<String>()
        .eq_ignore_ascii_case("url")
        && chars.get(pos + 3) == Some(&'(');
    if !matches_kw {
        return false;
    }
    if pos == 0 {
        return true;
    }
    let prev = chars[pos - 1];
    !(prev.is_ascii_alphanumeric() || prev == '-' || prev == '_')
}

/// Skip a quoted string starting at `pos`; returns the position after the
/// closing quote.
fn skip_string(chars: &[char], pos: usize) -> Result<usize, ScanError> {
    let quote = chars[pos];
    let mut i = pos + 1;
    while let Some(&c) = chars.get(i) {
        if c == '\\' {
            i += 2;
            continue;
        }
        if c == quote {
            return Ok(i + 1);
        }
        i += 1;
    }
    Err(ScanError::UnexpectedEof)
}

/// Read the value of a `url(...)` token; `pos` is just past the opening
/// parenthesis. Returns the cleaned value and the position after `)`.
fn read_url_value(chars: &[char], pos: usize) -> Result<(String, usize), ScanError> {
    let mut raw = String::new();
    let mut i = pos;
    loop {
        match chars.get(i) {
            Some(')') => break,
            Some(&c) => {
                raw.push(c);
                i += 1;
            }
            None => return Err(ScanError::UnexpectedEof),
        }
    }
    let value = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    Ok((value.to_string(), i + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(css: &str) -> Vec<String> {
        scan_stylesheet(css)
            .unwrap()
            .into_iter()
            .map(|CssRef::Url(u)| u)
            .collect()
    }

    #[test]
    fn finds_unquoted_url() {
        assert_eq!(
            urls("body { background: url(https://cdn.test/bg.png); }"),
            vec!["https://cdn.test/bg.png"]
        );
    }

    #[test]
    fn strips_quotes() {
        assert_eq!(
            urls(r#"@font-face { src: url("https://fonts.test/a.woff2"); }"#),
            vec!["https://fonts.test/a.woff2"]
        );
        assert_eq!(
            urls("h1 { background: url( 'img/x.gif' ); }"),
            vec!["img/x.gif"]
        );
    }

    #[test]
    fn finds_url_in_at_rule_prelude() {
        assert_eq!(
            urls(r#"@import url("https://styles.test/base.css");"#),
            vec!["https://styles.test/base.css"]
        );
    }

    #[test]
    fn ignores_url_inside_comments_and_strings() {
        assert!(urls("/* url(hidden.png) */ body { color: red; }").is_empty());
        assert!(urls(r#"h1::after { content: "url(fake.png)"; }"#).is_empty());
    }

    #[test]
    fn ignores_identifier_suffix() {
        assert!(urls("body { background: no-url(x.png); }").is_empty());
    }

    #[test]
    fn multiple_urls() {
        let css = "a { background: url(a.png), url(b.png); }";
        assert_eq!(urls(css), vec!["a.png", "b.png"]);
    }

    #[test]
    fn unterminated_comment_is_error() {
        assert!(matches!(
            scan_stylesheet("body { } /* dangling"),
            Err(ScanError::UnexpectedEof)
        ));
    }

    #[test]
    fn unterminated_string_is_error() {
        assert!(matches!(
            scan_stylesheet(r#"h1 { content: "oops; }"#),
            Err(ScanError::UnexpectedEof)
        ));
    }
}
