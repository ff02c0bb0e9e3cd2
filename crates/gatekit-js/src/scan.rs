//! Dynamic-reference shape scanner.
//!
//! Recognizes the call and assignment shapes that load resources at
//! runtime with a string-literal target. Each variant maps to the CSP
//! directive(s) the collector feeds.

use tracing::trace;

use crate::lexer::{lex, JsToken};
use crate::ScanError;

/// A dynamic resource reference found in a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DynamicRef {
    /// `fetch("literal")`: connect-src.
    Fetch(String),
    /// `<client>.get/post/...("literal")` on an http client object
    /// (axios style): connect-src.
    HttpClient(String),
    /// `new WebSocket("literal")`: connect-src.
    WebSocket(String),
    /// `import("literal")`: script-src.
    Import(String),
    /// `<expr>.src = "literal"`: target element unknown, so both
    /// script-src and img-src.
    SrcAssign(String),
}

/// Scan a script for dynamic references. Only string-literal arguments are
/// recognized; computed expressions contribute nothing.
pub fn scan_dynamic_refs(source: &str) -> Result<Vec<DynamicRef>, ScanError> {
    let tokens = lex(source)?;
    let mut refs = Vec::new();

    for i in 0..tokens.len() {
        match &tokens[i] {
            JsToken::Ident(name) if name == "fetch" => {
                // Bare call only: `obj.fetch(...)` has an unknown receiver.
                if prev_is_member_dot(&tokens, i) {
                    continue;
                }
                if let Some(lit) = call_literal_arg(&tokens, i + 1) {
                    refs.push(DynamicRef::Fetch(lit));
                }
            }
            JsToken::Ident(name) if name == "axios" => {
                if prev_is_member_dot(&tokens, i) {
                    continue;
                }
                // axios.<method>("literal")
                if matches!(tokens.get(i + 1), Some(JsToken::Punct('.'))) {
                    if matches!(tokens.get(i + 2), Some(JsToken::Ident(_))) {
                        if let Some(lit) = call_literal_arg(&tokens, i + 3) {
                            refs.push(DynamicRef::HttpClient(lit));
                        }
                    }
                }
            }
            JsToken::Ident(name) if name == "new" => {
                if let Some(JsToken::Ident(callee)) = tokens.get(i + 1) {
                    if callee == "WebSocket" {
                        if let Some(lit) = call_literal_arg(&tokens, i + 2) {
                            refs.push(DynamicRef::WebSocket(lit));
                        }
                    }
                }
            }
            JsToken::Ident(name) if name == "import" => {
                if let Some(lit) = call_literal_arg(&tokens, i + 1) {
                    refs.push(DynamicRef::Import(lit));
                }
            }
            JsToken::Ident(name) if name == "src" => {
                // `.src = "literal"`, but not `==` and not `+=`.
                if !prev_is_member_dot(&tokens, i) {
                    continue;
                }
                if !matches!(tokens.get(i + 1), Some(JsToken::Punct('='))) {
                    continue;
                }
                if let Some(JsToken::Str(lit)) = tokens.get(i + 2) {
                    refs.push(DynamicRef::SrcAssign(lit.clone()));
                }
            }
            _ => {}
        }
    }

    trace!(refs = refs.len(), "script scanned");
    Ok(refs)
}

/// The string literal opening a call at `open`: `( "literal"` with the
/// literal as the first argument.
fn call_literal_arg(tokens: &[JsToken], open: usize) -> Option<String> {
    if !matches!(tokens.get(open), Some(JsToken::Punct('('))) {
        return None;
    }
    match tokens.get(open + 1) {
        Some(JsToken::Str(lit)) => Some(lit.clone()),
        _ => None,
    }
}

/// Whether the token before `i` is a member-access dot.
fn prev_is_member_dot(tokens: &[JsToken], i: usize) -> bool {
    i > 0 && matches!(tokens[i - 1], JsToken::Punct('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_fetch_literal() {
        let refs = scan_dynamic_refs(r#"fetch("https://api.test/data");"#).unwrap();
        assert_eq!(refs, vec![DynamicRef::Fetch("https://api.test/data".to_string())]);
    }

    #[test]
    fn ignores_computed_fetch() {
        let refs = scan_dynamic_refs("fetch(buildUrl()); fetch(`https://x.${h}`);").unwrap();
        assert!(refs.is_empty());
    }

    #[test]
    fn ignores_member_fetch() {
        let refs = scan_dynamic_refs(r#"cache.fetch("https://a.test");"#).unwrap();
        assert!(refs.is_empty());
    }

    #[test]
    fn finds_axios_calls() {
        let refs =
            scan_dynamic_refs(r#"axios.get("https://api.test/a"); axios.post("/b", data);"#)
                .unwrap();
        assert_eq!(
            refs,
            vec![
                DynamicRef::HttpClient("https://api.test/a".to_string()),
                DynamicRef::HttpClient("/b".to_string()),
            ]
        );
    }

    #[test]
    fn finds_websocket() {
        let refs = scan_dynamic_refs(r#"const s = new WebSocket("wss://sock.test/feed");"#)
            .unwrap();
        assert_eq!(
            refs,
            vec![DynamicRef::WebSocket("wss://sock.test/feed".to_string())]
        );
    }

    #[test]
    fn finds_dynamic_import() {
        let refs = scan_dynamic_refs(r#"import("https://cdn.test/mod.js").then(go);"#).unwrap();
        assert_eq!(
            refs,
            vec![DynamicRef::Import("https://cdn.test/mod.js".to_string())]
        );
    }

    #[test]
    fn static_import_is_not_a_reference() {
        let refs = scan_dynamic_refs(r#"import x from "https://cdn.test/mod.js";"#).unwrap();
        assert!(refs.is_empty());
    }

    #[test]
    fn finds_src_assignment() {
        let refs = scan_dynamic_refs(r#"el.src = "https://cdn.test/w.js";"#).unwrap();
        assert_eq!(
            refs,
            vec![DynamicRef::SrcAssign("https://cdn.test/w.js".to_string())]
        );
    }

    #[test]
    fn src_comparison_is_not_an_assignment() {
        let refs = scan_dynamic_refs(r#"if (el.src == "x.png") {}"#).unwrap();
        assert!(refs.is_empty());
    }

    #[test]
    fn bare_src_is_not_a_member() {
        let refs = scan_dynamic_refs(r#"var src = "x.png";"#).unwrap();
        assert!(refs.is_empty());
    }

    #[test]
    fn malformed_script_is_error() {
        assert!(scan_dynamic_refs("var s = \"broken").is_err());
    }
}
