//! Raw-markup scans.
//!
//! These run over the original, unmodified markup: the enforcing browser
//! hashes whatever its own parser sees, so scripts that a tolerant
//! tokenizer drops or normalizes must still be collected from the raw
//! bytes.

use std::sync::OnceLock;

use regex::Regex;

fn script_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<script\b([^>]*?)>(.*?)</script\s*>").expect("script regex")
    })
}

fn src_attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bsrc\s*=").expect("src attr regex"))
}

fn dev_origin_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\bhttps?://(?:localhost|127\.0\.0\.1):\d+(?:[/?#][^\s"'<>]*)?"#)
            .expect("dev origin regex")
    })
}

/// Extract the raw body of every `<script>...</script>` without a `src`
/// attribute, straight from the markup.
pub fn raw_inline_scripts(html: &str) -> Vec<String> {
    script_re()
        .captures_iter(html)
        .filter(|caps| !src_attr_re().is_match(&caps[1]))
        .map(|caps| caps[2].to_string())
        .collect()
}

/// Find every development-origin literal
/// (`http(s)://localhost|127.0.0.1:<port>[...]`) in the given text.
pub fn dev_origin_literals(text: &str) -> Vec<String> {
    dev_origin_re()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}
