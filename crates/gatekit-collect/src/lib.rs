//! # GateKit Collect
//!
//! The origin/hash collector: a pure function from a document (plus any
//! fetched stylesheet and script bodies) to a [`Policy`]. No I/O happens
//! here; the rewrite pipeline fetches dependencies and hands their text
//! in; a missing dependency simply contributes nothing.

use thiserror::Error;
use tracing::debug;
use url::Url;

use gatekit_css::{scan_stylesheet, CssRef};
use gatekit_html::{dev_origin_literals, raw_inline_scripts, Document};
use gatekit_js::{scan_dynamic_refs, DynamicRef};
use gatekit_policy::{hash_variants, sha256_token, Directive, Mode, Origin, Policy, SourceExpr};

/// Errors that abort analysis of a document. The pipeline recovers from
/// these by emitting the fallback policy.
#[derive(Error, Debug, Clone)]
pub enum CollectError {
    #[error("CSS scan failed: {0}")]
    Css(#[from] gatekit_css::ScanError),

    #[error("JS scan failed: {0}")]
    Js(#[from] gatekit_js::ScanError),
}

/// Input to one collection run.
#[derive(Debug, Clone)]
pub struct CollectInput<'a> {
    /// Raw document markup, byte-identical to what the client will get.
    pub html: &'a str,
    /// Resolved document URL.
    pub base_url: &'a Url,
    /// Policy synthesis mode.
    pub mode: Mode,
    /// Nonce for [`Mode::Nonce`]; generated when absent.
    pub nonce: Option<&'a str>,
    /// Bodies of fetched linked stylesheets (fetch failures omitted).
    pub external_css: &'a [String],
    /// Bodies of fetched external scripts (fetch failures omitted).
    pub external_js: &'a [String],
}

/// Analyze a document and produce its policy.
pub fn collect(input: &CollectInput<'_>) -> Result<Policy, CollectError> {
    let mut policy = Policy::base(input.mode, input.nonce);
    let doc = Document::parse(input.html);

    collect_element_origins(&mut policy, &doc, input.base_url);

    if input.mode != Mode::Nonce {
        collect_inline_script_hashes(&mut policy, &doc, input.html);
    }

    if input.mode == Mode::Compat {
        collect_handler_attr_hashes(&mut policy, &doc);
    }

    collect_css_origins(&mut policy, &doc, input.external_css, input.base_url)?;
    collect_js_refs(&mut policy, &doc, input.external_js, input.base_url)?;
    collect_dev_origins(&mut policy, input.html, input.base_url);

    debug!(url = %input.base_url, mode = ?input.mode, "policy collected");
    Ok(policy)
}

/// Resolve a raw URL and add its origin to the given directives. Invalid
/// candidates are discarded silently.
fn add_origin(policy: &mut Policy, directives: &[Directive], raw: &str, base: &Url) {
    if let Some(origin) = Origin::resolve(raw, base) {
        for &directive in directives {
            policy.add(directive, SourceExpr::Origin(origin.clone()));
        }
    }
}

/// External resource origins from element/attribute pairs.
fn collect_element_origins(policy: &mut Policy, doc: &Document, base: &Url) {
    use Directive::*;

    for element in &doc.elements {
        match element.name.as_str() {
            "script" => {
                if let Some(src) = element.attr("src") {
                    add_origin(policy, &[ScriptSrc], src, base);
                }
            }
            "link" => {
                let is_stylesheet = element
                    .attr("rel")
                    .is_some_and(|rel| rel.eq_ignore_ascii_case("stylesheet"));
                if is_stylesheet {
                    if let Some(href) = element.attr("href") {
                        add_origin(policy, &[StyleSrc], href, base);
                    }
                }
            }
            "img" => {
                if let Some(src) = element.attr("src") {
                    add_origin(policy, &[ImgSrc], src, base);
                }
            }
            "audio" | "video" | "source" => {
                if let Some(src) = element.attr("src") {
                    add_origin(policy, &[MediaSrc], src, base);
                }
            }
            "iframe" => {
                if let Some(src) = element.attr("src") {
                    add_origin(policy, &[FrameSrc], src, base);
                }
            }
            "form" => {
                if let Some(action) = element.attr("action") {
                    add_origin(policy, &[FormAction], action, base);
                }
            }
            "object" => {
                if let Some(data) = element.attr("data") {
                    add_origin(policy, &[ObjectSrc, FrameSrc], data, base);
                }
            }
            "embed" => {
                if let Some(src) = element.attr("src") {
                    add_origin(policy, &[ObjectSrc, FrameSrc], src, base);
                }
            }
            _ => {}
        }
    }
}

/// Hash every inline script body: the scanned elements plus a raw-markup
/// pass for scripts a tree builder may normalize away.
fn collect_inline_script_hashes(policy: &mut Policy, doc: &Document, html: &str) {
    let mut add_hashes = |content: &str| {
        for variant in hash_variants(content) {
            let token = SourceExpr::Sha256(sha256_token(&variant));
            policy.add(Directive::ScriptSrc, token.clone());
            policy.add(Directive::ScriptSrcElem, token);
        }
    };

    for raw in raw_inline_scripts(html) {
        add_hashes(&raw);
    }
    for element in doc.inline_scripts() {
        if let Some(text) = element.text.as_deref() {
            add_hashes(text);
        }
    }
}

/// Hash `on*` event-handler attribute values (compat mode). Browsers only
/// honor attribute hashes with `'unsafe-hashes'`, so the keyword is added
/// exactly when at least one hash was.
fn collect_handler_attr_hashes(policy: &mut Policy, doc: &Document) {
    let mut any_hash = false;

    for element in &doc.elements {
        for (_, value) in element.event_handler_attrs() {
            if value.is_empty() {
                continue;
            }
            let token = SourceExpr::Sha256(sha256_token(value));
            policy.add(Directive::ScriptSrcAttr, token.clone());
            policy.add(Directive::ScriptSrc, token);
            any_hash = true;

            let trimmed = value.trim();
            if !trimmed.is_empty() && trimmed != value {
                let token = SourceExpr::Sha256(sha256_token(trimmed));
                policy.add(Directive::ScriptSrcAttr, token.clone());
                policy.add(Directive::ScriptSrc, token);
            }
        }
    }

    if any_hash {
        policy.add(Directive::ScriptSrcAttr, SourceExpr::UnsafeHashes);
        policy.add(Directive::ScriptSrc, SourceExpr::UnsafeHashes);
    }
}

/// `url(...)` references from linked and inline stylesheets. The scanner
/// cannot tell an image from a font face, so both directives get the
/// origin.
fn collect_css_origins(
    policy: &mut Policy,
    doc: &Document,
    external_css: &[String],
    base: &Url,
) -> Result<(), CollectError> {
    let mut walk = |css: &str| -> Result<(), CollectError> {
        for CssRef::Url(raw) in scan_stylesheet(css)? {
            add_origin(policy, &[Directive::ImgSrc, Directive::FontSrc], &raw, base);
        }
        Ok(())
    };

    for css in external_css {
        walk(css)?;
    }
    for css in doc.inline_styles().collect::<Vec<_>>() {
        walk(css)?;
    }
    Ok(())
}

/// Dynamic references from inline and fetched external scripts.
fn collect_js_refs(
    policy: &mut Policy,
    doc: &Document,
    external_js: &[String],
    base: &Url,
) -> Result<(), CollectError> {
    use Directive::*;

    let mut walk = |code: &str| -> Result<(), CollectError> {
        for dynamic_ref in scan_dynamic_refs(code)? {
            match dynamic_ref {
                DynamicRef::Fetch(raw)
                | DynamicRef::HttpClient(raw)
                | DynamicRef::WebSocket(raw) => {
                    add_origin(policy, &[ConnectSrc], &raw, base);
                }
                DynamicRef::Import(raw) => {
                    add_origin(policy, &[ScriptSrc], &raw, base);
                }
                DynamicRef::SrcAssign(raw) => {
                    add_origin(policy, &[ScriptSrc, ImgSrc], &raw, base);
                }
            }
        }
        Ok(())
    };

    for element in doc.inline_scripts().collect::<Vec<_>>() {
        if let Some(text) = element.text.as_deref() {
            walk(text)?;
        }
    }
    for code in external_js {
        walk(code)?;
    }
    Ok(())
}

/// Development-origin allowance: local dev servers referenced anywhere in
/// the markup keep working under the synthesized policy.
fn collect_dev_origins(policy: &mut Policy, html: &str, base: &Url) {
    for literal in dev_origin_literals(html) {
        add_origin(
            policy,
            &[Directive::ScriptSrc, Directive::ConnectSrc],
            &literal,
            base,
        );
    }
}
