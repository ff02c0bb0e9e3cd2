//! End-to-end collection scenarios over full documents.

use url::Url;

use gatekit_collect::{collect, CollectInput};
use gatekit_policy::{sha256_token, Directive, Mode, Origin, Policy, SourceExpr};

fn base() -> Url {
    Url::parse("https://example.com/").unwrap()
}

fn run(html: &str, mode: Mode) -> Policy {
    collect(&CollectInput {
        html,
        base_url: &base(),
        mode,
        nonce: None,
        external_css: &[],
        external_js: &[],
    })
    .unwrap()
}

fn header(html: &str, mode: Mode) -> String {
    run(html, mode).serialize("/csp-report")
}

#[test]
fn every_header_has_default_src_and_trailing_report_uri() {
    for html in ["", "<p>hi</p>", "<script>alert(1)</script>", "<img src=x>"] {
        for mode in [Mode::Compat, Mode::Nonce, Mode::Strict] {
            let header = collect(&CollectInput {
                html,
                base_url: &base(),
                mode,
                nonce: Some("n"),
                external_css: &[],
                external_js: &[],
            })
            .unwrap()
            .serialize("/csp-report");
            assert!(header.contains("default-src"), "{header}");
            assert!(header.ends_with("report-uri /csp-report;"), "{header}");
        }
    }
}

#[test]
fn analysis_is_idempotent() {
    let html = r#"
        <html><head>
        <link rel="stylesheet" href="https://cdn.test/a.css">
        <style>body { background: url(https://imgs.test/bg.png); }</style>
        </head><body>
        <img src="http://evil.test/x.png">
        <script>fetch("https://api.test/v1"); alert(1)</script>
        <button onclick="doX()">go</button>
        </body></html>
    "#;
    assert_eq!(header(html, Mode::Compat), header(html, Mode::Compat));
    assert_eq!(header(html, Mode::Strict), header(html, Mode::Strict));
}

#[test]
fn scenario_inline_script_compat() {
    // <script>alert(1)</script>, mode=compat, base https://example.com/
    let policy = run("<script>alert(1)</script>", Mode::Compat);
    let sources = policy.sources(Directive::ScriptSrc).unwrap();

    assert!(sources.contains(&SourceExpr::SelfSource));
    assert!(sources.contains(&SourceExpr::Scheme("https:")));
    // Hash of the exact preimage `alert(1)`.
    assert!(sources.contains(&SourceExpr::Sha256(sha256_token("alert(1)"))));
    // The trailing-newline variant is a distinct token.
    assert!(sources.contains(&SourceExpr::Sha256(sha256_token("alert(1)\n"))));
}

#[test]
fn scenario_img_origin() {
    let policy = run(r#"<img src="http://evil.test/x.png">"#, Mode::Compat);
    let origin = Origin::resolve("http://evil.test", &base()).unwrap();
    assert!(policy.contains(Directive::ImgSrc, &SourceExpr::Origin(origin)));
}

#[test]
fn scenario_onclick_compat_vs_strict() {
    let html = r#"<button onclick="doX()">x</button>"#;

    let compat = run(html, Mode::Compat);
    let token = SourceExpr::Sha256(sha256_token("doX()"));
    assert!(compat.contains(Directive::ScriptSrcAttr, &token));
    assert!(compat.contains(Directive::ScriptSrcAttr, &SourceExpr::UnsafeHashes));
    assert!(compat.contains(Directive::ScriptSrc, &SourceExpr::UnsafeHashes));

    let strict = run(html, Mode::Strict);
    assert!(strict.sources(Directive::ScriptSrcAttr).unwrap().is_empty());
    assert!(!strict.contains(Directive::ScriptSrc, &SourceExpr::UnsafeHashes));
    assert!(!strict.serialize("/csp-report").contains("'unsafe-hashes'"));
}

#[test]
fn websocket_origin_dedups_against_https() {
    let html = r#"
        <script>
            fetch("https://sock.test/poll");
            new WebSocket("wss://sock.test/feed");
        </script>
    "#;
    let policy = run(html, Mode::Compat);
    let sources = policy.sources(Directive::ConnectSrc).unwrap();
    let matching: Vec<_> = sources
        .iter()
        .filter(|s| s.to_string() == "https://sock.test")
        .collect();
    assert_eq!(matching.len(), 1);
}

#[test]
fn invalid_urls_never_raise_and_contribute_nothing() {
    let html = r#"
        <img src="">
        <img src="not a url">
        <script src="javascript:void(0)"></script>
        <iframe src="data:text/html,hi"></iframe>
    "#;
    let policy = run(html, Mode::Compat);
    let reference = run("<p></p>", Mode::Compat);
    for directive in [Directive::ImgSrc, Directive::ScriptSrc, Directive::FrameSrc] {
        assert_eq!(policy.sources(directive), reference.sources(directive));
    }
}

#[test]
fn full_page_collects_across_languages() {
    let css = vec!["@font-face { src: url(https://fonts.test/a.woff2); }".to_string()];
    let js = vec![r#"axios.get("https://api.test/users");"#.to_string()];
    let html = r#"
        <html><head>
        <link rel="stylesheet" href="https://cdn.test/site.css">
        </head><body>
        <iframe src="https://frames.test/ad"></iframe>
        <form action="https://forms.test/submit"></form>
        <object data="https://plugins.test/x"></object>
        <script src="https://cdn.test/app.js"></script>
        </body></html>
    "#;
    let policy = collect(&CollectInput {
        html,
        base_url: &base(),
        mode: Mode::Compat,
        nonce: None,
        external_css: &css,
        external_js: &js,
    })
    .unwrap();

    let origin = |s: &str| SourceExpr::Origin(Origin::resolve(s, &base()).unwrap());
    assert!(policy.contains(Directive::StyleSrc, &origin("https://cdn.test")));
    assert!(policy.contains(Directive::FrameSrc, &origin("https://frames.test")));
    assert!(policy.contains(Directive::FormAction, &origin("https://forms.test")));
    assert!(policy.contains(Directive::ObjectSrc, &origin("https://plugins.test")));
    assert!(policy.contains(Directive::ScriptSrc, &origin("https://cdn.test")));
    assert!(policy.contains(Directive::FontSrc, &origin("https://fonts.test")));
    assert!(policy.contains(Directive::ImgSrc, &origin("https://fonts.test")));
    assert!(policy.contains(Directive::ConnectSrc, &origin("https://api.test")));
}
