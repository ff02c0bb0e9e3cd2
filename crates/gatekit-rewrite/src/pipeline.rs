//! The per-exchange rewrite pipeline.
//!
//! One linear async function per exchange, with the state machine
//! `Forwarding → BufferingBody (HTML only) → Analyzing → Serializing →
//! Emitting → Done` tracked explicitly. `FallbackEmitting` is reachable
//! from `Analyzing`/`Serializing`: an analysis failure must never abort
//! the exchange; the client still gets *a* CSP.

use bytes::Bytes;
use http::header::{HeaderMap, HeaderValue, CONTENT_ENCODING, CONTENT_LENGTH, TRANSFER_ENCODING};
use http::StatusCode;
use tracing::{debug, warn};
use url::Url;

use gatekit_collect::{collect, CollectInput};
use gatekit_html::Document;
use gatekit_policy::{Mode, Policy, ReportOnlyStyle};

use crate::decode::decode_body;
use crate::fetch::SubresourceFetcher;
use crate::headers::{
    append_upgrade_insecure_requests, is_html_content_type, sanitize_response_headers,
};

/// Pipeline configuration for policy synthesis.
#[derive(Debug, Clone)]
pub struct RewriteOptions {
    /// Policy synthesis mode.
    pub mode: Mode,
    /// Emit a Report-Only header as well.
    pub add_report_only: bool,
    /// Report-Only derivation style.
    pub report_style: ReportOnlyStyle,
    /// Violation report endpoint.
    pub report_uri: String,
    /// Nonce for nonce mode; generated per response when absent.
    pub nonce: Option<String>,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Compat,
            add_report_only: true,
            report_style: ReportOnlyStyle::Monitor,
            report_uri: "/csp-report".to_string(),
            nonce: None,
        }
    }
}

/// Exchange states. The pipeline is a single linear function; the state
/// is tracked for tracing and to keep the contract explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Forwarding,
    BufferingBody,
    Analyzing,
    Serializing,
    Emitting,
    FallbackEmitting,
    Done,
}

/// The rewritten response, ready to stream back to the client.
#[derive(Debug)]
pub struct RewrittenResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Run the rewrite pipeline over a fully received upstream response.
///
/// Non-HTML responses pass through byte-for-byte after header
/// sanitization. HTML responses are decoded, analyzed, and re-emitted
/// with a `Content-Security-Policy` header: the synthesized one, or the
/// hard-coded fallback when analysis fails.
pub async fn rewrite_response(
    options: &RewriteOptions,
    fetcher: &SubresourceFetcher,
    url: &Url,
    status: StatusCode,
    upstream_headers: &HeaderMap,
    body: Bytes,
) -> RewrittenResponse {
    let mut state = ExchangeState::Forwarding;
    debug!(url = %url, ?state, status = %status, "upstream response received");

    let mut headers = upstream_headers.clone();
    sanitize_response_headers(&mut headers);

    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if !is_html_content_type(content_type.as_deref()) {
        state = ExchangeState::Emitting;
        debug!(url = %url, ?state, "pass-through");
        return emit(status, headers, body, state);
    }

    state = ExchangeState::BufferingBody;
    debug!(url = %url, ?state, bytes = body.len(), "buffered html body");

    let content_encoding = headers
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let decoded = decode_body(&body, content_encoding.as_deref());
    let html = String::from_utf8_lossy(&decoded).into_owned();

    state = ExchangeState::Analyzing;
    debug!(url = %url, ?state, "analyzing");
    let analysis = analyze(options, fetcher, url, &html).await;

    let (policy, report_only) = match analysis {
        Ok(pair) => {
            state = ExchangeState::Serializing;
            pair
        }
        Err(err) => {
            state = ExchangeState::FallbackEmitting;
            warn!(url = %url, %err, ?state, "analysis failed, emitting fallback policy");
            let fallback = Policy::fallback();
            let report_only = options
                .add_report_only
                .then(|| fallback.report_only_variant(options.report_style));
            (fallback, report_only)
        }
    };

    let enforce_header =
        append_upgrade_insecure_requests(&policy.serialize(&options.report_uri));
    let report_only_header = report_only
        .map(|ro| append_upgrade_insecure_requests(&ro.serialize(&options.report_uri)));

    // The body leaves the pipeline uncompressed and unchunked.
    headers.remove(CONTENT_ENCODING);
    headers.remove(TRANSFER_ENCODING);
    headers.remove("content-security-policy");
    headers.remove("content-security-policy-report-only");

    if let Ok(value) = HeaderValue::try_from(enforce_header) {
        headers.insert("content-security-policy", value);
    }
    if let Some(ro) = report_only_header {
        if let Ok(value) = HeaderValue::try_from(ro) {
            headers.insert("content-security-policy-report-only", value);
        }
    }

    if state != ExchangeState::FallbackEmitting {
        state = ExchangeState::Emitting;
    }
    emit(status, headers, Bytes::from(html.into_bytes()), state)
}

/// Analyze an HTML body: fetch linked CSS/JS (best-effort) and run the
/// collector.
async fn analyze(
    options: &RewriteOptions,
    fetcher: &SubresourceFetcher,
    url: &Url,
    html: &str,
) -> Result<(Policy, Option<Policy>), gatekit_collect::CollectError> {
    let doc = Document::parse(html);

    let css_urls: Vec<Url> = doc
        .stylesheet_links()
        .filter_map(|href| url.join(href).ok())
        .collect();
    let js_urls: Vec<Url> = doc
        .script_sources()
        .filter_map(|src| url.join(src).ok())
        .collect();

    let external_css = fetcher.fetch_all(&css_urls).await;
    let external_js = fetcher.fetch_all(&js_urls).await;

    let policy = collect(&CollectInput {
        html,
        base_url: url,
        mode: options.mode,
        nonce: options.nonce.as_deref(),
        external_css: &external_css,
        external_js: &external_js,
    })?;

    let report_only = options
        .add_report_only
        .then(|| policy.report_only_variant(options.report_style));

    Ok((policy, report_only))
}

/// Final emission: recompute framing for the fully buffered body.
fn emit(
    status: StatusCode,
    mut headers: HeaderMap,
    body: Bytes,
    state: ExchangeState,
) -> RewrittenResponse {
    headers.remove(TRANSFER_ENCODING);
    if let Ok(value) = HeaderValue::try_from(body.len().to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    debug!(?state, status = %status, bytes = body.len(), "emitting");
    debug!(state = ?ExchangeState::Done, "exchange complete");
    RewrittenResponse {
        status,
        headers,
        body,
    }
}
