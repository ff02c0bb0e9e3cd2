//! Header sanitization.

use http::header::{self, HeaderMap};

/// Hop-by-hop headers that never cross the proxy.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "upgrade",
];

/// Sanitize response headers: strip hop-by-hop entries, and drop
/// `Content-Length` when `Transfer-Encoding` is present. The two are
/// mutually exclusive and keeping both invites framing ambiguity
/// downstream.
pub fn sanitize_response_headers(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
    if headers.contains_key(header::TRANSFER_ENCODING) {
        headers.remove(header::CONTENT_LENGTH);
    }
}

/// Sanitize request headers before forwarding upstream.
pub fn sanitize_request_headers(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
    headers.remove(header::EXPECT);
    headers.remove(header::TRANSFER_ENCODING);
    headers.remove(header::CONTENT_LENGTH);
}

/// Whether a Content-Type value gates into the HTML rewrite path.
pub fn is_html_content_type(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.to_ascii_lowercase().contains(mime::TEXT_HTML.as_ref()))
        .unwrap_or(false)
}

/// Append `upgrade-insecure-requests` to a serialized header value unless
/// it is already present.
pub fn append_upgrade_insecure_requests(header: &str) -> String {
    let has_directive = header
        .split(';')
        .any(|d| d.trim().eq_ignore_ascii_case("upgrade-insecure-requests"));
    if has_directive {
        return header.to_string();
    }
    let trimmed = header.trim().trim_end_matches(';');
    format!("{trimmed}; upgrade-insecure-requests")
}
