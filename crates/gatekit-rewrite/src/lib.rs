//! # GateKit Rewrite
//!
//! The response rewriting pipeline: decode the upstream body, run the
//! collector over HTML (plus fetched CSS/JS dependencies), serialize the
//! policy, patch the response headers, and emit. Also hosts the internal
//! plain-HTTP rewrite endpoint used in split deployments and the
//! violation report sink.

pub mod decode;
pub mod fetch;
pub mod headers;
pub mod pipeline;
pub mod server;

pub use decode::decode_body;
pub use fetch::SubresourceFetcher;
pub use headers::{
    append_upgrade_insecure_requests, is_html_content_type, sanitize_request_headers,
    sanitize_response_headers,
};
pub use pipeline::{rewrite_response, ExchangeState, RewriteOptions, RewrittenResponse};
pub use server::{RewriteServer, RewriteService};

use thiserror::Error;

/// Errors from the rewrite layer's own plumbing. Analysis failures are
/// not errors at this level; the pipeline recovers with the fallback
/// policy.
#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("Fetcher init failed: {0}")]
    FetcherInit(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
