//! The rewrite service and the internal plain-HTTP endpoint.
//!
//! `RewriteService` is deployment-agnostic: the interception layer calls
//! it directly in direct mode, and `RewriteServer` exposes it over plain
//! HTTP (default port 8080) for split deployments. It also owns the
//! violation report sink.

use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::fetch::SubresourceFetcher;
use crate::headers::sanitize_request_headers;
use crate::pipeline::{rewrite_response, RewriteOptions, RewrittenResponse};

/// Handles one request end-to-end: routing, upstream fetch, rewrite.
pub struct RewriteService {
    options: RewriteOptions,
    fetcher: SubresourceFetcher,
    upstream: gatekit_http::Client,
}

impl RewriteService {
    pub fn new(
        options: RewriteOptions,
        fetcher: SubresourceFetcher,
        upstream: gatekit_http::Client,
    ) -> Self {
        Self {
            options,
            fetcher,
            upstream,
        }
    }

    /// Handle a client request aimed at `url`. Always produces a
    /// response: internal routes, the rewritten upstream response, or
    /// 502 when the origin is unreachable.
    pub async fn handle(
        &self,
        method: Method,
        url: Url,
        mut headers: HeaderMap,
        body: Option<Bytes>,
    ) -> RewrittenResponse {
        if url.path() == self.options.report_uri {
            return self.accept_violation_report(body);
        }
        if url.path() == "/favicon.ico" {
            return empty_response(StatusCode::NO_CONTENT);
        }

        sanitize_request_headers(&mut headers);

        let upstream = match self.fetch_upstream(&method, &url, &headers, body).await {
            Ok(response) => response,
            Err(err) => {
                error!(url = %url, %err, "upstream unreachable");
                return bad_gateway();
            }
        };

        rewrite_response(
            &self.options,
            &self.fetcher,
            &url,
            upstream.status,
            &upstream.headers,
            upstream.body,
        )
        .await
    }

    /// Fetch from the origin, with the single documented failover: the
    /// bare `example.com` test target is retried once as
    /// `www.example.com`.
    async fn fetch_upstream(
        &self,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        body: Option<Bytes>,
    ) -> Result<gatekit_http::Response, gatekit_http::HttpError> {
        match self
            .upstream
            .request(method.clone(), url, headers, body.clone())
            .await
        {
            Ok(response) => Ok(response),
            Err(err) => {
                if url.host_str() == Some("example.com") {
                    let mut alt = url.clone();
                    if alt.set_host(Some("www.example.com")).is_ok() {
                        warn!(url = %url, %err, "retrying flaky target as www.example.com");
                        return self.upstream.request(method.clone(), &alt, headers, body).await;
                    }
                }
                Err(err)
            }
        }
    }

    /// `POST <report-uri>`: log the violation report, reply 204.
    fn accept_violation_report(&self, body: Option<Bytes>) -> RewrittenResponse {
        let raw = body.as_deref().unwrap_or_default();
        match serde_json::from_slice::<serde_json::Value>(raw) {
            Ok(report) => info!(report = %report, "csp violation report"),
            Err(_) => info!(report = %String::from_utf8_lossy(raw), "csp violation report"),
        }
        empty_response(StatusCode::NO_CONTENT)
    }
}

fn empty_response(status: StatusCode) -> RewrittenResponse {
    RewrittenResponse {
        status,
        headers: HeaderMap::new(),
        body: Bytes::new(),
    }
}

fn bad_gateway() -> RewrittenResponse {
    let mut headers = HeaderMap::new();
    headers.insert(
        "content-type",
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    let body = Bytes::from_static(b"Bad Gateway");
    headers.insert(
        "content-length",
        HeaderValue::from(body.len()),
    );
    RewrittenResponse {
        status: StatusCode::BAD_GATEWAY,
        headers,
        body,
    }
}

/// The internal plain-HTTP rewrite endpoint for split deployments.
pub struct RewriteServer {
    service: Arc<RewriteService>,
    port: u16,
}

impl RewriteServer {
    pub fn new(service: Arc<RewriteService>, port: u16) -> Self {
        Self { service, port }
    }

    /// Bind and serve until the process exits. One task per connection.
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", self.port))
            .await
            .context("failed to bind rewrite endpoint")?;
        info!(port = self.port, "rewrite endpoint listening");

        loop {
            let (stream, peer) = listener.accept().await.context("accept failed")?;
            debug!(%peer, "rewrite endpoint connection");
            let service = Arc::clone(&self.service);
            tokio::spawn(async move {
                if let Err(err) = handle_plain_connection(stream, service).await {
                    warn!(%peer, %err, "rewrite endpoint connection error");
                }
            });
        }
    }
}

/// Read one plain-HTTP request, dispatch it, write the response.
async fn handle_plain_connection(
    stream: TcpStream,
    service: Arc<RewriteService>,
) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let Some(request) = read_http_request(&mut reader).await? else {
        return Ok(());
    };

    let url = resolve_target_url(&request)?;
    debug!(method = %request.method, url = %url, "rewrite endpoint request");

    let response = service
        .handle(request.method, url, request.headers, request.body)
        .await;
    write_http_response(&mut write_half, &response).await?;
    write_half.shutdown().await.ok();
    Ok(())
}

/// A parsed plain-HTTP request.
pub struct ParsedRequest {
    pub method: Method,
    pub target: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// Read one HTTP/1.x request (line + headers + Content-Length body) from
/// a buffered stream. Returns `None` on immediate EOF.
pub async fn read_http_request<R>(reader: &mut R) -> Result<Option<ParsedRequest>>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).await? == 0 {
        return Ok(None);
    }

    let mut parts = request_line.split_whitespace();
    let method: Method = parts
        .next()
        .context("empty request line")?
        .parse()
        .context("invalid method")?;
    let target = parts.next().context("missing request target")?.to_string();

    let mut headers = HeaderMap::new();
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await?;
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if let (Ok(n), Ok(v)) = (
                HeaderName::try_from(name.trim()),
                HeaderValue::try_from(value.trim()),
            ) {
                if n == http::header::CONTENT_LENGTH {
                    content_length = value.trim().parse().unwrap_or(0);
                }
                headers.append(n, v);
            }
        }
    }

    let body = if content_length > 0 {
        let mut buf = vec![0u8; content_length];
        reader.read_exact(&mut buf).await?;
        Some(Bytes::from(buf))
    } else {
        None
    };

    Ok(Some(ParsedRequest {
        method,
        target,
        headers,
        body,
    }))
}

/// Resolve the upstream target: absolute-form request targets are taken
/// as-is, origin-form targets resolve against the Host header over
/// HTTPS (the upstream leg is always HTTPS:443).
fn resolve_target_url(request: &ParsedRequest) -> Result<Url> {
    if request.target.starts_with("http://") || request.target.starts_with("https://") {
        return Url::parse(&request.target).context("invalid absolute request target");
    }
    let host = request
        .headers
        .get("host")
        .and_then(|v| v.to_str().ok())
        .context("missing Host header")?
        .trim_end_matches('.');
    Url::parse(&format!("https://{}{}", host, request.target))
        .context("invalid request target")
}

/// Serialize a response onto a stream.
pub async fn write_http_response<W>(writer: &mut W, response: &RewrittenResponse) -> Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let reason = response.status.canonical_reason().unwrap_or("");
    let mut head = format!("HTTP/1.1 {} {}\r\n", response.status.as_u16(), reason);
    for (name, value) in response.headers.iter() {
        if let Ok(v) = value.to_str() {
            head.push_str(&format!("{}: {}\r\n", name, v));
        }
    }
    head.push_str("connection: close\r\n\r\n");

    writer.write_all(head.as_bytes()).await?;
    writer.write_all(&response.body).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekit_http::ClientConfig;
    use std::time::Duration;

    fn service() -> RewriteService {
        RewriteService::new(
            RewriteOptions::default(),
            SubresourceFetcher::new(Duration::from_millis(200)).unwrap(),
            gatekit_http::Client::with_config(ClientConfig {
                timeout: Duration::from_millis(300),
                ..ClientConfig::default()
            })
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn violation_report_returns_204() {
        let response = service()
            .handle(
                Method::POST,
                Url::parse("https://example.com/csp-report").unwrap(),
                HeaderMap::new(),
                Some(Bytes::from_static(b"{\"csp-report\":{}}")),
            )
            .await;
        assert_eq!(response.status, StatusCode::NO_CONTENT);
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn unreachable_upstream_is_502_without_csp() {
        // Reserved TEST-NET-1 address: connection refused/timeout.
        let response = service()
            .handle(
                Method::GET,
                Url::parse("http://192.0.2.1:9/page").unwrap(),
                HeaderMap::new(),
                None,
            )
            .await;
        assert_eq!(response.status, StatusCode::BAD_GATEWAY);
        assert!(response.headers.get("content-security-policy").is_none());
    }

    #[tokio::test]
    async fn reads_http_request_with_body() {
        let raw = b"POST /csp-report HTTP/1.1\r\nhost: example.com\r\ncontent-length: 4\r\n\r\nbody".to_vec();
        let mut reader = BufReader::new(std::io::Cursor::new(raw));
        let request = read_http_request(&mut reader).await.unwrap().unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.target, "/csp-report");
        assert_eq!(request.body, Some(Bytes::from_static(b"body")));
    }

    #[tokio::test]
    async fn eof_yields_none() {
        let mut reader = BufReader::new(std::io::Cursor::new(Vec::<u8>::new()));
        assert!(read_http_request(&mut reader).await.unwrap().is_none());
    }

    #[test]
    fn resolves_origin_form_target() {
        let request = ParsedRequest {
            method: Method::GET,
            target: "/page?x=1".to_string(),
            headers: {
                let mut h = HeaderMap::new();
                h.insert("host", HeaderValue::from_static("example.com."));
                h
            },
            body: None,
        };
        let url = resolve_target_url(&request).unwrap();
        assert_eq!(url.as_str(), "https://example.com/page?x=1");
    }

    #[test]
    fn resolves_absolute_form_target() {
        let request = ParsedRequest {
            method: Method::GET,
            target: "https://other.test/x".to_string(),
            headers: HeaderMap::new(),
            body: None,
        };
        let url = resolve_target_url(&request).unwrap();
        assert_eq!(url.as_str(), "https://other.test/x");
    }

    #[tokio::test]
    async fn writes_response_with_headers() {
        let mut out = Vec::new();
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("text/plain"));
        let response = RewrittenResponse {
            status: StatusCode::OK,
            headers,
            body: Bytes::from_static(b"hi"),
        };
        write_http_response(&mut out, &response).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("content-type: text/plain\r\n"));
        assert!(text.ends_with("\r\n\r\nhi"));
    }
}
