//! The intercepting TLS listener.
//!
//! Per-connection lifecycle: accept TCP, handle an optional explicit-proxy
//! `CONNECT` preamble, inspect the TLS client hello for SNI, fetch or
//! issue the leaf certificate, complete the handshake, read one HTTP
//! request, and dispatch it: inline through the rewrite service (direct
//! deployment) or relayed to the internal rewrite endpoint (split
//! deployment).

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::LazyConfigAcceptor;
use tracing::{debug, info, warn};
use url::Url;

use gatekit_rewrite::server::{
    read_http_request, write_http_response, ParsedRequest, RewriteService,
};

use crate::ca::CertificateAuthority;

/// Where decrypted requests go.
pub enum Upstreaming {
    /// Run the rewrite pipeline in-process.
    Direct(Arc<RewriteService>),
    /// Relay over plain HTTP to the internal rewrite endpoint.
    Split { rewrite_port: u16 },
}

/// The intercepting TLS proxy server.
pub struct InterceptServer {
    ca: Arc<CertificateAuthority>,
    upstreaming: Arc<Upstreaming>,
    port: u16,
}

impl InterceptServer {
    pub fn new(ca: Arc<CertificateAuthority>, upstreaming: Upstreaming, port: u16) -> Self {
        Self {
            ca,
            upstreaming: Arc::new(upstreaming),
            port,
        }
    }

    /// Bind and serve until the process exits. One task per connection;
    /// a failed connection never affects the others.
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", self.port))
            .await
            .context("failed to bind intercept listener")?;
        info!(port = self.port, "intercept listener ready");

        loop {
            let (stream, peer) = listener.accept().await.context("accept failed")?;
            debug!(%peer, "connection accepted");
            let ca = Arc::clone(&self.ca);
            let upstreaming = Arc::clone(&self.upstreaming);
            tokio::spawn(async move {
                if let Err(err) = handle_connection(stream, ca, upstreaming).await {
                    warn!(%peer, %err, "connection error");
                }
            });
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    ca: Arc<CertificateAuthority>,
    upstreaming: Arc<Upstreaming>,
) -> Result<()> {
    // Explicit-proxy clients send `CONNECT host:port` in the clear first.
    let mut connect_host: Option<String> = None;
    let mut preamble = [0u8; 8];
    let peeked = stream.peek(&mut preamble).await?;

    if preamble[..peeked].starts_with(b"CONNECT ") {
        connect_host = Some(read_connect_preamble(&mut stream).await?);
        stream
            .write_all(b"HTTP/1.1 200 Connection Established\r\n\r\n")
            .await?;
    } else if peeked > 0 && preamble[0] != 0x16 {
        // Not a TLS client hello and not CONNECT: this port only
        // terminates TLS.
        stream
            .write_all(b"HTTP/1.1 400 Bad Request\r\nconnection: close\r\n\r\n")
            .await?;
        bail!("non-TLS client on intercept port");
    }

    // Take the SNI hostname from the client hello; fall back to the
    // CONNECT target for SNI-less clients.
    let acceptor = LazyConfigAcceptor::new(rustls::server::Acceptor::default(), stream);
    let start = acceptor.await.context("client hello failed")?;
    let sni = start.client_hello().server_name().map(str::to_string);
    let hostname = sni
        .or(connect_host)
        .context("no SNI hostname and no CONNECT target")?;

    // Issuance failure is fatal to this connection only.
    let config = ca
        .server_config_for(&hostname)
        .await
        .with_context(|| format!("certificate issuance failed for {hostname}"))?;
    let tls_stream = start
        .into_stream(config)
        .await
        .context("TLS handshake failed")?;
    debug!(host = %hostname, "TLS established");

    let (read_half, mut write_half) = tokio::io::split(tls_stream);
    let mut reader = BufReader::new(read_half);

    let Some(request) = read_http_request(&mut reader).await? else {
        return Ok(());
    };
    let url = resolve_target_url(&request, &hostname)?;
    debug!(method = %request.method, url = %url, "intercepted request");

    match upstreaming.as_ref() {
        Upstreaming::Direct(service) => {
            let response = service
                .handle(request.method, url, request.headers, request.body)
                .await;
            write_http_response(&mut write_half, &response).await?;
        }
        Upstreaming::Split { rewrite_port } => {
            relay_to_rewrite_endpoint(&mut write_half, &request, &url, *rewrite_port).await?;
        }
    }

    write_half.shutdown().await.ok();
    Ok(())
}

/// Consume the CONNECT request line and headers; returns the target host
/// (port stripped).
async fn read_connect_preamble(stream: &mut TcpStream) -> Result<String> {
    // Read byte-by-byte so nothing past the blank line is consumed.
    let mut preamble = Vec::new();
    let mut byte = [0u8; 1];
    while !preamble.ends_with(b"\r\n\r\n") {
        if preamble.len() > 8192 {
            bail!("oversized CONNECT preamble");
        }
        let n = stream.read(&mut byte).await?;
        if n == 0 {
            bail!("connection closed during CONNECT");
        }
        preamble.push(byte[0]);
    }

    let text = String::from_utf8_lossy(&preamble);
    let target = text
        .split_whitespace()
        .nth(1)
        .context("malformed CONNECT line")?;
    let host = target.split(':').next().unwrap_or(target);
    debug!(host = %host, "CONNECT preamble");
    Ok(host.to_string())
}

/// Build the upstream target URL for an intercepted request. The upstream
/// leg is always HTTPS.
fn resolve_target_url(request: &ParsedRequest, fallback_host: &str) -> Result<Url> {
    if request.target.starts_with("http://") || request.target.starts_with("https://") {
        return Url::parse(&request.target).context("invalid absolute request target");
    }
    let host = request
        .headers
        .get("host")
        .and_then(|v| v.to_str().ok())
        .unwrap_or(fallback_host)
        .trim_end_matches('.');
    Url::parse(&format!("https://{}{}", host, request.target)).context("invalid request target")
}

/// Split deployment: replay the request to the internal endpoint over
/// plain HTTP and stream its response back verbatim.
async fn relay_to_rewrite_endpoint<W>(
    client: &mut W,
    request: &ParsedRequest,
    url: &Url,
    rewrite_port: u16,
) -> Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let mut internal = TcpStream::connect(("127.0.0.1", rewrite_port))
        .await
        .context("internal rewrite endpoint unreachable")?;

    let path = match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    };

    let mut head = format!("{} {} HTTP/1.1\r\n", request.method, path);
    head.push_str(&format!(
        "host: {}\r\n",
        url.host_str().unwrap_or_default()
    ));
    for (name, value) in request.headers.iter() {
        if name == "host" || name == "connection" {
            continue;
        }
        if let Ok(v) = value.to_str() {
            head.push_str(&format!("{}: {}\r\n", name, v));
        }
    }
    head.push_str("connection: close\r\n\r\n");

    internal.write_all(head.as_bytes()).await?;
    if let Some(body) = &request.body {
        internal.write_all(body).await?;
    }
    internal.flush().await?;

    // The endpoint closes after one response.
    tokio::io::copy(&mut internal, client).await?;
    Ok(())
}
