//! # GateKit HTTP
//!
//! Minimal async HTTP/1.1 client for the CSPGate upstream leg.
//!
//! A rewriting proxy needs the response exactly as the origin sent it:
//! raw status, raw headers (including `Transfer-Encoding` and
//! `Content-Encoding`), and the body bytes. So this client never follows
//! redirects, never decompresses, and fully buffers bodies (de-chunking
//! when the origin chunked them). TLS uses native-tls, per connection.

use std::io::Write;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Version};
use native_tls::TlsConnector as NativeTlsConnector;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_native_tls::TlsConnector;
use tracing::{debug, trace};
use url::Url;

/// HTTP client errors.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("TLS error: {0}")]
    TlsError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),
}

/// An upstream response, exactly as received (body de-chunked but
/// otherwise untouched).
#[derive(Debug)]
pub struct Response {
    /// HTTP status code.
    pub status: StatusCode,
    /// HTTP version.
    pub version: Version,
    /// Response headers as sent by the origin.
    pub headers: HeaderMap,
    /// Fully buffered body.
    pub body: Bytes,
    /// The URL this response came from.
    pub url: Url,
}

impl Response {
    /// Get a header value as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get content-type from headers.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Check if response is success (2xx).
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// HTTP client configuration.
#[derive(Clone)]
pub struct ClientConfig {
    /// User agent written when the caller supplies none.
    pub user_agent: String,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: "CSPGate/1.0".to_string(),
            timeout: Duration::from_secs(8),
        }
    }
}

/// Upstream HTTP client.
pub struct Client {
    config: ClientConfig,
    tls_connector: TlsConnector,
}

impl Client {
    /// Create a client with default configuration.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a client with custom configuration.
    pub fn with_config(config: ClientConfig) -> Result<Self, HttpError> {
        let native_connector =
            NativeTlsConnector::new().map_err(|e| HttpError::TlsError(e.to_string()))?;

        Ok(Self {
            config,
            tls_connector: TlsConnector::from(native_connector),
        })
    }

    /// Perform a request and buffer the full response.
    ///
    /// Redirects are not followed; a proxy passes 3xx through to its
    /// client. `Connection: close` is always written; `Host`,
    /// `Content-Length`, and hop-by-hop entries in `headers` are ignored.
    pub async fn request(
        &self,
        method: Method,
        url: &Url,
        headers: &HeaderMap,
        body: Option<Bytes>,
    ) -> Result<Response, HttpError> {
        let scheme = url.scheme();
        let host = url
            .host_str()
            .ok_or_else(|| HttpError::InvalidUrl("missing host".to_string()))?
            .to_string();
        let port = url
            .port_or_known_default()
            .unwrap_or(if scheme == "https" { 443 } else { 80 });

        debug!(method = %method, url = %url, "upstream request");

        let response = timeout(self.config.timeout, async {
            match scheme {
                "https" => {
                    self.request_https(&host, port, &method, url, headers, &body)
                        .await
                }
                "http" => {
                    self.request_http(&host, port, &method, url, headers, &body)
                        .await
                }
                other => Err(HttpError::UnsupportedScheme(other.to_string())),
            }
        })
        .await
        .map_err(|_| HttpError::Timeout)??;

        Ok(Response {
            status: response.status,
            version: response.version,
            headers: response.headers,
            body: response.body,
            url: url.clone(),
        })
    }

    async fn request_https(
        &self,
        host: &str,
        port: u16,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        body: &Option<Bytes>,
    ) -> Result<RawResponse, HttpError> {
        let addr = format!("{}:{}", host, port);
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| HttpError::ConnectionFailed(e.to_string()))?;

        let tls_stream = self
            .tls_connector
            .connect(host, stream)
            .await
            .map_err(|e| HttpError::TlsError(e.to_string()))?;

        self.send_request(tls_stream, host, method, url, headers, body)
            .await
    }

    async fn request_http(
        &self,
        host: &str,
        port: u16,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        body: &Option<Bytes>,
    ) -> Result<RawResponse, HttpError> {
        let addr = format!("{}:{}", host, port);
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| HttpError::ConnectionFailed(e.to_string()))?;

        self.send_request(stream, host, method, url, headers, body)
            .await
    }

    async fn send_request<S>(
        &self,
        stream: S,
        host: &str,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        body: &Option<Bytes>,
    ) -> Result<RawResponse, HttpError>
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    {
        let (reader, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(reader);

        let path = if let Some(query) = url.query() {
            format!("{}?{}", url.path(), query)
        } else {
            url.path().to_string()
        };
        let path = if path.is_empty() { "/" } else { &path };

        let mut request = Vec::new();
        writeln!(request, "{} {} HTTP/1.1\r", method, path)?;
        writeln!(request, "Host: {}\r", host)?;
        writeln!(request, "Connection: close\r")?;

        for (name, value) in headers.iter() {
            if skip_request_header(name) {
                continue;
            }
            if let Ok(v) = value.to_str() {
                writeln!(request, "{}: {}\r", name, v)?;
            }
        }

        if !headers.contains_key("user-agent") {
            writeln!(request, "User-Agent: {}\r", self.config.user_agent)?;
        }
        if !headers.contains_key("accept") {
            writeln!(request, "Accept: */*\r")?;
        }
        if !headers.contains_key("accept-encoding") {
            writeln!(request, "Accept-Encoding: identity\r")?;
        }
        if let Some(b) = body {
            writeln!(request, "Content-Length: {}\r", b.len())?;
        }
        writeln!(request, "\r")?;

        writer.write_all(&request).await?;
        if let Some(b) = body {
            writer.write_all(b).await?;
        }
        writer.flush().await?;

        let mut status_line = String::new();
        reader.read_line(&mut status_line).await?;
        let (version, status) = parse_status_line(&status_line)?;

        let mut response_headers = HeaderMap::new();
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
                    response_headers.append(n, v);
                }
            }
        }

        let body = read_body(&mut reader, &response_headers).await?;

        trace!(status = %status, body_len = body.len(), "upstream response");

        Ok(RawResponse {
            status,
            version,
            headers: response_headers,
            body,
        })
    }
}

/// Headers the client owns: it writes its own framing and connection
/// control, so caller copies of these are dropped.
fn skip_request_header(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "host" | "connection" | "content-length" | "transfer-encoding" | "expect"
    )
}

/// Raw response before the URL is attached.
struct RawResponse {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
}

/// Parse HTTP status line.
fn parse_status_line(line: &str) -> Result<(Version, StatusCode), HttpError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 2 {
        return Err(HttpError::InvalidResponse("invalid status line".to_string()));
    }

    let version = match parts[0] {
        "HTTP/1.0" => Version::HTTP_10,
        "HTTP/1.1" => Version::HTTP_11,
        "HTTP/2" | "HTTP/2.0" => Version::HTTP_2,
        _ => Version::HTTP_11,
    };

    let status_code: u16 = parts[1]
        .parse()
        .map_err(|_| HttpError::InvalidResponse("invalid status code".to_string()))?;

    let status = StatusCode::from_u16(status_code)
        .map_err(|_| HttpError::InvalidResponse("invalid status code".to_string()))?;

    Ok((version, status))
}

/// Read the response body based on headers.
async fn read_body<R: tokio::io::AsyncBufRead + Unpin>(
    reader: &mut R,
    headers: &HeaderMap,
) -> Result<Bytes, HttpError> {
    if let Some(te) = headers.get("transfer-encoding").and_then(|v| v.to_str().ok()) {
        if te.to_lowercase().contains("chunked") {
            return read_chunked_body(reader).await;
        }
    }

    if let Some(len) = headers
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<usize>().ok())
    {
        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf).await?;
        return Ok(Bytes::from(buf));
    }

    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await?;
    Ok(Bytes::from(buf))
}

/// Read a chunked transfer encoding body.
async fn read_chunked_body<R: tokio::io::AsyncBufRead + Unpin>(
    reader: &mut R,
) -> Result<Bytes, HttpError> {
    let mut body = Vec::new();

    loop {
        let mut size_line = String::new();
        reader.read_line(&mut size_line).await?;

        // Chunk extensions after ';' are ignored.
        let size_str = size_line.trim().split(';').next().unwrap_or("");
        let size = usize::from_str_radix(size_str, 16)
            .map_err(|_| HttpError::InvalidResponse("invalid chunk size".to_string()))?;

        if size == 0 {
            let mut trailer = String::new();
            let _ = reader.read_line(&mut trailer).await;
            break;
        }

        let mut chunk = vec![0u8; size];
        reader.read_exact(&mut chunk).await?;
        body.extend_from_slice(&chunk);

        let mut crlf = [0u8; 2];
        let _ = reader.read_exact(&mut crlf).await;
    }

    Ok(Bytes::from(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_line() {
        let (version, status) = parse_status_line("HTTP/1.1 200 OK\r\n").unwrap();
        assert_eq!(version, Version::HTTP_11);
        assert_eq!(status, StatusCode::OK);

        let (version, status) = parse_status_line("HTTP/1.0 404 Not Found").unwrap();
        assert_eq!(version, Version::HTTP_10);
        assert_eq!(status, StatusCode::NOT_FOUND);

        assert!(parse_status_line("garbage").is_err());
    }

    #[tokio::test]
    async fn reads_content_length_body() {
        let mut input = std::io::Cursor::new(b"hello world".to_vec());
        let mut headers = HeaderMap::new();
        headers.insert("content-length", HeaderValue::from_static("5"));
        let mut reader = BufReader::new(&mut input);
        let body = read_body(&mut reader, &headers).await.unwrap();
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn reads_chunked_body() {
        let raw = b"5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n".to_vec();
        let mut input = std::io::Cursor::new(raw);
        let mut headers = HeaderMap::new();
        headers.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        let mut reader = BufReader::new(&mut input);
        let body = read_body(&mut reader, &headers).await.unwrap();
        assert_eq!(&body[..], b"hello world");
    }

    #[tokio::test]
    async fn reads_to_eof_without_framing() {
        let mut input = std::io::Cursor::new(b"streamed".to_vec());
        let headers = HeaderMap::new();
        let mut reader = BufReader::new(&mut input);
        let body = read_body(&mut reader, &headers).await.unwrap();
        assert_eq!(&body[..], b"streamed");
    }

    #[test]
    fn skips_owned_request_headers() {
        assert!(skip_request_header(&HeaderName::from_static("host")));
        assert!(skip_request_header(&HeaderName::from_static("connection")));
        assert!(!skip_request_header(&HeaderName::from_static("accept")));
    }

    #[test]
    fn client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.user_agent, "CSPGate/1.0");
        assert_eq!(config.timeout, Duration::from_secs(8));
    }
}
