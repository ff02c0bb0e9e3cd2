//! Response body decoding.

use std::io::Read;

use bytes::Bytes;
use flate2::read::GzDecoder;
use tracing::warn;

/// Decode a response body according to its `Content-Encoding`.
///
/// Supports gzip and brotli. Unknown encodings and decode failures fall
/// back to the raw bytes as-is, a recovered condition rather than an error.
pub fn decode_body(raw: &[u8], content_encoding: Option<&str>) -> Bytes {
    let Some(encoding) = content_encoding else {
        return Bytes::copy_from_slice(raw);
    };
    let encoding = encoding.to_ascii_lowercase();

    if encoding.contains("gzip") {
        let mut decoded = Vec::new();
        match GzDecoder::new(raw).read_to_end(&mut decoded) {
            Ok(_) => return Bytes::from(decoded),
            Err(err) => {
                warn!(%err, "gzip decode failed, using raw body");
                return Bytes::copy_from_slice(raw);
            }
        }
    }

    if encoding.contains("br") {
        let mut decoded = Vec::new();
        match brotli::Decompressor::new(raw, 4096).read_to_end(&mut decoded) {
            Ok(_) => return Bytes::from(decoded),
            Err(err) => {
                warn!(%err, "brotli decode failed, using raw body");
                return Bytes::copy_from_slice(raw);
            }
        }
    }

    Bytes::copy_from_slice(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn passes_through_without_encoding() {
        assert_eq!(decode_body(b"plain", None), Bytes::from_static(b"plain"));
    }

    #[test]
    fn decodes_gzip() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"<html>hi</html>").unwrap();
        let compressed = encoder.finish().unwrap();

        let decoded = decode_body(&compressed, Some("gzip"));
        assert_eq!(decoded, Bytes::from_static(b"<html>hi</html>"));
    }

    #[test]
    fn corrupt_gzip_falls_back_to_raw() {
        let garbage = b"\x1f\x8b\x00definitely-not-gzip";
        let decoded = decode_body(garbage, Some("gzip"));
        assert_eq!(decoded, Bytes::copy_from_slice(garbage));
    }

    #[test]
    fn unknown_encoding_falls_back_to_raw() {
        let decoded = decode_body(b"zstd-data", Some("zstd"));
        assert_eq!(decoded, Bytes::from_static(b"zstd-data"));
    }
}
