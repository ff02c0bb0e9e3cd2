//! Inline content hashing and nonce generation.
//!
//! Browsers hash inline content exactly as the DOM exposes it at parse
//! time, and that serialization is newline-sensitive. The analyzer cannot
//! know which form the browser will see, so every byte-identical variant
//! a browser may plausibly hash gets its own token.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Compute the set of hashing variants for a piece of inline content:
/// BOM-stripped, CRLF-normalized, and with the trailing newline flipped.
/// Empty variants are dropped; order is deterministic and duplicates are
/// removed while preserving first occurrence.
pub fn hash_variants(content: &str) -> Vec<String> {
    let no_bom = content.strip_prefix('\u{feff}').unwrap_or(content);
    let lf = no_bom.replace("\r\n", "\n");

    let flip = |s: &str| -> String {
        match s.strip_suffix('\n') {
            Some(stripped) => stripped.to_string(),
            None => format!("{s}\n"),
        }
    };

    let candidates = [
        no_bom.to_string(),
        lf.clone(),
        flip(no_bom),
        flip(&lf),
    ];

    let mut out: Vec<String> = Vec::new();
    for candidate in candidates {
        if !candidate.is_empty() && !out.contains(&candidate) {
            out.push(candidate);
        }
    }
    out
}

/// Base64-encoded SHA-256 digest of the given content.
pub fn sha256_token(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    STANDARD.encode(digest)
}

/// Generate a random base64 nonce (16 bytes of entropy).
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_without_trailing_newline() {
        let variants = hash_variants("alert(1)");
        assert_eq!(variants, vec!["alert(1)".to_string(), "alert(1)\n".to_string()]);
    }

    #[test]
    fn variants_with_trailing_newline() {
        let variants = hash_variants("alert(1)\n");
        assert_eq!(variants, vec!["alert(1)\n".to_string(), "alert(1)".to_string()]);
    }

    #[test]
    fn variants_strip_bom() {
        let variants = hash_variants("\u{feff}alert(1)");
        for v in &variants {
            assert!(!v.starts_with('\u{feff}'));
        }
    }

    #[test]
    fn variants_normalize_crlf() {
        let variants = hash_variants("a();\r\nb();");
        assert!(variants.contains(&"a();\nb();".to_string()));
        // The raw CRLF form is also kept: the browser may see either.
        assert!(variants.contains(&"a();\r\nb();".to_string()));
    }

    #[test]
    fn empty_content_has_no_variants_except_newline() {
        let variants = hash_variants("");
        assert_eq!(variants, vec!["\n".to_string()]);
    }

    #[test]
    fn sha256_token_is_known_digest() {
        // echo -n 'alert(1)' | openssl dgst -sha256 -binary | openssl base64
        assert_eq!(sha256_token("alert(1)"), "bhHHL3z2vDgxUt0W3dWQOrprscmda2Y5pLsLg4GF+pI=");
    }

    #[test]
    fn nonces_are_distinct() {
        assert_ne!(generate_nonce(), generate_nonce());
        assert!(!generate_nonce().is_empty());
    }
}
