//! CSP source expressions.

use std::fmt;

use crate::origin::Origin;

/// A single source expression inside a directive's allow-list.
///
/// Syntactically one of: keyword, scheme wildcard, origin, hash token,
/// nonce token. The derived ordering is only used to make serialized
/// token order deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SourceExpr {
    /// `'self'`
    SelfSource,
    /// `'none'`
    NoneSource,
    /// `'unsafe-inline'`
    UnsafeInline,
    /// `'unsafe-eval'`
    UnsafeEval,
    /// `'unsafe-hashes'`, required for browsers to honor attribute hashes.
    UnsafeHashes,
    /// `'strict-dynamic'`
    StrictDynamic,
    /// `'script'`, the value of `require-trusted-types-for`.
    TrustedScript,
    /// `*`
    Wildcard,
    /// Scheme wildcard such as `https:`, `data:`, `blob:`.
    Scheme(&'static str),
    /// Normalized `scheme://host[:port]`.
    Origin(Origin),
    /// `'sha256-<base64 digest>'`
    Sha256(String),
    /// `'nonce-<base64 value>'`
    Nonce(String),
    /// Bare trusted-types policy name, e.g. `default`.
    PolicyName(String),
}

impl fmt::Display for SourceExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceExpr::SelfSource => f.write_str("'self'"),
            SourceExpr::NoneSource => f.write_str("'none'"),
            SourceExpr::UnsafeInline => f.write_str("'unsafe-inline'"),
            SourceExpr::UnsafeEval => f.write_str("'unsafe-eval'"),
            SourceExpr::UnsafeHashes => f.write_str("'unsafe-hashes'"),
            SourceExpr::StrictDynamic => f.write_str("'strict-dynamic'"),
            SourceExpr::TrustedScript => f.write_str("'script'"),
            SourceExpr::Wildcard => f.write_str("*"),
            SourceExpr::Scheme(scheme) => f.write_str(scheme),
            SourceExpr::Origin(origin) => write!(f, "{}", origin),
            SourceExpr::Sha256(digest) => write!(f, "'sha256-{}'", digest),
            SourceExpr::Nonce(value) => write!(f, "'nonce-{}'", value),
            SourceExpr::PolicyName(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_tokens() {
        assert_eq!(SourceExpr::SelfSource.to_string(), "'self'");
        assert_eq!(SourceExpr::Scheme("https:").to_string(), "https:");
        assert_eq!(SourceExpr::Wildcard.to_string(), "*");
        assert_eq!(
            SourceExpr::Sha256("abc123=".to_string()).to_string(),
            "'sha256-abc123='"
        );
        assert_eq!(
            SourceExpr::Nonce("r4nd0m".to_string()).to_string(),
            "'nonce-r4nd0m'"
        );
    }
}
