//! # GateKit JS
//!
//! JavaScript scanner for CSPGate.
//!
//! Syntactic pattern matching, not evaluation: a lexer turns a script into
//! tokens, and a shape scanner recognizes the call and assignment forms
//! whose arguments are string literals. Computed arguments are not
//! resolved, an accepted under-approximation. Malformed scripts are scan
//! errors that the pipeline recovers from with the fallback policy.

pub mod lexer;
pub mod scan;

pub use lexer::{lex, JsToken};
pub use scan::{scan_dynamic_refs, DynamicRef};

use thiserror::Error;

/// Errors that can occur while scanning JavaScript.
#[derive(Error, Debug, Clone)]
pub enum ScanError {
    #[error("Lex error: {0}")]
    LexError(String),
}
