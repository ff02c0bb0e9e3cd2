//! # GateKit HTML
//!
//! HTML document scanner for CSPGate.
//!
//! Policy collection needs element/attribute pairs and the raw text of
//! inline `<script>`/`<style>` elements, not a DOM tree. The tokenizer
//! turns markup into a flat token stream and [`Document`] collects it into
//! a queryable element list. Two additional raw-markup scans run over the
//! byte-identical input, because a tolerant tokenizer may normalize away
//! content the enforcing browser would still see.

pub mod document;
pub mod tokenizer;

mod raw;

pub use document::{Document, Element};
pub use raw::{dev_origin_literals, raw_inline_scripts};
pub use tokenizer::{tokenize, Token};
