//! # GateKit Intercept
//!
//! TLS interception layer for CSPGate: terminates client TLS with leaf
//! certificates minted on demand and chained to a local CA, reads the
//! decrypted request, and hands it to the rewrite pipeline (direct
//! deployment) or relays it to the internal rewrite endpoint (split
//! deployment).

pub mod ca;
pub mod proxy;

pub use ca::CertificateAuthority;
pub use proxy::{InterceptServer, Upstreaming};
