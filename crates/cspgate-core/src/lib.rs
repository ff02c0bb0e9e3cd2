//! # CSPGate Core
//!
//! Configuration, error types, and logging setup shared by the CSPGate
//! proxy binary and servers.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{Deployment, PolicyMode, ProxyConfig, ReportStyle};
pub use error::{CspGateError, CspGateResult};
pub use logging::{init_logging, LogConfig, LogFormat};
