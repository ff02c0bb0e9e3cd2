//! Proxy configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CspGateError, CspGateResult};

/// Policy synthesis mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    /// Hash-based allow-listing with broad compatibility sources.
    #[default]
    Compat,
    /// Per-response nonce; inline hashing suppressed.
    Nonce,
    /// Hash-based with hardened base rules; inline handlers forbidden.
    Strict,
}

/// Report-Only derivation style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStyle {
    /// Observe what a trusted-types/no-inline future policy would block.
    #[default]
    Monitor,
    /// Monitor plus loosened style/img/connect sources.
    Relaxed,
}

/// Deployment mode for the interception layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Deployment {
    /// Terminate TLS and run the rewrite pipeline in-process.
    #[default]
    Direct,
    /// Terminate TLS and forward to the internal rewrite endpoint.
    Split,
}

/// CSPGate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Policy synthesis mode.
    pub mode: PolicyMode,

    /// Emit a Content-Security-Policy-Report-Only header as well.
    pub add_report_only: bool,

    /// How far the report-only variant is loosened.
    pub report_style: ReportStyle,

    /// Violation report endpoint path.
    pub report_uri: String,

    /// Nonce value. Required for nonce mode; generated when absent.
    pub nonce: Option<String>,

    /// TLS intercept listen port.
    pub listen_port: u16,

    /// Internal plain-HTTP rewrite endpoint port.
    pub rewrite_port: u16,

    /// Direct or split deployment.
    pub deployment: Deployment,

    /// CA certificate PEM path.
    pub ca_cert_path: Option<PathBuf>,

    /// CA private key PEM path.
    pub ca_key_path: Option<PathBuf>,

    /// Timeout for the primary upstream page fetch.
    pub upstream_timeout: Duration,

    /// Timeout for best-effort CSS/JS dependency fetches.
    pub fetch_timeout: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            mode: PolicyMode::Compat,
            add_report_only: true,
            report_style: ReportStyle::Monitor,
            report_uri: "/csp-report".to_string(),
            nonce: None,
            listen_port: 3000,
            rewrite_port: 8080,
            deployment: Deployment::Direct,
            ca_cert_path: None,
            ca_key_path: None,
            upstream_timeout: Duration::from_secs(8),
            fetch_timeout: Duration::from_secs(5),
        }
    }
}

impl ProxyConfig {
    /// Build a configuration from `CSPGATE_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> CspGateResult<Self> {
        let mut config = Self::default();

        if let Ok(mode) = std::env::var("CSPGATE_MODE") {
            config.mode = match mode.to_lowercase().as_str() {
                "compat" => PolicyMode::Compat,
                "nonce" => PolicyMode::Nonce,
                "strict" => PolicyMode::Strict,
                other => {
                    return Err(CspGateError::config(format!(
                        "unknown CSPGATE_MODE: {other}"
                    )))
                }
            };
        }

        if let Ok(v) = std::env::var("CSPGATE_ADD_REPORT_ONLY") {
            config.add_report_only = parse_bool("CSPGATE_ADD_REPORT_ONLY", &v)?;
        }

        if let Ok(style) = std::env::var("CSPGATE_REPORT_STYLE") {
            config.report_style = match style.to_lowercase().as_str() {
                "monitor" => ReportStyle::Monitor,
                "relaxed" => ReportStyle::Relaxed,
                other => {
                    return Err(CspGateError::config(format!(
                        "unknown CSPGATE_REPORT_STYLE: {other}"
                    )))
                }
            };
        }

        if let Ok(uri) = std::env::var("CSPGATE_REPORT_URI") {
            config.report_uri = uri;
        }

        if let Ok(nonce) = std::env::var("CSPGATE_NONCE") {
            config.nonce = Some(nonce);
        }

        if let Ok(port) = std::env::var("CSPGATE_LISTEN_PORT") {
            config.listen_port = parse_port("CSPGATE_LISTEN_PORT", &port)?;
        }

        if let Ok(port) = std::env::var("CSPGATE_REWRITE_PORT") {
            config.rewrite_port = parse_port("CSPGATE_REWRITE_PORT", &port)?;
        }

        if let Ok(deploy) = std::env::var("CSPGATE_DEPLOYMENT") {
            config.deployment = match deploy.to_lowercase().as_str() {
                "direct" => Deployment::Direct,
                "split" => Deployment::Split,
                other => {
                    return Err(CspGateError::config(format!(
                        "unknown CSPGATE_DEPLOYMENT: {other}"
                    )))
                }
            };
        }

        if let Ok(path) = std::env::var("CSPGATE_CA_CERT") {
            config.ca_cert_path = Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var("CSPGATE_CA_KEY") {
            config.ca_key_path = Some(PathBuf::from(path));
        }

        if let Ok(secs) = std::env::var("CSPGATE_UPSTREAM_TIMEOUT_SECS") {
            config.upstream_timeout = Duration::from_secs(parse_secs("CSPGATE_UPSTREAM_TIMEOUT_SECS", &secs)?);
        }
        if let Ok(secs) = std::env::var("CSPGATE_FETCH_TIMEOUT_SECS") {
            config.fetch_timeout = Duration::from_secs(parse_secs("CSPGATE_FETCH_TIMEOUT_SECS", &secs)?);
        }

        Ok(config)
    }
}

fn parse_bool(name: &str, value: &str) -> CspGateResult<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(CspGateError::config(format!("{name} is not a boolean: {other}"))),
    }
}

fn parse_port(name: &str, value: &str) -> CspGateResult<u16> {
    value
        .parse()
        .map_err(|_| CspGateError::config(format!("{name} is not a port: {value}")))
}

fn parse_secs(name: &str, value: &str) -> CspGateResult<u64> {
    value
        .parse()
        .map_err(|_| CspGateError::config(format!("{name} is not a duration in seconds: {value}")))
}
