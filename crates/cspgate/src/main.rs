//! CSPGate: a CSP-synthesizing intercepting proxy.
//!
//! Startup wiring only: configuration from the environment, logging,
//! CA material, then the listeners. Everything interesting lives in the
//! gatekit crates.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use cspgate_core::{
    init_logging, CspGateError, Deployment, LogConfig, PolicyMode, ProxyConfig, ReportStyle,
};
use gatekit_http::{Client, ClientConfig};
use gatekit_intercept::{CertificateAuthority, InterceptServer, Upstreaming};
use gatekit_policy::{Mode, ReportOnlyStyle};
use gatekit_rewrite::{RewriteOptions, RewriteServer, RewriteService, SubresourceFetcher};

fn policy_mode(mode: PolicyMode) -> Mode {
    match mode {
        PolicyMode::Compat => Mode::Compat,
        PolicyMode::Nonce => Mode::Nonce,
        PolicyMode::Strict => Mode::Strict,
    }
}

fn report_style(style: ReportStyle) -> ReportOnlyStyle {
    match style {
        ReportStyle::Monitor => ReportOnlyStyle::Monitor,
        ReportStyle::Relaxed => ReportOnlyStyle::Relaxed,
    }
}

fn load_ca(config: &ProxyConfig) -> Result<CertificateAuthority> {
    match (&config.ca_cert_path, &config.ca_key_path) {
        (Some(cert_path), Some(key_path)) => {
            CertificateAuthority::from_files(cert_path, key_path)
                .map_err(|e| CspGateError::certificate(e.to_string()).into())
        }
        _ => {
            let ca = CertificateAuthority::generate()
                .map_err(|e| CspGateError::certificate(e.to_string()))?;
            info!("no CA paths configured; generated an ephemeral CA");
            Ok(ca)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(LogConfig::default());

    let config = ProxyConfig::from_env().context("invalid configuration")?;
    info!(
        mode = ?config.mode,
        deployment = ?config.deployment,
        listen_port = config.listen_port,
        "starting cspgate"
    );

    let ca = load_ca(&config)?;
    // Stale leaf material never survives a restart.
    ca.clear_cache();
    let ca = Arc::new(ca);

    let options = RewriteOptions {
        mode: policy_mode(config.mode),
        add_report_only: config.add_report_only,
        report_style: report_style(config.report_style),
        report_uri: config.report_uri.clone(),
        nonce: config.nonce.clone(),
    };

    let fetcher = SubresourceFetcher::new(config.fetch_timeout)?;
    let upstream = Client::with_config(ClientConfig {
        timeout: config.upstream_timeout,
        ..ClientConfig::default()
    })
    .map_err(|e| CspGateError::upstream(e.to_string()))?;

    let service = Arc::new(RewriteService::new(options, fetcher, upstream));

    match config.deployment {
        Deployment::Direct => {
            let intercept = InterceptServer::new(
                ca,
                Upstreaming::Direct(service),
                config.listen_port,
            );
            intercept.run().await
        }
        Deployment::Split => {
            let rewrite = RewriteServer::new(Arc::clone(&service), config.rewrite_port);
            let intercept = InterceptServer::new(
                ca,
                Upstreaming::Split {
                    rewrite_port: config.rewrite_port,
                },
                config.listen_port,
            );
            let (rewrite_result, intercept_result) =
                tokio::join!(rewrite.run(), intercept.run());
            rewrite_result?;
            intercept_result
        }
    }
}
