//! Certificate authority and leaf certificate cache.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    KeyUsagePurpose, SanType,
};
use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio::sync::OnceCell;
use tracing::{debug, info};

type CachedConfig = Arc<rustls::ServerConfig>;

/// Certificate authority for minting per-host leaf certificates.
///
/// The cache maps hostname to a ready TLS server configuration carrying
/// the full chain (leaf + CA). Issuance is single-flight per hostname:
/// concurrent handshakes for the same uncached host await one issuance
/// instead of racing to mint duplicates. Entries live for the process
/// lifetime; [`CertificateAuthority::clear_cache`] runs once at startup.
pub struct CertificateAuthority {
    ca_cert: Certificate,
    ca_key: KeyPair,
    ca_cert_pem: String,
    cache: Mutex<HashMap<String, Arc<OnceCell<CachedConfig>>>>,
}

fn ca_params() -> CertificateParams {
    let mut params = CertificateParams::default();
    params.is_ca = IsCa::Ca(BasicConstraints::Constrained(0));
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
    ];

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, "CSPGate Proxy CA");
    dn.push(DnType::OrganizationName, "CSPGate");
    params.distinguished_name = dn;
    params
}

impl CertificateAuthority {
    /// Generate a fresh CA key pair and certificate.
    pub fn generate() -> Result<Self> {
        let key_pair = KeyPair::generate().context("failed to generate CA key")?;
        let ca_cert = ca_params()
            .self_signed(&key_pair)
            .context("failed to self-sign CA certificate")?;
        let ca_cert_pem = ca_cert.pem();
        info!("generated fresh proxy CA");

        Ok(Self {
            ca_cert,
            ca_key: key_pair,
            ca_cert_pem,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Load the CA from PEM files. The private key is authoritative: the
    /// CA certificate is rebuilt deterministically around it.
    pub fn from_files(cert_path: &Path, key_path: &Path) -> Result<Self> {
        let _cert_pem = fs::read_to_string(cert_path)
            .with_context(|| format!("failed to read CA certificate {}", cert_path.display()))?;
        let key_pem = fs::read_to_string(key_path)
            .with_context(|| format!("failed to read CA private key {}", key_path.display()))?;

        let key_pair = KeyPair::from_pem(&key_pem).context("failed to parse CA private key")?;
        let ca_cert = ca_params()
            .self_signed(&key_pair)
            .context("failed to rebuild CA certificate")?;
        let ca_cert_pem = ca_cert.pem();
        info!(cert = %cert_path.display(), "loaded proxy CA");

        Ok(Self {
            ca_cert,
            ca_key: key_pair,
            ca_cert_pem,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Persist the CA pair for trust-store installation.
    pub fn save_to_files(&self, cert_path: &Path, key_path: &Path) -> Result<()> {
        if let Some(parent) = cert_path.parent() {
            fs::create_dir_all(parent).context("failed to create CA directory")?;
        }
        fs::write(cert_path, self.ca_cert_pem.as_bytes())
            .context("failed to write CA certificate")?;
        fs::write(key_path, self.ca_key.serialize_pem().as_bytes())
            .context("failed to write CA private key")?;
        Ok(())
    }

    /// The CA certificate PEM (what the browser trust store needs).
    pub fn ca_cert_pem(&self) -> &str {
        &self.ca_cert_pem
    }

    /// Drop all cached leaf configurations.
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    /// Number of cached hostnames.
    pub fn cached_hosts(&self) -> usize {
        self.cache.lock().len()
    }

    /// Fetch or issue the TLS server configuration for a hostname.
    pub async fn server_config_for(&self, hostname: &str) -> Result<CachedConfig> {
        let cell = {
            let mut cache = self.cache.lock();
            Arc::clone(
                cache
                    .entry(hostname.to_string())
                    .or_insert_with(|| Arc::new(OnceCell::new())),
            )
        };

        let config = cell
            .get_or_try_init(|| async { self.issue(hostname) })
            .await?;
        Ok(Arc::clone(config))
    }

    /// Mint a leaf certificate for a hostname and build the server
    /// configuration serving the full chain.
    fn issue(&self, hostname: &str) -> Result<CachedConfig> {
        debug!(host = %hostname, "issuing leaf certificate");

        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, hostname);
        params.distinguished_name = dn;

        params.subject_alt_names = vec![SanType::DnsName(
            hostname
                .try_into()
                .context("hostname is not a valid SAN")?,
        )];
        if let Ok(ip) = hostname.parse::<std::net::IpAddr>() {
            params.subject_alt_names.push(SanType::IpAddress(ip));
        }

        let key_pair = KeyPair::generate().context("failed to generate leaf key")?;
        let cert = params
            .signed_by(&key_pair, &self.ca_cert, &self.ca_key)
            .context("failed to sign leaf certificate")?;

        // Full chain: some clients reject a bare leaf from an unknown
        // intermediate.
        let chain: Vec<CertificateDer<'static>> =
            vec![cert.der().clone(), self.ca_cert.der().clone()];
        let key: PrivateKeyDer<'static> =
            PrivatePkcs8KeyDer::from(key_pair.serialize_der()).into();

        let mut config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(chain, key)
            .context("failed to build TLS server config")?;
        config.alpn_protocols = vec![b"http/1.1".to_vec()];

        Ok(Arc::new(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_ca() {
        let ca = CertificateAuthority::generate().unwrap();
        assert!(ca.ca_cert_pem().contains("BEGIN CERTIFICATE"));
    }

    #[tokio::test]
    async fn issues_and_caches_per_host() {
        let ca = CertificateAuthority::generate().unwrap();
        let a = ca.server_config_for("example.com").await.unwrap();
        let b = ca.server_config_for("example.com").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(ca.cached_hosts(), 1);

        ca.server_config_for("other.test").await.unwrap();
        assert_eq!(ca.cached_hosts(), 2);
    }

    #[tokio::test]
    async fn concurrent_issuance_is_single_flight() {
        let ca = Arc::new(CertificateAuthority::generate().unwrap());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let ca = Arc::clone(&ca);
            handles.push(tokio::spawn(async move {
                ca.server_config_for("race.test").await.unwrap()
            }));
        }
        let mut configs = Vec::new();
        for handle in handles {
            configs.push(handle.await.unwrap());
        }
        for config in &configs[1..] {
            assert!(Arc::ptr_eq(&configs[0], config));
        }
    }

    #[tokio::test]
    async fn clear_cache_forces_reissue() {
        let ca = CertificateAuthority::generate().unwrap();
        let a = ca.server_config_for("example.com").await.unwrap();
        ca.clear_cache();
        assert_eq!(ca.cached_hosts(), 0);
        let b = ca.server_config_for("example.com").await.unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn round_trips_through_files() {
        let dir = std::env::temp_dir().join("cspgate-ca-test");
        let cert = dir.join("ca.crt");
        let key = dir.join("ca.key");

        let ca = CertificateAuthority::generate().unwrap();
        ca.save_to_files(&cert, &key).unwrap();

        let loaded = CertificateAuthority::from_files(&cert, &key).unwrap();
        assert!(loaded.ca_cert_pem().contains("BEGIN CERTIFICATE"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
