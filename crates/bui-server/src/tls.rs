//! Optional TLS termination using rustls

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use serde::{Deserialize, Serialize};
use tokio_rustls::TlsAcceptor;
use tracing::info;

/// TLS configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Certificate chain (PEM)
    pub cert_path: Option<String>,
    /// Private key (PEM, PKCS#8, PKCS#1 or SEC1)
    pub key_path: Option<String>,
}

impl TlsConfig {
    pub fn with_certs(cert_path: &str, key_path: &str) -> Self {
        Self {
            cert_path: Some(cert_path.to_string()),
            key_path: Some(key_path.to_string()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.cert_path.is_some()
    }
}

fn load_certs(path: &Path) -> anyhow::Result<Vec<CertificateDer<'static>>> {
    let mut reader = BufReader::new(File::open(path)?);
    let certs = rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        anyhow::bail!("No certificate found in {}", path.display());
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> anyhow::Result<PrivateKeyDer<'static>> {
    let mut reader = BufReader::new(File::open(path)?);
    rustls_pemfile::private_key(&mut reader)?
        .ok_or_else(|| anyhow::anyhow!("No valid private key found in {}", path.display()))
}

/// Build a TLS acceptor, or `None` when TLS is disabled
pub fn create_tls_acceptor(config: &TlsConfig) -> anyhow::Result<Option<TlsAcceptor>> {
    let Some(cert_path) = &config.cert_path else {
        return Ok(None);
    };
    let key_path = config
        .key_path
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("tls.key_path is required when tls.cert_path is set"))?;

    let certs = load_certs(Path::new(cert_path))?;
    let key = load_private_key(Path::new(key_path))?;

    let mut server_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    server_config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    info!("TLS enabled with certificate {}", cert_path);
    Ok(Some(TlsAcceptor::from(Arc::new(server_config))))
}
