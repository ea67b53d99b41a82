// TLS material loading.
//
// Turns optional CA bundle / client certificate / private key paths into a
// reusable rustls client configuration shared by the pooled reqwest
// transport and the dialed hyper transport.

use std::path::Path;
use std::sync::Arc;

use rustls::{ClientConfig, RootCertStore};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use tracing::debug;

use crate::error::Error;

/// A loaded, validated TLS client configuration.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    inner: Arc<ClientConfig>,
    custom_ca: bool,
    client_cert: bool,
}

impl TlsConfig {
    /// Load TLS material from any subset of CA, certificate and key paths.
    ///
    /// A CA bundle replaces the built-in web PKI roots. The certificate and
    /// key must be supplied together. With no paths at all the result
    /// trusts the default roots and presents no client certificate.
    pub fn load(ca: Option<&Path>, cert: Option<&Path>, key: Option<&Path>) -> Result<Self, Error> {
        let roots = match ca {
            Some(path) => load_roots(path)?,
            None => RootCertStore {
                roots: webpki_roots::TLS_SERVER_ROOTS.into(),
            },
        };

        let builder =
            ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
                .with_safe_default_protocol_versions()
                .map_err(|e| Error::Tls(format!("no usable protocol versions: {e}")))?
                .with_root_certificates(roots);

        let config = match (cert, key) {
            (Some(cert), Some(key)) => builder
                .with_client_auth_cert(load_certs(cert)?, load_key(key)?)
                .map_err(|e| Error::Tls(format!("client certificate rejected: {e}")))?,
            (None, None) => builder.with_no_client_auth(),
            (Some(cert), None) => {
                return Err(Error::Tls(format!(
                    "client certificate {} given without a private key",
                    cert.display()
                )));
            }
            (None, Some(key)) => {
                return Err(Error::Tls(format!(
                    "private key {} given without a client certificate",
                    key.display()
                )));
            }
        };

        debug!(
            custom_ca = ca.is_some(),
            client_cert = cert.is_some(),
            "loaded TLS configuration"
        );

        Ok(Self {
            inner: Arc::new(config),
            custom_ca: ca.is_some(),
            client_cert: cert.is_some(),
        })
    }

    /// Default configuration: web PKI roots, no client certificate.
    pub fn system_default() -> Result<Self, Error> {
        Self::load(None, None, None)
    }

    /// Shared rustls configuration.
    pub fn client_config(&self) -> Arc<ClientConfig> {
        Arc::clone(&self.inner)
    }

    /// Whether a CA bundle replaced the default trust roots.
    pub fn has_custom_ca(&self) -> bool {
        self.custom_ca
    }

    /// Whether a client certificate will be presented.
    pub fn has_client_cert(&self) -> bool {
        self.client_cert
    }
}

fn read_pem(path: &Path, what: &str) -> Result<Vec<u8>, Error> {
    std::fs::read(path)
        .map_err(|e| Error::Tls(format!("failed to read {what} {}: {e}", path.display())))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, Error> {
    let pem = read_pem(path, "certificate")?;
    let certs = CertificateDer::pem_slice_iter(&pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| Error::Tls(format!("invalid certificate {}: {e}", path.display())))?;
    if certs.is_empty() {
        return Err(Error::Tls(format!(
            "no PEM certificates found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

fn load_roots(path: &Path) -> Result<RootCertStore, Error> {
    let mut roots = RootCertStore::empty();
    for cert in load_certs(path)? {
        roots
            .add(cert)
            .map_err(|e| Error::Tls(format!("invalid CA certificate {}: {e}", path.display())))?;
    }
    Ok(roots)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, Error> {
    let pem = read_pem(path, "private key")?;
    PrivateKeyDer::from_pem_slice(&pem)
        .map_err(|e| Error::Tls(format!("invalid private key {}: {e}", path.display())))
}
