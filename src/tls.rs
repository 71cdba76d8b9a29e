use std::io::Cursor;
use std::path::Path;

use reqwest::{Certificate, ClientBuilder as ReqwestBuilder};

use crate::error::{Error, Result};

/// A set of trusted root certificates loaded from PEM data
///
/// When installed on a transport, the built-in roots are switched off so
/// server certificates are verified against exactly these certificates.
/// Verification itself is never disabled.
#[derive(Debug, Clone)]
pub struct TrustStore {
    certs: Vec<Certificate>,
}

impl TrustStore {
    /// Load every certificate from a PEM bundle on disk
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| Error::trust_store(path, format!("couldn't load pem file: {}", e)))?;

        Self::parse(&data).map_err(|message| Error::trust_store(path, message))
    }

    /// Load every certificate from an in-memory PEM bundle
    pub fn from_pem(data: &[u8]) -> Result<Self> {
        Self::parse(data).map_err(|message| Error::trust_store("<memory>", message))
    }

    fn parse(data: &[u8]) -> std::result::Result<Self, String> {
        let mut reader = Cursor::new(data);
        let mut certs = Vec::new();

        for (index, der) in rustls_pemfile::certs(&mut reader).enumerate() {
            let der = der.map_err(|e| format!("malformed PEM data: {}", e))?;
            let cert = Certificate::from_der(der.as_ref())
                .map_err(|e| format!("invalid certificate #{}: {}", index + 1, e))?;
            Self::check(&cert).map_err(|e| format!("invalid certificate #{}: {}", index + 1, e))?;
            certs.push(cert);
        }

        if certs.is_empty() {
            return Err("no certificates found in PEM data".to_string());
        }

        Ok(Self { certs })
    }

    /// Reject DER the TLS backend cannot install as a root
    fn check(cert: &Certificate) -> std::result::Result<(), reqwest::Error> {
        reqwest::Client::builder()
            .tls_built_in_root_certs(false)
            .add_root_certificate(cert.clone())
            .build()
            .map(drop)
    }

    #[cfg(test)]
    pub(crate) fn from_der_unchecked(der: &[u8]) -> Self {
        Self {
            certs: vec![Certificate::from_der(der).unwrap()],
        }
    }

    /// Number of certificates in the store
    pub fn len(&self) -> usize {
        self.certs.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    /// Apply this trust store to a reqwest client builder
    pub fn apply_to_builder(&self, builder: ReqwestBuilder) -> ReqwestBuilder {
        self.certs
            .iter()
            .cloned()
            .fold(builder.tls_built_in_root_certs(false), |builder, cert| {
                builder.add_root_certificate(cert)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

    #[test]
    fn test_load_single_certificate() {
        let store = TrustStore::from_pem_file(format!("{}/ca.pem", FIXTURES)).unwrap();
        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
    }

    #[test]
    fn test_load_bundle() {
        let store = TrustStore::from_pem_file(format!("{}/bundle.pem", FIXTURES)).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_missing_file() {
        let path = std::env::temp_dir().join("httpwrap_non_existent_cert.pem");
        let err = TrustStore::from_pem_file(&path).unwrap_err();
        assert!(err.is_trust_store());
    }

    #[test]
    fn test_no_certificates() {
        let err = TrustStore::from_pem(b"just some text\n").unwrap_err();
        assert!(err.is_trust_store());
        assert!(err.to_string().contains("no certificates"));
    }

    #[test]
    fn test_garbage_inside_pem_armor() {
        let pem = b"-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n";
        let err = TrustStore::from_pem(pem).unwrap_err();
        assert!(err.is_trust_store());
        assert!(err.to_string().contains("invalid certificate #1"));
    }

    #[test]
    fn test_apply_to_builder() {
        let store = TrustStore::from_pem_file(format!("{}/ca.pem", FIXTURES)).unwrap();
        let client = store.apply_to_builder(reqwest::Client::builder()).build();
        assert!(client.is_ok());
    }
}
