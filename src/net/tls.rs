//! Trust material loading.
//!
//! # Responsibilities
//! - Load the operator-supplied CA bundle (the only trust anchors)
//! - Load the optional client identity used for mutual TLS
//!
//! Failures here are startup errors: the gateway refuses to run without a
//! trust anchor.

use std::fs;
use std::path::Path;

use reqwest::{Certificate, Identity};

use crate::config::TlsIdentityConfig;
use crate::error::{GatewayError, GatewayResult};

/// Load every certificate from a PEM bundle.
pub fn load_ca_bundle(path: &Path) -> GatewayResult<Vec<Certificate>> {
    let pem = fs::read(path)
        .map_err(|e| trust_error(path, format!("cannot read CA bundle: {}", e)))?;

    let mut reader = pem.as_slice();
    let ders = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| trust_error(path, format!("malformed PEM: {}", e)))?;

    if ders.is_empty() {
        return Err(trust_error(path, "no certificates found in bundle"));
    }

    let roots = ders
        .iter()
        .map(|der| Certificate::from_der(der.as_ref()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| trust_error(path, format!("invalid certificate: {}", e)))?;

    tracing::debug!(path = %path.display(), count = roots.len(), "Loaded CA bundle");
    Ok(roots)
}

/// Load a client certificate chain and private key for mutual TLS.
pub fn load_client_identity(config: &TlsIdentityConfig) -> GatewayResult<Identity> {
    let cert_path = Path::new(&config.cert_path);
    let key_path = Path::new(&config.key_path);

    let cert_pem = fs::read(cert_path)
        .map_err(|e| trust_error(cert_path, format!("cannot read client certificate: {}", e)))?;
    let key_pem = fs::read(key_path)
        .map_err(|e| trust_error(key_path, format!("cannot read client key: {}", e)))?;

    let mut reader = cert_pem.as_slice();
    let chain = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| trust_error(cert_path, format!("malformed PEM: {}", e)))?;
    if chain.is_empty() {
        return Err(trust_error(cert_path, "no certificates found"));
    }

    let mut reader = key_pem.as_slice();
    match rustls_pemfile::private_key(&mut reader) {
        Ok(Some(_)) => {}
        Ok(None) => return Err(trust_error(key_path, "no private key found")),
        Err(e) => return Err(trust_error(key_path, format!("malformed PEM: {}", e))),
    }

    let mut combined = cert_pem;
    combined.push(b'\n');
    combined.extend_from_slice(&key_pem);

    Identity::from_pem(&combined)
        .map_err(|e| trust_error(cert_path, format!("invalid client identity: {}", e)))
}

fn trust_error(path: &Path, reason: impl Into<String>) -> GatewayError {
    GatewayError::TrustConfiguration {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}
