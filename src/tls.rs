use crate::error::ServerError;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

pub fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>, ServerError> {
    let mut reader = BufReader::new(
        File::open(path).map_err(|e| ServerError::Tls(format!("Failed to open certificate file {}: {}", path, e)))?,
    );

    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServerError::Tls(format!("Failed to read certificate {}: {}", path, e)))?;

    if certs.is_empty() {
        return Err(ServerError::Tls(format!("No valid certificate found in {}", path)));
    }

    Ok(certs)
}

/// Reads the first private key of the file; PKCS#1, PKCS#8 and SEC1 are accepted.
pub fn load_private_key(path: &str) -> Result<PrivateKeyDer<'static>, ServerError> {
    let mut reader = BufReader::new(
        File::open(path).map_err(|e| ServerError::Tls(format!("Failed to open private key file {}: {}", path, e)))?,
    );

    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| ServerError::Tls(format!("Failed to read private key {}: {}", path, e)))?
        .ok_or_else(|| ServerError::Tls(format!("No valid private key found in {}", path)))
}

/// TLS without client authentication.
pub fn server_config(cert_path: &str, key_path: &str) -> Result<ServerConfig, ServerError> {
    let certs = load_certs(cert_path)?;
    let private_key = load_private_key(key_path)?;

    ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, private_key)
        .map_err(|e| ServerError::Tls(format!("Failed to create TLS config: {}", e)))
}

/// TLS that rejects clients without a certificate issued by `client_ca_path`.
pub fn mutual_server_config(cert_path: &str, key_path: &str, client_ca_path: &str) -> Result<ServerConfig, ServerError> {
    let certs = load_certs(cert_path)?;
    let private_key = load_private_key(key_path)?;

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(load_certs(client_ca_path)?);
    if added == 0 {
        return Err(ServerError::Tls(format!("No usable CA certificate in {}", client_ca_path)));
    }
    if ignored > 0 {
        log::warn!("Ignored {} unparsable certificate(s) in {}", ignored, client_ca_path);
    }

    let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
        .build()
        .map_err(|e| ServerError::Tls(format!("Failed to create client verifier: {}", e)))?;

    ServerConfig::builder()
        .with_client_cert_verifier(verifier)
        .with_single_cert(certs, private_key)
        .map_err(|e| ServerError::Tls(format!("Failed to create mutual TLS config: {}", e)))
}
