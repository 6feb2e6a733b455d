//! TLS for PostgreSQL connections.
//!
//! The `sslmode` query parameter of a `postgres://` URI selects the mode.
//! tokio-postgres itself only understands `disable`, `prefer` and `require`,
//! so the parameter is taken out of the URI here and the connector is built
//! to match.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{debug, warn};

use crate::error::{MigrateError, Result};

/// PostgreSQL `sslmode` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslMode {
    /// Plain TCP.
    #[default]
    Disable,
    /// TLS when the server offers it, without certificate checks.
    Prefer,
    /// TLS without certificate checks.
    Require,
    /// TLS with certificate verification against the web PKI roots.
    VerifyCa,
    /// Same as `VerifyCa`; rustls always checks the host name.
    VerifyFull,
}

impl SslMode {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "" | "disable" => Ok(SslMode::Disable),
            "prefer" => Ok(SslMode::Prefer),
            "require" => Ok(SslMode::Require),
            "verify-ca" => Ok(SslMode::VerifyCa),
            "verify-full" => Ok(SslMode::VerifyFull),
            other => Err(MigrateError::Config(format!(
                "Invalid sslmode '{}'. Valid values: disable, prefer, require, verify-ca, verify-full",
                other
            ))),
        }
    }

    pub fn uses_tls(&self) -> bool {
        !matches!(self, SslMode::Disable)
    }

    /// The closest mode tokio-postgres understands.
    pub fn to_postgres(self) -> tokio_postgres::config::SslMode {
        match self {
            SslMode::Disable => tokio_postgres::config::SslMode::Disable,
            SslMode::Prefer => tokio_postgres::config::SslMode::Prefer,
            SslMode::Require | SslMode::VerifyCa | SslMode::VerifyFull => {
                tokio_postgres::config::SslMode::Require
            }
        }
    }

    /// Remove `sslmode` from a URI's query string, returning the remaining URI
    /// and the parsed mode.
    pub fn split_from_url(url: &str) -> Result<(String, SslMode)> {
        let Some((base, query)) = url.split_once('?') else {
            return Ok((url.to_string(), SslMode::Disable));
        };

        let mut mode = SslMode::Disable;
        let mut kept = Vec::new();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            match pair.split_once('=') {
                Some(("sslmode", value)) => mode = SslMode::parse(value)?,
                _ => kept.push(pair),
            }
        }

        let url = if kept.is_empty() {
            base.to_string()
        } else {
            format!("{}?{}", base, kept.join("&"))
        };
        Ok((url, mode))
    }
}

/// Build the rustls connector for a mode. `None` when TLS is disabled.
pub fn make_connector(mode: SslMode) -> Result<Option<MakeRustlsConnect>> {
    if !mode.uses_tls() {
        return Ok(None);
    }
    Ok(Some(MakeRustlsConnect::new(client_config(mode)?)))
}

fn client_config(mode: SslMode) -> Result<ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(|e| MigrateError::Config(format!("TLS setup failed: {}", e)))?;

    let config = match mode {
        SslMode::Disable => {
            return Err(MigrateError::Config(
                "TLS requested with sslmode=disable".to_string(),
            ))
        }
        SslMode::Prefer | SslMode::Require => {
            warn!(
                "sslmode={:?} encrypts the connection but does not verify the server \
                 certificate; use sslmode=verify-full to verify it",
                mode
            );
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate(provider)))
                .with_no_client_auth()
        }
        SslMode::VerifyCa | SslMode::VerifyFull => {
            debug!("Verifying server certificates against web PKI roots");
            let mut roots = rustls::RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            builder.with_root_certificates(roots).with_no_client_auth()
        }
    };

    Ok(config)
}

/// Accepts any server certificate but still checks handshake signatures.
#[derive(Debug)]
struct AcceptAnyCertificate(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssl_mode_parsing() {
        assert_eq!(SslMode::parse("").unwrap(), SslMode::Disable);
        assert_eq!(SslMode::parse("Prefer").unwrap(), SslMode::Prefer);
        assert_eq!(SslMode::parse("verify-full").unwrap(), SslMode::VerifyFull);
        assert!(SslMode::parse("allow-anything").is_err());
    }

    #[test]
    fn test_split_from_url() {
        let (url, mode) =
            SslMode::split_from_url("postgres://u:p@db/rc?sslmode=require&connect_timeout=5")
                .unwrap();
        assert_eq!(url, "postgres://u:p@db/rc?connect_timeout=5");
        assert_eq!(mode, SslMode::Require);

        let (url, mode) = SslMode::split_from_url("postgres://db/rc?sslmode=verify-ca").unwrap();
        assert_eq!(url, "postgres://db/rc");
        assert_eq!(mode, SslMode::VerifyCa);

        let (url, mode) = SslMode::split_from_url("postgres://db/rc").unwrap();
        assert_eq!(url, "postgres://db/rc");
        assert_eq!(mode, SslMode::Disable);

        assert!(SslMode::split_from_url("postgres://db/rc?sslmode=bogus").is_err());
    }

    #[test]
    fn test_connector_only_when_tls() {
        assert!(make_connector(SslMode::Disable).unwrap().is_none());
        assert!(make_connector(SslMode::Require).unwrap().is_some());
        assert!(make_connector(SslMode::VerifyFull).unwrap().is_some());
    }
}
