//! TLS client configuration
//!
//! Every transport gets its own rustls [`ClientConfig`] whose certificate
//! verifier combines the shared [`TrustContext`] with the per-client host
//! name allow-list.

use std::sync::Arc;

use rustls::{
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider},
    pki_types::{CertificateDer, ServerName, UnixTime},
    server::ParsedCertificate,
    CertificateError, ClientConfig, DigitallySignedStruct, Error as TlsError, RootCertStore,
    SignatureScheme,
};

use crate::{
    error::{HttpError, Result},
    trust::TrustContext,
};

/// Server certificate verifier driven by trust anchors and a host allow-list
///
/// * Without anchors the chain is not checked at all.
/// * With an empty allow-list the peer host name is not checked at all.
/// * Handshake signatures are always checked against the presented key.
#[derive(Debug)]
pub struct PolicyVerifier {
    anchors: Option<Arc<RootCertStore>>,
    allowed_hostnames: Vec<String>,
    provider: Arc<CryptoProvider>,
}

impl PolicyVerifier {
    pub fn new(
        anchors: Option<Arc<RootCertStore>>,
        allowed_hostnames: &[String],
        provider: Arc<CryptoProvider>,
    ) -> Self {
        Self {
            anchors,
            allowed_hostnames: allowed_hostnames
                .iter()
                .map(|h| h.trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
            provider,
        }
    }

    /// Case-insensitive allow-list membership; an empty list allows everything.
    pub fn is_host_allowed(&self, host: &str) -> bool {
        self.allowed_hostnames.is_empty()
            || self
                .allowed_hostnames
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(host))
    }
}

impl ServerCertVerifier for PolicyVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, TlsError> {
        if !self.is_host_allowed(&server_name.to_str()) {
            return Err(TlsError::InvalidCertificate(CertificateError::NotValidForName));
        }

        if let Some(anchors) = &self.anchors {
            let cert = ParsedCertificate::try_from(end_entity)?;
            rustls::client::verify_server_cert_signed_by_trust_anchor(
                &cert,
                anchors,
                intermediates,
                now,
                self.provider.signature_verification_algorithms.all,
            )?;
        }

        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, TlsError> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, TlsError> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Build the rustls config for one transport.
pub fn client_config(trust: &TrustContext, allowed_hostnames: &[String]) -> Result<ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let verifier = PolicyVerifier::new(trust.anchors(), allowed_hostnames, provider.clone());

    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| HttpError::Tls(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> Arc<CryptoProvider> {
        Arc::new(rustls::crypto::ring::default_provider())
    }

    fn verify(verifier: &PolicyVerifier, host: &'static str) -> bool {
        let cert = CertificateDer::from(vec![0x30, 0x03, 0x02, 0x01, 0x00]);
        let name = ServerName::try_from(host).unwrap();
        verifier
            .verify_server_cert(&cert, &[], &name, &[], UnixTime::now())
            .is_ok()
    }

    #[test]
    fn test_accept_all_without_allow_list() {
        let verifier = PolicyVerifier::new(None, &[], provider());
        assert!(verify(&verifier, "anything.example.com"));
        assert!(verify(&verifier, "127.0.0.1"));
    }

    #[test]
    fn test_allow_list_is_case_insensitive() {
        let allowed = vec!["API.Example.com".to_string()];
        let verifier = PolicyVerifier::new(None, &allowed, provider());

        assert!(verify(&verifier, "api.example.com"));
        assert!(verify(&verifier, "api.EXAMPLE.com"));
        assert!(!verify(&verifier, "evil.example.com"));
    }

    #[test]
    fn test_blank_allow_list_entries_ignored() {
        let allowed = vec!["  ".to_string()];
        let verifier = PolicyVerifier::new(None, &allowed, provider());
        assert!(verifier.is_host_allowed("whatever"));
    }

    #[test]
    fn test_anchors_reject_unparseable_chain() {
        let anchors = Some(Arc::new(RootCertStore::empty()));
        let verifier = PolicyVerifier::new(anchors, &[], provider());
        assert!(!verify(&verifier, "api.example.com"));
    }

    #[test]
    fn test_client_config_builds() {
        let allowed = vec!["localhost".to_string()];
        assert!(client_config(&TrustContext::accept_all(), &allowed).is_ok());
    }
}
