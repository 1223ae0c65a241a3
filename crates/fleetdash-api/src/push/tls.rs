// TLS setup for the websocket transport
//
// reqwest carries its own TLS knobs (see `transport.rs`); the websocket
// handshake goes through tokio-tungstenite, which needs a rustls
// `ClientConfig` for anything other than the bundled webpki roots.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_tungstenite::Connector;

use crate::error::Error;
use crate::transport::TlsMode;

/// Build the connector for `mode`. `None` means the tokio-tungstenite
/// default (webpki roots).
pub(crate) fn websocket_connector(mode: &TlsMode) -> Result<Option<Connector>, Error> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());

    let config = match mode {
        TlsMode::System => return Ok(None),
        TlsMode::CustomCa(path) => {
            let mut roots = RootCertStore::empty();
            let certs = CertificateDer::pem_file_iter(path)
                .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
            for cert in certs {
                let cert = cert.map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                roots
                    .add(cert)
                    .map_err(|e| Error::Tls(format!("rejected CA cert: {e}")))?;
            }
            ClientConfig::builder_with_provider(provider)
                .with_safe_default_protocol_versions()
                .map_err(|e| Error::Tls(e.to_string()))?
                .with_root_certificates(roots)
                .with_no_client_auth()
        }
        TlsMode::DangerAcceptInvalid => ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()
            .map_err(|e| Error::Tls(e.to_string()))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCert(provider)))
            .with_no_client_auth(),
    };

    Ok(Some(Connector::Rustls(Arc::new(config))))
}

/// Skips chain and hostname checks but still verifies handshake
/// signatures against the presented certificate.
#[derive(Debug)]
struct AcceptAnyCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
