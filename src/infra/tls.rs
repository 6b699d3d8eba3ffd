//! TLS/SSL infrastructure.
//!
//! Provides the trust policies used by request connectors: the permissive
//! trust-all policy installed by the bridge, and the Mozilla-root default
//! used when nothing has been installed.

use crate::config::TlsVersions;
use crate::error::TrustError;
use crate::shared::cert_parser::{log_accepted_certificate, PeerRole};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider, WebPkiSupportedAlgorithms};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::{DigitallySignedStruct, DistinguishedName, SignatureScheme};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::net::TcpStream;
use tokio_rustls::{client::TlsStream, TlsConnector};

/// Process-wide trust policy slot, written by [`install_trust_all_policy`].
static INSTALLED_POLICY: RwLock<Option<Arc<TrustPolicy>>> = RwLock::new(None);

fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Server certificate verifier that accepts every chain.
///
/// Handshake signatures are still checked against the presented key, so the
/// peer must hold the private key of whatever certificate it sends.
#[derive(Debug)]
pub struct AcceptAnyServerCert {
    algorithms: WebPkiSupportedAlgorithms,
}

impl AcceptAnyServerCert {
    pub fn new(provider: &CryptoProvider) -> Self {
        Self {
            algorithms: provider.signature_verification_algorithms,
        }
    }
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        log_accepted_certificate(
            PeerRole::Server,
            end_entity,
            intermediates.len(),
            Some(&*server_name.to_str()),
        );
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

/// Client certificate verifier that offers, but does not require, client
/// authentication and accepts any chain presented.
#[derive(Debug)]
pub struct AcceptAnyClientCert {
    algorithms: WebPkiSupportedAlgorithms,
}

impl AcceptAnyClientCert {
    pub fn new(provider: &CryptoProvider) -> Self {
        Self {
            algorithms: provider.signature_verification_algorithms,
        }
    }
}

impl ClientCertVerifier for AcceptAnyClientCert {
    fn client_auth_mandatory(&self) -> bool {
        false
    }

    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        log_accepted_certificate(PeerRole::Client, end_entity, intermediates.len(), None);
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

/// A trust policy: the TLS client configuration every connector created
/// from it shares, plus the client-certificate verifier for the server role.
#[derive(Debug)]
pub struct TrustPolicy {
    client_config: Arc<rustls::ClientConfig>,
    client_verifier: Option<Arc<AcceptAnyClientCert>>,
    versions: TlsVersions,
    provider: Arc<CryptoProvider>,
}

impl TrustPolicy {
    /// Builds a policy that accepts every certificate from either peer.
    pub fn trust_all(versions: TlsVersions) -> Result<Self, TrustError> {
        let protocol_versions = versions.protocol_versions();
        let provider = crypto_provider();
        let server_verifier = Arc::new(AcceptAnyServerCert::new(&provider));
        let client_verifier = Arc::new(AcceptAnyClientCert::new(&provider));

        let client_config = rustls::ClientConfig::builder_with_provider(provider.clone())
            .with_protocol_versions(protocol_versions)?
            .dangerous()
            .with_custom_certificate_verifier(server_verifier)
            .with_no_client_auth();

        Ok(Self {
            client_config: Arc::new(client_config),
            client_verifier: Some(client_verifier),
            versions,
            provider,
        })
    }

    /// Builds the verifying policy backed by Mozilla's root certificates.
    pub fn webpki_roots(versions: TlsVersions) -> Result<Self, TrustError> {
        let protocol_versions = versions.protocol_versions();
        let root_store =
            rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let provider = crypto_provider();

        let client_config = rustls::ClientConfig::builder_with_provider(provider.clone())
            .with_protocol_versions(protocol_versions)?
            .with_root_certificates(root_store)
            .with_no_client_auth();

        Ok(Self {
            client_config: Arc::new(client_config),
            client_verifier: None,
            versions,
            provider,
        })
    }

    /// Returns `true` when this policy skips certificate validation.
    pub fn is_permissive(&self) -> bool {
        self.client_verifier.is_some()
    }

    pub fn client_config(&self) -> Arc<rustls::ClientConfig> {
        self.client_config.clone()
    }

    /// Builds a server configuration presenting `cert_chain`. Under a
    /// permissive policy any client certificate is accepted; otherwise
    /// client authentication is not requested.
    pub fn server_config(
        &self,
        cert_chain: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
    ) -> Result<Arc<rustls::ServerConfig>, TrustError> {
        let builder = rustls::ServerConfig::builder_with_provider(self.provider.clone())
            .with_protocol_versions(self.versions.protocol_versions())?;

        let config = match &self.client_verifier {
            Some(verifier) => builder
                .with_client_cert_verifier(verifier.clone())
                .with_single_cert(cert_chain, key)?,
            None => builder.with_no_client_auth().with_single_cert(cert_chain, key)?,
        };

        Ok(Arc::new(config))
    }
}

/// Installs the trust-all policy as the process-wide default.
///
/// Affects every connector created afterwards, not just those owned by the
/// bridge. Installing again replaces the previous policy. On failure the
/// previously installed policy, if any, stays in effect.
pub fn install_trust_all_policy() -> Result<Arc<TrustPolicy>, TrustError> {
    install_trust_all_policy_with(TlsVersions::default())
}

/// [`install_trust_all_policy`] with an explicit set of protocol versions.
pub fn install_trust_all_policy_with(
    versions: TlsVersions,
) -> Result<Arc<TrustPolicy>, TrustError> {
    let policy = match TrustPolicy::trust_all(versions) {
        Ok(policy) => Arc::new(policy),
        Err(e) => {
            tracing::error!(error = %e, "Failed to install trust-all policy");
            return Err(e);
        }
    };

    let mut slot = INSTALLED_POLICY
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
        tracing::debug!("Replacing previously installed trust policy");
    }
    *slot = Some(policy.clone());

    tracing::warn!(
        ?versions,
        "Trust-all policy installed: TLS certificates are no longer validated"
    );
    Ok(policy)
}

/// Returns the process-wide policy, if one has been installed.
pub fn installed_policy() -> Option<Arc<TrustPolicy>> {
    INSTALLED_POLICY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Trait for TLS connector providers.
///
/// This abstraction lets the executor stay ignorant of which trust policy
/// is in force and allows tests to inject one explicitly.
pub trait TlsProvider: Send + Sync {
    /// Returns the client configuration new connections should use.
    fn client_config(&self) -> Arc<rustls::ClientConfig>;

    /// Creates a TLS connector from this provider's configuration.
    fn connector(&self) -> TlsConnector {
        TlsConnector::from(self.client_config())
    }
}

/// Connector factory bound to a trust policy.
///
/// The policy is resolved once, when the factory is built: an injected
/// policy wins, then the process-wide installed one, then the verifying
/// Mozilla-root default. Re-installing a policy later never changes the
/// configuration of an existing factory.
#[derive(Debug, Clone)]
pub struct ConnectorFactory {
    policy: Arc<TrustPolicy>,
}

impl ConnectorFactory {
    pub fn new(policy: Option<Arc<TrustPolicy>>) -> Result<Self, TrustError> {
        let policy = match policy.or_else(installed_policy) {
            Some(policy) => policy,
            None => Arc::new(TrustPolicy::webpki_roots(TlsVersions::default())?),
        };
        Ok(Self { policy })
    }

    pub fn policy(&self) -> &Arc<TrustPolicy> {
        &self.policy
    }
}

impl TlsProvider for ConnectorFactory {
    fn client_config(&self) -> Arc<rustls::ClientConfig> {
        self.policy.client_config()
    }
}

/// Establishes a TLS connection over an existing TCP stream.
pub async fn connect_tls<P: TlsProvider + ?Sized>(
    provider: &P,
    tcp_stream: TcpStream,
    server_name: &str,
) -> Result<TlsStream<TcpStream>, String> {
    let connector = provider.connector();

    let server_name = ServerName::try_from(server_name.to_string())
        .map_err(|e| format!("Invalid server name: {}", e))?;

    connector
        .connect(server_name, tcp_stream)
        .await
        .map_err(|e| e.to_string())
}
