//! TLS transport configuration for secure associations.
//!
//! Trust anchors can come from custom root certificates or from
//! pinning the peer's end-entity certificate.
//! Certificate pinning fails closed:
//! any certificate other than the pinned one,
//! byte for byte, aborts the handshake.
use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use snafu::{ResultExt, Snafu};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use crate::association::Result as AssociationResult;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The server name is not a valid DNS name or IP address.
    #[snafu(display("invalid TLS server name `{}`", name))]
    InvalidServerName { name: String },

    /// A trust root certificate could not be added.
    #[snafu(display("invalid trust root certificate"))]
    InvalidRoot { source: rustls::Error },

    /// The client identity could not be applied.
    #[snafu(display("invalid client certificate or key"))]
    InvalidClientIdentity { source: rustls::Error },
}

/// The minimum TLS protocol version to negotiate.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum MinProtocolVersion {
    /// TLS 1.2 or newer
    #[default]
    Tls12,
    /// TLS 1.3 only
    Tls13,
}

/// The source of trust for the peer's certificate chain.
#[derive(Debug, Clone)]
pub enum TrustRoots {
    /// trust chains anchored in the given root certificates
    /// (pass the platform's root store here for system trust)
    Custom(Vec<CertificateDer<'static>>),
    /// trust exactly one end-entity certificate, byte for byte
    Pinned(CertificateDer<'static>),
}

/// A client certificate and key for mutual TLS.
#[derive(Debug)]
pub struct ClientIdentity {
    /// the certificate chain, leaf first
    pub cert_chain: Vec<CertificateDer<'static>>,
    /// the private key of the leaf certificate
    pub key: PrivateKeyDer<'static>,
}

impl Clone for TlsClientOptions {
    fn clone(&self) -> Self {
        TlsClientOptions {
            server_name: self.server_name.clone(),
            roots: self.roots.clone(),
            client_identity: self.client_identity.as_ref().map(|id| ClientIdentity {
                cert_chain: id.cert_chain.clone(),
                key: id.key.clone_key(),
            }),
            min_version: self.min_version,
        }
    }
}

/// TLS options for the association requester.
#[derive(Debug)]
pub struct TlsClientOptions {
    /// the name the server certificate must be valid for
    pub server_name: String,
    /// the source of trust for the server certificate
    pub roots: TrustRoots,
    /// the client identity for mutual TLS, if any
    pub client_identity: Option<ClientIdentity>,
    /// the minimum protocol version
    pub min_version: MinProtocolVersion,
}

impl TlsClientOptions {
    /// Create TLS options trusting the given root certificates.
    pub fn new(server_name: impl Into<String>, roots: TrustRoots) -> Self {
        TlsClientOptions {
            server_name: server_name.into(),
            roots,
            client_identity: None,
            min_version: MinProtocolVersion::default(),
        }
    }

    /// Attach a client identity for mutual TLS.
    pub fn client_identity(mut self, identity: ClientIdentity) -> Self {
        self.client_identity = Some(identity);
        self
    }

    /// Require at least the given protocol version.
    pub fn min_version(mut self, version: MinProtocolVersion) -> Self {
        self.min_version = version;
        self
    }

    fn build_config(&self) -> Result<ClientConfig, Error> {
        let versions: &[&rustls::SupportedProtocolVersion] = match self.min_version {
            MinProtocolVersion::Tls12 => rustls::ALL_VERSIONS,
            MinProtocolVersion::Tls13 => &[&rustls::version::TLS13],
        };
        let builder = ClientConfig::builder_with_protocol_versions(versions);

        let builder = match &self.roots {
            TrustRoots::Custom(roots) => {
                let mut store = RootCertStore::empty();
                for root in roots {
                    store.add(root.clone()).context(InvalidRootSnafu)?;
                }
                builder.with_root_certificates(store)
            }
            TrustRoots::Pinned(pinned) => builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(PinnedCertVerifier::new(
                    pinned.clone(),
                ))),
        };

        match self.client_identity.as_ref() {
            Some(identity) => builder
                .with_client_auth_cert(identity.cert_chain.clone(), identity.key.clone_key())
                .context(InvalidClientIdentitySnafu),
            None => Ok(builder.with_no_client_auth()),
        }
    }

    /// Perform the TLS handshake over a connected TCP stream,
    /// bounded by the connect timeout.
    pub(crate) async fn handshake(
        &self,
        socket: TcpStream,
        timeout: Duration,
    ) -> AssociationResult<TlsStream<TcpStream>> {
        let config = self
            .build_config()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))
            .context(crate::association::TlsHandshakeSnafu)?;
        let server_name = ServerName::try_from(self.server_name.clone())
            .map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid TLS server name")
            })
            .context(crate::association::TlsHandshakeSnafu)?;
        let connector = TlsConnector::from(Arc::new(config));
        tokio::time::timeout(timeout, connector.connect(server_name, socket))
            .await
            .map_err(|_| {
                crate::association::TimeoutSnafu {
                    operation: "TLS handshake",
                }
                .build()
            })?
            .context(crate::association::TlsHandshakeSnafu)
    }
}

/// A certificate verifier which accepts exactly one pinned
/// end-entity certificate and rejects everything else.
#[derive(Debug)]
struct PinnedCertVerifier {
    pinned: CertificateDer<'static>,
    provider: Arc<CryptoProvider>,
}

impl PinnedCertVerifier {
    fn new(pinned: CertificateDer<'static>) -> Self {
        PinnedCertVerifier {
            pinned,
            provider: Arc::new(rustls::crypto::ring::default_provider()),
        }
    }
}

impl ServerCertVerifier for PinnedCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        if end_entity.as_ref() == self.pinned.as_ref() {
            Ok(ServerCertVerified::assertion())
        } else {
            Err(rustls::Error::InvalidCertificate(
                rustls::CertificateError::ApplicationVerificationFailure,
            ))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
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
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
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
