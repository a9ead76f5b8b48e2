//! Test PKI for exercising mutual TLS against loopback gateways
//!
//! Available with the `test-util` feature.

use std::sync::Arc;

use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use tokio_rustls::TlsAcceptor;

use crate::transport::TlsIdentity;

/// Throwaway CA with one server certificate (`localhost`) and one client
/// certificate, all PEM encoded
#[derive(Debug, Clone)]
pub struct Pki {
    pub ca_cert: String,
    pub server_cert: String,
    pub server_key: String,
    pub client_cert: String,
    pub client_key: String,
}

impl Pki {
    /// Generate a fresh CA and sign both leaf certificates with it
    ///
    /// # Panics
    ///
    /// If key generation or signing fails.
    pub fn generate() -> Self {
        let ca_key = KeyPair::generate().expect("generate CA key");
        let mut ca_params = CertificateParams::default();
        ca_params
            .distinguished_name
            .push(DnType::CommonName, "Courier Test CA");
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let ca_cert = ca_params.self_signed(&ca_key).expect("self-sign CA");

        let leaf = |name: &str| {
            let key = KeyPair::generate().expect("generate leaf key");
            let cert = CertificateParams::new(vec![name.to_string()])
                .expect("leaf params")
                .signed_by(&key, &ca_cert, &ca_key)
                .expect("sign leaf");
            (cert.pem(), key.serialize_pem())
        };
        let (server_cert, server_key) = leaf("localhost");
        let (client_cert, client_key) = leaf("client");

        Self {
            ca_cert: ca_cert.pem(),
            server_cert,
            server_key,
            client_cert,
            client_key,
        }
    }

    /// Server side, presenting the `localhost` certificate and requiring a
    /// client certificate issued by this CA
    ///
    /// # Panics
    ///
    /// If the generated material is rejected by rustls.
    pub fn acceptor(&self) -> TlsAcceptor {
        let provider = Arc::new(rustls::crypto::ring::default_provider());

        let mut roots = RootCertStore::empty();
        roots
            .add(CertificateDer::from_pem_slice(self.ca_cert.as_bytes()).expect("parse CA"))
            .expect("add CA");
        let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider.clone())
            .build()
            .expect("client verifier");

        let config = ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .expect("protocol versions")
            .with_client_cert_verifier(verifier)
            .with_single_cert(
                vec![CertificateDer::from_pem_slice(self.server_cert.as_bytes()).expect("parse server cert")],
                PrivateKeyDer::from_pem_slice(self.server_key.as_bytes()).expect("parse server key"),
            )
            .expect("server config");

        TlsAcceptor::from(Arc::new(config))
    }

    /// Client identity trusting only this CA
    ///
    /// # Panics
    ///
    /// If the generated material is rejected by rustls.
    pub fn client_identity(&self) -> TlsIdentity {
        TlsIdentity::builder()
            .client_cert_pem(self.client_cert.as_bytes())
            .client_key_pem(self.client_key.as_bytes())
            .ca_cert_pem(self.ca_cert.as_bytes())
            .build()
            .expect("client identity")
    }
}
