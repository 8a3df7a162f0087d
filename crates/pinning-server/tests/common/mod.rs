//! Shared helpers for pinning server integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use pinning_core::{Certificate, CertificateChain, DomainMatcher, Pin, Signer, SigningAlgorithm};
use pinning_server::{CertificateSource, IssuanceService};
use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair, KeyUsagePurpose};
use sha2::{Digest, Sha256};

pub const LIFETIME: Duration = Duration::from_secs(3600);

/// A generated certificate with its key
pub struct Issued {
    pub cert: rcgen::Certificate,
    pub key: KeyPair,
}

impl Issued {
    /// Parsed form used by the pinning pipeline
    pub fn certificate(&self) -> Certificate {
        Certificate::from_der(self.cert.der().to_vec()).expect("rcgen produces valid DER")
    }

    /// Expected pin, computed independently from the key's SPKI
    pub fn expected_pin(&self) -> Pin {
        Pin::new(STANDARD.encode(Sha256::digest(self.key.public_key_der())))
    }
}

/// Self-signed CA able to issue leaves
pub fn ca(name: &str) -> Issued {
    let key = KeyPair::generate().expect("generate CA key");
    let mut params = CertificateParams::new(Vec::<String>::new()).expect("CA params");
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.distinguished_name.push(DnType::CommonName, name);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::CrlSign,
    ];
    let cert = params.self_signed(&key).expect("self-sign CA");

    Issued { cert, key }
}

/// Leaf for `domain` signed by `issuer`
pub fn leaf_signed_by(domain: &str, issuer: &Issued) -> Issued {
    let key = KeyPair::generate().expect("generate leaf key");
    let mut params = CertificateParams::new(vec![domain.to_string()]).expect("leaf params");
    params.distinguished_name.push(DnType::CommonName, domain);
    let cert = params
        .signed_by(&key, &issuer.cert, &issuer.key)
        .expect("sign leaf");

    Issued { cert, key }
}

/// One-certificate chain: a self-signed leaf
pub fn single_chain(domain: &str) -> (CertificateChain, Issued) {
    let key = KeyPair::generate().expect("generate key");
    let cert = CertificateParams::new(vec![domain.to_string()])
        .expect("params")
        .self_signed(&key)
        .expect("self-sign");
    let issued = Issued { cert, key };

    (CertificateChain::new(vec![issued.certificate()]), issued)
}

/// Two-certificate chain: leaf then issuing CA
pub fn two_cert_chain(domain: &str) -> (CertificateChain, Issued, Issued) {
    let intermediate = ca("Test Intermediate CA");
    let leaf = leaf_signed_by(domain, &intermediate);
    let chain = CertificateChain::new(vec![leaf.certificate(), intermediate.certificate()]);

    (chain, leaf, intermediate)
}

/// Issuance service over `source` with a fresh key
pub fn service(
    patterns: &[&str],
    source: Arc<dyn CertificateSource>,
    algorithm: SigningAlgorithm,
) -> IssuanceService {
    let signer = Signer::generate(algorithm).expect("generate signing key");
    IssuanceService::new(DomainMatcher::new(patterns), source, signer, LIFETIME)
}
