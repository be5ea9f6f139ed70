//! The issued certificate chain together with the private key it certifies.

use std::str::from_utf8;
use std::time::{Duration, SystemTime};

use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::error::ErrorStack;
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use thiserror::Error;
use tokio_rustls::rustls::sign::{self, CertifiedKey};
use tokio_rustls::rustls::{Certificate, PrivateKey};

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("Certificate encoding error — {0:?}")]
    Crypto(#[from] ErrorStack),
    #[error("Certificate chain is empty")]
    EmptyChain,
    #[error("Private key is not usable for TLS signing — {0:?}")]
    Signing(#[from] sign::SignError),
    #[error("Certificate PEM decoding error — {0:?}")]
    Pem(#[from] pem::PemError),
    #[error("Certificate PEM is not valid UTF-8 — {0:?}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// A certificate chain plus its private key, both kept as PEM so the bundle
/// can be written to disk and handed to the TLS layer without re-encoding.
///
/// The validity instants are read from the leaf certificate once at
/// construction; [`CertificateBundle::is_valid_at`] decides cache usability.
#[derive(Debug, Clone)]
pub struct CertificateBundle {
    certificate_pem: String,
    private_key_pem: String,
    not_before: SystemTime,
    not_after: SystemTime,
}

impl CertificateBundle {
    pub fn new(
        certificate_pem: String,
        private_key_pem: String,
        not_before: SystemTime,
        not_after: SystemTime,
    ) -> Self {
        Self {
            certificate_pem,
            private_key_pem,
            not_before,
            not_after,
        }
    }

    /// Assembles a bundle from a downloaded chain, leaf certificate first.
    pub fn from_x509_chain(
        chain: &[X509],
        private_key: &PKey<Private>,
    ) -> Result<Self, BundleError> {
        let leaf = chain.first().ok_or(BundleError::EmptyChain)?;
        let not_before = asn1_time_to_system_time(leaf.not_before())?;
        let not_after = asn1_time_to_system_time(leaf.not_after())?;

        let mut pem_strings: Vec<String> = Vec::new();
        for certificate in chain {
            pem_strings.push(from_utf8(&certificate.to_pem()?)?.to_string());
        }

        let private_key_pem = from_utf8(&private_key.private_key_to_pem_pkcs8()?)?.to_string();

        Ok(Self::new(
            pem_strings.join("\n"),
            private_key_pem,
            not_before,
            not_after,
        ))
    }

    pub fn certificate_pem(&self) -> &str {
        &self.certificate_pem
    }

    pub fn private_key_pem(&self) -> &str {
        &self.private_key_pem
    }

    pub fn not_before(&self) -> SystemTime {
        self.not_before
    }

    pub fn not_after(&self) -> SystemTime {
        self.not_after
    }

    pub fn is_valid_at(&self, instant: SystemTime) -> bool {
        self.not_before <= instant && instant <= self.not_after
    }

    pub fn is_currently_valid(&self) -> bool {
        self.is_valid_at(SystemTime::now())
    }

    /// Converts the bundle into the form the rustls server stack serves from.
    pub fn to_certified_key(&self) -> Result<CertifiedKey, BundleError> {
        let private_key = PKey::private_key_from_pem(self.private_key_pem.as_bytes())?;
        let signing_key = sign::any_supported_type(&PrivateKey(private_key.private_key_to_der()?))?;

        let parsed_pems = pem::parse_many(self.certificate_pem.as_bytes())?;
        let cert_chain: Vec<Certificate> = parsed_pems
            .into_iter()
            .map(|p| Certificate(p.contents))
            .collect();

        Ok(CertifiedKey::new(cert_chain, signing_key))
    }
}

pub(crate) fn asn1_time_to_system_time(time: &Asn1TimeRef) -> Result<SystemTime, ErrorStack> {
    let elapsed = Asn1Time::from_unix(0)?.diff(time)?;
    Ok(SystemTime::UNIX_EPOCH
        + Duration::from_secs(elapsed.days as u64 * 86400 + elapsed.secs as u64))
}
