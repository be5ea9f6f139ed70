//! Locally trusted certificates for offline or local-network use.

use chrono::Utc;
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use openssl::x509::{X509, X509Name};
use thiserror::Error;

use crate::bundle::{BundleError, CertificateBundle};

const KEY_BITS: u32 = 4096;
const VALIDITY_DAYS: u32 = 30;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Self-signed certificate generation failed — {0:?}")]
    Signing(#[from] openssl::error::ErrorStack),
    #[error(transparent)]
    Bundle(#[from] BundleError),
}

/// Synthesizes a self-signed certificate without any network interaction.
///
/// The key pair lives only in the returned bundle; persisting it is the
/// caller's decision. The serial number is the current Unix millisecond
/// count, unique enough for local trust only.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfSignedIssuer;

impl SelfSignedIssuer {
    pub fn issue(&self, subject_name: &str) -> Result<CertificateBundle, CryptoError> {
        let key = PKey::from_rsa(Rsa::generate(KEY_BITS)?)?;

        let name = {
            let mut name = X509Name::builder()?;
            name.append_entry_by_text("CN", subject_name)?;
            name.build()
        };

        let serial = BigNum::from_dec_str(&Utc::now().timestamp_millis().to_string())?
            .to_asn1_integer()?;

        let mut builder = X509::builder()?;
        builder.set_version(2)?;
        builder.set_serial_number(&serial)?;
        builder.set_subject_name(&name)?;
        builder.set_issuer_name(&name)?;
        builder.set_pubkey(&key)?;
        let not_before = Asn1Time::days_from_now(0)?;
        let not_after = Asn1Time::days_from_now(VALIDITY_DAYS)?;
        builder.set_not_before(&not_before)?;
        builder.set_not_after(&not_after)?;
        builder.sign(&key, MessageDigest::sha256())?;
        let certificate = builder.build();

        log::debug!("[ACME] Issued self-signed certificate for CN={subject_name}");
        Ok(CertificateBundle::from_x509_chain(&[certificate], &key)?)
    }
}
