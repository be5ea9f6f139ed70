//! JSON Web Signatures for authenticated ACME requests (RFC 8555 §6.2).

use openssl::hash::{hash, MessageDigest};
use openssl::pkey::{PKey, Private};
use openssl::sign::Signer;
use serde::{Deserialize, Serialize};

use crate::acme::error::AcmeError;
use crate::acme::helpers::b64;

#[derive(Serialize, Clone, Default)]
struct JwsHeader {
    alg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    nonce: Option<String>,
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    jwk: Option<Jwk>,
}

/// Public JWK form of the RSA account key.
///
/// Field order matters: the RFC 7638 thumbprint hashes the JSON with members
/// sorted lexicographically, which for an RSA key is `e`, `kty`, `n`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Jwk {
    e: String,
    kty: String,
    n: String,
}

impl Jwk {
    pub fn new(key: &PKey<Private>) -> Result<Jwk, AcmeError> {
        let rsa = key.rsa()?;
        Ok(Jwk {
            e: b64(&rsa.e().to_vec()),
            kty: "RSA".to_string(),
            n: b64(&rsa.n().to_vec()),
        })
    }

    /// Base64url of the SHA-256 over the canonical JSON (RFC 7638).
    pub fn thumbprint(&self) -> Result<String, AcmeError> {
        let canonical = serde_json::to_string(self)?;
        Ok(b64(&hash(MessageDigest::sha256(), canonical.as_bytes())?))
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct JwsBody {
    protected: String,
    payload: String,
    signature: String,
}

pub fn sign_jws(
    url: &str,
    nonce: Option<String>,
    payload: &str,
    key: &PKey<Private>,
    account_id: Option<&str>,
) -> Result<JwsBody, AcmeError> {
    let payload_b64 = b64(payload.as_bytes());

    let mut header = JwsHeader {
        alg: "RS256".to_string(),
        nonce,
        url: url.to_string(),
        ..Default::default()
    };
    if let Some(kid) = account_id {
        header.kid = Some(kid.to_string());
    } else {
        header.jwk = Some(Jwk::new(key)?);
    }

    let protected_b64 = b64(&serde_json::to_string(&header)?.into_bytes());

    let signature_b64 = {
        let mut signer = Signer::new(MessageDigest::sha256(), key)?;
        signer.update(format!("{protected_b64}.{payload_b64}").as_bytes())?;
        b64(&signer.sign_to_vec()?)
    };

    Ok(JwsBody {
        protected: protected_b64,
        payload: payload_b64,
        signature: signature_b64,
    })
}
