use serde::Deserialize;
use thiserror::Error;

/// Problem document as returned by ACME servers (RFC 7807).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AcmeProblem {
    #[serde(rename = "type")]
    pub problem_type: Option<String>,
    pub detail: Option<String>,
    pub status: Option<u16>,
}

impl std::fmt::Display for AcmeProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.detail, &self.problem_type) {
            (Some(detail), _) => write!(f, "{detail}"),
            (None, Some(problem_type)) => write!(f, "{problem_type}"),
            (None, None) => write!(f, "no problem detail supplied"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AcmeError {
    #[error("Could not reach ACME directory at {url} — {reason}")]
    Connection { url: String, reason: String },
    #[error("Account registration was rejected — {0}")]
    Account(String),
    #[error("No http-01 challenge offered for {domain}")]
    UnsupportedChallenge { domain: String },
    #[error("Validation of {domain} failed — {detail}")]
    ChallengeFailed { domain: String, detail: String },
    #[error("Certificate issuance failed — {detail}")]
    IssuanceFailed { detail: String },
    #[error("Gave up polling for {operation} after {waited:?}")]
    PollDeadlineExceeded {
        operation: &'static str,
        waited: std::time::Duration,
    },
    #[error("Request to {url} failed with status {status} — {problem}")]
    FailedRequest {
        url: String,
        status: hyper::StatusCode,
        problem: AcmeProblem,
    },
    #[error("No nonce provided by the ACME server")]
    NoNonce,
    #[error("No Location header in the ACME server response")]
    MissingLocationHeader,
    #[error("Challenge has no token")]
    MissingToken,
    #[error("CSR generation failed — {0}")]
    Csr(String),
    #[error("Hyper Error — {0:?}")]
    Transport(#[from] hyper::Error),
    #[error("HTTP Error — {0:?}")]
    Http(#[from] hyper::http::Error),
    #[error("Deserialization Error — {0:?}")]
    Serde(#[from] serde_json::Error),
    #[error("Crypto Error — {0:?}")]
    Crypto(#[from] openssl::error::ErrorStack),
    #[error("Base64 Decoding Error — {0:?}")]
    Base64Decode(#[from] base64::DecodeError),
    #[error("Http Header Conversion Error — {0:?}")]
    HeaderConversion(#[from] hyper::header::ToStrError),
    #[error(transparent)]
    Bundle(#[from] crate::bundle::BundleError),
}
