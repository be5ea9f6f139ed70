//! Certificate provisioning for a self-hosted web server.
//!
//! Obtains a domain-validated TLS certificate from an ACME v2 directory using
//! the http-01 challenge, caches the issued certificate on disk, and falls
//! back to a locally generated self-signed certificate for offline use. The
//! embedding HTTP server answers challenge requests through a shared
//! [`ChallengeResponder`] handle; everything else happens inside this crate.

pub mod acme;
pub mod bundle;
pub mod cache;
pub mod configuration;
pub mod error;
pub mod keys;
pub mod provision;
pub mod self_signed;

pub use acme::responder::{ChallengeResponder, ACME_CHALLENGE_PREFIX};
pub use acme::workflow::PollPolicy;
pub use bundle::CertificateBundle;
pub use configuration::ProvisionerConfig;
pub use error::ProvisionError;
pub use provision::CertProvisioner;
