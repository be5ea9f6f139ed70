use std::path::PathBuf;

use crate::acme::workflow::PollPolicy;

pub const LETS_ENCRYPT_DIRECTORY_URL: &str = "https://acme-v02.api.letsencrypt.org/directory";
pub const LETS_ENCRYPT_STAGING_DIRECTORY_URL: &str =
    "https://acme-staging-v02.api.letsencrypt.org/directory";

const DEFAULT_STATE_DIR: &str = "./.acme";
const DEFAULT_SELF_SIGNED_SUBJECT: &str = "anonymous";

pub fn get_acme_directory_url() -> String {
    std::env::var("ACME_DIRECTORY_URL").unwrap_or_else(|_| LETS_ENCRYPT_DIRECTORY_URL.to_string())
}

/// Base directory holding the key pairs and the cached certificate.
pub fn get_state_dir() -> PathBuf {
    std::env::var("ACME_STATE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_STATE_DIR))
}

pub fn get_contact_email() -> Option<String> {
    std::env::var("PUBLIC_CONTACT_EMAIL").ok()
}

pub fn get_public_domain() -> Option<String> {
    std::env::var("PUBLIC_DOMAIN").ok()
}

/// Settings consumed by [`crate::provision::CertProvisioner`].
#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    pub directory_url: String,
    pub contact_email: String,
    pub state_dir: PathBuf,
    pub poll_policy: PollPolicy,
    pub self_signed_subject: String,
}

impl ProvisionerConfig {
    pub fn new(contact_email: impl Into<String>) -> Self {
        Self {
            directory_url: get_acme_directory_url(),
            contact_email: contact_email.into(),
            state_dir: get_state_dir(),
            poll_policy: PollPolicy::default(),
            self_signed_subject: DEFAULT_SELF_SIGNED_SUBJECT.to_string(),
        }
    }
}
