//! Role-tagged RSA key pairs persisted as PEM files.

use std::fs;
use std::path::PathBuf;

use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use thiserror::Error;

pub const ACCOUNT_KEY_FILE: &str = "user-key-pair";
pub const DOMAIN_KEY_FILE: &str = "domain-key-pair";

#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("Malformed key pair PEM at {path} — {source:?}")]
    KeyFormat {
        path: PathBuf,
        source: openssl::error::ErrorStack,
    },
    #[error("Could not access key pair at {path} — {source:?}")]
    Storage {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Key pair generation failed — {0:?}")]
    Generate(#[from] openssl::error::ErrorStack),
}

/// The identity a key pair acts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    /// Signs ACME requests on behalf of the registered account.
    Account,
    /// Certified by the issued certificate; signs the CSR.
    Domain,
}

impl KeyRole {
    /// Domain keys are larger: they outlive the order and certify the server
    /// for the whole certificate lifetime, so generation speed loses to key
    /// strength here.
    fn bits(self) -> u32 {
        match self {
            KeyRole::Account => 2048,
            KeyRole::Domain => 4096,
        }
    }

    fn file_name(self) -> &'static str {
        match self {
            KeyRole::Account => ACCOUNT_KEY_FILE,
            KeyRole::Domain => DOMAIN_KEY_FILE,
        }
    }
}

/// Loads or generates the account and domain key pairs.
///
/// A key pair is generated at most once; every later call parses the PEM file
/// on disk and returns the same key.
#[derive(Debug, Clone)]
pub struct KeyStore {
    base_dir: PathBuf,
}

impl KeyStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn key_path(&self, role: KeyRole) -> PathBuf {
        self.base_dir.join(role.file_name())
    }

    pub fn key_pair(&self, role: KeyRole) -> Result<PKey<Private>, KeyStoreError> {
        let path = self.key_path(role);
        if path.exists() {
            let pem = fs::read(&path).map_err(|source| KeyStoreError::Storage {
                path: path.clone(),
                source,
            })?;
            return PKey::private_key_from_pem(&pem)
                .map_err(|source| KeyStoreError::KeyFormat { path, source });
        }
        self.generate(role, path)
    }

    fn generate(&self, role: KeyRole, path: PathBuf) -> Result<PKey<Private>, KeyStoreError> {
        fs::create_dir_all(&self.base_dir).map_err(|source| KeyStoreError::Storage {
            path: self.base_dir.clone(),
            source,
        })?;

        let key = PKey::from_rsa(Rsa::generate(role.bits())?)?;
        let pem = key.private_key_to_pem_pkcs8()?;
        fs::write(&path, &pem).map_err(|source| KeyStoreError::Storage {
            path: path.clone(),
            source,
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).map_err(|source| {
                KeyStoreError::Storage {
                    path: path.clone(),
                    source,
                }
            })?;
        }

        log::info!(
            "[ACME] Generated {} bit key pair at {}",
            role.bits(),
            path.display()
        );
        Ok(key)
    }
}
