//! On-disk certificate cache with validity checking.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use openssl::x509::X509;
use thiserror::Error;

use crate::bundle::{asn1_time_to_system_time, CertificateBundle};
use crate::keys::DOMAIN_KEY_FILE;

pub const CERTIFICATE_FILE: &str = "certificate.pem";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Malformed certificate at {path} — {source:?}")]
    CertificateFormat {
        path: PathBuf,
        source: openssl::error::ErrorStack,
    },
    #[error("No certificate found in {path}")]
    EmptyCertificate { path: PathBuf },
    #[error("Could not access certificate bundle at {path} — {source:?}")]
    Storage {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Decides whether an issuance run is needed at all.
///
/// An expired or not-yet-valid certificate is a cache miss, not an error;
/// only unreadable or unparseable data fails.
#[derive(Debug, Clone)]
pub struct CertificateCache {
    base_dir: PathBuf,
}

impl CertificateCache {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn certificate_path(&self) -> PathBuf {
        self.base_dir.join(CERTIFICATE_FILE)
    }

    pub fn key_path(&self) -> PathBuf {
        self.base_dir.join(DOMAIN_KEY_FILE)
    }

    pub fn load(&self) -> Result<Option<CertificateBundle>, CacheError> {
        let certificate_path = self.certificate_path();
        if !certificate_path.exists() {
            log::debug!(
                "[ACME] No cached certificate at {}",
                certificate_path.display()
            );
            return Ok(None);
        }

        let certificate_pem =
            fs::read_to_string(&certificate_path).map_err(|source| CacheError::Storage {
                path: certificate_path.clone(),
                source,
            })?;
        let chain = X509::stack_from_pem(certificate_pem.as_bytes()).map_err(|source| {
            CacheError::CertificateFormat {
                path: certificate_path.clone(),
                source,
            }
        })?;
        let leaf = chain.first().ok_or_else(|| CacheError::EmptyCertificate {
            path: certificate_path.clone(),
        })?;

        let not_before = asn1_time_to_system_time(leaf.not_before()).map_err(|source| {
            CacheError::CertificateFormat {
                path: certificate_path.clone(),
                source,
            }
        })?;
        let not_after = asn1_time_to_system_time(leaf.not_after()).map_err(|source| {
            CacheError::CertificateFormat {
                path: certificate_path.clone(),
                source,
            }
        })?;

        let now = SystemTime::now();
        if !(not_before <= now && now <= not_after) {
            log::warn!(
                "[ACME] Cached certificate at {} is outside its validity window (notBefore {:?}, notAfter {:?}); a new one will be requested",
                certificate_path.display(),
                not_before,
                not_after
            );
            return Ok(None);
        }

        let key_path = self.key_path();
        let private_key_pem =
            fs::read_to_string(&key_path).map_err(|source| CacheError::Storage {
                path: key_path,
                source,
            })?;

        log::debug!(
            "[ACME] Cached certificate at {} is valid until {:?}",
            certificate_path.display(),
            not_after
        );
        Ok(Some(CertificateBundle::new(
            certificate_pem,
            private_key_pem,
            not_before,
            not_after,
        )))
    }

    /// Writes both bundle files, replacing any previous issuance atomically.
    pub fn store(&self, bundle: &CertificateBundle) -> Result<(), CacheError> {
        fs::create_dir_all(&self.base_dir).map_err(|source| CacheError::Storage {
            path: self.base_dir.clone(),
            source,
        })?;

        write_replace(
            &self.key_path(),
            bundle.private_key_pem().as_bytes(),
            true,
        )?;
        write_replace(
            &self.certificate_path(),
            bundle.certificate_pem().as_bytes(),
            false,
        )?;

        log::info!(
            "[ACME] Stored certificate bundle under {}",
            self.base_dir.display()
        );
        Ok(())
    }
}

/// Write-then-rename so readers never observe a half-written file.
fn write_replace(path: &Path, contents: &[u8], restrict: bool) -> Result<(), CacheError> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    fs::write(&tmp_path, contents).map_err(|source| CacheError::Storage {
        path: tmp_path.clone(),
        source,
    })?;

    #[cfg(unix)]
    if restrict {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600)).map_err(|source| {
            CacheError::Storage {
                path: tmp_path.clone(),
                source,
            }
        })?;
    }
    #[cfg(not(unix))]
    let _ = restrict;

    fs::rename(&tmp_path, path).map_err(|source| CacheError::Storage {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::self_signed::SelfSignedIssuer;
    use openssl::asn1::Asn1Time;
    use openssl::hash::MessageDigest;
    use openssl::pkey::{PKey, Private};
    use openssl::rsa::Rsa;
    use openssl::x509::X509Name;
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::TempDir;

    /// A throwaway certificate with an arbitrary validity window.
    fn certificate_with_window(
        not_before_unix: i64,
        not_after_unix: i64,
    ) -> (X509, PKey<Private>) {
        let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
        let name = {
            let mut name = X509Name::builder().unwrap();
            name.append_entry_by_text("CN", "cache.test").unwrap();
            name.build()
        };
        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&key).unwrap();
        builder
            .set_not_before(&Asn1Time::from_unix(not_before_unix).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::from_unix(not_after_unix).unwrap())
            .unwrap();
        builder.sign(&key, MessageDigest::sha256()).unwrap();
        (builder.build(), key)
    }

    fn unix_now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
    }

    fn store_raw(cache: &CertificateCache, certificate: &X509, key: &PKey<Private>) {
        fs::create_dir_all(cache.certificate_path().parent().unwrap()).unwrap();
        fs::write(cache.certificate_path(), certificate.to_pem().unwrap()).unwrap();
        fs::write(cache.key_path(), key.private_key_to_pem_pkcs8().unwrap()).unwrap();
    }

    #[test]
    fn test_missing_certificate_is_a_miss() {
        let temp_dir = TempDir::new().unwrap();
        let cache = CertificateCache::new(temp_dir.path());
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn test_store_then_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let cache = CertificateCache::new(temp_dir.path());

        let bundle = SelfSignedIssuer::default().issue("cache.test").unwrap();
        cache.store(&bundle).unwrap();

        let loaded = cache.load().unwrap().expect("bundle should be cached");
        assert_eq!(loaded.certificate_pem(), bundle.certificate_pem());
        assert_eq!(loaded.private_key_pem(), bundle.private_key_pem());
    }

    #[test]
    fn test_expired_certificate_is_a_miss() {
        let temp_dir = TempDir::new().unwrap();
        let cache = CertificateCache::new(temp_dir.path());

        let now = unix_now();
        let (certificate, key) = certificate_with_window(now - 90 * 86400, now - 60 * 86400);
        store_raw(&cache, &certificate, &key);

        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn test_not_yet_valid_certificate_is_a_miss() {
        let temp_dir = TempDir::new().unwrap();
        let cache = CertificateCache::new(temp_dir.path());

        let now = unix_now();
        let (certificate, key) = certificate_with_window(now + 86400, now + 60 * 86400);
        store_raw(&cache, &certificate, &key);

        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn test_valid_certificate_is_a_hit() {
        let temp_dir = TempDir::new().unwrap();
        let cache = CertificateCache::new(temp_dir.path());

        let now = unix_now();
        let (certificate, key) = certificate_with_window(now - 86400, now + 60 * 86400);
        store_raw(&cache, &certificate, &key);

        let loaded = cache.load().unwrap().expect("bundle should be usable");
        assert!(loaded.is_currently_valid());
    }

    #[test]
    fn test_malformed_certificate_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let cache = CertificateCache::new(temp_dir.path());

        fs::create_dir_all(temp_dir.path()).unwrap();
        fs::write(cache.certificate_path(), b"garbage").unwrap();

        let result = cache.load();
        assert!(matches!(
            result,
            Err(CacheError::CertificateFormat { .. }) | Err(CacheError::EmptyCertificate { .. })
        ));
    }

    #[test]
    fn test_store_replaces_previous_bundle() {
        let temp_dir = TempDir::new().unwrap();
        let cache = CertificateCache::new(temp_dir.path());

        let first = SelfSignedIssuer::default().issue("first.test").unwrap();
        let second = SelfSignedIssuer::default().issue("second.test").unwrap();
        cache.store(&first).unwrap();
        cache.store(&second).unwrap();

        let loaded = cache.load().unwrap().unwrap();
        assert_eq!(loaded.certificate_pem(), second.certificate_pem());

        let bundle_duration = loaded
            .not_after()
            .duration_since(loaded.not_before())
            .unwrap();
        assert_eq!(bundle_duration, Duration::from_secs(30 * 86400));
    }
}
