use thiserror::Error;

use crate::acme::error::AcmeError;
use crate::cache::CacheError;
use crate::keys::KeyStoreError;
use crate::self_signed::CryptoError;

/// Failure of a provisioning entry point.
///
/// All variants are fatal to the in-flight call; nothing below retries except
/// the designed polling loops inside the ACME workflow.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    SelfSigned(#[from] CryptoError),
    #[error(transparent)]
    Acme(#[from] AcmeError),
}
